//! Base renovation prices (UK average, 2024) and default room sizes.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// A low / mid / high price range in whole pounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRange {
    pub low: u64,
    pub mid: u64,
    pub high: u64,
}

impl CostRange {
    pub const ZERO: CostRange = CostRange::new(0, 0, 0);

    pub const fn new(low: u64, mid: u64, high: u64) -> Self {
        Self { low, mid, high }
    }

    /// Multiplies by a factor, truncating to whole pounds.
    pub fn scale(self, factor: f64) -> Self {
        Self {
            low: (self.low as f64 * factor) as u64,
            mid: (self.mid as f64 * factor) as u64,
            high: (self.high as f64 * factor) as u64,
        }
    }

    pub fn times(self, n: u64) -> Self {
        Self {
            low: self.low * n,
            mid: self.mid * n,
            high: self.high * n,
        }
    }

    /// Whole-percent share in integer arithmetic, truncating.
    pub fn percent(self, pct: u64) -> Self {
        Self {
            low: self.low * pct / 100,
            mid: self.mid * pct / 100,
            high: self.high * pct / 100,
        }
    }

    /// Divides by a non-zero divisor, truncating.
    pub fn per(self, divisor: f64) -> Self {
        Self {
            low: (self.low as f64 / divisor) as u64,
            mid: (self.mid as f64 / divisor) as u64,
            high: (self.high as f64 / divisor) as u64,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.mid == 0 && self.low == 0 && self.high == 0
    }
}

impl Add for CostRange {
    type Output = CostRange;

    fn add(self, rhs: CostRange) -> CostRange {
        CostRange {
            low: self.low + rhs.low,
            mid: self.mid + rhs.mid,
            high: self.high + rhs.high,
        }
    }
}

impl AddAssign for CostRange {
    fn add_assign(&mut self, rhs: CostRange) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for CostRange {
    fn sum<I: Iterator<Item = CostRange>>(iter: I) -> CostRange {
        iter.fold(CostRange::ZERO, |acc, r| acc + r)
    }
}

/// Base prices before regional adjustment. Per-sqm entries are multiplied
/// by a room size; whole-house entries assume a typical 3-bed (~85 sqm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTable {
    pub kitchen_full_replacement: CostRange,
    pub kitchen_cabinet_replacement: CostRange,
    pub bathroom_full_replacement: CostRange,

    pub replaster_walls_sqm: CostRange,
    pub paint_walls_ceiling_sqm: CostRange,
    pub flooring_laminate_sqm: CostRange,

    pub full_rewire: CostRange,
    pub rewire_sqm: CostRange,
    pub boiler_combi: CostRange,
    pub central_heating_full: CostRange,

    pub window_upvc: CostRange,
    pub window_sash_replace: CostRange,
    pub front_door_composite: CostRange,
    pub internal_door_fitted: CostRange,

    pub underpin_per_meter: CostRange,
    pub damp_proof_course: CostRange,

    pub roof_repair_major: CostRange,
    pub roof_replace_full: CostRange,
    pub repoint_brickwork_full: CostRange,
    pub render_full_house: CostRange,
    pub guttering_full: CostRange,

    pub landscaping_basic: CostRange,
}

impl CostTable {
    pub fn uk_2024() -> Self {
        Self {
            kitchen_full_replacement: CostRange::new(12_000, 20_000, 40_000),
            kitchen_cabinet_replacement: CostRange::new(6_000, 10_000, 18_000),
            bathroom_full_replacement: CostRange::new(6_000, 10_000, 20_000),

            replaster_walls_sqm: CostRange::new(25, 40, 60),
            paint_walls_ceiling_sqm: CostRange::new(12, 20, 35),
            flooring_laminate_sqm: CostRange::new(35, 60, 100),

            full_rewire: CostRange::new(4_500, 7_000, 12_000),
            rewire_sqm: CostRange::new(55, 85, 140),
            boiler_combi: CostRange::new(2_500, 4_000, 6_500),
            central_heating_full: CostRange::new(5_000, 8_000, 14_000),

            window_upvc: CostRange::new(500, 800, 1_400),
            window_sash_replace: CostRange::new(1_500, 2_500, 4_000),
            front_door_composite: CostRange::new(1_200, 2_000, 4_000),
            internal_door_fitted: CostRange::new(250, 400, 700),

            underpin_per_meter: CostRange::new(1_500, 2_500, 4_000),
            damp_proof_course: CostRange::new(3_000, 5_000, 9_000),

            roof_repair_major: CostRange::new(3_000, 6_000, 12_000),
            roof_replace_full: CostRange::new(8_000, 14_000, 25_000),
            repoint_brickwork_full: CostRange::new(3_000, 5_000, 9_000),
            render_full_house: CostRange::new(5_000, 8_000, 14_000),
            guttering_full: CostRange::new(800, 1_500, 3_000),

            landscaping_basic: CostRange::new(2_000, 4_000, 8_000),
        }
    }
}

impl Default for CostTable {
    fn default() -> Self {
        Self::uk_2024()
    }
}

/// Typical floor area in sqm for a room type. Exterior shots have no area.
pub fn default_room_size(room_type: &str) -> u64 {
    match room_type {
        "kitchen" => 12,
        "bathroom" => 5,
        "ensuite" => 4,
        "bedroom" => 12,
        "living_room" => 18,
        "dining_room" => 14,
        "hallway" => 8,
        "study" => 9,
        "utility" => 4,
        "garden" => 50,
        "garage" => 15,
        "conservatory" => 12,
        "exterior" => 0,
        _ => 12,
    }
}
