//! Deterministic renovation cost estimation.
//!
//! Prices every renovation item of every analyzed room against a
//! [`CostTable`], adjusted by a regional multiplier, then adds whole-house
//! works implied by the overall condition. All arithmetic is in whole
//! pounds and all collections are ordered, so identical input always
//! serializes to identical output.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::region::Region;
use super::table::{default_room_size, CostRange, CostTable};
use crate::model::{FloorplanAnalysis, Priority, PropertyListing, RoomAnalysis, WorkScope};

const SQFT_PER_SQM: f64 = 10.764;
const TOP_ISSUES: usize = 10;

// ─── Output types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Kitchen,
    Bathrooms,
    Electrical,
    PlumbingHeating,
    WindowsDoors,
    ExternalFacade,
    Decoration,
    Flooring,
    Garden,
    Structural,
}

impl CostCategory {
    pub fn display_name(self) -> &'static str {
        match self {
            CostCategory::Kitchen => "Kitchen",
            CostCategory::Bathrooms => "Bathrooms",
            CostCategory::Electrical => "Electrical",
            CostCategory::PlumbingHeating => "Plumbing & Heating",
            CostCategory::WindowsDoors => "Windows & Doors",
            CostCategory::ExternalFacade => "External/Facade",
            CostCategory::Decoration => "Decoration",
            CostCategory::Flooring => "Flooring",
            CostCategory::Garden => "Garden",
            CostCategory::Structural => "Structural",
        }
    }

    /// Safety and structural work is essential whatever the analysis says.
    pub fn is_safety_critical(self) -> bool {
        matches!(self, CostCategory::Electrical | CostCategory::Structural)
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostItem {
    pub description: String,
    pub category: CostCategory,
    pub priority: Priority,
    /// Must be done before the property is habitable.
    pub essential: bool,
    pub cost: CostRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCost {
    pub room_type: String,
    pub condition: u8,
    pub room_size_sqm: u64,
    pub items: Vec<CostItem>,
    pub total: CostRange,
}

/// Listing facts that affect whole-house pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyProfile {
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub sqft: Option<u32>,
    /// Measured from the floor plan; preferred over `sqft`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_area_sqm: Option<f64>,
}

impl Default for PropertyProfile {
    fn default() -> Self {
        Self {
            bedrooms: 3,
            bathrooms: 1,
            sqft: None,
            floor_area_sqm: None,
        }
    }
}

impl PropertyProfile {
    /// Missing counts fall back to a typical 3-bed, 1-bath house.
    pub fn from_listing(listing: &PropertyListing) -> Self {
        let defaults = Self::default();
        Self {
            bedrooms: if listing.bedrooms > 0 {
                listing.bedrooms
            } else {
                defaults.bedrooms
            },
            bathrooms: if listing.bathrooms > 0 {
                listing.bathrooms
            } else {
                defaults.bathrooms
            },
            sqft: listing.sqft.filter(|s| *s > 0),
            floor_area_sqm: None,
        }
    }

    pub fn with_floorplan(mut self, plan: Option<&FloorplanAnalysis>) -> Self {
        self.floor_area_sqm = plan.and_then(FloorplanAnalysis::floor_area);
        self
    }

    /// Floor plan area, else the listing's sqft, else 50 sqm plus 15 per
    /// bedroom.
    pub fn total_sqm(&self) -> f64 {
        if let Some(sqm) = self.floor_area_sqm.filter(|a| a.is_finite() && *a > 0.0) {
            return sqm;
        }
        match self.sqft {
            Some(sqft) if sqft > 0 => sqft as f64 / SQFT_PER_SQM,
            _ => 50.0 + self.bedrooms as f64 * 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInfo {
    pub total_sqm: f64,
    pub total_sqft: u64,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub region: Region,
    pub region_name: String,
    pub price_multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenovationScope {
    MajorRenovation,
    ModerateRenovation,
    LightRefresh,
    MoveInReady,
}

impl RenovationScope {
    pub fn from_condition(average: f64) -> Self {
        if average <= 3.0 {
            RenovationScope::MajorRenovation
        } else if average <= 5.0 {
            RenovationScope::ModerateRenovation
        } else if average <= 7.0 {
            RenovationScope::LightRefresh
        } else {
            RenovationScope::MoveInReady
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RenovationScope::MajorRenovation => "Property requires major renovation work",
            RenovationScope::ModerateRenovation => "Property needs moderate updating throughout",
            RenovationScope::LightRefresh => "Property would benefit from cosmetic updates",
            RenovationScope::MoveInReady => {
                "Property is in good condition with minimal work needed"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallAssessment {
    /// Mean condition score, one decimal place.
    pub average_condition: f64,
    pub scope: RenovationScope,
    pub scope_description: String,
    pub rooms_analyzed: usize,
    pub total_issues: usize,
    pub top_issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLevel {
    Info,
    Warning,
    Detail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryNote {
    pub level: NoteLevel,
    pub text: String,
}

impl SummaryNote {
    fn new(level: NoteLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Full cost breakdown for one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub property: PropertyInfo,
    /// One entry per input analysis, in input order.
    pub rooms: Vec<RoomCost>,
    /// Non-empty categories only.
    pub by_category: BTreeMap<CostCategory, CostRange>,
    pub essential_works: Vec<CostItem>,
    pub recommended_works: Vec<CostItem>,
    pub optional_works: Vec<CostItem>,
    pub subtotal: CostRange,
    pub contingency_percent: u8,
    pub contingency: CostRange,
    pub grand_total: CostRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_sqm: Option<CostRange>,
    pub assessment: OverallAssessment,
    pub summary: Vec<SummaryNote>,
}

// ─── Engine ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CostEngine {
    table: CostTable,
}

/// Running totals while pricing one property.
#[derive(Default)]
struct Ledger {
    by_category: BTreeMap<CostCategory, CostRange>,
    essential: Vec<CostItem>,
    recommended: Vec<CostItem>,
    optional: Vec<CostItem>,
}

impl Ledger {
    fn record(&mut self, item: &CostItem) {
        *self.by_category.entry(item.category).or_default() += item.cost;
        if item.essential {
            self.essential.push(item.clone());
        } else {
            match item.priority {
                Priority::Optional => self.optional.push(item.clone()),
                _ => self.recommended.push(item.clone()),
            }
        }
    }

    fn category_is_empty(&self, category: CostCategory) -> bool {
        self.by_category
            .get(&category)
            .map_or(true, |range| range.mid == 0)
    }
}

impl CostEngine {
    pub fn new(table: CostTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CostTable {
        &self.table
    }

    /// Estimates with the default property profile (3 bedrooms, 1 bathroom).
    pub fn estimate(&self, rooms: &[RoomAnalysis], region: Region) -> CostEstimate {
        self.estimate_with_profile(rooms, region, &PropertyProfile::default())
    }

    pub fn estimate_with_profile(
        &self,
        rooms: &[RoomAnalysis],
        region: Region,
        profile: &PropertyProfile,
    ) -> CostEstimate {
        let multiplier = region.multiplier();
        let total_sqm = profile.total_sqm();
        let average = average_condition(rooms);
        let mut ledger = Ledger::default();

        let room_costs: Vec<RoomCost> = rooms
            .iter()
            .map(|analysis| self.price_room(analysis, multiplier, &mut ledger))
            .collect();

        self.add_whole_house_works(&mut ledger, rooms, average, total_sqm, profile, multiplier);

        let subtotal: CostRange = ledger.by_category.values().copied().sum();
        ledger.by_category.retain(|_, range| range.mid > 0);

        let contingency_percent: u8 = if average > 5.0 {
            10
        } else if average > 3.0 {
            15
        } else {
            20
        };
        let contingency = subtotal.percent(contingency_percent as u64);
        let grand_total = subtotal + contingency;
        let cost_per_sqm = (total_sqm > 0.0).then(|| grand_total.per(total_sqm));

        let assessment = assess(rooms, average);
        let summary = summarize(&grand_total, cost_per_sqm.as_ref(), &ledger);

        CostEstimate {
            property: PropertyInfo {
                total_sqm,
                total_sqft: (total_sqm * SQFT_PER_SQM) as u64,
                bedrooms: profile.bedrooms,
                bathrooms: profile.bathrooms,
                region,
                region_name: region.display_name().to_string(),
                price_multiplier: multiplier,
            },
            rooms: room_costs,
            by_category: ledger.by_category,
            essential_works: ledger.essential,
            recommended_works: ledger.recommended,
            optional_works: ledger.optional,
            subtotal,
            contingency_percent,
            contingency,
            grand_total,
            cost_per_sqm,
            assessment,
            summary,
        }
    }

    fn price_room(&self, analysis: &RoomAnalysis, multiplier: f64, ledger: &mut Ledger) -> RoomCost {
        let room_size = default_room_size(&analysis.room_type);
        let mut items: Vec<CostItem> = analysis
            .renovation_items
            .iter()
            .filter_map(|item| {
                let (category, cost) =
                    self.classify(&item.item, item.scope, &analysis.room_type, room_size)?;
                Some(CostItem {
                    description: item.item.clone(),
                    category,
                    priority: item.priority,
                    essential: item.priority == Priority::Essential
                        || category.is_safety_critical(),
                    cost: cost.scale(multiplier),
                })
            })
            .collect();

        if analysis.condition_score <= 5 && items.is_empty() && room_size > 0 {
            items.push(self.room_refresh(analysis.condition_score, room_size, multiplier));
        }

        for item in &items {
            ledger.record(item);
        }

        RoomCost {
            room_type: analysis.room_type.clone(),
            condition: analysis.condition_score,
            room_size_sqm: room_size,
            total: items.iter().map(|i| i.cost).sum(),
            items,
        }
    }

    /// Maps a renovation item to a category and an unadjusted price.
    /// Items that match no known work type are not priced.
    fn classify(
        &self,
        item: &str,
        scope: WorkScope,
        room_type: &str,
        room_size: u64,
    ) -> Option<(CostCategory, CostRange)> {
        let t = &self.table;
        let name = item.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

        let priced = if room_type == "kitchen" && has(&["kitchen", "cabinet", "unit", "worktop"]) {
            let cost = if scope == WorkScope::Replace || has(&["replace"]) {
                t.kitchen_full_replacement
            } else {
                t.kitchen_cabinet_replacement
            };
            (CostCategory::Kitchen, cost)
        } else if matches!(room_type, "bathroom" | "ensuite")
            && has(&["bathroom", "suite", "shower", "bath"])
        {
            (CostCategory::Bathrooms, t.bathroom_full_replacement)
        } else if has(&["window"]) {
            let cost = if has(&["sash"]) {
                t.window_sash_replace
            } else {
                t.window_upvc
            };
            (CostCategory::WindowsDoors, cost)
        } else if has(&["door"]) {
            let cost = if has(&["front", "external"]) {
                t.front_door_composite
            } else {
                t.internal_door_fitted
            };
            (CostCategory::WindowsDoors, cost)
        } else if has(&["render", "facade", "brickwork", "repoint", "pointing"]) {
            let cost = if has(&["repoint", "pointing"]) {
                t.repoint_brickwork_full
            } else {
                t.render_full_house
            };
            (CostCategory::ExternalFacade, cost)
        } else if has(&["roof", "gutter", "fascia", "soffit"]) {
            let cost = if has(&["replace", "new"]) {
                t.roof_replace_full
            } else {
                t.roof_repair_major
            };
            (CostCategory::ExternalFacade, cost)
        } else if has(&["electri", "wiring", "rewire"]) {
            (CostCategory::Electrical, t.full_rewire)
        } else if has(&["boiler", "heating", "radiator", "plumbing"]) {
            let cost = if has(&["boiler"]) {
                t.boiler_combi
            } else {
                t.central_heating_full
            };
            (CostCategory::PlumbingHeating, cost)
        } else if has(&["floor", "carpet"]) {
            (
                CostCategory::Flooring,
                t.flooring_laminate_sqm.times(room_size),
            )
        } else if has(&["plaster", "wall", "crack"]) {
            (
                CostCategory::Decoration,
                t.replaster_walls_sqm.times(room_size),
            )
        } else if has(&["paint", "decorat"]) {
            (
                CostCategory::Decoration,
                t.paint_walls_ceiling_sqm.times(room_size),
            )
        } else if has(&["garden", "landscap", "patio", "fence"]) {
            (CostCategory::Garden, t.landscaping_basic)
        } else if has(&["structural", "underpin", "subsidence", "damp"]) {
            let cost = if has(&["damp"]) {
                t.damp_proof_course
            } else {
                // Assume three metres of underpinning.
                t.underpin_per_meter.times(3)
            };
            (CostCategory::Structural, cost)
        } else {
            return None;
        };

        Some(priced)
    }

    fn room_refresh(&self, condition: u8, room_size: u64, multiplier: f64) -> CostItem {
        let t = &self.table;
        let (description, cost) = if condition <= 3 {
            let per_sqm = t.replaster_walls_sqm.scale(multiplier)
                + t.paint_walls_ceiling_sqm.scale(multiplier)
                + t.flooring_laminate_sqm.scale(multiplier);
            (
                "Full room refresh (replaster, paint, new flooring)",
                per_sqm.times(room_size),
            )
        } else {
            // Walls plus ceiling.
            let paint = t.paint_walls_ceiling_sqm.scale(multiplier);
            ("Decoration refresh", paint.scale(room_size as f64 * 1.5))
        };

        CostItem {
            description: description.to_string(),
            category: CostCategory::Decoration,
            priority: Priority::Recommended,
            essential: false,
            cost,
        }
    }

    fn add_whole_house_works(
        &self,
        ledger: &mut Ledger,
        rooms: &[RoomAnalysis],
        average: f64,
        total_sqm: f64,
        profile: &PropertyProfile,
        multiplier: f64,
    ) {
        let t = &self.table;

        if average <= 3.0 {
            if ledger.category_is_empty(CostCategory::Electrical) {
                let cost = if total_sqm > 100.0 {
                    t.rewire_sqm.scale(multiplier).scale(total_sqm)
                } else {
                    t.full_rewire.scale(multiplier)
                };
                ledger.record(&essential_item(
                    "Full electrical rewire",
                    CostCategory::Electrical,
                    cost,
                ));
            }

            if ledger.category_is_empty(CostCategory::PlumbingHeating) {
                ledger.record(&essential_item(
                    "New central heating system",
                    CostCategory::PlumbingHeating,
                    t.central_heating_full.scale(multiplier),
                ));
            }

            if ledger.category_is_empty(CostCategory::WindowsDoors) {
                let windows = 4 + profile.bedrooms as u64 * 2;
                let cost = t.window_upvc.scale(multiplier).times(windows)
                    + t.front_door_composite.scale(multiplier);
                ledger.record(&essential_item(
                    format!("Replace {} windows + front door", windows),
                    CostCategory::WindowsDoors,
                    cost,
                ));
            }
        }

        let poor_exterior = rooms
            .iter()
            .any(|r| r.room_type == "exterior" && r.condition_score < 5);
        if poor_exterior && ledger.category_is_empty(CostCategory::ExternalFacade) {
            let cost = t.render_full_house.scale(multiplier) + t.guttering_full.scale(multiplier);
            ledger.record(&essential_item(
                "External facade repair & guttering",
                CostCategory::ExternalFacade,
                cost,
            ));
        }
    }
}

fn essential_item(description: impl Into<String>, category: CostCategory, cost: CostRange) -> CostItem {
    CostItem {
        description: description.into(),
        category,
        priority: Priority::Essential,
        essential: true,
        cost,
    }
}

/// Mean condition rounded to one decimal; 5.0 when nothing was analyzed.
fn average_condition(rooms: &[RoomAnalysis]) -> f64 {
    if rooms.is_empty() {
        return 5.0;
    }
    let sum: u32 = rooms.iter().map(|r| r.condition_score as u32).sum();
    let mean = sum as f64 / rooms.len() as f64;
    (mean * 10.0).round() / 10.0
}

fn assess(rooms: &[RoomAnalysis], average: f64) -> OverallAssessment {
    let scope = RenovationScope::from_condition(average);
    let total_issues = rooms.iter().map(|r| r.issues.len()).sum();
    let mut top_issues: Vec<String> = Vec::new();
    for issue in rooms.iter().flat_map(|r| r.issues.iter()) {
        if top_issues.len() == TOP_ISSUES {
            break;
        }
        if !top_issues.contains(issue) {
            top_issues.push(issue.clone());
        }
    }

    OverallAssessment {
        average_condition: average,
        scope,
        scope_description: scope.description().to_string(),
        rooms_analyzed: rooms.len(),
        total_issues,
        top_issues,
    }
}

fn summarize(grand_total: &CostRange, cost_per_sqm: Option<&CostRange>, ledger: &Ledger) -> Vec<SummaryNote> {
    let mut notes = Vec::new();

    let total = grand_total.mid;
    notes.push(if total < 15_000 {
        SummaryNote::new(NoteLevel::Info, "Light renovation - mainly cosmetic updates")
    } else if total < 40_000 {
        SummaryNote::new(NoteLevel::Info, "Moderate renovation project")
    } else if total < 80_000 {
        SummaryNote::new(NoteLevel::Warning, "Major renovation - consider phased approach")
    } else {
        SummaryNote::new(
            NoteLevel::Warning,
            "Extensive renovation - professional project management recommended",
        )
    });

    if let Some(per_sqm) = cost_per_sqm.map(|r| r.mid).filter(|m| *m > 0) {
        let price = format_pounds(per_sqm);
        notes.push(if per_sqm < 400 {
            SummaryNote::new(NoteLevel::Info, format!("{}/sqm - light refurbishment level", price))
        } else if per_sqm < 800 {
            SummaryNote::new(NoteLevel::Info, format!("{}/sqm - standard renovation level", price))
        } else if per_sqm < 1_200 {
            SummaryNote::new(NoteLevel::Warning, format!("{}/sqm - significant works required", price))
        } else {
            SummaryNote::new(NoteLevel::Warning, format!("{}/sqm - major structural/systems work", price))
        });
    }

    if !ledger.essential.is_empty() {
        let essential_total: u64 = ledger.essential.iter().map(|w| w.cost.mid).sum();
        notes.push(SummaryNote::new(
            NoteLevel::Warning,
            format!(
                "Essential works: {} (must be done before habitation)",
                format_pounds(essential_total)
            ),
        ));
    }

    // First maximum wins on ties, in category order.
    let biggest = ledger
        .by_category
        .iter()
        .fold(None::<(&CostCategory, &CostRange)>, |best, (cat, range)| match best {
            Some((_, best_range)) if best_range.mid >= range.mid => best,
            _ => Some((cat, range)),
        });
    if let Some((category, range)) = biggest {
        notes.push(SummaryNote::new(
            NoteLevel::Detail,
            format!("Largest cost: {} ({})", category, format_pounds(range.mid)),
        ));
    }

    notes
}

/// Formats whole pounds with thousands separators, e.g. `£12,500`.
pub fn format_pounds(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('£');
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
