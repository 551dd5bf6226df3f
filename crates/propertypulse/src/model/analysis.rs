use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Urgency of a renovation item. Ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Essential,
    Recommended,
    Optional,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Recommended
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Essential => "essential",
            Priority::Recommended => "recommended",
            Priority::Optional => "optional",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkScope {
    Repair,
    Replace,
    Upgrade,
}

impl Default for WorkScope {
    fn default() -> Self {
        WorkScope::Repair
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenovationItem {
    pub item: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub scope: WorkScope,
}

impl RenovationItem {
    pub fn new(item: impl Into<String>, priority: Priority, scope: WorkScope) -> Self {
        Self {
            item: item.into(),
            priority,
            scope,
        }
    }
}

/// Condition assessment of one room photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAnalysis {
    pub room_type: String,
    /// 1 (derelict) to 10 (immaculate).
    pub condition_score: u8,
    #[serde(default)]
    pub issues: BTreeSet<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_age: Option<String>,
    #[serde(default)]
    pub renovation_items: Vec<RenovationItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_light: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural_concerns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl RoomAnalysis {
    pub fn new(room_type: impl Into<String>, condition_score: u8) -> Self {
        Self {
            room_type: room_type.into(),
            condition_score,
            issues: BTreeSet::new(),
            priority: Priority::default(),
            estimated_age: None,
            renovation_items: Vec::new(),
            natural_light: None,
            structural_concerns: None,
            reasoning: None,
        }
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.insert(issue.into());
        self
    }

    pub fn with_item(mut self, item: RenovationItem) -> Self {
        self.renovation_items.push(item);
        self
    }

    pub fn with_estimated_age(mut self, age: impl Into<String>) -> Self {
        self.estimated_age = Some(age.into());
        self
    }

    /// Clamps the score into 1..=10, normalizes the room type to a
    /// lowercase snake_case key and derives `priority` from the items.
    pub fn normalized(mut self) -> Self {
        self.condition_score = self.condition_score.clamp(1, 10);
        self.room_type = normalize_room_type(&self.room_type);
        if let Some(most_urgent) = self.renovation_items.iter().map(|i| i.priority).min() {
            self.priority = most_urgent;
        }
        self
    }

    pub fn condition_label(&self) -> &'static str {
        match self.condition_score {
            0..=3 => "Poor",
            4..=5 => "Fair",
            6..=7 => "Good",
            _ => "Great",
        }
    }

    /// Human-readable room type, e.g. `living_room` → `Living Room`.
    pub fn display_room_type(&self) -> String {
        self.room_type
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Measurements read off a listing's floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorplanAnalysis {
    pub total_sqm: f64,
    #[serde(default)]
    pub rooms: Vec<FloorplanRoom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_notes: Option<String>,
    #[serde(default)]
    pub renovation_opportunities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorplanRoom {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqm: Option<f64>,
}

impl FloorplanAnalysis {
    pub fn new(total_sqm: f64) -> Self {
        Self {
            total_sqm,
            rooms: Vec::new(),
            layout_notes: None,
            renovation_opportunities: Vec::new(),
        }
    }

    /// The total area, if it is a usable positive number.
    pub fn floor_area(&self) -> Option<f64> {
        (self.total_sqm.is_finite() && self.total_sqm > 0.0).then_some(self.total_sqm)
    }
}

fn normalize_room_type(raw: &str) -> String {
    let key = raw
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_");
    if key.is_empty() {
        "other".to_string()
    } else {
        key
    }
}
