//! Style-aware renovation prompts derived from a room analysis.

use std::fmt;
use std::str::FromStr;

use crate::model::RoomAnalysis;

const MAX_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchitecturalStyle {
    Victorian,
    Georgian,
    Thirties,
    PostWar,
    SeventiesEighties,
    Modern,
    Unknown,
}

/// Era keywords checked first, in order.
const ERA_HINTS: &[(ArchitecturalStyle, &[&str])] = &[
    (
        ArchitecturalStyle::Victorian,
        &["victorian", "1880", "1890", "1900", "edwardian", "1910"],
    ),
    (
        ArchitecturalStyle::Georgian,
        &["georgian", "1800", "1820", "1830", "1840", "regency"],
    ),
    (
        ArchitecturalStyle::Thirties,
        &["1920", "1930", "art deco", "inter-war"],
    ),
    (
        ArchitecturalStyle::PostWar,
        &["1950", "1960", "post-war", "post war"],
    ),
    (ArchitecturalStyle::SeventiesEighties, &["1970", "1980"]),
    (
        ArchitecturalStyle::Modern,
        &["1990", "2000", "modern", "contemporary"],
    ),
];

/// Feature keywords, used when no era matched.
const FEATURE_HINTS: &[(ArchitecturalStyle, &[&str])] = &[
    (
        ArchitecturalStyle::Victorian,
        &["sash window", "bay window", "original feature", "period", "cornice", "ornate"],
    ),
    (
        ArchitecturalStyle::PostWar,
        &["pebbledash", "render", "roughcast"],
    ),
];

impl ArchitecturalStyle {
    /// Infers the style from the estimated age and issue text.
    pub fn detect(analysis: &RoomAnalysis) -> Self {
        let mut text = analysis.estimated_age.clone().unwrap_or_default();
        for issue in &analysis.issues {
            text.push(' ');
            text.push_str(issue);
        }
        let text = text.to_lowercase();

        ERA_HINTS
            .iter()
            .chain(FEATURE_HINTS)
            .find(|(_, hints)| hints.iter().any(|h| text.contains(h)))
            .map(|(style, _)| *style)
            .unwrap_or(ArchitecturalStyle::Unknown)
    }

    /// Victorian and Georgian rooms are restored rather than modernised.
    pub fn is_heritage(self) -> bool {
        matches!(self, ArchitecturalStyle::Victorian | ArchitecturalStyle::Georgian)
    }

    pub fn is_period(self) -> bool {
        self.is_heritage() || self == ArchitecturalStyle::Thirties
    }
}

impl fmt::Display for ArchitecturalStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArchitecturalStyle::Victorian => "victorian",
            ArchitecturalStyle::Georgian => "georgian",
            ArchitecturalStyle::Thirties => "1930s",
            ArchitecturalStyle::PostWar => "postwar",
            ArchitecturalStyle::SeventiesEighties => "1970s_80s",
            ArchitecturalStyle::Modern => "modern",
            ArchitecturalStyle::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for ArchitecturalStyle {
    type Err = String;

    /// Accepts the names `Display` writes, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let style = match s.trim().to_ascii_lowercase().as_str() {
            "victorian" => ArchitecturalStyle::Victorian,
            "georgian" => ArchitecturalStyle::Georgian,
            "1930s" => ArchitecturalStyle::Thirties,
            "postwar" => ArchitecturalStyle::PostWar,
            "1970s_80s" => ArchitecturalStyle::SeventiesEighties,
            "modern" => ArchitecturalStyle::Modern,
            "unknown" => ArchitecturalStyle::Unknown,
            other => return Err(format!("Unknown architectural style '{}'", other)),
        };
        Ok(style)
    }
}

fn is_outdoor(room_type: &str) -> bool {
    matches!(room_type, "exterior" | "front" | "facade" | "garden")
}

/// Improvement phrase for one renovation item, if it names a known element.
fn improvement_for(item: &str, heritage: bool) -> Option<&'static str> {
    let item = item.to_lowercase();
    let has = |w: &str| item.contains(w);

    let phrase = if has("floor") {
        if heritage {
            "restored original floorboards or period-appropriate flooring"
        } else {
            "modern engineered oak flooring"
        }
    } else if has("wall") || has("paint") {
        if heritage {
            "freshly painted walls in heritage colours"
        } else {
            "fresh white walls with a modern matte finish"
        }
    } else if has("kitchen") || has("cabinet") {
        if heritage {
            "classic shaker kitchen with traditional details"
        } else {
            "sleek contemporary white kitchen cabinets"
        }
    } else if has("bathroom") || has("suite") {
        "modern white bathroom suite with chrome fixtures"
    } else if has("window") {
        if heritage {
            "restored or sympathetically replaced sash windows"
        } else {
            "clean modern window treatments"
        }
    } else if has("light") {
        "appropriate period or contemporary lighting"
    } else if has("render") || has("facade") || has("brick") {
        if heritage {
            "cleaned and repointed original brickwork"
        } else {
            "fresh smooth render"
        }
    } else if has("door") {
        if heritage {
            "restored or period-style front door"
        } else {
            "contemporary composite front door"
        }
    } else if has("roof") {
        "clean slate or tile roof"
    } else {
        return None;
    };
    Some(phrase)
}

fn default_improvements(room_type: &str, style: ArchitecturalStyle) -> &'static [&'static str] {
    let heritage = style.is_heritage();
    match room_type {
        "kitchen" if heritage => &[
            "classic shaker cabinets",
            "wooden or stone worktops",
            "period-appropriate flooring",
        ],
        "kitchen" => &[
            "modern white shaker cabinets",
            "quartz countertops",
            "herringbone floor",
        ],
        "bathroom" | "ensuite" => &["modern white suite", "large format tiles", "chrome fixtures"],
        "bedroom" if heritage => &[
            "freshly painted walls in soft heritage colours",
            "restored flooring",
            "period lighting",
        ],
        "bedroom" => &["fresh neutral walls", "modern flooring", "contemporary lighting"],
        "living_room" if heritage => &[
            "restored period features",
            "fresh heritage colours",
            "appropriate flooring",
        ],
        "living_room" => &["fresh white walls", "engineered oak flooring", "modern fixtures"],
        "exterior" | "front" | "facade" if heritage => &[
            "cleaned and repointed brickwork",
            "restored sash windows",
            "period-appropriate front door",
            "tidy front garden",
        ],
        "exterior" | "front" | "facade" if style == ArchitecturalStyle::Thirties => &[
            "fresh render or cleaned brickwork",
            "period-style windows",
            "art deco door details",
            "neat hedging",
        ],
        "exterior" | "front" | "facade" => &[
            "fresh painted or rendered facade",
            "modern composite front door",
            "clean windows",
            "tidy front garden",
        ],
        "garden" => &["manicured lawn", "patio area", "fresh fencing", "mature planting"],
        _ => &["fresh decor", "updated flooring", "appropriate styling"],
    }
}

/// One-paragraph renovation brief for a room.
pub fn renovation_prompt(analysis: &RoomAnalysis) -> String {
    let style = ArchitecturalStyle::detect(analysis);
    let room = analysis.display_room_type().to_lowercase();

    let mut improvements: Vec<&str> = Vec::new();
    for item in analysis.renovation_items.iter().take(MAX_ITEMS) {
        if let Some(phrase) = improvement_for(&item.item, style.is_heritage()) {
            if !improvements.contains(&phrase) {
                improvements.push(phrase);
            }
        }
    }
    if improvements.is_empty() {
        improvements.extend(default_improvements(&analysis.room_type, style));
    }
    let list = improvements.join(", ");

    if is_outdoor(&analysis.room_type) {
        return if style.is_heritage() {
            format!(
                "Refresh the period exterior: {}. Preserve Victorian/Georgian character, estate agent quality.",
                list
            )
        } else if style == ArchitecturalStyle::Thirties {
            format!(
                "Refresh the 1930s exterior: {}. Preserve period character, estate agent quality.",
                list
            )
        } else {
            format!(
                "Renovate with {}. Modern kerb appeal, estate agent quality.",
                list
            )
        };
    }

    if style.is_heritage() {
        format!(
            "Transform into a beautifully renovated period {} with {}. Preserve character, bright, magazine-quality.",
            room, list
        )
    } else {
        format!(
            "Transform into a beautifully renovated {} with {}. Modern, bright, magazine-quality interior.",
            room, list
        )
    }
}

/// Wraps renovation instructions in the framing rules sent to the image
/// model, keeping the camera and layout of the original photo.
pub fn image_prompt(analysis: &RoomAnalysis, instructions: &str) -> String {
    styled_image_prompt(analysis, instructions, ArchitecturalStyle::detect(analysis))
}

/// [`image_prompt`] with the architectural style chosen by the caller
/// instead of detected from the analysis.
pub fn styled_image_prompt(
    analysis: &RoomAnalysis,
    instructions: &str,
    style: ArchitecturalStyle,
) -> String {
    let room = analysis.display_room_type().to_lowercase();
    let mut prompt = String::new();

    if is_outdoor(&analysis.room_type) {
        prompt.push_str("Renovate ONLY the CENTER property in this image.\n\n");
        prompt.push_str("Rules:\n");
        prompt.push_str("1. Do not crop, zoom, rotate or shift the image.\n");
        prompt.push_str("2. Keep neighbouring properties, the street and the background unchanged.\n");
        prompt.push_str("3. Preserve the exact camera angle, perspective and composition.\n");
        if style.is_period() {
            prompt.push_str(&format!(
                "4. Preserve the {} character: restore brickwork, windows and doors rather than modernising them.\n",
                style
            ));
        }
    } else {
        prompt.push_str(&format!("Renovate this {}.\n\n", room));
        prompt.push_str("Rules:\n");
        prompt.push_str("1. Do not crop, zoom, rotate or shift the image.\n");
        prompt.push_str("2. Keep the same camera angle, room layout and window positions.\n");
        if style.is_period() {
            prompt.push_str(
                "3. Preserve period features such as cornices, fireplaces, sash windows and picture rails.\n",
            );
        }
    }

    prompt.push_str("\nChanges:\n");
    prompt.push_str(instructions.trim());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, RenovationItem, WorkScope};

    #[test]
    fn test_detect_style_from_age_then_features() {
        let victorian = RoomAnalysis::new("kitchen", 4).with_estimated_age("Edwardian, c.1905");
        assert_eq!(ArchitecturalStyle::detect(&victorian), ArchitecturalStyle::Victorian);

        let sash = RoomAnalysis::new("bedroom", 5).with_issue("rotten sash window frames");
        assert_eq!(ArchitecturalStyle::detect(&sash), ArchitecturalStyle::Victorian);

        let pebbledash = RoomAnalysis::new("exterior", 5).with_issue("cracked pebbledash");
        assert_eq!(ArchitecturalStyle::detect(&pebbledash), ArchitecturalStyle::PostWar);

        assert_eq!(
            ArchitecturalStyle::detect(&RoomAnalysis::new("study", 6)),
            ArchitecturalStyle::Unknown
        );
    }

    #[test]
    fn test_prompt_uses_items() {
        let analysis = RoomAnalysis::new("kitchen", 4)
            .with_estimated_age("1990s")
            .with_item(RenovationItem::new(
                "Replace kitchen cabinets",
                Priority::Recommended,
                WorkScope::Replace,
            ))
            .with_item(RenovationItem::new(
                "New floor",
                Priority::Optional,
                WorkScope::Upgrade,
            ));
        assert_eq!(
            renovation_prompt(&analysis),
            "Transform into a beautifully renovated kitchen with sleek contemporary white \
             kitchen cabinets, modern engineered oak flooring. Modern, bright, magazine-quality interior."
        );
    }

    #[test]
    fn test_prompt_defaults_for_heritage_exterior() {
        let analysis = RoomAnalysis::new("exterior", 5).with_estimated_age("Victorian");
        let prompt = renovation_prompt(&analysis);
        assert!(prompt.starts_with("Refresh the period exterior: cleaned and repointed brickwork"));
    }

    #[test]
    fn test_image_prompt_keeps_instructions() {
        let analysis = RoomAnalysis::new("living_room", 6);
        let prompt = image_prompt(&analysis, "  Scandinavian minimalism  ");
        assert!(prompt.starts_with("Renovate this living room."));
        assert!(prompt.ends_with("Changes:\nScandinavian minimalism"));
    }

    #[test]
    fn test_chosen_style_overrides_detection() {
        let analysis = RoomAnalysis::new("bedroom", 6).with_estimated_age("1990s");
        assert!(!image_prompt(&analysis, "Cosy").contains("Preserve period features"));

        let victorian: ArchitecturalStyle = " Victorian ".parse().unwrap();
        let prompt = styled_image_prompt(&analysis, "Cosy", victorian);
        assert!(prompt.contains("Preserve period features"));
        assert!(prompt.ends_with("Changes:\nCosy"));
    }

    #[test]
    fn test_style_names_parse_back() {
        for style in [
            ArchitecturalStyle::Victorian,
            ArchitecturalStyle::Thirties,
            ArchitecturalStyle::SeventiesEighties,
            ArchitecturalStyle::Unknown,
        ] {
            assert_eq!(style.to_string().parse::<ArchitecturalStyle>(), Ok(style));
        }
        assert!("brutalist".parse::<ArchitecturalStyle>().is_err());
    }
}
