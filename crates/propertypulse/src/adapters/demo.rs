//! Offline adapters used when no endpoint is configured.
//!
//! Every result is derived from the input alone, so runs are repeatable.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::{AnalysisError, ExtractionError, GenerationError};
use super::{Analyzer, Extractor, Visualizer};
use crate::model::{
    FloorplanAnalysis, FloorplanRoom, GeneratedImage, Photo, Priority, PropertyListing,
    RenovationItem, RoomAnalysis, WorkScope,
};

// ─── Extraction ─────────────────────────────────────────────────────────────

const DEMO_PHOTOS: &[(&str, &str)] = &[
    ("Front exterior", "demo://photos/front-exterior.jpg"),
    ("Kitchen", "demo://photos/kitchen.jpg"),
    ("Living room", "demo://photos/living-room.jpg"),
    ("Bedroom", "demo://photos/bedroom.jpg"),
    ("Bathroom", "demo://photos/bathroom.jpg"),
];

const DEMO_FLOORPLAN: &str = "demo://photos/floorplan.jpg";

/// Returns a fixed period terrace in need of modernisation for any URL.
#[derive(Debug, Default)]
pub struct DemoExtractor;

impl DemoExtractor {
    pub fn listing(url: &str) -> PropertyListing {
        let photos = DEMO_PHOTOS
            .iter()
            .map(|(label, reference)| Photo::new(*label, *reference))
            .collect();

        let mut listing =
            PropertyListing::new(url, "123 Demo Street, London, SW1A 1AA").with_photos(photos);
        listing.price = Some(450_000);
        listing.price_text = "£450,000".to_string();
        listing.bedrooms = 3;
        listing.bathrooms = 2;
        listing.sqft = Some(1_200);
        listing.floorplan = Some(DEMO_FLOORPLAN.to_string());
        listing.property_type = "Terraced House".to_string();
        listing.description = "A charming period property requiring modernisation. Original \
            fireplaces, high ceilings and a south-facing garden."
            .to_string();
        listing.features = vec![
            "Period features throughout".to_string(),
            "South-facing garden".to_string(),
            "Close to transport links".to_string(),
            "Chain free".to_string(),
            "In need of modernisation".to_string(),
        ];
        listing
    }
}

#[async_trait]
impl Extractor for DemoExtractor {
    async fn extract(&self, url: &str) -> Result<PropertyListing, ExtractionError> {
        Ok(Self::listing(url))
    }
}

// ─── Analysis ───────────────────────────────────────────────────────────────

/// A room type recognised from photo label keywords.
struct RoomPattern {
    room_type: &'static str,
    keywords: &'static [&'static str],
    condition: u8,
    issues: &'static [&'static str],
    items: &'static [(&'static str, Priority, WorkScope)],
    estimated_age: &'static str,
}

/// Checked in order; the first pattern with a matching keyword wins.
const PATTERNS: &[RoomPattern] = &[
    RoomPattern {
        room_type: "bathroom",
        keywords: &["bathroom", "ensuite", "en-suite", "shower", "wc"],
        condition: 3,
        issues: &["tired suite", "failed sealant", "signs of damp"],
        items: &[("Replace bathroom suite", Priority::Essential, WorkScope::Replace)],
        estimated_age: "1980s",
    },
    RoomPattern {
        room_type: "kitchen",
        keywords: &["kitchen", "breakfast"],
        condition: 4,
        issues: &["dated units", "worn worktops"],
        items: &[("Replace kitchen units", Priority::Recommended, WorkScope::Replace)],
        estimated_age: "1990s",
    },
    RoomPattern {
        room_type: "living_room",
        keywords: &["living", "lounge", "reception", "sitting", "family"],
        condition: 6,
        issues: &["scuffed walls"],
        items: &[("Paint walls and ceiling", Priority::Optional, WorkScope::Upgrade)],
        estimated_age: "2000s",
    },
    RoomPattern {
        room_type: "bedroom",
        keywords: &["bedroom", "nursery"],
        condition: 6,
        issues: &["worn carpet"],
        items: &[("Replace carpet flooring", Priority::Optional, WorkScope::Replace)],
        estimated_age: "2000s",
    },
    RoomPattern {
        room_type: "garden",
        keywords: &["garden", "patio", "yard"],
        condition: 5,
        issues: &["overgrown planting"],
        items: &[("Garden landscaping", Priority::Optional, WorkScope::Upgrade)],
        estimated_age: "unknown",
    },
    RoomPattern {
        room_type: "exterior",
        keywords: &["exterior", "front", "rear", "outside", "facade", "street"],
        condition: 5,
        issues: &["weathered pointing", "timber sash rot"],
        items: &[("Repoint brickwork", Priority::Recommended, WorkScope::Repair)],
        estimated_age: "1900s",
    },
    RoomPattern {
        room_type: "hallway",
        keywords: &["hall", "landing", "stair"],
        condition: 6,
        issues: &["worn stair runner"],
        items: &[],
        estimated_age: "2000s",
    },
];

/// Scores rooms from the photo label using a fixed keyword table.
#[derive(Debug, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn classify(label: &str) -> RoomAnalysis {
        let label = label.to_lowercase();
        let Some(pattern) = PATTERNS
            .iter()
            .find(|p| p.keywords.iter().any(|k| label.contains(k)))
        else {
            let mut analysis = RoomAnalysis::new("other", 6);
            analysis.reasoning = Some("No recognised room keywords in the photo label".to_string());
            return analysis.normalized();
        };

        let mut analysis = RoomAnalysis::new(pattern.room_type, pattern.condition)
            .with_estimated_age(pattern.estimated_age);
        for issue in pattern.issues {
            analysis = analysis.with_issue(*issue);
        }
        for (item, priority, scope) in pattern.items {
            analysis = analysis.with_item(RenovationItem::new(*item, *priority, *scope));
        }
        analysis.reasoning = Some(format!(
            "Photo label matches {} keywords",
            pattern.room_type.replace('_', " ")
        ));
        analysis.normalized()
    }
}

#[async_trait]
impl Analyzer for KeywordAnalyzer {
    async fn analyze(&self, photo: &Photo) -> Result<RoomAnalysis, AnalysisError> {
        Ok(Self::classify(&photo.label))
    }

    /// No image is read: every plan measures as the demo terrace.
    async fn analyze_floorplan(&self, _reference: &str) -> Result<FloorplanAnalysis, AnalysisError> {
        let mut plan = FloorplanAnalysis::new(108.0);
        plan.rooms = [
            ("Kitchen", "4.2m x 3.1m", 13.0),
            ("Living Room", "5.0m x 4.1m", 20.5),
            ("Bedroom 1", "4.0m x 3.5m", 14.0),
            ("Bathroom", "2.4m x 2.0m", 4.8),
        ]
        .into_iter()
        .map(|(name, dimensions, sqm)| FloorplanRoom {
            name: name.to_string(),
            dimensions: Some(dimensions.to_string()),
            sqm: Some(sqm),
        })
        .collect();
        plan.layout_notes = Some("Separate kitchen could open onto the living room".to_string());
        Ok(plan)
    }
}

// ─── Visualization ──────────────────────────────────────────────────────────

/// Returns a stable render reference derived from photo and prompt.
#[derive(Debug, Default)]
pub struct DemoVisualizer;

impl DemoVisualizer {
    pub fn render_reference(photo: &Photo, prompt: &str) -> String {
        let slug: String = photo
            .label
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let seed = format!("{}\n{}", photo.reference, prompt);
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes());
        format!("demo://renders/{}-{}.png", slug.trim_matches('-'), id.simple())
    }
}

#[async_trait]
impl Visualizer for DemoVisualizer {
    async fn generate(&self, photo: &Photo, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::Rejected("empty prompt".to_string()));
        }
        let mut image = GeneratedImage::new(Self::render_reference(photo, prompt));
        image.mime_type = Some("image/png".to_string());
        Ok(image)
    }
}
