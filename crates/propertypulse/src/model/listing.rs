use serde::{Deserialize, Serialize};

/// A single listing photo. `reference` is whatever the visualization
/// adapter can resolve: an absolute URL or a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub label: String,
    pub reference: String,
}

impl Photo {
    pub fn new(label: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reference: reference.into(),
        }
    }
}

/// Structured facts about a property, as returned by the extraction adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyListing {
    pub url: String,
    pub address: String,
    /// Asking price in whole pounds, when the listing states one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    #[serde(default)]
    pub price_text: String,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqft: Option<u32>,
    #[serde(default)]
    pub property_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floorplan: Option<String>,
}

impl PropertyListing {
    pub fn new(url: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            address: address.into(),
            price: None,
            price_text: String::new(),
            bedrooms: 0,
            bathrooms: 0,
            sqft: None,
            property_type: String::new(),
            description: String::new(),
            features: Vec::new(),
            photos: Vec::new(),
            floorplan: None,
        }
    }

    pub fn with_photos(mut self, photos: Vec<Photo>) -> Self {
        self.photos = photos;
        self
    }
}
