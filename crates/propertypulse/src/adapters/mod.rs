//! Capabilities the pipeline depends on: listing extraction, room analysis
//! and image generation.
//!
//! Each capability is a trait so the pipeline can run against remote
//! services, the offline demo implementations or scripted test fakes.

pub mod demo;
pub mod error;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AdaptersConfig;
use crate::error::ConfigError;
use crate::model::{FloorplanAnalysis, GeneratedImage, Photo, PropertyListing, RoomAnalysis};

pub use demo::{DemoExtractor, DemoVisualizer, KeywordAnalyzer};
pub use error::{AnalysisError, ExtractionError, GenerationError, Retryable};
pub use remote::{RemoteAnalyzer, RemoteClient, RemoteExtractor, RemoteVisualizer};

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<PropertyListing, ExtractionError>;
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, photo: &Photo) -> Result<RoomAnalysis, AnalysisError>;

    /// Reads total and per-room areas off a floor plan image.
    async fn analyze_floorplan(&self, reference: &str) -> Result<FloorplanAnalysis, AnalysisError>;
}

#[async_trait]
pub trait Visualizer: Send + Sync {
    async fn generate(&self, photo: &Photo, prompt: &str) -> Result<GeneratedImage, GenerationError>;
}

/// The set of adapters a pipeline runs with.
#[derive(Clone)]
pub struct Adapters {
    pub extractor: Arc<dyn Extractor>,
    pub analyzer: Arc<dyn Analyzer>,
    pub visualizer: Arc<dyn Visualizer>,
}

impl Adapters {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        analyzer: Arc<dyn Analyzer>,
        visualizer: Arc<dyn Visualizer>,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            visualizer,
        }
    }

    pub fn demo() -> Self {
        Self::new(
            Arc::new(DemoExtractor),
            Arc::new(KeywordAnalyzer),
            Arc::new(DemoVisualizer),
        )
    }

    /// Remote adapters for every configured endpoint, demo adapters for the
    /// rest.
    pub fn from_config(config: &AdaptersConfig) -> Result<Self, ConfigError> {
        let mut adapters = Self::demo();
        let any_remote = config.extraction_url.is_some()
            || config.analysis_url.is_some()
            || config.visualization_url.is_some();
        if !any_remote {
            log::info!("No adapter endpoints configured, using demo adapters");
            return Ok(adapters);
        }

        let client = Arc::new(RemoteClient::from_config(config)?);

        if let Some(endpoint) = &config.extraction_url {
            log::info!("Extraction adapter: {}", endpoint);
            adapters.extractor = Arc::new(RemoteExtractor::new(Arc::clone(&client), endpoint));
        }
        if let Some(endpoint) = &config.analysis_url {
            log::info!("Analysis adapter: {}", endpoint);
            adapters.analyzer = Arc::new(RemoteAnalyzer::new(Arc::clone(&client), endpoint));
        }
        if let Some(endpoint) = &config.visualization_url {
            log::info!("Visualization adapter: {}", endpoint);
            adapters.visualizer = Arc::new(RemoteVisualizer::new(client, endpoint));
        }

        Ok(adapters)
    }
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_uses_demo_adapters() {
        let adapters = Adapters::from_config(&AdaptersConfig::default()).unwrap();
        let listing = adapters.extractor.extract("https://example.test/1").await.unwrap();
        assert!(!listing.photos.is_empty());
    }

    #[test]
    fn test_remote_adapters_build_from_config() {
        let config = AdaptersConfig {
            analysis_url: Some("http://127.0.0.1:9/analyze".to_string()),
            ..AdaptersConfig::default()
        };
        assert!(Adapters::from_config(&config).is_ok());
    }
}
