//! JSON-over-HTTP adapters for externally hosted extraction, vision and
//! image services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{AnalysisError, ExtractionError, GenerationError};
use super::{Analyzer, Extractor, Visualizer};
use crate::config::AdaptersConfig;
use crate::error::ConfigError;
use crate::model::{FloorplanAnalysis, GeneratedImage, Photo, PropertyListing, RoomAnalysis};

/// Longest upstream error body carried into an error message.
const MAX_ERROR_BODY: usize = 200;

/// How a remote call failed, before it is mapped to an adapter error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    Timeout,
    RateLimited,
    Unavailable(String),
    Rejected(String),
    Malformed(String),
}

impl RemoteFailure {
    fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("{} {}", status, truncate(body));
        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RemoteFailure::Timeout,
            StatusCode::TOO_MANY_REQUESTS => RemoteFailure::RateLimited,
            s if s.is_server_error() => RemoteFailure::Unavailable(detail),
            _ => RemoteFailure::Rejected(detail),
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteFailure::Timeout
        } else if err.is_connect() || err.is_request() {
            RemoteFailure::Unavailable(err.to_string())
        } else if err.is_decode() {
            RemoteFailure::Malformed(err.to_string())
        } else {
            RemoteFailure::Rejected(err.to_string())
        }
    }
}

fn truncate(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

impl From<RemoteFailure> for ExtractionError {
    fn from(failure: RemoteFailure) -> Self {
        match failure {
            RemoteFailure::Timeout => ExtractionError::Timeout,
            RemoteFailure::RateLimited => ExtractionError::RateLimited,
            RemoteFailure::Unavailable(m) => ExtractionError::Unavailable(m),
            RemoteFailure::Rejected(m) => ExtractionError::Rejected(m),
            RemoteFailure::Malformed(m) => ExtractionError::Malformed(m),
        }
    }
}

impl From<RemoteFailure> for AnalysisError {
    fn from(failure: RemoteFailure) -> Self {
        match failure {
            RemoteFailure::Timeout => AnalysisError::Timeout,
            RemoteFailure::RateLimited => AnalysisError::RateLimited,
            RemoteFailure::Unavailable(m) => AnalysisError::Unavailable(m),
            RemoteFailure::Rejected(m) => AnalysisError::Rejected(m),
            RemoteFailure::Malformed(m) => AnalysisError::Malformed(m),
        }
    }
}

impl From<RemoteFailure> for GenerationError {
    fn from(failure: RemoteFailure) -> Self {
        match failure {
            RemoteFailure::Timeout => GenerationError::Timeout,
            RemoteFailure::RateLimited => GenerationError::RateLimited,
            RemoteFailure::Unavailable(m) => GenerationError::Unavailable(m),
            RemoteFailure::Rejected(m) => GenerationError::Rejected(m),
            RemoteFailure::Malformed(m) => GenerationError::Malformed(m),
        }
    }
}

// ─── Client ─────────────────────────────────────────────────────────────────

/// Shared HTTP client with an optional bearer key.
pub struct RemoteClient {
    http: Client,
    api_key: Option<SecretString>,
}

impl RemoteClient {
    pub fn from_config(config: &AdaptersConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Validation {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(SecretString::from);
        if api_key.is_none() {
            log::debug!(
                "No API key in {}, remote adapters will call without auth",
                config.api_key_env
            );
        }

        Ok(Self { http, api_key })
    }

    async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, RemoteFailure>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.http.post(endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(RemoteFailure::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteFailure::from_status(status, &body));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| RemoteFailure::Malformed(e.to_string()))
    }
}

// ─── Adapters ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct PhotoRequest<'a> {
    label: &'a str,
    reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

impl<'a> PhotoRequest<'a> {
    fn new(photo: &'a Photo, prompt: Option<&'a str>) -> Self {
        Self {
            label: &photo.label,
            reference: &photo.reference,
            prompt,
        }
    }
}

/// Floor plans go to the analysis endpoint, tagged so the service can
/// switch prompts.
#[derive(Serialize)]
struct FloorplanRequest<'a> {
    kind: &'static str,
    reference: &'a str,
}

pub struct RemoteExtractor {
    client: Arc<RemoteClient>,
    endpoint: String,
}

impl RemoteExtractor {
    pub fn new(client: Arc<RemoteClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Extractor for RemoteExtractor {
    async fn extract(&self, url: &str) -> Result<PropertyListing, ExtractionError> {
        let mut listing: PropertyListing = self
            .client
            .post_json(&self.endpoint, &ExtractRequest { url })
            .await?;
        if listing.url.is_empty() {
            listing.url = url.to_string();
        }
        Ok(listing)
    }
}

pub struct RemoteAnalyzer {
    client: Arc<RemoteClient>,
    endpoint: String,
}

impl RemoteAnalyzer {
    pub fn new(client: Arc<RemoteClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Analyzer for RemoteAnalyzer {
    async fn analyze(&self, photo: &Photo) -> Result<RoomAnalysis, AnalysisError> {
        let analysis: RoomAnalysis = self
            .client
            .post_json(&self.endpoint, &PhotoRequest::new(photo, None))
            .await?;
        Ok(analysis.normalized())
    }

    async fn analyze_floorplan(&self, reference: &str) -> Result<FloorplanAnalysis, AnalysisError> {
        let plan: FloorplanAnalysis = self
            .client
            .post_json(
                &self.endpoint,
                &FloorplanRequest {
                    kind: "floorplan",
                    reference,
                },
            )
            .await?;
        if plan.floor_area().is_none() {
            return Err(AnalysisError::Malformed(format!(
                "Floor plan area {} is not usable",
                plan.total_sqm
            )));
        }
        Ok(plan)
    }
}

pub struct RemoteVisualizer {
    client: Arc<RemoteClient>,
    endpoint: String,
}

impl RemoteVisualizer {
    pub fn new(client: Arc<RemoteClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Visualizer for RemoteVisualizer {
    async fn generate(&self, photo: &Photo, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let image: GeneratedImage = self
            .client
            .post_json(&self.endpoint, &PhotoRequest::new(photo, Some(prompt)))
            .await?;
        if image.reference.trim().is_empty() {
            return Err(GenerationError::Malformed(
                "response carried no image reference".to_string(),
            ));
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Retryable;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            RemoteFailure::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            RemoteFailure::RateLimited
        );
        assert_eq!(
            RemoteFailure::from_status(StatusCode::REQUEST_TIMEOUT, ""),
            RemoteFailure::Timeout
        );
        assert!(matches!(
            RemoteFailure::from_status(StatusCode::BAD_GATEWAY, "upstream down"),
            RemoteFailure::Unavailable(_)
        ));
        assert!(matches!(
            RemoteFailure::from_status(StatusCode::UNPROCESSABLE_ENTITY, "not a room"),
            RemoteFailure::Rejected(_)
        ));
    }

    #[test]
    fn test_failures_map_to_retryable_adapter_errors() {
        let err: AnalysisError =
            RemoteFailure::from_status(StatusCode::SERVICE_UNAVAILABLE, "").into();
        assert!(err.is_retryable());

        let err: GenerationError = RemoteFailure::from_status(StatusCode::BAD_REQUEST, "").into();
        assert!(!err.is_retryable());

        let err: ExtractionError = RemoteFailure::Malformed("eof".into()).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_body_is_truncated() {
        let long = "x".repeat(1_000);
        assert_eq!(truncate(&long).len(), MAX_ERROR_BODY);
        assert_eq!(truncate("  short  "), "short");
    }

    #[test]
    fn test_photo_request_shape() {
        let photo = Photo::new("Kitchen", "https://img/1.jpg");
        let body = serde_json::to_value(PhotoRequest::new(&photo, None)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"label": "Kitchen", "reference": "https://img/1.jpg"})
        );

        let body = serde_json::to_value(PhotoRequest::new(&photo, Some("modern"))).unwrap();
        assert_eq!(body["prompt"], "modern");

        let body = serde_json::to_value(FloorplanRequest {
            kind: "floorplan",
            reference: "https://img/plan.png",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"kind": "floorplan", "reference": "https://img/plan.png"})
        );
    }
}
