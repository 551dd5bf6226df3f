use thiserror::Error;

use crate::pipeline::PoolClosed;

/// Distinguishes failures worth another attempt from permanent ones.
pub trait Retryable {
    /// Timeouts, rate limits and unavailable upstreams are transient.
    fn is_retryable(&self) -> bool;
}

/// Listing extraction failures. Fatal to the job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Unsupported listing URL: {0}")]
    UnsupportedUrl(String),

    #[error("Extraction service unavailable: {0}")]
    Unavailable(String),

    #[error("Extraction timed out")]
    Timeout,

    #[error("Extraction rate limited")]
    RateLimited,

    #[error("Extraction rejected: {0}")]
    Rejected(String),

    #[error("Malformed listing data: {0}")]
    Malformed(String),
}

impl Retryable for ExtractionError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExtractionError::Unavailable(_) | ExtractionError::Timeout | ExtractionError::RateLimited
        )
    }
}

/// Room analysis failures. Scoped to one room.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("Analysis timed out")]
    Timeout,

    #[error("Analysis rate limited")]
    RateLimited,

    #[error("Photo rejected: {0}")]
    Rejected(String),

    #[error("Malformed analysis: {0}")]
    Malformed(String),
}

impl Retryable for AnalysisError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::Unavailable(_) | AnalysisError::Timeout | AnalysisError::RateLimited
        )
    }
}

/// Image generation failures. Scoped to one room.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Image service unavailable: {0}")]
    Unavailable(String),

    #[error("Image generation timed out")]
    Timeout,

    #[error("Image generation rate limited")]
    RateLimited,

    #[error("Generation rejected: {0}")]
    Rejected(String),

    #[error("Malformed image response: {0}")]
    Malformed(String),
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Unavailable(_)
                | GenerationError::Timeout
                | GenerationError::RateLimited
        )
    }
}

// A closed pool means the service is shutting down; retrying cannot help.

impl From<PoolClosed> for ExtractionError {
    fn from(err: PoolClosed) -> Self {
        ExtractionError::Rejected(err.to_string())
    }
}

impl From<PoolClosed> for AnalysisError {
    fn from(err: PoolClosed) -> Self {
        AnalysisError::Rejected(err.to_string())
    }
}

impl From<PoolClosed> for GenerationError {
    fn from(err: PoolClosed) -> Self {
        GenerationError::Rejected(err.to_string())
    }
}
