//! Error types for the scan pipeline.
//!
//! Per-image failures are values: the orchestrator converts every
//! [`ScanError`] into a failed outcome for that image and keeps going.

use thiserror::Error;

/// Failure of a single image's pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScanError {
    /// The bytes are not a decodable image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// A heatmap or ROI could not be encoded for transport.
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// The analysis service or the classifier failed (network, quota,
    /// malformed response, timeout).
    #[error("Service error: {0}")]
    Service(String),

    /// The parsed scan type did not look like a medical scan.
    #[error("Not a medical scan")]
    NotMedicalScan,

    /// A worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(String),

    /// The orchestrator's worker pools have been closed.
    #[error("Orchestrator is shut down")]
    ShutDown,
}

impl ScanError {
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }
}

/// Failure of a whole batch request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BatchError {
    #[error("Request contains no images and no message")]
    EmptyRequest,
}

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Missing required setting {0}")]
    Missing(&'static str),
}
