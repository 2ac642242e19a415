//! Collaborator seams
//!
//! The orchestrator only talks to these traits; the HTTP clients in this
//! module implement them and tests swap in scripted ones.

use crate::error::ScanError;
use crate::scan::types::{ClassificationResult, Organ};
use async_trait::async_trait;

/// Generative scan-analysis service
#[async_trait]
pub trait ScanAnalyst: Send + Sync {
    /// Free-form report on one image, nominally in the seven-field layout.
    ///
    /// When `message` is present the reply should also answer it.
    async fn analyze_scan(
        &self,
        image: &[u8],
        mime_type: &str,
        message: Option<&str>,
    ) -> Result<String, ScanError>;

    /// Text-only conversational answer
    async fn chat(&self, message: &str) -> Result<String, ScanError>;
}

/// Organ-specific tumor classifier
#[async_trait]
pub trait TumorClassifier: Send + Sync {
    async fn classify(&self, image: &[u8], organ: Organ) -> Result<ClassificationResult, ScanError>;
}
