//! Shared types for the scan analysis pipeline

use crate::error::ScanError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Minimum top score for a prediction to count as confident
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// One uploaded image
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Original filename (correlation and MIME guessing only)
    pub filename: String,

    /// MIME type supplied by the uploader, if any
    pub content_type: Option<String>,

    /// Raw image bytes
    pub data: Arc<[u8]>,
}

impl ScanRequest {
    pub fn new(filename: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// An empty payload is "no image at all", not a failed upload
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A batch of images plus an optional question shared by all of them
#[derive(Debug, Clone, Default)]
pub struct ScanBatch {
    pub images: Vec<ScanRequest>,
    pub message: Option<String>,
}

impl ScanBatch {
    pub fn new(images: Vec<ScanRequest>) -> Self {
        Self {
            images,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The shared message, if it has any non-whitespace content
    pub fn question(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// Organs the tumor classifier has models for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Organ {
    Brain,
    Lung,
    Breast,
}

impl Organ {
    pub const ALL: [Organ; 3] = [Self::Brain, Self::Lung, Self::Breast];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brain => "Brain",
            Self::Lung => "Lung",
            Self::Breast => "Breast",
        }
    }

    /// Case- and whitespace-insensitive match on the organ name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "brain" => Some(Self::Brain),
            "lung" => Some(Self::Lung),
            "breast" => Some(Self::Breast),
            _ => None,
        }
    }
}

impl fmt::Display for Organ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Organ {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown organ '{}' (expected brain, lung or breast)", s))
    }
}

/// Structured fields extracted from the analysis service's reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scan_type: String,
    pub organ: String,
    pub tumor_type: String,
    pub tumor_subclass: String,
    pub detailed_description: String,
    pub possible_causes: String,
    pub clinical_insights: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,

    /// Direct answer to the user's question, when the reply contained one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_response: Option<String>,
}

/// Confidence bucket of a classifier prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionStatus {
    #[serde(rename = "High Confidence")]
    HighConfidence,
    #[serde(rename = "Low Confidence")]
    LowConfidence,
}

impl PredictionStatus {
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence >= CONFIDENCE_THRESHOLD {
            Self::HighConfidence
        } else {
            Self::LowConfidence
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighConfidence => "High Confidence",
            Self::LowConfidence => "Low Confidence",
        }
    }
}

/// Tumor classifier verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_class: String,
    /// One score per label, in label order
    pub confidence_scores: Vec<f32>,
    pub confidence_level: f32,
    pub prediction_status: PredictionStatus,
}

impl ClassificationResult {
    /// Build a result from raw per-label scores.
    ///
    /// The predicted class is the first label holding the maximum score.
    pub fn from_scores(labels: &[&str], scores: Vec<f32>) -> Result<Self, ScanError> {
        if labels.is_empty() || scores.len() != labels.len() {
            return Err(ScanError::service(format!(
                "Classifier returned {} scores for {} labels",
                scores.len(),
                labels.len()
            )));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(ScanError::service("Classifier returned a non-finite score"));
        }

        let (best_idx, best) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(bi, bs), (i, s)| {
                if s > bs {
                    (i, s)
                } else {
                    (bi, bs)
                }
            });

        Ok(Self {
            predicted_class: labels[best_idx].to_string(),
            confidence_scores: scores,
            confidence_level: best,
            prediction_status: PredictionStatus::from_confidence(best),
        })
    }
}

/// Encoded image bytes (PNG). Serialized as a base64 string.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage(Vec<u8>);

impl EncodedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedImage({} bytes)", self.0.len())
    }
}

impl Serialize for EncodedImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for EncodedImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Everything produced for one successfully processed image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedArtifact {
    pub llm_analysis: AnalysisResult,
    pub tumor_prediction: Option<ClassificationResult>,
    pub heatmap: EncodedImage,
    /// `None` means no tumor-like region was found
    pub roi: Option<EncodedImage>,
}

/// Where a successful outcome came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Cache,
    Processed,
}

/// Result slot for one image of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageOutcome {
    Success {
        filename: String,
        analysis: Arc<CombinedArtifact>,
        source: ResultSource,
    },
    Failed {
        filename: String,
        error: String,
    },
}

impl ImageOutcome {
    pub fn failed(filename: impl Into<String>, error: &ScanError) -> Self {
        Self::Failed {
            filename: filename.into(),
            error: error.to_string(),
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Self::Success { filename, .. } | Self::Failed { filename, .. } => filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn source(&self) -> Option<ResultSource> {
        match self {
            Self::Success { source, .. } => Some(*source),
            Self::Failed { .. } => None,
        }
    }

    pub fn analysis(&self) -> Option<&Arc<CombinedArtifact>> {
        match self {
            Self::Success { analysis, .. } => Some(analysis),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

/// Response for a whole batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub batch_id: Uuid,

    /// Answer to the shared message (empty when there was none)
    pub message: String,

    /// Set when the text-only answer could not be produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_error: Option<String>,

    /// One entry per non-empty input image, in input order
    pub image_analysis: Vec<ImageOutcome>,
}
