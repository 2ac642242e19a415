//! Tumor classifier client
//!
//! The models live in a separate inference service. This side owns the
//! per-organ label sets and input geometry, prepares the image and turns the
//! returned scores into a [`ClassificationResult`].

use super::http_client::service_client;
use super::provider::TumorClassifier;
use crate::error::ScanError;
use crate::scan::types::{ClassificationResult, Organ};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageFormat;
use reqwest::Client;
use serde::Deserialize;
use std::io::Cursor;
use tracing::debug;

pub const DEFAULT_CLASSIFIER_URL: &str = "http://127.0.0.1:8001";

impl Organ {
    /// Class labels, in the order the organ's model scores them
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Self::Brain => &["Glioma", "Meningioma", "Pituitary Tumor", "Normal"],
            Self::Lung => &["Benign", "Malignant", "Normal"],
            Self::Breast => &["Benign", "Malignant"],
        }
    }

    /// Square input side length expected by the organ's model
    pub fn input_size(&self) -> u32 {
        match self {
            Self::Brain => 299,
            Self::Lung => 224,
            Self::Breast => 244,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub base_url: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CLASSIFIER_URL.to_string(),
        }
    }
}

/// Classifier reached over HTTP at `{base_url}/predict/{Organ}`
pub struct HttpClassifier {
    client: &'static Client,
    config: ClassifierConfig,
}

#[derive(Deserialize)]
struct PredictResponse {
    confidence_scores: Vec<f32>,
}

impl HttpClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, ScanError> {
        Ok(Self {
            client: service_client()?,
            config,
        })
    }

    fn endpoint(&self, organ: Organ) -> String {
        format!(
            "{}/predict/{}",
            self.config.base_url.trim_end_matches('/'),
            organ.as_str()
        )
    }
}

/// Decode, force RGB, resize to the organ's geometry and PNG-encode
pub fn preprocess(image: &[u8], organ: Organ) -> Result<Vec<u8>, ScanError> {
    let side = organ.input_size();
    let rgb = image::load_from_memory(image)
        .map_err(|e| ScanError::Decode(e.to_string()))?
        .to_rgb8();
    let resized = image::imageops::resize(&rgb, side, side, FilterType::CatmullRom);

    let mut buffer = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| ScanError::Encode(e.to_string()))?;
    Ok(buffer)
}

#[async_trait]
impl TumorClassifier for HttpClassifier {
    async fn classify(&self, image: &[u8], organ: Organ) -> Result<ClassificationResult, ScanError> {
        let image = image.to_vec();
        let payload = tokio::task::spawn_blocking(move || preprocess(&image, organ))
            .await
            .map_err(|e| ScanError::Worker(e.to_string()))??;

        let resp = self
            .client
            .post(self.endpoint(organ))
            .header("Content-Type", "image/png")
            .body(payload)
            .send()
            .await
            .map_err(|e| ScanError::service(format!("Classifier request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ScanError::service(format!("Classifier error ({}): {}", status, text)));
        }

        let body: PredictResponse = resp
            .json()
            .await
            .map_err(|e| ScanError::service(format!("Failed to parse classifier response: {}", e)))?;
        debug!(organ = %organ, scores = body.confidence_scores.len(), "Classifier replied");

        ClassificationResult::from_scores(organ.labels(), body.confidence_scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gray_png(w: u32, h: u32) -> Vec<u8> {
        let img = GrayImage::from_pixel(w, h, Luma([90]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_label_sets() {
        assert_eq!(Organ::Brain.labels().len(), 4);
        assert_eq!(Organ::Lung.labels(), ["Benign", "Malignant", "Normal"]);
        assert_eq!(Organ::Breast.labels(), ["Benign", "Malignant"]);
    }

    #[test]
    fn test_preprocess_matches_geometry() {
        for organ in Organ::ALL {
            let out = preprocess(&gray_png(40, 25), organ).unwrap();
            let img = image::load_from_memory(&out).unwrap();
            assert_eq!((img.width(), img.height()), (organ.input_size(), organ.input_size()));
            assert_eq!(img.color(), image::ColorType::Rgb8);
        }
    }

    #[test]
    fn test_preprocess_rejects_garbage() {
        let err = preprocess(b"nope", Organ::Lung).unwrap_err();
        assert!(matches!(err, ScanError::Decode(_)));
    }

    #[test]
    fn test_endpoint_uses_organ_name() {
        let classifier = HttpClassifier::new(ClassifierConfig {
            base_url: "http://models:8001/".to_string(),
        })
        .unwrap();
        assert_eq!(classifier.endpoint(Organ::Breast), "http://models:8001/predict/Breast");
    }

    #[test]
    fn test_scores_become_result() {
        let body: PredictResponse =
            serde_json::from_str(r#"{"confidence_scores":[0.2,0.8],"predicted_class":"ignored"}"#).unwrap();
        let result = ClassificationResult::from_scores(Organ::Breast.labels(), body.confidence_scores).unwrap();
        assert_eq!(result.predicted_class, "Malignant");
    }
}
