//! Gemini API Client
//!
//! Talks to the `generateContent` REST endpoint for:
//! - Scan image analysis (inline base64 image plus the field prompt)
//! - Text-only questions
//! - Rate limiting and retry on 429 / transport failures

use super::http_client::service_client;
use super::prompts::{build_chat_prompt, build_scan_prompt};
use super::provider::ScanAnalyst;
use crate::error::ScanError;
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_concurrent_requests: usize,
    pub requests_per_second: f32,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_concurrent_requests: 8,
            requests_per_second: 5.0,
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

/// Gemini client with rate limiting
pub struct GeminiClient {
    client: &'static Client,
    config: GeminiConfig,
    rate_limiter: RateLimiter,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ScanError> {
        let rate_limiter = RateLimiter::new(
            config.max_concurrent_requests,
            config.requests_per_second,
        );

        Ok(Self {
            client: service_client()?,
            config,
            rate_limiter,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, ScanError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
        };

        let _permit = self.rate_limiter.acquire().await?;
        let started = Instant::now();
        let response = self.send_request(&request).await?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Gemini call finished");

        response.into_text()
    }

    /// Send request with retry logic
    async fn send_request(&self, request: &GenerateRequest) -> Result<GenerateResponse, ScanError> {
        let mut retry_delay = self.config.initial_backoff;
        let max_retries = self.config.max_retries;

        for retry in 0..=max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let resp = self
                .client
                .post(self.endpoint())
                .header("x-goog-api-key", &self.config.api_key)
                .json(request)
                .send()
                .await;

            match resp {
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if retry == max_retries {
                        return Err(ScanError::service(format!(
                            "Rate limited after {} retries",
                            max_retries
                        )));
                    }
                    warn!("Rate limited, retry {}/{}", retry + 1, max_retries);
                    continue;
                }
                Ok(r) if r.status().is_success() => {
                    return r
                        .json()
                        .await
                        .map_err(|e| ScanError::service(format!("Failed to parse response: {}", e)));
                }
                Ok(r) => {
                    let status = r.status();
                    let text = r.text().await.unwrap_or_default();
                    return Err(ScanError::service(format!("API error ({}): {}", status, text)));
                }
                Err(e) => {
                    if retry == max_retries {
                        return Err(ScanError::service(format!(
                            "Request failed after retries: {}",
                            e
                        )));
                    }
                    warn!("Request failed, retry {}/{}: {}", retry + 1, max_retries, e);
                    continue;
                }
            }
        }

        Err(ScanError::service("Max retries exceeded"))
    }
}

#[async_trait]
impl ScanAnalyst for GeminiClient {
    async fn analyze_scan(
        &self,
        image: &[u8],
        mime_type: &str,
        message: Option<&str>,
    ) -> Result<String, ScanError> {
        let parts = vec![
            Part::inline_image(mime_type, image),
            Part::text(build_scan_prompt(message)),
        ];
        self.generate(parts).await
    }

    async fn chat(&self, message: &str) -> Result<String, ScanError> {
        self.generate(vec![Part::text(build_chat_prompt(message))]).await
    }
}

/// Concurrency cap plus minimum spacing between request starts
struct RateLimiter {
    semaphore: Semaphore,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(max_concurrent: usize, requests_per_second: f32) -> Self {
        let min_interval = if requests_per_second > 0.0 {
            Duration::from_secs_f32(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            semaphore: Semaphore::new(max_concurrent.max(1)),
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait for a slot; the permit is held for the whole request
    async fn acquire(&self) -> Result<SemaphorePermit<'_>, ScanError> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ScanError::ShutDown)?;

        let wait_time = {
            let mut last = self.last_request.lock().await;
            let wait = match *last {
                Some(prev) => self.min_interval.saturating_sub(prev.elapsed()),
                None => Duration::ZERO,
            };
            *last = Some(Instant::now() + wait);
            wait
        };

        if !wait_time.is_zero() {
            tokio::time::sleep(wait_time).await;
        }
        Ok(permit)
    }
}

// API request/response types

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    fn inline_image(mime_type: &str, data: &[u8]) -> Self {
        Self::Inline {
            inline_data: InlineData {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            },
        }
    }
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate
    fn into_text(self) -> Result<String, ScanError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(ScanError::service(format!("No response from Gemini: {}", reason)));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(ScanError::service("Gemini returned no text"));
        }
        Ok(text)
    }
}
