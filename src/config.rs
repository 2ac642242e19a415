//! Runtime configuration
//!
//! Built once at startup and handed to the orchestrator. The library never
//! reads the environment by itself; the binary calls [`ScanSageConfig::from_env`].

use crate::ai::{ClassifierConfig, GeminiConfig};
use crate::error::ConfigError;
use crate::scan::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::scan::types::Organ;
use crate::scan::validator::{ScanPolicy, DEFAULT_SCAN_TYPE_TERMS};
use std::str::FromStr;
use std::time::Duration;

/// Default number of concurrent CV extractions
pub const DEFAULT_CV_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct ScanSageConfig {
    /// Maximum cached results
    pub cache_max_size: usize,

    /// Age at which a cached result expires
    pub cache_ttl: Duration,

    /// Size of the CPU-bound heatmap worker pool
    pub cv_workers: usize,

    /// Concurrent calls to the analysis service and classifier
    pub service_concurrency: usize,

    /// Organ model used when the report names none we know
    pub default_organ: Organ,

    /// Accepted scan-type substrings (lowercase)
    pub scan_type_terms: Vec<String>,

    pub gemini: GeminiConfig,
    pub classifier: ClassifierConfig,
}

impl Default for ScanSageConfig {
    fn default() -> Self {
        Self {
            cache_max_size: DEFAULT_MAX_SIZE,
            cache_ttl: DEFAULT_TTL,
            cv_workers: DEFAULT_CV_WORKERS,
            service_concurrency: (num_cpus::get() * 2).max(4),
            default_organ: Organ::Brain,
            scan_type_terms: DEFAULT_SCAN_TYPE_TERMS.iter().map(|t| t.to_string()).collect(),
            gemini: GeminiConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ScanSageConfig {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("SCANSAGE_CACHE_MAX_SIZE") {
            config.cache_max_size = parse_positive("SCANSAGE_CACHE_MAX_SIZE", &v)?;
        }
        if let Some(v) = get("SCANSAGE_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(parse_number("SCANSAGE_CACHE_TTL_SECS", &v)?);
        }
        if let Some(v) = get("SCANSAGE_CV_WORKERS") {
            config.cv_workers = parse_positive("SCANSAGE_CV_WORKERS", &v)?;
        }
        if let Some(v) = get("SCANSAGE_SERVICE_CONCURRENCY") {
            config.service_concurrency = parse_positive("SCANSAGE_SERVICE_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("SCANSAGE_DEFAULT_ORGAN") {
            config.default_organ = Organ::from_str(&v).map_err(|reason| ConfigError::InvalidValue {
                key: "SCANSAGE_DEFAULT_ORGAN",
                value: v.clone(),
                reason,
            })?;
        }

        if let Some(v) = get("GENAI_API_KEY") {
            config.gemini.api_key = v;
        }
        if let Some(v) = get("GENAI_BASE_URL") {
            config.gemini.base_url = v;
        }
        if let Some(v) = get("GENAI_MODEL") {
            config.gemini.model = v;
        }
        if let Some(v) = get("CLASSIFIER_URL") {
            config.classifier.base_url = v;
        }

        Ok(config)
    }

    /// Fails when the analysis service key is absent
    pub fn require_api_key(&self) -> Result<(), ConfigError> {
        if self.gemini.api_key.is_empty() {
            return Err(ConfigError::Missing("GENAI_API_KEY"));
        }
        Ok(())
    }

    pub fn policy(&self) -> ScanPolicy {
        ScanPolicy {
            scan_type_terms: self.scan_type_terms.clone(),
            default_organ: self.default_organ,
        }
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    let n: usize = parse_number(key, value)?;
    if n == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(n)
}
