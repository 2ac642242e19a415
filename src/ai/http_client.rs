//! Shared HTTP Client Module
//!
//! One pooled client is built on first use and reused by every collaborator,
//! so TLS sessions and idle connections carry over between scans.

use crate::error::ScanError;
use once_cell::sync::OnceCell;
use reqwest::Client;
use std::time::Duration;

/// Timeout for a single HTTP attempt
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

static SERVICE_CLIENT: OnceCell<Client> = OnceCell::new();

/// Get the global collaborator HTTP client
///
/// The client is created on first access. Builder failures (no TLS backend)
/// surface as a service error instead of a panic.
pub fn service_client() -> Result<&'static Client, ScanError> {
    SERVICE_CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ScanError::service(format!("Failed to create HTTP client: {}", e)))
    })
}
