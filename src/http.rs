use std::time::Duration;

use crate::config;

/// Shared builder for outbound provider calls; every request carries the
/// configured timeout so a slow provider fails the call instead of hanging it.
pub fn outbound_client() -> reqwest::Client {
    let timeout = Duration::from_secs(config::config().api.http_client_timeout_secs);
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}
