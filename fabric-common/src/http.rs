//! Outbound HTTP client construction.
//!
//! Every outbound call in the fabric must carry a bounded timeout
//! (`spec.md` §5) — built once per service and shared, rather than
//! reconstructed per call.

use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

pub fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub fn default_client() -> reqwest::Client {
    client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}
