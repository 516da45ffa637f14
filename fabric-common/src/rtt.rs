//! Per-endpoint smoothed round-trip tracker (`spec.md` §4.2).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use reqwest::Method;

use crate::error::FabricError;

const SMOOTHING_ALPHA: f64 = 0.3;

struct Entry {
    ms: u32,
    samples: u64,
}

/// Reads (`get`/`average`) take the read side, updates take the write
/// side — no ordering guarantee across endpoints, matching `spec.md`.
pub struct RttTracker {
    table: RwLock<HashMap<String, Entry>>,
}

impl Default for RttTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RttTracker {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Issue an HTTP request and report wall-clock elapsed milliseconds
    /// from send to a fully-read response body. Propagates transport
    /// errors; does not update the tracker itself — callers feed the
    /// result into `update` once they know which endpoint key to use.
    pub async fn measure(
        &self,
        client: &reqwest::Client,
        method: Method,
        url: &str,
    ) -> crate::error::Result<u64> {
        let start = Instant::now();
        let resp = client
            .request(method, url)
            .send()
            .await
            .map_err(FabricError::TransportError)?;
        let resp = resp.error_for_status().map_err(FabricError::TransportError)?;
        let _ = resp.bytes().await.map_err(FabricError::TransportError)?;
        Ok(start.elapsed().as_millis() as u64)
    }

    /// EMA update with `alpha = 0.3`. Non-positive samples are ignored.
    pub fn update(&self, endpoint: &str, sample_ms: i64) {
        if sample_ms <= 0 {
            return;
        }
        let sample_ms = sample_ms as u32;
        let mut table = self.table.write().unwrap();
        match table.get_mut(endpoint) {
            Some(entry) => {
                entry.ms = (SMOOTHING_ALPHA * sample_ms as f64
                    + (1.0 - SMOOTHING_ALPHA) * entry.ms as f64)
                    .round() as u32;
                entry.samples += 1;
            }
            None => {
                table.insert(
                    endpoint.to_string(),
                    Entry {
                        ms: sample_ms,
                        samples: 1,
                    },
                );
            }
        }
    }

    /// Current smoothed value, or 0 if the endpoint is unseen.
    pub fn get(&self, endpoint: &str) -> u32 {
        self.table
            .read()
            .unwrap()
            .get(endpoint)
            .map(|e| e.ms)
            .unwrap_or(0)
    }

    pub fn sample_count(&self, endpoint: &str) -> u64 {
        self.table
            .read()
            .unwrap()
            .get(endpoint)
            .map(|e| e.samples)
            .unwrap_or(0)
    }

    /// Mean over all currently tracked endpoints, 0 if empty.
    pub fn average(&self) -> u32 {
        let table = self.table.read().unwrap();
        if table.is_empty() {
            return 0;
        }
        let sum: u64 = table.values().map(|e| e.ms as u64).sum();
        (sum / table.len() as u64) as u32
    }

    /// Snapshot of every tracked endpoint's smoothed value, for `/rtt`.
    pub fn snapshot(&self) -> HashMap<String, u32> {
        self.table
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.ms))
            .collect()
    }
}
