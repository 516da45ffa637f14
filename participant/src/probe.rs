//! Neighbor probe loop (`spec.md` §4.5): every 5s, RTT-probe each
//! configured neighbor's health endpoint.

use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

const PROBE_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(PROBE_INTERVAL);
    loop {
        ticker.tick().await;
        for neighbor in &state.neighbors {
            let url = format!("{}/health", fabric_common::peer_base_url(neighbor));
            match state
                .tracker
                .measure(&state.http, reqwest::Method::GET, &url)
                .await
            {
                Ok(ms) => state.tracker.update(neighbor, ms as i64),
                Err(e) => log::debug!("neighbor probe of {neighbor} failed: {e}"),
            }
        }
    }
}
