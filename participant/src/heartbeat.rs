//! Inventory publication loop (`spec.md` §4.5): timer-driven plus a
//! 1-slot non-blocking kick channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fabric_proto::{AnnounceRequest, HeartbeatRequest};
use tokio::sync::mpsc;

use crate::state::AppState;

fn effective_rtt_ms(state: &AppState) -> u32 {
    let neighbor_samples: Vec<u32> = state
        .neighbors
        .iter()
        .filter(|n| state.tracker.sample_count(n) > 0)
        .map(|n| state.tracker.get(n))
        .collect();
    if !neighbor_samples.is_empty() {
        return (neighbor_samples.iter().map(|v| *v as u64).sum::<u64>()
            / neighbor_samples.len() as u64) as u32;
    }
    if state.tracker.sample_count(&state.registry_url) > 0 {
        return state.tracker.get(&state.registry_url);
    }
    state.rtt_hint_ms
}

async fn announce(state: &AppState) -> bool {
    let body = AnnounceRequest {
        peer_id: state.id.clone(),
        room: state.room.clone(),
        region: state.region.clone(),
        rtt_ms: effective_rtt_ms(state),
        segments: state.cache.keys(),
        neighbors: state.neighbors.clone(),
    };
    let url = format!("{}/announce", state.registry_url.trim_end_matches('/'));
    let start = Instant::now();
    match state.http.post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            state
                .tracker
                .update(&state.registry_url, start.elapsed().as_millis() as i64);
            log::info!("announced to registry as {}", state.id);
            true
        }
        Ok(resp) => {
            log::warn!("announce rejected by registry: {}", resp.status());
            false
        }
        Err(e) => {
            log::warn!("announce to registry failed: {e}");
            false
        }
    }
}

async fn heartbeat(state: &AppState) {
    let body = HeartbeatRequest {
        peer_id: state.id.clone(),
        segments: Some(state.cache.keys()),
        neighbors: Some(state.neighbors.clone()),
    };
    let url = format!("{}/heartbeat", state.registry_url.trim_end_matches('/'));
    let start = Instant::now();
    match state.http.post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            state
                .tracker
                .update(&state.registry_url, start.elapsed().as_millis() as i64);
        }
        Ok(resp) => log::warn!("heartbeat rejected by registry: {}", resp.status()),
        Err(e) => log::warn!("heartbeat to registry failed: {e}"),
    }
}

/// Runs until the process exits. The first successful exchange is an
/// `announce`; every one after is a `heartbeat`. A failed announce is
/// retried as an announce on the next tick, not silently promoted to
/// a heartbeat.
pub async fn run(state: Arc<AppState>, interval_sec: u64, mut kick_rx: mpsc::Receiver<()>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_sec.max(1)));
    let mut announced = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = kick_rx.recv() => {}
        }
        if announced {
            heartbeat(&state).await;
        } else {
            announced = announce(&state).await;
        }
    }
}
