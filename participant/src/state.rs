use fabric_common::edge::EdgeEndpoint;
use fabric_common::{Cache, RttTracker};
use tokio::sync::mpsc;

use crate::config::Config;

/// Shared participant state, handed to every axum handler and
/// background loop behind an `Arc` (`spec.md` §5: no lock is ever held
/// across a network call, so every field here is independently
/// synchronized).
pub struct AppState {
    pub id: String,
    pub room: String,
    pub region: String,
    pub rtt_hint_ms: u32,
    pub neighbors: Vec<String>,
    pub cache: Cache,
    pub tracker: RttTracker,
    pub http: reqwest::Client,
    pub registry_url: String,
    pub topology_url: String,
    pub edges: Vec<EdgeEndpoint>,
    pub heartbeat_kick: mpsc::Sender<()>,
}

impl AppState {
    pub fn new(cfg: &Config, heartbeat_kick: mpsc::Sender<()>) -> Self {
        Self {
            id: cfg.name.clone(),
            room: cfg.room.clone(),
            region: cfg.region.clone(),
            rtt_hint_ms: cfg.rtt_hint_ms,
            neighbors: cfg.neighbors.clone(),
            cache: Cache::new(cfg.cache_capacity),
            tracker: RttTracker::new(),
            http: fabric_common::http::default_client(),
            registry_url: cfg.tracker_url.clone(),
            topology_url: cfg.topology_url.clone(),
            edges: cfg.edge_urls.iter().map(EdgeEndpoint::from).collect(),
            heartbeat_kick,
        }
    }

    /// Non-blocking heartbeat kick: a full channel means a kick is
    /// already pending, so this one is dropped rather than queued
    /// (`spec.md` §9's 1-slot signal).
    pub fn kick_heartbeat(&self) {
        let _ = self.heartbeat_kick.try_send(());
    }
}
