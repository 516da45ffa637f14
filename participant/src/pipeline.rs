//! The three-tier request cascade and song-distribution bootstrap
//! (`spec.md` §4.5) — the heart of the participant runtime.

use std::time::Instant;

use fabric_common::edge::{EdgeClient, EdgeEndpoint};
use fabric_common::error::FabricError;
use fabric_common::estimate::path_rtt_estimate;
use fabric_common::payload;
use fabric_proto::{PathResponse, SegmentLookupResponse, SegmentPayload, SourceTier};

use crate::state::AppState;

pub struct Outcome {
    pub payload: Vec<u8>,
    pub source: SourceTier,
    pub path: Vec<String>,
    pub hops: usize,
    pub rtt_ms: u32,
    pub est_rtt_ms: u32,
}

/// Best-effort `topology.path(self, to)`. On any transport/parse
/// failure, synthesizes the direct path `[self, to]` with hops=1, per
/// the `Unreachable` recovery rule in `spec.md` §7.
async fn topology_path(state: &AppState, to: &str, first_hop_ms: u32) -> (Vec<String>, usize, u32) {
    let url = format!(
        "{}/path?from={}&to={}",
        state.topology_url.trim_end_matches('/'),
        state.id,
        to
    );
    match state.http.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<PathResponse>().await {
            Ok(p) => return (p.path, p.hops, p.estimated_rtt_ms),
            Err(e) => log::warn!("topology path response for {to} unparsable: {e}"),
        },
        Ok(resp) => log::warn!("topology path lookup for {to} returned {}", resp.status()),
        Err(e) => log::warn!("topology path lookup for {to} failed: {e}"),
    }
    (
        vec![state.id.clone(), to.to_string()],
        1,
        path_rtt_estimate(1, first_hop_ms),
    )
}

async fn registry_lookup(state: &AppState, id: &str) -> Vec<fabric_proto::PeerInfo> {
    let url = format!(
        "{}/segments/{id}?region={}",
        state.registry_url.trim_end_matches('/'),
        state.region
    );
    match state.http.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<SegmentLookupResponse>().await
        {
            Ok(body) => body.peers,
            Err(e) => {
                log::warn!("registry lookup response for {id} unparsable: {e}");
                Vec::new()
            }
        },
        Ok(resp) => {
            log::warn!("registry lookup for {id} returned {}", resp.status());
            Vec::new()
        }
        Err(e) => {
            log::warn!("registry lookup for {id} failed: {e}");
            Vec::new()
        }
    }
}

/// Fetch a segment from a peer/edge base URL, timing the call.
/// Returns `(bytes, elapsed_ms)`.
async fn fetch_segment(
    client: &reqwest::Client,
    base_url: &str,
    id: &str,
) -> Result<(Vec<u8>, u64), FabricError> {
    let url = format!("{}/segments/{id}", base_url.trim_end_matches('/'));
    let start = Instant::now();
    let resp = client.get(&url).send().await?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(FabricError::NotFound(id.to_string()));
    }
    let resp = resp.error_for_status()?;
    let body: SegmentPayload = resp.json().await?;
    let elapsed = start.elapsed().as_millis() as u64;
    let bytes = payload::decode(&body.payload)?;
    Ok((bytes, elapsed))
}

/// Among configured edges, the one with the lowest tracked RTT.
/// Edges with no sample yet are probed once against their health
/// endpoint first (`spec.md` §4.5 tier 3).
async fn find_best_edge(state: &AppState) -> Option<EdgeEndpoint> {
    if state.edges.is_empty() {
        return None;
    }
    for edge in &state.edges {
        if state.tracker.sample_count(&edge.url) == 0 {
            let client = EdgeClient::new(&state.http, edge);
            match state
                .tracker
                .measure(&state.http, reqwest::Method::GET, &client.health_url())
                .await
            {
                Ok(ms) => state.tracker.update(&edge.url, ms as i64),
                Err(e) => log::warn!("edge probe for {} failed: {e}", edge.node_id),
            }
        }
    }
    state
        .edges
        .iter()
        .min_by_key(|e| {
            if state.tracker.sample_count(&e.url) > 0 {
                state.tracker.get(&e.url)
            } else {
                u32::MAX
            }
        })
        .cloned()
}

/// The full three-tier resolution cascade.
pub async fn request_segment(state: &AppState, id: &str) -> Result<Outcome, FabricError> {
    if let Some(bytes) = state.cache.get(id) {
        return Ok(Outcome {
            payload: bytes,
            source: SourceTier::Local,
            path: vec![state.id.clone()],
            hops: 0,
            rtt_ms: 0,
            est_rtt_ms: 0,
        });
    }

    for peer in registry_lookup(state, id).await {
        if peer.peer_id == state.id {
            continue;
        }
        let (path, hops, est_rtt_ms) = topology_path(state, &peer.peer_id, peer.rtt_ms).await;
        let base_url = fabric_common::peer_base_url(&peer.peer_id);
        match fetch_segment(&state.http, &base_url, id).await {
            Ok((bytes, elapsed)) => {
                state.tracker.update(&peer.peer_id, elapsed as i64);
                state.cache.put(id, bytes.clone());
                state.kick_heartbeat();
                return Ok(Outcome {
                    payload: bytes,
                    source: SourceTier::P2p,
                    path,
                    hops,
                    rtt_ms: elapsed as u32,
                    est_rtt_ms,
                });
            }
            Err(e) => {
                log::debug!("peer {} could not serve {id}: {e}", peer.peer_id);
                continue;
            }
        }
    }

    let Some(best) = find_best_edge(state).await else {
        return Err(FabricError::NotFound(id.to_string()));
    };
    let mut candidates = vec![best.clone()];
    candidates.extend(
        state
            .edges
            .iter()
            .filter(|e| e.node_id != best.node_id)
            .cloned(),
    );

    for edge in candidates {
        let first_hop_ms = if state.tracker.sample_count(&edge.url) > 0 {
            state.tracker.get(&edge.url)
        } else {
            state.rtt_hint_ms
        };
        let (path, hops, est_rtt_ms) = topology_path(state, &edge.node_id, first_hop_ms).await;
        match fetch_segment(&state.http, &edge.url, id).await {
            Ok((bytes, elapsed)) => {
                state.tracker.update(&edge.url, elapsed as i64);
                state.cache.put(id, bytes.clone());
                state.kick_heartbeat();
                return Ok(Outcome {
                    payload: bytes,
                    source: SourceTier::Edge,
                    path,
                    hops,
                    rtt_ms: elapsed as u32,
                    est_rtt_ms,
                });
            }
            Err(e) => {
                log::debug!("edge {} could not serve {id}: {e}", edge.node_id);
                continue;
            }
        }
    }

    Err(FabricError::NotFound(id.to_string()))
}

/// The song-request bootstrap (`spec.md` §4.5): pulls a segment list
/// from the best edge and fans it out along the topology path,
/// caching the requester's own remainder locally.
pub async fn distribute_song(state: &AppState, song_id: &str) -> Result<(), FabricError> {
    let edge = find_best_edge(state)
        .await
        .ok_or_else(|| FabricError::NotFound(song_id.to_string()))?;
    let first_hop_ms = if state.tracker.sample_count(&edge.url) > 0 {
        state.tracker.get(&edge.url)
    } else {
        state.rtt_hint_ms
    };
    let (path, _hops, _est) = topology_path(state, &edge.node_id, first_hop_ms).await;

    let client = EdgeClient::new(&state.http, &edge);
    let mut segments = client.get_song(song_id).await?.segments;
    segments.sort_by_key(|s| s.index);

    let n = segments.len();
    let l = path.len().max(1);
    let k = (n / l).max(1);

    let intermediates: &[String] = if path.len() > 2 {
        &path[1..path.len() - 1]
    } else {
        &[]
    };

    let mut consumed = 0usize;
    for node_id in intermediates {
        if consumed >= n {
            break;
        }
        let take = k.min(n - consumed);
        let chunk = &segments[consumed..consumed + take];
        for seg_ref in chunk {
            match client.get_segment(&seg_ref.id).await {
                Ok(bytes) => {
                    let push_url = format!("{}/segments", fabric_common::peer_base_url(node_id));
                    let body = SegmentPayload {
                        id: seg_ref.id.clone(),
                        payload: payload::encode(&bytes),
                    };
                    if let Err(e) = state.http.post(&push_url).json(&body).send().await {
                        log::warn!("push of {} to {node_id} failed: {e}", seg_ref.id);
                    }
                }
                Err(e) => log::warn!("fetch of {} from edge failed: {e}", seg_ref.id),
            }
        }
        consumed += take;
    }

    for seg_ref in &segments[consumed.min(n)..] {
        match client.get_segment(&seg_ref.id).await {
            Ok(bytes) => state.cache.put(&seg_ref.id, bytes),
            Err(e) => log::warn!("fetch of {} for local cache failed: {e}", seg_ref.id),
        }
    }

    state.kick_heartbeat();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_common::edge::EdgeEndpoint;
    use fabric_common::{Cache, RttTracker};
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_state(
        registry_url: String,
        topology_url: String,
        edges: Vec<EdgeEndpoint>,
    ) -> AppState {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        AppState {
            id: "A".to_string(),
            room: String::new(),
            region: "eu".to_string(),
            rtt_hint_ms: 50,
            neighbors: Vec::new(),
            cache: Cache::new(8),
            tracker: RttTracker::new(),
            http: fabric_common::http::default_client(),
            registry_url,
            topology_url,
            edges,
            heartbeat_kick: tx,
        }
    }

    /// Scenario 1 (`spec.md` §8): a cached id resolves from the local
    /// tier without touching the registry or topology.
    #[tokio::test]
    async fn local_hit_never_calls_out() {
        let state = test_state(
            "http://127.0.0.1:1".to_string(),
            "http://127.0.0.1:1".to_string(),
            Vec::new(),
        );
        state.cache.put("x", b"DATA".to_vec());

        let outcome = request_segment(&state, "x").await.unwrap();
        assert_eq!(outcome.source, SourceTier::Local);
        assert_eq!(outcome.path, vec!["A".to_string()]);
        assert_eq!(outcome.hops, 0);
        assert_eq!(outcome.rtt_ms, 0);
        assert_eq!(outcome.payload, b"DATA".to_vec());
    }

    /// Scenario 2: the registry lists a holder, topology supplies the
    /// path, and the peer serves the segment over HTTP.
    #[tokio::test]
    async fn peer_hit_resolves_via_registry_and_topology() {
        let registry = MockServer::start();
        let topology = MockServer::start();
        let peer = MockServer::start();
        let peer_id = peer.address().to_string();

        let lookup_mock = registry.mock(|when, then| {
            when.method(GET).path("/segments/x");
            then.status(200).json_body(json!({
                "segment": "x",
                "peers": [{"peer_id": peer_id, "region": "eu", "rtt_ms": 10}],
            }));
        });
        topology.mock(|when, then| {
            when.method(GET).path("/path");
            then.status(200).json_body(json!({
                "path": ["A", peer_id],
                "hops": 1,
                "estimated_rtt_ms": 10,
            }));
        });
        peer.mock(|when, then| {
            when.method(GET).path("/segments/x");
            then.status(200).json_body(json!({
                "id": "x",
                "payload": fabric_common::payload::encode(b"DATA"),
            }));
        });

        let state = test_state(registry.base_url(), topology.base_url(), Vec::new());
        let outcome = request_segment(&state, "x").await.unwrap();

        lookup_mock.assert();
        assert_eq!(outcome.source, SourceTier::P2p);
        assert_eq!(outcome.path, vec!["A".to_string(), peer_id.clone()]);
        assert_eq!(outcome.hops, 1);
        assert_eq!(outcome.payload, b"DATA".to_vec());
        assert!(state.tracker.get(&peer_id) > 0);

        // A second call now hits the freshly-populated local cache.
        let second = request_segment(&state, "x").await.unwrap();
        assert_eq!(second.source, SourceTier::Local);
    }

    /// Scenario 3: no peers hold the segment, so resolution falls
    /// through to the lowest-RTT edge.
    #[tokio::test]
    async fn edge_fallthrough_when_no_peer_holds_segment() {
        let registry = MockServer::start();
        let topology = MockServer::start();
        let edge = MockServer::start();

        registry.mock(|when, then| {
            when.method(GET).path("/segments/y");
            then.status(200)
                .json_body(json!({"segment": "y", "peers": []}));
        });
        edge.mock(|when, then| {
            when.method(GET).path("/healthz");
            then.status(200);
        });
        topology.mock(|when, then| {
            when.method(GET).path("/path");
            then.status(200).json_body(json!({
                "path": ["A", "edge-1"],
                "hops": 1,
                "estimated_rtt_ms": 20,
            }));
        });
        let seg_mock = edge.mock(|when, then| {
            when.method(GET).path("/segments/y");
            then.status(200).json_body(json!({
                "id": "y",
                "payload": fabric_common::payload::encode(b"EDGEDATA"),
            }));
        });

        let edges = vec![EdgeEndpoint {
            url: edge.base_url(),
            node_id: "edge-1".to_string(),
        }];
        let state = test_state(registry.base_url(), topology.base_url(), edges);
        let outcome = request_segment(&state, "y").await.unwrap();

        seg_mock.assert();
        assert_eq!(outcome.source, SourceTier::Edge);
        assert_eq!(outcome.path, vec!["A".to_string(), "edge-1".to_string()]);
        assert_eq!(outcome.payload, b"EDGEDATA".to_vec());
        assert!(state.tracker.get(&edge.base_url()) > 0);
    }

    /// Scenario 4: every tier exhausted surfaces `NotFound`.
    #[tokio::test]
    async fn total_miss_when_no_tier_has_the_segment() {
        let registry = MockServer::start();
        registry.mock(|when, then| {
            when.method(GET).path("/segments/z");
            then.status(200)
                .json_body(json!({"segment": "z", "peers": []}));
        });

        let state = test_state(registry.base_url(), "http://127.0.0.1:1".to_string(), Vec::new());
        let err = request_segment(&state, "z").await.unwrap_err();
        assert!(matches!(err, FabricError::NotFound(_)));
    }

    /// Scenario 6: a 10-segment song over a 5-node path distributes
    /// `k = max(1, 10/5) = 2` segments to each intermediate and keeps
    /// the remainder locally.
    #[tokio::test]
    async fn song_distribution_splits_segments_along_the_path() {
        let registry = MockServer::start();
        let topology = MockServer::start();
        let edge = MockServer::start();
        let b = MockServer::start();
        let c = MockServer::start();
        let d = MockServer::start();

        edge.mock(|when, then| {
            when.method(GET).path("/healthz");
            then.status(200);
        });
        topology.mock(|when, then| {
            when.method(GET).path("/path");
            then.status(200).json_body(json!({
                "path": ["A", b.address().to_string(), c.address().to_string(), d.address().to_string(), "edge-1"],
                "hops": 4,
                "estimated_rtt_ms": 70,
            }));
        });
        let segments: Vec<_> = (0..10)
            .map(|i| json!({"id": format!("seg-{i}"), "index": i}))
            .collect();
        edge.mock(|when, then| {
            when.method(GET).path("/songs/song1");
            then.status(200).json_body(json!({
                "song_id": "song1",
                "segments": segments,
            }));
        });
        for i in 0..10 {
            edge.mock(|when, then| {
                when.method(GET).path(format!("/segments/seg-{i}"));
                then.status(200).json_body(json!({
                    "id": format!("seg-{i}"),
                    "payload": fabric_common::payload::encode(b"S"),
                }));
            });
        }
        let store_b = b.mock(|when, then| {
            when.method(POST).path("/segments");
            then.status(201);
        });
        let store_c = c.mock(|when, then| {
            when.method(POST).path("/segments");
            then.status(201);
        });
        let store_d = d.mock(|when, then| {
            when.method(POST).path("/segments");
            then.status(201);
        });

        let edges = vec![EdgeEndpoint {
            url: edge.base_url(),
            node_id: "edge-1".to_string(),
        }];
        let state = test_state(registry.base_url(), topology.base_url(), edges);
        distribute_song(&state, "song1").await.unwrap();

        store_b.assert_hits(2);
        store_c.assert_hits(2);
        store_d.assert_hits(2);
        assert_eq!(state.cache.len(), 4);
    }
}
