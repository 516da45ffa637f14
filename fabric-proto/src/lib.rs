//! Wire types shared by the participant, registry, and topology services.
//!
//! Nothing in this crate does anything — it only describes the JSON
//! shapes the three HTTP surfaces in `spec.md` §6 exchange.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Where a segment was ultimately served from, per `spec.md` §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Local,
    P2p,
    Edge,
}

/// A participant's self-reported location/cost, as returned by `lookup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_id: String,
    pub region: String,
    pub rtt_ms: u32,
}

/// `POST /announce` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceRequest {
    pub peer_id: String,
    #[serde(default)]
    pub room: String,
    pub region: String,
    pub rtt_ms: u32,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub neighbors: Vec<String>,
}

/// `POST /heartbeat` body. `segments`/`neighbors` absent means "unchanged".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeartbeatRequest {
    pub peer_id: String,
    #[serde(default)]
    pub segments: Option<Vec<String>>,
    #[serde(default)]
    pub neighbors: Option<Vec<String>>,
}

/// `GET /segments/{id}?region=<r>` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentLookupResponse {
    pub segment: String,
    pub peers: Vec<PeerInfo>,
}

/// `POST /peers` body accepted by the topology service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopologyUpsertRequest {
    pub peer_id: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub rtt_ms: Option<u32>,
    #[serde(default)]
    pub neighbors: Vec<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// `GET /graph` response: adjacency lists keyed by node id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    #[serde(flatten)]
    pub adjacency: HashMap<String, Vec<String>>,
}

/// `GET /path?from=A&to=B` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResponse {
    pub path: Vec<String>,
    pub hops: usize,
    pub estimated_rtt_ms: u32,
}

/// Shape shared by the participant's and the edge's raw segment read,
/// `GET /segments/{id}` and `POST /segments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentPayload {
    pub id: String,
    /// Base64-encoded opaque bytes.
    pub payload: String,
}

/// `GET /request/{id}` response — the outcome of the three-tier cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResult {
    pub id: String,
    pub payload: String,
    pub source: SourceTier,
    pub path: Vec<String>,
    pub hops: usize,
    pub rtt_ms: u32,
    pub est_rtt_ms: u32,
}

/// One entry of an edge's `GET /songs/{id}` segment listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongSegmentRef {
    pub id: String,
    pub index: usize,
}

/// Edge's `GET /songs/{id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongSegmentsResponse {
    pub song_id: String,
    pub segments: Vec<SongSegmentRef>,
}

/// Participant's `GET /songs/{id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongDistributeResponse {
    pub status: String,
    pub song_id: String,
}

/// `GET /rtt` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RttSnapshot {
    pub rtts: HashMap<String, u32>,
    pub average: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SourceTier::P2p).unwrap(), "\"p2p\"");
        assert_eq!(
            serde_json::to_string(&SourceTier::Local).unwrap(),
            "\"local\""
        );
    }

    #[test]
    fn heartbeat_request_defaults_facets_to_none() {
        let req: HeartbeatRequest =
            serde_json::from_str(r#"{"peer_id": "A"}"#).expect("parses");
        assert!(req.segments.is_none());
        assert!(req.neighbors.is_none());
    }
}
