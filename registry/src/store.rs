//! The segment registry's holder directory (`spec.md` §4.3).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use fabric_common::error::FabricError;
use fabric_proto::{PeerInfo, TopologyUpsertRequest};

struct ParticipantRecord {
    heartbeat_at: Instant,
    region: String,
    rtt_hint_ms: u32,
    neighbors: Vec<String>,
    segments: HashSet<String>,
}

pub struct Registry {
    participants: DashMap<String, ParticipantRecord>,
    /// segment id -> holder participant ids.
    index: DashMap<String, HashSet<String>>,
    ttl: Duration,
    topology_url: String,
    http: reqwest::Client,
}

impl Registry {
    pub fn new(ttl: Duration, topology_url: String) -> Self {
        Self {
            participants: DashMap::new(),
            index: DashMap::new(),
            ttl,
            topology_url,
            http: fabric_common::http::default_client(),
        }
    }

    fn reindex(&self, peer_id: &str, old: &HashSet<String>, new: &HashSet<String>) {
        for stale in old.difference(new) {
            if let Some(mut holders) = self.index.get_mut(stale) {
                holders.remove(peer_id);
            }
        }
        for fresh in new.difference(old) {
            self.index
                .entry(fresh.clone())
                .or_default()
                .insert(peer_id.to_string());
        }
    }

    /// `spec.md` §4.3 `announce`.
    pub async fn announce(
        &self,
        peer_id: &str,
        region: &str,
        rtt_hint_ms: u32,
        segments: &[String],
        neighbors: &[String],
    ) -> Result<(), FabricError> {
        if peer_id.is_empty() {
            return Err(FabricError::InvalidArgument("peer_id is empty".into()));
        }

        let new_segments: HashSet<String> = segments.iter().cloned().collect();
        let old_segments = {
            let mut entry = self.participants.entry(peer_id.to_string()).or_insert_with(|| {
                ParticipantRecord {
                    heartbeat_at: Instant::now(),
                    region: String::new(),
                    rtt_hint_ms: 0,
                    neighbors: Vec::new(),
                    segments: HashSet::new(),
                }
            });
            let old = entry.segments.clone();
            entry.heartbeat_at = Instant::now();
            entry.region = region.to_string();
            entry.rtt_hint_ms = rtt_hint_ms;
            entry.neighbors = neighbors.to_vec();
            entry.segments = new_segments.clone();
            old
        };
        self.reindex(peer_id, &old_segments, &new_segments);

        self.forward_to_topology(peer_id, Some(region.to_string()), Some(rtt_hint_ms), neighbors)
            .await;
        Ok(())
    }

    /// `spec.md` §4.3 `heartbeat`. Region/RTT hint untouched; segments
    /// and neighbors only change when the caller supplies them.
    pub async fn heartbeat(
        &self,
        peer_id: &str,
        segments: Option<&[String]>,
        neighbors: Option<&[String]>,
    ) -> Result<(), FabricError> {
        if peer_id.is_empty() {
            return Err(FabricError::InvalidArgument("peer_id is empty".into()));
        }

        let mut index_update: Option<(HashSet<String>, HashSet<String>)> = None;
        let (region, rtt_hint_ms, effective_neighbors) = {
            let mut entry = self.participants.entry(peer_id.to_string()).or_insert_with(|| {
                ParticipantRecord {
                    heartbeat_at: Instant::now(),
                    region: String::new(),
                    rtt_hint_ms: 0,
                    neighbors: Vec::new(),
                    segments: HashSet::new(),
                }
            });
            entry.heartbeat_at = Instant::now();
            if let Some(segs) = segments {
                if !segs.is_empty() {
                    let new_segments: HashSet<String> = segs.iter().cloned().collect();
                    let old_segments = entry.segments.clone();
                    entry.segments = new_segments.clone();
                    index_update = Some((old_segments, new_segments));
                }
            }
            if let Some(n) = neighbors {
                if !n.is_empty() {
                    entry.neighbors = n.to_vec();
                }
            }
            (entry.region.clone(), entry.rtt_hint_ms, entry.neighbors.clone())
        };

        if let Some((old, new)) = index_update {
            self.reindex(peer_id, &old, &new);
        }

        self.forward_to_topology(peer_id, Some(region), Some(rtt_hint_ms), &effective_neighbors)
            .await;
        Ok(())
    }

    /// `spec.md` §4.3 `lookup`. Drops index entries whose participant
    /// metadata has gone missing (a stale index entry, recovered
    /// silently per the §7 `Stale` error kind).
    pub fn lookup(&self, segment_id: &str, preferred_region: Option<&str>) -> Vec<PeerInfo> {
        let holders = match self.index.get(segment_id) {
            Some(set) => set.clone(),
            None => return Vec::new(),
        };

        let mut results: Vec<PeerInfo> = holders
            .iter()
            .filter_map(|id| {
                self.participants.get(id).map(|record| PeerInfo {
                    peer_id: id.clone(),
                    region: record.region.clone(),
                    rtt_ms: record.rtt_hint_ms,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            let a_match = preferred_region.is_some_and(|r| r == a.region);
            let b_match = preferred_region.is_some_and(|r| r == b.region);
            b_match
                .cmp(&a_match)
                .then(a.rtt_ms.cmp(&b.rtt_ms))
                .then(a.peer_id.cmp(&b.peer_id))
        });

        results
    }

    /// `spec.md` §4.3 `reap`, scheduled every 30s by the caller.
    pub async fn reap(&self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .participants
            .iter()
            .filter(|e| now.duration_since(e.value().heartbeat_at) > self.ttl)
            .map(|e| e.key().clone())
            .collect();

        for peer_id in expired {
            if let Some((_, record)) = self.participants.remove(&peer_id) {
                for segment in &record.segments {
                    if let Some(mut holders) = self.index.get_mut(segment) {
                        holders.remove(&peer_id);
                    }
                }
                log::info!("reaped stale participant {peer_id}");
                self.delete_from_topology(&peer_id).await;
            }
        }
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    async fn forward_to_topology(
        &self,
        peer_id: &str,
        region: Option<String>,
        rtt_ms: Option<u32>,
        neighbors: &[String],
    ) {
        let body = TopologyUpsertRequest {
            peer_id: peer_id.to_string(),
            region,
            rtt_ms,
            neighbors: neighbors.to_vec(),
            metadata: None,
        };
        let url = format!("{}/peers", self.topology_url.trim_end_matches('/'));
        if let Err(e) = self.http.post(&url).json(&body).send().await {
            log::warn!("topology forward for {peer_id} failed (will reconcile next announce): {e}");
        }
    }

    async fn delete_from_topology(&self, peer_id: &str) {
        let url = format!(
            "{}/peers/{peer_id}",
            self.topology_url.trim_end_matches('/')
        );
        if let Err(e) = self.http.delete(&url).send().await {
            log::warn!("topology delete for {peer_id} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        // Unreachable topology URL: forwards are best-effort and the
        // tests only assert on the registry's own state.
        Registry::new(Duration::from_secs(120), "http://127.0.0.1:1".to_string())
    }

    #[tokio::test]
    async fn announce_then_lookup_includes_holder() {
        let r = registry();
        r.announce("A", "eu", 10, &["song/1/0".to_string()], &[])
            .await
            .unwrap();
        let peers = r.lookup("song/1/0", None);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer_id, "A");
    }

    #[tokio::test]
    async fn announce_drops_segments_no_longer_listed() {
        let r = registry();
        r.announce("A", "eu", 10, &["s1".to_string(), "s2".to_string()], &[])
            .await
            .unwrap();
        r.announce("A", "eu", 10, &["s1".to_string()], &[]).await.unwrap();

        assert_eq!(r.lookup("s1", None).len(), 1);
        assert_eq!(r.lookup("s2", None).len(), 0);
    }

    #[tokio::test]
    async fn announce_rejects_empty_peer_id() {
        let r = registry();
        let err = r.announce("", "eu", 10, &[], &[]).await.unwrap_err();
        assert!(matches!(err, FabricError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn heartbeat_without_segments_leaves_inventory_untouched() {
        let r = registry();
        r.announce("A", "eu", 10, &["s1".to_string()], &[]).await.unwrap();
        r.heartbeat("A", None, None).await.unwrap();
        assert_eq!(r.lookup("s1", None).len(), 1);
    }

    #[tokio::test]
    async fn heartbeat_does_not_change_region_or_rtt_hint() {
        let r = registry();
        r.announce("A", "eu", 10, &[], &[]).await.unwrap();
        r.heartbeat("A", Some(&["s1".to_string()]), None).await.unwrap();
        let peers = r.lookup("s1", None);
        assert_eq!(peers[0].region, "eu");
        assert_eq!(peers[0].rtt_ms, 10);
    }

    #[tokio::test]
    async fn lookup_sorts_region_match_first_then_rtt_then_id() {
        let r = registry();
        r.announce("far", "us", 5, &["s1".to_string()], &[]).await.unwrap();
        r.announce("near", "eu", 50, &["s1".to_string()], &[]).await.unwrap();
        r.announce("also-near", "eu", 20, &["s1".to_string()], &[])
            .await
            .unwrap();

        let peers = r.lookup("s1", Some("eu"));
        let ids: Vec<&str> = peers.iter().map(|p| p.peer_id.as_str()).collect();
        assert_eq!(ids, vec!["also-near", "near", "far"]);
    }

    #[tokio::test]
    async fn lookup_of_unknown_segment_is_empty() {
        let r = registry();
        assert!(r.lookup("ghost", None).is_empty());
    }

    #[tokio::test]
    async fn reap_removes_participants_past_ttl() {
        let r = Registry::new(Duration::from_millis(10), "http://127.0.0.1:1".to_string());
        r.announce("A", "eu", 10, &["s1".to_string()], &[]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        r.reap().await;

        assert!(r.lookup("s1", None).is_empty());
        assert_eq!(r.participant_count(), 0);
    }

    #[tokio::test]
    async fn reaped_participant_can_announce_again_as_new() {
        let r = Registry::new(Duration::from_millis(10), "http://127.0.0.1:1".to_string());
        r.announce("A", "eu", 10, &["s1".to_string()], &[]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        r.reap().await;
        r.announce("A", "eu", 10, &["s2".to_string()], &[]).await.unwrap();

        assert!(r.lookup("s1", None).is_empty());
        assert_eq!(r.lookup("s2", None).len(), 1);
    }
}
