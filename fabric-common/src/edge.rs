//! Typed HTTP client for edge caches — an external collaborator
//! (`spec.md` §1). The fabric never implements the edge's server side,
//! only calls it.

use fabric_proto::{SegmentPayload, SongSegmentsResponse};
use log::debug;

use crate::error::FabricError;
use crate::payload;

/// `spec.md` §9 flags the URL→topology-node-id mapping as ambiguous and
/// recommends making it explicit in configuration rather than deriving
/// it from the URL. `node_id` is that explicit mapping.
#[derive(Debug, Clone)]
pub struct EdgeEndpoint {
    pub url: String,
    pub node_id: String,
}

pub struct EdgeClient<'a> {
    client: &'a reqwest::Client,
    endpoint: &'a EdgeEndpoint,
}

impl<'a> EdgeClient<'a> {
    pub fn new(client: &'a reqwest::Client, endpoint: &'a EdgeEndpoint) -> Self {
        Self { client, endpoint }
    }

    pub fn health_url(&self) -> String {
        format!("{}/healthz", self.endpoint.url.trim_end_matches('/'))
    }

    pub async fn get_segment(&self, id: &str) -> Result<Vec<u8>, FabricError> {
        let url = format!(
            "{}/segments/{id}",
            self.endpoint.url.trim_end_matches('/')
        );
        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FabricError::NotFound(id.to_string()));
        }
        let resp = resp.error_for_status()?;
        let body: SegmentPayload = resp.json().await?;
        debug!("edge {} served segment {id}", self.endpoint.node_id);
        payload::decode(&body.payload)
    }

    pub async fn get_song(&self, song_id: &str) -> Result<SongSegmentsResponse, FabricError> {
        let url = format!("{}/songs/{song_id}", self.endpoint.url.trim_end_matches('/'));
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}
