use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use fabric_common::error::FabricError;
use fabric_proto::{AnnounceRequest, HeartbeatRequest, SegmentLookupResponse};
use serde::Deserialize;

use crate::store::Registry;

pub fn routes(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/announce", post(announce))
        .route("/heartbeat", post(heartbeat))
        .route("/segments/{id}", get(lookup))
        .route("/healthz", get(healthz))
        .with_state(registry)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

fn error_status(err: &FabricError) -> StatusCode {
    match err {
        FabricError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn announce(
    State(registry): State<Arc<Registry>>,
    Json(body): Json<AnnounceRequest>,
) -> impl IntoResponse {
    match registry
        .announce(&body.peer_id, &body.region, body.rtt_ms, &body.segments, &body.neighbors)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            log::warn!("announce rejected: {e}");
            error_status(&e).into_response()
        }
    }
}

async fn heartbeat(
    State(registry): State<Arc<Registry>>,
    Json(body): Json<HeartbeatRequest>,
) -> impl IntoResponse {
    match registry
        .heartbeat(&body.peer_id, body.segments.as_deref(), body.neighbors.as_deref())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            log::warn!("heartbeat rejected: {e}");
            error_status(&e).into_response()
        }
    }
}

#[derive(Deserialize)]
struct LookupQuery {
    region: Option<String>,
}

async fn lookup(
    State(registry): State<Arc<Registry>>,
    Path(id): Path<String>,
    Query(query): Query<LookupQuery>,
) -> Json<SegmentLookupResponse> {
    let peers = registry.lookup(&id, query.region.as_deref());
    Json(SegmentLookupResponse { segment: id, peers })
}
