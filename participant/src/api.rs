use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use fabric_common::error::FabricError;
use fabric_common::payload;
use fabric_proto::{RequestResult, RttSnapshot, SegmentPayload, SongDistributeResponse};

use crate::pipeline;
use crate::state::AppState;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/peers", get(peers))
        .route("/name", get(name))
        .route("/segments", post(store_segment))
        .route("/segments/{id}", get(read_segment))
        .route("/request/{id}", get(request_segment))
        .route("/songs/{id}", get(song_request))
        .route("/rtt", get(rtt))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn peers(State(state): State<Arc<AppState>>) -> String {
    state.neighbors.join(",")
}

async fn name(State(state): State<Arc<AppState>>) -> String {
    state.id.clone()
}

/// `POST /segments` — the cache-store endpoint peers push to during
/// song distribution (`spec.md` §4.5).
async fn store_segment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SegmentPayload>,
) -> impl IntoResponse {
    match payload::decode(&body.payload) {
        Ok(bytes) => {
            state.cache.put(&body.id, bytes);
            state.kick_heartbeat();
            StatusCode::CREATED
        }
        Err(e) => {
            log::warn!("rejected stored segment {}: {e}", body.id);
            StatusCode::BAD_REQUEST
        }
    }
}

/// `GET /segments/{id}` — raw cache read, no fallback to other tiers.
async fn read_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.cache.get(&id) {
        Some(bytes) => Json(SegmentPayload {
            id,
            payload: payload::encode(&bytes),
        })
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn request_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match pipeline::request_segment(&state, &id).await {
        Ok(outcome) => Json(RequestResult {
            id,
            payload: payload::encode(&outcome.payload),
            source: outcome.source,
            path: outcome.path,
            hops: outcome.hops,
            rtt_ms: outcome.rtt_ms,
            est_rtt_ms: outcome.est_rtt_ms,
        })
        .into_response(),
        Err(FabricError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            log::error!("request for {id} failed unexpectedly: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn song_request(
    State(state): State<Arc<AppState>>,
    Path(song_id): Path<String>,
) -> impl IntoResponse {
    match pipeline::distribute_song(&state, &song_id).await {
        Ok(()) => Json(SongDistributeResponse {
            status: "distributed".to_string(),
            song_id,
        })
        .into_response(),
        Err(FabricError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            log::error!("song distribution for {song_id} failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn rtt(State(state): State<Arc<AppState>>) -> Json<RttSnapshot> {
    Json(RttSnapshot {
        rtts: state.tracker.snapshot(),
        average: state.tracker.average(),
    })
}
