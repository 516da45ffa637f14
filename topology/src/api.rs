use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use fabric_proto::{GraphResponse, PathResponse, TopologyUpsertRequest};
use serde::Deserialize;

use crate::graph::TopologyGraph;

pub fn routes(graph: Arc<TopologyGraph>) -> Router {
    Router::new()
        .route("/peers", post(upsert_peer))
        .route("/peers/{id}", delete(remove_peer))
        .route("/graph", get(get_graph))
        .route("/path", get(get_path))
        .route("/healthz", get(healthz))
        .with_state(graph)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn upsert_peer(
    State(graph): State<Arc<TopologyGraph>>,
    Json(body): Json<TopologyUpsertRequest>,
) -> StatusCode {
    graph.upsert(
        &body.peer_id,
        body.region,
        body.rtt_ms,
        &body.neighbors,
        body.metadata,
    );
    StatusCode::NO_CONTENT
}

async fn remove_peer(State(graph): State<Arc<TopologyGraph>>, Path(id): Path<String>) -> StatusCode {
    graph.remove(&id);
    StatusCode::NO_CONTENT
}

async fn get_graph(State(graph): State<Arc<TopologyGraph>>) -> Json<GraphResponse> {
    Json(GraphResponse {
        adjacency: graph.snapshot(),
    })
}

#[derive(Deserialize)]
struct PathQuery {
    from: String,
    to: String,
}

async fn get_path(
    State(graph): State<Arc<TopologyGraph>>,
    Query(query): Query<PathQuery>,
) -> impl IntoResponse {
    match graph.path(&query.from, &query.to) {
        Ok(result) => Json(PathResponse {
            path: result.path,
            hops: result.hops,
            estimated_rtt_ms: result.estimated_rtt_ms,
        })
        .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
