//! HTTP surface over the live boards.
//!
//! Provides two GET endpoints:
//! - `/snapshot` — the most recently published sensor snapshot
//! - `/tags` — current tag board values
//!
//! External clients that cannot speak a plant protocol can poll these
//! instead; the boards themselves stay the source of truth.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use serde::Serialize;

use super::{SnapshotBoard, TagBoard};

/// Shared read-only state: the two boards the run updates.
pub struct AppState {
    pub snapshots: Arc<SnapshotBoard>,
    pub tags: Arc<TagBoard>,
}

/// Wire form of one published sample.
#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub tag: String,
    pub value: f64,
}

/// Wire form of a published snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub taken_at: String,
    pub samples: Vec<SampleResponse>,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/tags", get(get_tags))
        .with_state(state)
}

/// `GET /snapshot` → 200 + latest snapshot, or 404 before the first
/// qualifying flush.
async fn get_snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.snapshots.latest() {
        Some(snapshot) => {
            let body = SnapshotResponse {
                taken_at: snapshot.taken_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
                samples: snapshot
                    .samples
                    .iter()
                    .map(|s| SampleResponse {
                        tag: s.tag.clone(),
                        value: s.value,
                    })
                    .collect(),
            };
            Ok(Json(body))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// `GET /tags` → 200 + sorted tag/value pairs.
async fn get_tags(State(state): State<Arc<AppState>>) -> Json<Vec<SampleResponse>> {
    let mut pairs = state.tags.all();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    Json(
        pairs
            .into_iter()
            .map(|(tag, value)| SampleResponse { tag, value })
            .collect(),
    )
}

/// Binds to `addr` and serves the API until the process exits.
///
/// # Panics
///
/// Panics if the TCP listener cannot bind to `addr`.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"));
    eprintln!("twin API listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
