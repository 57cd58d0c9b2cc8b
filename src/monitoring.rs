//! Read-only status HTTP surface (SPEC_FULL.md §10), generalized from
//! the teacher's `monitoring::run_metrics_server` to `axum`.
//! Observability is not excluded by spec.md's Non-goals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

#[derive(Default)]
pub struct Metrics {
    pub sequences_emitted: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub proc_queue_depth: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Serialize)]
struct StatusResponse {
    sequences_emitted: u64,
    frames_dropped: u64,
    proc_queue_depth: u64,
}

async fn status_handler(metrics: axum::extract::State<Arc<Metrics>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        sequences_emitted: metrics.sequences_emitted.load(Ordering::Relaxed),
        frames_dropped: metrics.frames_dropped.load(Ordering::Relaxed),
        proc_queue_depth: metrics.proc_queue_depth.load(Ordering::Relaxed),
    })
}

pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new().route("/status", get(status_handler)).with_state(metrics)
}

pub async fn run_status_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let app = router(metrics);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
