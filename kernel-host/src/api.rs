//! Read-only HTTP surface: `/healthz`, `/metrics`, `/state`, `/stop_info`.
//! Mirrors the teacher's `api.rs` combined metrics+status server, but
//! every handler here is a pure peek — no handler ever touches the
//! dispatcher's write path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use bridge_kernel::state::BridgeState;
use eyre::Result;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct ApiState {
    pub kernel: Arc<Mutex<BridgeState>>,
}

#[derive(Serialize)]
struct StateSummary {
    stopped: bool,
    next_nonce: u64,
    nock_next_height: u64,
    base_next_height: u64,
    base_hold_pending: bool,
    nock_hold_pending: bool,
}

pub async fn serve(addr: SocketAddr, state: ApiState) -> Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/state", get(state_summary))
        .route("/stop_info", get(stop_info))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    (
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
}

async fn state_summary(State(state): State<ApiState>) -> Json<StateSummary> {
    let kernel = state.kernel.lock().await;
    Json(StateSummary {
        stopped: kernel.stop.is_some(),
        next_nonce: kernel.next_nonce,
        nock_next_height: kernel.hash_state.nock_next_height,
        base_next_height: kernel.hash_state.base_next_height,
        base_hold_pending: kernel.hash_state.base_hold.is_some(),
        nock_hold_pending: kernel.hash_state.nock_hold.is_some(),
    })
}

async fn stop_info(State(state): State<ApiState>) -> Json<bridge_kernel::types::StopInfo> {
    let kernel = state.kernel.lock().await;
    Json(kernel.stop_info())
}
