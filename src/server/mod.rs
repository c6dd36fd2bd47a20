//! Read-only HTTP status surface.
//!
//! Uses `axum`; every response is a snapshot of `EngineState`.

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::core::state::{EngineState, StateHandle};

/// Body of `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// "running", "paused" (breaker open) or "recovering"
    pub status: &'static str,
    pub daily_volume: Decimal,
    pub is_circuit_broken: bool,
    pub last_price: Option<Decimal>,
    pub last_update_time: DateTime<Utc>,
}

impl From<&EngineState> for StatusResponse {
    fn from(s: &EngineState) -> Self {
        let status = if s.is_circuit_broken {
            "paused"
        } else if s.recovery_attempts > 0 {
            "recovering"
        } else {
            "running"
        };
        Self {
            status,
            daily_volume: s.daily_volume,
            is_circuit_broken: s.is_circuit_broken,
            last_price: s.last_price,
            last_update_time: s.last_price_update_time,
        }
    }
}

pub fn router(state: StateHandle) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Serve until shutdown is broadcast.
pub async fn start_server(
    state: StateHandle,
    port: u16,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(address = %addr, "[STATUS] Starting status server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    info!("[STATUS] Status server stopped");
    Ok(())
}

/// GET /health
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /status
async fn status_handler(State(state): State<StateHandle>) -> Json<StatusResponse> {
    Json(state.read(|s| StatusResponse::from(s)).await)
}
