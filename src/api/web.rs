//! Status HTTP endpoints for the relay
//!
//! Endpoints:
//!   GET /api -> Static acknowledgment
//!   GET /health -> Health check
//!   GET /status -> Relay phase, pool counts and submission counters

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::ledger::RequestListener;
use crate::oracle::{OracleCoordinator, RelayPhase, RelayStatsSnapshot};

#[derive(Clone)]
pub struct RelayApiState {
    pub coordinator: Arc<OracleCoordinator>,
    pub listener: Arc<RequestListener>,
}

#[derive(Serialize)]
pub struct ApiAck {
    pub message: String,
}

#[derive(Serialize)]
pub struct RelayStatus {
    pub phase: RelayPhase,
    pub pool_total: usize,
    pub pool_usable: usize,
    pub stream_connected: bool,
    pub next_block: u64,
    pub events_received: u64,
    pub last_event_time: Option<DateTime<Utc>>,
    pub stats: RelayStatsSnapshot,
}

pub async fn get_api() -> Json<ApiAck> {
    Json(ApiAck {
        message: "Surety oracle relay".to_string(),
    })
}

pub async fn get_health() -> &'static str {
    "OK"
}

pub async fn get_status(State(state): State<RelayApiState>) -> Json<RelayStatus> {
    let (pool_usable, pool_total) = state.coordinator.pool_counts().await;

    Json(RelayStatus {
        phase: state.coordinator.phase().await,
        pool_total,
        pool_usable,
        stream_connected: state.listener.is_connected().await,
        next_block: state.listener.next_block().await,
        events_received: state.listener.events_received().await,
        last_event_time: state.listener.last_event_time().await,
        stats: state.coordinator.stats(),
    })
}

pub fn create_router(state: RelayApiState) -> Router {
    Router::new()
        .route("/api", get(get_api))
        .route("/health", get(get_health))
        .route("/status", get(get_status))
        .with_state(state)
}
