use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::scheduler::SchedulerStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ClientSummary {
    pub enabled: bool,
    pub tracked_clients: usize,
    pub limit: u32,
    pub window_ms: u64,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_queue(State(state): State<AppState>) -> Json<SchedulerStats> {
    Json(state.scheduler.stats())
}

pub async fn get_clients(State(state): State<AppState>) -> Json<ClientSummary> {
    let limiter = &state.limiter;
    Json(ClientSummary {
        enabled: limiter.is_enabled(),
        tracked_clients: limiter.tracked_clients(),
        limit: limiter.max_requests(),
        window_ms: limiter.window().as_millis() as u64,
    })
}
