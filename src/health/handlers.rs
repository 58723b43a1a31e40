use axum::{extract::State, http::StatusCode, Json};

use crate::health::status::{build_health, HealthStatus, ProbeStatus};
use crate::http::server::AppState;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(build_health(
        state.registry.all(),
        &state.dispatcher.breaker_states(),
        state.started_at.elapsed().as_secs_f64(),
        now(),
    ))
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ProbeStatus>) {
    let (code, status) = if state.registry.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    } else {
        (StatusCode::OK, "ready")
    };
    (
        code,
        Json(ProbeStatus {
            status: status.to_string(),
            timestamp: now(),
        }),
    )
}

pub async fn live() -> Json<ProbeStatus> {
    Json(ProbeStatus {
        status: "alive".to_string(),
        timestamp: now(),
    })
}
