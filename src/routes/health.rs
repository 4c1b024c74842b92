use axum::{extract::State, routing::get, Json, Router};
use crate::models::HealthResponse;
use crate::routes::HealthState;

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let now = chrono::Utc::now();
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: now.to_rfc3339(),
        uptime_secs: (now - state.started_at).num_seconds(),
        active_sessions: state.store.len().await,
    };

    Json(response)
}
