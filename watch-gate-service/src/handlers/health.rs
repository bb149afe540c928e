use crate::services::{get_metrics, Clock};
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "watch-gate-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready once the grant store has been loaded, which happens before the
/// listener is bound.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "grants": state.store.len().await,
            "live_grants": state.store.live_count(state.clock.now()).await
        })),
    )
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
