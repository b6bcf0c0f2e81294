use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::engine::types::now_iso;
use crate::state::AppState;

pub async fn root(State(state): State<AppState>) -> Response {
    match state.db().ping().await {
        Ok(()) => Json(serde_json::json!({
            "status": "OK",
            "timestamp": now_iso(),
            "database": "connected",
        }))
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "DEGRADED",
                    "timestamp": now_iso(),
                    "database": "unavailable",
                })),
            )
                .into_response()
        }
    }
}

pub async fn live() -> Response {
    Json(serde_json::json!({ "status": "alive" })).into_response()
}

pub async fn info(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.uptime_seconds(),
    }))
    .into_response()
}
