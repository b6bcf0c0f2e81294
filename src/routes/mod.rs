mod health;
mod practice;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let practice_routes = practice::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        crate::middleware::auth::require_auth,
    ));

    Router::new()
        .route("/health", get(health::root))
        .route("/health/live", get(health::live))
        .route("/health/info", get(health::info))
        .nest("/api/practice", practice_routes)
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found").into_response()
}
