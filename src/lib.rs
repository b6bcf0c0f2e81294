#![allow(dead_code)]

pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
