use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{device_login, device_logout, healthz};
use crate::state::AppState;

/// `user-center`'s HTTP listener starts unconditionally on boot and is
/// never leader-gated — only the telemetry loop inside this binary is
/// (SPEC_FULL.md §4.6, serving posture).
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/device/login", post(device_login))
        .route("/device/logout", post(device_logout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
