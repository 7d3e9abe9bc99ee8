//! The device matcher (C6): two form-encoded endpoints, both backed by
//! a single transactional ledger operation (SPEC_FULL.md §4.6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Form, Json};
use fleet_domain::Envelope;
use fleet_ledger::LedgerError;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::state::AppState;

pub async fn healthz() -> Json<Envelope<&'static str>> {
    Json(Envelope::ok("Alive"))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    zone_id: String,
    site_id: String,
    device_id: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    instance: fleet_domain::Instance,
}

/// `POST /device/login`. On `NoneAvailable`, also appends a
/// login-failure row before responding 500.
#[instrument(skip(state))]
pub async fn device_login(
    State(state): State<AppState>,
    Form(req): Form<LoginRequest>,
) -> (StatusCode, Json<Envelope<LoginResponse>>) {
    if req.zone_id.is_empty() || req.site_id.is_empty() || req.device_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(Envelope::error(400, "zone_id, site_id or device_id not specified")),
        );
    }

    match state
        .ledger
        .get_available_and_bind(&req.zone_id, &req.site_id, &req.device_id)
        .await
    {
        Ok(instance) => (
            StatusCode::OK,
            Json(Envelope::ok_with(0, "Succeeded to get available instance and login", LoginResponse { instance })),
        ),
        Err(e) => {
            if matches!(e, LedgerError::NoneAvailable { .. }) {
                if let Err(insert_err) = state.ledger.insert_login_failure(&req.zone_id, &req.site_id).await {
                    warn!(zone_id = %req.zone_id, site_id = %req.site_id, "failed to record login failure: {insert_err}");
                }
            }
            warn!(zone_id = %req.zone_id, site_id = %req.site_id, "login failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Envelope::error(500, e.to_string())))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    zone_id: String,
    device_id: String,
}

/// `POST /device/logout`. Returns 500 if the device is not currently
/// bound to any instance — idempotent from the orchestrator's
/// perspective, but not from the caller's.
#[instrument(skip(state))]
pub async fn device_logout(
    State(state): State<AppState>,
    Form(req): Form<LogoutRequest>,
) -> (StatusCode, Json<Envelope<()>>) {
    if req.zone_id.is_empty() || req.device_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(Envelope::error(400, "zone_id or device_id not specified")),
        );
    }

    match state.ledger.release_by_device(&req.zone_id, &req.device_id).await {
        Ok(()) => (StatusCode::OK, Json(Envelope::ok_with(0, "Device logout successfully", ()))),
        Err(e) => {
            warn!(zone_id = %req.zone_id, device_id = %req.device_id, "logout failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Envelope::error(500, e.to_string())))
        }
    }
}
