//! The seven error kinds from SPEC_FULL.md §7, unified at the HTTP boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::Envelope;

/// Top-level error type returned by handlers and background loops.
///
/// Crate-local errors (`fleet_ledger::LedgerError`, `fleet_orchestrator::OrchestratorError`,
/// `fleet_forecast::ForecastError`) map into this explicitly at each call
/// site rather than through a blanket `#[from]` — a single source error
/// (e.g. `LedgerError::NothingToRelease`) can mean different
/// `ControllerError` kinds depending on which operation called it.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no instance available")]
    NoneAvailable,

    #[error("zone at capacity")]
    CapacityExhausted,

    #[error("{failed} of {total} units failed")]
    PartialLifecycle { failed: usize, total: usize },

    #[error("nothing to release")]
    NothingToRelease,

    #[error("pod did not become ready before timeout")]
    ReadinessTimeout,

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl ControllerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ControllerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ControllerError::NoneAvailable
            | ControllerError::CapacityExhausted
            | ControllerError::PartialLifecycle { .. }
            | ControllerError::NothingToRelease
            | ControllerError::ReadinessTimeout
            | ControllerError::Transient(_)
            | ControllerError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ControllerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Envelope::<()>::error(status.as_u16() as u32, self.to_string());
        (status, axum::Json(body)).into_response()
    }
}
