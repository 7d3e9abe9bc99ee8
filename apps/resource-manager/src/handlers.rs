//! HTTP surface for `resource-manager`: `/instance/manage` (C4 entry
//! point) and `/bounceRate` (C3's consumer-facing readout).

use axum::extract::{Query, State};
use axum::Json;
use fleet_domain::{ControllerError, Envelope};
use serde::Deserialize;
use tracing::instrument;

use crate::lifecycle;
use crate::state::AppState;

pub async fn healthz() -> Json<Envelope<&'static str>> {
    Json(Envelope::ok("Alive"))
}

#[derive(Debug, Deserialize)]
pub struct ManageRequest {
    pub zone_id: String,
    pub missing: i64,
}

#[instrument(skip(state))]
pub async fn instance_manage(
    State(state): State<AppState>,
    Json(req): Json<ManageRequest>,
) -> Result<Json<Envelope<String>>, ControllerError> {
    if req.zone_id.trim().is_empty() {
        return Err(ControllerError::BadRequest("zone_id must not be empty".into()));
    }
    let message = lifecycle::manage(&state, &req.zone_id, req.missing).await?;
    Ok(Json(Envelope::ok(message)))
}

#[derive(Debug, Deserialize)]
pub struct BounceRateQuery {
    pub zone_id: String,
    pub start: chrono::NaiveDateTime,
    pub end: chrono::NaiveDateTime,
}

#[derive(Debug, serde::Serialize)]
pub struct BounceRateResponse {
    pub bingo_rate: f64,
    pub save_rate: f64,
}

/// `bingo_rate = bingo_count / len(samples)`, where a sample "bingos"
/// when the predicted instance count met or exceeded true demand.
/// `save_rate = 1 - sum(pred) / total_capacity`, against the fixed
/// fleet-wide capacity constant resolved from the source (`HUADONG_TOTAL`).
#[instrument(skip(state))]
pub async fn bounce_rate(
    State(state): State<AppState>,
    Query(q): Query<BounceRateQuery>,
) -> Result<Json<Envelope<BounceRateResponse>>, ControllerError> {
    let samples = state
        .ledger
        .bounce_records_between(&q.zone_id, q.start, q.end)
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?;

    if samples.is_empty() {
        return Ok(Json(Envelope::ok(BounceRateResponse {
            bingo_rate: 0.0,
            save_rate: 0.0,
        })));
    }

    let bingo_count = samples
        .iter()
        .filter(|r| r.pred_instances >= r.true_instances)
        .count();
    let bingo_rate = bingo_count as f64 / samples.len() as f64;

    let pred_sum: f64 = samples.iter().map(|r| r.pred_instances).sum();
    let save_rate = 1.0 - pred_sum / state.config.huadong_total;

    Ok(Json(Envelope::ok(BounceRateResponse { bingo_rate, save_rate })))
}
