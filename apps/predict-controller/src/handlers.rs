//! `/healthz` only — and only reachable once this replica is leader
//! (SPEC_FULL.md §6, Predict-Controller HTTP surface).

use axum::Json;
use fleet_domain::Envelope;

pub async fn healthz() -> Json<Envelope<&'static str>> {
    Json(Envelope::ok("Alive"))
}
