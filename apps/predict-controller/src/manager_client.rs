//! HTTP client side of C4's `/instance/manage` entry point. The
//! predictive controller talks to `resource-manager` over HTTP, never
//! via shared process memory (SPEC_FULL.md §2, binaries).

use fleet_domain::Envelope;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ManageRequest<'a> {
    zone_id: &'a str,
    missing: i64,
}

/// Calls `POST /instance/manage`. Failures are logged and swallowed —
/// a single zone's convergence call failing must not crash the tick
/// loop for the other zones (Transient error policy, SPEC_FULL.md §7).
#[instrument(skip(state))]
pub async fn manage(state: &AppState, zone_id: &str, missing: i64) {
    if missing == 0 {
        return;
    }
    let url = format!("{}/instance/manage", state.manager_base_url());
    let body = ManageRequest { zone_id, missing };

    let response = match state.http.post(&url).json(&body).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(zone_id, missing, "instance/manage request failed: {e}");
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let envelope = response.json::<Envelope<String>>().await.ok();
        warn!(
            zone_id,
            missing,
            %status,
            message = envelope.map(|e| e.message).unwrap_or_default(),
            "instance/manage returned an error"
        );
    }
}
