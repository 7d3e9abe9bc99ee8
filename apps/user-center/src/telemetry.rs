//! Per-minute instance/login-failure recording (C8, SPEC_FULL.md §4.8).
//! Runs only when `USERCENTER_RECORD_ENABLED` is set and only on the
//! leader; the simulated clock advances by exactly one minute per tick
//! regardless of the acceleration ratio, so a compressed simulation
//! still produces a temporally-consistent series.

use chrono::{NaiveDateTime, Utc};
use fleet_domain::{InstanceKind, Record};
use futures::future::join_all;
use tracing::{info, warn};

use crate::state::AppState;

fn round_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    let epoch_secs = dt.and_utc().timestamp();
    let rounded = epoch_secs - epoch_secs.rem_euclid(60);
    chrono::DateTime::from_timestamp(rounded, 0)
        .expect("rounding down never leaves the valid timestamp range")
        .naive_utc()
}

async fn record_site(state: &AppState, zone_id: &str, site_id: &str, cur_time: NaiveDateTime) {
    let using_edge = state
        .ledger
        .count_using(zone_id, site_id, InstanceKind::Edge)
        .await
        .unwrap_or(0);
    let using_center = state
        .ledger
        .count_using(zone_id, site_id, InstanceKind::Elastic)
        .await
        .unwrap_or(0);
    let since = cur_time - chrono::Duration::minutes(1);
    let login_failures = state
        .ledger
        .count_login_failures_since(zone_id, site_id, since)
        .await
        .unwrap_or(0);

    let record = Record {
        zone_id: zone_id.to_string(),
        site_id: site_id.to_string(),
        date: cur_time,
        instances: using_edge + using_center,
        login_failures,
    };
    if let Err(e) = state.ledger.insert_record(&record).await {
        warn!(zone_id, site_id, "insert_record failed: {e}");
    }
}

pub async fn run(state: AppState) {
    if !state.config.record_enabled {
        info!("telemetry recording disabled, not starting loop");
        return;
    }

    let zones = match state.ledger.list_zones().await {
        Ok(zones) => zones,
        Err(e) => {
            warn!("telemetry: list_zones failed, loop will not start: {e}");
            return;
        }
    };

    let mut ticker = tokio::time::interval(state.config.record_period());
    let mut cur_time = round_to_minute(Utc::now().naive_utc());

    loop {
        ticker.tick().await;
        cur_time += chrono::Duration::minutes(1);

        let mut jobs = Vec::new();
        for (zone_id, sites) in &zones {
            for site_id in sites {
                jobs.push(record_site(&state, zone_id, site_id, cur_time));
            }
        }
        join_all(jobs).await;
    }
}
