//! The predictive controller (C5): per-site shortage, per-zone
//! aggregation, convergence dispatch (SPEC_FULL.md §4.5).

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use fleet_domain::InstanceKind;
use fleet_forecast::REQUIRED_HISTORY_POINTS;
use tracing::{info, instrument, warn};

use crate::manager_client;
use crate::state::{AppState, PendingWindow};

/// Truth rows are written by `user-center`'s telemetry loop at exact
/// minute boundaries (see its own `round_to_minute`); `started_at` must
/// land on the same boundaries or `finalize_elapsed_window`'s
/// `UPDATE … WHERE date = cursor` never matches a row.
fn round_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    let epoch_secs = dt.and_utc().timestamp();
    let rounded = epoch_secs - epoch_secs.rem_euclid(60);
    chrono::DateTime::from_timestamp(rounded, 0)
        .expect("rounding down never leaves the valid timestamp range")
        .naive_utc()
}

struct SiteTick {
    site_missing: i64,
    peak: f64,
    truth_points: Vec<(NaiveDateTime, i64)>,
}

/// Steps 1.a-1.d for one (zone, site): fetch history, predict, compute
/// the site's missing-instance contribution.
#[instrument(skip(state), fields(zone_id, site_id))]
async fn site_tick(state: &AppState, zone_id: &str, site_id: &str) -> Option<SiteTick> {
    let records = state
        .ledger
        .recent_records(zone_id, site_id, REQUIRED_HISTORY_POINTS as i64)
        .await
        .map_err(|e| warn!(zone_id, site_id, "recent_records failed: {e}"))
        .ok()?;

    if records.len() < REQUIRED_HISTORY_POINTS {
        return None;
    }

    let points: Vec<(NaiveDateTime, i64)> = records.iter().map(|r| (r.date, r.demand())).collect();
    let peak = state
        .forecast
        .predict(zone_id, site_id, &points)
        .await
        .map_err(|e| warn!(zone_id, site_id, "predict failed: {e}"))
        .ok()?;

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
    let site_capacity = state.ledger.site_capacity(zone_id, site_id).await.unwrap_or(0);

    let site_missing = compute_site_missing(peak, using_edge, using_center, site_capacity);

    Some(SiteTick {
        site_missing,
        peak,
        truth_points: points,
    })
}

/// Edge capacity is consumed before central: `slack` is what the edge can
/// still absorb beyond what it's already serving, so only the remainder
/// of `unalloc` past that slack becomes a missing-instance count
/// (SPEC_FULL.md §4.5 step 1.d).
fn compute_site_missing(peak: f64, using_edge: i64, using_center: i64, site_capacity: i64) -> i64 {
    let unalloc = peak - (using_edge + using_center) as f64;
    if unalloc < 0.0 {
        return 0;
    }
    let slack = (site_capacity - using_edge) as f64;
    (unalloc - slack).max(0.0).ceil() as i64
}

/// Finalizes the prior tick's prediction window once it has elapsed,
/// writing `pred_instances` for every truth date it covered.
async fn finalize_elapsed_window(state: &AppState, zone_id: &str, window: &PendingWindow, now: NaiveDateTime) {
    let mut cursor = window.started_at;
    while cursor < now {
        if let Err(e) = state
            .ledger
            .finalize_bounce_prediction(zone_id, cursor, window.zone_peak)
            .await
        {
            warn!(zone_id, date = %cursor, "finalize_bounce_prediction failed: {e}");
        }
        cursor += chrono::Duration::minutes(1);
    }
}

/// One zone's tick: fan out over sites, aggregate, record telemetry,
/// delegate the net shortfall/surplus to the lifecycle manager.
#[instrument(skip(state, sites), fields(zone_id, n_sites = sites.len()))]
pub async fn tick(state: &AppState, zone_id: &str, sites: &[String]) {
    let now = round_to_minute(Utc::now().naive_utc());
    let tick_period = chrono::Duration::from_std(state.config.tick_period()).unwrap_or(chrono::Duration::minutes(15));

    let elapsed_window = {
        let mut pending = state.pending_windows.lock().await;
        match pending.get(zone_id) {
            Some(window) if now - window.started_at >= tick_period => pending.remove(zone_id),
            _ => None,
        }
    };
    if let Some(window) = elapsed_window {
        finalize_elapsed_window(state, zone_id, &window, now).await;
    }

    let results = futures::future::join_all(sites.iter().map(|site_id| site_tick(state, zone_id, site_id))).await;

    let mut zone_missing: i64 = 0;
    let mut zone_peak_sum = 0.0;
    let mut truth_by_date: HashMap<NaiveDateTime, i64> = HashMap::new();
    for result in results.into_iter().flatten() {
        zone_missing += result.site_missing;
        zone_peak_sum += result.peak;
        for (date, demand) in result.truth_points {
            *truth_by_date.entry(date).or_insert(0) += demand;
        }
    }

    for (date, total) in &truth_by_date {
        if let Err(e) = state.ledger.upsert_bounce_truth(zone_id, *date, *total as f64).await {
            warn!(zone_id, date = %date, "upsert_bounce_truth failed: {e}");
        }
    }

    state.pending_windows.lock().await.insert(
        zone_id.to_string(),
        PendingWindow {
            started_at: now,
            zone_peak: zone_peak_sum,
        },
    );

    let available = state.ledger.count_available_elastics(zone_id).await.unwrap_or(0);
    let delta = zone_missing - available;
    info!(zone_id, zone_missing, available, delta, "tick complete, delegating to lifecycle manager");
    manager_client::manage(state, zone_id, delta).await;
}

/// Discovers `{zone -> [site]}` and runs every zone's tick concurrently.
pub async fn run_all_zones(state: &AppState) {
    let zones = match state.ledger.list_zones().await {
        Ok(zones) => zones,
        Err(e) => {
            warn!("list_zones failed, skipping this tick: {e}");
            return;
        }
    };

    let futures = zones.iter().map(|(zone_id, sites)| tick(state, zone_id, sites));
    futures::future::join_all(futures).await;
}

#[cfg(test)]
mod tests {
    use super::{compute_site_missing, round_to_minute};
    use chrono::NaiveDateTime;

    #[test]
    fn round_to_minute_truncates_seconds() {
        let dt = NaiveDateTime::parse_from_str("2026-01-01 10:15:23", "%Y-%m-%d %H:%M:%S").unwrap();
        let expected = NaiveDateTime::parse_from_str("2026-01-01 10:15:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(round_to_minute(dt), expected);
    }

    #[test]
    fn negative_unalloc_means_no_shortage() {
        assert_eq!(compute_site_missing(50.0, 40, 20, 100), 0);
    }

    #[test]
    fn shortage_absorbed_entirely_by_edge_slack() {
        // peak 120, using 100 total, unalloc 20; edge has 80/100 capacity
        // used, so 20 slack absorbs the whole shortfall.
        assert_eq!(compute_site_missing(120.0, 80, 20, 100), 0);
    }

    #[test]
    fn shortage_beyond_edge_slack_needs_central_instances() {
        // peak 150, using 100 total, unalloc 50; edge slack is only 10
        // (capacity 100, using_edge 90), so 40 must come from the center.
        assert_eq!(compute_site_missing(150.0, 90, 10, 100), 40);
    }

    #[test]
    fn fractional_peak_rounds_up() {
        assert_eq!(compute_site_missing(100.5, 0, 0, 0), 101);
    }

    #[test]
    fn exact_capacity_match_needs_nothing() {
        assert_eq!(compute_site_missing(100.0, 60, 40, 100), 0);
    }
}
