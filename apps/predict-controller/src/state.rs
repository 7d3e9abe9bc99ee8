use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use fleet_domain::PredictConfig;
use fleet_forecast::ForecastClient;
use fleet_ledger::LedgerRepository;
use tokio::sync::Mutex;

/// The previous tick's zone-level prediction, held until its window
/// elapses and it can be written back as `pred_instances`
/// (SPEC_FULL.md §4.5 step 3).
#[derive(Clone, Copy)]
pub struct PendingWindow {
    pub started_at: NaiveDateTime,
    pub zone_peak: f64,
}

/// Explicitly-constructed application context for `predict-controller`
/// (SPEC_FULL.md §9). One instance is built after this replica wins
/// leadership and shared between the tick loop and the `/healthz`
/// handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerRepository,
    pub forecast: ForecastClient,
    pub http: reqwest::Client,
    pub config: Arc<PredictConfig>,
    pub pending_windows: Arc<Mutex<HashMap<String, PendingWindow>>>,
}

impl AppState {
    pub fn new(ledger: LedgerRepository, forecast: ForecastClient, config: PredictConfig) -> Self {
        Self {
            ledger,
            forecast,
            http: reqwest::Client::new(),
            config: Arc::new(config),
            pending_windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn manager_base_url(&self) -> String {
        format!("http://{}:{}", self.config.manager_host, self.config.manager_port)
    }
}
