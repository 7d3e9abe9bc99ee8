use std::sync::Arc;

use fleet_domain::ManagerConfig;
use fleet_ledger::LedgerRepository;
use fleet_orchestrator::OrchestratorDriver;

/// Explicitly-constructed application context (SPEC_FULL.md §9) passed
/// into every handler and background task, replacing module-level
/// singletons. Cheap to clone — every field is an `Arc` or already
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerRepository,
    pub orchestrator: Arc<dyn OrchestratorDriver>,
    pub config: Arc<ManagerConfig>,
}

impl AppState {
    pub fn new(
        ledger: LedgerRepository,
        orchestrator: Arc<dyn OrchestratorDriver>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            ledger,
            orchestrator,
            config: Arc::new(config),
        }
    }
}
