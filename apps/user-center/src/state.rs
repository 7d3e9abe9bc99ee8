use std::sync::Arc;

use fleet_domain::UserCenterConfig;
use fleet_ledger::LedgerRepository;

/// Explicitly-constructed application context for `user-center`
/// (SPEC_FULL.md §9): the device matcher (C6) and telemetry loop (C8)
/// share this rather than reaching for module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerRepository,
    pub config: Arc<UserCenterConfig>,
}

impl AppState {
    pub fn new(ledger: LedgerRepository, config: UserCenterConfig) -> Self {
        Self {
            ledger,
            config: Arc::new(config),
        }
    }
}
