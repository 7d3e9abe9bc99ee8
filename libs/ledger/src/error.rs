use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("[ledger/connection]: {0}")]
    Connection(String),

    #[error("[ledger/query]: {0}")]
    Query(#[from] sqlx::Error),

    #[error("[ledger/none-available]: no instance available for site={site_id:?}")]
    NoneAvailable { site_id: Option<String> },

    #[error("[ledger/not-bound]: device {device_id} has no bound instance")]
    NotBound { device_id: String },

    #[error("[ledger/nothing-to-release]: no available elastic rows in zone {zone_id}")]
    NothingToRelease { zone_id: String },

    #[error("[ledger/invalid-zone]: zone identifier {0:?} is not a valid table suffix")]
    InvalidZone(String),
}
