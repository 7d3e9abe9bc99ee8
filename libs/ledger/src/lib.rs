//! The inventory ledger (C1): authoritative per-zone instance table with
//! counting predicates and transactional allocation, backed by MySQL.

pub mod client;
pub mod error;
pub mod repository;
pub mod schema;

pub use client::LedgerClient;
pub use error::LedgerError;
pub use repository::LedgerRepository;
