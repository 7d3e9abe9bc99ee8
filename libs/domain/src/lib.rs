//! Shared types for the fleet elastic-capacity controller: ledger row
//! models, the HTTP response envelope, environment configuration, and
//! the unified error type.

pub mod config;
pub mod error;
pub mod models;
pub mod response;

pub use config::{K8sConfig, ManagerConfig, MysqlConfig, PredictConfig, UserCenterConfig};
pub use error::ControllerError;
pub use models::{BounceRecord, Instance, InstanceKind, InstanceStatus, Record};
pub use response::Envelope;
