//! The orchestrator driver (C2): abstract pod/service CRUD, readiness
//! polling, and health probing, concretely backed by the Kubernetes API.

pub mod driver;
pub mod error;
pub mod factory;
pub mod kube_driver;

pub use driver::OrchestratorDriver;
pub use error::OrchestratorError;
pub use factory::{first_node_port, pod_factory, service_factory};
pub use kube_driver::KubeOrchestratorDriver;
