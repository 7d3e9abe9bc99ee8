//! Abstract CRUD over pods and services (C2), grounded on the
//! `NamespacedOrchestrator` seam used by production Rust orchestration
//! controllers: callers depend on this trait, never on `kube` directly.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};

use crate::error::OrchestratorError;

#[async_trait]
pub trait OrchestratorDriver: Send + Sync {
    async fn create_pod(&self, pod: Pod) -> Result<(), OrchestratorError>;
    async fn create_service(&self, service: Service) -> Result<Service, OrchestratorError>;
    async fn get_pod(&self, name: &str) -> Result<Option<Pod>, OrchestratorError>;
    async fn get_service(&self, name: &str) -> Result<Option<Service>, OrchestratorError>;
    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, OrchestratorError>;

    /// Always deletes with `grace_period=0`. A 404 from the API is
    /// reported as `Ok(())`, matching SPEC_FULL.md §9(c).
    async fn delete_pod(&self, name: &str) -> Result<(), OrchestratorError>;
    async fn delete_service(&self, name: &str) -> Result<(), OrchestratorError>;

    /// Polls `get_pod` until `phase=Running` and condition `PodReady=True`,
    /// then confirms liveness with an HTTP health probe, up to `timeout`.
    /// Returns the pod's host IP on success.
    async fn wait_until_ready(
        &self,
        pod_name: &str,
        node_port: i32,
        timeout: Duration,
    ) -> Result<String, OrchestratorError>;

    /// `GET http://<host_ip>:<node_port>/healthz`, retried up to 3 times,
    /// 5s apart, 3s timeout each.
    async fn health_probe(&self, host_ip: &str, node_port: i32) -> Result<(), OrchestratorError>;

    /// `GET http://<host_ip>:<node_port>/getStatus`, used by `reconcile`.
    async fn get_status(&self, host_ip: &str, node_port: i32) -> Result<String, OrchestratorError>;
}
