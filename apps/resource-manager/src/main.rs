//! `resource-manager`: C1 usage + C2 + C4, fronted by its own HTTP
//! listener and leader gate (SPEC_FULL.md §2, binaries).
//!
//! The leader gate here only matters for the (not-yet-implemented)
//! write paths that would be dangerous to run from two replicas at
//! once; today every handler in this binary is safe to serve from any
//! replica, so the HTTP listener starts unconditionally on boot,
//! matching `user-center`'s posture rather than `predict-controller`'s.

mod handlers;
mod lifecycle;
mod naming;
mod routes;
mod state;

use std::net::SocketAddr;

use fleet_domain::ManagerConfig;
use fleet_ledger::{LedgerClient, LedgerRepository};
use fleet_leader::{generate_identity, LeaderGate};
use fleet_orchestrator::KubeOrchestratorDriver;
use kube::Client;
use tracing::{error, info};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fleet_observability::init_tracing("resource-manager");

    let config = ManagerConfig::from_env().map_err(|e| {
        error!("config load failed: {e}");
        e
    })?;

    let local_client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to build local-cluster kube client: {e}"))?;

    let target_kubeconfig = kube::config::Kubeconfig::read_from(&config.k8s.kubeconfig_path)
        .map_err(|e| anyhow::anyhow!("failed to read KUBECONFIG_PATH {}: {e}", config.k8s.kubeconfig_path))?;
    let target_config = kube::Config::from_custom_kubeconfig(target_kubeconfig, &Default::default())
        .await
        .map_err(|e| anyhow::anyhow!("failed to build target-cluster kube config: {e}"))?;
    let target_client = Client::try_from(target_config)
        .map_err(|e| anyhow::anyhow!("failed to build target-cluster kube client: {e}"))?;

    let ledger_client = LedgerClient::connect(&config.mysql).await?;
    let ledger = LedgerRepository::new(ledger_client);
    let orchestrator =
        std::sync::Arc::new(KubeOrchestratorDriver::new(target_client, config.k8s.namespace.clone()));

    let _leader_gate = LeaderGate::spawn(
        local_client,
        config.k8s.namespace.clone(),
        "manager-lock".to_string(),
        generate_identity(),
    );

    let port = config.port;
    let state = AppState::new(ledger, orchestrator, config);
    let app = routes::build(state);

    let shutdown = fleet_observability::install_shutdown_token();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "resource-manager listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
