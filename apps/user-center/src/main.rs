//! `user-center`: C6 + C8 (SPEC_FULL.md §2, binaries). The HTTP
//! listener starts immediately and unconditionally; only the telemetry
//! loop waits for this replica to win leadership.

mod handlers;
mod routes;
mod state;
mod telemetry;

use std::net::SocketAddr;

use fleet_domain::UserCenterConfig;
use fleet_ledger::{LedgerClient, LedgerRepository};
use fleet_leader::{generate_identity, LeaderGate};
use kube::Client;
use tracing::info;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fleet_observability::init_tracing("user-center");

    let config = UserCenterConfig::from_env()?;

    let local_client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to build local-cluster kube client: {e}"))?;

    let mut leader_gate = LeaderGate::spawn(
        local_client,
        config.namespace.clone(),
        "usercenter-lock".to_string(),
        generate_identity(),
    );

    let ledger = LedgerRepository::new(LedgerClient::connect(&config.mysql).await?);
    let port = config.port;
    let state = AppState::new(ledger, config);

    let shutdown = fleet_observability::install_shutdown_token();

    let telemetry_state = state.clone();
    let telemetry_shutdown = shutdown.clone();
    tokio::spawn(async move {
        leader_gate.wait_for_leadership().await;
        info!("acquired leadership, starting telemetry loop");
        tokio::select! {
            _ = telemetry::run(telemetry_state) => {},
            _ = telemetry_shutdown.cancelled() => {},
        }
    });

    let app = routes::build(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "user-center listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
