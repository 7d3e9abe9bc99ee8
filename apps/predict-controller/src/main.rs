//! `predict-controller`: C3 consumer + C5, the predictive capacity
//! control loop (SPEC_FULL.md §2, binaries).
//!
//! Unlike the other two binaries, this one's HTTP surface is registered
//! only after this replica wins leadership — an un-elected replica
//! answers no HTTP at all (SPEC_FULL.md §6).

mod handlers;
mod manager_client;
mod routes;
mod state;
mod tick;

use std::net::SocketAddr;

use fleet_domain::PredictConfig;
use fleet_forecast::ForecastClient;
use fleet_ledger::{LedgerClient, LedgerRepository};
use fleet_leader::{generate_identity, LeaderGate};
use kube::Client;
use tracing::info;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fleet_observability::init_tracing("predict-controller");

    let config = PredictConfig::from_env()?;

    let local_client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to build local-cluster kube client: {e}"))?;

    let mut leader_gate = LeaderGate::spawn(
        local_client,
        config.namespace.clone(),
        "predict-lock".to_string(),
        generate_identity(),
    );

    info!("waiting to acquire leadership before serving traffic");
    leader_gate.wait_for_leadership().await;
    info!("acquired leadership, starting controller");

    let ledger = LedgerRepository::new(LedgerClient::connect(&config.mysql).await?);
    let forecast = ForecastClient::new(&config.timesnet_host, config.timesnet_port, config.scale_ratio);
    let tick_period = config.tick_period();
    let port = config.port;
    let state = AppState::new(ledger, forecast, config);

    let shutdown = fleet_observability::install_shutdown_token();

    let app = routes::build();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "predict-controller listening");

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    let mut ticker = tokio::time::interval(tick_period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick::run_all_zones(&state).await;
            }
            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping tick loop");
                break;
            }
        }
    }

    let _ = server.await;
    Ok(())
}
