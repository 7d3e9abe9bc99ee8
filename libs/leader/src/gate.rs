//! Kubernetes `Lease`-based leader election (C7), hand-rolled atop the
//! `kube` crate's typed API rather than a third-party leader-election
//! crate — see DESIGN.md for why. Mirrors `client-go`'s
//! `leaderelection.RunOrDie`: lease duration 15s, renew deadline 10s,
//! retry period 2s, fatal exit on loss of leadership.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::LeaderError;

const LEASE_DURATION: Duration = Duration::from_secs(15);
const RENEW_DEADLINE: Duration = Duration::from_secs(10);
const RETRY_PERIOD: Duration = Duration::from_secs(2);

/// Handle to a running leader-election loop. Clone freely; `is_leader`
/// reflects the latest election outcome observed by the background task.
#[derive(Clone)]
pub struct LeaderGate {
    leader_rx: watch::Receiver<bool>,
}

impl LeaderGate {
    /// Spawns the election loop against `lease_name` in `namespace` using
    /// `client` (always the local/host cluster client, never the target
    /// cluster). `identity` should be unique per process (a UUID is fine).
    pub fn spawn(client: Client, namespace: String, lease_name: String, identity: String) -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(run_election_loop(client, namespace, lease_name, identity, tx));
        Self { leader_rx: rx }
    }

    pub fn is_leader(&self) -> bool {
        *self.leader_rx.borrow()
    }

    /// Resolves once this replica transitions to leader. Callers that
    /// gate an entire HTTP listener on leadership (`predict-controller`)
    /// await this before binding.
    pub async fn wait_for_leadership(&mut self) {
        loop {
            if *self.leader_rx.borrow() {
                return;
            }
            if self.leader_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

async fn run_election_loop(
    client: Client,
    namespace: String,
    lease_name: String,
    identity: String,
    tx: watch::Sender<bool>,
) {
    let leases: Api<Lease> = Api::namespaced(client, &namespace);
    let mut was_leader = false;
    let mut last_successful_renew = tokio::time::Instant::now();

    loop {
        match try_acquire_or_renew(&leases, &lease_name, &identity).await {
            Ok(won) => {
                last_successful_renew = tokio::time::Instant::now();
                if won && !was_leader {
                    info!(lease = %lease_name, identity = %identity, "acquired leadership");
                } else if !won && was_leader {
                    fatal_lost_leadership(&lease_name);
                }
                was_leader = won;
                let _ = tx.send(won);
            }
            Err(e) => {
                warn!(lease = %lease_name, "leader election attempt failed: {e}");
                if was_leader && last_successful_renew.elapsed() > RENEW_DEADLINE {
                    fatal_lost_leadership(&lease_name);
                }
            }
        }
        tokio::time::sleep(RETRY_PERIOD).await;
    }
}

/// Process exits fatally on loss of leadership (SPEC_FULL.md §4.7): the
/// process is ephemeral and relies on an external restarter.
fn fatal_lost_leadership(lease_name: &str) -> ! {
    error!(lease = %lease_name, "lost leadership, exiting for supervisor restart");
    std::process::exit(1)
}

async fn try_acquire_or_renew(
    leases: &Api<Lease>,
    lease_name: &str,
    identity: &str,
) -> Result<bool, LeaderError> {
    let now = MicroTime(Utc::now());
    match leases.get(lease_name).await {
        Err(kube::Error::Api(resp)) if resp.code == 404 => {
            let lease = Lease {
                metadata: kube::api::ObjectMeta {
                    name: Some(lease_name.to_string()),
                    ..Default::default()
                },
                spec: Some(LeaseSpec {
                    holder_identity: Some(identity.to_string()),
                    lease_duration_seconds: Some(LEASE_DURATION.as_secs() as i32),
                    acquire_time: Some(now.clone()),
                    renew_time: Some(now),
                    lease_transitions: Some(0),
                    ..Default::default()
                }),
            };
            match leases.create(&PostParams::default(), &lease).await {
                Ok(_) => Ok(true),
                Err(kube::Error::Api(resp)) if resp.code == 409 => Ok(false),
                Err(e) => Err(e.into()),
            }
        }
        Ok(existing) => {
            let spec = existing.spec.unwrap_or_default();
            let held_by_other = spec
                .holder_identity
                .as_deref()
                .map(|h| h != identity)
                .unwrap_or(false);
            let expired = spec
                .renew_time
                .as_ref()
                .map(|rt| {
                    let duration = spec
                        .lease_duration_seconds
                        .map(|d| Duration::from_secs(d.max(0) as u64))
                        .unwrap_or(LEASE_DURATION);
                    Utc::now().signed_duration_since(rt.0)
                        > chrono::Duration::from_std(duration).unwrap_or_default()
                })
                .unwrap_or(true);

            if held_by_other && !expired {
                return Ok(false);
            }

            let transitions = if held_by_other {
                spec.lease_transitions.unwrap_or(0) + 1
            } else {
                spec.lease_transitions.unwrap_or(0)
            };

            let patch = serde_json::json!({
                "spec": {
                    "holderIdentity": identity,
                    "leaseDurationSeconds": LEASE_DURATION.as_secs() as i32,
                    "renewTime": now,
                    "leaseTransitions": transitions,
                }
            });
            match leases
                .patch(
                    lease_name,
                    &PatchParams::apply("fleet-leader-gate"),
                    &Patch::Merge(patch),
                )
                .await
            {
                Ok(_) => Ok(true),
                Err(kube::Error::Api(resp)) if resp.code == 409 => Ok(false),
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// A fresh per-process identity string, suitable as a lease holder id.
pub fn generate_identity() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub type SharedGate = Arc<LeaderGate>;
