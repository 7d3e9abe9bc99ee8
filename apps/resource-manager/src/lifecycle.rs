//! The lifecycle manager (C4): bounded-parallel create/wait-ready/delete
//! of elastic instances, plus the consistency sweep that precedes every
//! convergence call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleet_domain::{ControllerError, Instance, InstanceStatus};
use fleet_orchestrator::{first_node_port, pod_factory, service_factory};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::naming::{instance_id, pod_name, service_name};
use crate::state::AppState;

/// Bounds concurrent orchestrator-call workers across both the sweep and
/// the apply/release fan-outs (SPEC_FULL.md §5).
const FAN_OUT_CONCURRENCY: usize = 50;
const READINESS_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Sweeps every pod in the zone, reconciling ledger `status` against the
/// live `/getStatus` endpoint. Logs failures but never aborts — a single
/// unreachable pod must not block convergence for the rest of the zone.
#[instrument(skip(state))]
pub async fn reconcile(state: &AppState, zone_id: &str) {
    let pods = match state.orchestrator.list_pods(&format!("zone_id={zone_id}")).await {
        Ok(pods) => pods,
        Err(e) => {
            warn!(zone_id, "reconcile: failed to list pods: {e}");
            return;
        }
    };

    let semaphore = Arc::new(Semaphore::new(FAN_OUT_CONCURRENCY));
    let failed = Arc::new(AtomicUsize::new(0));
    let total = pods.len();

    let mut handles = Vec::with_capacity(total);
    for pod in pods {
        let Some(name) = pod.metadata.name.clone() else {
            continue;
        };
        let semaphore = semaphore.clone();
        let failed = failed.clone();
        let state = state.clone();
        let zone_id = zone_id.to_string();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            if let Err(e) = reconcile_one(&state, &zone_id, &name).await {
                warn!(zone_id, pod_name = %name, "reconcile: {e}");
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let failed = failed.load(Ordering::Relaxed);
    if failed > 0 {
        info!(zone_id, failed, total, "reconcile: some pods failed to synchronize");
    }
}

async fn reconcile_one(state: &AppState, zone_id: &str, pod_name: &str) -> Result<(), ControllerError> {
    let service_name = service_name(pod_name);
    let service = state
        .orchestrator
        .get_service(&service_name)
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?
        .ok_or_else(|| ControllerError::Transient(format!("service {service_name} not found")))?;
    let node_port = first_node_port(&service)
        .ok_or_else(|| ControllerError::Transient(format!("service {service_name} has no NodePort")))?;

    let pod = state
        .orchestrator
        .get_pod(pod_name)
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?
        .ok_or_else(|| ControllerError::Transient(format!("pod {pod_name} not found")))?;
    let host_ip = pod
        .status
        .and_then(|s| s.host_ip)
        .ok_or_else(|| ControllerError::Transient(format!("pod {pod_name} has no hostIP yet")))?;

    let raw_status = state
        .orchestrator
        .get_status(&host_ip, node_port)
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?;
    let status = parse_status(&raw_status);

    state
        .ledger
        .synchronize_status(zone_id, &instance_id(pod_name), status)
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?;
    Ok(())
}

fn parse_status(raw: &str) -> InstanceStatus {
    if raw.trim().eq_ignore_ascii_case("using") {
        InstanceStatus::Using
    } else {
        InstanceStatus::Available
    }
}

/// `manage(zone, delta)`: runs the consistency sweep, then dispatches to
/// the apply or release path. `delta == 0` is a no-op success.
#[instrument(skip(state))]
pub async fn manage(state: &AppState, zone_id: &str, delta: i64) -> Result<String, ControllerError> {
    reconcile(state, zone_id).await;

    match delta.cmp(&0) {
        std::cmp::Ordering::Equal => Ok("no-op".to_string()),
        std::cmp::Ordering::Greater => apply(state, zone_id, delta as u32).await,
        std::cmp::Ordering::Less => release(state, zone_id, delta.unsigned_abs() as u32).await,
    }
}

/// Apply path (SPEC_FULL.md §4.4.2): create up to `delta` elastic
/// instances, clamped to `CENTER_MAX_TOTAL`.
async fn apply(state: &AppState, zone_id: &str, delta: u32) -> Result<String, ControllerError> {
    let have = state
        .orchestrator
        .list_pods(&format!("zone_id={zone_id},is_elastic=1"))
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?
        .len() as u32;
    let cap = state.config.center_max_total;
    if have >= cap {
        return Err(ControllerError::CapacityExhausted);
    }
    let delta = delta.min(cap - have);

    let semaphore = Arc::new(Semaphore::new(FAN_OUT_CONCURRENCY));
    let succeeded = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(delta as usize);
    for _ in 0..delta {
        let semaphore = semaphore.clone();
        let succeeded = succeeded.clone();
        let state = state.clone();
        let zone_id = zone_id.to_string();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            match apply_one(&state, &zone_id).await {
                Ok(()) => {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!(zone_id, "apply unit failed: {e}"),
            }
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let succeeded = succeeded.load(Ordering::Relaxed);
    if (succeeded as u32) < delta {
        return Err(ControllerError::PartialLifecycle {
            failed: delta as usize - succeeded,
            total: delta as usize,
        });
    }
    Ok(format!("created {succeeded} elastic instances"))
}

async fn apply_one(state: &AppState, zone_id: &str) -> Result<(), ControllerError> {
    let uuid = Uuid::new_v4();
    let pod_name = pod_name(&uuid);
    let service_name = service_name(&pod_name);
    let instance_id = instance_id(&pod_name);

    let pod = pod_factory(&instance_id, &pod_name, zone_id, &state.config.k8s.namespace);
    state
        .orchestrator
        .create_pod(pod)
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?;

    let service = service_factory(&service_name, &instance_id, &state.config.k8s.namespace);
    let created = state
        .orchestrator
        .create_service(service)
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?;

    let mut node_port = first_node_port(&created);
    let mut attempts = 0;
    while node_port.is_none() && attempts < 10 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let refreshed = state
            .orchestrator
            .get_service(&service_name)
            .await
            .map_err(|e| ControllerError::Transient(e.to_string()))?;
        node_port = refreshed.as_ref().and_then(first_node_port);
        attempts += 1;
    }
    let Some(node_port) = node_port else {
        cleanup(state, &pod_name, &service_name).await;
        return Err(ControllerError::Transient(format!(
            "service {service_name} never received a NodePort"
        )));
    };

    let ready = tokio::time::timeout(
        READINESS_TIMEOUT,
        state.orchestrator.wait_until_ready(&pod_name, node_port, READINESS_TIMEOUT),
    )
    .await;

    let host_ip = match ready {
        Ok(Ok(host_ip)) => host_ip,
        Ok(Err(e)) => {
            warn!(pod_name, "readiness check failed: {e}");
            cleanup(state, &pod_name, &service_name).await;
            return Err(ControllerError::ReadinessTimeout);
        }
        Err(_) => {
            cleanup(state, &pod_name, &service_name).await;
            return Err(ControllerError::ReadinessTimeout);
        }
    };

    // Ledger insertion is last: any unit that failed after this point
    // would violate the "pod_name matches a live container" invariant.
    let instance = Instance {
        zone_id: zone_id.to_string(),
        site_id: None,
        server_ip: host_ip,
        pod_name,
        instance_id,
        port: node_port,
        is_elastic: true,
        status: InstanceStatus::Available,
        device_id: None,
    };
    state
        .ledger
        .insert_instance(&instance)
        .await
        .map_err(|e| ControllerError::Transient(e.to_string()))?;
    Ok(())
}

async fn cleanup(state: &AppState, pod_name: &str, service_name: &str) {
    if let Err(e) = state.orchestrator.delete_pod(pod_name).await {
        warn!(pod_name, "cleanup: failed to delete pod: {e}");
    }
    if let Err(e) = state.orchestrator.delete_service(service_name).await {
        warn!(service_name, "cleanup: failed to delete service: {e}");
    }
}

/// Release path (SPEC_FULL.md §4.4.3): pops `delta` available elastic
/// rows from the ledger first, then tears down their pods/services.
async fn release(state: &AppState, zone_id: &str, delta: u32) -> Result<String, ControllerError> {
    let pod_names = state
        .ledger
        .pop_available_elastics(zone_id, delta)
        .await
        .map_err(|e| match e {
            fleet_ledger::LedgerError::NothingToRelease { .. } => ControllerError::NothingToRelease,
            other => ControllerError::Transient(other.to_string()),
        })?;

    let semaphore = Arc::new(Semaphore::new(FAN_OUT_CONCURRENCY));
    let failed = Arc::new(AtomicUsize::new(0));
    let total = pod_names.len();

    let mut handles = Vec::with_capacity(total);
    for pod_name in pod_names {
        let semaphore = semaphore.clone();
        let failed = failed.clone();
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            let service_name = service_name(&pod_name);
            let pod_result = state.orchestrator.delete_pod(&pod_name).await;
            let service_result = state.orchestrator.delete_service(&service_name).await;
            if pod_result.is_err() || service_result.is_err() {
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let failed = failed.load(Ordering::Relaxed);
    if failed > 0 {
        return Err(ControllerError::PartialLifecycle { failed, total });
    }
    Ok(format!("released {total} elastic instances"))
}
