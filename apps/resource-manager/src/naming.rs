//! Identifier derivation rules (SPEC_FULL.md §4.4.2), kept in one place
//! since apply, release, and reconcile all need to agree on them.

pub fn pod_name(uuid: &uuid::Uuid) -> String {
    format!("cloudgame-center-{uuid}")
}

pub fn service_name(pod_name: &str) -> String {
    format!("service-{pod_name}")
}

pub fn instance_id(pod_name: &str) -> String {
    format!("instance-{pod_name}")
}
