//! Ledger row types shared by all three binaries.

use serde::{Deserialize, Serialize};

/// Whether a row is a fixed edge instance or a central elastic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceKind {
    Edge,
    Elastic,
}

impl InstanceKind {
    pub fn is_elastic(self) -> bool {
        matches!(self, InstanceKind::Elastic)
    }

    pub fn from_flag(is_elastic: bool) -> Self {
        if is_elastic {
            InstanceKind::Elastic
        } else {
            InstanceKind::Edge
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Available,
    Using,
}

impl InstanceStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            InstanceStatus::Available => "available",
            InstanceStatus::Using => "using",
        }
    }
}

/// One running or reserved container. `site_id`/`device_id` model the
/// source's `"null"` sentinel string as `None` (see SPEC_FULL.md §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub zone_id: String,
    pub site_id: Option<String>,
    pub server_ip: String,
    pub pod_name: String,
    pub instance_id: String,
    pub port: i32,
    pub is_elastic: bool,
    pub status: InstanceStatus,
    pub device_id: Option<String>,
}

impl Instance {
    /// Invariant 1/2 from SPEC_FULL.md §3: elastic rows available ⇒ no
    /// site; using ⇒ device bound.
    pub fn check_invariants(&self) -> bool {
        let site_ok = !self.is_elastic
            || self.status == InstanceStatus::Using
            || self.site_id.is_none();
        let device_ok = (self.status == InstanceStatus::Using) == self.device_id.is_some();
        site_ok && device_ok
    }
}

/// One minute-bucketed demand observation for a (zone, site).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub zone_id: String,
    pub site_id: String,
    pub date: chrono::NaiveDateTime,
    pub instances: i64,
    pub login_failures: i64,
}

impl Record {
    /// Demand is defined as using-count + login-failures (SPEC_FULL.md §4.3).
    pub fn demand(&self) -> i64 {
        self.instances + self.login_failures
    }
}

/// Per-zone prediction-vs-truth comparison for one minute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BounceRecord {
    pub zone_id: String,
    pub date: chrono::NaiveDateTime,
    pub true_instances: f64,
    pub pred_instances: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_elastic_has_no_site() {
        let i = Instance {
            zone_id: "z1".into(),
            site_id: None,
            server_ip: "10.0.0.1".into(),
            pod_name: "cloudgame-center-abc".into(),
            instance_id: "instance-cloudgame-center-abc".into(),
            port: 30000,
            is_elastic: true,
            status: InstanceStatus::Available,
            device_id: None,
        };
        assert!(i.check_invariants());
    }

    #[test]
    fn using_elastic_without_device_violates_invariant() {
        let i = Instance {
            zone_id: "z1".into(),
            site_id: Some("s1".into()),
            server_ip: "10.0.0.1".into(),
            pod_name: "cloudgame-center-abc".into(),
            instance_id: "instance-cloudgame-center-abc".into(),
            port: 30000,
            is_elastic: true,
            status: InstanceStatus::Using,
            device_id: None,
        };
        assert!(!i.check_invariants());
    }

    #[test]
    fn available_elastic_with_site_violates_invariant() {
        let i = Instance {
            zone_id: "z1".into(),
            site_id: Some("s1".into()),
            server_ip: "10.0.0.1".into(),
            pod_name: "cloudgame-center-abc".into(),
            instance_id: "instance-cloudgame-center-abc".into(),
            port: 30000,
            is_elastic: true,
            status: InstanceStatus::Available,
            device_id: None,
        };
        assert!(!i.check_invariants());
    }
}
