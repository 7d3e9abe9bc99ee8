//! Pod and service builders (SPEC_FULL.md §4.2), field values resolved
//! from the original Kubernetes manifests this system deploys against.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, HTTPGetAction, NodeAffinity, NodeSelector,
    NodeSelectorRequirement, NodeSelectorTerm, Pod, PodSpec, Probe, ResourceRequirements, Service,
    ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

pub const CONTAINER_IMAGE: &str = "cloudgame:latest";
pub const CONTAINER_NAME: &str = "cloudgame-container";
pub const CONTAINER_PORT: i32 = 8080;

pub fn pod_factory(instance_id: &str, pod_name: &str, zone_id: &str, namespace: &str) -> Pod {
    let mut labels = BTreeMap::new();
    labels.insert("instance_id".to_string(), instance_id.to_string());
    labels.insert("zone_id".to_string(), zone_id.to_string());
    labels.insert("is_elastic".to_string(), "1".to_string());

    let mut limits = BTreeMap::new();
    limits.insert("cpu".to_string(), Quantity("50m".to_string()));
    limits.insert("memory".to_string(), Quantity("64Mi".to_string()));
    let mut requests = BTreeMap::new();
    requests.insert("cpu".to_string(), Quantity("25m".to_string()));
    requests.insert("memory".to_string(), Quantity("32Mi".to_string()));

    Pod {
        metadata: ObjectMeta {
            name: Some(pod_name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CONTAINER_NAME.to_string(),
                image: Some(CONTAINER_IMAGE.to_string()),
                image_pull_policy: Some("IfNotPresent".to_string()),
                ports: Some(vec![ContainerPort {
                    name: Some("http".to_string()),
                    container_port: CONTAINER_PORT,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                resources: Some(ResourceRequirements {
                    limits: Some(limits),
                    requests: Some(requests),
                    ..Default::default()
                }),
                readiness_probe: Some(Probe {
                    http_get: Some(HTTPGetAction {
                        path: Some("/healthz".to_string()),
                        port: IntOrString::Int(CONTAINER_PORT),
                        ..Default::default()
                    }),
                    initial_delay_seconds: Some(15),
                    period_seconds: Some(10),
                    timeout_seconds: Some(5),
                    success_threshold: Some(1),
                    failure_threshold: Some(3),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            affinity: Some(Affinity {
                node_affinity: Some(NodeAffinity {
                    required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                        node_selector_terms: vec![NodeSelectorTerm {
                            match_expressions: Some(vec![
                                NodeSelectorRequirement {
                                    key: "zone_id".to_string(),
                                    operator: "In".to_string(),
                                    values: Some(vec![zone_id.to_string()]),
                                },
                                NodeSelectorRequirement {
                                    key: "role".to_string(),
                                    operator: "In".to_string(),
                                    values: Some(vec!["center".to_string()]),
                                },
                            ]),
                            match_fields: None,
                        }],
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            restart_policy: Some("Always".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service_factory(service_name: &str, instance_id: &str, namespace: &str) -> Service {
    let mut selector = BTreeMap::new();
    selector.insert("instance_id".to_string(), instance_id.to_string());

    Service {
        metadata: ObjectMeta {
            name: Some(service_name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector),
            type_: Some("NodePort".to_string()),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: 80,
                target_port: Some(IntOrString::Int(CONTAINER_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// First non-zero NodePort assigned to a service, or `None` if the
/// control plane hasn't allocated one yet (caller should retry).
pub fn first_node_port(service: &Service) -> Option<i32> {
    service
        .spec
        .as_ref()?
        .ports
        .as_ref()?
        .iter()
        .find_map(|p| p.node_port.filter(|&np| np != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_factory_sets_zone_and_role_affinity() {
        let pod = pod_factory("instance-x", "cloudgame-center-x", "z1", "cloudgame");
        let affinity = pod
            .spec
            .unwrap()
            .affinity
            .unwrap()
            .node_affinity
            .unwrap()
            .required_during_scheduling_ignored_during_execution
            .unwrap();
        let term = &affinity.node_selector_terms[0];
        let exprs = term.match_expressions.as_ref().unwrap();
        assert!(exprs.iter().any(|e| e.key == "zone_id" && e.values == Some(vec!["z1".to_string()])));
        assert!(exprs.iter().any(|e| e.key == "role" && e.values == Some(vec!["center".to_string()])));
    }

    #[test]
    fn service_factory_maps_port_80_to_8080() {
        let svc = service_factory("service-x", "instance-x", "cloudgame");
        let port = &svc.spec.unwrap().ports.unwrap()[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.target_port, Some(IntOrString::Int(8080)));
    }
}
