// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Read-merge-write rules for published objects.
//!
//! Both functions are pure: `existing` is the live object (or `None` for an
//! empty baseline) and the result is what should be written back.

use crate::infrastructure::constants::SERVICE_TYPE_CLUSTER_IP;
use crate::infrastructure::kubernetes::resources::merge_metadata;
use k8s_openapi::api::core::v1::{Service, ServicePort};
use k8s_openapi::api::networking::v1::Ingress;

/// Take the first live port, overwrite name, port, protocol and target
/// port, keep everything else, and write back exactly one port.
///
/// A node port is only written when the desired port carries one, so a
/// platform-assigned value survives. ClusterIP services cannot carry node
/// ports, so it is cleared for them.
pub fn merge_service(desired: &Service, existing: Option<&Service>) -> Service {
    let mut merged = existing.cloned().unwrap_or_default();
    merged.metadata = merge_metadata(&desired.metadata, &merged.metadata);

    let want_spec = desired.spec.clone().unwrap_or_default();
    let want_port = want_spec
        .ports
        .and_then(|ports| ports.into_iter().next())
        .unwrap_or_default();

    let spec = merged.spec.get_or_insert_with(Default::default);
    spec.type_ = want_spec.type_;
    spec.selector = want_spec.selector;

    let mut port: ServicePort = spec
        .ports
        .take()
        .and_then(|ports| ports.into_iter().next())
        .unwrap_or_default();
    port.name = want_port.name;
    port.port = want_port.port;
    port.protocol = want_port.protocol;
    port.target_port = want_port.target_port;
    if want_port.node_port.is_some() {
        port.node_port = want_port.node_port;
    }
    if spec.type_.as_deref() == Some(SERVICE_TYPE_CLUSTER_IP) {
        port.node_port = None;
    }
    spec.ports = Some(vec![port]);

    merged
}

/// Rules are owned outright; class, TLS, annotations and status set by
/// others are kept.
pub fn merge_ingress(desired: &Ingress, existing: Option<&Ingress>) -> Ingress {
    let mut merged = existing.cloned().unwrap_or_default();
    merged.metadata = merge_metadata(&desired.metadata, &merged.metadata);

    let want_spec = desired.spec.clone().unwrap_or_default();
    let spec = merged.spec.get_or_insert_with(Default::default);
    spec.rules = want_spec.rules;
    if want_spec.ingress_class_name.is_some() {
        spec.ingress_class_name = want_spec.ingress_class_name;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kubernetes::resources::{ingress_backend_port, IngressBuilder};
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use std::collections::BTreeMap;

    fn port(name: &str, port: i32, target: i32, node_port: Option<i32>) -> ServicePort {
        ServicePort {
            name: Some(name.to_string()),
            port,
            target_port: Some(IntOrString::Int(target)),
            protocol: Some("TCP".to_string()),
            node_port,
            ..Default::default()
        }
    }

    fn service(type_: &str, ports: Vec<ServicePort>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("kube-apiserver".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(type_.to_string()),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn only_port(svc: &Service) -> &ServicePort {
        let ports = svc.spec.as_ref().unwrap().ports.as_ref().unwrap();
        assert_eq!(ports.len(), 1);
        &ports[0]
    }

    #[test]
    fn test_merge_service_table() {
        struct Case {
            name: &'static str,
            desired: Service,
            existing: Option<Service>,
            want_node_port: Option<i32>,
            want_type: &'static str,
        }

        let cases = vec![
            Case {
                name: "empty baseline, dynamic node port",
                desired: service("NodePort", vec![port("https", 6443, 6443, None)]),
                existing: None,
                want_node_port: None,
                want_type: "NodePort",
            },
            Case {
                name: "assigned node port preserved",
                desired: service("NodePort", vec![port("https", 6443, 6443, None)]),
                existing: Some(service(
                    "NodePort",
                    vec![port("old", 1, 1, Some(31789))],
                )),
                want_node_port: Some(31789),
                want_type: "NodePort",
            },
            Case {
                name: "fixed node port overrides assigned",
                desired: service("NodePort", vec![port("https", 6443, 6443, Some(30000))]),
                existing: Some(service(
                    "NodePort",
                    vec![port("https", 6443, 6443, Some(31789))],
                )),
                want_node_port: Some(30000),
                want_type: "NodePort",
            },
            Case {
                name: "extra live ports collapse to one",
                desired: service("LoadBalancer", vec![port("https", 6443, 6443, None)]),
                existing: Some(service(
                    "LoadBalancer",
                    vec![
                        port("https", 6443, 6443, Some(32001)),
                        port("metrics", 9090, 9090, Some(32002)),
                    ],
                )),
                want_node_port: Some(32001),
                want_type: "LoadBalancer",
            },
            Case {
                name: "node port cleared for cluster ip",
                desired: service("ClusterIP", vec![port("https", 443, 8443, None)]),
                existing: Some(service(
                    "NodePort",
                    vec![port("https", 443, 8443, Some(31000))],
                )),
                want_node_port: None,
                want_type: "ClusterIP",
            },
        ];

        for case in cases {
            let merged = merge_service(&case.desired, case.existing.as_ref());
            let got = only_port(&merged);
            let want = only_port(&case.desired);
            assert_eq!(got.node_port, case.want_node_port, "{}", case.name);
            assert_eq!(got.name, want.name, "{}", case.name);
            assert_eq!(got.port, want.port, "{}", case.name);
            assert_eq!(got.target_port, want.target_port, "{}", case.name);
            assert_eq!(
                merged.spec.as_ref().unwrap().type_.as_deref(),
                Some(case.want_type),
                "{}",
                case.name
            );
        }
    }

    #[test]
    fn test_merge_service_keeps_platform_fields() {
        let mut live = service("LoadBalancer", vec![port("https", 6443, 6443, Some(32100))]);
        {
            let spec = live.spec.as_mut().unwrap();
            spec.cluster_ip = Some("172.31.12.9".to_string());
            spec.cluster_ips = Some(vec!["172.31.12.9".to_string()]);
        }
        live.metadata.annotations = Some(BTreeMap::from([(
            "service.beta.kubernetes.io/aws-load-balancer-internal".to_string(),
            "true".to_string(),
        )]));
        live.metadata.resource_version = Some("7".to_string());

        let desired = service("LoadBalancer", vec![port("https", 6443, 6443, None)]);
        let merged = merge_service(&desired, Some(&live));

        let spec = merged.spec.as_ref().unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("172.31.12.9"));
        assert!(merged
            .metadata
            .annotations
            .as_ref()
            .unwrap()
            .contains_key("service.beta.kubernetes.io/aws-load-balancer-internal"));
        assert_eq!(merged.metadata.resource_version.as_deref(), Some("7"));
    }

    #[test]
    fn test_merge_service_is_idempotent() {
        let desired = service("NodePort", vec![port("https", 6443, 6443, None)]);
        let live = service("NodePort", vec![port("x", 1, 1, Some(30999))]);

        let once = merge_service(&desired, Some(&live));
        let twice = merge_service(&desired, Some(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_ingress_keeps_foreign_settings() {
        let desired = IngressBuilder::new(
            ObjectMeta::default(),
            "kube-apiserver.example.hcp.dev",
            "kube-apiserver",
            6443,
        )
        .build();

        let mut live = IngressBuilder::new(
            ObjectMeta::default(),
            "kube-apiserver.example.hcp.dev",
            "kube-apiserver",
            443,
        )
        .build();
        live.spec.as_mut().unwrap().ingress_class_name = Some("haproxy".to_string());

        let merged = merge_ingress(&desired, Some(&live));
        assert_eq!(ingress_backend_port(&merged), Some(6443));
        assert_eq!(
            merged.spec.as_ref().unwrap().ingress_class_name.as_deref(),
            Some("haproxy")
        );
        assert_eq!(merge_ingress(&desired, Some(&merged)), merged);
    }
}
