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

use crate::domain::publishing::{ServiceDescriptor, ServiceExposure};
use crate::domain::synthesis::selector_labels;
use crate::infrastructure::constants::*;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Desired shape of a single-port control plane service.
pub struct ServiceBuilder {
    metadata: ObjectMeta,
    descriptor: ServiceDescriptor,
    exposure: ServiceExposure,
}

impl ServiceBuilder {
    pub fn new(
        metadata: ObjectMeta,
        descriptor: ServiceDescriptor,
        exposure: ServiceExposure,
    ) -> Self {
        Self {
            metadata,
            descriptor,
            exposure,
        }
    }

    pub fn build(&self) -> Service {
        let service_type = match self.exposure {
            ServiceExposure::LoadBalancer => SERVICE_TYPE_LOAD_BALANCER,
            ServiceExposure::NodePort { .. } => SERVICE_TYPE_NODE_PORT,
            ServiceExposure::ClusterIP => SERVICE_TYPE_CLUSTER_IP,
        };

        Service {
            metadata: self.metadata.clone(),
            spec: Some(ServiceSpec {
                type_: Some(service_type.to_string()),
                ports: Some(vec![self.create_service_port()]),
                selector: Some(selector_labels(self.descriptor.component)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn create_service_port(&self) -> ServicePort {
        let node_port = match self.exposure {
            ServiceExposure::NodePort { port } => port,
            _ => None,
        };
        ServicePort {
            name: Some(self.descriptor.port_name.to_string()),
            port: self.descriptor.port,
            target_port: Some(IntOrString::Int(self.descriptor.target_port)),
            protocol: Some(PROTOCOL_TCP.to_string()),
            node_port,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api::ServiceType;
    use crate::domain::publishing::published_service;

    #[test]
    fn test_dynamic_node_port_is_not_fabricated() {
        let svc = ServiceBuilder::new(
            ObjectMeta::default(),
            published_service(ServiceType::APIServer),
            ServiceExposure::NodePort { port: None },
        )
        .build();

        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("NodePort"));
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name.as_deref(), Some("https"));
        assert_eq!(ports[0].node_port, None);
    }

    #[test]
    fn test_fixed_node_port_requested() {
        let svc = ServiceBuilder::new(
            ObjectMeta::default(),
            published_service(ServiceType::OAuthServer),
            ServiceExposure::NodePort { port: Some(30443) },
        )
        .build();

        let port = &svc.spec.unwrap().ports.unwrap()[0];
        assert_eq!(port.node_port, Some(30443));
        assert_eq!(port.port, 443);
        assert_eq!(port.target_port, Some(IntOrString::Int(6443)));
    }
}
