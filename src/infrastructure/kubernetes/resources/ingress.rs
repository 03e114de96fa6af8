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

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Name-based route to a control plane service.
pub struct IngressBuilder {
    metadata: ObjectMeta,
    host: String,
    service_name: String,
    service_port: i32,
}

impl IngressBuilder {
    pub fn new(
        metadata: ObjectMeta,
        host: impl Into<String>,
        service_name: impl Into<String>,
        service_port: i32,
    ) -> Self {
        Self {
            metadata,
            host: host.into(),
            service_name: service_name.into(),
            service_port,
        }
    }

    pub fn build(&self) -> Ingress {
        Ingress {
            metadata: self.metadata.clone(),
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some(self.host.clone()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some("/".to_string()),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: self.service_name.clone(),
                                    port: Some(ServiceBackendPort {
                                        number: Some(self.service_port),
                                        name: None,
                                    }),
                                }),
                                resource: None,
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Host of the first rule, if any.
pub fn ingress_host(ingress: &Ingress) -> Option<&str> {
    ingress
        .spec
        .as_ref()?
        .rules
        .as_ref()?
        .first()?
        .host
        .as_deref()
}

/// Backend port number of the first rule, if any.
pub fn ingress_backend_port(ingress: &Ingress) -> Option<i32> {
    ingress
        .spec
        .as_ref()?
        .rules
        .as_ref()?
        .first()?
        .http
        .as_ref()?
        .paths
        .first()?
        .backend
        .service
        .as_ref()?
        .port
        .as_ref()?
        .number
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingress_routes_host_to_service_port() {
        let ingress = IngressBuilder::new(
            ObjectMeta::default(),
            "oauth-openshift.example.hcp.dev",
            "oauth-openshift",
            443,
        )
        .build();

        assert_eq!(ingress_host(&ingress), Some("oauth-openshift.example.hcp.dev"));
        assert_eq!(ingress_backend_port(&ingress), Some(443));
    }
}
