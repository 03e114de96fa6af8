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

//! Fixed naming and port table for every service the control plane exposes.

use crate::domain::api::ServiceType;
use crate::infrastructure::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    /// Value of the `app` selector label of the backing pods.
    pub component: &'static str,
    pub port_name: &'static str,
    pub port: i32,
    pub target_port: i32,
}

const KUBE_APISERVER: ServiceDescriptor = ServiceDescriptor {
    name: SERVICE_KUBE_APISERVER,
    component: COMPONENT_KUBE_APISERVER,
    port_name: PORT_NAME_HTTPS,
    port: KUBE_APISERVER_PORT,
    target_port: KUBE_APISERVER_PORT,
};

const VPN: ServiceDescriptor = ServiceDescriptor {
    name: SERVICE_VPN,
    component: SERVICE_VPN,
    port_name: PORT_NAME_VPN,
    port: VPN_PORT,
    target_port: VPN_PORT,
};

const OAUTH: ServiceDescriptor = ServiceDescriptor {
    name: SERVICE_OAUTH,
    component: SERVICE_OAUTH,
    port_name: PORT_NAME_HTTPS,
    port: OAUTH_SERVICE_PORT,
    target_port: OAUTH_SERVER_PORT,
};

const OIDC: ServiceDescriptor = ServiceDescriptor {
    name: SERVICE_OIDC,
    component: SERVICE_OIDC,
    port_name: PORT_NAME_HTTPS,
    port: OIDC_SERVICE_PORT,
    target_port: OIDC_SERVER_PORT,
};

/// In-cluster services of the aggregated API servers.
pub const AGGREGATED_API_SERVICES: [ServiceDescriptor; 2] = [
    ServiceDescriptor {
        name: COMPONENT_OPENSHIFT_APISERVER,
        component: COMPONENT_OPENSHIFT_APISERVER,
        port_name: PORT_NAME_HTTPS,
        port: OPENSHIFT_APISERVICE_PORT,
        target_port: OPENSHIFT_APISERVER_PORT,
    },
    ServiceDescriptor {
        name: COMPONENT_OAUTH_APISERVER,
        component: COMPONENT_OAUTH_APISERVER,
        port_name: PORT_NAME_HTTPS,
        port: OPENSHIFT_APISERVICE_PORT,
        target_port: OPENSHIFT_APISERVER_PORT,
    },
];

pub fn published_service(service: ServiceType) -> ServiceDescriptor {
    match service {
        ServiceType::APIServer => KUBE_APISERVER,
        ServiceType::VPN => VPN,
        ServiceType::OAuthServer => OAUTH,
        ServiceType::OIDC => OIDC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_one_service_name_per_type() {
        let names: HashSet<_> = ServiceType::ALL
            .iter()
            .map(|s| published_service(*s).name)
            .chain(AGGREGATED_API_SERVICES.iter().map(|d| d.name))
            .collect();
        assert_eq!(names.len(), ServiceType::ALL.len() + AGGREGATED_API_SERVICES.len());
        assert_eq!(published_service(ServiceType::APIServer).name, "kube-apiserver");
        assert_eq!(published_service(ServiceType::VPN).name, "openvpn-server");
        assert_eq!(published_service(ServiceType::OAuthServer).name, "oauth-openshift");
        assert_eq!(published_service(ServiceType::OIDC).name, "oidc");
    }

    #[test]
    fn test_aggregated_services_target_8443() {
        for svc in AGGREGATED_API_SERVICES {
            assert_eq!(svc.port, 443);
            assert_eq!(svc.target_port, 8443);
        }
    }
}
