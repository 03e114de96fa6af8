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

//! Every leaf certificate the control plane needs, keyed by component.

use super::leaf::{CertRequest, CertUsage};
use super::sans::SanSet;
use super::signer::TrustDomain;
use crate::infrastructure::constants::*;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

const ORG_KUBERNETES: &str = "kubernetes";
const ORG_OPENSHIFT: &str = "openshift";

/// Inputs shared by all certificate requests of one hosted cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiContext {
    pub namespace: String,
    pub cluster_domain: String,
    /// Guest `kubernetes` service address.
    pub kubernetes_service_ip: IpAddr,
    /// Hostnames under which the API server is reachable from outside.
    pub external_api_hostnames: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentCert {
    KubeApiServer,
    KubeControllerManagerServer,
    KubeControllerManagerClient,
    OpenShiftApiServer,
    OpenShiftOAuthApiServer,
    OpenShiftControllerManager,
    EtcdServer,
    EtcdPeer,
    EtcdClient,
    AggregatorClient,
    MetricsClient,
}

impl ComponentCert {
    pub const ALL: [ComponentCert; 11] = [
        ComponentCert::KubeApiServer,
        ComponentCert::KubeControllerManagerServer,
        ComponentCert::KubeControllerManagerClient,
        ComponentCert::OpenShiftApiServer,
        ComponentCert::OpenShiftOAuthApiServer,
        ComponentCert::OpenShiftControllerManager,
        ComponentCert::EtcdServer,
        ComponentCert::EtcdPeer,
        ComponentCert::EtcdClient,
        ComponentCert::AggregatorClient,
        ComponentCert::MetricsClient,
    ];

    /// One Secret per (component, purpose).
    pub fn secret_name(&self) -> &'static str {
        match self {
            ComponentCert::KubeApiServer => "kas-server-crt",
            ComponentCert::KubeControllerManagerServer => "kcm-server-crt",
            ComponentCert::KubeControllerManagerClient => "kcm-client-crt",
            ComponentCert::OpenShiftApiServer => "openshift-apiserver-crt",
            ComponentCert::OpenShiftOAuthApiServer => "openshift-oauth-apiserver-crt",
            ComponentCert::OpenShiftControllerManager => "openshift-controller-manager-crt",
            ComponentCert::EtcdServer => "etcd-server-crt",
            ComponentCert::EtcdPeer => "etcd-peer-crt",
            ComponentCert::EtcdClient => "etcd-client-crt",
            ComponentCert::AggregatorClient => "kas-aggregator-client-crt",
            ComponentCert::MetricsClient => "metrics-client-crt",
        }
    }

    pub fn component(&self) -> &'static str {
        match self {
            ComponentCert::KubeApiServer | ComponentCert::AggregatorClient => {
                COMPONENT_KUBE_APISERVER
            }
            ComponentCert::KubeControllerManagerServer
            | ComponentCert::KubeControllerManagerClient => COMPONENT_KCM,
            ComponentCert::OpenShiftApiServer => COMPONENT_OPENSHIFT_APISERVER,
            ComponentCert::OpenShiftOAuthApiServer => COMPONENT_OAUTH_APISERVER,
            ComponentCert::OpenShiftControllerManager => COMPONENT_OPENSHIFT_CONTROLLER_MANAGER,
            ComponentCert::EtcdServer | ComponentCert::EtcdPeer | ComponentCert::EtcdClient => {
                COMPONENT_ETCD
            }
            ComponentCert::MetricsClient => "metrics",
        }
    }

    pub fn trust_domain(&self) -> TrustDomain {
        match self {
            ComponentCert::EtcdServer | ComponentCert::EtcdPeer | ComponentCert::EtcdClient => {
                TrustDomain::Etcd
            }
            ComponentCert::AggregatorClient => TrustDomain::Aggregator,
            ComponentCert::MetricsClient => TrustDomain::Metrics,
            _ => TrustDomain::Root,
        }
    }

    /// Only the API server certificate depends on published hostnames.
    pub fn depends_on_publishing(&self) -> bool {
        matches!(self, ComponentCert::KubeApiServer)
    }

    pub fn request(&self, ctx: &PkiContext) -> CertRequest {
        let ns = ctx.namespace.as_str();
        let domain = ctx.cluster_domain.as_str();

        let (common_name, organization, usage, sans) = match self {
            ComponentCert::KubeApiServer => {
                let mut sans = SanSet::new()
                    .dns("kubernetes")
                    .dns("kubernetes.default")
                    .dns("kubernetes.default.svc")
                    .dns(format!("kubernetes.default.svc.{}", domain))
                    .service(SERVICE_KUBE_APISERVER, ns, domain)
                    .dns("localhost")
                    .ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
                    .ip(ctx.kubernetes_service_ip);
                for host in &ctx.external_api_hostnames {
                    sans = match host.parse::<IpAddr>() {
                        Ok(ip) => sans.ip(ip),
                        Err(_) => sans.dns_opt(Some(host.as_str())),
                    };
                }
                ("kubernetes", Some(ORG_KUBERNETES), CertUsage::Server, sans)
            }
            ComponentCert::KubeControllerManagerServer => (
                COMPONENT_KCM,
                None,
                CertUsage::Server,
                SanSet::new().service(COMPONENT_KCM, ns, domain),
            ),
            ComponentCert::KubeControllerManagerClient => (
                "system:kube-controller-manager",
                None,
                CertUsage::Client,
                SanSet::new(),
            ),
            ComponentCert::OpenShiftApiServer => (
                COMPONENT_OPENSHIFT_APISERVER,
                Some(ORG_OPENSHIFT),
                CertUsage::ServerClient,
                SanSet::new()
                    .service(COMPONENT_OPENSHIFT_APISERVER, ns, domain)
                    .default_namespace_alias(COMPONENT_OPENSHIFT_APISERVER, domain),
            ),
            ComponentCert::OpenShiftOAuthApiServer => (
                COMPONENT_OAUTH_APISERVER,
                Some(ORG_OPENSHIFT),
                CertUsage::ServerClient,
                SanSet::new()
                    .service(COMPONENT_OAUTH_APISERVER, ns, domain)
                    .default_namespace_alias(COMPONENT_OAUTH_APISERVER, domain),
            ),
            ComponentCert::OpenShiftControllerManager => (
                COMPONENT_OPENSHIFT_CONTROLLER_MANAGER,
                Some(ORG_OPENSHIFT),
                CertUsage::ServerClient,
                SanSet::new().service(COMPONENT_OPENSHIFT_CONTROLLER_MANAGER, ns, domain),
            ),
            ComponentCert::EtcdServer => (
                "etcd-server",
                Some("etcd"),
                CertUsage::ServerClient,
                SanSet::new()
                    .service(ETCD_CLIENT_SERVICE, ns, domain)
                    .dns(format!("*.{}.{}.svc", ETCD_DISCOVERY_SERVICE, ns))
                    .dns(format!("*.{}.{}.svc.{}", ETCD_DISCOVERY_SERVICE, ns, domain))
                    .dns("localhost")
                    .ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ),
            ComponentCert::EtcdPeer => (
                "etcd-discovery",
                Some("etcd"),
                CertUsage::ServerClient,
                SanSet::new()
                    .dns(format!("*.{}.{}.svc", ETCD_DISCOVERY_SERVICE, ns))
                    .dns(format!("*.{}.{}.svc.{}", ETCD_DISCOVERY_SERVICE, ns, domain)),
            ),
            ComponentCert::EtcdClient => (
                "etcd-client",
                Some("etcd"),
                CertUsage::Client,
                SanSet::new(),
            ),
            ComponentCert::AggregatorClient => (
                "system:openshift-aggregator",
                Some(ORG_KUBERNETES),
                CertUsage::Client,
                SanSet::new(),
            ),
            ComponentCert::MetricsClient => (
                "system:serviceaccount:hypershift:prometheus",
                None,
                CertUsage::Client,
                SanSet::new(),
            ),
        };

        let mut req = CertRequest::new(common_name, usage)
            .with_dns_names(sans.dns_names)
            .with_ip_addresses(sans.ip_addresses);
        if let Some(org) = organization {
            req = req.with_organization(org);
        }
        req
    }
}

impl fmt::Display for ComponentCert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.secret_name())
    }
}
