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

//! Maps each service's publishing strategy to the objects that realise it.

use super::catalog::{published_service, ServiceDescriptor, AGGREGATED_API_SERVICES};
use crate::domain::api::{HostedClusterSpec, PublishingStrategy, ServiceType};
use crate::infrastructure::constants::ROUTE_HTTPS_PORT;
use crate::shared::error::{HcpError, Result};
use k8s_openapi::api::core::v1::Service;
use std::net::Ipv6Addr;

/// How a service object is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceExposure {
    LoadBalancer,
    /// `None` leaves the port to the platform.
    NodePort { port: Option<i32> },
    ClusterIP,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishAction {
    Expose {
        exposure: ServiceExposure,
        /// Set for the Route strategy; an ingress with this host is owned too.
        route_host: Option<String>,
        /// Address advertised for NodePort publishing.
        node_port_address: Option<String>,
    },
    /// Delete the service and any ingress left from an earlier strategy.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePlan {
    /// `None` for aggregated API services, which are never published.
    pub service_type: Option<ServiceType>,
    pub descriptor: ServiceDescriptor,
    pub action: PublishAction,
}

impl ServicePlan {
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn route_host(&self) -> Option<&str> {
        match &self.action {
            PublishAction::Expose { route_host, .. } => route_host.as_deref(),
            PublishAction::Remove => None,
        }
    }

    /// Externally reachable names for this service, given its live object.
    /// Platform-assigned load balancer addresses only appear once allocated.
    pub fn external_addresses(&self, live: Option<&Service>) -> Vec<String> {
        match &self.action {
            PublishAction::Remove => vec![],
            PublishAction::Expose {
                route_host: Some(host),
                ..
            } => vec![host.clone()],
            PublishAction::Expose {
                node_port_address: Some(address),
                ..
            } if !address.is_empty() => vec![address.clone()],
            PublishAction::Expose {
                exposure: ServiceExposure::LoadBalancer,
                ..
            } => load_balancer_addresses(live),
            PublishAction::Expose { .. } => vec![],
        }
    }
}

impl ServicePlan {
    /// `https://host:port` for clients outside the management cluster, once
    /// the platform has assigned what the strategy needs.
    pub fn external_url(&self, live: Option<&Service>) -> Option<String> {
        let host = self.external_addresses(live).into_iter().next()?;
        let port = match &self.action {
            PublishAction::Remove => return None,
            PublishAction::Expose {
                route_host: Some(_),
                ..
            } => ROUTE_HTTPS_PORT,
            PublishAction::Expose {
                exposure: ServiceExposure::NodePort { port },
                ..
            } => port.or_else(|| assigned_node_port(live))?,
            PublishAction::Expose { .. } => self.descriptor.port,
        };
        Some(format!("https://{}:{}", url_host(&host), port))
    }

    /// In-cluster URL of the service.
    pub fn internal_url(&self, namespace: &str, cluster_domain: &str) -> String {
        format!(
            "https://{}.{}.svc.{}:{}",
            self.descriptor.name, namespace, cluster_domain, self.descriptor.port
        )
    }
}

fn assigned_node_port(live: Option<&Service>) -> Option<i32> {
    live.and_then(|svc| svc.spec.as_ref())
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .and_then(|port| port.node_port)
        .filter(|port| *port > 0)
}

fn url_host(host: &str) -> String {
    match host.parse::<Ipv6Addr>() {
        Ok(_) => format!("[{}]", host),
        Err(_) => host.to_string(),
    }
}

fn load_balancer_addresses(live: Option<&Service>) -> Vec<String> {
    live.and_then(|svc| svc.status.as_ref())
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|i| i.hostname.clone().or_else(|| i.ip.clone()))
                .filter(|addr| !addr.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `<service>.<infraID or cluster name>.<baseDomain>`
pub fn route_host(
    descriptor: &ServiceDescriptor,
    spec: &HostedClusterSpec,
    cluster_name: &str,
) -> Result<String> {
    if spec.dns.base_domain.is_empty() {
        return Err(HcpError::validation(format!(
            "Route publishing for '{}' requires dns.baseDomain",
            descriptor.name
        )));
    }
    let infix = if spec.infra_id.is_empty() {
        cluster_name
    } else {
        spec.infra_id.as_str()
    };
    Ok(format!(
        "{}.{}.{}",
        descriptor.name, infix, spec.dns.base_domain
    ))
}

/// Resolve every published service plus the aggregated API services.
///
/// A service type without a mapping is treated as `None`, so an object
/// created under an earlier mapping does not outlive it.
pub fn resolve_publishing(
    spec: &HostedClusterSpec,
    cluster_name: &str,
) -> Result<Vec<ServicePlan>> {
    let mut plans = Vec::with_capacity(ServiceType::ALL.len() + AGGREGATED_API_SERVICES.len());

    for service_type in ServiceType::ALL {
        let descriptor = published_service(service_type);
        let strategy = match spec.publishing_for(service_type) {
            Some(mapping) => mapping
                .service_publishing_strategy
                .resolve()
                .map_err(|e| HcpError::validation(format!("service {}: {}", service_type, e)))?,
            None => PublishingStrategy::None,
        };

        let action = match strategy {
            PublishingStrategy::LoadBalancer => PublishAction::Expose {
                exposure: ServiceExposure::LoadBalancer,
                route_host: None,
                node_port_address: None,
            },
            PublishingStrategy::NodePort { address, port } => PublishAction::Expose {
                exposure: ServiceExposure::NodePort { port },
                route_host: None,
                node_port_address: Some(address).filter(|a| !a.is_empty()),
            },
            PublishingStrategy::Route => PublishAction::Expose {
                exposure: ServiceExposure::ClusterIP,
                route_host: Some(route_host(&descriptor, spec, cluster_name)?),
                node_port_address: None,
            },
            PublishingStrategy::None => PublishAction::Remove,
        };

        plans.push(ServicePlan {
            service_type: Some(service_type),
            descriptor,
            action,
        });
    }

    for descriptor in AGGREGATED_API_SERVICES {
        plans.push(ServicePlan {
            service_type: None,
            descriptor,
            action: PublishAction::Expose {
                exposure: ServiceExposure::ClusterIP,
                route_host: None,
                node_port_address: None,
            },
        });
    }

    Ok(plans)
}
