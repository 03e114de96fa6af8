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

//! HostedCluster custom resource.
//!
//! Example:
//! ```yaml
//! apiVersion: hcp.dev/v1alpha1
//! kind: HostedCluster
//! metadata:
//!   name: example
//!   namespace: clusters
//! spec:
//!   release:
//!     image: quay.io/example/release:4.8.0
//!   pullSecret: {name: pull-secret}
//!   signingKey: {name: signing-key}
//!   sshKey: {name: ssh-key}
//!   networking:
//!     serviceCIDR: 172.31.0.0/16
//!     podCIDR: 10.132.0.0/14
//!     machineCIDR: 10.0.0.0/16
//!   platform:
//!     type: None
//!   dns:
//!     baseDomain: example.com
//!   services:
//!   - service: APIServer
//!     servicePublishingStrategy:
//!       type: LoadBalancer
//! ```

use crate::domain::api::platform::{PlatformSpec, RawPlatformSpec};
use crate::domain::api::services::{ServicePublishingStrategyMapping, ServiceType};
use crate::domain::api::status::HostedClusterStatus;
use crate::shared::error::{HcpError, Result};
use kube::CustomResource;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::OnceLock;

/// Default autoscaler settings
pub const DEFAULT_MAX_POD_GRACE_PERIOD: i32 = 600;
pub const DEFAULT_MAX_NODE_PROVISION_TIME: &str = "15m";
pub const DEFAULT_POD_PRIORITY_THRESHOLD: i32 = -10;

#[derive(CustomResource, Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hcp.dev",
    version = "v1alpha1",
    kind = "HostedCluster",
    plural = "hostedclusters",
    shortname = "hc",
    shortname = "hcs",
    status = "HostedClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.version.history[?(@.state==\"Completed\")].image"}"#,
    printcolumn = r#"{"name":"KubeConfig", "type":"string", "jsonPath":".status.kubeconfig.name"}"#,
    printcolumn = r#"{"name":"Progress", "type":"string", "jsonPath":".status.version.history[0].state"}"#,
    printcolumn = r#"{"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name":"Reason", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HostedClusterSpec {
    /// Release image for the control plane
    pub release: Release,

    /// Pull secret injected into guest workers (`.dockerconfigjson` key)
    pub pull_secret: LocalObjectReference,

    pub signing_key: LocalObjectReference,

    #[serde(rename = "issuerURL", default, skip_serializing_if = "String::is_empty")]
    pub issuer_url: String,

    pub ssh_key: LocalObjectReference,

    pub networking: ClusterNetworking,

    /// Compute autoscaling limits, does not cover the control plane
    #[serde(default)]
    pub autoscaling: ClusterAutoscaling,

    #[schemars(with = "RawPlatformSpec")]
    pub platform: PlatformSpec,

    /// Identifies the cluster in cloud platforms
    #[serde(rename = "infraID", default, skip_serializing_if = "String::is_empty")]
    pub infra_id: String,

    #[serde(default)]
    pub dns: DNSSpec,

    /// How each control plane service is published from the management cluster
    #[serde(default)]
    pub services: Vec<ServicePublishingStrategyMapping>,

    #[serde(default)]
    pub controller_availability_policy: AvailabilityPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct LocalObjectReference {
    pub name: String,
}

impl LocalObjectReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Release {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClusterNetworking {
    #[serde(rename = "serviceCIDR")]
    pub service_cidr: String,
    #[serde(rename = "podCIDR")]
    pub pod_cidr: String,
    #[serde(rename = "machineCIDR")]
    pub machine_cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAutoscaling {
    /// Upper bound on nodes across all node groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes_total: Option<i32>,

    /// Termination grace given to pods before scale down, seconds (default 600)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pod_grace_period: Option<i32>,

    /// How long to wait for a node to be provisioned (default 15m)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub max_node_provision_time: String,

    /// Pods below this priority never trigger scale up (default -10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_priority_threshold: Option<i32>,
}

impl ClusterAutoscaling {
    pub fn max_pod_grace_period(&self) -> i32 {
        self.max_pod_grace_period
            .unwrap_or(DEFAULT_MAX_POD_GRACE_PERIOD)
    }

    pub fn max_node_provision_time(&self) -> &str {
        if self.max_node_provision_time.is_empty() {
            DEFAULT_MAX_NODE_PROVISION_TIME
        } else {
            &self.max_node_provision_time
        }
    }

    pub fn pod_priority_threshold(&self) -> i32 {
        self.pod_priority_threshold
            .unwrap_or(DEFAULT_POD_PRIORITY_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSSpec {
    pub base_domain: String,
    #[serde(rename = "publicZoneID", default, skip_serializing_if = "String::is_empty")]
    pub public_zone_id: String,
    #[serde(rename = "privateZoneID", default, skip_serializing_if = "String::is_empty")]
    pub private_zone_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum AvailabilityPolicy {
    #[default]
    SingleReplica,
    HighlyAvailable,
}

impl AvailabilityPolicy {
    pub fn replicas(&self) -> i32 {
        match self {
            AvailabilityPolicy::HighlyAvailable => 3,
            AvailabilityPolicy::SingleReplica => 1,
        }
    }
}

fn release_image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\w+\S+)$").expect("static regex"))
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]+(\.[0-9]+)?(ns|us|µs|ms|s|m|h))+$").expect("static regex")
    })
}

impl HostedClusterSpec {
    pub fn validate(&self) -> Result<()> {
        if self.release.image.is_empty() {
            return Err(HcpError::validation("release.image must not be empty"));
        }
        if !release_image_pattern().is_match(&self.release.image) {
            return Err(HcpError::validation(format!(
                "release.image is not a valid pull spec: {}",
                self.release.image
            )));
        }

        for (field, reference) in [
            ("pullSecret", &self.pull_secret),
            ("signingKey", &self.signing_key),
            ("sshKey", &self.ssh_key),
        ] {
            if reference.name.is_empty() {
                return Err(HcpError::validation(format!(
                    "{}.name must not be empty",
                    field
                )));
            }
        }

        for (field, cidr) in [
            ("networking.serviceCIDR", &self.networking.service_cidr),
            ("networking.podCIDR", &self.networking.pod_cidr),
            ("networking.machineCIDR", &self.networking.machine_cidr),
        ] {
            validate_cidr(cidr).map_err(|reason| {
                HcpError::validation(format!("{} '{}': {}", field, cidr, reason))
            })?;
        }

        if let Some(max_nodes) = self.autoscaling.max_nodes_total {
            if max_nodes < 0 {
                return Err(HcpError::validation(
                    "autoscaling.maxNodesTotal must be >= 0",
                ));
            }
        }
        if let Some(grace) = self.autoscaling.max_pod_grace_period {
            if grace < 0 {
                return Err(HcpError::validation(
                    "autoscaling.maxPodGracePeriod must be >= 0",
                ));
            }
        }
        if !self.autoscaling.max_node_provision_time.is_empty()
            && !duration_pattern().is_match(&self.autoscaling.max_node_provision_time)
        {
            return Err(HcpError::validation(format!(
                "autoscaling.maxNodeProvisionTime is not a duration: {}",
                self.autoscaling.max_node_provision_time
            )));
        }

        if let PlatformSpec::Aws(aws) = &self.platform {
            aws.validate()?;
        }

        let mut seen: BTreeSet<ServiceType> = BTreeSet::new();
        for mapping in &self.services {
            if !seen.insert(mapping.service) {
                return Err(HcpError::validation(format!(
                    "services has more than one mapping for {}",
                    mapping.service
                )));
            }
            mapping
                .service_publishing_strategy
                .resolve()
                .map_err(|reason| {
                    HcpError::validation(format!("services[{}]: {}", mapping.service, reason))
                })?;
        }

        Ok(())
    }

    pub fn publishing_for(
        &self,
        service: ServiceType,
    ) -> Option<&ServicePublishingStrategyMapping> {
        self.services.iter().find(|m| m.service == service)
    }
}

fn validate_cidr(cidr: &str) -> std::result::Result<(), String> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| "missing prefix length".to_string())?;
    let addr: IpAddr = addr
        .parse()
        .map_err(|e| format!("invalid address: {}", e))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|e| format!("invalid prefix length: {}", e))?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(format!("prefix length {} exceeds {}", prefix, max));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api::services::ServicePublishingStrategy;

    fn spec() -> HostedClusterSpec {
        HostedClusterSpec {
            release: Release {
                image: "quay.io/example/release:4.8.0".to_string(),
            },
            pull_secret: LocalObjectReference::new("pull-secret"),
            signing_key: LocalObjectReference::new("signing-key"),
            issuer_url: String::new(),
            ssh_key: LocalObjectReference::new("ssh-key"),
            networking: ClusterNetworking {
                service_cidr: "172.31.0.0/16".to_string(),
                pod_cidr: "10.132.0.0/14".to_string(),
                machine_cidr: "10.0.0.0/16".to_string(),
            },
            autoscaling: ClusterAutoscaling::default(),
            platform: PlatformSpec::None,
            infra_id: String::new(),
            dns: DNSSpec::default(),
            services: vec![],
            controller_availability_policy: AvailabilityPolicy::default(),
        }
    }

    #[test]
    fn test_valid_spec() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn test_release_image_required() {
        let mut s = spec();
        s.release.image = String::new();
        assert!(s.validate().is_err());

        s.release.image = " leading-space".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_autoscaling_defaults() {
        let autoscaling = ClusterAutoscaling::default();
        assert_eq!(autoscaling.max_pod_grace_period(), 600);
        assert_eq!(autoscaling.max_node_provision_time(), "15m");
        assert_eq!(autoscaling.pod_priority_threshold(), -10);
        assert_eq!(autoscaling.max_nodes_total, None);
    }

    #[test]
    fn test_autoscaling_provision_time_grammar() {
        let mut s = spec();
        s.autoscaling.max_node_provision_time = "1h30m".to_string();
        assert!(s.validate().is_ok());

        s.autoscaling.max_node_provision_time = "thirty minutes".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_duplicate_service_mapping_rejected() {
        let mut s = spec();
        s.services = vec![
            ServicePublishingStrategyMapping::new(
                ServiceType::APIServer,
                ServicePublishingStrategy::load_balancer(),
            ),
            ServicePublishingStrategyMapping::new(
                ServiceType::APIServer,
                ServicePublishingStrategy::route(),
            ),
        ];
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_invalid_cidr_rejected() {
        let mut s = spec();
        s.networking.pod_cidr = "10.0.0.0/40".to_string();
        assert!(s.validate().is_err());

        s.networking.pod_cidr = "fd00::/48".to_string();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_availability_policy_replicas() {
        assert_eq!(AvailabilityPolicy::HighlyAvailable.replicas(), 3);
        assert_eq!(AvailabilityPolicy::SingleReplica.replicas(), 1);
        assert_eq!(AvailabilityPolicy::default().replicas(), 1);
    }

    #[test]
    fn test_unset_availability_policy_decodes_to_single_replica() {
        let yaml = r#"
release: {image: quay.io/example/release:4.8.0}
pullSecret: {name: ps}
signingKey: {name: sk}
sshKey: {name: ssh}
networking: {serviceCIDR: 172.31.0.0/16, podCIDR: 10.132.0.0/14, machineCIDR: 10.0.0.0/16}
platform: {type: None}
"#;
        let s: HostedClusterSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            s.controller_availability_policy,
            AvailabilityPolicy::SingleReplica
        );
        assert!(s.services.is_empty());
    }
}
