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

//! Publishing strategy types for control plane services

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Control plane services that can be exposed from the management cluster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum ServiceType {
    APIServer,
    VPN,
    OAuthServer,
    OIDC,
}

impl ServiceType {
    pub const ALL: [ServiceType; 4] = [
        ServiceType::APIServer,
        ServiceType::VPN,
        ServiceType::OAuthServer,
        ServiceType::OIDC,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::APIServer => "APIServer",
            ServiceType::VPN => "VPN",
            ServiceType::OAuthServer => "OAuthServer",
            ServiceType::OIDC => "OIDC",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum PublishingStrategyType {
    LoadBalancer,
    NodePort,
    Route,
    None,
}

impl PublishingStrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishingStrategyType::LoadBalancer => "LoadBalancer",
            PublishingStrategyType::NodePort => "NodePort",
            PublishingStrategyType::Route => "Route",
            PublishingStrategyType::None => "None",
        }
    }
}

/// Network endpoint used to contact a NodePort service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePortPublishingStrategy {
    /// Host or IP the node port is reachable on
    pub address: String,
    /// Fixed node port; zero or negative lets the platform assign one
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: i32,
}

fn is_zero(port: &i32) -> bool {
    *port == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServicePublishingStrategy {
    #[serde(rename = "type")]
    pub type_: PublishingStrategyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<NodePortPublishingStrategy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServicePublishingStrategyMapping {
    pub service: ServiceType,
    pub service_publishing_strategy: ServicePublishingStrategy,
}

/// Resolved publishing strategy with its payload checked against the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishingStrategy {
    LoadBalancer,
    NodePort {
        address: String,
        /// `None` means the platform picks the port
        port: Option<i32>,
    },
    Route,
    None,
}

impl ServicePublishingStrategy {
    pub fn load_balancer() -> Self {
        Self {
            type_: PublishingStrategyType::LoadBalancer,
            node_port: None,
        }
    }

    pub fn node_port(address: impl Into<String>, port: i32) -> Self {
        Self {
            type_: PublishingStrategyType::NodePort,
            node_port: Some(NodePortPublishingStrategy {
                address: address.into(),
                port,
            }),
        }
    }

    pub fn route() -> Self {
        Self {
            type_: PublishingStrategyType::Route,
            node_port: None,
        }
    }

    pub fn none() -> Self {
        Self {
            type_: PublishingStrategyType::None,
            node_port: None,
        }
    }

    /// Check the node port payload against the strategy type.
    pub fn resolve(&self) -> Result<PublishingStrategy, String> {
        match (self.type_, &self.node_port) {
            (PublishingStrategyType::NodePort, Some(np)) => Ok(PublishingStrategy::NodePort {
                address: np.address.clone(),
                port: if np.port > 0 { Some(np.port) } else { None },
            }),
            (PublishingStrategyType::NodePort, None) => Ok(PublishingStrategy::NodePort {
                address: String::new(),
                port: None,
            }),
            (other, Some(_)) => Err(format!(
                "nodePort settings are only valid with the NodePort strategy, got {}",
                other.as_str()
            )),
            (PublishingStrategyType::LoadBalancer, None) => Ok(PublishingStrategy::LoadBalancer),
            (PublishingStrategyType::Route, None) => Ok(PublishingStrategy::Route),
            (PublishingStrategyType::None, None) => Ok(PublishingStrategy::None),
        }
    }
}

impl ServicePublishingStrategyMapping {
    pub fn new(service: ServiceType, strategy: ServicePublishingStrategy) -> Self {
        Self {
            service,
            service_publishing_strategy: strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_port_without_port_is_dynamic() {
        let strategy = ServicePublishingStrategy::node_port("10.0.0.1", 0);
        assert_eq!(
            strategy.resolve().unwrap(),
            PublishingStrategy::NodePort {
                address: "10.0.0.1".to_string(),
                port: None
            }
        );

        let negative = ServicePublishingStrategy::node_port("10.0.0.1", -5);
        assert!(matches!(
            negative.resolve().unwrap(),
            PublishingStrategy::NodePort { port: None, .. }
        ));
    }

    #[test]
    fn test_node_port_payload_rejected_for_other_types() {
        let strategy = ServicePublishingStrategy {
            type_: PublishingStrategyType::LoadBalancer,
            node_port: Some(NodePortPublishingStrategy {
                address: "x".to_string(),
                port: 30000,
            }),
        };
        assert!(strategy.resolve().is_err());
    }

    #[test]
    fn test_mapping_wire_format() {
        let yaml = r#"
service: APIServer
servicePublishingStrategy:
  type: NodePort
  nodePort:
    address: 192.168.1.10
    port: 30443
"#;
        let mapping: ServicePublishingStrategyMapping = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(mapping.service, ServiceType::APIServer);
        assert_eq!(
            mapping.service_publishing_strategy,
            ServicePublishingStrategy::node_port("192.168.1.10", 30443)
        );
    }
}
