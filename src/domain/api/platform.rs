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

//! Platform section of the hosted cluster desired state.
//!
//! On the wire the platform is a discriminator plus one optional payload per
//! platform (`{type: AWS, aws: {...}}`). In Rust it is a sum type, so every
//! consumer matches exhaustively and a payload that disagrees with its tag is
//! rejected while decoding.

use crate::domain::api::LocalObjectReference;
use crate::shared::error::HcpError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum PlatformType {
    AWS,
    None,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::AWS => "AWS",
            PlatformType::None => "None",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPlatformSpec", into = "RawPlatformSpec")]
pub enum PlatformSpec {
    #[default]
    None,
    Aws(AWSPlatformSpec),
}

impl PlatformSpec {
    pub fn platform_type(&self) -> PlatformType {
        match self {
            PlatformSpec::None => PlatformType::None,
            PlatformSpec::Aws(_) => PlatformType::AWS,
        }
    }

    pub fn aws(&self) -> Option<&AWSPlatformSpec> {
        match self {
            PlatformSpec::Aws(aws) => Some(aws),
            PlatformSpec::None => None,
        }
    }
}

/// Wire shape of [`PlatformSpec`], also used for the CRD schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RawPlatformSpec {
    #[serde(rename = "type")]
    pub type_: PlatformType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AWSPlatformSpec>,
}

impl TryFrom<RawPlatformSpec> for PlatformSpec {
    type Error = HcpError;

    fn try_from(raw: RawPlatformSpec) -> Result<Self, Self::Error> {
        match (raw.type_, raw.aws) {
            (PlatformType::AWS, Some(aws)) => Ok(PlatformSpec::Aws(aws)),
            (PlatformType::AWS, None) => Err(HcpError::validation(
                "platform.type is AWS but platform.aws is not set",
            )),
            (PlatformType::None, None) => Ok(PlatformSpec::None),
            (PlatformType::None, Some(_)) => Err(HcpError::validation(
                "platform.aws is set but platform.type is None",
            )),
        }
    }
}

impl From<PlatformSpec> for RawPlatformSpec {
    fn from(spec: PlatformSpec) -> Self {
        match spec {
            PlatformSpec::None => RawPlatformSpec {
                type_: PlatformType::None,
                aws: None,
            },
            PlatformSpec::Aws(aws) => RawPlatformSpec {
                type_: PlatformType::AWS,
                aws: Some(aws),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AWSPlatformSpec {
    pub region: String,
    pub vpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_pool_defaults: Option<AWSNodePoolPlatform>,
    /// Overrides for AWS service endpoints, at most one per service name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_endpoints: Vec<AWSServiceEndpoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<AWSRoleCredentials>,
    /// Secret with a `credentials` key for the cloud controller
    pub kube_cloud_controller_creds: LocalObjectReference,
    /// Secret with a `credentials` key for node pool management
    pub node_pool_management_creds: LocalObjectReference,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AWSNodePoolPlatform {
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_volume: Option<AWSVolume>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AWSVolume {
    /// Size in GiB
    pub size: i64,
    #[serde(rename = "type", default)]
    pub type_: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AWSServiceEndpoint {
    pub name: String,
    /// Must use the https scheme
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AWSRoleCredentials {
    pub arn: String,
    pub namespace: String,
    pub name: String,
}

impl AWSPlatformSpec {
    pub fn validate(&self) -> Result<(), HcpError> {
        if self.region.is_empty() {
            return Err(HcpError::validation("platform.aws.region must be set"));
        }
        if self.kube_cloud_controller_creds.name.is_empty() {
            return Err(HcpError::validation(
                "platform.aws.kubeCloudControllerCreds.name must be set",
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for endpoint in &self.service_endpoints {
            if endpoint.name.is_empty() {
                return Err(HcpError::validation(
                    "platform.aws.serviceEndpoints[].name must not be empty",
                ));
            }
            if !endpoint.url.starts_with("https://") {
                return Err(HcpError::validation(format!(
                    "platform.aws.serviceEndpoints[{}].url must use https: {}",
                    endpoint.name, endpoint.url
                )));
            }
            if !seen.insert(endpoint.name.as_str()) {
                return Err(HcpError::validation(format!(
                    "platform.aws.serviceEndpoints has more than one entry for '{}'",
                    endpoint.name
                )));
            }
        }

        for role in &self.roles {
            if !role.arn.starts_with("arn:") {
                return Err(HcpError::validation(format!(
                    "platform.aws.roles[{}/{}].arn is not an ARN: {}",
                    role.namespace, role.name, role.arn
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws_spec() -> AWSPlatformSpec {
        AWSPlatformSpec {
            region: "us-east-1".to_string(),
            vpc: "vpc-123".to_string(),
            kube_cloud_controller_creds: LocalObjectReference::new("kcc-creds"),
            node_pool_management_creds: LocalObjectReference::new("npm-creds"),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_aws_platform() {
        let yaml = r#"
type: AWS
aws:
  region: us-west-2
  vpc: vpc-abc
  kubeCloudControllerCreds:
    name: kcc
  nodePoolManagementCreds:
    name: npm
"#;
        let spec: PlatformSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.platform_type(), PlatformType::AWS);
        assert_eq!(spec.aws().unwrap().region, "us-west-2");
    }

    #[test]
    fn test_decode_rejects_mismatched_discriminator() {
        let missing_payload = "type: AWS\n";
        assert!(serde_yaml::from_str::<PlatformSpec>(missing_payload).is_err());

        let extra_payload = r#"
type: None
aws:
  region: us-west-2
  vpc: vpc-abc
  kubeCloudControllerCreds:
    name: kcc
  nodePoolManagementCreds:
    name: npm
"#;
        assert!(serde_yaml::from_str::<PlatformSpec>(extra_payload).is_err());
    }

    #[test]
    fn test_encode_keeps_wire_shape() {
        let json = serde_json::to_value(PlatformSpec::Aws(aws_spec())).unwrap();
        assert_eq!(json["type"], "AWS");
        assert_eq!(json["aws"]["region"], "us-east-1");

        let none = serde_json::to_value(PlatformSpec::None).unwrap();
        assert_eq!(none, serde_json::json!({"type": "None"}));
    }

    #[test]
    fn test_service_endpoint_validation() {
        let mut spec = aws_spec();
        spec.service_endpoints = vec![AWSServiceEndpoint {
            name: "ec2".to_string(),
            url: "http://ec2.local".to_string(),
        }];
        assert!(spec.validate().is_err());

        spec.service_endpoints = vec![
            AWSServiceEndpoint {
                name: "ec2".to_string(),
                url: "https://ec2.local".to_string(),
            },
            AWSServiceEndpoint {
                name: "ec2".to_string(),
                url: "https://ec2-2.local".to_string(),
            },
        ];
        assert!(spec.validate().is_err());

        spec.service_endpoints.pop();
        assert!(spec.validate().is_ok());
    }
}
