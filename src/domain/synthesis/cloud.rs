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

//! Platform context and the cloud-provider registry.

use crate::domain::api::{LocalObjectReference, PlatformSpec, PlatformType};
use crate::infrastructure::constants::{AWS_PROVIDER_CONFIG_NAME, AWS_PROVIDER_NAME};
use crate::shared::error::{HcpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which platform credential a cloud provider consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSelector {
    KubeCloudController,
    NodePoolManagement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudProviderDescriptor {
    pub provider_name: &'static str,
    pub config_name: &'static str,
    pub credentials: CredentialSelector,
}

/// Resolved cloud-provider wiring for a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderWiring {
    pub provider: String,
    pub config: LocalObjectReference,
    pub credentials: LocalObjectReference,
}

/// Platform type to provider table. `None` entries are platforms that run
/// without cloud integration; absent entries are unsupported platforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudProviderRegistry {
    entries: BTreeMap<PlatformType, Option<CloudProviderDescriptor>>,
}

impl CloudProviderRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        Self::empty()
            .register(
                PlatformType::AWS,
                Some(CloudProviderDescriptor {
                    provider_name: AWS_PROVIDER_NAME,
                    config_name: AWS_PROVIDER_CONFIG_NAME,
                    credentials: CredentialSelector::KubeCloudController,
                }),
            )
            .register(PlatformType::None, None)
    }

    pub fn register(
        mut self,
        platform: PlatformType,
        descriptor: Option<CloudProviderDescriptor>,
    ) -> Self {
        self.entries.insert(platform, descriptor);
        self
    }

    pub fn lookup(&self, platform: PlatformType) -> Result<Option<&CloudProviderDescriptor>> {
        self.entries
            .get(&platform)
            .map(Option::as_ref)
            .ok_or_else(|| {
                HcpError::validation(format!(
                    "no cloud provider registered for platform type '{}'",
                    platform
                ))
            })
    }
}

impl Default for CloudProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Region, VPC and credential names of the active platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformContext {
    pub platform_type: PlatformType,
    pub region: Option<String>,
    pub vpc: Option<String>,
    pub kube_cloud_controller_creds: Option<LocalObjectReference>,
    pub node_pool_management_creds: Option<LocalObjectReference>,
    pub registry: CloudProviderRegistry,
}

impl PlatformContext {
    pub fn from_spec(spec: &PlatformSpec) -> Self {
        let base = Self {
            platform_type: spec.platform_type(),
            region: None,
            vpc: None,
            kube_cloud_controller_creds: None,
            node_pool_management_creds: None,
            registry: CloudProviderRegistry::builtin(),
        };
        match spec {
            PlatformSpec::None => base,
            PlatformSpec::Aws(aws) => Self {
                region: Some(aws.region.clone()),
                vpc: Some(aws.vpc.clone()),
                kube_cloud_controller_creds: Some(aws.kube_cloud_controller_creds.clone()),
                node_pool_management_creds: Some(aws.node_pool_management_creds.clone()),
                ..base
            },
        }
    }

    pub fn with_registry(mut self, registry: CloudProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    fn credential(&self, selector: CredentialSelector) -> Option<&LocalObjectReference> {
        match selector {
            CredentialSelector::KubeCloudController => self.kube_cloud_controller_creds.as_ref(),
            CredentialSelector::NodePoolManagement => self.node_pool_management_creds.as_ref(),
        }
    }

    /// Cloud-provider wiring for this platform, `None` for platforms that
    /// have no cloud integration. Unregistered platforms fail.
    pub fn cloud_provider(&self) -> Result<Option<CloudProviderWiring>> {
        let descriptor = match self.registry.lookup(self.platform_type)? {
            Some(descriptor) => descriptor,
            None => return Ok(None),
        };
        let credentials = self
            .credential(descriptor.credentials)
            .filter(|c| !c.name.is_empty())
            .cloned()
            .ok_or_else(|| {
                HcpError::validation(format!(
                    "platform '{}' requires {:?} credentials",
                    self.platform_type, descriptor.credentials
                ))
            })?;

        Ok(Some(CloudProviderWiring {
            provider: descriptor.provider_name.to_string(),
            config: LocalObjectReference::new(descriptor.config_name),
            credentials,
        }))
    }
}
