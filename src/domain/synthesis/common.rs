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

//! Types shared by every component synthesizer.

use super::cloud::{CloudProviderWiring, PlatformContext};
use super::images::ImageRefs;
use crate::domain::api::HostedClusterSpec;
use crate::infrastructure::constants::*;
use crate::shared::error::{HcpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSpec {
    pub path: String,
    pub port: i32,
    pub scheme: String,
    pub initial_delay_seconds: i32,
    pub timeout_seconds: i32,
    pub period_seconds: i32,
    pub failure_threshold: i32,
    pub success_threshold: i32,
}

impl ProbeSpec {
    fn healthz(port: i32, scheme: &str, initial_delay_seconds: i32) -> Self {
        Self {
            path: HEALTHZ_PATH.to_string(),
            port,
            scheme: scheme.to_string(),
            initial_delay_seconds,
            timeout_seconds: PROBE_TIMEOUT,
            period_seconds: PROBE_PERIOD,
            failure_threshold: PROBE_FAILURE_THRESHOLD,
            success_threshold: PROBE_SUCCESS_THRESHOLD,
        }
    }

    pub fn https_liveness(port: i32) -> Self {
        Self::healthz(port, SCHEME_HTTPS, LIVENESS_INITIAL_DELAY)
    }

    pub fn https_readiness(port: i32) -> Self {
        Self::healthz(port, SCHEME_HTTPS, READINESS_INITIAL_DELAY)
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }
}

/// Baseline resource requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequests {
    pub memory: String,
    pub cpu: String,
}

impl ResourceRequests {
    pub fn new(memory: &str, cpu: &str) -> Self {
        Self {
            memory: memory.to_string(),
            cpu: cpu.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    pub priority_class: String,
}

/// Everything needed to render one control plane workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentParams {
    pub component: String,
    pub image: String,
    pub port: i32,
    pub replicas: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    pub liveness_probe: ProbeSpec,
    pub readiness_probe: ProbeSpec,
    pub resources: ResourceRequests,
    pub scheduling: Scheduling,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<CloudProviderWiring>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_cert_secret: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl ComponentParams {
    /// Canonical serialized form, used to compare synthesized output.
    pub fn fingerprint(&self) -> Result<String> {
        serde_json::to_string(self).map_err(HcpError::from)
    }
}

/// Inputs of one synthesis call. Nothing else is consulted.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub cluster: &'a HostedClusterSpec,
    pub platform: &'a PlatformContext,
    pub images: &'a ImageRefs,
}

impl<'a> SynthesisInput<'a> {
    pub fn new(
        cluster: &'a HostedClusterSpec,
        platform: &'a PlatformContext,
        images: &'a ImageRefs,
    ) -> Self {
        Self {
            cluster,
            platform,
            images,
        }
    }

    /// Rejects a context built for another platform than the cluster's.
    pub fn check_platform(&self) -> Result<()> {
        let declared = self.cluster.platform.platform_type();
        if declared != self.platform.platform_type {
            return Err(HcpError::validation(format!(
                "platform context is for '{}' but cluster declares '{}'",
                self.platform.platform_type, declared
            )));
        }
        Ok(())
    }

    pub fn replicas(&self) -> i32 {
        self.cluster.controller_availability_policy.replicas()
    }
}

/// Pure mapping from desired state to component parameters.
pub trait Synthesizer: Send + Sync {
    fn component(&self) -> &'static str;

    fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<ComponentParams>;
}

/// Pod selector for a component. Built fresh on every call so no caller
/// can mutate a shared label set.
pub fn selector_labels(component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(LABEL_APP.to_string(), component.to_string())])
}
