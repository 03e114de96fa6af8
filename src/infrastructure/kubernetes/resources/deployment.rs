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

use crate::domain::synthesis::{ComponentParams, ProbeSpec};
use crate::infrastructure::constants::*;
use crate::infrastructure::kubernetes::resources::merge_metadata;
use crate::shared::error::Result;
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMapVolumeSource, Container, ContainerPort, HTTPGetAction, PodAffinityTerm,
    PodAntiAffinity, PodSpec, PodTemplateSpec, Probe, ResourceRequirements, SecretVolumeSource,
    Volume, VolumeMount, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const PARAMS_HASH_ANNOTATION: &str = "hcp.dev/params-hash";

/// Digest of the synthesized parameters; unchanged params mean the live
/// deployment is already current.
pub fn params_hash(params: &ComponentParams) -> Result<String> {
    let canonical = params.fingerprint()?;
    Ok(format!("{:x}", Sha256::digest(canonical.as_bytes())))
}

/// Renders component parameters into a Deployment.
pub struct DeploymentBuilder {
    metadata: ObjectMeta,
    params: ComponentParams,
}

impl DeploymentBuilder {
    pub fn new(metadata: ObjectMeta, params: ComponentParams) -> Self {
        Self { metadata, params }
    }

    pub fn build(&self) -> Result<Deployment> {
        let hash = params_hash(&self.params)?;
        let mut metadata = self.metadata.clone();
        metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(PARAMS_HASH_ANNOTATION.to_string(), hash.clone());

        let mut pod_labels = self.metadata.labels.clone().unwrap_or_default();
        pod_labels.extend(self.params.labels.clone());

        Ok(Deployment {
            metadata,
            spec: Some(DeploymentSpec {
                replicas: Some(self.params.replicas),
                selector: LabelSelector {
                    match_labels: Some(self.params.labels.clone()),
                    ..Default::default()
                },
                strategy: Some(DeploymentStrategy {
                    type_: Some("RollingUpdate".to_string()),
                    rolling_update: Some(RollingUpdateDeployment {
                        max_surge: Some(IntOrString::String(MAX_SURGE.to_string())),
                        max_unavailable: Some(IntOrString::String(MAX_UNAVAILABLE.to_string())),
                    }),
                }),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(pod_labels),
                        annotations: Some(BTreeMap::from([(
                            PARAMS_HASH_ANNOTATION.to_string(),
                            hash,
                        )])),
                        ..Default::default()
                    }),
                    spec: Some(self.build_pod_spec()),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn build_pod_spec(&self) -> PodSpec {
        let volumes = self.build_volumes();
        PodSpec {
            containers: vec![self.build_container()],
            volumes: if volumes.is_empty() {
                None
            } else {
                Some(volumes)
            },
            priority_class_name: Some(self.params.scheduling.priority_class.clone()),
            restart_policy: Some(RESTART_POLICY_ALWAYS.to_string()),
            affinity: self.build_affinity(),
            automount_service_account_token: Some(false),
            ..Default::default()
        }
    }

    fn build_container(&self) -> Container {
        let mounts = self.build_volume_mounts();
        Container {
            name: self.params.component.clone(),
            image: Some(self.params.image.clone()),
            args: if self.params.args.is_empty() {
                None
            } else {
                Some(self.params.args.clone())
            },
            ports: Some(vec![ContainerPort {
                container_port: self.params.port,
                name: Some(PORT_NAME_HTTPS.to_string()),
                protocol: Some(PROTOCOL_TCP.to_string()),
                ..Default::default()
            }]),
            liveness_probe: Some(build_probe(&self.params.liveness_probe)),
            readiness_probe: Some(build_probe(&self.params.readiness_probe)),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([
                    (
                        "cpu".to_string(),
                        Quantity(self.params.resources.cpu.clone()),
                    ),
                    (
                        "memory".to_string(),
                        Quantity(self.params.resources.memory.clone()),
                    ),
                ])),
                ..Default::default()
            }),
            volume_mounts: if mounts.is_empty() { None } else { Some(mounts) },
            ..Default::default()
        }
    }

    fn build_volumes(&self) -> Vec<Volume> {
        let mut volumes = Vec::new();

        if let Some(secret) = &self.params.serving_cert_secret {
            volumes.push(Volume {
                name: VOLUME_NAME_SERVING_CERT.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }

        if let Some(cloud) = &self.params.cloud_provider {
            volumes.push(Volume {
                name: VOLUME_NAME_CLOUD_CONFIG.to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: cloud.config.name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            });
            volumes.push(Volume {
                name: VOLUME_NAME_CLOUD_CREDS.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(cloud.credentials.name.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }

        volumes
    }

    fn build_volume_mounts(&self) -> Vec<VolumeMount> {
        let mut mounts = Vec::new();

        if self.params.serving_cert_secret.is_some() {
            mounts.push(VolumeMount {
                name: VOLUME_NAME_SERVING_CERT.to_string(),
                mount_path: SERVING_CERT_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            });
        }

        if self.params.cloud_provider.is_some() {
            mounts.push(VolumeMount {
                name: VOLUME_NAME_CLOUD_CONFIG.to_string(),
                mount_path: CLOUD_CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            });
            mounts.push(VolumeMount {
                name: VOLUME_NAME_CLOUD_CREDS.to_string(),
                mount_path: CLOUD_CREDS_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            });
        }

        mounts
    }

    /// Spread replicas across hosts when there is more than one.
    fn build_affinity(&self) -> Option<Affinity> {
        if self.params.replicas <= 1 {
            return None;
        }
        Some(Affinity {
            pod_anti_affinity: Some(PodAntiAffinity {
                preferred_during_scheduling_ignored_during_execution: Some(vec![
                    WeightedPodAffinityTerm {
                        weight: 100,
                        pod_affinity_term: PodAffinityTerm {
                            label_selector: Some(LabelSelector {
                                match_labels: Some(self.params.labels.clone()),
                                ..Default::default()
                            }),
                            topology_key: TOPOLOGY_KEY_HOSTNAME.to_string(),
                            ..Default::default()
                        },
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

fn build_probe(spec: &ProbeSpec) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(spec.path.clone()),
            port: IntOrString::Int(spec.port),
            scheme: Some(spec.scheme.clone()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(spec.initial_delay_seconds),
        timeout_seconds: Some(spec.timeout_seconds),
        period_seconds: Some(spec.period_seconds),
        failure_threshold: Some(spec.failure_threshold),
        success_threshold: Some(spec.success_threshold),
        ..Default::default()
    }
}

/// Whether the live deployment was rendered from the same parameters.
pub fn deployment_up_to_date(desired: &Deployment, existing: &Deployment) -> bool {
    let hash_of = |d: &Deployment| {
        d.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(PARAMS_HASH_ANNOTATION).cloned())
    };
    let desired_replicas = desired.spec.as_ref().and_then(|s| s.replicas);
    let live_replicas = existing.spec.as_ref().and_then(|s| s.replicas);
    hash_of(desired).is_some()
        && hash_of(desired) == hash_of(existing)
        && desired_replicas == live_replicas
}

/// `spec` is owned outright; metadata is overlaid.
pub fn merge_deployment(desired: &Deployment, existing: Option<&Deployment>) -> Deployment {
    let mut merged = existing.cloned().unwrap_or_default();
    merged.metadata = merge_metadata(&desired.metadata, &merged.metadata);
    merged.spec = desired.spec.clone();
    merged
}
