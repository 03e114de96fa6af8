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

//! Ownership and labelling of objects created for a hosted cluster.
//!
//! Owned objects carry a controller owner reference back to their
//! `HostedCluster`; cascading deletion is left to the API server's garbage
//! collector.

use crate::domain::api::HostedCluster;
use crate::infrastructure::constants::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Identity of the hosted cluster that owns every object of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerContext {
    pub cluster_name: String,
    pub namespace: String,
    pub owner: OwnerReference,
}

impl OwnerContext {
    pub fn for_cluster(cluster: &HostedCluster) -> Self {
        let owner = OwnerReference {
            api_version: HostedCluster::api_version(&()).to_string(),
            kind: HostedCluster::kind(&()).to_string(),
            name: cluster.name_any(),
            uid: cluster.uid().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        };
        Self {
            cluster_name: cluster.name_any(),
            namespace: cluster.namespace().unwrap_or_else(|| "default".to_string()),
            owner,
        }
    }

    pub fn labels(&self, component: &str) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_MANAGED_BY.to_string(), OPERATOR_NAME.to_string());
        labels.insert(LABEL_HOSTED_CLUSTER.to_string(), self.cluster_name.clone());
        labels.insert(LABEL_COMPONENT.to_string(), component.to_string());
        labels
    }

    /// Desired metadata for an owned object.
    pub fn object_meta(&self, name: &str, component: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels(component)),
            owner_references: Some(vec![self.owner.clone()]),
            ..Default::default()
        }
    }
}

/// Overlay desired metadata onto a live object's metadata.
///
/// Labels and annotations named in `desired` win; keys set by anyone else
/// survive. The owner reference is added when missing, never duplicated.
pub fn merge_metadata(desired: &ObjectMeta, existing: &ObjectMeta) -> ObjectMeta {
    let mut merged = existing.clone();
    if merged.name.is_none() {
        merged.name = desired.name.clone();
    }
    if merged.namespace.is_none() {
        merged.namespace = desired.namespace.clone();
    }

    if let Some(labels) = &desired.labels {
        let target = merged.labels.get_or_insert_with(BTreeMap::new);
        for (k, v) in labels {
            target.insert(k.clone(), v.clone());
        }
    }
    if let Some(annotations) = &desired.annotations {
        let target = merged.annotations.get_or_insert_with(BTreeMap::new);
        for (k, v) in annotations {
            target.insert(k.clone(), v.clone());
        }
    }

    for owner in desired.owner_references.iter().flatten() {
        let refs = merged.owner_references.get_or_insert_with(Vec::new);
        if !refs.iter().any(|r| r.uid == owner.uid && r.kind == owner.kind) {
            refs.push(owner.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerContext {
        OwnerContext {
            cluster_name: "example".to_string(),
            namespace: "clusters".to_string(),
            owner: OwnerReference {
                api_version: "hcp.dev/v1alpha1".to_string(),
                kind: "HostedCluster".to_string(),
                name: "example".to_string(),
                uid: "uid-1".to_string(),
                controller: Some(true),
                block_owner_deletion: Some(true),
            },
        }
    }

    #[test]
    fn test_merge_keeps_foreign_labels_and_annotations() {
        let desired = owner().object_meta("kube-apiserver", "kube-apiserver");
        let mut existing = ObjectMeta {
            name: Some("kube-apiserver".to_string()),
            resource_version: Some("42".to_string()),
            ..Default::default()
        };
        existing.labels = Some(BTreeMap::from([(
            "team".to_string(),
            "platform".to_string(),
        )]));
        existing.annotations = Some(BTreeMap::from([(
            "service.beta.kubernetes.io/aws-load-balancer-type".to_string(),
            "nlb".to_string(),
        )]));

        let merged = merge_metadata(&desired, &existing);
        let labels = merged.labels.as_ref().unwrap();
        assert_eq!(labels.get("team").map(String::as_str), Some("platform"));
        assert_eq!(
            labels.get(LABEL_MANAGED_BY).map(String::as_str),
            Some("hcp-kube")
        );
        assert!(merged
            .annotations
            .as_ref()
            .unwrap()
            .contains_key("service.beta.kubernetes.io/aws-load-balancer-type"));
        assert_eq!(merged.resource_version.as_deref(), Some("42"));
    }

    #[test]
    fn test_owner_reference_not_duplicated() {
        let desired = owner().object_meta("oidc", "oidc");
        let once = merge_metadata(&desired, &ObjectMeta::default());
        let twice = merge_metadata(&desired, &once);
        assert_eq!(twice.owner_references.as_ref().unwrap().len(), 1);
        assert_eq!(once, twice);
    }
}
