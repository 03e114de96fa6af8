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

//! In-process object store used by `render` and the test suite.
//!
//! Mirrors the API server semantics the reconcile pass depends on:
//! monotonically increasing resource versions, create-if-absent, replace
//! guarded by version, idempotent delete. Conflicts can be injected per
//! object to exercise the in-pass retry path.

use crate::domain::api::{HostedCluster, HostedClusterStatus};
use crate::infrastructure::kubernetes::client::ObjectStore;
use crate::shared::error::{HcpError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type Key = (String, String);

#[derive(Debug, Clone)]
struct Bucket<K> {
    kind: &'static str,
    objects: BTreeMap<Key, K>,
}

impl<K: Resource + Clone> Bucket<K> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            objects: BTreeMap::new(),
        }
    }

    fn get(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn write(&mut self, obj: &K, version: u64) -> Result<K> {
        let name = obj.name_any();
        let namespace = obj.namespace().ok_or_else(|| {
            HcpError::validation(format!("{} '{}' has no namespace", self.kind, name))
        })?;
        let key = (namespace.clone(), name.clone());

        match (self.objects.get(&key), obj.resource_version()) {
            (Some(_), None) => {
                return Err(HcpError::conflict(self.kind, &name, "already exists"));
            }
            (None, Some(_)) => {
                return Err(HcpError::not_found(self.kind, &name, &namespace));
            }
            (Some(live), Some(expected))
                if live.resource_version().as_deref() != Some(expected.as_str()) =>
            {
                return Err(HcpError::conflict(
                    self.kind,
                    &name,
                    format!(
                        "resourceVersion {} does not match live {}",
                        expected,
                        live.resource_version().unwrap_or_default()
                    ),
                ));
            }
            _ => {}
        }

        let mut stored = obj.clone();
        let meta = stored.meta_mut();
        meta.resource_version = Some(version.to_string());
        if meta.uid.is_none() {
            meta.uid = Some(format!("{}-{}-{}", self.kind.to_lowercase(), name, version));
        }
        self.objects.insert(key, stored.clone());
        Ok(stored)
    }

    fn delete(&mut self, namespace: &str, name: &str) -> bool {
        self.objects
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some()
    }
}

#[derive(Debug)]
struct State {
    version: u64,
    secrets: Bucket<Secret>,
    services: Bucket<Service>,
    ingresses: Bucket<Ingress>,
    deployments: Bucket<Deployment>,
    clusters: Bucket<HostedCluster>,
    /// (kind, name) -> number of writes still to reject
    injected_conflicts: BTreeMap<(String, String), u32>,
    writes: BTreeMap<String, u64>,
    deletes: u64,
}

impl State {
    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn take_injected_conflict(&mut self, kind: &str, name: &str) -> Result<()> {
        let key = (kind.to_string(), name.to_string());
        if let Some(remaining) = self.injected_conflicts.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(HcpError::conflict(kind, name, "injected conflict"));
            }
        }
        Ok(())
    }

    fn count_write(&mut self, kind: &str) {
        *self.writes.entry(kind.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                version: 0,
                secrets: Bucket::new("Secret"),
                services: Bucket::new("Service"),
                ingresses: Bucket::new("Ingress"),
                deployments: Bucket::new("Deployment"),
                clusters: Bucket::new("HostedCluster"),
                injected_conflicts: BTreeMap::new(),
                writes: BTreeMap::new(),
                deletes: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a hosted cluster as if a user had applied it.
    pub fn insert_hosted_cluster(&self, cluster: &HostedCluster) -> Result<HostedCluster> {
        let mut state = self.lock();
        let version = state.next_version();
        let mut fresh = cluster.clone();
        fresh.metadata.resource_version = None;
        if let Some(live) = state
            .clusters
            .get(&fresh.namespace().unwrap_or_default(), &fresh.name_any())
        {
            fresh.metadata.resource_version = live.metadata.resource_version.clone();
            fresh.metadata.uid = live.metadata.uid.clone();
            fresh.status = live.status.clone();
        }
        state.clusters.write(&fresh, version)
    }

    /// Rejects the next `count` writes of the named object with a conflict.
    pub fn inject_conflicts(&self, kind: &str, name: &str, count: u32) {
        self.lock()
            .injected_conflicts
            .insert((kind.to_string(), name.to_string()), count);
    }

    /// Applies an out-of-band change to a live service, as the platform
    /// would when assigning node ports or load balancer addresses.
    pub fn mutate_service<F>(&self, namespace: &str, name: &str, f: F) -> Result<Service>
    where
        F: FnOnce(&mut Service),
    {
        let mut state = self.lock();
        let mut live = state
            .services
            .get(namespace, name)
            .ok_or_else(|| HcpError::not_found("Service", name, namespace))?;
        f(&mut live);
        let version = state.next_version();
        state.services.write(&live, version)
    }

    /// Deletes a secret out of band, as an administrator would.
    pub fn remove_secret(&self, namespace: &str, name: &str) -> bool {
        self.lock().secrets.delete(namespace, name)
    }

    pub fn writes(&self) -> u64 {
        self.lock().writes.values().sum()
    }

    pub fn writes_of(&self, kind: &str) -> u64 {
        self.lock().writes.get(kind).copied().unwrap_or(0)
    }

    pub fn deletes(&self) -> u64 {
        self.lock().deletes
    }

    pub fn secrets(&self) -> Vec<Secret> {
        self.lock().secrets.objects.values().cloned().collect()
    }

    pub fn services(&self) -> Vec<Service> {
        self.lock().services.objects.values().cloned().collect()
    }

    pub fn ingresses(&self) -> Vec<Ingress> {
        self.lock().ingresses.objects.values().cloned().collect()
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        self.lock().deployments.objects.values().cloned().collect()
    }
}

macro_rules! write_counted {
    ($self:ident, $bucket:ident, $obj:expr) => {{
        let mut state = $self.lock();
        let kind = state.$bucket.kind;
        state.take_injected_conflict(kind, &$obj.name_any())?;
        let version = state.next_version();
        let written = state.$bucket.write($obj, version)?;
        state.count_write(kind);
        Ok(written)
    }};
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.lock().secrets.get(namespace, name))
    }

    async fn write_secret(&self, secret: &Secret) -> Result<Secret> {
        write_counted!(self, secrets, secret)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        Ok(self.lock().services.get(namespace, name))
    }

    async fn write_service(&self, service: &Service) -> Result<Service> {
        write_counted!(self, services, service)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.services.delete(namespace, name) {
            state.deletes += 1;
        }
        Ok(())
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        Ok(self.lock().ingresses.get(namespace, name))
    }

    async fn write_ingress(&self, ingress: &Ingress) -> Result<Ingress> {
        write_counted!(self, ingresses, ingress)
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.ingresses.delete(namespace, name) {
            state.deletes += 1;
        }
        Ok(())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        Ok(self.lock().deployments.get(namespace, name))
    }

    async fn write_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        write_counted!(self, deployments, deployment)
    }

    async fn get_hosted_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<HostedCluster>> {
        Ok(self.lock().clusters.get(namespace, name))
    }

    async fn list_hosted_clusters(&self, namespace: Option<&str>) -> Result<Vec<HostedCluster>> {
        Ok(self
            .lock()
            .clusters
            .objects
            .iter()
            .filter(|((ns, _), _)| namespace.map_or(true, |wanted| wanted == ns))
            .map(|(_, hc)| hc.clone())
            .collect())
    }

    async fn write_hosted_cluster_status(
        &self,
        cluster: &HostedCluster,
        status: &HostedClusterStatus,
    ) -> Result<HostedCluster> {
        let mut state = self.lock();
        let name = cluster.name_any();
        state.take_injected_conflict("HostedCluster", &name)?;

        let namespace = cluster.namespace().unwrap_or_default();
        let mut live = state
            .clusters
            .get(&namespace, &name)
            .ok_or_else(|| HcpError::not_found("HostedCluster", &name, &namespace))?;
        if cluster.resource_version().is_some()
            && live.resource_version() != cluster.resource_version()
        {
            return Err(HcpError::conflict(
                "HostedCluster",
                &name,
                "status written against a stale resourceVersion",
            ));
        }
        live.status = Some(status.clone());
        let version = state.next_version();
        let written = state.clusters.write(&live, version)?;
        state.count_write("HostedClusterStatus");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn secret(name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("clusters".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_replace_bumps_version() {
        let store = MemoryObjectStore::new();
        let created = store.write_secret(&secret("a")).await.unwrap();
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));

        let replaced = store.write_secret(&created).await.unwrap();
        assert_eq!(replaced.metadata.resource_version.as_deref(), Some("2"));
        assert_eq!(store.writes_of("Secret"), 2);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = MemoryObjectStore::new();
        let created = store.write_secret(&secret("a")).await.unwrap();
        store.write_secret(&created).await.unwrap();

        let err = store.write_secret(&created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_create_over_existing_conflicts() {
        let store = MemoryObjectStore::new();
        store.write_secret(&secret("a")).await.unwrap();
        assert!(store.write_secret(&secret("a")).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let store = MemoryObjectStore::new();
        store.inject_conflicts("Secret", "a", 2);
        assert!(store.write_secret(&secret("a")).await.is_err());
        assert!(store.write_secret(&secret("a")).await.is_err());
        assert!(store.write_secret(&secret("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let store = MemoryObjectStore::new();
        store.delete_service("clusters", "nope").await.unwrap();
        assert_eq!(store.deletes(), 0);
    }
}
