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

use crate::domain::api::{HostedCluster, HostedClusterStatus};
use crate::shared::error::{HcpError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Typed access to the objects a reconcile pass reads and writes.
///
/// `write_*` creates the object when it carries no `resourceVersion` and
/// replaces it otherwise; a stale version surfaces as `HcpError::Conflict`.
/// `get_*` maps a missing object to `None`. `delete_*` on a missing object
/// is a no-op.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    async fn write_secret(&self, secret: &Secret) -> Result<Secret>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;

    async fn write_service(&self, service: &Service) -> Result<Service>;

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>>;

    async fn write_ingress(&self, ingress: &Ingress) -> Result<Ingress>;

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<()>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>>;

    async fn write_deployment(&self, deployment: &Deployment) -> Result<Deployment>;

    async fn get_hosted_cluster(&self, namespace: &str, name: &str)
        -> Result<Option<HostedCluster>>;

    /// `None` lists across all namespaces.
    async fn list_hosted_clusters(&self, namespace: Option<&str>) -> Result<Vec<HostedCluster>>;

    /// Writes `status` guarded by the `resourceVersion` of `cluster`.
    async fn write_hosted_cluster_status(
        &self,
        cluster: &HostedCluster,
        status: &HostedClusterStatus,
    ) -> Result<HostedCluster>;
}

/// Object store backed by the management cluster API server.
pub struct KubeObjectStore {
    client: Client,
    field_manager: String,
}

impl KubeObjectStore {
    pub async fn new(field_manager: impl Into<String>) -> Result<Self> {
        let client = Client::try_default().await.map_err(|e| {
            HcpError::PlatformTransient(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self::from_client(client, field_manager))
    }

    pub fn from_client(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    pub async fn new_with_config(
        field_manager: impl Into<String>,
        kubeconfig_path: Option<String>,
        context: Option<String>,
    ) -> Result<Self> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        let kubeconfig = match kubeconfig_path {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        }
        .map_err(|e| HcpError::config_error(format!("Failed to load kubeconfig: {}", e)))?;

        let config_options = KubeConfigOptions {
            context,
            cluster: None,
            user: None,
        };

        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &config_options)
            .await
            .map_err(|e| {
                HcpError::config_error(format!("Failed to create Kubernetes config: {}", e))
            })?;

        let client = Client::try_from(config).map_err(|e| {
            HcpError::PlatformTransient(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self::from_client(client, field_manager))
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        }
    }

    async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| with_identity::<K>(e.into(), namespace, name))
    }

    async fn write<K>(&self, obj: &K) -> Result<K>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let namespace = obj.namespace().ok_or_else(|| {
            HcpError::validation(format!(
                "{} '{}' has no namespace",
                kind_of::<K>(),
                obj.name_any()
            ))
        })?;
        let name = obj.name_any();
        let api = self.api::<K>(&namespace);
        let pp = self.post_params();

        let written = if obj.resource_version().is_some() {
            api.replace(&name, &pp, obj).await
        } else {
            api.create(&pp, obj).await
        };
        written.map_err(|e| with_identity::<K>(e.into(), &namespace, &name))
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(with_identity::<K>(e.into(), namespace, name)),
        }
    }
}

fn kind_of<K: Resource>() -> String
where
    <K as Resource>::DynamicType: Default,
{
    K::kind(&Default::default()).to_string()
}

/// Fills in the object identity the API status body does not carry.
fn with_identity<K: Resource>(err: HcpError, namespace: &str, name: &str) -> HcpError
where
    <K as Resource>::DynamicType: Default,
{
    match err {
        HcpError::NotFound { .. } => HcpError::not_found(kind_of::<K>(), name, namespace),
        HcpError::Conflict { message, .. } => HcpError::conflict(kind_of::<K>(), name, message),
        other => other,
    }
}

#[async_trait::async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        self.get_opt(namespace, name).await
    }

    async fn write_secret(&self, secret: &Secret) -> Result<Secret> {
        self.write(secret).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        self.get_opt(namespace, name).await
    }

    async fn write_service(&self, service: &Service) -> Result<Service> {
        self.write(service).await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        self.delete::<Service>(namespace, name).await
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        self.get_opt(namespace, name).await
    }

    async fn write_ingress(&self, ingress: &Ingress) -> Result<Ingress> {
        self.write(ingress).await
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<()> {
        self.delete::<Ingress>(namespace, name).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        self.get_opt(namespace, name).await
    }

    async fn write_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        self.write(deployment).await
    }

    async fn get_hosted_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<HostedCluster>> {
        self.get_opt(namespace, name).await
    }

    async fn list_hosted_clusters(&self, namespace: Option<&str>) -> Result<Vec<HostedCluster>> {
        let api: Api<HostedCluster> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn write_hosted_cluster_status(
        &self,
        cluster: &HostedCluster,
        status: &HostedClusterStatus,
    ) -> Result<HostedCluster> {
        let namespace = cluster.namespace().unwrap_or_default();
        let name = cluster.name_any();
        let api: Api<HostedCluster> = self.api(&namespace);

        // A merge patch carrying resourceVersion is rejected with 409 when stale.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": cluster.resource_version() },
            "status": status,
        });
        let pp = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..PatchParams::default()
        };
        api.patch_status(&name, &pp, &Patch::Merge(&patch))
            .await
            .map_err(|e| with_identity::<HostedCluster>(e.into(), &namespace, &name))
    }
}
