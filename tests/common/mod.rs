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

//! Fixtures shared by the reconcile integration tests.

#![allow(dead_code)]

use hcp_kube::domain::api::{
    ClusterNetworking, DNSSpec, HostedCluster, HostedClusterSpec, LocalObjectReference,
    PlatformSpec, Release, ServicePublishingStrategy, ServicePublishingStrategyMapping,
    ServiceType,
};
use hcp_kube::domain::config::OperatorConf;
use hcp_kube::domain::reconcile::{PassReport, Reconciler};
use hcp_kube::infrastructure::kubernetes::{MemoryObjectStore, ObjectStore};
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;

pub const NAMESPACE: &str = "clusters-example";
pub const NAME: &str = "example";
pub const RELEASE_IMAGE: &str = "quay.io/example/release:4.8.0";

pub fn mapping(
    service: ServiceType,
    strategy: ServicePublishingStrategy,
) -> ServicePublishingStrategyMapping {
    ServicePublishingStrategyMapping {
        service,
        service_publishing_strategy: strategy,
    }
}

pub fn spec(services: Vec<ServicePublishingStrategyMapping>) -> HostedClusterSpec {
    HostedClusterSpec {
        release: Release {
            image: RELEASE_IMAGE.to_string(),
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
        autoscaling: Default::default(),
        platform: PlatformSpec::None,
        infra_id: String::new(),
        dns: DNSSpec {
            base_domain: "example.com".to_string(),
            ..Default::default()
        },
        services,
        controller_availability_policy: Default::default(),
    }
}

pub fn hosted_cluster(spec: HostedClusterSpec, generation: i64) -> HostedCluster {
    let mut cluster = HostedCluster::new(NAME, spec);
    cluster.metadata.namespace = Some(NAMESPACE.to_string());
    cluster.metadata.generation = Some(generation);
    cluster
}

pub fn load_balancer_cluster() -> HostedCluster {
    hosted_cluster(
        spec(vec![mapping(
            ServiceType::APIServer,
            ServicePublishingStrategy::load_balancer(),
        )]),
        1,
    )
}

pub fn test_conf() -> OperatorConf {
    OperatorConf {
        max_conflict_retries: 2,
        ..Default::default()
    }
}

pub struct Harness {
    pub store: Arc<MemoryObjectStore>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(cluster: &HostedCluster) -> Self {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert_hosted_cluster(cluster).unwrap();
        let reconciler = Reconciler::new(store.clone(), test_conf());
        Self { store, reconciler }
    }

    /// Applies a user edit: new spec, bumped generation.
    pub fn update(&self, cluster: &HostedCluster) {
        self.store.insert_hosted_cluster(cluster).unwrap();
    }

    pub async fn live(&self) -> HostedCluster {
        self.store
            .get_hosted_cluster(NAMESPACE, NAME)
            .await
            .unwrap()
            .expect("hosted cluster present")
    }

    /// One pass against the live object, as the controller would run it.
    pub async fn pass(&self) -> PassReport {
        let live = self.live().await;
        self.reconciler.reconcile(&live).await.unwrap()
    }

    pub async fn secret(&self, name: &str) -> Option<Secret> {
        self.store.get_secret(NAMESPACE, name).await.unwrap()
    }

    pub async fn secret_text(&self, name: &str, key: &str) -> String {
        let secret = self.secret(name).await.expect("secret present");
        let data = secret.data.expect("secret data");
        String::from_utf8(data[key].0.clone()).expect("utf-8 secret value")
    }
}
