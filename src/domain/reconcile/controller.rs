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

//! Watch loop driving reconcile passes for every hosted cluster.

use crate::domain::api::HostedCluster;
use crate::domain::reconcile::driver::Reconciler;
use crate::shared::error::HcpError;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Context {
    pub reconciler: Reconciler,
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

pub async fn reconcile(cluster: Arc<HostedCluster>, ctx: Arc<Context>) -> Result<Action, HcpError> {
    if cluster.metadata.deletion_timestamp.is_some() {
        // owned objects go with the owner through garbage collection
        debug!(cluster = %cluster.name_any(), "Hosted cluster is being deleted");
        return Ok(Action::await_change());
    }

    let conf = ctx.reconciler.conf();
    let report = ctx.reconciler.reconcile(&cluster).await?;
    match report.first_error() {
        None => Ok(Action::requeue(conf.requeue_interval())),
        Some(err) => Ok(Action::requeue(err.requeue_after(conf.error_requeue()))),
    }
}

pub fn error_policy(cluster: Arc<HostedCluster>, error: &HcpError, ctx: Arc<Context>) -> Action {
    let name = cluster.name_any();
    if error.is_not_found() {
        debug!(cluster = %name, "Hosted cluster not found (likely deleted)");
        return Action::await_change();
    }
    warn!(cluster = %name, error = %error, "Reconcile failed, requeueing");
    Action::requeue(error.requeue_after(ctx.reconciler.conf().error_requeue()))
}

/// Controller over hosted clusters that also wakes on changes to every
/// object kind a pass writes.
pub fn build_controller(client: Client, scope: Option<&str>) -> Controller<HostedCluster> {
    let clusters: Api<HostedCluster> = scoped_api(client.clone(), scope);
    let services: Api<Service> = scoped_api(client.clone(), scope);
    let ingresses: Api<Ingress> = scoped_api(client.clone(), scope);
    let secrets: Api<Secret> = scoped_api(client.clone(), scope);
    let deployments: Api<Deployment> = scoped_api(client, scope);
    let watcher_config = watcher::Config::default();

    Controller::new(clusters, watcher_config.clone())
        .owns(services, watcher_config.clone())
        .owns(ingresses, watcher_config.clone())
        .owns(secrets, watcher_config.clone())
        .owns(deployments, watcher_config)
}

/// Run the controller until a termination signal arrives.
pub async fn run(client: Client, reconciler: Reconciler) {
    let namespace = reconciler.conf().watch_namespace().map(str::to_string);
    let scope = namespace.as_deref();
    info!(scope = scope.unwrap_or("cluster-wide"), "Starting hosted cluster controller");

    let ctx = Arc::new(Context { reconciler });

    build_controller(client, scope)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => debug!(cluster = %obj.name, "Reconciled"),
                Err(kube::runtime::controller::Error::ObjectNotFound(obj)) => {
                    debug!(cluster = %obj.name, "Object no longer exists")
                }
                Err(e) => error!(error = %e, "Controller error"),
            }
        })
        .await;

    info!("Controller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Config;

    fn offline_client() -> Client {
        let config = Config::new("http://127.0.0.1:1".parse().unwrap());
        Client::try_from(config).unwrap()
    }

    #[tokio::test]
    async fn test_controller_builds_for_both_scopes() {
        // watches are lazy, so no request reaches the unreachable endpoint
        let _cluster_wide = build_controller(offline_client(), None);
        let _namespaced = build_controller(offline_client(), Some("clusters"));
    }
}
