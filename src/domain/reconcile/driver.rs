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

//! One reconcile pass of a hosted cluster.
//!
//! The pass first computes every desired object from `HostedCluster.spec`
//! alone, so a rejected spec never leads to a partial write. It then brings signing
//! identities in place, runs the independent component steps concurrently,
//! runs the steps that depend on published endpoints, and finally folds
//! all outcomes into the cluster status.

use crate::domain::api::{HostedCluster, LocalObjectReference, ServiceType};
use crate::domain::config::OperatorConf;
use crate::domain::pki::{
    admin_request, first_service_ip, inspect_certificate, issue_or_reconcile, issuer_generation,
    with_kubeconfig, CertRequest, ComponentCert, PkiContext, SigningIdentity, TrustDomain,
    ADMIN_KUBECONFIG_SECRET,
};
use crate::domain::publishing::{
    merge_ingress, merge_service, resolve_publishing, PublishAction, ServicePlan,
};
use crate::domain::reconcile::status::{
    fold_status, may_write_status, status_changed, ComponentOutcome, PassReport, StepOutcome,
};
use crate::domain::synthesis::{
    synthesize_all, CloudProviderRegistry, ComponentParams, PlatformContext, SynthesisInput,
};
use crate::infrastructure::constants::*;
use crate::infrastructure::kubernetes::client::ObjectStore;
use crate::infrastructure::kubernetes::resources::{
    deployment_up_to_date, merge_deployment, merge_metadata, DeploymentBuilder, IngressBuilder,
    OwnerContext, ServiceBuilder,
};
use crate::shared::error::{HcpError, Result};
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::ResourceExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

const CONFLICT_BACKOFF_MIN: Duration = Duration::from_millis(20);
const CONFLICT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Everything a pass will write, computed before the first I/O call.
struct DesiredState {
    owner: OwnerContext,
    plans: Vec<ServicePlan>,
    params: Vec<ComponentParams>,
    pki: PkiContext,
}

struct StepResult {
    outcome: ComponentOutcome,
    /// Live service after a publishing step, for steps that need the
    /// platform-assigned endpoint.
    published: Option<(ServiceType, Option<Service>)>,
}

impl StepResult {
    fn plain(outcome: ComponentOutcome) -> Self {
        Self {
            outcome,
            published: None,
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    conf: OperatorConf,
    registry: CloudProviderRegistry,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ObjectStore>, conf: OperatorConf) -> Self {
        Self {
            store,
            conf,
            registry: CloudProviderRegistry::builtin(),
        }
    }

    pub fn with_registry(mut self, registry: CloudProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn conf(&self) -> &OperatorConf {
        &self.conf
    }

    /// Run a pass against `cluster` and record its outcome in status.
    pub async fn reconcile(&self, cluster: &HostedCluster) -> Result<PassReport> {
        let now = Utc::now();
        let generation = cluster.metadata.generation.unwrap_or(0);
        let span = info_span!(
            "reconcile",
            cluster = %cluster.name_any(),
            namespace = %cluster.namespace().unwrap_or_default(),
            generation
        );

        async move {
            let report = self.run_pass(cluster, now).await;
            info!(
                succeeded = report.succeeded(),
                steps = report.outcomes.len(),
                writes = report.writes(),
                "Reconcile pass finished"
            );
            self.write_status(cluster, &report, now).await?;
            Ok::<_, HcpError>(report)
        }
        .instrument(span)
        .await
    }

    /// Run a pass without touching status.
    pub async fn run_pass(&self, cluster: &HostedCluster, now: DateTime<Utc>) -> PassReport {
        let generation = cluster.metadata.generation.unwrap_or(0);
        let desired = match self.desired_state(cluster) {
            Ok(desired) => desired,
            Err(err) => {
                warn!(error = %err, "Desired state rejected, nothing applied");
                return PassReport::invalid(generation, err);
            }
        };

        let mut report = PassReport::new(generation);

        let signers = self.ensure_signers(&desired.owner, now, &mut report).await;

        // Independent steps.
        let desired = &desired;
        let mut steps: Vec<BoxFuture<'_, StepResult>> = Vec::new();
        for plan in &desired.plans {
            steps.push(
                async move {
                    let label = format!("Service/{}", plan.name());
                    let result = self
                        .retrying(&label, || self.reconcile_publishing(&desired.owner, plan))
                        .await;
                    let (result, live) = match result {
                        Ok((outcome, live)) => (Ok(outcome), live),
                        Err(err) => (Err(err), None),
                    };
                    StepResult {
                        outcome: ComponentOutcome::new(label, result),
                        published: plan.service_type.map(|t| (t, live)),
                    }
                }
                .boxed(),
            );
        }
        for params in &desired.params {
            steps.push(
                async move {
                    let label = format!("Deployment/{}", params.component);
                    let result = self
                        .retrying(&label, || self.reconcile_deployment(&desired.owner, params))
                        .await;
                    StepResult::plain(ComponentOutcome::new(label, result))
                }
                .boxed(),
            );
        }
        for cert in ComponentCert::ALL
            .into_iter()
            .filter(|c| !c.depends_on_publishing())
        {
            let signer = signer_for(&signers, cert.trust_domain());
            steps.push(
                async move {
                    let label = format!("Secret/{}", cert.secret_name());
                    let result = match signer {
                        Ok(signer) => {
                            let req = cert.request(&desired.pki);
                            self.retrying(&label, || {
                                self.reconcile_leaf(
                                    &desired.owner,
                                    cert.secret_name(),
                                    cert.component(),
                                    signer,
                                    &req,
                                    None,
                                    now,
                                )
                            })
                            .await
                        }
                        Err(err) => Err(err),
                    };
                    StepResult::plain(ComponentOutcome::new(label, result))
                }
                .boxed(),
            );
        }

        let results: Vec<StepResult> = stream::iter(steps)
            .buffer_unordered(self.conf.concurrency.max(1))
            .collect()
            .await;

        let mut api_service: Option<Result<Option<Service>>> = None;
        for result in results {
            if let Some((ServiceType::APIServer, live)) = result.published {
                api_service = Some(match &result.outcome.result {
                    Ok(_) => Ok(live),
                    Err(err) => Err(HcpError::dependency_unavailable(
                        "Service",
                        SERVICE_KUBE_APISERVER,
                        format!("publishing failed: {}", err),
                    )),
                });
            }
            log_outcome(&result.outcome);
            report.outcomes.push(result.outcome);
        }

        // Steps that need the published API server endpoint.
        let api_plan = desired
            .plans
            .iter()
            .find(|p| p.service_type == Some(ServiceType::APIServer));
        let dependent = self
            .reconcile_api_endpoints(
                desired,
                api_plan,
                api_service,
                signer_for(&signers, TrustDomain::Root),
                now,
            )
            .await;
        for (outcome, kubeconfig) in dependent {
            log_outcome(&outcome);
            if kubeconfig && outcome.is_ok() {
                report.kubeconfig = Some(LocalObjectReference::new(ADMIN_KUBECONFIG_SECRET));
            }
            report.outcomes.push(outcome);
        }

        report
    }

    fn desired_state(&self, cluster: &HostedCluster) -> Result<DesiredState> {
        let spec = &cluster.spec;
        spec.validate()?;

        let owner = OwnerContext::for_cluster(cluster);
        let platform =
            PlatformContext::from_spec(&spec.platform).with_registry(self.registry.clone());
        let images = self.conf.images_for(&spec.release);
        let input = SynthesisInput::new(spec, &platform, &images);
        input.check_platform()?;
        let params = synthesize_all(&input)?;

        let plans = resolve_publishing(spec, &owner.cluster_name)?;
        let pki = PkiContext {
            namespace: owner.namespace.clone(),
            cluster_domain: self.conf.cluster_domain.clone(),
            kubernetes_service_ip: first_service_ip(&spec.networking.service_cidr)?,
            external_api_hostnames: Vec::new(),
        };

        Ok(DesiredState {
            owner,
            plans,
            params,
            pki,
        })
    }

    /// Retry `op` on write conflicts, re-running it from the read.
    async fn retrying<T, F, Fut>(&self, step: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(CONFLICT_BACKOFF_MIN)
            .with_max_delay(CONFLICT_BACKOFF_MAX)
            .with_max_times(self.conf.max_conflict_retries as usize);

        op.retry(&backoff)
            .when(HcpError::is_retryable_in_pass)
            .notify(|err, delay| {
                debug!(component = step, ?delay, error = %err, "Write conflict, retrying")
            })
            .await
    }

    async fn ensure_signers(
        &self,
        owner: &OwnerContext,
        now: DateTime<Utc>,
        report: &mut PassReport,
    ) -> Vec<SigningIdentity> {
        let results = join_all(TrustDomain::ALL.into_iter().map(|domain| async move {
            let label = format!("Secret/{}", domain.secret_name());
            let result = self
                .retrying(&label, || self.ensure_signer(owner, domain, now))
                .await;
            (label, result)
        }))
        .await;

        let mut signers = Vec::with_capacity(results.len());
        for (label, result) in results {
            let outcome = match result {
                Ok((outcome, identity)) => {
                    signers.push(identity);
                    ComponentOutcome::new(label, Ok(outcome))
                }
                Err(err) => ComponentOutcome::new(label, Err(err)),
            };
            log_outcome(&outcome);
            report.outcomes.push(outcome);
        }
        signers
    }

    /// Load the signer of `domain`, creating it on first use. Rotates a CA
    /// that entered its renewal window and retires the previous CA once no
    /// leaf depends on it.
    ///
    /// A signer that disappears after leaves were issued is never minted
    /// again.
    async fn ensure_signer(
        &self,
        owner: &OwnerContext,
        domain: TrustDomain,
        now: DateTime<Utc>,
    ) -> Result<(StepOutcome, SigningIdentity)> {
        let name = domain.secret_name();
        let desired_meta = owner.object_meta(name, COMPONENT_PKI);

        let live = match self.store.get_secret(&owner.namespace, name).await? {
            Some(live) => live,
            None => {
                if self.has_issued_leaves(&owner.namespace, domain).await? {
                    return Err(HcpError::dependency_unavailable(
                        "Secret",
                        name,
                        "signing identity missing while leaves issued by it exist",
                    ));
                }
                let identity = SigningIdentity::generate(domain, now)?;
                self.store
                    .write_secret(&identity.to_secret(desired_meta))
                    .await?;
                info!(trust_domain = %domain, "Created signing identity");
                return Ok((StepOutcome::Written, identity));
            }
        };

        let current = SigningIdentity::from_secret(domain, &live)?;
        let ca = inspect_certificate(current.cert_pem())?;
        let next = if ca.is_within_renewal_window(now, self.conf.cert_renewal_fraction) {
            info!(
                trust_domain = %domain,
                generation = current.generation() + 1,
                "Rotating signing identity"
            );
            Some(current.rotate(now)?)
        } else if current.has_previous() {
            let generations = self.leaf_generations(&owner.namespace, domain).await?;
            let retired = current.retire_previous(&generations);
            if retired.is_some() {
                info!(trust_domain = %domain, "Retiring previous signing certificate");
            }
            retired
        } else {
            None
        };

        let identity = next.unwrap_or(current);
        let desired = identity.to_secret(merge_metadata(&desired_meta, &live.metadata));
        if desired == live {
            return Ok((StepOutcome::Unchanged, identity));
        }
        self.store.write_secret(&desired).await?;
        Ok((StepOutcome::Written, identity))
    }

    /// Issuer generation of every leaf of `domain`; a missing leaf counts
    /// as generation 0.
    async fn leaf_generations(&self, namespace: &str, domain: TrustDomain) -> Result<Vec<u64>> {
        let names = leaf_secret_names(domain);
        let mut generations = Vec::with_capacity(names.len());
        for name in names {
            let secret = self.store.get_secret(namespace, name).await?;
            generations.push(secret.as_ref().and_then(issuer_generation).unwrap_or(0));
        }
        Ok(generations)
    }

    async fn has_issued_leaves(&self, namespace: &str, domain: TrustDomain) -> Result<bool> {
        for name in leaf_secret_names(domain) {
            if self.store.get_secret(namespace, name).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn reconcile_publishing(
        &self,
        owner: &OwnerContext,
        plan: &ServicePlan,
    ) -> Result<(StepOutcome, Option<Service>)> {
        let name = plan.name();
        let ns = owner.namespace.as_str();

        let (exposure, route_host) = match &plan.action {
            PublishAction::Remove => {
                let mut outcome = StepOutcome::Unchanged;
                if self.store.get_ingress(ns, name).await?.is_some() {
                    self.store.delete_ingress(ns, name).await?;
                    outcome = StepOutcome::Deleted;
                }
                if self.store.get_service(ns, name).await?.is_some() {
                    self.store.delete_service(ns, name).await?;
                    outcome = StepOutcome::Deleted;
                }
                return Ok((outcome, None));
            }
            PublishAction::Expose {
                exposure,
                route_host,
                ..
            } => (*exposure, route_host.as_deref()),
        };

        let mut outcome = StepOutcome::Unchanged;
        let desired = ServiceBuilder::new(
            owner.object_meta(name, plan.descriptor.component),
            plan.descriptor,
            exposure,
        )
        .build();
        let live = self.store.get_service(ns, name).await?;
        let merged = merge_service(&desired, live.as_ref());
        let service = if live.as_ref() == Some(&merged) {
            merged
        } else {
            outcome = StepOutcome::Written;
            self.store.write_service(&merged).await?
        };

        let live_ingress = self.store.get_ingress(ns, name).await?;
        match route_host {
            Some(host) => {
                let desired = IngressBuilder::new(
                    owner.object_meta(name, plan.descriptor.component),
                    host,
                    name,
                    plan.descriptor.port,
                )
                .build();
                let merged = merge_ingress(&desired, live_ingress.as_ref());
                if live_ingress.as_ref() != Some(&merged) {
                    self.store.write_ingress(&merged).await?;
                    outcome = StepOutcome::Written;
                }
            }
            None if live_ingress.is_some() => {
                // left over from an earlier Route strategy
                self.store.delete_ingress(ns, name).await?;
                outcome = StepOutcome::Written;
            }
            None => {}
        }

        Ok((outcome, Some(service)))
    }

    async fn reconcile_deployment(
        &self,
        owner: &OwnerContext,
        params: &ComponentParams,
    ) -> Result<StepOutcome> {
        let component = params.component.as_str();
        let desired =
            DeploymentBuilder::new(owner.object_meta(component, component), params.clone())
                .build()?;
        let live = self.store.get_deployment(&owner.namespace, component).await?;

        if let Some(live) = &live {
            let metadata_current =
                merge_metadata(&desired.metadata, &live.metadata) == live.metadata;
            if metadata_current && deployment_up_to_date(&desired, live) {
                return Ok(StepOutcome::Unchanged);
            }
        }
        self.store
            .write_deployment(&merge_deployment(&desired, live.as_ref()))
            .await?;
        Ok(StepOutcome::Written)
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile_leaf(
        &self,
        owner: &OwnerContext,
        name: &str,
        component: &str,
        signer: &SigningIdentity,
        req: &CertRequest,
        kubeconfig_server: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome> {
        let desired_meta = owner.object_meta(name, component);
        let live = self.store.get_secret(&owner.namespace, name).await?;
        let meta = match &live {
            Some(live) => merge_metadata(&desired_meta, &live.metadata),
            None => desired_meta.clone(),
        };

        let mut secret: Secret = issue_or_reconcile(
            signer,
            live.as_ref(),
            &meta,
            req,
            now,
            self.conf.cert_renewal_fraction,
        )?;
        secret.metadata = merge_metadata(&desired_meta, &secret.metadata);
        if let Some(server) = kubeconfig_server {
            secret = with_kubeconfig(secret, server)?;
        }

        if live.as_ref() == Some(&secret) {
            return Ok(StepOutcome::Unchanged);
        }
        self.store.write_secret(&secret).await?;
        Ok(StepOutcome::Written)
    }

    /// API server serving certificate and admin kubeconfig. Both carry the
    /// externally published endpoint, so they run after publishing.
    async fn reconcile_api_endpoints(
        &self,
        desired: &DesiredState,
        api_plan: Option<&ServicePlan>,
        api_service: Option<Result<Option<Service>>>,
        root: Result<&SigningIdentity>,
        now: DateTime<Utc>,
    ) -> Vec<(ComponentOutcome, bool)> {
        let kas_label = format!("Secret/{}", ComponentCert::KubeApiServer.secret_name());
        let kubeconfig_label = format!("Secret/{}", ADMIN_KUBECONFIG_SECRET);

        let ready = root.and_then(|signer| {
            let plan = api_plan.ok_or_else(|| {
                HcpError::validation(format!("no publishing plan for {}", SERVICE_KUBE_APISERVER))
            })?;
            let live = match api_service {
                Some(result) => result?,
                None => None,
            };
            Ok((signer, plan, live))
        });
        let (signer, api_plan, live) = match ready {
            Ok(ready) => ready,
            Err(err) => {
                let copy = HcpError::dependency_unavailable(
                    "Secret",
                    ADMIN_KUBECONFIG_SECRET,
                    err.to_string(),
                );
                return vec![
                    (ComponentOutcome::new(kas_label, Err(err)), false),
                    (ComponentOutcome::new(kubeconfig_label, Err(copy)), true),
                ];
            }
        };

        let mut pki = desired.pki.clone();
        pki.external_api_hostnames = api_plan.external_addresses(live.as_ref());
        let kas_request = ComponentCert::KubeApiServer.request(&pki);

        let server = api_plan
            .external_url(live.as_ref())
            .unwrap_or_else(|| api_plan.internal_url(&pki.namespace, &pki.cluster_domain));
        let admin = admin_request();

        let (kas, kubeconfig) = futures::join!(
            self.retrying(&kas_label, || {
                self.reconcile_leaf(
                    &desired.owner,
                    ComponentCert::KubeApiServer.secret_name(),
                    ComponentCert::KubeApiServer.component(),
                    signer,
                    &kas_request,
                    None,
                    now,
                )
            }),
            self.retrying(&kubeconfig_label, || {
                self.reconcile_leaf(
                    &desired.owner,
                    ADMIN_KUBECONFIG_SECRET,
                    COMPONENT_KUBE_APISERVER,
                    signer,
                    &admin,
                    Some(server.as_str()),
                    now,
                )
            }),
        );

        vec![
            (ComponentOutcome::new(kas_label, kas), false),
            (ComponentOutcome::new(kubeconfig_label, kubeconfig), true),
        ]
    }

    /// Write the folded status unless a newer generation already owns it.
    async fn write_status(
        &self,
        cluster: &HostedCluster,
        report: &PassReport,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_default();
        let name = cluster.name_any();
        let (namespace, name) = (namespace.as_str(), name.as_str());

        self.retrying("HostedCluster/status", || async move {
            let live = match self.store.get_hosted_cluster(namespace, name).await? {
                Some(live) => live,
                None => {
                    debug!("Hosted cluster deleted during the pass, dropping status");
                    return Ok(());
                }
            };
            if !may_write_status(live.status.as_ref(), report.generation) {
                info!(
                    recorded = ?live.status.as_ref().and_then(|s| s.observed_generation()),
                    "Newer generation already recorded, skipping status write"
                );
                return Ok(());
            }

            let next = fold_status(
                live.status.as_ref(),
                &cluster.spec.release,
                report,
                self.conf.history_limit,
                now,
            );
            if !status_changed(live.status.as_ref(), &next) {
                return Ok(());
            }
            self.store.write_hosted_cluster_status(&live, &next).await?;
            Ok(())
        })
        .await
    }
}

/// Secrets holding leaves issued by the signer of `domain`.
fn leaf_secret_names(domain: TrustDomain) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = ComponentCert::ALL
        .iter()
        .filter(|c| c.trust_domain() == domain)
        .map(|c| c.secret_name())
        .collect();
    if domain == TrustDomain::Root {
        names.push(ADMIN_KUBECONFIG_SECRET);
    }
    names
}

fn signer_for(signers: &[SigningIdentity], domain: TrustDomain) -> Result<&SigningIdentity> {
    signers.iter().find(|s| s.domain() == domain).ok_or_else(|| {
        HcpError::dependency_unavailable(
            "Secret",
            domain.secret_name(),
            "signing identity unavailable in this pass",
        )
    })
}

fn log_outcome(outcome: &ComponentOutcome) {
    match &outcome.result {
        Ok(StepOutcome::Unchanged) => debug!(component = %outcome.component, "Up to date"),
        Ok(done) => info!(component = %outcome.component, outcome = %done, "Applied"),
        Err(err) => warn!(
            component = %outcome.component,
            reason = err.condition_reason(),
            error = %err,
            "Step failed"
        ),
    }
}
