//! Commands that talk to the management cluster

use crate::cli::display::{table::ClusterInfo, TableRenderer};
use crate::domain::config::{apply_to_operator_conf, parse_dynamic_configs, OperatorConf};
use crate::domain::reconcile::{controller, Reconciler};
use crate::infrastructure::kubernetes::{KubeObjectStore, ObjectStore};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug, Clone)]
pub struct RunCommand {
    /// Path to the operator configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<String>,

    /// Path to kubeconfig file
    /// If not specified, uses in-cluster config or default kubeconfig resolution
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubernetes context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Dynamic configuration properties (-D key=value)
    ///
    /// Operator: operator.namespace, operator.field-manager, operator.cluster-domain,
    /// operator.max-conflict-retries, operator.history-limit, operator.requeue-interval-secs,
    /// operator.error-requeue-secs, operator.concurrency, operator.cert-renewal-fraction
    /// Images: operator.images.<component> (overrides the release image)
    ///
    /// Example: -Doperator.namespace=clusters -Doperator.concurrency=4
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub properties: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct StatusCommand {
    /// Hosted cluster name. Lists every hosted cluster in scope when omitted
    pub name: Option<String>,

    /// Kubernetes namespace. All namespaces when omitted
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Kubeconfig file path
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubernetes context
    #[arg(long)]
    pub context: Option<String>,
}

/// Loads the operator configuration: file first, then `-D` overrides.
pub fn load_operator_conf(
    config_file: Option<&str>,
    properties: &[String],
) -> anyhow::Result<OperatorConf> {
    let mut conf = match config_file {
        Some(path) => OperatorConf::from(path)
            .with_context(|| format!("Failed to load operator config from {}", path))?,
        None => OperatorConf::default(),
    };

    let overrides = parse_dynamic_configs(properties)?;
    apply_to_operator_conf(&overrides, &mut conf)?;
    conf.validate()?;
    Ok(conf)
}

async fn connect(
    field_manager: &str,
    kubeconfig: Option<String>,
    context: Option<String>,
) -> anyhow::Result<KubeObjectStore> {
    let store = if kubeconfig.is_none() && context.is_none() {
        KubeObjectStore::new(field_manager).await?
    } else {
        KubeObjectStore::new_with_config(field_manager, kubeconfig, context).await?
    };
    Ok(store)
}

impl RunCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let conf = load_operator_conf(self.config_file.as_deref(), &self.properties)?;
        info!(
            namespace = conf.watch_namespace().unwrap_or("*"),
            field_manager = %conf.field_manager,
            concurrency = conf.concurrency,
            "Loaded operator configuration"
        );

        let store = connect(
            &conf.field_manager,
            self.kubeconfig.clone(),
            self.context.clone(),
        )
        .await
        .context("Failed to connect to the management cluster")?;

        let client = store.client();
        let reconciler = Reconciler::new(Arc::new(store), conf);
        controller::run(client, reconciler).await;
        Ok(())
    }
}

impl StatusCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let store = connect(
            crate::infrastructure::constants::DEFAULT_FIELD_MANAGER,
            self.kubeconfig.clone(),
            self.context.clone(),
        )
        .await?;
        let renderer = TableRenderer::new();

        match &self.name {
            Some(name) => {
                let namespace = self
                    .namespace
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("namespace is required with a name (use -n)"))?;
                let cluster = store
                    .get_hosted_cluster(namespace, name)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("Hosted cluster {}/{} not found", namespace, name)
                    })?;
                println!("{}", renderer.render_cluster_status(&cluster));
            }
            None => {
                let clusters = store
                    .list_hosted_clusters(self.namespace.as_deref())
                    .await
                    .context("Failed to list hosted clusters")?;
                let infos: Vec<ClusterInfo> = clusters.iter().map(ClusterInfo::from).collect();
                println!("{}", renderer.render_clusters_list(&infos));
            }
        }

        Ok(())
    }
}
