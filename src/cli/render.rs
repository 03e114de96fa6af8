//! Offline commands: render a hosted cluster and print the CRD

use crate::cli::display::TableRenderer;
use crate::cli::k8s::load_operator_conf;
use crate::domain::api::HostedCluster;
use crate::domain::reconcile::Reconciler;
use crate::infrastructure::kubernetes::MemoryObjectStore;
use anyhow::Context;
use clap::Parser;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::{CustomResourceExt, ResourceExt};
use serde::Serialize;
use std::sync::Arc;

#[derive(Parser, Debug, Clone)]
pub struct RenderCommand {
    /// HostedCluster manifest (YAML)
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: String,

    /// Namespace used when the manifest does not set one
    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    /// Path to the operator configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<String>,

    /// Print certificate and key material instead of redacting it
    #[arg(long)]
    pub show_secret_data: bool,

    /// Dynamic configuration properties (-D key=value), as for `run`
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub properties: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CrdCommand {}

impl RenderCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let conf = load_operator_conf(self.config_file.as_deref(), &self.properties)?;
        let content = std::fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read {}", self.file))?;
        let mut cluster: HostedCluster = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse HostedCluster from {}", self.file))?;
        if cluster.metadata.namespace.is_none() {
            cluster.metadata.namespace = Some(self.namespace.clone());
        }
        if cluster.metadata.generation.is_none() {
            cluster.metadata.generation = Some(1);
        }

        let store = Arc::new(MemoryObjectStore::new());
        let cluster = store.insert_hosted_cluster(&cluster)?;
        let reconciler = Reconciler::new(store.clone(), conf);
        let report = reconciler.reconcile(&cluster).await?;
        eprintln!("{}", TableRenderer::new().render_pass_report(&report));

        let rendered = render_objects(&store, self.show_secret_data)?;
        print!("{}", rendered);

        if !report.succeeded() {
            anyhow::bail!("Hosted cluster {} did not reconcile cleanly", cluster.name_any());
        }
        Ok(())
    }
}

impl CrdCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        print!("{}", serde_yaml::to_string(&HostedCluster::crd())?);
        Ok(())
    }
}

/// Every object in the store as a multi-document YAML stream.
pub fn render_objects(store: &MemoryObjectStore, show_secret_data: bool) -> anyhow::Result<String> {
    let mut documents = Vec::new();
    for secret in store.secrets() {
        let secret = if show_secret_data {
            secret
        } else {
            redact(secret)
        };
        documents.push(to_document(&secret)?);
    }
    for service in store.services() {
        documents.push(to_document(&service)?);
    }
    for ingress in store.ingresses() {
        documents.push(to_document(&ingress)?);
    }
    for deployment in store.deployments() {
        documents.push(to_document(&deployment)?);
    }
    Ok(documents.join("---\n"))
}

fn to_document<T: Serialize>(obj: &T) -> anyhow::Result<String> {
    Ok(serde_yaml::to_string(obj)?)
}

fn redact(mut secret: Secret) -> Secret {
    if let Some(data) = secret.data.as_mut() {
        for value in data.values_mut() {
            *value = ByteString(b"<redacted>".to_vec());
        }
    }
    secret
}
