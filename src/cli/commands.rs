// CLI command definitions

use super::k8s::{RunCommand, StatusCommand};
use super::render::{CrdCommand, RenderCommand};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "hcp-kube",
    version,
    about = "Hosted control plane operator",
    long_about = "Runs the control planes of guest clusters inside a management cluster: \
                  certificates, published services and component workloads"
)]
pub struct CliArgs {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the operator against the management cluster
    Run(RunCommand),

    /// Reconcile a HostedCluster manifest offline and print the resulting objects
    Render(RenderCommand),

    /// Print the HostedCluster CustomResourceDefinition
    Crd(CrdCommand),

    /// Show hosted clusters and their conditions
    Status(StatusCommand),
}

impl Commands {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Render(cmd) => cmd.execute().await,
            Commands::Crd(cmd) => cmd.execute().await,
            Commands::Status(cmd) => cmd.execute().await,
        }
    }
}
