//! Table rendering for CLI output

use super::{ColorTheme, StatusIcon};
use crate::domain::api::{
    ConditionStatus, HostedCluster, UpdateState, CONDITION_AVAILABLE, CONDITION_DEGRADED,
};
use crate::domain::reconcile::{PassReport, StepOutcome};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};
use kube::ResourceExt;

/// Hosted cluster summary for list display
#[derive(Debug, Clone)]
pub struct ClusterInfo {
    pub name: String,
    pub namespace: String,
    pub version: Option<String>,
    pub progress: Option<UpdateState>,
    pub available: Option<ConditionStatus>,
    pub degraded: Option<ConditionStatus>,
    pub generation: i64,
    pub observed_generation: Option<i64>,
}

impl From<&HostedCluster> for ClusterInfo {
    fn from(cluster: &HostedCluster) -> Self {
        let status = cluster.status.as_ref();
        let history = status
            .and_then(|s| s.version.as_ref())
            .map(|v| v.history.as_slice())
            .unwrap_or_default();
        Self {
            name: cluster.name_any(),
            namespace: cluster.namespace().unwrap_or_default(),
            version: history
                .iter()
                .find(|h| h.state == UpdateState::Completed)
                .map(|h| h.image.clone()),
            progress: history.first().map(|h| h.state),
            available: status
                .and_then(|s| s.condition(CONDITION_AVAILABLE))
                .map(|c| c.status),
            degraded: status
                .and_then(|s| s.condition(CONDITION_DEGRADED))
                .map(|c| c.status),
            generation: cluster.metadata.generation.unwrap_or(0),
            observed_generation: status.and_then(|s| s.observed_generation()),
        }
    }
}

impl ClusterInfo {
    fn is_available(&self) -> bool {
        self.available == Some(ConditionStatus::True)
    }

    fn is_degraded(&self) -> bool {
        self.degraded == Some(ConditionStatus::True)
    }
}

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Render hosted clusters as a formatted table
    pub fn render_clusters_list(&self, clusters: &[ClusterInfo]) -> String {
        if clusters.is_empty() {
            return "No hosted clusters found".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("NAME").set_alignment(CellAlignment::Left),
                Cell::new("NAMESPACE").set_alignment(CellAlignment::Left),
                Cell::new("VERSION").set_alignment(CellAlignment::Left),
                Cell::new("GENERATION").set_alignment(CellAlignment::Center),
                Cell::new("STATUS").set_alignment(CellAlignment::Center),
            ]);

        for cluster in clusters {
            let available = cluster.is_available();
            let degraded = cluster.is_degraded();
            let status_text = StatusIcon::get_status_text(available, degraded);
            let status_icon = StatusIcon::get_status_icon(available, degraded);
            let status_color = match (available, degraded) {
                (true, false) => Color::Green,
                (false, true) => Color::Red,
                _ => Color::Yellow,
            };

            let observed = cluster
                .observed_generation
                .map(|g| g.to_string())
                .unwrap_or_else(|| "-".to_string());

            table.add_row(vec![
                Cell::new(&cluster.name),
                Cell::new(&cluster.namespace),
                Cell::new(cluster.version.as_deref().unwrap_or("-")),
                Cell::new(format!("{}/{}", observed, cluster.generation)).fg(self
                    .theme
                    .generation_color(cluster.observed_generation, cluster.generation)),
                Cell::new(format!("{} {}", status_icon, status_text)).fg(status_color),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Hosted Clusters {} ─╮\n",
            format!("[{} clusters]", clusters.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "Legend: {} Available  {} Degraded  {} Progressing  {} Failed\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::WARNING.yellow(),
            StatusIcon::PENDING.cyan(),
            StatusIcon::ERROR.red()
        ));

        output
    }

    /// Render one hosted cluster: conditions, then version history
    pub fn render_cluster_status(&self, cluster: &HostedCluster) -> String {
        let info = ClusterInfo::from(cluster);

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("CONDITION"),
                Cell::new("STATUS").set_alignment(CellAlignment::Center),
                Cell::new("REASON"),
                Cell::new("MESSAGE"),
            ]);

        let conditions = cluster
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default();
        for condition in conditions {
            let positive = condition.type_ != CONDITION_DEGRADED;
            let icon = StatusIcon::condition_icon(Some(condition.status), positive);
            table.add_row(vec![
                Cell::new(&condition.type_),
                Cell::new(format!("{} {}", icon, condition.status.as_str()))
                    .fg(self.theme.condition_color(Some(condition.status), positive)),
                Cell::new(&condition.reason),
                Cell::new(&condition.message),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "Hosted cluster {} | Namespace: {} | Generation: {}/{}\n",
            info.name.bold(),
            info.namespace,
            info.observed_generation
                .map(|g| g.to_string())
                .unwrap_or_else(|| "-".to_string()),
            info.generation
        ));
        if let Some(kubeconfig) = cluster.status.as_ref().and_then(|s| s.kubeconfig.as_ref()) {
            output.push_str(&format!("Kubeconfig secret: {}\n", kubeconfig.name.cyan()));
        }
        if conditions.is_empty() {
            output.push_str("No conditions reported yet\n");
        } else {
            output.push_str(&table.to_string());
            output.push('\n');
        }

        let history = cluster
            .status
            .as_ref()
            .and_then(|s| s.version.as_ref())
            .map(|v| v.history.as_slice())
            .unwrap_or_default();
        if !history.is_empty() {
            let mut versions = Table::new();
            versions
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["IMAGE", "STATE", "STARTED", "COMPLETED"]);
            for entry in history {
                let (icon, color) = match entry.state {
                    UpdateState::Completed => (StatusIcon::SUCCESS, self.theme.success),
                    UpdateState::Partial => (StatusIcon::PENDING, self.theme.info),
                };
                versions.add_row(vec![
                    Cell::new(&entry.image),
                    Cell::new(format!("{} {:?}", icon, entry.state)).fg(color),
                    Cell::new(&entry.started_time),
                    Cell::new(entry.completion_time.as_deref().unwrap_or("-")),
                ]);
            }
            output.push_str(&versions.to_string());
            output.push('\n');
        }

        output
    }

    /// Render the per-step outcome of a single pass
    pub fn render_pass_report(&self, report: &PassReport) -> String {
        if let Some(err) = &report.invalid {
            return format!(
                "{} Desired state rejected: {}",
                StatusIcon::ERROR.red(),
                err
            );
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["STEP", "RESULT"]);
        for outcome in &report.outcomes {
            let (text, color) = match &outcome.result {
                Ok(StepOutcome::Unchanged) => {
                    (format!("{} unchanged", StatusIcon::SUCCESS), self.theme.muted)
                }
                Ok(step) => (format!("{} {}", StatusIcon::SUCCESS, step), self.theme.success),
                Err(err) => (format!("{} {}", StatusIcon::ERROR, err), self.theme.error),
            };
            table.add_row(vec![Cell::new(&outcome.component), Cell::new(text).fg(color)]);
        }
        table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api::{
        ClusterVersionStatus, Condition, HostedClusterStatus, Release, UpdateHistory,
    };
    use crate::domain::reconcile::ComponentOutcome;
    use crate::shared::error::HcpError;
    use chrono::Utc;

    fn cluster_with_status(status: Option<HostedClusterStatus>) -> HostedCluster {
        let mut cluster: HostedCluster = serde_yaml::from_str(
            r#"
apiVersion: hcp.dev/v1alpha1
kind: HostedCluster
metadata:
  name: example
  namespace: clusters
  generation: 2
spec:
  release:
    image: quay.io/example/release:4.8.0
  pullSecret: {name: pull-secret}
  signingKey: {name: signing-key}
  sshKey: {name: ssh-key}
  networking:
    serviceCIDR: 172.31.0.0/16
    podCIDR: 10.132.0.0/14
    machineCIDR: 10.0.0.0/16
  platform:
    type: None
  dns:
    baseDomain: example.com
  services: []
"#,
        )
        .unwrap();
        cluster.status = status;
        cluster
    }

    fn available_status() -> HostedClusterStatus {
        let now = Utc::now();
        HostedClusterStatus {
            version: Some(ClusterVersionStatus {
                desired: Release {
                    image: "quay.io/example/release:4.8.0".to_string(),
                },
                history: vec![UpdateHistory {
                    state: UpdateState::Completed,
                    started_time: "2025-01-01T00:00:00Z".to_string(),
                    completion_time: Some("2025-01-01T00:01:00Z".to_string()),
                    image: "quay.io/example/release:4.8.0".to_string(),
                    verified: false,
                }],
                observed_generation: 2,
            }),
            kubeconfig: None,
            conditions: vec![
                Condition::new(CONDITION_AVAILABLE, true, "AsExpected", "", Some(2), now),
                Condition::new(CONDITION_DEGRADED, false, "AsExpected", "", Some(2), now),
            ],
        }
    }

    #[test]
    fn test_render_empty_clusters() {
        let renderer = TableRenderer::new();
        let output = renderer.render_clusters_list(&[]);
        assert!(output.contains("No hosted clusters found"));
    }

    #[test]
    fn test_cluster_info_from_status() {
        let cluster = cluster_with_status(Some(available_status()));
        let info = ClusterInfo::from(&cluster);
        assert_eq!(info.version.as_deref(), Some("quay.io/example/release:4.8.0"));
        assert_eq!(info.observed_generation, Some(2));
        assert!(info.is_available());
        assert!(!info.is_degraded());

        let output = TableRenderer::new().render_clusters_list(&[info]);
        assert!(output.contains("example"));
        assert!(output.contains("2/2"));
        assert!(output.contains("Available"));
    }

    #[test]
    fn test_render_cluster_without_status() {
        let cluster = cluster_with_status(None);
        let output = TableRenderer::new().render_cluster_status(&cluster);
        assert!(output.contains("No conditions reported yet"));
        assert!(output.contains("-/2"));
    }

    #[test]
    fn test_render_pass_report() {
        let mut report = PassReport::new(1);
        report.outcomes.push(ComponentOutcome::new(
            "Service/kube-apiserver",
            Ok(StepOutcome::Written),
        ));
        report.outcomes.push(ComponentOutcome::new(
            "Secret/etcd-server",
            Err(HcpError::pki("bad key")),
        ));
        let output = TableRenderer::new().render_pass_report(&report);
        assert!(output.contains("Service/kube-apiserver"));
        assert!(output.contains("bad key"));

        let invalid = PassReport::invalid(1, HcpError::validation("no release image"));
        assert!(TableRenderer::new()
            .render_pass_report(&invalid)
            .contains("no release image"));
    }
}
