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

use crate::domain::api::Release;
use crate::domain::synthesis::ImageRefs;
use crate::infrastructure::constants::*;
use crate::shared::error::{HcpError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

fn dns_subdomain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .expect("static regex")
    })
}

/// Operator process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConf {
    /// Watch scope; empty watches every namespace.
    pub namespace: String,
    pub field_manager: String,
    pub cluster_domain: String,
    pub max_conflict_retries: u32,
    pub history_limit: usize,
    pub requeue_interval_secs: u64,
    pub error_requeue_secs: u64,
    /// Max concurrent component steps per pass.
    pub concurrency: usize,
    /// Reissue a leaf when less than this fraction of its validity remains.
    pub cert_renewal_fraction: f64,
    /// Per-component image overrides. Components without one run from the
    /// release image.
    pub images: BTreeMap<String, String>,
}

impl Default for OperatorConf {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            cluster_domain: POD_CLUSTER_DOMAIN.to_string(),
            max_conflict_retries: 5,
            history_limit: 10,
            requeue_interval_secs: 300,
            error_requeue_secs: 30,
            concurrency: 8,
            cert_renewal_fraction: 0.2,
            images: BTreeMap::new(),
        }
    }
}

impl OperatorConf {
    /// Load configuration from TOML file
    pub fn from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = read_to_string(path).map_err(|e| {
            HcpError::config_error(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let conf: Self = toml::from_str(&content)?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_conflict_retries == 0 {
            return Err(HcpError::config_error(
                "max_conflict_retries must be at least 1",
            ));
        }
        if self.history_limit == 0 {
            return Err(HcpError::config_error("history_limit must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(HcpError::config_error("concurrency must be at least 1"));
        }
        if !(self.cert_renewal_fraction > 0.0 && self.cert_renewal_fraction < 1.0) {
            return Err(HcpError::config_error(format!(
                "cert_renewal_fraction must be within (0, 1), got {}",
                self.cert_renewal_fraction
            )));
        }
        if self.field_manager.trim().is_empty() {
            return Err(HcpError::config_error("field_manager must not be empty"));
        }
        if self.cluster_domain.len() > 253 || !dns_subdomain_regex().is_match(&self.cluster_domain)
        {
            return Err(HcpError::config_error(format!(
                "cluster_domain '{}' is not a valid DNS name",
                self.cluster_domain
            )));
        }
        Ok(())
    }

    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn watch_namespace(&self) -> Option<&str> {
        Some(self.namespace.as_str()).filter(|ns| !ns.is_empty())
    }

    /// Pull references for every component image of `release`.
    pub fn images_for(&self, release: &Release) -> ImageRefs {
        [
            IMAGE_HYPERKUBE,
            IMAGE_OPENSHIFT_APISERVER,
            IMAGE_OAUTH_APISERVER,
            IMAGE_OPENSHIFT_CONTROLLER_MANAGER,
            IMAGE_CLUSTER_AUTOSCALER,
        ]
        .into_iter()
        .map(|name| {
            let reference = self
                .images
                .get(name)
                .cloned()
                .unwrap_or_else(|| release.image.clone());
            (name.to_string(), reference)
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let conf = OperatorConf::default();
        conf.validate().unwrap();
        assert_eq!(conf.cluster_domain, "cluster.local");
        assert_eq!(conf.max_conflict_retries, 5);
        assert_eq!(conf.history_limit, 10);
        assert_eq!(conf.concurrency, 8);
        assert!(conf.watch_namespace().is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
namespace = "clusters"
max_conflict_retries = 2

[images]
hyperkube = "quay.io/hcp/hyperkube:v1"
"#
        )
        .unwrap();

        let conf = OperatorConf::from(file.path()).unwrap();
        assert_eq!(conf.watch_namespace(), Some("clusters"));
        assert_eq!(conf.max_conflict_retries, 2);
        assert_eq!(conf.history_limit, 10);
        assert_eq!(conf.images.get("hyperkube").unwrap(), "quay.io/hcp/hyperkube:v1");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = OperatorConf::from("/nonexistent/hcp-kube.toml").unwrap_err();
        assert!(matches!(err, HcpError::ConfigError(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut OperatorConf)>)> = vec![
            ("zero retries", Box::new(|c| c.max_conflict_retries = 0)),
            ("zero history", Box::new(|c| c.history_limit = 0)),
            ("zero concurrency", Box::new(|c| c.concurrency = 0)),
            ("fraction zero", Box::new(|c| c.cert_renewal_fraction = 0.0)),
            ("fraction one", Box::new(|c| c.cert_renewal_fraction = 1.0)),
            ("domain upper", Box::new(|c| c.cluster_domain = "Cluster.Local".into())),
            ("domain dot", Box::new(|c| c.cluster_domain = "cluster..local".into())),
        ];
        for (name, mutate) in cases {
            let mut conf = OperatorConf::default();
            mutate(&mut conf);
            assert!(conf.validate().is_err(), "{} should be rejected", name);
        }
    }

    #[test]
    fn test_images_fall_back_to_release() {
        let mut conf = OperatorConf::default();
        conf.images.insert(
            IMAGE_CLUSTER_AUTOSCALER.to_string(),
            "quay.io/hcp/autoscaler:v2".to_string(),
        );
        let release = Release {
            image: "quay.io/hcp/release:4.8.0".to_string(),
        };

        let images = conf.images_for(&release);
        assert_eq!(
            images.require(IMAGE_CLUSTER_AUTOSCALER).unwrap(),
            "quay.io/hcp/autoscaler:v2"
        );
        assert_eq!(
            images.require(IMAGE_HYPERKUBE).unwrap(),
            "quay.io/hcp/release:4.8.0"
        );
    }
}
