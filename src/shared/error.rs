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

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HcpError>;

#[derive(Error, Debug)]
pub enum HcpError {
    /// Malformed or contradictory desired state. Fatal to the pass.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A signing identity or referenced secret is missing or unusable.
    #[error("Dependency unavailable: {kind} '{name}': {reason}")]
    DependencyUnavailable {
        kind: String,
        name: String,
        reason: String,
    },

    /// Optimistic-concurrency mismatch on write.
    #[error("Conflict writing {resource_type} '{name}': {message}")]
    Conflict {
        resource_type: String,
        name: String,
        message: String,
    },

    /// The object store rejected the call for infrastructure reasons.
    #[error("Kubernetes API error: {0}")]
    PlatformTransient(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {resource_type} '{name}' in namespace '{namespace}'")]
    NotFound {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("PKI error: {0}")]
    Pki(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for HcpError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) => match ae.code {
                404 => HcpError::NotFound {
                    resource_type: details_kind(&ae),
                    name: String::new(),
                    namespace: String::new(),
                },
                409 => HcpError::Conflict {
                    resource_type: details_kind(&ae),
                    name: String::new(),
                    message: ae.message,
                },
                400 | 422 => HcpError::Validation(ae.message),
                _ => HcpError::PlatformTransient(ae.message),
            },
            other => HcpError::PlatformTransient(other.to_string()),
        }
    }
}

fn details_kind(ae: &kube::error::ErrorResponse) -> String {
    if ae.reason.is_empty() {
        "object".to_string()
    } else {
        ae.reason.clone()
    }
}

impl HcpError {
    pub fn validation(context: impl Into<String>) -> Self {
        Self::Validation(context.into())
    }

    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn pki(context: impl Into<String>) -> Self {
        Self::Pki(context.into())
    }

    pub fn dependency_unavailable(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DependencyUnavailable {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn conflict(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            resource_type: resource_type.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HcpError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, HcpError::Conflict { .. })
    }

    /// Only write conflicts are retried inside a reconcile pass; everything
    /// else goes back to the scheduler.
    pub fn is_retryable_in_pass(&self) -> bool {
        self.is_conflict()
    }

    /// Requeue hint handed to the controller runtime.
    pub fn requeue_after(&self, transient: Duration) -> Duration {
        match self {
            HcpError::Validation(_) | HcpError::ConfigError(_) => transient * 10,
            _ => transient,
        }
    }

    /// Stable CamelCase reason used on status conditions.
    pub fn condition_reason(&self) -> &'static str {
        match self {
            HcpError::Validation(_) => "InvalidConfiguration",
            HcpError::DependencyUnavailable { .. } => "DependencyUnavailable",
            HcpError::Conflict { .. } => "ConflictRetriesExhausted",
            HcpError::PlatformTransient(_) => "PlatformError",
            HcpError::ConfigError(_) => "OperatorConfigError",
            HcpError::NotFound { .. } => "NotFound",
            HcpError::Pki(_) => "CertificateError",
            HcpError::Io(_)
            | HcpError::YamlParse(_)
            | HcpError::TomlParse(_)
            | HcpError::JsonParse(_) => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("code {}", code),
            reason: "Conflict".to_string(),
            code,
        })
    }

    #[test]
    fn test_kube_error_classification() {
        assert!(HcpError::from(api_error(409)).is_conflict());
        assert!(HcpError::from(api_error(404)).is_not_found());
        assert!(matches!(
            HcpError::from(api_error(422)),
            HcpError::Validation(_)
        ));
        assert!(matches!(
            HcpError::from(api_error(503)),
            HcpError::PlatformTransient(_)
        ));
    }

    #[test]
    fn test_only_conflicts_retry_in_pass() {
        assert!(HcpError::conflict("Service", "kube-apiserver", "stale").is_retryable_in_pass());
        assert!(!HcpError::validation("bad").is_retryable_in_pass());
        assert!(!HcpError::PlatformTransient("down".to_string()).is_retryable_in_pass());
        assert!(
            !HcpError::dependency_unavailable("Secret", "root-signer", "missing")
                .is_retryable_in_pass()
        );
    }

    #[test]
    fn test_validation_requeues_slower() {
        let base = Duration::from_secs(30);
        assert_eq!(
            HcpError::validation("x").requeue_after(base),
            Duration::from_secs(300)
        );
        assert_eq!(
            HcpError::PlatformTransient("x".to_string()).requeue_after(base),
            base
        );
    }
}
