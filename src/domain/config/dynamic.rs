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

//! `-D operator.<key>=<value>` overrides applied on top of the config file.

use super::operator::OperatorConf;
use crate::shared::error::{HcpError, Result};
use std::collections::HashMap;
use std::str::FromStr;

const PREFIX: &str = "operator.";
const IMAGE_PREFIX: &str = "operator.images.";

/// Parse dynamic configuration properties from -D key=value format
pub fn parse_dynamic_configs(configs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();

    for config in configs {
        let (key, value) = config.split_once('=').ok_or_else(|| {
            HcpError::config_error(format!(
                "Invalid config format: '{}'. Expected 'key=value'",
                config
            ))
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(HcpError::config_error(format!(
                "Empty key in config: '{}'",
                config
            )));
        }

        map.insert(key.to_string(), value.trim().to_string());
    }

    Ok(map)
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        HcpError::config_error(format!("Invalid value '{}' for {}: {}", value, key, e))
    })
}

pub fn apply_to_operator_conf(
    configs: &HashMap<String, String>,
    conf: &mut OperatorConf,
) -> Result<()> {
    // Sorted so that error reporting is stable.
    let mut keys: Vec<&String> = configs.keys().collect();
    keys.sort();

    for key in keys {
        let value = configs[key].as_str();

        if let Some(image) = key.strip_prefix(IMAGE_PREFIX) {
            conf.images.insert(image.to_string(), value.to_string());
            continue;
        }

        let field = key.strip_prefix(PREFIX).ok_or_else(|| {
            HcpError::config_error(format!(
                "Unknown property '{}': keys must start with '{}'",
                key, PREFIX
            ))
        })?;

        match field {
            "namespace" => conf.namespace = value.to_string(),
            "field-manager" | "field_manager" => conf.field_manager = value.to_string(),
            "cluster-domain" | "cluster_domain" => conf.cluster_domain = value.to_string(),
            "max-conflict-retries" | "max_conflict_retries" => {
                conf.max_conflict_retries = parse_value(key, value)?
            }
            "history-limit" | "history_limit" => conf.history_limit = parse_value(key, value)?,
            "requeue-interval-secs" | "requeue_interval_secs" => {
                conf.requeue_interval_secs = parse_value(key, value)?
            }
            "error-requeue-secs" | "error_requeue_secs" => {
                conf.error_requeue_secs = parse_value(key, value)?
            }
            "concurrency" => conf.concurrency = parse_value(key, value)?,
            "cert-renewal-fraction" | "cert_renewal_fraction" => {
                conf.cert_renewal_fraction = parse_value(key, value)?
            }
            other => {
                return Err(HcpError::config_error(format!(
                    "Unknown operator property '{}'",
                    other
                )))
            }
        }
    }

    Ok(())
}
