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

//! Admin kubeconfig for the hosted cluster.

use super::leaf::{CertRequest, CertUsage, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use super::signer::{secret_string, CA_CERT_KEY};
use crate::shared::error::{HcpError, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use serde::Serialize;
use std::collections::BTreeMap;

pub const KUBECONFIG_KEY: &str = "kubeconfig";
pub const ADMIN_KUBECONFIG_SECRET: &str = "admin-kubeconfig";
const CONTEXT_NAME: &str = "admin";

/// Client identity embedded in the admin kubeconfig.
pub fn admin_request() -> CertRequest {
    CertRequest::new("system:admin", CertUsage::Client).with_organization("system:masters")
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Kubeconfig {
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<Named<ClusterEntry>>,
    users: Vec<NamedUser>,
    contexts: Vec<Named<ContextEntry>>,
    current_context: &'static str,
}

#[derive(Serialize)]
struct Named<T> {
    name: &'static str,
    #[serde(flatten)]
    entry: T,
}

#[derive(Serialize)]
struct ClusterEntry {
    cluster: ClusterData,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterData {
    server: String,
    certificate_authority_data: ByteString,
}

#[derive(Serialize)]
struct NamedUser {
    name: &'static str,
    user: UserData,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct UserData {
    client_certificate_data: ByteString,
    client_key_data: ByteString,
}

#[derive(Serialize)]
struct ContextEntry {
    context: ContextData,
}

#[derive(Serialize)]
struct ContextData {
    cluster: &'static str,
    user: &'static str,
}

/// Render a kubeconfig from a client leaf secret.
pub fn render_kubeconfig(server: &str, leaf: &Secret) -> Result<String> {
    let field = |key: &str| {
        secret_string(leaf, key)
            .map(|v| ByteString(v.into_bytes()))
            .ok_or_else(|| HcpError::pki(format!("client certificate secret lacks {}", key)))
    };

    let config = Kubeconfig {
        api_version: "v1",
        kind: "Config",
        clusters: vec![Named {
            name: CONTEXT_NAME,
            entry: ClusterEntry {
                cluster: ClusterData {
                    server: server.to_string(),
                    certificate_authority_data: field(CA_CERT_KEY)?,
                },
            },
        }],
        users: vec![NamedUser {
            name: CONTEXT_NAME,
            user: UserData {
                client_certificate_data: field(TLS_CERT_KEY)?,
                client_key_data: field(TLS_PRIVATE_KEY_KEY)?,
            },
        }],
        contexts: vec![Named {
            name: CONTEXT_NAME,
            entry: ContextEntry {
                context: ContextData {
                    cluster: CONTEXT_NAME,
                    user: CONTEXT_NAME,
                },
            },
        }],
        current_context: CONTEXT_NAME,
    };

    Ok(serde_yaml::to_string(&config)?)
}

/// Add (or refresh) the kubeconfig entry of a client leaf secret.
pub fn with_kubeconfig(mut leaf: Secret, server: &str) -> Result<Secret> {
    let rendered = render_kubeconfig(server, &leaf)?;
    leaf.data
        .get_or_insert_with(BTreeMap::new)
        .insert(KUBECONFIG_KEY.to_string(), ByteString(rendered.into_bytes()));
    Ok(leaf)
}
