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

//! Signing identities (certificate authorities).
//!
//! Each trust domain owns exactly one signer, stored in its own Secret. A
//! rotated signer keeps the previous CA certificate so that leaves issued by
//! either generation verify during the overlap window.

use crate::shared::error::{HcpError, Result};
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, KeyPair,
    KeyUsagePurpose,
};
use std::collections::BTreeMap;
use std::fmt;

pub const CA_CERT_KEY: &str = "ca.crt";
pub const CA_PRIVATE_KEY_KEY: &str = "ca.key";
pub const CA_PREVIOUS_CERT_KEY: &str = "ca-previous.crt";
pub const CA_GENERATION_ANNOTATION: &str = "hcp.dev/ca-generation";

/// Signer certificates live for ten years
pub const CA_VALIDITY_DAYS: i64 = 3650;

const CA_ORGANIZATION: &str = "hcp";

/// Disjoint trust domains; no two share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrustDomain {
    Root,
    Aggregator,
    Etcd,
    Metrics,
}

impl TrustDomain {
    pub const ALL: [TrustDomain; 4] = [
        TrustDomain::Root,
        TrustDomain::Aggregator,
        TrustDomain::Etcd,
        TrustDomain::Metrics,
    ];

    pub fn secret_name(&self) -> &'static str {
        match self {
            TrustDomain::Root => "root-signer",
            TrustDomain::Aggregator => "aggregator-signer",
            TrustDomain::Etcd => "etcd-signer",
            TrustDomain::Metrics => "metrics-signer",
        }
    }

    pub fn common_name(&self) -> &'static str {
        match self {
            TrustDomain::Root => "root-ca",
            TrustDomain::Aggregator => "aggregator-ca",
            TrustDomain::Etcd => "etcd-ca",
            TrustDomain::Metrics => "metrics-ca",
        }
    }
}

impl fmt::Display for TrustDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.secret_name())
    }
}

#[derive(Clone)]
pub struct SigningIdentity {
    domain: TrustDomain,
    generation: u64,
    cert_pem: String,
    key_pem: String,
    previous_cert_pem: Option<String>,
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("domain", &self.domain)
            .field("generation", &self.generation)
            .field("has_previous", &self.previous_cert_pem.is_some())
            .finish()
    }
}

impl SigningIdentity {
    /// Create a fresh self-signed CA at generation 1.
    pub fn generate(domain: TrustDomain, now: DateTime<Utc>) -> Result<Self> {
        let (cert_pem, key_pem) = self_signed_ca(domain, now)?;
        Ok(Self {
            domain,
            generation: 1,
            cert_pem,
            key_pem,
            previous_cert_pem: None,
        })
    }

    /// Load a signer from its Secret. Missing or unparsable material is a
    /// dependency failure, never a reason to regenerate.
    pub fn from_secret(domain: TrustDomain, secret: &Secret) -> Result<Self> {
        let name = secret
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| domain.secret_name().to_string());
        let unavailable =
            |reason: String| HcpError::dependency_unavailable("Secret", name.clone(), reason);

        let cert_pem = secret_string(secret, CA_CERT_KEY)
            .ok_or_else(|| unavailable(format!("missing key {}", CA_CERT_KEY)))?;
        let key_pem = secret_string(secret, CA_PRIVATE_KEY_KEY)
            .ok_or_else(|| unavailable(format!("missing key {}", CA_PRIVATE_KEY_KEY)))?;

        KeyPair::from_pem(&key_pem)
            .map_err(|e| unavailable(format!("unparsable signing key: {}", e)))?;
        super::leaf::inspect_certificate(&cert_pem)
            .map_err(|e| unavailable(format!("unparsable signing certificate: {}", e)))?;

        let generation = secret
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(CA_GENERATION_ANNOTATION))
            .map(|g| {
                g.parse::<u64>()
                    .map_err(|e| unavailable(format!("invalid generation '{}': {}", g, e)))
            })
            .transpose()?
            .unwrap_or(1);

        Ok(Self {
            domain,
            generation,
            cert_pem,
            key_pem,
            previous_cert_pem: secret_string(secret, CA_PREVIOUS_CERT_KEY),
        })
    }

    /// Render the signer as a Secret, keeping name and namespace from `meta`.
    pub fn to_secret(&self, meta: ObjectMeta) -> Secret {
        let mut data = BTreeMap::new();
        data.insert(
            CA_CERT_KEY.to_string(),
            ByteString(self.cert_pem.clone().into_bytes()),
        );
        data.insert(
            CA_PRIVATE_KEY_KEY.to_string(),
            ByteString(self.key_pem.clone().into_bytes()),
        );
        if let Some(previous) = &self.previous_cert_pem {
            data.insert(
                CA_PREVIOUS_CERT_KEY.to_string(),
                ByteString(previous.clone().into_bytes()),
            );
        }

        let mut metadata = meta;
        metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(
                CA_GENERATION_ANNOTATION.to_string(),
                self.generation.to_string(),
            );

        Secret {
            metadata,
            data: Some(data),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        }
    }

    /// New key and certificate at the next generation. The current
    /// certificate stays trusted as `previous` until explicitly retired.
    pub fn rotate(&self, now: DateTime<Utc>) -> Result<Self> {
        let (cert_pem, key_pem) = self_signed_ca(self.domain, now)?;
        Ok(Self {
            domain: self.domain,
            generation: self.generation + 1,
            cert_pem,
            key_pem,
            previous_cert_pem: Some(self.cert_pem.clone()),
        })
    }

    /// Drop the previous CA once every leaf of this domain reports the
    /// current generation. Returns `None` while any leaf lags behind.
    pub fn retire_previous(&self, leaf_generations: &[u64]) -> Option<Self> {
        self.previous_cert_pem.as_ref()?;
        if leaf_generations.iter().any(|g| *g != self.generation) {
            return None;
        }
        Some(Self {
            previous_cert_pem: None,
            ..self.clone()
        })
    }

    pub fn domain(&self) -> TrustDomain {
        self.domain
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn has_previous(&self) -> bool {
        self.previous_cert_pem.is_some()
    }

    /// Certificates a verifier should trust: current first, then previous.
    pub fn ca_bundle(&self) -> String {
        let mut bundle = self.cert_pem.clone();
        if let Some(previous) = &self.previous_cert_pem {
            if !bundle.ends_with('\n') {
                bundle.push('\n');
            }
            bundle.push_str(previous);
        }
        bundle
    }

    pub(crate) fn key_pair(&self) -> Result<KeyPair> {
        KeyPair::from_pem(&self.key_pem).map_err(|e| {
            HcpError::dependency_unavailable(
                "Secret",
                self.domain.secret_name(),
                format!("failed to load signing key: {}", e),
            )
        })
    }
}

pub(crate) fn secret_string(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .and_then(|v| String::from_utf8(v.0.clone()).ok())
        .filter(|s| !s.is_empty())
}

pub(crate) fn to_offset_datetime(ts: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(ts.timestamp())
        .map_err(|e| HcpError::pki(format!("timestamp out of range: {}", e)))
}

fn self_signed_ca(domain: TrustDomain, now: DateTime<Utc>) -> Result<(String, String)> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(domain.common_name().to_string()),
    );
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String(CA_ORGANIZATION.to_string()),
    );
    params.distinguished_name = dn;

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = to_offset_datetime(now)?;
    params.not_after = to_offset_datetime(now + Duration::days(CA_VALIDITY_DAYS))?;

    let key_pair = KeyPair::generate()
        .map_err(|e| HcpError::pki(format!("failed to generate CA key: {}", e)))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| HcpError::pki(format!("failed to create CA certificate: {}", e)))?;

    Ok((cert.pem(), key_pair.serialize_pem()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("clusters-example".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_secret_round_trip_keeps_generation() {
        let signer = SigningIdentity::generate(TrustDomain::Root, Utc::now()).unwrap();
        let rotated = signer.rotate(Utc::now()).unwrap();
        let secret = rotated.to_secret(meta("root-signer"));

        let loaded = SigningIdentity::from_secret(TrustDomain::Root, &secret).unwrap();
        assert_eq!(loaded.generation(), 2);
        assert!(loaded.has_previous());
        assert_eq!(loaded.cert_pem(), rotated.cert_pem());
    }

    #[test]
    fn test_missing_key_is_dependency_unavailable() {
        let signer = SigningIdentity::generate(TrustDomain::Etcd, Utc::now()).unwrap();
        let mut secret = signer.to_secret(meta("etcd-signer"));
        secret.data.as_mut().unwrap().remove(CA_PRIVATE_KEY_KEY);

        let err = SigningIdentity::from_secret(TrustDomain::Etcd, &secret).unwrap_err();
        assert!(matches!(err, HcpError::DependencyUnavailable { .. }));
    }

    #[test]
    fn test_garbage_certificate_is_dependency_unavailable() {
        let signer = SigningIdentity::generate(TrustDomain::Metrics, Utc::now()).unwrap();
        let mut secret = signer.to_secret(meta("metrics-signer"));
        secret.data.as_mut().unwrap().insert(
            CA_CERT_KEY.to_string(),
            ByteString(b"not a certificate".to_vec()),
        );

        let err = SigningIdentity::from_secret(TrustDomain::Metrics, &secret).unwrap_err();
        assert!(matches!(err, HcpError::DependencyUnavailable { .. }));
    }

    #[test]
    fn test_rotation_keeps_previous_in_bundle() {
        let signer = SigningIdentity::generate(TrustDomain::Aggregator, Utc::now()).unwrap();
        let rotated = signer.rotate(Utc::now()).unwrap();

        assert_eq!(rotated.generation(), signer.generation() + 1);
        assert_ne!(rotated.cert_pem(), signer.cert_pem());
        let bundle = rotated.ca_bundle();
        assert!(bundle.contains(rotated.cert_pem().trim()));
        assert!(bundle.contains(signer.cert_pem().trim()));
    }

    #[test]
    fn test_previous_retired_only_after_all_leaves_converge() {
        let signer = SigningIdentity::generate(TrustDomain::Root, Utc::now()).unwrap();
        let rotated = signer.rotate(Utc::now()).unwrap();

        assert!(rotated.retire_previous(&[2, 1, 2]).is_none());

        let retired = rotated.retire_previous(&[2, 2, 2]).unwrap();
        assert!(!retired.has_previous());
        assert_eq!(retired.generation(), 2);
        assert_eq!(retired.ca_bundle(), rotated.cert_pem());
    }

    #[test]
    fn test_trust_domains_are_disjoint() {
        let mut names: Vec<_> = TrustDomain::ALL.iter().map(|d| d.secret_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), TrustDomain::ALL.len());
    }
}
