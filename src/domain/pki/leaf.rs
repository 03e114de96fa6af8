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

//! Leaf certificate issuance and drift detection.

use super::signer::{secret_string, to_offset_datetime, SigningIdentity, CA_CERT_KEY};
use crate::shared::error::{HcpError, Result};
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use rcgen::{
    string::Ia5String, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;
use x509_parser::prelude::*;

pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";
pub const ISSUER_GENERATION_ANNOTATION: &str = "hcp.dev/issuer-generation";
pub const TRUST_DOMAIN_ANNOTATION: &str = "hcp.dev/trust-domain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertUsage {
    Server,
    Client,
    ServerClient,
}

impl CertUsage {
    pub fn server_auth(&self) -> bool {
        matches!(self, CertUsage::Server | CertUsage::ServerClient)
    }

    pub fn client_auth(&self) -> bool {
        matches!(self, CertUsage::Client | CertUsage::ServerClient)
    }

    /// Serving certificates last two years, anything used as a client one.
    pub fn validity(&self) -> Duration {
        match self {
            CertUsage::Server => Duration::days(730),
            CertUsage::Client | CertUsage::ServerClient => Duration::days(365),
        }
    }

    fn extended_key_usages(&self) -> Vec<ExtendedKeyUsagePurpose> {
        let mut usages = Vec::with_capacity(2);
        if self.server_auth() {
            usages.push(ExtendedKeyUsagePurpose::ServerAuth);
        }
        if self.client_auth() {
            usages.push(ExtendedKeyUsagePurpose::ClientAuth);
        }
        usages
    }
}

/// Identity a leaf certificate must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertRequest {
    pub common_name: String,
    pub organization: Option<String>,
    pub usage: CertUsage,
    pub dns_names: BTreeSet<String>,
    pub ip_addresses: BTreeSet<IpAddr>,
}

impl CertRequest {
    pub fn new(common_name: impl Into<String>, usage: CertUsage) -> Self {
        Self {
            common_name: common_name.into(),
            organization: None,
            usage,
            dns_names: BTreeSet::new(),
            ip_addresses: BTreeSet::new(),
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_dns_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dns_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_ip_addresses<I>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        self.ip_addresses.extend(ips);
        self
    }
}

/// Why an existing leaf had to be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReissueReason {
    Missing,
    Unparsable(String),
    IssuerChanged,
    SubjectChanged,
    SansChanged,
    UsageChanged,
    NearExpiry,
}

impl fmt::Display for ReissueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReissueReason::Missing => f.write_str("certificate missing"),
            ReissueReason::Unparsable(e) => write!(f, "certificate unparsable: {}", e),
            ReissueReason::IssuerChanged => f.write_str("not signed by current signer"),
            ReissueReason::SubjectChanged => f.write_str("subject differs"),
            ReissueReason::SansChanged => f.write_str("subject alternative names differ"),
            ReissueReason::UsageChanged => f.write_str("key usage differs"),
            ReissueReason::NearExpiry => f.write_str("inside renewal window"),
        }
    }
}

/// Fields of a parsed certificate the reconciler compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub common_name: String,
    pub organizations: Vec<String>,
    pub dns_names: BTreeSet<String>,
    pub ip_addresses: BTreeSet<IpAddr>,
    pub server_auth: bool,
    pub client_auth: bool,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub serial: String,
}

impl CertificateInfo {
    /// True once less than `fraction` of the total lifetime remains.
    pub fn is_within_renewal_window(&self, now: DateTime<Utc>, fraction: f64) -> bool {
        let lifetime = (self.not_after - self.not_before).num_seconds();
        let remaining = (self.not_after - now).num_seconds();
        (remaining as f64) < (lifetime as f64) * fraction
    }
}

fn pem_to_der(pem_data: &str) -> Result<Vec<u8>> {
    let pem_obj = ::pem::parse(pem_data.as_bytes())
        .map_err(|e| HcpError::pki(format!("failed to parse PEM: {}", e)))?;
    Ok(pem_obj.contents().to_vec())
}

fn asn1_to_utc(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| HcpError::pki(format!("certificate timestamp {} out of range", ts)))
}

/// Parse the first certificate in `cert_pem`.
pub fn inspect_certificate(cert_pem: &str) -> Result<CertificateInfo> {
    let der = pem_to_der(cert_pem)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| HcpError::pki(format!("failed to parse certificate: {}", e)))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or("")
        .to_string();
    let organizations = cert
        .subject()
        .iter_organization()
        .filter_map(|o| o.as_str().ok())
        .map(str::to_string)
        .collect();

    let mut dns_names = BTreeSet::new();
    let mut ip_addresses = BTreeSet::new();
    let san = cert
        .subject_alternative_name()
        .map_err(|e| HcpError::pki(format!("invalid SAN extension: {}", e)))?;
    if let Some(san) = san {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => {
                    dns_names.insert(dns.to_string());
                }
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        ip_addresses.insert(ip);
                    }
                }
                _ => {}
            }
        }
    }

    let (server_auth, client_auth) = cert
        .extended_key_usage()
        .map_err(|e| HcpError::pki(format!("invalid extended key usage: {}", e)))?
        .map(|eku| (eku.value.server_auth, eku.value.client_auth))
        .unwrap_or((false, false));

    Ok(CertificateInfo {
        common_name,
        organizations,
        dns_names,
        ip_addresses,
        server_auth,
        client_auth,
        not_before: asn1_to_utc(cert.validity().not_before.timestamp())?,
        not_after: asn1_to_utc(cert.validity().not_after.timestamp())?,
        serial: cert.raw_serial_as_string(),
    })
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

/// Whether `cert_pem` carries a valid signature from the CA in `ca_pem`.
pub fn is_signed_by(cert_pem: &str, ca_pem: &str) -> Result<bool> {
    let cert_der = pem_to_der(cert_pem)?;
    let (_, cert) = X509Certificate::from_der(&cert_der)
        .map_err(|e| HcpError::pki(format!("failed to parse certificate: {}", e)))?;
    let ca_der = pem_to_der(ca_pem)?;
    let (_, ca_cert) = X509Certificate::from_der(&ca_der)
        .map_err(|e| HcpError::pki(format!("failed to parse CA certificate: {}", e)))?;

    Ok(cert.verify_signature(Some(ca_cert.public_key())).is_ok())
}

/// Generation of the signer that issued a leaf secret, if recorded.
pub fn issuer_generation(secret: &Secret) -> Option<u64> {
    secret
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ISSUER_GENERATION_ANNOTATION))
        .and_then(|g| g.parse().ok())
}

/// Decide whether `existing` still satisfies `req` under `signer`.
pub fn reissue_reason(
    signer: &SigningIdentity,
    existing: Option<&Secret>,
    req: &CertRequest,
    now: DateTime<Utc>,
    renewal_fraction: f64,
) -> Option<ReissueReason> {
    let existing = match existing {
        Some(secret) => secret,
        None => return Some(ReissueReason::Missing),
    };
    let (cert_pem, key_pem) = match (
        secret_string(existing, TLS_CERT_KEY),
        secret_string(existing, TLS_PRIVATE_KEY_KEY),
    ) {
        (Some(cert), Some(key)) => (cert, key),
        _ => return Some(ReissueReason::Missing),
    };

    if let Err(e) = KeyPair::from_pem(&key_pem) {
        return Some(ReissueReason::Unparsable(e.to_string()));
    }
    let info = match inspect_certificate(&cert_pem) {
        Ok(info) => info,
        Err(e) => return Some(ReissueReason::Unparsable(e.to_string())),
    };

    match is_signed_by(&cert_pem, signer.cert_pem()) {
        Ok(true) => {}
        Ok(false) => return Some(ReissueReason::IssuerChanged),
        Err(e) => return Some(ReissueReason::Unparsable(e.to_string())),
    }
    if issuer_generation(existing).is_some_and(|g| g != signer.generation()) {
        return Some(ReissueReason::IssuerChanged);
    }

    let wanted_orgs: Vec<String> = req.organization.iter().cloned().collect();
    if info.common_name != req.common_name || info.organizations != wanted_orgs {
        return Some(ReissueReason::SubjectChanged);
    }
    if info.dns_names != req.dns_names || info.ip_addresses != req.ip_addresses {
        return Some(ReissueReason::SansChanged);
    }
    if info.server_auth != req.usage.server_auth() || info.client_auth != req.usage.client_auth()
    {
        return Some(ReissueReason::UsageChanged);
    }
    if info.is_within_renewal_window(now, renewal_fraction) {
        return Some(ReissueReason::NearExpiry);
    }
    None
}

/// Return a leaf secret satisfying `req`.
///
/// A matching `existing` secret comes back with its key and certificate
/// untouched. Only the CA bundle is refreshed when the signer's trust set
/// changed. Otherwise a new key pair and certificate are minted and the
/// result carries `meta` as its metadata.
pub fn issue_or_reconcile(
    signer: &SigningIdentity,
    existing: Option<&Secret>,
    meta: &ObjectMeta,
    req: &CertRequest,
    now: DateTime<Utc>,
    renewal_fraction: f64,
) -> Result<Secret> {
    match (
        existing,
        reissue_reason(signer, existing, req, now, renewal_fraction),
    ) {
        (Some(current), None) => Ok(refresh_bundle(signer, current)),
        (_, reason) => {
            debug!(
                common_name = %req.common_name,
                trust_domain = %signer.domain(),
                reason = %reason.unwrap_or(ReissueReason::Missing),
                "Issuing leaf certificate"
            );
            issue(signer, meta, req, now)
        }
    }
}

fn refresh_bundle(signer: &SigningIdentity, current: &Secret) -> Secret {
    let bundle = signer.ca_bundle();
    if secret_string(current, CA_CERT_KEY).as_deref() == Some(bundle.as_str()) {
        return current.clone();
    }
    let mut refreshed = current.clone();
    refreshed
        .data
        .get_or_insert_with(BTreeMap::new)
        .insert(CA_CERT_KEY.to_string(), ByteString(bundle.into_bytes()));
    refreshed
}

fn issue(
    signer: &SigningIdentity,
    meta: &ObjectMeta,
    req: &CertRequest,
    now: DateTime<Utc>,
) -> Result<Secret> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(req.common_name.clone()),
    );
    if let Some(org) = &req.organization {
        dn.push(DnType::OrganizationName, DnValue::Utf8String(org.clone()));
    }
    params.distinguished_name = dn;

    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = req.usage.extended_key_usages();
    params.use_authority_key_identifier_extension = true;

    let mut sans = Vec::with_capacity(req.dns_names.len() + req.ip_addresses.len());
    for name in &req.dns_names {
        let dns = Ia5String::try_from(name.clone())
            .map_err(|e| HcpError::pki(format!("invalid DNS SAN '{}': {}", name, e)))?;
        sans.push(SanType::DnsName(dns));
    }
    sans.extend(req.ip_addresses.iter().map(|ip| SanType::IpAddress(*ip)));
    params.subject_alt_names = sans;

    params.not_before = to_offset_datetime(now)?;
    params.not_after = to_offset_datetime(now + req.usage.validity())?;

    let leaf_key = KeyPair::generate().map_err(|e| {
        HcpError::pki(format!(
            "failed to generate key for {}: {}",
            req.common_name, e
        ))
    })?;
    let ca_key = signer.key_pair()?;
    let issuer = Issuer::from_ca_cert_pem(signer.cert_pem(), &ca_key)
        .map_err(|e| HcpError::pki(format!("failed to load issuer: {}", e)))?;
    let cert = params
        .signed_by(&leaf_key, &issuer)
        .map_err(|e| HcpError::pki(format!("failed to sign {}: {}", req.common_name, e)))?;

    let mut data = BTreeMap::new();
    data.insert(TLS_CERT_KEY.to_string(), ByteString(cert.pem().into_bytes()));
    data.insert(
        TLS_PRIVATE_KEY_KEY.to_string(),
        ByteString(leaf_key.serialize_pem().into_bytes()),
    );
    data.insert(
        CA_CERT_KEY.to_string(),
        ByteString(signer.ca_bundle().into_bytes()),
    );

    let mut metadata = meta.clone();
    let annotations = metadata.annotations.get_or_insert_with(BTreeMap::new);
    annotations.insert(
        ISSUER_GENERATION_ANNOTATION.to_string(),
        signer.generation().to_string(),
    );
    annotations.insert(
        TRUST_DOMAIN_ANNOTATION.to_string(),
        signer.domain().to_string(),
    );

    Ok(Secret {
        metadata,
        data: Some(data),
        type_: Some("kubernetes.io/tls".to_string()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pki::signer::TrustDomain;

    fn meta() -> ObjectMeta {
        ObjectMeta {
            name: Some("kas-server".to_string()),
            namespace: Some("clusters-example".to_string()),
            ..Default::default()
        }
    }

    fn server_request() -> CertRequest {
        CertRequest::new("kube-apiserver", CertUsage::Server)
            .with_organization("kubernetes")
            .with_dns_names(["kube-apiserver", "kube-apiserver.clusters-example.svc"])
            .with_ip_addresses(["172.31.0.1".parse::<IpAddr>().unwrap()])
    }

    fn cert_of(secret: &Secret) -> String {
        secret_string(secret, TLS_CERT_KEY).unwrap()
    }

    #[test]
    fn test_issue_sets_subject_sans_and_usage() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Root, now).unwrap();
        let secret =
            issue_or_reconcile(&signer, None, &meta(), &server_request(), now, 0.2).unwrap();

        let info = inspect_certificate(&cert_of(&secret)).unwrap();
        assert_eq!(info.common_name, "kube-apiserver");
        assert_eq!(info.organizations, vec!["kubernetes".to_string()]);
        assert!(info.dns_names.contains("kube-apiserver.clusters-example.svc"));
        assert!(info
            .ip_addresses
            .contains(&"172.31.0.1".parse::<IpAddr>().unwrap()));
        assert!(info.server_auth);
        assert!(!info.client_auth);
        assert!(is_signed_by(&cert_of(&secret), signer.cert_pem()).unwrap());
        assert_eq!(issuer_generation(&secret), Some(1));
    }

    #[test]
    fn test_matching_secret_is_returned_unchanged() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Root, now).unwrap();
        let first =
            issue_or_reconcile(&signer, None, &meta(), &server_request(), now, 0.2).unwrap();
        let second =
            issue_or_reconcile(&signer, Some(&first), &meta(), &server_request(), now, 0.2)
                .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_new_san_triggers_reissue() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Root, now).unwrap();
        let first =
            issue_or_reconcile(&signer, None, &meta(), &server_request(), now, 0.2).unwrap();

        let widened = server_request().with_dns_names(["api.example.com"]);
        assert_eq!(
            reissue_reason(&signer, Some(&first), &widened, now, 0.2),
            Some(ReissueReason::SansChanged)
        );
        let second =
            issue_or_reconcile(&signer, Some(&first), &meta(), &widened, now, 0.2).unwrap();
        let info = inspect_certificate(&cert_of(&second)).unwrap();
        assert!(info.dns_names.contains("api.example.com"));
    }

    #[test]
    fn test_usage_change_triggers_reissue() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Root, now).unwrap();
        let first =
            issue_or_reconcile(&signer, None, &meta(), &server_request(), now, 0.2).unwrap();

        let mut both = server_request();
        both.usage = CertUsage::ServerClient;
        assert_eq!(
            reissue_reason(&signer, Some(&first), &both, now, 0.2),
            Some(ReissueReason::UsageChanged)
        );
    }

    #[test]
    fn test_foreign_signer_triggers_reissue() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Root, now).unwrap();
        let other = SigningIdentity::generate(TrustDomain::Root, now).unwrap();
        let foreign =
            issue_or_reconcile(&other, None, &meta(), &server_request(), now, 0.2).unwrap();

        assert_eq!(
            reissue_reason(&signer, Some(&foreign), &server_request(), now, 0.2),
            Some(ReissueReason::IssuerChanged)
        );
    }

    #[test]
    fn test_renewal_window() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Root, now).unwrap();
        let secret =
            issue_or_reconcile(&signer, None, &meta(), &server_request(), now, 0.2).unwrap();

        let later = now + Duration::days(600);
        assert_eq!(
            reissue_reason(&signer, Some(&secret), &server_request(), later, 0.2),
            Some(ReissueReason::NearExpiry)
        );
        let earlier = now + Duration::days(100);
        assert_eq!(
            reissue_reason(&signer, Some(&secret), &server_request(), earlier, 0.2),
            None
        );
    }

    #[test]
    fn test_garbage_leaf_is_replaced() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Etcd, now).unwrap();
        let mut data = BTreeMap::new();
        data.insert(TLS_CERT_KEY.to_string(), ByteString(b"junk".to_vec()));
        data.insert(TLS_PRIVATE_KEY_KEY.to_string(), ByteString(b"junk".to_vec()));
        let broken = Secret {
            metadata: meta(),
            data: Some(data),
            ..Default::default()
        };

        let req = CertRequest::new("etcd-client", CertUsage::Client);
        assert!(matches!(
            reissue_reason(&signer, Some(&broken), &req, now, 0.2),
            Some(ReissueReason::Unparsable(_))
        ));
        let fixed = issue_or_reconcile(&signer, Some(&broken), &meta(), &req, now, 0.2).unwrap();
        assert!(is_signed_by(&cert_of(&fixed), signer.cert_pem()).unwrap());
    }

    #[test]
    fn test_rotation_reissues_and_bundle_trusts_both() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Root, now).unwrap();
        let old_leaf =
            issue_or_reconcile(&signer, None, &meta(), &server_request(), now, 0.2).unwrap();

        let rotated = signer.rotate(now).unwrap();
        let new_leaf =
            issue_or_reconcile(&rotated, Some(&old_leaf), &meta(), &server_request(), now, 0.2)
                .unwrap();

        assert_eq!(issuer_generation(&new_leaf), Some(2));
        let bundle = secret_string(&new_leaf, CA_CERT_KEY).unwrap();
        assert!(bundle.contains(signer.cert_pem().trim()));
        assert!(bundle.contains(rotated.cert_pem().trim()));
    }

    #[test]
    fn test_retired_signer_refreshes_bundle_without_reissue() {
        let now = Utc::now();
        let signer = SigningIdentity::generate(TrustDomain::Root, now)
            .unwrap()
            .rotate(now)
            .unwrap();
        let leaf =
            issue_or_reconcile(&signer, None, &meta(), &server_request(), now, 0.2).unwrap();

        let retired = signer.retire_previous(&[2]).unwrap();
        let refreshed =
            issue_or_reconcile(&retired, Some(&leaf), &meta(), &server_request(), now, 0.2)
                .unwrap();

        assert_eq!(cert_of(&refreshed), cert_of(&leaf));
        assert_eq!(
            secret_string(&refreshed, CA_CERT_KEY).unwrap(),
            retired.ca_bundle()
        );
    }
}
