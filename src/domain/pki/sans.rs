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

//! Subject alternative name derivation.

use crate::shared::error::{HcpError, Result};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Accumulates DNS and IP SANs in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanSet {
    pub dns_names: BTreeSet<String>,
    pub ip_addresses: BTreeSet<IpAddr>,
}

impl SanSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<svc>`, `<svc>.<ns>.svc` and `<svc>.<ns>.svc.<cluster_domain>`.
    pub fn service(mut self, service: &str, namespace: &str, cluster_domain: &str) -> Self {
        self.dns_names
            .extend(service_dns_names(service, namespace, cluster_domain));
        self
    }

    /// Aliases under the `default` namespace, used by aggregated API servers
    /// that the guest cluster reaches through `default`-namespace services.
    pub fn default_namespace_alias(mut self, service: &str, cluster_domain: &str) -> Self {
        self.dns_names.insert(format!("{}.default.svc", service));
        self.dns_names
            .insert(format!("{}.default.svc.{}", service, cluster_domain));
        self
    }

    pub fn dns(mut self, name: impl Into<String>) -> Self {
        self.dns_names.insert(name.into());
        self
    }

    pub fn dns_opt(self, name: Option<&str>) -> Self {
        match name {
            Some(n) if !n.is_empty() => self.dns(n),
            _ => self,
        }
    }

    pub fn ip(mut self, ip: IpAddr) -> Self {
        self.ip_addresses.insert(ip);
        self
    }
}

pub fn service_dns_names(service: &str, namespace: &str, cluster_domain: &str) -> Vec<String> {
    vec![
        service.to_string(),
        format!("{}.{}.svc", service, namespace),
        format!("{}.{}.svc.{}", service, namespace, cluster_domain),
    ]
}

/// First usable address of a service CIDR; the guest `kubernetes` service
/// is allocated there.
pub fn first_service_ip(cidr: &str) -> Result<IpAddr> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| HcpError::validation(format!("invalid CIDR '{}'", cidr)))?;
    let prefix: u32 = prefix
        .parse()
        .map_err(|_| HcpError::validation(format!("invalid CIDR prefix in '{}'", cidr)))?;
    let addr: IpAddr = addr
        .parse()
        .map_err(|_| HcpError::validation(format!("invalid CIDR address in '{}'", cidr)))?;

    match addr {
        IpAddr::V4(v4) if prefix <= 30 => {
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            let network = u32::from(v4) & mask;
            Ok(IpAddr::V4(Ipv4Addr::from(network + 1)))
        }
        IpAddr::V6(v6) if prefix <= 126 => {
            let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) };
            let network = u128::from(v6) & mask;
            Ok(IpAddr::V6(Ipv6Addr::from(network + 1)))
        }
        _ => Err(HcpError::validation(format!(
            "CIDR '{}' has no room for a service address",
            cidr
        ))),
    }
}
