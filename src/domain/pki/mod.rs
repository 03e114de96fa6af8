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

pub mod catalog;
pub mod kubeconfig;
pub mod leaf;
pub mod sans;
pub mod signer;

pub use self::catalog::{ComponentCert, PkiContext};
pub use self::kubeconfig::{
    admin_request, render_kubeconfig, with_kubeconfig, ADMIN_KUBECONFIG_SECRET, KUBECONFIG_KEY,
};
pub use self::leaf::{
    inspect_certificate, is_signed_by, issue_or_reconcile, issuer_generation, reissue_reason,
    CertRequest, CertUsage, CertificateInfo, ReissueReason,
};
pub use self::sans::{first_service_ip, SanSet};
pub use self::signer::{SigningIdentity, TrustDomain};
