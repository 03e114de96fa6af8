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

//! OpenShift and OAuth aggregated API servers.

use super::common::{
    selector_labels, ComponentParams, ProbeSpec, ResourceRequests, Scheduling, SynthesisInput,
    Synthesizer,
};
use crate::domain::pki::ComponentCert;
use crate::infrastructure::constants::*;
use crate::shared::error::Result;

pub struct OpenShiftApiServer;

pub struct OAuthApiServer;

fn apiserver_params(
    input: &SynthesisInput<'_>,
    component: &str,
    image_key: &str,
    cert: ComponentCert,
    resources: ResourceRequests,
) -> Result<ComponentParams> {
    input.check_platform()?;
    let image = input.images.require(image_key)?;

    let args = vec![
        "start".to_string(),
        format!("--secure-port={}", OPENSHIFT_APISERVER_PORT),
        format!("--tls-cert-file={}/tls.crt", SERVING_CERT_MOUNT_PATH),
        format!("--tls-private-key-file={}/tls.key", SERVING_CERT_MOUNT_PATH),
    ];

    Ok(ComponentParams {
        component: component.to_string(),
        image: image.to_string(),
        port: OPENSHIFT_APISERVER_PORT,
        replicas: input.replicas(),
        args,
        liveness_probe: ProbeSpec::https_liveness(OPENSHIFT_APISERVER_PORT),
        readiness_probe: ProbeSpec::https_readiness(OPENSHIFT_APISERVER_PORT)
            .with_path("readyz"),
        resources,
        scheduling: Scheduling {
            priority_class: PRIORITY_CLASS_NODE_CRITICAL.to_string(),
        },
        cloud_provider: None,
        serving_cert_secret: Some(cert.secret_name().to_string()),
        labels: selector_labels(component),
    })
}

impl Synthesizer for OpenShiftApiServer {
    fn component(&self) -> &'static str {
        COMPONENT_OPENSHIFT_APISERVER
    }

    fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<ComponentParams> {
        apiserver_params(
            input,
            COMPONENT_OPENSHIFT_APISERVER,
            IMAGE_OPENSHIFT_APISERVER,
            ComponentCert::OpenShiftApiServer,
            ResourceRequests::new("200Mi", "100m"),
        )
    }
}

impl Synthesizer for OAuthApiServer {
    fn component(&self) -> &'static str {
        COMPONENT_OAUTH_APISERVER
    }

    fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<ComponentParams> {
        apiserver_params(
            input,
            COMPONENT_OAUTH_APISERVER,
            IMAGE_OAUTH_APISERVER,
            ComponentCert::OpenShiftOAuthApiServer,
            ResourceRequests::new("80Mi", "15m"),
        )
    }
}
