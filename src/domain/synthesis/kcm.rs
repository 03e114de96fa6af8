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

use super::common::{
    selector_labels, ComponentParams, ProbeSpec, ResourceRequests, Scheduling, SynthesisInput,
    Synthesizer,
};
use crate::domain::pki::ComponentCert;
use crate::infrastructure::constants::*;
use crate::shared::error::Result;

pub struct KubeControllerManager;

impl Synthesizer for KubeControllerManager {
    fn component(&self) -> &'static str {
        COMPONENT_KCM
    }

    fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<ComponentParams> {
        input.check_platform()?;
        let image = input.images.require(IMAGE_HYPERKUBE)?;
        let cloud_provider = input.platform.cloud_provider()?;
        let networking = &input.cluster.networking;

        let mut args = vec![
            COMPONENT_KCM.to_string(),
            format!("--secure-port={}", KCM_PORT),
            format!("--tls-cert-file={}/tls.crt", SERVING_CERT_MOUNT_PATH),
            format!("--tls-private-key-file={}/tls.key", SERVING_CERT_MOUNT_PATH),
            format!("--service-cluster-ip-range={}", networking.service_cidr),
            format!("--cluster-cidr={}", networking.pod_cidr),
            "--leader-elect=true".to_string(),
        ];
        if let Some(cloud) = &cloud_provider {
            args.push(format!("--cloud-provider={}", cloud.provider));
            args.push(format!(
                "--cloud-config={}/{}.conf",
                CLOUD_CONFIG_MOUNT_PATH, cloud.provider
            ));
        }

        Ok(ComponentParams {
            component: COMPONENT_KCM.to_string(),
            image: image.to_string(),
            port: KCM_PORT,
            replicas: input.replicas(),
            args,
            liveness_probe: ProbeSpec::https_liveness(KCM_PORT),
            readiness_probe: ProbeSpec::https_readiness(KCM_PORT),
            resources: ResourceRequests::new("200Mi", "60m"),
            scheduling: Scheduling {
                priority_class: PRIORITY_CLASS_NODE_CRITICAL.to_string(),
            },
            cloud_provider,
            serving_cert_secret: Some(
                ComponentCert::KubeControllerManagerServer
                    .secret_name()
                    .to_string(),
            ),
            labels: selector_labels(COMPONENT_KCM),
        })
    }
}
