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

pub struct OpenShiftControllerManager;

impl Synthesizer for OpenShiftControllerManager {
    fn component(&self) -> &'static str {
        COMPONENT_OPENSHIFT_CONTROLLER_MANAGER
    }

    fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<ComponentParams> {
        input.check_platform()?;
        let image = input.images.require(IMAGE_OPENSHIFT_CONTROLLER_MANAGER)?;

        Ok(ComponentParams {
            component: COMPONENT_OPENSHIFT_CONTROLLER_MANAGER.to_string(),
            image: image.to_string(),
            port: OPENSHIFT_CONTROLLER_MANAGER_PORT,
            replicas: input.replicas(),
            args: vec![
                "start".to_string(),
                format!("--listen=https://0.0.0.0:{}", OPENSHIFT_CONTROLLER_MANAGER_PORT),
            ],
            liveness_probe: ProbeSpec::https_liveness(OPENSHIFT_CONTROLLER_MANAGER_PORT),
            readiness_probe: ProbeSpec::https_readiness(OPENSHIFT_CONTROLLER_MANAGER_PORT),
            resources: ResourceRequests::new("100Mi", "100m"),
            scheduling: Scheduling {
                priority_class: PRIORITY_CLASS_CLUSTER_CRITICAL.to_string(),
            },
            cloud_provider: None,
            serving_cert_secret: Some(
                ComponentCert::OpenShiftControllerManager
                    .secret_name()
                    .to_string(),
            ),
            labels: selector_labels(COMPONENT_OPENSHIFT_CONTROLLER_MANAGER),
        })
    }
}
