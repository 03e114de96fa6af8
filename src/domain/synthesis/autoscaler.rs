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
use crate::infrastructure::constants::*;
use crate::shared::error::Result;

const HEALTH_CHECK_PATH: &str = "health-check";

/// Guest node autoscaler; carries the cluster's autoscaling limits.
pub struct ClusterAutoscaler;

impl Synthesizer for ClusterAutoscaler {
    fn component(&self) -> &'static str {
        COMPONENT_CLUSTER_AUTOSCALER
    }

    fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<ComponentParams> {
        input.check_platform()?;
        let image = input.images.require(IMAGE_CLUSTER_AUTOSCALER)?;
        let limits = &input.cluster.autoscaling;

        let mut args = vec![
            "--cloud-provider=clusterapi".to_string(),
            format!("--address=:{}", CLUSTER_AUTOSCALER_PORT),
            format!(
                "--max-graceful-termination-sec={}",
                limits.max_pod_grace_period()
            ),
            format!(
                "--max-node-provision-time={}",
                limits.max_node_provision_time()
            ),
            format!(
                "--expendable-pods-priority-cutoff={}",
                limits.pod_priority_threshold()
            ),
            "--leader-elect=true".to_string(),
        ];
        if let Some(max) = limits.max_nodes_total {
            args.push(format!("--max-nodes-total={}", max));
        }

        Ok(ComponentParams {
            component: COMPONENT_CLUSTER_AUTOSCALER.to_string(),
            image: image.to_string(),
            port: CLUSTER_AUTOSCALER_PORT,
            replicas: input.replicas(),
            args,
            liveness_probe: ProbeSpec::https_liveness(CLUSTER_AUTOSCALER_PORT)
                .with_path(HEALTH_CHECK_PATH)
                .with_scheme(SCHEME_HTTP),
            readiness_probe: ProbeSpec::https_readiness(CLUSTER_AUTOSCALER_PORT)
                .with_path(HEALTH_CHECK_PATH)
                .with_scheme(SCHEME_HTTP),
            resources: ResourceRequests::new("60Mi", "10m"),
            scheduling: Scheduling {
                priority_class: PRIORITY_CLASS_CLUSTER_CRITICAL.to_string(),
            },
            cloud_provider: None,
            serving_cert_secret: None,
            labels: selector_labels(COMPONENT_CLUSTER_AUTOSCALER),
        })
    }
}
