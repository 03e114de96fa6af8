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

//! Component parameter synthesis.
//!
//! Every synthesizer is a pure function of the cluster spec, the platform
//! context and the image references. Identical inputs give identical
//! output, which lets the reconciler diff against live objects cheaply.

pub mod autoscaler;
pub mod cloud;
pub mod common;
pub mod images;
pub mod kcm;
pub mod oapi;
pub mod ocm;

pub use self::autoscaler::ClusterAutoscaler;
pub use self::cloud::{
    CloudProviderDescriptor, CloudProviderRegistry, CloudProviderWiring, CredentialSelector,
    PlatformContext,
};
pub use self::common::{
    selector_labels, ComponentParams, ProbeSpec, ResourceRequests, Scheduling, SynthesisInput,
    Synthesizer,
};
pub use self::images::ImageRefs;
pub use self::kcm::KubeControllerManager;
pub use self::oapi::{OAuthApiServer, OpenShiftApiServer};
pub use self::ocm::OpenShiftControllerManager;

use crate::shared::error::Result;

/// All workload synthesizers, in a stable order.
pub fn synthesizers() -> Vec<Box<dyn Synthesizer>> {
    vec![
        Box::new(KubeControllerManager),
        Box::new(OpenShiftApiServer),
        Box::new(OAuthApiServer),
        Box::new(OpenShiftControllerManager),
        Box::new(ClusterAutoscaler),
    ]
}

pub fn synthesize_all(input: &SynthesisInput<'_>) -> Result<Vec<ComponentParams>> {
    synthesizers()
        .iter()
        .map(|s| s.synthesize(input))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api::{AvailabilityPolicy, HostedClusterSpec, PlatformSpec};
    use crate::infrastructure::constants::*;
    use crate::shared::error::HcpError;

    const AWS_SPEC: &str = r#"
release:
  image: quay.io/example/release:4.8.0
pullSecret: {name: pull-secret}
signingKey: {name: signing-key}
sshKey: {name: ssh-key}
networking:
  serviceCIDR: 172.31.0.0/16
  podCIDR: 10.132.0.0/14
  machineCIDR: 10.0.0.0/16
platform:
  type: AWS
  aws:
    region: us-east-1
    vpc: vpc-0abc
    kubeCloudControllerCreds: {name: kcc-creds}
    nodePoolManagementCreds: {name: npm-creds}
autoscaling:
  maxNodesTotal: 20
"#;

    fn aws_spec() -> HostedClusterSpec {
        serde_yaml::from_str(AWS_SPEC).unwrap()
    }

    fn images() -> ImageRefs {
        ImageRefs::new()
            .with(IMAGE_HYPERKUBE, "quay.io/example/hyperkube:1")
            .with(IMAGE_OPENSHIFT_APISERVER, "quay.io/example/oapi:1")
            .with(IMAGE_OAUTH_APISERVER, "quay.io/example/oauth-apiserver:1")
            .with(IMAGE_OPENSHIFT_CONTROLLER_MANAGER, "quay.io/example/ocm:1")
            .with(IMAGE_CLUSTER_AUTOSCALER, "quay.io/example/autoscaler:1")
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let spec = aws_spec();
        let platform = PlatformContext::from_spec(&spec.platform);
        let images = images();
        let input = SynthesisInput::new(&spec, &platform, &images);

        let first = synthesize_all(&input).unwrap();
        let second = synthesize_all(&input).unwrap();
        assert_eq!(first, second);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        }
    }

    #[test]
    fn test_availability_policy_drives_replicas() {
        let mut spec = aws_spec();
        let platform = PlatformContext::from_spec(&spec.platform);
        let images = images();

        let single = synthesize_all(&SynthesisInput::new(&spec, &platform, &images)).unwrap();
        assert!(single.iter().all(|p| p.replicas == 1));

        spec.controller_availability_policy = AvailabilityPolicy::HighlyAvailable;
        let ha = synthesize_all(&SynthesisInput::new(&spec, &platform, &images)).unwrap();
        assert!(ha.iter().all(|p| p.replicas == 3));
    }

    #[test]
    fn test_kcm_params() {
        let spec = aws_spec();
        let platform = PlatformContext::from_spec(&spec.platform);
        let images = images();
        let params = KubeControllerManager
            .synthesize(&SynthesisInput::new(&spec, &platform, &images))
            .unwrap();

        assert_eq!(params.port, 10257);
        assert_eq!(params.image, "quay.io/example/hyperkube:1");
        assert_eq!(params.scheduling.priority_class, "system-node-critical");
        assert_eq!(params.resources, ResourceRequests::new("200Mi", "60m"));
        assert_eq!(params.liveness_probe.initial_delay_seconds, 45);
        assert_eq!(params.readiness_probe.initial_delay_seconds, 10);

        let cloud = params.cloud_provider.unwrap();
        assert_eq!(cloud.provider, "aws");
        assert_eq!(cloud.credentials.name, "kcc-creds");
        assert!(params.args.contains(&"--cloud-provider=aws".to_string()));
        assert!(params
            .args
            .contains(&"--service-cluster-ip-range=172.31.0.0/16".to_string()));
    }

    #[test]
    fn test_none_platform_has_no_cloud_wiring() {
        let mut spec = aws_spec();
        spec.platform = PlatformSpec::None;
        let platform = PlatformContext::from_spec(&spec.platform);
        let images = images();
        let params = KubeControllerManager
            .synthesize(&SynthesisInput::new(&spec, &platform, &images))
            .unwrap();

        assert!(params.cloud_provider.is_none());
        assert!(!params.args.iter().any(|a| a.starts_with("--cloud-provider")));
    }

    #[test]
    fn test_unregistered_platform_fails_instead_of_dropping_wiring() {
        let spec = aws_spec();
        let platform = PlatformContext::from_spec(&spec.platform)
            .with_registry(CloudProviderRegistry::empty());
        let images = images();

        let err = KubeControllerManager
            .synthesize(&SynthesisInput::new(&spec, &platform, &images))
            .unwrap_err();
        assert!(matches!(err, HcpError::Validation(_)));
    }

    #[test]
    fn test_mismatched_platform_context_fails() {
        let spec = aws_spec();
        let platform = PlatformContext::from_spec(&PlatformSpec::None);
        let images = images();

        assert!(synthesize_all(&SynthesisInput::new(&spec, &platform, &images)).is_err());
    }

    #[test]
    fn test_missing_image_fails() {
        let spec = aws_spec();
        let platform = PlatformContext::from_spec(&spec.platform);
        let images = ImageRefs::new().with(IMAGE_HYPERKUBE, "quay.io/example/hyperkube:1");

        let err = OpenShiftApiServer
            .synthesize(&SynthesisInput::new(&spec, &platform, &images))
            .unwrap_err();
        assert!(err.to_string().contains("openshift-apiserver"));
    }

    #[test]
    fn test_aggregated_apiservers_listen_on_8443() {
        let spec = aws_spec();
        let platform = PlatformContext::from_spec(&spec.platform);
        let images = images();
        let input = SynthesisInput::new(&spec, &platform, &images);

        for synthesizer in [
            &OpenShiftApiServer as &dyn Synthesizer,
            &OAuthApiServer as &dyn Synthesizer,
        ] {
            let params = synthesizer.synthesize(&input).unwrap();
            assert_eq!(params.port, 8443);
            assert_eq!(
                params.labels.get("app").map(String::as_str),
                Some(synthesizer.component())
            );
        }
    }

    #[test]
    fn test_autoscaler_carries_limits_and_defaults() {
        let spec = aws_spec();
        let platform = PlatformContext::from_spec(&spec.platform);
        let images = images();
        let params = ClusterAutoscaler
            .synthesize(&SynthesisInput::new(&spec, &platform, &images))
            .unwrap();

        assert_eq!(params.port, 8085);
        assert!(params.args.contains(&"--max-nodes-total=20".to_string()));
        assert!(params
            .args
            .contains(&"--max-graceful-termination-sec=600".to_string()));
        assert!(params
            .args
            .contains(&"--max-node-provision-time=15m".to_string()));
        assert!(params
            .args
            .contains(&"--expendable-pods-priority-cutoff=-10".to_string()));
        assert_eq!(params.liveness_probe.scheme, "HTTP");
    }
}
