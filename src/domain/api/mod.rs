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

//! Desired-state model for hosted clusters

pub mod hosted_cluster;
pub mod platform;
pub mod services;
pub mod status;

pub use self::hosted_cluster::{
    AvailabilityPolicy, ClusterAutoscaling, ClusterNetworking, DNSSpec, HostedCluster,
    HostedClusterSpec, LocalObjectReference, Release,
};
pub use self::platform::{
    AWSNodePoolPlatform, AWSPlatformSpec, AWSRoleCredentials, AWSServiceEndpoint, AWSVolume,
    PlatformSpec, PlatformType,
};
pub use self::services::{
    NodePortPublishingStrategy, PublishingStrategy, PublishingStrategyType,
    ServicePublishingStrategy, ServicePublishingStrategyMapping, ServiceType,
};
pub use self::status::{
    ClusterVersionStatus, Condition, ConditionStatus, HostedClusterStatus, UpdateHistory,
    UpdateState, CONDITION_AVAILABLE, CONDITION_DEGRADED, CONDITION_RECONCILIATION_SUCCEEDED,
    CONDITION_VALID_CONFIGURATION,
};
