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

/// Operator identity
pub const OPERATOR_NAME: &str = "hcp-kube";
pub const DEFAULT_FIELD_MANAGER: &str = "hcp-kube";
pub const POD_CLUSTER_DOMAIN: &str = "cluster.local";

/// Resource labels
pub const LABEL_APP: &str = "app";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_HOSTED_CLUSTER: &str = "hcp.dev/hosted-cluster";
pub const LABEL_COMPONENT: &str = "hcp.dev/component";

/// Control plane components
pub const COMPONENT_KUBE_APISERVER: &str = "kube-apiserver";
pub const COMPONENT_KCM: &str = "kube-controller-manager";
pub const COMPONENT_OPENSHIFT_APISERVER: &str = "openshift-apiserver";
pub const COMPONENT_OAUTH_APISERVER: &str = "openshift-oauth-apiserver";
pub const COMPONENT_OPENSHIFT_CONTROLLER_MANAGER: &str = "openshift-controller-manager";
pub const COMPONENT_CLUSTER_AUTOSCALER: &str = "cluster-autoscaler";
pub const COMPONENT_ETCD: &str = "etcd";
pub const COMPONENT_PKI: &str = "control-plane-pki";

/// Etcd service names
pub const ETCD_CLIENT_SERVICE: &str = "etcd-client";
pub const ETCD_DISCOVERY_SERVICE: &str = "etcd-discovery";

/// Published service names
pub const SERVICE_KUBE_APISERVER: &str = "kube-apiserver";
pub const SERVICE_VPN: &str = "openvpn-server";
pub const SERVICE_OAUTH: &str = "oauth-openshift";
pub const SERVICE_OIDC: &str = "oidc";

/// Published service ports
pub const KUBE_APISERVER_PORT: i32 = 6443;
pub const VPN_PORT: i32 = 1194;
pub const ROUTE_HTTPS_PORT: i32 = 443;
pub const OAUTH_SERVER_PORT: i32 = 6443;
pub const OAUTH_SERVICE_PORT: i32 = 443;
pub const OIDC_SERVER_PORT: i32 = 8443;
pub const OIDC_SERVICE_PORT: i32 = 443;

/// Component ports
pub const KCM_PORT: i32 = 10257;
pub const OPENSHIFT_APISERVER_PORT: i32 = 8443;
pub const OPENSHIFT_APISERVICE_PORT: i32 = 443;
pub const OPENSHIFT_CONTROLLER_MANAGER_PORT: i32 = 8443;
pub const CLUSTER_AUTOSCALER_PORT: i32 = 8085;

/// Port names
pub const PORT_NAME_HTTPS: &str = "https";
pub const PORT_NAME_VPN: &str = "vpn";
pub const PORT_NAME_METRICS: &str = "metrics";
pub const PROTOCOL_TCP: &str = "TCP";

/// Service types
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";
pub const SERVICE_TYPE_NODE_PORT: &str = "NodePort";
pub const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";

/// Health check configuration
pub const HEALTHZ_PATH: &str = "healthz";
pub const SCHEME_HTTPS: &str = "HTTPS";
pub const SCHEME_HTTP: &str = "HTTP";
pub const LIVENESS_INITIAL_DELAY: i32 = 45;
pub const READINESS_INITIAL_DELAY: i32 = 10;
pub const PROBE_TIMEOUT: i32 = 10;
pub const PROBE_PERIOD: i32 = 10;
pub const PROBE_FAILURE_THRESHOLD: i32 = 3;
pub const PROBE_SUCCESS_THRESHOLD: i32 = 1;

/// Priority classes
pub const PRIORITY_CLASS_NODE_CRITICAL: &str = "system-node-critical";
pub const PRIORITY_CLASS_CLUSTER_CRITICAL: &str = "system-cluster-critical";

/// Image reference keys
pub const IMAGE_HYPERKUBE: &str = "hyperkube";
pub const IMAGE_OPENSHIFT_APISERVER: &str = "openshift-apiserver";
pub const IMAGE_OAUTH_APISERVER: &str = "oauth-apiserver";
pub const IMAGE_OPENSHIFT_CONTROLLER_MANAGER: &str = "openshift-controller-manager";
pub const IMAGE_CLUSTER_AUTOSCALER: &str = "cluster-autoscaler";

/// Cloud provider wiring
pub const AWS_PROVIDER_NAME: &str = "aws";
pub const AWS_PROVIDER_CONFIG_NAME: &str = "aws-cloud-config";
pub const VOLUME_NAME_CLOUD_CONFIG: &str = "cloud-config";
pub const VOLUME_NAME_CLOUD_CREDS: &str = "cloud-creds";
pub const CLOUD_CONFIG_MOUNT_PATH: &str = "/etc/kubernetes/cloud";
pub const CLOUD_CREDS_MOUNT_PATH: &str = "/etc/kubernetes/secrets/cloud";

/// Certificate mounts
pub const VOLUME_NAME_SERVING_CERT: &str = "serving-cert";
pub const SERVING_CERT_MOUNT_PATH: &str = "/etc/kubernetes/certs/serving";

/// Rolling update settings
pub const MAX_UNAVAILABLE: &str = "25%";
pub const MAX_SURGE: &str = "25%";

/// Restart policy
pub const RESTART_POLICY_ALWAYS: &str = "Always";

/// Affinity topology key
pub const TOPOLOGY_KEY_HOSTNAME: &str = "kubernetes.io/hostname";
