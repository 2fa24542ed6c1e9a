//! Resource kind definitions.
//!
//! These types mirror the subset of the control-plane object model the
//! engine manages. Each kind carries [`ObjectMeta`] plus a kind-specific
//! payload which desired state fully owns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::meta::ObjectMeta;

/// A tenant namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Namespace {
    /// Object metadata.
    pub metadata: ObjectMeta,
}

/// A network service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Service specification.
    #[serde(default)]
    pub spec: ServiceSpec,
}

/// Service specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Exposed ports.
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    /// Pod selector.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    /// How the service is exposed.
    #[serde(default, rename = "type")]
    pub service_type: ServiceType,
    /// Cluster IP, if pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,
}

/// A single service port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePort {
    /// Port name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Service port.
    pub port: u16,
    /// Container port traffic is forwarded to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    /// Transport protocol.
    #[serde(default)]
    pub protocol: Protocol,
}

/// Transport protocols.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP.
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

/// Service exposure types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ServiceType {
    /// Cluster-internal virtual IP.
    #[default]
    ClusterIP,
    /// Exposed on every node.
    NodePort,
    /// Exposed through an external load balancer.
    LoadBalancer,
}

/// An ingress route.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingress {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Ingress specification.
    #[serde(default)]
    pub spec: IngressSpec,
}

/// Ingress specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngressSpec {
    /// Host routing rules.
    #[serde(default)]
    pub rules: Vec<IngressRule>,
    /// TLS termination entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTls>,
}

/// A host routing rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngressRule {
    /// Host name matched by this rule.
    #[serde(default)]
    pub host: String,
    /// Path routes.
    #[serde(default)]
    pub paths: Vec<IngressPath>,
}

/// A path route to a backend service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngressPath {
    /// Path prefix.
    #[serde(default = "default_path")]
    pub path: String,
    /// Backend service name.
    pub service_name: String,
    /// Backend service port.
    pub service_port: u16,
}

/// A TLS termination entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngressTls {
    /// Hosts covered by the certificate.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Name of the secret holding the certificate.
    pub secret_name: String,
}

/// A secret.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Secret type (e.g. `kubernetes.io/tls`).
    #[serde(default = "default_secret_type", rename = "type")]
    pub secret_type: String,
    /// Base64-encoded payload entries.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// An endpoint set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoints {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Address subsets.
    #[serde(default)]
    pub subsets: Vec<EndpointSubset>,
}

/// A group of addresses sharing the same ports.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointSubset {
    /// Ready addresses.
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,
    /// Addresses not ready to receive traffic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_ready_addresses: Vec<EndpointAddress>,
    /// Ports served by the addresses.
    #[serde(default)]
    pub ports: Vec<EndpointPort>,
}

/// A single endpoint address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointAddress {
    /// IP address.
    pub ip: String,
    /// Optional host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// A port served by an endpoint subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointPort {
    /// Port name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Port number.
    pub port: u16,
    /// Transport protocol.
    #[serde(default)]
    pub protocol: Protocol,
}

/// A horizontal autoscaling policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Autoscaler {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Autoscaler specification.
    #[serde(default)]
    pub spec: AutoscalerSpec,
}

/// Autoscaler specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoscalerSpec {
    /// Workload being scaled.
    #[serde(default)]
    pub target: ScaleTarget,
    /// Minimum replica count.
    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,
    /// Maximum replica count.
    #[serde(default)]
    pub max_replicas: u32,
    /// Utilization thresholds.
    #[serde(default)]
    pub metrics: Vec<ScaleMetric>,
}

/// The workload an autoscaler scales.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScaleTarget {
    /// Workload kind (e.g. `Deployment`).
    #[serde(default)]
    pub kind: String,
    /// Workload name.
    #[serde(default)]
    pub name: String,
}

/// A resource utilization threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScaleMetric {
    /// Resource name (`cpu`, `memory`).
    pub resource: String,
    /// Target average utilization in percent.
    pub target_average_utilization: u32,
}

fn default_path() -> String {
    String::from("/")
}

fn default_secret_type() -> String {
    String::from("Opaque")
}

const fn default_min_replicas() -> u32 {
    1
}

impl Ingress {
    /// Returns the host of the first routing rule, if any.
    #[must_use]
    pub fn primary_host(&self) -> Option<&str> {
        self.spec.rules.first().map(|rule| rule.host.as_str())
    }

    /// Returns the secret named by the first TLS entry, if any.
    #[must_use]
    pub fn tls_secret_name(&self) -> Option<&str> {
        self.spec.tls.first().map(|tls| tls.secret_name.as_str())
    }
}

impl Namespace {
    /// Creates a namespace object with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new("", name),
        }
    }
}
