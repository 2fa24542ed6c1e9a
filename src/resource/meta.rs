//! Object metadata shared by every managed resource kind.
//!
//! Metadata splits into two halves: the mutable half (labels, annotations)
//! that desired state owns, and the identity half (uid, resource version,
//! creation timestamp) that only the control plane assigns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of resources managed by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// Tenant namespace.
    Namespace,
    /// Network service.
    Service,
    /// Ingress route.
    Ingress,
    /// Secret (certificates, credentials).
    Secret,
    /// Endpoint set.
    Endpoints,
    /// Horizontal autoscaling policy.
    Autoscaler,
}

impl ResourceKind {
    /// Returns the kind name as used in manifests and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::Service => "Service",
            Self::Ingress => "Ingress",
            Self::Secret => "Secret",
            Self::Endpoints => "Endpoints",
            Self::Autoscaler => "Autoscaler",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to every object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object name, unique per namespace and kind.
    pub name: String,
    /// Namespace the object lives in. Empty for namespaces themselves.
    #[serde(default)]
    pub namespace: String,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Server-assigned unique identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Server-assigned version, bumped on every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    /// When the object was first created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// The server-assigned identity of an object.
///
/// Must be echoed back unchanged on update for optimistic concurrency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityToken {
    /// Unique identifier.
    pub uid: Option<String>,
    /// Resource version.
    pub resource_version: Option<String>,
    /// Creation timestamp.
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// A reference to an object by kind, namespace and name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceRef {
    /// Kind of the object.
    pub kind: ResourceKind,
    /// Namespace of the object.
    pub namespace: String,
    /// Name of the object.
    pub name: String,
}

impl ObjectMeta {
    /// Creates metadata for a named object in a namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Returns the identity token of this object.
    #[must_use]
    pub fn identity(&self) -> IdentityToken {
        IdentityToken {
            uid: self.uid.clone(),
            resource_version: self.resource_version.clone(),
            creation_timestamp: self.creation_timestamp,
        }
    }

    /// Overwrites the identity half of this metadata.
    pub fn set_identity(&mut self, token: IdentityToken) {
        self.uid = token.uid;
        self.resource_version = token.resource_version;
        self.creation_timestamp = token.creation_timestamp;
    }

    /// Clears every server-assigned field.
    pub fn clear_identity(&mut self) {
        self.set_identity(IdentityToken::default());
    }

    /// Returns true if the control plane has assigned an identity.
    #[must_use]
    pub const fn has_identity(&self) -> bool {
        self.uid.is_some() || self.resource_version.is_some()
    }
}

impl ResourceRef {
    /// Creates a new reference.
    #[must_use]
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}
