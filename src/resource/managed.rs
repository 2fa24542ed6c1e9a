//! The capability set shared by every managed kind.
//!
//! The reconciliation algorithms are written once against [`Resource`];
//! each kind only says how to reach its metadata, which fields desired
//! state owns, and when two objects are semantically the same.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::meta::{ObjectMeta, ResourceKind, ResourceRef};
use super::types::{Autoscaler, Endpoints, Ingress, Namespace, Secret, Service};

/// Capabilities the engine needs from a resource kind.
pub trait Resource:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The kind implemented by this type.
    const KIND: ResourceKind;

    /// Returns the object metadata.
    fn metadata(&self) -> &ObjectMeta;

    /// Returns the object metadata mutably.
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Overwrites every field desired state owns with the values in `desired`.
    ///
    /// Identity fields are left untouched.
    fn apply_mutable_fields(&mut self, desired: &Self);

    /// Returns true when writing `desired` over `self` would change nothing
    /// that matters. Kinds without an equality gate always report false.
    fn is_equivalent(&self, _desired: &Self) -> bool {
        false
    }

    /// Wraps this object into the kind-tagged union.
    fn into_managed(self) -> ManagedResource;

    /// Unwraps an object of this kind from the union.
    fn from_managed(managed: ManagedResource) -> Option<Self>;

    /// Returns the reference of this object.
    fn reference(&self) -> ResourceRef {
        let meta = self.metadata();
        ResourceRef::new(Self::KIND, meta.namespace.clone(), meta.name.clone())
    }
}

/// A kind-tagged object, as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum ManagedResource {
    /// A namespace.
    Namespace(Namespace),
    /// A service.
    Service(Service),
    /// An ingress route.
    Ingress(Ingress),
    /// A secret.
    Secret(Secret),
    /// An endpoint set.
    Endpoints(Endpoints),
    /// An autoscaler.
    Autoscaler(Autoscaler),
}

impl ManagedResource {
    /// Returns the kind of the wrapped object.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Namespace(_) => ResourceKind::Namespace,
            Self::Service(_) => ResourceKind::Service,
            Self::Ingress(_) => ResourceKind::Ingress,
            Self::Secret(_) => ResourceKind::Secret,
            Self::Endpoints(_) => ResourceKind::Endpoints,
            Self::Autoscaler(_) => ResourceKind::Autoscaler,
        }
    }

    /// Returns the metadata of the wrapped object.
    #[must_use]
    pub const fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Namespace(r) => &r.metadata,
            Self::Service(r) => &r.metadata,
            Self::Ingress(r) => &r.metadata,
            Self::Secret(r) => &r.metadata,
            Self::Endpoints(r) => &r.metadata,
            Self::Autoscaler(r) => &r.metadata,
        }
    }

    /// Returns the metadata of the wrapped object mutably.
    pub const fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Namespace(r) => &mut r.metadata,
            Self::Service(r) => &mut r.metadata,
            Self::Ingress(r) => &mut r.metadata,
            Self::Secret(r) => &mut r.metadata,
            Self::Endpoints(r) => &mut r.metadata,
            Self::Autoscaler(r) => &mut r.metadata,
        }
    }

    /// Returns the reference of the wrapped object.
    #[must_use]
    pub fn reference(&self) -> ResourceRef {
        let meta = self.metadata();
        ResourceRef::new(self.kind(), meta.namespace.clone(), meta.name.clone())
    }
}

/// Replaces the desired-owned half of metadata.
fn overwrite_labels(target: &mut ObjectMeta, desired: &ObjectMeta) {
    target.labels.clone_from(&desired.labels);
    target.annotations.clone_from(&desired.annotations);
}

impl Resource for Namespace {
    const KIND: ResourceKind = ResourceKind::Namespace;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn apply_mutable_fields(&mut self, desired: &Self) {
        overwrite_labels(&mut self.metadata, &desired.metadata);
    }

    fn into_managed(self) -> ManagedResource {
        ManagedResource::Namespace(self)
    }

    fn from_managed(managed: ManagedResource) -> Option<Self> {
        match managed {
            ManagedResource::Namespace(r) => Some(r),
            _ => None,
        }
    }
}

impl Resource for Service {
    const KIND: ResourceKind = ResourceKind::Service;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn apply_mutable_fields(&mut self, desired: &Self) {
        overwrite_labels(&mut self.metadata, &desired.metadata);
        self.spec.clone_from(&desired.spec);
    }

    fn into_managed(self) -> ManagedResource {
        ManagedResource::Service(self)
    }

    fn from_managed(managed: ManagedResource) -> Option<Self> {
        match managed {
            ManagedResource::Service(r) => Some(r),
            _ => None,
        }
    }
}

impl Resource for Ingress {
    const KIND: ResourceKind = ResourceKind::Ingress;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn apply_mutable_fields(&mut self, desired: &Self) {
        overwrite_labels(&mut self.metadata, &desired.metadata);
        self.spec.clone_from(&desired.spec);
    }

    fn into_managed(self) -> ManagedResource {
        ManagedResource::Ingress(self)
    }

    fn from_managed(managed: ManagedResource) -> Option<Self> {
        match managed {
            ManagedResource::Ingress(r) => Some(r),
            _ => None,
        }
    }
}

impl Resource for Secret {
    const KIND: ResourceKind = ResourceKind::Secret;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn apply_mutable_fields(&mut self, desired: &Self) {
        overwrite_labels(&mut self.metadata, &desired.metadata);
        self.secret_type.clone_from(&desired.secret_type);
        self.data.clone_from(&desired.data);
    }

    fn into_managed(self) -> ManagedResource {
        ManagedResource::Secret(self)
    }

    fn from_managed(managed: ManagedResource) -> Option<Self> {
        match managed {
            ManagedResource::Secret(r) => Some(r),
            _ => None,
        }
    }
}

impl Resource for Endpoints {
    const KIND: ResourceKind = ResourceKind::Endpoints;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    // Endpoints are re-derived on every pass; only subsets and labels are
    // owned, annotations set by other actors survive.
    fn apply_mutable_fields(&mut self, desired: &Self) {
        self.metadata.labels.clone_from(&desired.metadata.labels);
        self.subsets.clone_from(&desired.subsets);
    }

    fn is_equivalent(&self, desired: &Self) -> bool {
        self.subsets == desired.subsets && self.metadata.labels == desired.metadata.labels
    }

    fn into_managed(self) -> ManagedResource {
        ManagedResource::Endpoints(self)
    }

    fn from_managed(managed: ManagedResource) -> Option<Self> {
        match managed {
            ManagedResource::Endpoints(r) => Some(r),
            _ => None,
        }
    }
}

impl Resource for Autoscaler {
    const KIND: ResourceKind = ResourceKind::Autoscaler;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn apply_mutable_fields(&mut self, desired: &Self) {
        overwrite_labels(&mut self.metadata, &desired.metadata);
        self.spec.clone_from(&desired.spec);
    }

    fn into_managed(self) -> ManagedResource {
        ManagedResource::Autoscaler(self)
    }

    fn from_managed(managed: ManagedResource) -> Option<Self> {
        match managed {
            ManagedResource::Autoscaler(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::types::{EndpointAddress, EndpointSubset};

    fn endpoints(ip: &str) -> Endpoints {
        Endpoints {
            metadata: ObjectMeta::new("tenant-a", "web").with_label("app", "web"),
            subsets: vec![EndpointSubset {
                addresses: vec![EndpointAddress {
                    ip: ip.to_string(),
                    hostname: None,
                }],
                ..EndpointSubset::default()
            }],
        }
    }

    #[test]
    fn test_endpoints_equivalence_ignores_identity_and_annotations() {
        let mut observed = endpoints("10.0.0.1");
        observed.metadata.uid = Some(String::from("uid-1"));
        observed.metadata.resource_version = Some(String::from("7"));
        observed.metadata.annotations.insert("owner".into(), "someone-else".into());

        assert!(observed.is_equivalent(&endpoints("10.0.0.1")));
        assert!(!observed.is_equivalent(&endpoints("10.0.0.2")));
    }

    #[test]
    fn test_endpoints_label_change_breaks_equivalence() {
        let observed = endpoints("10.0.0.1");
        let mut desired = endpoints("10.0.0.1");
        desired.metadata.labels.insert("tier".into(), "frontend".into());
        assert!(!observed.is_equivalent(&desired));
    }

    #[test]
    fn test_other_kinds_have_no_equality_gate() {
        let service = Service {
            metadata: ObjectMeta::new("tenant-a", "web"),
            ..Service::default()
        };
        assert!(!service.is_equivalent(&service.clone()));
    }

    #[test]
    fn test_managed_round_trip_keeps_kind() {
        let managed = endpoints("10.0.0.1").into_managed();
        assert_eq!(managed.kind(), ResourceKind::Endpoints);
        assert_eq!(managed.reference().to_string(), "Endpoints tenant-a/web");
        assert!(Service::from_managed(managed.clone()).is_none());
        assert!(Endpoints::from_managed(managed).is_some());
    }

    #[test]
    fn test_managed_serializes_with_kind_tag() {
        let json = serde_json::to_value(endpoints("10.0.0.1").into_managed())
            .expect("serialization should succeed");
        assert_eq!(json["kind"], "Endpoints");
        assert_eq!(json["metadata"]["name"], "web");
    }
}
