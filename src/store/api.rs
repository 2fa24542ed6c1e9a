//! Control-plane store interface.
//!
//! The engine never talks to a concrete client; it is handed a store that
//! implements [`ResourceApi`] for every kind it touches.

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::{
    Autoscaler, Endpoints, Ingress, ManagedResource, Namespace, Resource, ResourceKind,
    ResourceRef, Secret, Service,
};

/// Per-kind access to the control plane, keyed by namespace and name.
///
/// Errors are reported as [`crate::error::StoreError`] wrapped in the crate
/// error type so they can be classified.
#[async_trait]
pub trait ResourceApi<R: Resource>: Send + Sync {
    /// Fetches an object.
    async fn get(&self, namespace: &str, name: &str) -> Result<R>;

    /// Creates an object, returning it with its server-assigned identity.
    async fn create(&self, resource: &R) -> Result<R>;

    /// Replaces an object, returning it with its new resource version.
    ///
    /// When the identity token carried by `resource` does not match the
    /// stored object the update is rejected with a conflict.
    async fn update(&self, resource: &R) -> Result<R>;

    /// Deletes an object.
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

/// A store serving every kind the engine manages.
pub trait ClusterStore:
    ResourceApi<Namespace>
    + ResourceApi<Service>
    + ResourceApi<Ingress>
    + ResourceApi<Secret>
    + ResourceApi<Endpoints>
    + ResourceApi<Autoscaler>
{
}

impl<T> ClusterStore for T where
    T: ResourceApi<Namespace>
        + ResourceApi<Service>
        + ResourceApi<Ingress>
        + ResourceApi<Secret>
        + ResourceApi<Endpoints>
        + ResourceApi<Autoscaler>
        + ?Sized
{
}

/// Deletes the object a reference points at, dispatching on its kind.
///
/// # Errors
///
/// Returns the store error unchanged, including not-found.
pub async fn delete_by_ref<S>(store: &S, reference: &ResourceRef) -> Result<()>
where
    S: ClusterStore + ?Sized,
{
    let (namespace, name) = (reference.namespace.as_str(), reference.name.as_str());
    match reference.kind {
        ResourceKind::Namespace => ResourceApi::<Namespace>::delete(store, namespace, name).await,
        ResourceKind::Service => ResourceApi::<Service>::delete(store, namespace, name).await,
        ResourceKind::Ingress => ResourceApi::<Ingress>::delete(store, namespace, name).await,
        ResourceKind::Secret => ResourceApi::<Secret>::delete(store, namespace, name).await,
        ResourceKind::Endpoints => ResourceApi::<Endpoints>::delete(store, namespace, name).await,
        ResourceKind::Autoscaler => {
            ResourceApi::<Autoscaler>::delete(store, namespace, name).await
        }
    }
}

/// Reads the object a reference points at, dispatching on its kind.
///
/// # Errors
///
/// Returns the store error unchanged, including not-found.
pub async fn get_by_ref<S>(store: &S, reference: &ResourceRef) -> Result<ManagedResource>
where
    S: ClusterStore + ?Sized,
{
    let (namespace, name) = (reference.namespace.as_str(), reference.name.as_str());
    Ok(match reference.kind {
        ResourceKind::Namespace => {
            ResourceApi::<Namespace>::get(store, namespace, name).await?.into_managed()
        }
        ResourceKind::Service => ResourceApi::<Service>::get(store, namespace, name).await?.into_managed(),
        ResourceKind::Ingress => ResourceApi::<Ingress>::get(store, namespace, name).await?.into_managed(),
        ResourceKind::Secret => ResourceApi::<Secret>::get(store, namespace, name).await?.into_managed(),
        ResourceKind::Endpoints => {
            ResourceApi::<Endpoints>::get(store, namespace, name).await?.into_managed()
        }
        ResourceKind::Autoscaler => {
            ResourceApi::<Autoscaler>::get(store, namespace, name).await?.into_managed()
        }
    })
}
