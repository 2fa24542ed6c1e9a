//! Get-or-create-or-update for one object.

use tracing::{debug, info, warn};

use crate::error::ErrorClass;
use crate::resource::Resource;
use crate::store::ResourceApi;

use super::identity::carry_identity;
use super::outcome::Outcome;
use super::retry::{PersistPolicy, Persisted, persist_update};

/// Converges one object toward `desired`.
///
/// Failures are logged and reported in the returned [`Outcome`]; they never
/// propagate, so one bad object cannot stop the rest of a pass.
pub async fn reconcile_one<R, S>(store: &S, policy: &PersistPolicy, desired: &R) -> Outcome
where
    R: Resource,
    S: ResourceApi<R> + ?Sized,
{
    let reference = desired.reference();

    let existing = match store.get(&reference.namespace, &reference.name).await {
        Ok(existing) => existing,
        Err(err) if err.is_not_found() => return create_absent(store, desired).await,
        Err(err) => {
            warn!("Failed to read {reference}: {err}");
            return Outcome::failed(&err);
        }
    };

    if existing.is_equivalent(desired) {
        debug!("{reference} already matches desired state");
        return Outcome::Unchanged;
    }

    let updated = carry_identity(&existing, desired);
    match persist_update(store, policy, &updated).await {
        Ok(Persisted::Written(_)) => {
            debug!("Updated {reference}");
            Outcome::Updated
        }
        Ok(Persisted::Vanished) => Outcome::skipped("deleted before the update landed"),
        Err(err) => {
            warn!("Failed to update {reference}: {err}");
            Outcome::failed(&err)
        }
    }
}

async fn create_absent<R, S>(store: &S, desired: &R) -> Outcome
where
    R: Resource,
    S: ResourceApi<R> + ?Sized,
{
    let reference = desired.reference();
    let mut fresh = desired.clone();
    fresh.metadata_mut().clear_identity();

    match store.create(&fresh).await {
        Ok(_) => {
            info!("Created {reference}");
            Outcome::Created
        }
        Err(err) => match err.class() {
            ErrorClass::AlreadyExists => {
                debug!("{reference} was created concurrently");
                Outcome::skipped("created concurrently")
            }
            ErrorClass::Forbidden => {
                info!("Not creating {reference}, namespace is terminating: {err}");
                Outcome::failed(&err)
            }
            _ => {
                warn!("Failed to create {reference}: {err}");
                Outcome::failed(&err)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::resource::{
        EndpointAddress, EndpointPort, EndpointSubset, Endpoints, ObjectMeta, Protocol,
        ResourceKind, ResourceRef, Service, ServicePort,
    };
    use crate::store::{MemoryStore, StoreCall, StoreOp};
    use tokio_test::assert_ok;

    fn web_service() -> Service {
        let mut service = Service {
            metadata: ObjectMeta::new("tenant-a", "web"),
            ..Service::default()
        };
        service.spec.ports.push(ServicePort {
            name: Some(String::from("http")),
            port: 80,
            target_port: Some(8080),
            protocol: Protocol::Tcp,
        });
        service
    }

    fn endpoints(ip: &str) -> Endpoints {
        Endpoints {
            metadata: ObjectMeta::new("tenant-a", "web").with_label("app", "web"),
            subsets: vec![EndpointSubset {
                addresses: vec![EndpointAddress {
                    ip: ip.to_string(),
                    hostname: None,
                }],
                not_ready_addresses: vec![],
                ports: vec![EndpointPort {
                    name: None,
                    port: 8080,
                    protocol: Protocol::Tcp,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_absent_service_is_created() {
        let store = MemoryStore::new();
        let outcome = reconcile_one(&store, &PersistPolicy::default(), &web_service()).await;
        assert_eq!(outcome, Outcome::Created);

        let reference = ResourceRef::new(ResourceKind::Service, "tenant-a", "web");
        assert_eq!(
            store.calls().await,
            vec![
                StoreCall {
                    op: StoreOp::Get,
                    reference: reference.clone(),
                },
                StoreCall {
                    op: StoreOp::Create,
                    reference,
                },
            ]
        );

        let stored = assert_ok!(ResourceApi::<Service>::get(&store, "tenant-a", "web").await);
        assert_eq!(stored.spec.ports[0].port, 80);
        assert!(stored.metadata.uid.is_some());
    }

    #[tokio::test]
    async fn test_existing_service_is_updated_with_its_identity() {
        let store = MemoryStore::new();
        let created = assert_ok!(ResourceApi::<Service>::create(&store, &web_service()).await);

        let mut desired = web_service();
        desired.spec.ports[0].target_port = Some(9090);
        // A stale token in desired state must not leak into the write.
        desired.metadata.resource_version = Some(String::from("999"));

        let outcome = reconcile_one(&store, &PersistPolicy::default(), &desired).await;
        assert_eq!(outcome, Outcome::Updated);

        let stored = assert_ok!(ResourceApi::<Service>::get(&store, "tenant-a", "web").await);
        assert_eq!(stored.metadata.uid, created.metadata.uid);
        assert_eq!(stored.spec.ports[0].target_port, Some(9090));
    }

    #[tokio::test]
    async fn test_second_endpoints_pass_writes_nothing() {
        let store = MemoryStore::new();
        let policy = PersistPolicy::default();

        assert_eq!(reconcile_one(&store, &policy, &endpoints("10.0.0.12")).await, Outcome::Created);
        store.clear_journal().await;

        assert_eq!(reconcile_one(&store, &policy, &endpoints("10.0.0.12")).await, Outcome::Unchanged);
        assert_eq!(store.write_count().await, 0);

        assert_eq!(reconcile_one(&store, &policy, &endpoints("10.0.0.13")).await, Outcome::Updated);
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_race_is_skipped() {
        let store = MemoryStore::new();
        assert_ok!(ResourceApi::<Service>::create(&store, &web_service()).await);
        let reference = web_service().reference();
        store
            .fail_times(StoreOp::Get, reference.clone(), StoreError::not_found(&reference), 1)
            .await;

        let outcome = reconcile_one(&store, &PersistPolicy::default(), &web_service()).await;
        assert!(matches!(outcome, Outcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_terminating_namespace_is_reported_not_raised() {
        let store = MemoryStore::new();
        store.terminate_namespace("tenant-a").await;

        let outcome = reconcile_one(&store, &PersistPolicy::default(), &endpoints("10.0.0.12")).await;
        assert!(matches!(
            outcome,
            Outcome::Failed {
                class: ErrorClass::Forbidden,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_read_failure_is_reported() {
        let store = MemoryStore::new();
        let reference = web_service().reference();
        store
            .fail_always(StoreOp::Get, reference, StoreError::unavailable("timeout"))
            .await;

        let outcome = reconcile_one(&store, &PersistPolicy::default(), &web_service()).await;
        assert!(outcome.is_failure());
        assert_eq!(store.write_count().await, 0);
    }
}
