//! Reconciler for converging one application onto the control plane.
//!
//! This module implements the apply pass: ensure the tenant namespace,
//! converge every desired object in scope, then sweep the delete lists.
//! It also exposes the standalone entry points used for single objects
//! and for keyed-list upgrades of ingress routes and secrets.

use tracing::{debug, info, warn};

use crate::app::AppModel;
use crate::converge::{
    ApplyReport, ApplyScope, ChangePlan, ErrorPolicy, KeyedReport, Outcome, PersistPolicy,
    preview, reconcile_keyed, reconcile_one, sweep,
};
use crate::error::{ReconcileError, Result};
use crate::resource::{
    Autoscaler, Endpoints, Ingress, ManagedResource, Namespace, Resource, Secret, Service,
};
use crate::store::{ClusterStore, ResourceApi};

/// Reconciler driving a control-plane store toward desired state.
pub struct Reconciler<'a, S: ClusterStore + ?Sized> {
    /// Control-plane store.
    store: &'a S,
    /// Retry budget for updates.
    persist: PersistPolicy,
}

impl<'a, S: ClusterStore + ?Sized> Reconciler<'a, S> {
    /// Creates a new reconciler with the default retry budget.
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            persist: PersistPolicy::default(),
        }
    }

    /// Sets the retry budget for updates.
    #[must_use]
    pub const fn with_persist_policy(mut self, persist: PersistPolicy) -> Self {
        self.persist = persist;
        self
    }

    /// Returns the retry budget for updates.
    #[must_use]
    pub const fn persist_policy(&self) -> &PersistPolicy {
        &self.persist
    }

    /// Converges every resource of `app` in scope.
    ///
    /// Individual resource failures are logged and reported, never raised.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tenant namespace cannot be ensured.
    pub async fn apply_one<A: AppModel + ?Sized>(&self, app: &A) -> Result<ApplyReport> {
        let tenant_id = app.tenant_id();
        info!("Applying {}/{}", tenant_id, app.service_id());

        let mut report = ApplyReport::new(&tenant_id, app.service_id());

        let namespace = app.tenant_namespace();
        let outcome = self.ensure_namespace(&namespace).await?;
        report.push(namespace.reference(), outcome);

        let scope = ApplyScope::of(app);
        if scope.narrowed {
            info!(
                "Custom parameters narrow this pass to {} objects",
                scope.desired.len()
            );
        }

        for desired in &scope.desired {
            let outcome = self.reconcile_managed(desired).await;
            report.push(desired.reference(), outcome);
        }

        report.outcomes.extend(sweep(self.store, &scope.deletions).await);
        report.finish();

        let counts = report.counts();
        if counts.failed > 0 {
            warn!("Applied {tenant_id} with failures: {counts}");
        } else {
            info!("Applied {tenant_id}: {counts}");
        }

        Ok(report)
    }

    /// Previews what [`Self::apply_one`] would do, without writing.
    ///
    /// # Errors
    ///
    /// Returns an error if a read fails for any reason other than not-found.
    pub async fn plan<A: AppModel + ?Sized>(&self, app: &A) -> Result<ChangePlan> {
        preview(self.store, app).await
    }

    /// Converges one service.
    ///
    /// # Errors
    ///
    /// Returns an error if the service could not be reconciled.
    pub async fn ensure_service(&self, service: &Service) -> Result<Outcome> {
        reconcile_one(self.store, &self.persist, service)
            .await
            .into_result(&service.reference())
    }

    /// Converges one endpoint set, skipping the write when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint set could not be reconciled.
    pub async fn ensure_endpoints(&self, endpoints: &Endpoints) -> Result<Outcome> {
        reconcile_one(self.store, &self.persist, endpoints)
            .await
            .into_result(&endpoints.reference())
    }

    /// Converges one autoscaler.
    ///
    /// # Errors
    ///
    /// Returns an error if the autoscaler could not be reconciled.
    pub async fn ensure_autoscaler(&self, autoscaler: &Autoscaler) -> Result<Outcome> {
        reconcile_one(self.store, &self.persist, autoscaler)
            .await
            .into_result(&autoscaler.reference())
    }

    /// Upgrades ingress routes from `old` to `new`, recording every written
    /// route on `app`.
    ///
    /// # Errors
    ///
    /// Returns the error an [`ErrorPolicy`] aborted with.
    pub async fn upgrade_ingresses<A, P>(
        &self,
        app: &mut A,
        old: &[Ingress],
        new: Vec<Ingress>,
        policy: &mut P,
    ) -> Result<KeyedReport>
    where
        A: AppModel + ?Sized,
        P: ErrorPolicy + ?Sized,
    {
        debug!("Upgrading {} ingresses to {}", old.len(), new.len());
        reconcile_keyed(self.store, old, new, policy, |written| app.record_ingress(written)).await
    }

    /// Upgrades secrets from `old` to `new`, recording every written secret
    /// on `app`.
    ///
    /// # Errors
    ///
    /// Returns the error an [`ErrorPolicy`] aborted with.
    pub async fn upgrade_secrets<A, P>(
        &self,
        app: &mut A,
        old: &[Secret],
        new: Vec<Secret>,
        policy: &mut P,
    ) -> Result<KeyedReport>
    where
        A: AppModel + ?Sized,
        P: ErrorPolicy + ?Sized,
    {
        debug!("Upgrading {} secrets to {}", old.len(), new.len());
        reconcile_keyed(self.store, old, new, policy, |written| app.record_secret(written)).await
    }

    /// Upgrades from a previously applied application to `app`.
    ///
    /// Secrets go first so that ingress routes never point at a TLS secret
    /// that is not written yet.
    ///
    /// # Errors
    ///
    /// Returns the error an [`ErrorPolicy`] aborted with.
    pub async fn upgrade<A, O, P>(
        &self,
        app: &mut A,
        previous: &O,
        policy: &mut P,
    ) -> Result<KeyedReport>
    where
        A: AppModel + ?Sized,
        O: AppModel + ?Sized,
        P: ErrorPolicy + ?Sized,
    {
        info!("Upgrading {}/{}", app.tenant_id(), app.service_id());

        let old_secrets = self.observe(&previous.secrets()).await;
        let new_secrets = app.secrets();
        let mut report = self
            .upgrade_secrets(app, &old_secrets, new_secrets, policy)
            .await?;

        let old_ingresses = self.observe(&previous.ingresses()).await;
        let new_ingresses = app.ingresses();
        report.extend(
            self.upgrade_ingresses(app, &old_ingresses, new_ingresses, policy)
                .await?,
        );

        info!("Upgraded {}: {}", app.tenant_id(), report.counts());
        Ok(report)
    }

    /// Returns the stored copy of each entry, or the entry itself when it
    /// cannot be read, so that old entries carry current identity tokens.
    pub async fn observe<R>(&self, entries: &[R]) -> Vec<R>
    where
        R: Resource,
        S: ResourceApi<R>,
    {
        let mut observed = Vec::with_capacity(entries.len());
        for entry in entries {
            let meta = entry.metadata();
            match ResourceApi::<R>::get(self.store, &meta.namespace, &meta.name).await {
                Ok(stored) => observed.push(stored),
                Err(err) => {
                    debug!("Using manifest copy of {}: {err}", entry.reference());
                    observed.push(entry.clone());
                }
            }
        }
        observed
    }

    /// Gets or creates the tenant namespace.
    async fn ensure_namespace(&self, namespace: &Namespace) -> Result<Outcome> {
        let name = namespace.metadata.name.as_str();
        let namespace_error = |reason: String| ReconcileError::Namespace {
            namespace: name.to_string(),
            reason,
        };

        match ResourceApi::<Namespace>::get(self.store, "", name).await {
            Ok(_) => {
                debug!("Namespace {name} exists");
                Ok(Outcome::Unchanged)
            }
            Err(err) if err.is_not_found() => {
                match ResourceApi::<Namespace>::create(self.store, namespace).await {
                    Ok(_) => {
                        info!("Created namespace {name}");
                        Ok(Outcome::Created)
                    }
                    Err(err) if err.is_already_exists() => {
                        Ok(Outcome::skipped("created concurrently"))
                    }
                    Err(err) => Err(namespace_error(format!("error creating namespace: {err}")).into()),
                }
            }
            Err(err) => Err(namespace_error(format!("error checking namespace: {err}")).into()),
        }
    }

    /// Converges one object of any kind.
    async fn reconcile_managed(&self, desired: &ManagedResource) -> Outcome {
        let (store, persist) = (self.store, &self.persist);
        match desired {
            ManagedResource::Namespace(ns) => reconcile_one(store, persist, ns).await,
            ManagedResource::Service(svc) => reconcile_one(store, persist, svc).await,
            ManagedResource::Ingress(ing) => reconcile_one(store, persist, ing).await,
            ManagedResource::Secret(secret) => reconcile_one(store, persist, secret).await,
            ManagedResource::Endpoints(ep) => reconcile_one(store, persist, ep).await,
            ManagedResource::Autoscaler(hpa) => reconcile_one(store, persist, hpa).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppService, DOMAIN_PARAM, DeleteEntry, MockAppModel};
    use crate::converge::{AbortOnError, ContinueOnError, L4_HOST_ANNOTATION, L4_PORT_ANNOTATION};
    use crate::error::{ConvergeError, ErrorClass, StoreError};
    use crate::resource::{
        AutoscalerSpec, EndpointAddress, EndpointPort, EndpointSubset, IngressRule, IngressTls,
        ObjectMeta, Protocol, ResourceKind, ResourceRef, ScaleTarget,
    };
    use crate::store::{MemoryStore, StoreCall, StoreOp, get_by_ref};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta::new("tenant-a", name)
    }

    fn tls_secret(payload: &str) -> Secret {
        let mut secret = Secret {
            metadata: meta("web-tls"),
            secret_type: String::from("kubernetes.io/tls"),
            ..Secret::default()
        };
        secret.data.insert("tls.crt".into(), payload.into());
        secret
    }

    fn web_ingress() -> Ingress {
        let mut ingress = Ingress {
            metadata: meta("web"),
            ..Ingress::default()
        };
        ingress.spec.rules.push(IngressRule {
            host: String::from("www.example.com"),
            paths: vec![],
        });
        ingress.spec.tls.push(IngressTls {
            hosts: vec![String::from("www.example.com")],
            secret_name: String::from("web-tls"),
        });
        ingress
    }

    fn web_endpoints() -> Endpoints {
        Endpoints {
            metadata: meta("web"),
            subsets: vec![EndpointSubset {
                addresses: vec![EndpointAddress {
                    ip: String::from("10.0.0.12"),
                    hostname: None,
                }],
                not_ready_addresses: vec![],
                ports: vec![EndpointPort {
                    name: Some(String::from("http")),
                    port: 8080,
                    protocol: Protocol::Tcp,
                }],
            }],
        }
    }

    fn app() -> AppService {
        let mut app = AppService::new("tenant-a", "svc-1");
        app.services.push(Service {
            metadata: meta("web"),
            ..Service::default()
        });
        app.secrets.push(tls_secret("Y2VydA=="));
        app.endpoints.push(web_endpoints());
        app.ingresses.push(web_ingress());
        app.autoscalers.push(Autoscaler {
            metadata: meta("web"),
            spec: AutoscalerSpec {
                target: ScaleTarget {
                    kind: String::from("Deployment"),
                    name: String::from("web"),
                },
                min_replicas: 1,
                max_replicas: 4,
                metrics: vec![],
            },
        });
        app.delete.ingresses.push("legacy-route".into());
        app
    }

    #[tokio::test]
    async fn test_apply_creates_everything_in_order() {
        let store = MemoryStore::new();
        let report = assert_ok!(Reconciler::new(&store).apply_one(&app()).await);

        let kinds: Vec<_> = report.outcomes.iter().map(|o| o.reference.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Namespace,
                ResourceKind::Service,
                ResourceKind::Secret,
                ResourceKind::Endpoints,
                ResourceKind::Ingress,
                ResourceKind::Autoscaler,
                ResourceKind::Ingress,
            ]
        );
        assert_eq!(report.counts().created, 6);
        assert_eq!(report.counts().skipped, 1);
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_second_apply_leaves_endpoints_alone() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store);
        let app = app();
        assert_ok!(reconciler.apply_one(&app).await);
        store.clear_journal().await;

        let report = assert_ok!(reconciler.apply_one(&app).await);
        let endpoints = web_endpoints().reference();
        assert_eq!(report.outcome_of(&endpoints), Some(&Outcome::Unchanged));
        assert!(
            store
                .calls()
                .await
                .iter()
                .all(|call| call.reference != endpoints || call.op == StoreOp::Get)
        );
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_namespace_failure_is_fatal() {
        let store = MemoryStore::new();
        let namespace = ResourceRef::new(ResourceKind::Namespace, "", "tenant-a");
        store
            .fail_always(StoreOp::Create, namespace, StoreError::forbidden("quota exceeded"))
            .await;

        let err = assert_err!(Reconciler::new(&store).apply_one(&app()).await);
        assert!(matches!(
            err,
            ConvergeError::Reconcile(ReconcileError::Namespace { .. })
        ));
        assert_eq!(store.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_resource_failure_does_not_stop_the_pass() {
        let store = MemoryStore::new();
        let service = ResourceRef::new(ResourceKind::Service, "tenant-a", "web");
        store
            .fail_always(StoreOp::Create, service.clone(), StoreError::unavailable("timeout"))
            .await;

        let report = assert_ok!(Reconciler::new(&store).apply_one(&app()).await);
        assert!(report.outcome_of(&service).is_some_and(Outcome::is_failure));
        assert_eq!(report.counts().created, 5);
    }

    #[tokio::test]
    async fn test_domain_narrows_to_secret_then_ingress() {
        let store = MemoryStore::new();
        let mut app = app();
        app.custom_params
            .insert(DOMAIN_PARAM.to_string(), String::from("www.example.com"));

        assert_ok!(Reconciler::new(&store).apply_one(&app).await);

        let writes: Vec<_> = store
            .calls()
            .await
            .into_iter()
            .filter(|call| call.op == StoreOp::Create)
            .map(|call| call.reference.kind)
            .collect();
        assert_eq!(
            writes,
            vec![ResourceKind::Namespace, ResourceKind::Secret, ResourceKind::Ingress]
        );
    }

    #[tokio::test]
    async fn test_tcp_address_narrows_to_annotated_ingress() {
        let store = MemoryStore::new();
        let mut app = app();
        app.ingresses.push(Ingress {
            metadata: meta("db")
                .with_annotation(L4_HOST_ANNOTATION, "10.0.0.5")
                .with_annotation(L4_PORT_ANNOTATION, "5432"),
            ..Ingress::default()
        });
        app.custom_params.insert(
            crate::app::TCP_ADDRESS_PARAM.to_string(),
            String::from("10.0.0.5:5432"),
        );

        let report = assert_ok!(Reconciler::new(&store).apply_one(&app).await);
        let db = ResourceRef::new(ResourceKind::Ingress, "tenant-a", "db");
        assert_eq!(report.outcome_of(&db), Some(&Outcome::Created));
        assert_eq!(report.counts().created, 2);
    }

    #[tokio::test]
    async fn test_sweep_removes_objects_outside_the_tenant_namespace() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store);
        let mut app = app();
        app.ingresses.push(Ingress {
            metadata: ObjectMeta::new("shared", "route"),
            ..Ingress::default()
        });
        assert_ok!(reconciler.apply_one(&app).await);
        let shared = ResourceRef::new(ResourceKind::Ingress, "shared", "route");
        assert_ok!(get_by_ref(&store, &shared).await);

        app.ingresses.pop();
        app.delete
            .ingresses
            .push(DeleteEntry::in_namespace("shared", "route"));
        let report = assert_ok!(reconciler.apply_one(&app).await);

        assert_eq!(report.outcome_of(&shared), Some(&Outcome::Deleted));
        assert!(store.objects(Some(ResourceKind::Ingress)).await.iter().all(|o| o.reference() != shared));
    }

    #[tokio::test]
    async fn test_ensure_service_surfaces_failure() {
        let store = MemoryStore::new();
        store.terminate_namespace("tenant-a").await;
        let reconciler = Reconciler::new(&store);

        let service = Service {
            metadata: meta("web"),
            ..Service::default()
        };
        let err = assert_err!(reconciler.ensure_service(&service).await);
        assert_eq!(err.class(), ErrorClass::Forbidden);
    }

    #[tokio::test]
    async fn test_ensure_endpoints_and_autoscaler() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store);

        assert_eq!(assert_ok!(reconciler.ensure_endpoints(&web_endpoints()).await), Outcome::Created);
        assert_eq!(assert_ok!(reconciler.ensure_endpoints(&web_endpoints()).await), Outcome::Unchanged);

        let autoscaler = app().autoscalers.remove(0);
        assert_eq!(assert_ok!(reconciler.ensure_autoscaler(&autoscaler).await), Outcome::Created);
        assert_eq!(assert_ok!(reconciler.ensure_autoscaler(&autoscaler).await), Outcome::Updated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_retry_uses_configured_policy() {
        let store = MemoryStore::new();
        let service = Service {
            metadata: meta("web"),
            ..Service::default()
        };
        assert_ok!(ResourceApi::<Service>::create(&store, &service).await);
        store
            .fail_always(StoreOp::Update, service.reference(), StoreError::unavailable("timeout"))
            .await;

        let policy = PersistPolicy::default()
            .with_max_attempts(3)
            .with_interval(Duration::from_secs(1));
        let reconciler = Reconciler::new(&store).with_persist_policy(policy);

        assert_err!(reconciler.ensure_service(&service).await);
        assert_eq!(store.count(StoreOp::Update).await, 3);
    }

    #[tokio::test]
    async fn test_upgrade_secrets_records_written_objects() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store);

        let mut model = MockAppModel::new();
        model
            .expect_record_secret()
            .withf(|secret| secret.metadata.name == "web-tls" && secret.metadata.uid.is_some())
            .times(1)
            .return_const(());
        model.expect_record_ingress().never();

        let report = assert_ok!(
            reconciler
                .upgrade_secrets(&mut model, &[], vec![tls_secret("Y2VydA==")], &mut ContinueOnError)
                .await
        );
        assert_eq!(report.counts().created, 1);
    }

    #[tokio::test]
    async fn test_upgrade_moves_tls_secret_before_ingress() {
        let store = MemoryStore::new();
        let previous = app();
        assert_ok!(Reconciler::new(&store).apply_one(&previous).await);
        let stored_secret = assert_ok!(ResourceApi::<Secret>::get(&store, "tenant-a", "web-tls").await);
        store.clear_journal().await;

        let mut next = previous.clone();
        next.secrets[0] = tls_secret("bmV3LWNlcnQ=");
        let report = assert_ok!(
            Reconciler::new(&store)
                .upgrade(&mut next, &previous, &mut AbortOnError)
                .await
        );

        assert_eq!(
            store.calls().await,
            vec![
                StoreCall {
                    op: StoreOp::Get,
                    reference: stored_secret.reference(),
                },
                StoreCall {
                    op: StoreOp::Update,
                    reference: stored_secret.reference(),
                },
                StoreCall {
                    op: StoreOp::Get,
                    reference: web_ingress().reference(),
                },
                StoreCall {
                    op: StoreOp::Update,
                    reference: web_ingress().reference(),
                },
            ]
        );
        assert_eq!(report.counts().updated, 2);

        // The written secret kept its uid and was recorded back on the app.
        assert_eq!(next.secrets[0].metadata.uid, stored_secret.metadata.uid);
        assert_ne!(
            next.secrets[0].metadata.resource_version,
            stored_secret.metadata.resource_version
        );
        assert_eq!(next.secrets[0].data.get("tls.crt").map(String::as_str), Some("bmV3LWNlcnQ="));
    }

    #[tokio::test]
    async fn test_plan_does_not_write() {
        let store = MemoryStore::new();
        let plan = assert_ok!(Reconciler::new(&store).plan(&app()).await);
        assert!(plan.has_changes());
        assert_eq!(store.write_count().await, 0);
    }
}
