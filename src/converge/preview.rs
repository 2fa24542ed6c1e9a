//! Read-only preview of an apply pass.
//!
//! The preview issues only reads. For every object in scope it reports
//! what [`crate::Reconciler::apply_one`] would do with it.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::app::AppModel;
use crate::error::Result;
use crate::resource::{ManagedResource, Namespace, Resource, ResourceRef};
use crate::store::{ClusterStore, ResourceApi, get_by_ref};

use super::identity::carry_identity;
use super::scope::ApplyScope;

/// Action a pass would take on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// The object is missing and would be created.
    Create,
    /// The object exists and differs from desired state.
    Update,
    /// The object already matches desired state.
    Unchanged,
    /// The object is listed for deletion and exists.
    Delete,
    /// The object is listed for deletion and is already gone.
    Absent,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Unchanged => "unchanged",
            Self::Delete => "delete",
            Self::Absent => "absent",
        };
        f.write_str(label)
    }
}

/// One planned change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedChange {
    /// Target object.
    pub reference: ResourceRef,
    /// What would happen to it.
    pub action: PlanAction,
}

/// Preview of a full apply pass.
#[derive(Debug, Clone, Serialize)]
pub struct ChangePlan {
    /// Tenant the pass applies to.
    pub tenant_id: String,
    /// Application service id.
    pub service_id: String,
    /// True when custom parameters narrow the pass.
    pub narrowed: bool,
    /// Planned changes, namespace first, in processing order.
    pub changes: Vec<PlannedChange>,
}

impl ChangePlan {
    /// Returns true if applying would write anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changes
            .iter()
            .any(|change| matches!(change.action, PlanAction::Create | PlanAction::Update | PlanAction::Delete))
    }

    /// Counts the changes with a given action.
    #[must_use]
    pub fn count(&self, action: PlanAction) -> usize {
        self.changes.iter().filter(|change| change.action == action).count()
    }
}

/// Computes what an apply pass over `app` would do.
///
/// # Errors
///
/// Returns an error if a read fails for any reason other than not-found.
pub async fn preview<S, A>(store: &S, app: &A) -> Result<ChangePlan>
where
    S: ClusterStore + ?Sized,
    A: AppModel + ?Sized,
{
    let scope = ApplyScope::of(app);
    let mut changes = Vec::with_capacity(scope.desired.len() + scope.deletions.len() + 1);

    let namespace = app.tenant_namespace();
    changes.push(PlannedChange {
        reference: namespace.reference(),
        action: plan_namespace(store, &namespace).await?,
    });

    for desired in &scope.desired {
        let action = match desired {
            ManagedResource::Namespace(ns) => plan_one(store, ns).await?,
            ManagedResource::Service(svc) => plan_one(store, svc).await?,
            ManagedResource::Ingress(ing) => plan_one(store, ing).await?,
            ManagedResource::Secret(secret) => plan_one(store, secret).await?,
            ManagedResource::Endpoints(ep) => plan_one(store, ep).await?,
            ManagedResource::Autoscaler(hpa) => plan_one(store, hpa).await?,
        };
        changes.push(PlannedChange {
            reference: desired.reference(),
            action,
        });
    }

    for reference in scope.deletions {
        let action = match get_by_ref(store, &reference).await {
            Ok(_) => PlanAction::Delete,
            Err(err) if err.is_not_found() => PlanAction::Absent,
            Err(err) => return Err(err),
        };
        changes.push(PlannedChange { reference, action });
    }

    debug!("Planned {} changes for {}", changes.len(), app.tenant_id());

    Ok(ChangePlan {
        tenant_id: app.tenant_id(),
        service_id: app.service_id(),
        narrowed: scope.narrowed,
        changes,
    })
}

async fn plan_namespace<S>(store: &S, namespace: &Namespace) -> Result<PlanAction>
where
    S: ResourceApi<Namespace> + ?Sized,
{
    match store.get("", &namespace.metadata.name).await {
        Ok(_) => Ok(PlanAction::Unchanged),
        Err(err) if err.is_not_found() => Ok(PlanAction::Create),
        Err(err) => Err(err),
    }
}

async fn plan_one<R, S>(store: &S, desired: &R) -> Result<PlanAction>
where
    R: Resource,
    S: ResourceApi<R> + ?Sized,
{
    let meta = desired.metadata();
    let existing = match store.get(&meta.namespace, &meta.name).await {
        Ok(existing) => existing,
        Err(err) if err.is_not_found() => return Ok(PlanAction::Create),
        Err(err) => return Err(err),
    };

    if existing.is_equivalent(desired) || same_content(&existing, &carry_identity(&existing, desired)) {
        Ok(PlanAction::Unchanged)
    } else {
        Ok(PlanAction::Update)
    }
}

fn same_content<R: Resource>(a: &R, b: &R) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppService;
    use crate::error::StoreError;
    use crate::resource::{ObjectMeta, ResourceKind, Secret, Service};
    use crate::store::{MemoryStore, StoreOp};
    use tokio_test::{assert_err, assert_ok};

    fn app() -> AppService {
        let mut app = AppService::new("tenant-a", "svc-1");
        app.services.push(Service {
            metadata: ObjectMeta::new("tenant-a", "web"),
            ..Service::default()
        });
        let mut secret = Secret {
            metadata: ObjectMeta::new("tenant-a", "web-tls"),
            ..Secret::default()
        };
        secret.data.insert("tls.crt".into(), "Y2VydA==".into());
        app.secrets.push(secret);
        app.delete.ingresses.push("old-route".into());
        app
    }

    #[tokio::test]
    async fn test_preview_of_empty_cluster_creates_everything() {
        let store = MemoryStore::new();
        let plan = assert_ok!(preview(&store, &app()).await);

        assert_eq!(plan.count(PlanAction::Create), 3);
        assert_eq!(plan.count(PlanAction::Absent), 1);
        assert!(plan.has_changes());
        assert_eq!(plan.changes[0].reference.kind, ResourceKind::Namespace);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_preview_detects_drift_and_matches() {
        let store = MemoryStore::new();
        let app = app();
        assert_ok!(ResourceApi::<Namespace>::create(&store, &app.namespace()).await);
        assert_ok!(ResourceApi::<Service>::create(&store, &app.services[0]).await);
        let mut drifted = app.secrets[0].clone();
        drifted.data.insert("tls.crt".into(), "b2xk".into());
        assert_ok!(ResourceApi::<Secret>::create(&store, &drifted).await);

        let plan = assert_ok!(preview(&store, &app).await);
        let actions: Vec<_> = plan.changes.iter().map(|change| change.action).collect();
        assert_eq!(
            actions,
            vec![
                PlanAction::Unchanged,
                PlanAction::Unchanged,
                PlanAction::Update,
                PlanAction::Absent,
            ]
        );
    }

    #[tokio::test]
    async fn test_preview_surfaces_read_failures() {
        let store = MemoryStore::new();
        let app = app();
        store
            .fail_always(StoreOp::Get, app.services[0].reference(), StoreError::unavailable("timeout"))
            .await;

        assert_err!(preview(&store, &app).await);
    }
}
