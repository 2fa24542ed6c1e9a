//! Diffing an old collection against a new one, keyed by name.
//!
//! Used for upgrades where the caller knows both the previously applied
//! objects and the new ones. Entries present in both are updated carrying
//! the old identity token, new entries are created, and old entries with
//! no successor are deleted. Every error is handed to an [`ErrorPolicy`].

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{ConvergeError, Result};
use crate::resource::Resource;
use crate::store::ResourceApi;

use super::identity::copy_identity;
use super::outcome::{KeyedReport, Outcome};

/// What to do after a keyed-list error.
#[derive(Debug)]
pub enum ErrorDecision {
    /// Skip the entry and keep going.
    Continue,
    /// Stop and return this error.
    Abort(ConvergeError),
}

/// Decides whether a keyed-list reconciliation survives an error.
pub trait ErrorPolicy {
    /// Called with a description of the failed step and its error.
    fn on_error(&mut self, message: &str, err: ConvergeError) -> ErrorDecision;
}

impl<F> ErrorPolicy for F
where
    F: FnMut(&str, ConvergeError) -> ErrorDecision,
{
    fn on_error(&mut self, message: &str, err: ConvergeError) -> ErrorDecision {
        self(message, err)
    }
}

/// Logs every error and carries on.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContinueOnError;

impl ErrorPolicy for ContinueOnError {
    fn on_error(&mut self, message: &str, err: ConvergeError) -> ErrorDecision {
        warn!("{message}: {err}");
        ErrorDecision::Continue
    }
}

/// Stops at the first error.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortOnError;

impl ErrorPolicy for AbortOnError {
    fn on_error(&mut self, message: &str, err: ConvergeError) -> ErrorDecision {
        warn!("{message}, aborting: {err}");
        ErrorDecision::Abort(err)
    }
}

/// Reconciles `new` against `old`, matching entries by namespace and name.
///
/// Each successfully written object is passed to `record` as the store
/// returned it. A key is claimed as soon as a new entry matches it, not
/// only once its update succeeds, so an entry whose update fails is not
/// deleted afterwards.
///
/// A leftover that is already gone is reported as skipped, and its
/// not-found error still goes to `policy`.
///
/// # Errors
///
/// Returns the error carried by the first [`ErrorDecision::Abort`].
pub async fn reconcile_keyed<R, S, P, F>(
    store: &S,
    old: &[R],
    new: Vec<R>,
    policy: &mut P,
    mut record: F,
) -> Result<KeyedReport>
where
    R: Resource,
    S: ResourceApi<R> + ?Sized,
    P: ErrorPolicy + ?Sized,
    F: FnMut(R),
{
    let mut unclaimed: BTreeMap<(String, String), &R> = old
        .iter()
        .map(|entry| (key_of(entry), entry))
        .collect();
    let mut report = KeyedReport::default();

    for mut entry in new {
        let reference = entry.reference();

        let (verb, result) = match unclaimed.remove(&key_of(&entry)) {
            Some(previous) => {
                copy_identity(previous, &mut entry);
                ("update", store.update(&entry).await.map(|w| (w, Outcome::Updated)))
            }
            None => ("create", store.create(&entry).await.map(|w| (w, Outcome::Created))),
        };

        match result {
            Ok((written, outcome)) => {
                debug!("{verb}d {reference}");
                record(written);
                report.push(reference, outcome);
            }
            Err(err) => {
                report.push(reference.clone(), Outcome::failed(&err));
                let message = format!("Failed to {verb} {reference}");
                if let ErrorDecision::Abort(err) = policy.on_error(&message, err) {
                    return Err(err);
                }
            }
        }
    }

    for ((namespace, name), leftover) in unclaimed {
        let reference = leftover.reference();
        match store.delete(&namespace, &name).await {
            Ok(()) => {
                info!("Deleted {reference}");
                report.push(reference, Outcome::Deleted);
            }
            Err(err) => {
                let outcome = if err.is_not_found() {
                    Outcome::skipped("already absent")
                } else {
                    Outcome::failed(&err)
                };
                report.push(reference.clone(), outcome);
                let message = format!("Failed to delete {reference}");
                if let ErrorDecision::Abort(err) = policy.on_error(&message, err) {
                    return Err(err);
                }
            }
        }
    }

    Ok(report)
}

fn key_of<R: Resource>(entry: &R) -> (String, String) {
    let meta = entry.metadata();
    (meta.namespace.clone(), meta.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, StoreError};
    use crate::resource::{Ingress, ObjectMeta, ResourceKind, ResourceRef};
    use crate::store::{MemoryStore, StoreCall, StoreOp};
    use tokio_test::{assert_err, assert_ok};

    fn ingress(name: &str, host: &str) -> Ingress {
        let mut ingress = Ingress {
            metadata: ObjectMeta::new("tenant-a", name),
            ..Ingress::default()
        };
        ingress.spec.rules.push(crate::resource::IngressRule {
            host: host.to_string(),
            paths: vec![],
        });
        ingress
    }

    fn reference(name: &str) -> ResourceRef {
        ResourceRef::new(ResourceKind::Ingress, "tenant-a", name)
    }

    async fn seeded(names: &[&str]) -> (MemoryStore, Vec<Ingress>) {
        let store = MemoryStore::new();
        let mut old = Vec::new();
        for name in names {
            old.push(assert_ok!(
                ResourceApi::<Ingress>::create(&store, &ingress(name, "old.example.com")).await
            ));
        }
        store.clear_journal().await;
        (store, old)
    }

    #[tokio::test]
    async fn test_diff_updates_creates_and_deletes() {
        let (store, old) = seeded(&["a", "b"]).await;
        let new = vec![ingress("b", "new.example.com"), ingress("c", "new.example.com")];

        let mut recorded = Vec::new();
        let report = assert_ok!(
            reconcile_keyed(&store, &old, new, &mut ContinueOnError, |w| recorded.push(w)).await
        );

        assert_eq!(
            store.calls().await,
            vec![
                StoreCall {
                    op: StoreOp::Update,
                    reference: reference("b"),
                },
                StoreCall {
                    op: StoreOp::Create,
                    reference: reference("c"),
                },
                StoreCall {
                    op: StoreOp::Delete,
                    reference: reference("a"),
                },
            ]
        );

        let counts = report.counts();
        assert_eq!((counts.updated, counts.created, counts.deleted), (1, 1, 1));

        // b kept its uid and moved to the new host.
        let b = assert_ok!(ResourceApi::<Ingress>::get(&store, "tenant-a", "b").await);
        assert_eq!(b.metadata.uid, old[1].metadata.uid);
        assert_eq!(b.primary_host(), Some("new.example.com"));
        assert!(ResourceApi::<Ingress>::get(&store, "tenant-a", "a").await.is_err());

        let names: Vec<_> = recorded.iter().map(|w| w.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(recorded.iter().all(|w| w.metadata.resource_version.is_some()));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_the_key() {
        let (store, old) = seeded(&["a"]).await;
        store
            .fail_always(StoreOp::Update, reference("a"), StoreError::unavailable("timeout"))
            .await;

        let report = assert_ok!(
            reconcile_keyed(&store, &old, vec![ingress("a", "x")], &mut ContinueOnError, |_| {}).await
        );

        assert_eq!(report.counts().failed, 1);
        assert_eq!(store.count(StoreOp::Delete).await, 0);
        assert_ok!(ResourceApi::<Ingress>::get(&store, "tenant-a", "a").await);
    }

    #[tokio::test]
    async fn test_stale_identity_conflicts_without_retry() {
        let (store, old) = seeded(&["a"]).await;
        // Someone else updates a after we read it.
        assert_ok!(ResourceApi::<Ingress>::update(&store, &old[0]).await);
        store.clear_journal().await;

        let mut errors = Vec::new();
        let mut policy = |message: &str, err: ConvergeError| {
            errors.push((message.to_string(), err.class()));
            ErrorDecision::Continue
        };
        let report = assert_ok!(
            reconcile_keyed(&store, &old, vec![ingress("a", "x")], &mut policy, |_| {}).await
        );

        assert_eq!(report.counts().failed, 1);
        assert_eq!(store.count(StoreOp::Update).await, 1);
        assert_eq!(errors, vec![(String::from("Failed to update Ingress tenant-a/a"), ErrorClass::Conflict)]);
    }

    #[tokio::test]
    async fn test_abort_stops_immediately() {
        let (store, old) = seeded(&["a"]).await;
        store
            .fail_always(StoreOp::Create, reference("b"), StoreError::forbidden("terminating"))
            .await;

        let new = vec![ingress("b", "x"), ingress("c", "x")];
        let err = assert_err!(reconcile_keyed(&store, &old, new, &mut AbortOnError, |_| {}).await);

        assert_eq!(err.class(), ErrorClass::Forbidden);
        assert_eq!(store.calls().await.len(), 1);
        assert_ok!(ResourceApi::<Ingress>::get(&store, "tenant-a", "a").await);
    }

    #[tokio::test]
    async fn test_leftover_already_gone_is_reported_to_the_policy() {
        let (store, old) = seeded(&["a"]).await;
        assert_ok!(ResourceApi::<Ingress>::delete(&store, "tenant-a", "a").await);

        let report = assert_ok!(reconcile_keyed(&store, &old, vec![], &mut ContinueOnError, |_| {}).await);
        assert!(matches!(report.outcomes[0].outcome, Outcome::Skipped { .. }));

        let mut seen = Vec::new();
        let mut policy = |message: &str, err: ConvergeError| {
            seen.push((message.to_string(), err.class()));
            ErrorDecision::Abort(err)
        };
        let err = assert_err!(reconcile_keyed(&store, &old, vec![], &mut policy, |_| {}).await);

        assert_eq!(err.class(), ErrorClass::NotFound);
        assert_eq!(seen, vec![(String::from("Failed to delete Ingress tenant-a/a"), ErrorClass::NotFound)]);
    }
}
