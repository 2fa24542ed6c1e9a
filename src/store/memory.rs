//! In-process control plane.
//!
//! `MemoryStore` behaves like the real control plane where the engine can
//! observe it: it assigns uids and monotonically increasing resource
//! versions, rejects stale updates, refuses new content in terminating
//! namespaces, and can be scripted to fail specific operations. Every call
//! is journaled so callers can see exactly what a pass touched.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::resource::{ManagedResource, Resource, ResourceKind, ResourceRef};

use super::api::ResourceApi;

/// Store operations, as recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// A read.
    Get,
    /// A create.
    Create,
    /// An update.
    Update,
    /// A delete.
    Delete,
}

/// A journaled store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// The operation.
    pub op: StoreOp,
    /// The object it targeted.
    pub reference: ResourceRef,
}

/// In-memory control-plane store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Mutable store contents.
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<ResourceRef, ManagedResource>,
    resource_version: u64,
    terminating: BTreeSet<String>,
    faults: Vec<Fault>,
    journal: Vec<StoreCall>,
}

/// A scripted failure.
#[derive(Debug)]
struct Fault {
    op: StoreOp,
    reference: ResourceRef,
    error: StoreError,
    /// Remaining number of failures, `None` for always.
    remaining: Option<u32>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given objects.
    ///
    /// Objects are taken as-is, identity included; `resource_version` is the
    /// counter the next write continues from.
    #[must_use]
    pub fn with_objects(objects: Vec<ManagedResource>, resource_version: u64) -> Self {
        let objects = objects
            .into_iter()
            .map(|object| (object.reference(), object))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                objects,
                resource_version,
                ..Inner::default()
            }),
        }
    }

    /// Returns every stored object, optionally restricted to one kind.
    pub async fn objects(&self, kind: Option<ResourceKind>) -> Vec<ManagedResource> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .values()
            .filter(|object| kind.is_none_or(|k| object.kind() == k))
            .cloned()
            .collect()
    }

    /// Returns the current resource version counter.
    pub async fn resource_version(&self) -> u64 {
        self.inner.lock().await.resource_version
    }

    /// Marks a namespace as terminating; creates inside it are forbidden.
    pub async fn terminate_namespace(&self, namespace: impl Into<String>) {
        self.inner.lock().await.terminating.insert(namespace.into());
    }

    /// Makes the next `times` calls of `op` on `reference` fail with `error`.
    pub async fn fail_times(&self, op: StoreOp, reference: ResourceRef, error: StoreError, times: u32) {
        self.push_fault(op, reference, error, Some(times)).await;
    }

    /// Makes every call of `op` on `reference` fail with `error`.
    pub async fn fail_always(&self, op: StoreOp, reference: ResourceRef, error: StoreError) {
        self.push_fault(op, reference, error, None).await;
    }

    async fn push_fault(
        &self,
        op: StoreOp,
        reference: ResourceRef,
        error: StoreError,
        remaining: Option<u32>,
    ) {
        debug!("Scripting {op:?} failure on {reference}: {error}");
        self.inner.lock().await.faults.push(Fault {
            op,
            reference,
            error,
            remaining,
        });
    }

    /// Returns the journal of calls made so far.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().await.journal.clone()
    }

    /// Returns the number of journaled calls matching `op`.
    pub async fn count(&self, op: StoreOp) -> usize {
        let inner = self.inner.lock().await;
        inner.journal.iter().filter(|call| call.op == op).count()
    }

    /// Returns the number of journaled create, update and delete calls.
    pub async fn write_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner
            .journal
            .iter()
            .filter(|call| call.op != StoreOp::Get)
            .count()
    }

    /// Forgets the journal.
    pub async fn clear_journal(&self) {
        self.inner.lock().await.journal.clear();
    }
}

impl Inner {
    /// Journals a call and returns the scripted failure for it, if any.
    fn begin(&mut self, op: StoreOp, reference: &ResourceRef) -> std::result::Result<(), StoreError> {
        trace!("{op:?} {reference}");
        self.journal.push(StoreCall {
            op,
            reference: reference.clone(),
        });

        let Some(index) = self
            .faults
            .iter()
            .position(|fault| fault.op == op && fault.reference == *reference)
        else {
            return Ok(());
        };

        let fault = &mut self.faults[index];
        let error = fault.error.clone();
        if let Some(remaining) = fault.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.faults.remove(index);
            }
        }
        Err(error)
    }

    fn next_version(&mut self) -> String {
        self.resource_version = self.resource_version.saturating_add(1);
        self.resource_version.to_string()
    }
}

#[async_trait]
impl<R: Resource> ResourceApi<R> for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<R> {
        let reference = ResourceRef::new(R::KIND, namespace, name);
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Get, &reference)?;

        inner
            .objects
            .get(&reference)
            .cloned()
            .and_then(R::from_managed)
            .ok_or_else(|| StoreError::not_found(&reference).into())
    }

    async fn create(&self, resource: &R) -> Result<R> {
        let reference = resource.reference();
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Create, &reference)?;

        if inner.objects.contains_key(&reference) {
            return Err(StoreError::already_exists(&reference).into());
        }
        if R::KIND != ResourceKind::Namespace && inner.terminating.contains(&reference.namespace) {
            return Err(StoreError::forbidden(format!(
                "unable to create new content in namespace {} because it is being terminated",
                reference.namespace
            ))
            .into());
        }

        let mut created = resource.clone();
        let version = inner.next_version();
        let meta = created.metadata_mut();
        meta.uid = Some(Uuid::new_v4().to_string());
        meta.resource_version = Some(version);
        meta.creation_timestamp = Some(Utc::now());

        inner
            .objects
            .insert(reference, created.clone().into_managed());
        Ok(created)
    }

    async fn update(&self, resource: &R) -> Result<R> {
        let reference = resource.reference();
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Update, &reference)?;

        let Some(stored) = inner.objects.get(&reference) else {
            return Err(StoreError::not_found(&reference).into());
        };
        let stored = stored.metadata().clone();
        let meta = resource.metadata();

        if let Some(uid) = &meta.uid
            && stored.uid.as_ref() != Some(uid)
        {
            return Err(StoreError::conflict(
                &reference,
                format!("precondition failed: uid {uid} does not match the stored object"),
            )
            .into());
        }
        if let Some(version) = &meta.resource_version
            && stored.resource_version.as_ref() != Some(version)
        {
            return Err(StoreError::conflict(
                &reference,
                format!(
                    "resource version {version} is stale, current is {}",
                    stored.resource_version.as_deref().unwrap_or("none")
                ),
            )
            .into());
        }

        let mut updated = resource.clone();
        let version = inner.next_version();
        let meta = updated.metadata_mut();
        meta.uid = stored.uid;
        meta.creation_timestamp = stored.creation_timestamp;
        meta.resource_version = Some(version);

        inner
            .objects
            .insert(reference, updated.clone().into_managed());
        Ok(updated)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let reference = ResourceRef::new(R::KIND, namespace, name);
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Delete, &reference)?;

        inner
            .objects
            .remove(&reference)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(&reference).into())
    }
}
