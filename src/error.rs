//! Error types for the Halldyll converge engine.
//!
//! This module provides the error hierarchy for every stage of a
//! reconciliation pass: manifest loading, control-plane store access,
//! cluster snapshots, and the reconciliation itself. Store errors are
//! classified into an [`ErrorClass`] which drives retry, skip and abort
//! decisions throughout the engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::resource::{ResourceKind, ResourceRef};

/// The main error type for the Halldyll converge engine.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Control-plane store errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Application manifest errors.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Cluster snapshot errors.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification of a failure, used to decide between retry, skip and abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The object does not exist.
    NotFound,
    /// The object already exists.
    AlreadyExists,
    /// Optimistic-concurrency version mismatch.
    Conflict,
    /// Rejected by policy or lifecycle (e.g. a terminating namespace).
    Forbidden,
    /// Transient or unclassified failure.
    Other,
}

/// Errors returned by the control-plane store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the object.
        kind: ResourceKind,
        /// Namespace of the object.
        namespace: String,
        /// Name of the object.
        name: String,
    },

    /// An object with the same key already exists.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Kind of the object.
        kind: ResourceKind,
        /// Namespace of the object.
        namespace: String,
        /// Name of the object.
        name: String,
    },

    /// The object was modified since it was read.
    #[error("{kind} {namespace}/{name} has been modified: {message}")]
    Conflict {
        /// Kind of the object.
        kind: ResourceKind,
        /// Namespace of the object.
        namespace: String,
        /// Name of the object.
        name: String,
        /// Description of the precondition that failed.
        message: String,
    },

    /// The request was rejected by policy.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of the rejection.
        message: String,
    },

    /// The control plane could not serve the request.
    #[error("Control plane unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// Application manifest errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Manifest validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The same resource is declared twice.
    #[error("Duplicate {kind} name: {namespace}/{name}")]
    DuplicateName {
        /// Kind of the duplicated resource.
        kind: ResourceKind,
        /// Namespace of the duplicated resource.
        namespace: String,
        /// The duplicated name.
        name: String,
    },

    /// A resource is both desired and scheduled for deletion.
    #[error("{kind} '{namespace}/{name}' is both desired and listed for deletion")]
    DeleteOverlap {
        /// Kind of the resource.
        kind: ResourceKind,
        /// Namespace of the resource.
        namespace: String,
        /// Name of the resource.
        name: String,
    },
}

/// Cluster snapshot errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot is corrupted.
    #[error("Snapshot is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The snapshot could not be written.
    #[error("Failed to write snapshot: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// Serialization error.
    #[error("Snapshot serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// Snapshot version mismatch.
    #[error("Snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected snapshot version.
        expected: String,
        /// Found snapshot version.
        found: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Reconciliation failed for a specific resource.
    #[error("Failed to reconcile {reference}: {reason}")]
    ResourceFailed {
        /// The resource that failed.
        reference: ResourceRef,
        /// Classification of the failure.
        class: ErrorClass,
        /// Reason for failure.
        reason: String,
    },

    /// An update was rejected because the object changed since it was read.
    #[error("Not persisting update to {reference} that has been changed since it was read: {source}")]
    StaleUpdate {
        /// The resource that was being updated.
        reference: ResourceRef,
        /// The conflict reported by the store.
        source: StoreError,
    },

    /// The tenant namespace could not be provisioned.
    #[error("Failed to provision namespace {namespace}: {reason}")]
    Namespace {
        /// Namespace name.
        namespace: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Result type alias for Halldyll converge operations.
pub type Result<T> = std::result::Result<T, ConvergeError>;

impl ConvergeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classifies this error.
    ///
    /// Only store errors carry a specific class; a stale update keeps the
    /// conflict class of the store error it wraps.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Store(err) | Self::Reconcile(ReconcileError::StaleUpdate { source: err, .. }) => {
                err.class()
            }
            Self::Reconcile(ReconcileError::ResourceFailed { class, .. }) => *class,
            _ => ErrorClass::Other,
        }
    }

    /// Returns true if the object involved does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class(), ErrorClass::NotFound)
    }

    /// Returns true if the object involved already exists.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self.class(), ErrorClass::AlreadyExists)
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable { .. }))
    }
}

impl StoreError {
    /// Classifies this store error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::AlreadyExists { .. } => ErrorClass::AlreadyExists,
            Self::Conflict { .. } => ErrorClass::Conflict,
            Self::Forbidden { .. } => ErrorClass::Forbidden,
            Self::Unavailable { .. } => ErrorClass::Other,
        }
    }

    /// Creates a not-found error for the given reference.
    #[must_use]
    pub fn not_found(reference: &ResourceRef) -> Self {
        Self::NotFound {
            kind: reference.kind,
            namespace: reference.namespace.clone(),
            name: reference.name.clone(),
        }
    }

    /// Creates an already-exists error for the given reference.
    #[must_use]
    pub fn already_exists(reference: &ResourceRef) -> Self {
        Self::AlreadyExists {
            kind: reference.kind,
            namespace: reference.namespace.clone(),
            name: reference.name.clone(),
        }
    }

    /// Creates a conflict error for the given reference.
    #[must_use]
    pub fn conflict(reference: &ResourceRef, message: impl Into<String>) -> Self {
        Self::Conflict {
            kind: reference.kind,
            namespace: reference.namespace.clone(),
            name: reference.name.clone(),
            message: message.into(),
        }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

impl ManifestError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl SnapshotError {
    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> ResourceRef {
        ResourceRef::new(ResourceKind::Service, "tenant-a", "web")
    }

    #[test]
    fn test_store_error_classes() {
        assert_eq!(StoreError::not_found(&web()).class(), ErrorClass::NotFound);
        assert_eq!(StoreError::already_exists(&web()).class(), ErrorClass::AlreadyExists);
        assert_eq!(StoreError::conflict(&web(), "stale").class(), ErrorClass::Conflict);
        assert_eq!(StoreError::forbidden("terminating").class(), ErrorClass::Forbidden);
        assert_eq!(StoreError::unavailable("timeout").class(), ErrorClass::Other);
    }

    #[test]
    fn test_stale_update_keeps_conflict_class() {
        let err = ConvergeError::Reconcile(ReconcileError::StaleUpdate {
            reference: web(),
            source: StoreError::conflict(&web(), "resource version 3 != 4"),
        });
        assert_eq!(err.class(), ErrorClass::Conflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(ConvergeError::from(StoreError::unavailable("timeout")).is_retryable());
        assert!(!ConvergeError::from(StoreError::forbidden("denied")).is_retryable());
        assert!(!ConvergeError::internal("boom").is_retryable());
    }

    #[test]
    fn test_non_store_errors_classify_as_other() {
        let err = ConvergeError::from(ManifestError::validation_general("bad"));
        assert_eq!(err.class(), ErrorClass::Other);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_messages_name_the_object() {
        let err = ConvergeError::from(StoreError::not_found(&web()));
        assert_eq!(err.to_string(), "Store error: Service tenant-a/web not found");
    }
}
