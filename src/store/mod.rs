//! Control-plane store module.
//!
//! This module defines the store interface the engine is driven through,
//! an in-process implementation of it, and file snapshots of that
//! implementation's contents.

mod api;
mod memory;
mod snapshot;

pub use api::{ClusterStore, ResourceApi, delete_by_ref, get_by_ref};
pub use memory::{MemoryStore, StoreCall, StoreOp};
pub use snapshot::{ApplyRecord, ClusterSnapshot, DEFAULT_SNAPSHOT_PATH, SNAPSHOT_VERSION, SnapshotStore};
