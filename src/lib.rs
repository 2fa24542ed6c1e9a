// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Halldyll Converge
//!
//! A declarative, idempotent reconciliation engine for application resources
//! held by a cluster control plane.
//!
//! ## Overview
//!
//! Halldyll Converge takes the desired state of one application instance and
//! drives the control plane toward it, allowing you to:
//!
//! - Declare services, secrets, endpoint sets, ingress routes and autoscalers
//!   in a YAML manifest
//! - Re-run a pass safely after it failed halfway
//! - Upgrade ingress routes and secrets from a previous manifest without
//!   losing optimistic-concurrency identity
//! - Remove resources listed for deletion, tolerating the ones already gone
//!
//! ## Architecture
//!
//! The system is built around the concept of **desired state reconciliation**:
//!
//! 1. **Desired State**: Defined in `halldyll.app.yaml`
//! 2. **Observed State**: Read from the control-plane store
//! 3. **Reconciler**: Creates, updates or deletes objects until both agree
//!
//! Conflicting writes are never retried: the pass reports them and the next
//! pass starts from fresh identity tokens.
//!
//! ## Modules
//!
//! - [`app`]: Manifest parsing, validation and the application model
//! - [`resource`]: Managed resource kinds and their capabilities
//! - [`store`]: Control-plane store interface, in-memory store, snapshots
//! - [`converge`]: Retry, single-object, keyed-list and sweep algorithms
//! - [`reconciler`]: The apply pass and upgrade entry points
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! tenant_id: tenant-a
//! service_id: web-1
//!
//! services:
//!   - metadata:
//!       name: web
//!     spec:
//!       ports:
//!         - port: 80
//!           target_port: 8080
//!
//! delete:
//!   ingresses: [legacy-route]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod app;
pub mod cli;
pub mod converge;
pub mod error;
pub mod reconciler;
pub mod resource;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use app::{AppModel, AppService, ManifestHasher, ManifestParser, ManifestValidator};
pub use cli::{Cli, Commands, OutputFormatter};
pub use converge::{ApplyReport, ChangePlan, ErrorPolicy, KeyedReport, Outcome, PersistPolicy};
pub use error::{ConvergeError, ErrorClass, Result};
pub use reconciler::Reconciler;
pub use resource::{ManagedResource, Resource, ResourceKind, ResourceRef};
pub use store::{ClusterStore, MemoryStore, ResourceApi, SnapshotStore};
