//! Application module for the converge engine.
//!
//! This module handles everything about the desired state of one
//! application instance:
//! - Parsing and deserializing `halldyll.app.yaml`
//! - Validation of manifests before any store call
//! - The [`AppModel`] view the engine reads and records through
//! - Computing manifest fingerprints

mod spec;
mod model;
mod parser;
mod validator;
mod hash;

pub use spec::{AppService, DOMAIN_PARAM, DeleteEntry, DeleteLists, EngineSettings, TCP_ADDRESS_PARAM, TENANT_LABEL};
pub use model::AppModel;
#[cfg(test)]
pub use model::MockAppModel;
pub use parser::{DEFAULT_MANIFEST_FILES, ManifestParser, find_manifest_file};
pub use validator::{ManifestValidator, ValidationResult};
pub use hash::ManifestHasher;
