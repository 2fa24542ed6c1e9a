//! Manifest validation.
//!
//! Checks a manifest before any store call is made: identifiers present,
//! names unique per kind, nothing both desired and scheduled for deletion.

use crate::error::{ManifestError, Result};
use std::collections::HashSet;
use tracing::debug;

use crate::resource::Resource;

use super::spec::{AppService, DeleteEntry};

/// Validator for application manifests.
#[derive(Debug, Default)]
pub struct ManifestValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Errors that make the manifest unusable.
    pub errors: Vec<ManifestError>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ManifestValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a manifest, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, app: &AppService) -> Result<()> {
        let result = self.validate_all(app);
        match result.errors.into_iter().next() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Validates a manifest and collects every problem.
    #[must_use]
    pub fn validate_all(&self, app: &AppService) -> ValidationResult {
        let mut result = ValidationResult::default();

        debug!("Validating manifest for {}/{}", app.tenant_id, app.service_id);

        if app.tenant_id.trim().is_empty() {
            result
                .errors
                .push(ManifestError::validation("tenant_id must not be empty", "tenant_id"));
        }
        if app.service_id.trim().is_empty() {
            result
                .errors
                .push(ManifestError::validation("service_id must not be empty", "service_id"));
        }
        if app.settings.max_attempts == 0 {
            result.errors.push(ManifestError::validation(
                "max_attempts must be at least 1",
                "settings.max_attempts",
            ));
        }

        let tenant = app.tenant_id.as_str();
        check_names(tenant, &app.services, &app.delete.services, &mut result);
        check_names(tenant, &app.secrets, &app.delete.secrets, &mut result);
        check_names(tenant, &app.endpoints, &app.delete.endpoints, &mut result);
        check_names(tenant, &app.ingresses, &app.delete.ingresses, &mut result);
        check_names(tenant, &app.autoscalers, &app.delete.autoscalers, &mut result);

        for autoscaler in &app.autoscalers {
            let spec = &autoscaler.spec;
            if spec.min_replicas > spec.max_replicas {
                result.errors.push(ManifestError::validation(
                    format!(
                        "min_replicas ({}) exceeds max_replicas ({})",
                        spec.min_replicas, spec.max_replicas
                    ),
                    format!("autoscalers.{}.spec", autoscaler.metadata.name),
                ));
            }
        }

        let secret_names: HashSet<&str> = app
            .secrets
            .iter()
            .map(|secret| secret.metadata.name.as_str())
            .collect();
        for ingress in &app.ingresses {
            if let Some(secret) = ingress.tls_secret_name()
                && !secret_names.contains(secret)
            {
                result.warnings.push(format!(
                    "Ingress '{}' references secret '{secret}' which this manifest does not manage",
                    ingress.metadata.name
                ));
            }
        }

        result
    }
}

/// Checks names of one kind: non-empty, unique per namespace, not also
/// listed for deletion.
fn check_names<R: Resource>(
    tenant: &str,
    desired: &[R],
    deleted: &[DeleteEntry],
    result: &mut ValidationResult,
) {
    let mut seen = HashSet::new();
    for resource in desired {
        let meta = resource.metadata();
        let name = meta.name.as_str();
        if name.is_empty() {
            result.errors.push(ManifestError::validation(
                format!("{} name must not be empty", R::KIND),
                R::KIND.as_str(),
            ));
            continue;
        }
        let namespace = if meta.namespace.is_empty() {
            tenant
        } else {
            meta.namespace.as_str()
        };
        if !seen.insert((namespace, name)) {
            result.errors.push(ManifestError::DuplicateName {
                kind: R::KIND,
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        if meta.has_identity() {
            result.warnings.push(format!(
                "{} '{name}' carries server-assigned fields; they are ignored",
                R::KIND
            ));
        }
    }

    for entry in deleted {
        let namespace = entry.namespace_or(tenant);
        if seen.contains(&(namespace, entry.name.as_str())) {
            result.errors.push(ManifestError::DeleteOverlap {
                kind: R::KIND,
                namespace: namespace.to_string(),
                name: entry.name.clone(),
            });
        }
    }
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
