//! Application manifest types.
//!
//! This module defines the structs that map to `halldyll.app.yaml`: the
//! desired resources of one application instance and the resources it
//! wants removed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resource::{Autoscaler, Endpoints, Ingress, Namespace, Resource, Secret, Service};

/// Custom parameter requesting a narrow update of one domain's ingress.
pub const DOMAIN_PARAM: &str = "domain";

/// Custom parameter requesting a narrow update of one TCP address binding.
pub const TCP_ADDRESS_PARAM: &str = "tcp-address";

/// Label stamped on tenant namespaces.
pub const TENANT_LABEL: &str = "halldyll.io/tenant-id";

/// Desired state of one application instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppService {
    /// Tenant identifier, also the namespace name.
    pub tenant_id: String,
    /// Application service identifier.
    pub service_id: String,
    /// Custom parameters narrowing an apply.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_params: BTreeMap<String, String>,
    /// Engine tuning.
    #[serde(default)]
    pub settings: EngineSettings,
    /// Desired services.
    #[serde(default)]
    pub services: Vec<Service>,
    /// Desired secrets.
    #[serde(default)]
    pub secrets: Vec<Secret>,
    /// Desired endpoint sets.
    #[serde(default)]
    pub endpoints: Vec<Endpoints>,
    /// Desired ingress routes.
    #[serde(default)]
    pub ingresses: Vec<Ingress>,
    /// Desired autoscalers.
    #[serde(default)]
    pub autoscalers: Vec<Autoscaler>,
    /// Resources to remove.
    #[serde(default)]
    pub delete: DeleteLists,
}

/// Resources that must no longer exist, per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteLists {
    /// Services to delete.
    #[serde(default)]
    pub services: Vec<DeleteEntry>,
    /// Secrets to delete.
    #[serde(default)]
    pub secrets: Vec<DeleteEntry>,
    /// Endpoint sets to delete.
    #[serde(default)]
    pub endpoints: Vec<DeleteEntry>,
    /// Ingress routes to delete.
    #[serde(default)]
    pub ingresses: Vec<DeleteEntry>,
    /// Autoscalers to delete.
    #[serde(default)]
    pub autoscalers: Vec<DeleteEntry>,
}

/// One resource listed for deletion.
///
/// Written in a manifest either as a bare name, which lives in the tenant
/// namespace, or as a map with `name` and `namespace`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "DeleteEntryRepr")]
pub struct DeleteEntry {
    /// Object name.
    pub name: String,
    /// Namespace, when it is not the tenant namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeleteEntryRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        namespace: Option<String>,
    },
}

impl From<DeleteEntryRepr> for DeleteEntry {
    fn from(repr: DeleteEntryRepr) -> Self {
        match repr {
            DeleteEntryRepr::Name(name) => Self::new(name),
            DeleteEntryRepr::Full { name, namespace } => Self {
                name,
                namespace: namespace.filter(|ns| !ns.is_empty()),
            },
        }
    }
}

impl From<&str> for DeleteEntry {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl DeleteEntry {
    /// Creates an entry in the tenant namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Creates an entry in an explicit namespace.
    #[must_use]
    pub fn in_namespace(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Returns the namespace, falling back to `tenant`.
    #[must_use]
    pub fn namespace_or<'a>(&'a self, tenant: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(tenant)
    }
}

/// Retry tuning for persisting updates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineSettings {
    /// Attempts per update.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed pause between attempts, in seconds.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_retry_interval_secs() -> u64 {
    5
}

impl AppService {
    /// Creates an empty application for a tenant.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            service_id: service_id.into(),
            ..Self::default()
        }
    }

    /// Places every resource without an explicit namespace in the tenant namespace.
    pub fn normalize(&mut self) {
        let tenant = self.tenant_id.clone();
        default_namespace(&mut self.services, &tenant);
        default_namespace(&mut self.secrets, &tenant);
        default_namespace(&mut self.endpoints, &tenant);
        default_namespace(&mut self.ingresses, &tenant);
        default_namespace(&mut self.autoscalers, &tenant);
    }

    /// Returns the desired tenant namespace object.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        let mut namespace = Namespace::named(&self.tenant_id);
        namespace
            .metadata
            .labels
            .insert(TENANT_LABEL.to_string(), self.tenant_id.clone());
        namespace
    }

    /// Returns the total number of desired resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.services.len()
            + self.secrets.len()
            + self.endpoints.len()
            + self.ingresses.len()
            + self.autoscalers.len()
    }
}

fn default_namespace<R: Resource>(resources: &mut [R], tenant: &str) {
    for resource in resources {
        let meta = resource.metadata_mut();
        if meta.namespace.is_empty() {
            meta.namespace = tenant.to_string();
        }
    }
}
