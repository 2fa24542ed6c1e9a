//! The application model seen by the engine.
//!
//! The engine reads desired state and delete lists through [`AppModel`] and
//! writes server-assigned identities back through its setters, so the next
//! pass starts from correct identity tokens.

use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

use crate::resource::{
    Autoscaler, Endpoints, Ingress, Namespace, Resource, ResourceKind, ResourceRef, Secret,
    Service,
};

use super::spec::AppService;

/// Desired state and delete lists of one application instance.
#[cfg_attr(test, automock)]
pub trait AppModel: Send + Sync {
    /// Tenant identifier.
    fn tenant_id(&self) -> String;

    /// Application service identifier.
    fn service_id(&self) -> String;

    /// Desired tenant namespace.
    fn tenant_namespace(&self) -> Namespace;

    /// Custom parameters of this apply.
    fn custom_params(&self) -> BTreeMap<String, String>;

    /// Desired services.
    fn services(&self) -> Vec<Service>;

    /// Desired secrets.
    fn secrets(&self) -> Vec<Secret>;

    /// Desired endpoint sets.
    fn endpoints(&self) -> Vec<Endpoints>;

    /// Desired ingress routes.
    fn ingresses(&self) -> Vec<Ingress>;

    /// Desired autoscalers.
    fn autoscalers(&self) -> Vec<Autoscaler>;

    /// Resources of `kind` that must be removed.
    fn delete_list(&self, kind: ResourceKind) -> Vec<ResourceRef>;

    /// Records an ingress as written by the control plane.
    fn record_ingress(&mut self, ingress: Ingress);

    /// Records a secret as written by the control plane.
    fn record_secret(&mut self, secret: Secret);
}

impl AppModel for AppService {
    fn tenant_id(&self) -> String {
        self.tenant_id.clone()
    }

    fn service_id(&self) -> String {
        self.service_id.clone()
    }

    fn tenant_namespace(&self) -> Namespace {
        self.namespace()
    }

    fn custom_params(&self) -> BTreeMap<String, String> {
        self.custom_params.clone()
    }

    fn services(&self) -> Vec<Service> {
        self.services.clone()
    }

    fn secrets(&self) -> Vec<Secret> {
        self.secrets.clone()
    }

    fn endpoints(&self) -> Vec<Endpoints> {
        self.endpoints.clone()
    }

    fn ingresses(&self) -> Vec<Ingress> {
        self.ingresses.clone()
    }

    fn autoscalers(&self) -> Vec<Autoscaler> {
        self.autoscalers.clone()
    }

    fn delete_list(&self, kind: ResourceKind) -> Vec<ResourceRef> {
        let entries = match kind {
            ResourceKind::Namespace => return Vec::new(),
            ResourceKind::Service => &self.delete.services,
            ResourceKind::Secret => &self.delete.secrets,
            ResourceKind::Endpoints => &self.delete.endpoints,
            ResourceKind::Ingress => &self.delete.ingresses,
            ResourceKind::Autoscaler => &self.delete.autoscalers,
        };
        entries
            .iter()
            .map(|entry| ResourceRef::new(kind, entry.namespace_or(&self.tenant_id), entry.name.clone()))
            .collect()
    }

    fn record_ingress(&mut self, ingress: Ingress) {
        upsert(&mut self.ingresses, ingress);
    }

    fn record_secret(&mut self, secret: Secret) {
        upsert(&mut self.secrets, secret);
    }
}

/// Replaces the entry with the same reference, or appends.
fn upsert<R: Resource>(entries: &mut Vec<R>, written: R) {
    let reference = written.reference();
    match entries.iter_mut().find(|entry| entry.reference() == reference) {
        Some(entry) => *entry = written,
        None => entries.push(written),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::DeleteEntry;
    use crate::resource::ObjectMeta;

    #[test]
    fn test_delete_list_resolves_namespaces() {
        let mut app = AppService::new("tenant-a", "svc-1");
        app.delete.ingresses.push(DeleteEntry::from("old-route"));
        app.delete
            .ingresses
            .push(DeleteEntry::in_namespace("shared", "edge-route"));

        let refs = app.delete_list(ResourceKind::Ingress);
        assert_eq!(
            refs,
            vec![
                ResourceRef::new(ResourceKind::Ingress, "tenant-a", "old-route"),
                ResourceRef::new(ResourceKind::Ingress, "shared", "edge-route"),
            ]
        );
        assert!(app.delete_list(ResourceKind::Namespace).is_empty());
        assert!(app.delete_list(ResourceKind::Service).is_empty());
    }

    #[test]
    fn test_record_secret_replaces_by_reference() {
        let mut app = AppService::new("tenant-a", "svc-1");
        app.secrets.push(Secret {
            metadata: ObjectMeta::new("tenant-a", "web-tls"),
            ..Secret::default()
        });

        let mut written = app.secrets[0].clone();
        written.metadata.uid = Some(String::from("uid-1"));
        written.metadata.resource_version = Some(String::from("3"));
        app.record_secret(written);

        assert_eq!(app.secrets.len(), 1);
        assert_eq!(app.secrets[0].metadata.uid.as_deref(), Some("uid-1"));
    }

    #[test]
    fn test_record_ingress_appends_new_entries() {
        let mut app = AppService::new("tenant-a", "svc-1");
        app.record_ingress(Ingress {
            metadata: ObjectMeta::new("tenant-a", "web"),
            ..Ingress::default()
        });
        assert_eq!(app.ingresses.len(), 1);
    }
}
