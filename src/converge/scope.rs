//! Selection of the objects one apply pass converges.
//!
//! A pass either covers every desired object, or is narrowed by custom
//! parameters to the ingress routes (and their TLS secrets) serving one
//! domain or one TCP address.

use std::collections::BTreeSet;
use tracing::debug;

use crate::app::{AppModel, DOMAIN_PARAM, TCP_ADDRESS_PARAM};
use crate::resource::{Ingress, ManagedResource, Resource, ResourceKind, ResourceRef};

/// Annotation holding the layer-4 host of a TCP ingress.
pub const L4_HOST_ANNOTATION: &str = "nginx.ingress.kubernetes.io/l4-host";

/// Annotation holding the layer-4 port of a TCP ingress.
pub const L4_PORT_ANNOTATION: &str = "nginx.ingress.kubernetes.io/l4-port";

/// Kinds swept, in order, after the desired objects are converged.
pub const SWEEP_ORDER: [ResourceKind; 5] = [
    ResourceKind::Ingress,
    ResourceKind::Secret,
    ResourceKind::Service,
    ResourceKind::Endpoints,
    ResourceKind::Autoscaler,
];

/// Objects one pass touches, in processing order.
#[derive(Debug, Clone, Default)]
pub struct ApplyScope {
    /// True when custom parameters narrowed the pass.
    pub narrowed: bool,
    /// Desired objects to converge.
    pub desired: Vec<ManagedResource>,
    /// Objects to delete.
    pub deletions: Vec<ResourceRef>,
}

impl ApplyScope {
    /// Computes the scope of a pass over `app`.
    #[must_use]
    pub fn of<A: AppModel + ?Sized>(app: &A) -> Self {
        let params = app.custom_params();
        let domain = params.get(DOMAIN_PARAM);
        let address = params.get(TCP_ADDRESS_PARAM);

        let desired = if domain.is_some() || address.is_some() {
            narrow(app, domain.map(String::as_str), address.map(String::as_str))
        } else {
            full(app)
        };

        let deletions = SWEEP_ORDER
            .iter()
            .flat_map(|kind| app.delete_list(*kind))
            .collect();

        Self {
            narrowed: domain.is_some() || address.is_some(),
            desired,
            deletions,
        }
    }
}

fn full<A: AppModel + ?Sized>(app: &A) -> Vec<ManagedResource> {
    let mut desired = Vec::new();
    desired.extend(app.services().into_iter().map(Resource::into_managed));
    desired.extend(app.secrets().into_iter().map(Resource::into_managed));
    desired.extend(app.endpoints().into_iter().map(Resource::into_managed));
    desired.extend(app.ingresses().into_iter().map(Resource::into_managed));
    desired.extend(app.autoscalers().into_iter().map(Resource::into_managed));
    desired
}

fn narrow<A: AppModel + ?Sized>(
    app: &A,
    domain: Option<&str>,
    address: Option<&str>,
) -> Vec<ManagedResource> {
    let ingresses = app.ingresses();
    let mut desired = Vec::new();
    let mut seen = BTreeSet::new();

    if let Some(domain) = domain {
        debug!("Narrowing apply to ingresses for domain {domain}");
        let secrets = app.secrets();
        for ingress in ingresses.iter().filter(|ing| ing.primary_host() == Some(domain)) {
            if let Some(secret_name) = ingress.tls_secret_name() {
                for secret in secrets.iter().filter(|s| s.metadata.name == secret_name) {
                    push_once(&mut desired, &mut seen, secret.clone().into_managed());
                }
            }
            push_once(&mut desired, &mut seen, ingress.clone().into_managed());
        }
    }

    if let Some(address) = address {
        debug!("Narrowing apply to ingresses for TCP address {address}");
        for ingress in ingresses.iter().filter(|ing| l4_address(ing).as_deref() == Some(address)) {
            push_once(&mut desired, &mut seen, ingress.clone().into_managed());
        }
    }

    desired
}

fn push_once(
    desired: &mut Vec<ManagedResource>,
    seen: &mut BTreeSet<ResourceRef>,
    object: ManagedResource,
) {
    if seen.insert(object.reference()) {
        desired.push(object);
    }
}

/// Returns the `host:port` layer-4 address an ingress is bound to.
#[must_use]
pub fn l4_address(ingress: &Ingress) -> Option<String> {
    let annotations = &ingress.metadata.annotations;
    let host = annotations.get(L4_HOST_ANNOTATION)?;
    let port = annotations
        .get(L4_PORT_ANNOTATION)
        .map_or("", String::as_str);
    Some(format!("{host}:{port}"))
}
