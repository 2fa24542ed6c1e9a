//! Managed resource model.
//!
//! This module defines the resource kinds the engine reconciles, their
//! shared metadata, and the [`Resource`] capability trait the generic
//! reconciliation algorithms are written against.

mod meta;
mod types;
mod managed;

pub use meta::{IdentityToken, ObjectMeta, ResourceKind, ResourceRef};
pub use types::{
    Autoscaler, AutoscalerSpec, EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Ingress,
    IngressPath, IngressRule, IngressSpec, IngressTls, Namespace, Protocol, ScaleMetric,
    ScaleTarget, Secret, Service, ServicePort, ServiceSpec, ServiceType,
};
pub use managed::{ManagedResource, Resource};
