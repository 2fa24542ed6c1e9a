//! Identity carrying between observed and desired objects.

use crate::resource::Resource;

/// Builds the object to write over `existing`.
///
/// The result keeps the identity token of `existing` (uid, resource version,
/// creation timestamp) and takes every desired-owned field from `desired`.
#[must_use]
pub fn carry_identity<R: Resource>(existing: &R, desired: &R) -> R {
    let mut updated = existing.clone();
    updated.apply_mutable_fields(desired);
    updated
}

/// Copies the identity token of `from` onto `onto`, leaving its content alone.
pub fn copy_identity<R: Resource>(from: &R, onto: &mut R) {
    let token = from.metadata().identity();
    onto.metadata_mut().set_identity(token);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ObjectMeta, Secret, Service, ServicePort};

    fn observed_service() -> Service {
        let mut service = Service {
            metadata: ObjectMeta::new("tenant-a", "web").with_label("tier", "old"),
            ..Service::default()
        };
        service.metadata.uid = Some(String::from("uid-7"));
        service.metadata.resource_version = Some(String::from("42"));
        service
    }

    #[test]
    fn test_carry_identity_takes_content_from_desired() {
        let existing = observed_service();
        let mut desired = Service {
            metadata: ObjectMeta::new("tenant-a", "web").with_label("tier", "new"),
            ..Service::default()
        };
        desired.spec.ports.push(ServicePort {
            name: Some(String::from("http")),
            port: 80,
            target_port: Some(8080),
            protocol: crate::resource::Protocol::Tcp,
        });

        let updated = carry_identity(&existing, &desired);
        assert_eq!(updated.metadata.uid.as_deref(), Some("uid-7"));
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("42"));
        assert_eq!(updated.metadata.labels.get("tier").map(String::as_str), Some("new"));
        assert_eq!(updated.spec, desired.spec);
    }

    #[test]
    fn test_copy_identity_overwrites_stale_token() {
        let mut old = Secret {
            metadata: ObjectMeta::new("tenant-a", "web-tls"),
            ..Secret::default()
        };
        old.metadata.uid = Some(String::from("uid-1"));
        old.metadata.resource_version = Some(String::from("3"));

        let mut new = old.clone();
        new.metadata.resource_version = Some(String::from("1"));
        new.data.insert("tls.crt".into(), "bmV3".into());

        copy_identity(&old, &mut new);
        assert_eq!(new.metadata.resource_version.as_deref(), Some("3"));
        assert_eq!(new.data.len(), 1);
    }
}
