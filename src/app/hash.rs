//! Manifest fingerprints.
//!
//! Hashes identify which manifest an apply run converged to, and let
//! secret payloads be displayed without revealing them.

use sha2::{Digest, Sha256};

use crate::resource::Secret;

use super::spec::AppService;

/// Hasher for manifest fingerprints.
#[derive(Debug, Default)]
pub struct ManifestHasher;

impl ManifestHasher {
    /// Creates a new manifest hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the desired state of a manifest.
    ///
    /// Server-assigned identity fields do not contribute, so recording
    /// identities back into a manifest leaves its hash unchanged.
    #[must_use]
    pub fn hash_manifest(&self, app: &AppService) -> String {
        let mut desired = app.clone();
        strip_identity(&mut desired);

        let mut hasher = Sha256::new();
        hasher.update(desired.tenant_id.as_bytes());
        hasher.update(desired.service_id.as_bytes());
        // Maps are ordered, so the JSON encoding is deterministic.
        match serde_json::to_vec(&desired) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(desired.resource_count().to_be_bytes()),
        }
        hex::encode(hasher.finalize())
    }

    /// Computes a hash of a secret's payload.
    #[must_use]
    pub fn hash_secret_data(&self, secret: &Secret) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.secret_type.as_bytes());
        for (key, value) in &secret.data {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Returns the first eight characters of a hash.
    #[must_use]
    pub fn short(hash: &str) -> &str {
        &hash[..8.min(hash.len())]
    }
}

fn strip_identity(app: &mut AppService) {
    use crate::resource::Resource;

    fn clear<R: Resource>(resources: &mut [R]) {
        for resource in resources {
            resource.metadata_mut().clear_identity();
        }
    }

    clear(&mut app.services);
    clear(&mut app.secrets);
    clear(&mut app.endpoints);
    clear(&mut app.ingresses);
    clear(&mut app.autoscalers);
}
