//! Best-effort removal of resources listed for deletion.

use tracing::{debug, info, warn};

use crate::resource::ResourceRef;
use crate::store::{ClusterStore, delete_by_ref};

use super::outcome::{Outcome, ResourceOutcome};

/// Deletes every listed resource, in order.
///
/// A resource that is already gone counts as success. Any other error is
/// logged and the sweep moves on to the next entry.
pub async fn sweep<S>(store: &S, refs: &[ResourceRef]) -> Vec<ResourceOutcome>
where
    S: ClusterStore + ?Sized,
{
    let mut outcomes = Vec::with_capacity(refs.len());

    for reference in refs {
        let outcome = match delete_by_ref(store, reference).await {
            Ok(()) => {
                info!("Deleted {reference}");
                Outcome::Deleted
            }
            Err(err) if err.is_not_found() => {
                debug!("{reference} already absent");
                Outcome::skipped("already absent")
            }
            Err(err) => {
                warn!("Failed to delete {reference}: {err}");
                Outcome::failed(&err)
            }
        };
        outcomes.push(ResourceOutcome::new(reference.clone(), outcome));
    }

    outcomes
}
