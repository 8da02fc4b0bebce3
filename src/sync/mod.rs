//! Sync orchestrator.
//!
//! Composes the hub store with a [`Registry`](crate::registry::Registry):
//! pull, push, tag management, HEAD switching, inspection and collection.
//!
//! Every mutating entry point takes the pipe lock first and holds it until
//! it returns. Remote transfers are verified before the first local write,
//! so a failed or corrupted transfer leaves the pipe untouched. Collection
//! after a successful mutation is best-effort: its failures are logged and
//! never fail the operation.

mod error;
mod inspect;
mod pull;
mod push;
mod tag;

use tracing::warn;

use crate::hub::{GcSummary, HubStore, PipeId, Sha256Digest};

pub use error::{SyncError, SyncResult};
pub use inspect::{inspect, PipeReport};
pub use pull::{pull, PullOutcome};
pub use push::{push, PushOptions, PushOutcome, PushSource};
pub use tag::{
    collect_garbage, create_tag, delete_tag, detach_head, list_tags, switch_tag, TagCreated,
    TagEntry, TagListing,
};

/// Compare a local digest with one reported by the registry, which may
/// carry the `sha256:` prefix.
fn digest_matches(local: &Sha256Digest, remote: &str) -> bool {
    let remote = remote.strip_prefix("sha256:").unwrap_or(remote);
    remote.eq_ignore_ascii_case(local.as_str())
}

fn collect_best_effort(store: &HubStore, pipe: &PipeId) -> Option<GcSummary> {
    match store.garbage_collect(pipe) {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!(pipe = %pipe, error = %e, "garbage collection failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::sha256;

    #[test]
    fn test_digest_matches() {
        let local = sha256(b"echo hi");
        assert!(digest_matches(&local, local.as_str()));
        assert!(digest_matches(&local, &local.prefixed()));
        assert!(digest_matches(&local, &local.as_str().to_uppercase()));
        assert!(!digest_matches(&local, sha256(b"echo bye").as_str()));
    }
}
