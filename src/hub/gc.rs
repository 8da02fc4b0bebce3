//! Blob garbage collection.
//!
//! A blob is reachable when the index records its digest for some tag, when
//! a detached HEAD names it, or when an indirect tag pointer names it. Every
//! other digest-named file under `blobs/` is removed.
//!
//! Collection is best-effort: a blob that cannot be removed is logged and
//! skipped. Running it twice in a row removes nothing the second time.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::hub::blob::{list_blobs, remove_blob};
use crate::hub::error::HubResult;
use crate::hub::head::{read_head, HeadRef};
use crate::hub::index::Index;
use crate::hub::pointer::{list_pointers, TagPointer};
use crate::hub::types::{PipeLayout, Sha256Digest};

/// what a collection pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcSummary {
    pub scanned: usize,
    pub removed: Vec<Sha256Digest>,
    pub failed: usize,
}

impl GcSummary {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// the set of digests that must survive collection
pub(crate) fn reachable_digests(
    index: &Index,
    head: Option<&HeadRef>,
    pointers: impl IntoIterator<Item = TagPointer>,
) -> BTreeSet<Sha256Digest> {
    let mut reachable: BTreeSet<Sha256Digest> = index.referenced_digests().cloned().collect();

    if let Some(digest) = head.and_then(HeadRef::detached_digest) {
        reachable.insert(digest.clone());
    }

    for pointer in pointers {
        if let TagPointer::Indirect(digest) = pointer {
            reachable.insert(digest);
        }
    }

    reachable
}

/// remove every unreachable blob of a pipe
///
/// the caller is expected to hold the pipe lock
pub fn garbage_collect(layout: &PipeLayout) -> HubResult<GcSummary> {
    let Some(index) = Index::load(layout)? else {
        debug!(pipe = %layout.pipe, "no index, skipping collection");
        return Ok(GcSummary::default());
    };
    let head = read_head(layout)?;
    let pointers = list_pointers(layout)?;
    let reachable = reachable_digests(&index, head.as_ref(), pointers.into_values());

    let mut summary = GcSummary::default();
    for digest in list_blobs(layout)? {
        summary.scanned += 1;
        if reachable.contains(&digest) {
            continue;
        }
        match remove_blob(layout, &digest) {
            Ok(()) => {
                debug!(pipe = %layout.pipe, digest = %digest.short(), "blob collected");
                summary.removed.push(digest);
            }
            Err(e) => {
                warn!(pipe = %layout.pipe, digest = %digest.short(), error = %e, "could not remove orphaned blob");
                summary.failed += 1;
            }
        }
    }

    debug!(
        pipe = %layout.pipe,
        scanned = summary.scanned,
        removed = summary.removed.len(),
        failed = summary.failed,
        "blob collection complete"
    );
    Ok(summary)
}
