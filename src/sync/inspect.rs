//! Read-only report on a pulled pipe.

use std::path::PathBuf;

use tracing::warn;

use super::error::SyncResult;
use super::tag::{list_tags, TagEntry};
use crate::hub::{BlobMetadata, HeadRef, HubStore, PipeId, TagName};

/// Everything `inspect` shows about a pipe.
#[derive(Debug, Clone)]
pub struct PipeReport {
    pub pipe: PipeId,
    /// The pipe directory.
    pub root: PathBuf,
    /// Where the currently checked-out content lives, if anything is.
    pub content_path: Option<PathBuf>,
    pub head: Option<HeadRef>,
    /// HEAD names a tag that has neither a record nor a pointer.
    pub head_dangling: bool,
    pub active_tag: Option<TagName>,
    /// Name left in the active-tag field after that tag was deleted.
    pub active_dangling: Option<String>,
    pub tags: Vec<TagEntry>,
    pub blobs: Vec<BlobMetadata>,
}

impl PipeReport {
    pub fn total_blob_bytes(&self) -> u64 {
        self.blobs.iter().map(|b| b.size).sum()
    }
}

/// Gather a report without modifying anything.
pub fn inspect(store: &HubStore, pipe: &PipeId) -> SyncResult<PipeReport> {
    let index = store.require_index(pipe)?;
    let listing = list_tags(store, pipe)?;
    let (active_tag, active_dangling) = match index.active(pipe) {
        Ok(active) => (active.map(|(tag, _)| tag), None),
        Err(_) => {
            warn!(pipe = %pipe, active = %index.active_tag, "active tag no longer exists");
            (None, Some(index.active_tag.clone()))
        }
    };

    let head_dangling = match listing.head.as_ref().and_then(HeadRef::tag) {
        Some(tag) => !index.contains(tag) && store.read_pointer(pipe, tag)?.is_none(),
        None => false,
    };
    if head_dangling {
        warn!(pipe = %pipe, head = ?listing.head, "HEAD references a tag that no longer exists");
    }

    let content_path = match (&active_tag, &listing.head) {
        (Some(tag), _) => store.content_path(pipe, tag).ok(),
        (None, Some(HeadRef::Tag(tag))) => store.content_path(pipe, tag).ok(),
        (None, Some(HeadRef::Blob(digest))) => Some(store.blob_path(pipe, digest)),
        (None, None) => None,
    };

    let mut blobs = Vec::new();
    for digest in store.list_blobs(pipe)? {
        blobs.push(store.blob_metadata(pipe, &digest)?);
    }

    Ok(PipeReport {
        pipe: pipe.clone(),
        root: store.layout(pipe).root().to_path_buf(),
        content_path,
        head: listing.head,
        head_dangling,
        active_tag,
        active_dangling,
        tags: listing.tags,
        blobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{PipeRef, StoreConfig};
    use crate::registry::MemoryRegistry;
    use crate::sync::{create_tag, delete_tag, detach_head, pull, switch_tag};
    use tempfile::TempDir;

    fn pulled() -> (TempDir, HubStore, PipeId) {
        let dir = TempDir::new().unwrap();
        let store = HubStore::open(StoreConfig::new(dir.path().join("hub"))).unwrap();
        let registry = MemoryRegistry::new();
        let reference: PipeRef = "alice/deploy".parse().unwrap();
        registry.publish(&reference.pipe, &TagName::latest(), b"echo hi");
        pull(&store, &registry, &reference, false).unwrap();
        (dir, store, reference.pipe)
    }

    #[test]
    fn test_inspect_after_pull() {
        let (_dir, store, pipe) = pulled();
        let latest = TagName::latest();

        let report = inspect(&store, &pipe).unwrap();
        assert_eq!(report.active_tag, Some(latest.clone()));
        assert_eq!(report.head, Some(HeadRef::Tag(latest.clone())));
        assert!(!report.head_dangling);
        assert_eq!(report.content_path, Some(store.content_path(&pipe, &latest).unwrap()));
        assert_eq!(report.tags.len(), 1);
        assert_eq!(report.blobs.len(), 1);
        assert_eq!(report.total_blob_bytes(), 7);
    }

    #[test]
    fn test_inspect_detached() {
        let (_dir, store, pipe) = pulled();
        let digest = crate::hub::sha256(b"echo hi");
        detach_head(&store, &pipe, &digest).unwrap();

        let report = inspect(&store, &pipe).unwrap();
        assert!(report.active_tag.is_none());
        assert_eq!(report.content_path, Some(store.blob_path(&pipe, &digest)));
    }

    #[test]
    fn test_inspect_reports_dangling_head() {
        let (_dir, store, pipe) = pulled();
        let stable = TagName::new("stable").unwrap();
        create_tag(&store, &pipe, &stable, false, false).unwrap();
        switch_tag(&store, &pipe, &stable).unwrap();
        store
            .write_head(&pipe, &HeadRef::Tag(TagName::latest()))
            .unwrap();
        delete_tag(&store, &pipe, &TagName::latest()).unwrap();

        let report = inspect(&store, &pipe).unwrap();
        assert!(report.head_dangling);
        assert_eq!(report.active_tag, Some(stable));
        assert!(report.active_dangling.is_none());
    }

    #[test]
    fn test_inspect_reports_dangling_active_tag() {
        let (_dir, store, pipe) = pulled();
        let stable = TagName::new("stable").unwrap();
        create_tag(&store, &pipe, &stable, false, false).unwrap();
        delete_tag(&store, &pipe, &TagName::latest()).unwrap();

        let report = inspect(&store, &pipe).unwrap();
        assert!(report.active_tag.is_none());
        assert_eq!(report.active_dangling.as_deref(), Some("latest"));
        assert!(report.head_dangling);
        assert_eq!(report.tags.len(), 1);
        assert_eq!(report.tags[0].tag, stable);
    }
}
