//! Pull: registry to hub.

use tracing::{debug, info, warn};

use super::error::{SyncError, SyncResult};
use super::{collect_best_effort, digest_matches};
use crate::hub::{
    compute_checksums, GcSummary, HeadRef, HubStore, PipeId, PipeRef, Sha256Digest, TagName,
    TagRecord,
};
use crate::registry::Registry;

/// What a pull stored.
#[derive(Debug, Clone)]
pub struct PullOutcome {
    pub pipe: PipeId,
    pub tag: TagName,
    pub digest: Sha256Digest,
    pub size_bytes: u64,
    pub editable: bool,
    pub gc: Option<GcSummary>,
}

/// Download a tag and make it the active, checked-out tag of the pipe.
///
/// A dirty local tag is only overwritten with `force`.
pub fn pull(
    store: &HubStore,
    registry: &dyn Registry,
    reference: &PipeRef,
    force: bool,
) -> SyncResult<PullOutcome> {
    let pipe = &reference.pipe;
    let tag = reference.tag_or_latest();
    let _lock = store.lock(pipe)?;

    let index = store.load_index(pipe)?;
    if index.as_ref().is_some_and(|index| index.contains(&tag)) {
        match store.tag_state(pipe, &tag) {
            Ok(state) if state.is_dirty() => {
                if !force {
                    return Err(SyncError::DirtyWorkingTag {
                        pipe: pipe.clone(),
                        tag,
                    });
                }
                warn!(pipe = %pipe, tag = %tag, "discarding local changes");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(pipe = %pipe, tag = %tag, error = %e, "could not check local state, pulling anyway")
            }
        }
    }

    let detail = registry.get_tag(pipe, &tag)?;
    let content = registry.download_tag(pipe, &tag)?;
    let checksums = compute_checksums(&content);
    if !digest_matches(&checksums.sha256, &detail.primary_digest) {
        return Err(SyncError::ChecksumMismatch {
            pipe: pipe.clone(),
            expected: detail.primary_digest,
            actual: checksums.sha256.to_string(),
        });
    }
    if detail.size_bytes != content.len() as u64 {
        debug!(pipe = %pipe, reported = detail.size_bytes, actual = content.len(), "registry size differs from download");
    }

    let mut index = index.unwrap_or_default();
    let previous = index.get(&tag).cloned();
    let editable = previous.as_ref().map(|r| r.editable).unwrap_or(false);

    store.save_content(pipe, &tag, &content, editable)?;

    let mut record = TagRecord::new(&checksums, content.len() as u64)
        .pulled_now()
        .editable(editable);
    record.created_at = previous.and_then(|r| r.created_at).or(record.pulled_at);
    index.upsert(tag.clone(), record);
    index.set_active(&tag);
    store.save_index(pipe, &index)?;
    store.write_head(pipe, &HeadRef::Tag(tag.clone()))?;

    info!(pipe = %pipe, tag = %tag, digest = %checksums.sha256.short(), size = content.len(), "pulled");
    let gc = collect_best_effort(store, pipe);

    Ok(PullOutcome {
        pipe: pipe.clone(),
        tag,
        digest: checksums.sha256,
        size_bytes: content.len() as u64,
        editable,
        gc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{HubError, StoreConfig, TagState};
    use crate::registry::{
        CreatePipeRequest, MemoryRegistry, PipeMetadata, PushResponse, RegistryResult, TagDetail,
    };
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, HubStore, MemoryRegistry, PipeRef) {
        let dir = TempDir::new().unwrap();
        let store = HubStore::open(StoreConfig::new(dir.path().join("hub"))).unwrap();
        let registry = MemoryRegistry::new();
        let reference: PipeRef = "alice/deploy".parse().unwrap();
        registry.publish(&reference.pipe, &TagName::latest(), b"echo hi");
        (dir, store, registry, reference)
    }

    /// Reports a digest that does not match what it serves.
    struct LyingRegistry(MemoryRegistry);

    impl Registry for LyingRegistry {
        fn get_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<TagDetail> {
            let mut detail = self.0.get_tag(pipe, tag)?;
            detail.primary_digest = crate::hub::sha256(b"something else").to_string();
            Ok(detail)
        }

        fn download_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<Vec<u8>> {
            self.0.download_tag(pipe, tag)
        }

        fn get_pipe(&self, pipe: &PipeId) -> RegistryResult<Option<PipeMetadata>> {
            self.0.get_pipe(pipe)
        }

        fn create_pipe(
            &self,
            owner: &str,
            request: &CreatePipeRequest,
        ) -> RegistryResult<PipeMetadata> {
            self.0.create_pipe(owner, request)
        }

        fn push(
            &self,
            pipe: &PipeId,
            content: &[u8],
            tags: &[TagName],
        ) -> RegistryResult<PushResponse> {
            self.0.push(pipe, content, tags)
        }
    }

    #[test]
    fn test_pull_records_tag_and_head() {
        let (_dir, store, registry, reference) = setup();
        let tag = TagName::latest();

        let outcome = pull(&store, &registry, &reference, false).unwrap();
        assert_eq!(outcome.tag, tag);
        assert_eq!(outcome.size_bytes, 7);

        let pipe = &reference.pipe;
        assert_eq!(store.load_content(pipe, &tag).unwrap(), b"echo hi");
        assert!(!store.is_dirty(pipe, &tag).unwrap());

        let index = store.require_index(pipe).unwrap();
        assert!(index.is_active(&tag));
        let record = index.get(&tag).unwrap();
        assert_eq!(record.primary_digest, outcome.digest);
        assert!(record.pulled_at.is_some());
        assert!(record.created_at.is_some());
        assert_eq!(store.read_head(pipe).unwrap(), Some(HeadRef::Tag(tag)));
    }

    #[test]
    fn test_pull_refuses_dirty_tag_without_force() {
        let (_dir, store, registry, reference) = setup();
        let pipe = &reference.pipe;
        let tag = TagName::latest();
        pull(&store, &registry, &reference, false).unwrap();

        let path = store.content_path(pipe, &tag).unwrap();
        fs::write(&path, b"echo bye").unwrap();

        let err = pull(&store, &registry, &reference, false).unwrap_err();
        assert!(matches!(err, SyncError::DirtyWorkingTag { .. }));
        assert!(err.requires_force());
        assert!(store.tag_state(pipe, &tag).unwrap().is_dirty());

        pull(&store, &registry, &reference, true).unwrap();
        assert_eq!(store.tag_state(pipe, &tag).unwrap(), TagState::Clean);
    }

    #[test]
    fn test_pull_refuses_dirty_editable_tag() {
        let (_dir, store, registry, reference) = setup();
        let pipe = &reference.pipe;
        let tag = TagName::latest();
        pull(&store, &registry, &reference, false).unwrap();

        let mut index = store.require_index(pipe).unwrap();
        let mut record = index.get(&tag).unwrap().clone();
        record.editable = true;
        index.upsert(tag.clone(), record);
        store.save_index(pipe, &index).unwrap();
        store.write_editable(pipe, &tag, b"echo hi").unwrap();
        fs::write(store.layout(pipe).editable_path(&tag), b"echo edited").unwrap();

        let err = pull(&store, &registry, &reference, false).unwrap_err();
        assert!(matches!(err, SyncError::DirtyWorkingTag { .. }));
        assert_eq!(store.load_content(pipe, &tag).unwrap(), b"echo edited");
    }

    #[test]
    fn test_forced_pull_of_new_content_drops_edited_blob() {
        let (_dir, store, registry, reference) = setup();
        let pipe = &reference.pipe;
        let tag = TagName::latest();
        let first = pull(&store, &registry, &reference, false).unwrap();
        fs::write(store.content_path(pipe, &tag).unwrap(), b"echo bye").unwrap();

        registry.publish(pipe, &tag, b"echo v2");
        let second = pull(&store, &registry, &reference, true).unwrap();

        assert_ne!(first.digest, second.digest);
        assert!(!store.has_blob(pipe, &first.digest));
        assert_eq!(store.list_blobs(pipe).unwrap(), vec![second.digest.clone()]);
        assert_eq!(
            store.content_path(pipe, &tag).unwrap(),
            store.blob_path(pipe, &second.digest)
        );
        assert_eq!(store.load_content(pipe, &tag).unwrap(), b"echo v2");
        assert_eq!(store.tag_state(pipe, &tag).unwrap(), TagState::Clean);
    }

    #[test]
    fn test_clean_pull_of_known_content_repairs_edited_blob() {
        let (_dir, store, registry, reference) = setup();
        let pipe = &reference.pipe;
        pull(&store, &registry, &reference, false).unwrap();
        fs::write(store.content_path(pipe, &TagName::latest()).unwrap(), b"echo bye").unwrap();

        let v3 = TagName::new("v3").unwrap();
        registry.publish(pipe, &v3, b"echo hi");
        let reference: PipeRef = "alice/deploy:v3".parse().unwrap();
        pull(&store, &registry, &reference, false).unwrap();

        assert_eq!(store.load_content(pipe, &v3).unwrap(), b"echo hi");
        assert!(!store.is_dirty(pipe, &v3).unwrap());
    }

    #[test]
    fn test_pull_keeps_created_at_and_editable() {
        let (_dir, store, registry, reference) = setup();
        let pipe = &reference.pipe;
        let tag = TagName::latest();
        pull(&store, &registry, &reference, false).unwrap();

        let mut index = store.require_index(pipe).unwrap();
        let mut record = index.get(&tag).unwrap().clone();
        let created = record.created_at;
        record.editable = true;
        index.upsert(tag.clone(), record);
        store.save_index(pipe, &index).unwrap();

        registry.publish(pipe, &tag, b"echo again");
        let outcome = pull(&store, &registry, &reference, true).unwrap();
        assert!(outcome.editable);

        let record = store.require_index(pipe).unwrap().get(&tag).unwrap().clone();
        assert!(record.editable);
        assert_eq!(record.created_at, created);
        assert_eq!(
            store.content_path(pipe, &tag).unwrap(),
            store.layout(pipe).editable_path(&tag)
        );
        assert_eq!(store.load_content(pipe, &tag).unwrap(), b"echo again");
    }

    #[test]
    fn test_pull_collects_replaced_blob() {
        let (_dir, store, registry, reference) = setup();
        let pipe = &reference.pipe;
        let first = pull(&store, &registry, &reference, false).unwrap();

        registry.publish(pipe, &TagName::latest(), b"echo v2");
        let second = pull(&store, &registry, &reference, false).unwrap();

        assert!(!store.has_blob(pipe, &first.digest));
        assert!(store.has_blob(pipe, &second.digest));
        assert_eq!(second.gc.unwrap().removed, vec![first.digest]);
    }

    #[test]
    fn test_checksum_mismatch_leaves_store_untouched() {
        let (_dir, store, registry, reference) = setup();
        let liar = LyingRegistry(registry);

        let err = pull(&store, &liar, &reference, false).unwrap_err();
        assert!(matches!(err, SyncError::ChecksumMismatch { .. }));

        let pipe = &reference.pipe;
        assert!(!store.contains(pipe));
        assert!(store.list_blobs(pipe).unwrap().is_empty());
        assert!(store.read_head(pipe).unwrap().is_none());
    }

    #[test]
    fn test_pull_unknown_tag() {
        let (_dir, store, registry, _) = setup();
        let reference: PipeRef = "alice/deploy:v9".parse().unwrap();

        let err = pull(&store, &registry, &reference, false).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            store.require_index(&reference.pipe),
            Err(HubError::NotPulled(_))
        ));
    }
}
