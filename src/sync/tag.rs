//! Local tag management: create, delete, list, switch, detach, collect.

use tracing::{info, warn};

use super::collect_best_effort;
use super::error::{SyncError, SyncResult};
use crate::hub::{
    compute_checksums, GcSummary, HeadRef, HubError, HubStore, Index, PipeId, Sha256Digest,
    TagName, TagPointer, TagRecord, TagState,
};

/// What `create_tag` produced.
#[derive(Debug, Clone)]
pub struct TagCreated {
    pub tag: TagName,
    pub digest: Sha256Digest,
    /// Human description of where the content came from.
    pub source: String,
    /// false when an existing blob was reused
    pub new_blob: bool,
    pub gc: Option<GcSummary>,
}

/// One row of a tag listing.
#[derive(Debug, Clone)]
pub struct TagEntry {
    pub tag: TagName,
    /// `None` when the pointer entry is gone
    pub pointer: Option<TagPointer>,
    pub record: TagRecord,
    pub state: TagState,
    pub is_active: bool,
    pub is_head: bool,
}

/// All tags of a pipe plus its checkout state.
#[derive(Debug, Clone)]
pub struct TagListing {
    pub pipe: PipeId,
    pub tags: Vec<TagEntry>,
    pub head: Option<HeadRef>,
}

impl TagListing {
    /// The detached HEAD digest, if any.
    pub fn detached(&self) -> Option<&Sha256Digest> {
        self.head.as_ref().and_then(HeadRef::detached_digest)
    }
}

/// Content a new tag starts from.
struct TagSource {
    label: String,
    content: Vec<u8>,
}

/// Create `tag` from the current content of the pipe.
///
/// The source is the active tag, else whatever HEAD names. Clean content
/// reuses its blob; edited content is stored as a new blob first.
pub fn create_tag(
    store: &HubStore,
    pipe: &PipeId,
    tag: &TagName,
    force: bool,
    editable: bool,
) -> SyncResult<TagCreated> {
    let _lock = store.lock(pipe)?;
    let mut index = store.require_index(pipe)?;

    if index.contains(tag) && !force {
        return Err(SyncError::TagExists {
            pipe: pipe.clone(),
            tag: tag.clone(),
        });
    }

    let source = resolve_source(store, pipe, &index)?;
    let checksums = compute_checksums(&source.content);
    let new_blob = !store.has_blob(pipe, &checksums.sha256);
    store.write_blob(pipe, &source.content)?;

    if editable {
        store.write_editable(pipe, tag, &source.content)?;
    } else {
        store.point_tag(pipe, tag, &checksums.sha256)?;
    }

    let record = TagRecord::new(&checksums, source.content.len() as u64)
        .created_now()
        .editable(editable);
    index.upsert(tag.clone(), record);
    store.save_index(pipe, &index)?;

    info!(
        pipe = %pipe,
        tag = %tag,
        source = %source.label,
        digest = %checksums.sha256.short(),
        new_blob,
        "tag created"
    );
    let gc = collect_best_effort(store, pipe);

    Ok(TagCreated {
        tag: tag.clone(),
        digest: checksums.sha256,
        source: source.label,
        new_blob,
        gc,
    })
}

fn resolve_source(store: &HubStore, pipe: &PipeId, index: &Index) -> SyncResult<TagSource> {
    if let Some((active, _)) = index.active(pipe)? {
        return tag_source(store, pipe, active);
    }

    match store.read_head(pipe)? {
        None => Err(SyncError::NoActiveTag(pipe.clone())),
        Some(HeadRef::Blob(digest)) => Ok(TagSource {
            label: format!("detached {}", digest.short()),
            content: store.read_blob(pipe, &digest)?,
        }),
        Some(HeadRef::Tag(head_tag)) if index.contains(&head_tag) => {
            tag_source(store, pipe, head_tag)
        }
        Some(HeadRef::Tag(head_tag)) => match store.load_content(pipe, &head_tag) {
            Ok(content) => {
                warn!(pipe = %pipe, tag = %head_tag, "HEAD tag is not recorded, using its content");
                Ok(TagSource {
                    label: format!("HEAD {}", head_tag),
                    content,
                })
            }
            Err(e) if e.is_not_found() => Err(SyncError::DanglingHeadReference {
                pipe: pipe.clone(),
                tag: head_tag,
            }),
            Err(e) => Err(e.into()),
        },
    }
}

/// Live content of a recorded tag. Missing content is an error.
fn tag_source(store: &HubStore, pipe: &PipeId, tag: TagName) -> SyncResult<TagSource> {
    let dirty = store.is_dirty(pipe, &tag)?;
    let content = store.load_content(pipe, &tag)?;
    let label = if dirty {
        format!("{} (modified)", tag)
    } else {
        tag.to_string()
    };
    Ok(TagSource { label, content })
}

/// Remove a tag. The last remaining tag cannot be removed.
pub fn delete_tag(store: &HubStore, pipe: &PipeId, tag: &TagName) -> SyncResult<Option<GcSummary>> {
    let _lock = store.lock(pipe)?;
    let mut index = store.require_index(pipe)?;

    if !index.contains(tag) {
        return Err(HubError::TagNotFound {
            pipe: pipe.clone(),
            tag: tag.clone(),
        }
        .into());
    }
    if index.len() == 1 {
        return Err(SyncError::SoleTagDeletion {
            pipe: pipe.clone(),
            tag: tag.clone(),
        });
    }

    let was_active = index.is_active(tag);
    index.remove(tag);
    store.save_index(pipe, &index)?;
    store.remove_pointer(pipe, tag)?;

    if was_active {
        warn!(pipe = %pipe, tag = %tag, "deleted the active tag; switch to another tag");
    }
    if store.read_head(pipe)?.as_ref().and_then(HeadRef::tag) == Some(tag) {
        warn!(pipe = %pipe, tag = %tag, "HEAD still references the deleted tag");
    }

    info!(pipe = %pipe, tag = %tag, "tag deleted");
    Ok(collect_best_effort(store, pipe))
}

/// Every recorded tag with its pointer kind and state.
pub fn list_tags(store: &HubStore, pipe: &PipeId) -> SyncResult<TagListing> {
    let index = store.require_index(pipe)?;
    let head = store.read_head(pipe)?;
    let head_tag = head.as_ref().and_then(HeadRef::tag);

    let mut tags = Vec::with_capacity(index.len());
    for (tag, record) in &index.tags {
        let pointer = store.read_pointer(pipe, tag).unwrap_or_else(|e| {
            warn!(pipe = %pipe, tag = %tag, error = %e, "unreadable tag pointer");
            None
        });
        let state = match store.tag_state(pipe, tag) {
            Ok(state) => state,
            Err(e) => {
                warn!(pipe = %pipe, tag = %tag, error = %e, "could not read tag state");
                TagState::Missing
            }
        };
        tags.push(TagEntry {
            tag: tag.clone(),
            pointer,
            record: record.clone(),
            state,
            is_active: index.is_active(tag),
            is_head: head_tag == Some(tag),
        });
    }

    Ok(TagListing {
        pipe: pipe.clone(),
        tags,
        head,
    })
}

/// Make a recorded tag active and check it out.
pub fn switch_tag(store: &HubStore, pipe: &PipeId, tag: &TagName) -> SyncResult<()> {
    let _lock = store.lock(pipe)?;
    let mut index = store.require_index(pipe)?;

    if !index.contains(tag) {
        return Err(HubError::TagNotFound {
            pipe: pipe.clone(),
            tag: tag.clone(),
        }
        .into());
    }

    index.set_active(tag);
    store.save_index(pipe, &index)?;
    store.write_head(pipe, &HeadRef::Tag(tag.clone()))?;
    info!(pipe = %pipe, tag = %tag, "switched");
    Ok(())
}

/// Check out a blob directly, leaving no tag active.
pub fn detach_head(store: &HubStore, pipe: &PipeId, digest: &Sha256Digest) -> SyncResult<()> {
    let _lock = store.lock(pipe)?;
    let mut index = store.require_index(pipe)?;

    if !store.has_blob(pipe, digest) {
        return Err(HubError::BlobNotFound {
            pipe: pipe.clone(),
            digest: digest.clone(),
        }
        .into());
    }

    index.clear_active();
    store.save_index(pipe, &index)?;
    store.write_head(pipe, &HeadRef::Blob(digest.clone()))?;
    info!(pipe = %pipe, digest = %digest.short(), "HEAD detached");
    Ok(())
}

/// Collect unreferenced blobs of a pulled pipe.
pub fn collect_garbage(store: &HubStore, pipe: &PipeId) -> SyncResult<GcSummary> {
    let _lock = store.lock(pipe)?;
    store.require_index(pipe)?;
    let summary = store.garbage_collect(pipe)?;
    info!(
        pipe = %pipe,
        scanned = summary.scanned,
        removed = summary.removed_count(),
        failed = summary.failed,
        "garbage collected"
    );
    Ok(summary)
}
