//! Dirty detection.
//!
//! A tag is dirty when the digest of its live content differs from the
//! digest recorded in the index. This is the one place that decision is
//! made; pull, push and listings all ask here.

use std::fs;
use std::io::{Error as IoError, ErrorKind};

use crate::hub::digest;
use crate::hub::error::{HubError, HubResult};
use crate::hub::index::Index;
use crate::hub::pointer::read_pointer;
use crate::hub::types::{PipeLayout, Sha256Digest, TagName};

/// synchronization state of a recorded tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagState {
    /// live content matches the recorded digest
    Clean,
    /// live content has diverged
    Dirty { live: Sha256Digest },
    /// recorded, but the content is gone
    Missing,
}

impl TagState {
    pub fn is_dirty(&self) -> bool {
        matches!(self, TagState::Dirty { .. })
    }
}

/// read a tag's live bytes; `None` when the pointer or its target is gone
pub fn read_live_content(layout: &PipeLayout, tag: &TagName) -> HubResult<Option<Vec<u8>>> {
    let Some(pointer) = read_pointer(layout, tag)? else {
        return Ok(None);
    };
    let path = pointer.content_path(layout, tag);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(HubError::io("reading tag content", &path, e)),
    }
}

/// classify a recorded tag
pub fn tag_state(layout: &PipeLayout, index: &Index, tag: &TagName) -> HubResult<TagState> {
    let record = index.get(tag).ok_or_else(|| HubError::TagNotFound {
        pipe: layout.pipe.clone(),
        tag: tag.clone(),
    })?;

    let Some(content) = read_live_content(layout, tag)? else {
        return Ok(TagState::Missing);
    };

    let live = digest::sha256(&content);
    if live == record.primary_digest {
        Ok(TagState::Clean)
    } else {
        Ok(TagState::Dirty { live })
    }
}

/// whether a tag's live content differs from its recorded digest
///
/// a missing tag and missing content are errors, not "dirty"
pub fn is_dirty(layout: &PipeLayout, index: &Index, tag: &TagName) -> HubResult<bool> {
    match tag_state(layout, index, tag)? {
        TagState::Clean => Ok(false),
        TagState::Dirty { .. } => Ok(true),
        TagState::Missing => Err(missing_content_error(layout, index, tag)),
    }
}

fn missing_content_error(layout: &PipeLayout, index: &Index, tag: &TagName) -> HubError {
    match index.get(tag) {
        Some(record) if !record.editable => HubError::BlobReadFailure {
            pipe: layout.pipe.clone(),
            tag: tag.clone(),
            digest: record.primary_digest.clone(),
            source: IoError::new(ErrorKind::NotFound, "tag content not found"),
        },
        _ => HubError::ContentMissing {
            pipe: layout.pipe.clone(),
            tag: tag.clone(),
        },
    }
}
