//! Tag pointers.
//!
//! A tag resolves to its content in one of two ways:
//! - `Indirect`: `tags/<tag>.ref` holds a digest, the content is the blob
//! - `Direct`: `tags/<tag>.yaml` is the content itself, edited in place
//!
//! Pointers are plain files rather than filesystem links so the layout is
//! the same on every platform. When both entries exist for one tag (an
//! interrupted kind switch) the direct entry wins, so edits stay visible.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use crate::hub::atomic::write_atomic;
use crate::hub::error::{HubError, HubResult};
use crate::hub::types::{PipeLayout, Sha256Digest, TagName};

/// how a tag reaches its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPointer {
    /// the tag aliases a blob
    Indirect(Sha256Digest),
    /// the tag owns a directly editable file
    Direct,
}

impl TagPointer {
    pub fn is_editable(&self) -> bool {
        matches!(self, TagPointer::Direct)
    }

    /// label used in listings
    pub fn kind_label(&self) -> &'static str {
        match self {
            TagPointer::Indirect(_) => "symlink",
            TagPointer::Direct => "editable",
        }
    }

    /// the path whose bytes are the tag's current content
    pub fn content_path(&self, layout: &PipeLayout, tag: &TagName) -> PathBuf {
        match self {
            TagPointer::Indirect(digest) => layout.blob_path(digest),
            TagPointer::Direct => layout.editable_path(tag),
        }
    }
}

/// resolve a tag's pointer, or `None` if the tag has no entry on disk
pub fn read_pointer(layout: &PipeLayout, tag: &TagName) -> HubResult<Option<TagPointer>> {
    if layout.editable_path(tag).is_file() {
        return Ok(Some(TagPointer::Direct));
    }

    let path = layout.ref_path(tag);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HubError::io("reading tag pointer", &path, e)),
    };

    let digest = Sha256Digest::from_hex(raw.trim()).map_err(|e| HubError::CorruptedData {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(Some(TagPointer::Indirect(digest)))
}

/// point `tag` at the blob `digest`, replacing any previous entry
///
/// the new pointer is fully written before the old one disappears
pub fn point_tag(layout: &PipeLayout, tag: &TagName, digest: &Sha256Digest) -> HubResult<()> {
    let line = format!("{}\n", digest);
    write_atomic(&layout.ref_path(tag), line.as_bytes(), "writing tag pointer")?;
    remove_if_exists(&layout.editable_path(tag), "removing editable tag file")?;
    debug!(pipe = %layout.pipe, %tag, digest = %digest.short(), "tag pointed");
    Ok(())
}

/// make `tag` an editable copy holding `content`
pub fn write_editable(layout: &PipeLayout, tag: &TagName, content: &[u8]) -> HubResult<()> {
    write_atomic(&layout.editable_path(tag), content, "writing editable tag")?;
    remove_if_exists(&layout.ref_path(tag), "removing tag pointer")?;
    debug!(pipe = %layout.pipe, %tag, size = content.len(), "editable tag written");
    Ok(())
}

/// remove every entry of `tag`; returns whether anything was removed
pub fn remove_pointer(layout: &PipeLayout, tag: &TagName) -> HubResult<bool> {
    let editable = remove_if_exists(&layout.editable_path(tag), "removing editable tag file")?;
    let indirect = remove_if_exists(&layout.ref_path(tag), "removing tag pointer")?;
    Ok(editable || indirect)
}

/// every tag entry present on disk
pub fn list_pointers(layout: &PipeLayout) -> HubResult<BTreeMap<TagName, TagPointer>> {
    let dir = layout.tags_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(HubError::io("listing tags", &dir, e)),
    };

    let mut pointers = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| HubError::io("listing tags", &dir, e))?;
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str());
        if ext != Some(PipeLayout::REF_EXT) && ext != Some(PipeLayout::EDITABLE_EXT) {
            continue;
        }
        let Some(tag) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| TagName::new(s).ok())
        else {
            continue;
        };
        if pointers.contains_key(&tag) {
            continue;
        }
        if let Some(pointer) = read_pointer(layout, &tag)? {
            pointers.insert(tag, pointer);
        }
    }

    Ok(pointers)
}

fn remove_if_exists(path: &std::path::Path, context: &'static str) -> HubResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(HubError::io(context, path, e)),
    }
}
