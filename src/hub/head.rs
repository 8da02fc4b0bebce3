//! HEAD: the checked-out position of a pipe.

use std::fmt;
use std::fs;
use std::io::ErrorKind;

use serde::{Deserialize, Serialize};

use crate::hub::atomic::write_atomic;
use crate::hub::error::{HubError, HubResult};
use crate::hub::types::{PipeLayout, Sha256Digest, TagName};

/// What HEAD points at.
///
/// A tag reference may name a tag the index no longer has; that state is
/// representable and reported, never repaired here.
///
/// Stored as `{"kind": "tag" | "blob", "value": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum HeadRef {
    Tag(TagName),
    Blob(Sha256Digest),
}

impl HeadRef {
    pub fn is_detached(&self) -> bool {
        matches!(self, HeadRef::Blob(_))
    }

    pub fn tag(&self) -> Option<&TagName> {
        match self {
            HeadRef::Tag(tag) => Some(tag),
            HeadRef::Blob(_) => None,
        }
    }

    pub fn detached_digest(&self) -> Option<&Sha256Digest> {
        match self {
            HeadRef::Tag(_) => None,
            HeadRef::Blob(digest) => Some(digest),
        }
    }
}

impl fmt::Display for HeadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadRef::Tag(tag) => write!(f, "{}", tag),
            HeadRef::Blob(digest) => write!(f, "sha256:{} (detached)", digest.short()),
        }
    }
}

/// read HEAD, or `None` if the pipe was never checked out
pub fn read_head(layout: &PipeLayout) -> HubResult<Option<HeadRef>> {
    let path = layout.head_path();
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HubError::io("reading HEAD", &path, e)),
    };
    let head = serde_json::from_slice(&bytes).map_err(|e| HubError::CorruptedData {
        path,
        reason: e.to_string(),
    })?;
    Ok(Some(head))
}

pub fn write_head(layout: &PipeLayout, head: &HeadRef) -> HubResult<()> {
    let bytes = serde_json::to_vec(head)?;
    write_atomic(&layout.head_path(), &bytes, "writing HEAD")
}
