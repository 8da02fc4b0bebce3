//! Content-addressed blob storage.
//!
//! Each distinct piece of content is stored once, as `blobs/<sha256>`, no
//! matter how many tags refer to it. New content means a new digest and a
//! new file; an existing file is only rewritten when its bytes no longer
//! hash to its name.

use std::fs;
use std::io::ErrorKind;

use tracing::{debug, warn};

use crate::hub::atomic::write_atomic;
use crate::hub::digest;
use crate::hub::error::{HubError, HubResult};
use crate::hub::types::{PipeLayout, Sha256Digest};

/// write `content` as a blob, returning its digest
///
/// an existing blob whose bytes still hash to its name is left alone. an
/// indirect tag's content path is the blob file itself, so a blob edited
/// through a tag no longer matches and is rewritten
pub fn write_blob(layout: &PipeLayout, content: &[u8]) -> HubResult<Sha256Digest> {
    let digest = digest::sha256(content);
    let path = layout.blob_path(&digest);

    match fs::read(&path) {
        Ok(existing) if digest::sha256(&existing) == digest => {
            debug!(pipe = %layout.pipe, digest = %digest.short(), "blob hit");
            return Ok(digest);
        }
        Ok(_) => {
            warn!(pipe = %layout.pipe, digest = %digest.short(), "blob was edited in place, rewriting");
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(HubError::io("reading blob", &path, e)),
    }

    // a concurrent writer renaming the same digest into place is harmless:
    // both temporaries hold identical bytes
    write_atomic(&path, content, "writing blob")?;
    debug!(pipe = %layout.pipe, digest = %digest.short(), size = content.len(), "blob stored");
    Ok(digest)
}

/// read a blob's content
pub fn read_blob(layout: &PipeLayout, digest: &Sha256Digest) -> HubResult<Vec<u8>> {
    let path = layout.blob_path(digest);
    fs::read(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => HubError::BlobNotFound {
            pipe: layout.pipe.clone(),
            digest: digest.clone(),
        },
        _ => HubError::io("reading blob", &path, e),
    })
}

/// check whether a blob is stored
pub fn has_blob(layout: &PipeLayout, digest: &Sha256Digest) -> bool {
    layout.blob_path(digest).is_file()
}

/// list the digests of all stored blobs
///
/// files whose names are not digests (temporaries, strays) are skipped
pub fn list_blobs(layout: &PipeLayout) -> HubResult<Vec<Sha256Digest>> {
    let dir = layout.blobs_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HubError::io("listing blobs", &dir, e)),
    };

    let mut digests = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| HubError::io("listing blobs", &dir, e))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        if let Some(digest) = name.to_str().and_then(|s| Sha256Digest::from_hex(s).ok()) {
            digests.push(digest);
        }
    }

    digests.sort();
    Ok(digests)
}

/// remove a blob file
pub fn remove_blob(layout: &PipeLayout, digest: &Sha256Digest) -> HubResult<()> {
    let path = layout.blob_path(digest);
    fs::remove_file(&path).map_err(|e| HubError::io("removing blob", &path, e))
}

/// metadata about a blob without reading its full content
#[derive(Debug, Clone)]
pub struct BlobMetadata {
    pub digest: Sha256Digest,
    pub size: u64,
}

impl BlobMetadata {
    /// get the metadata for a blob
    pub fn load(layout: &PipeLayout, digest: &Sha256Digest) -> HubResult<Self> {
        let path = layout.blob_path(digest);
        let meta = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => HubError::BlobNotFound {
                pipe: layout.pipe.clone(),
                digest: digest.clone(),
            },
            _ => HubError::io("reading blob metadata", &path, e),
        })?;
        Ok(Self {
            digest: digest.clone(),
            size: meta.len(),
        })
    }
}
