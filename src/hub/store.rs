//! The hub store.
//!
//! `HubStore` is the entry point the rest of the system uses: it owns the
//! store root and turns a `PipeId` into the layout the lower modules work
//! on. It does not lock; orchestration code takes `lock()` around each
//! mutating operation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::hub::blob::{self, BlobMetadata};
use crate::hub::digest::{self, Checksums};
use crate::hub::dirty::{self, TagState};
use crate::hub::error::{HubError, HubResult};
use crate::hub::gc::{self, GcSummary};
use crate::hub::head::{self, HeadRef};
use crate::hub::index::Index;
use crate::hub::lock::PipeLock;
use crate::hub::pointer::{self, TagPointer};
use crate::hub::types::{PipeId, PipeLayout, Sha256Digest, TagName};

/// Store configuration options.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding one sub-directory per owner.
    pub root: PathBuf,
    /// Create the root if it doesn't exist.
    pub create_if_missing: bool,
}

impl StoreConfig {
    /// Create a new configuration with the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_if_missing: true,
        }
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

/// Local content-addressed store for pipe definitions.
#[derive(Debug, Clone)]
pub struct HubStore {
    config: StoreConfig,
}

impl HubStore {
    /// Open a store, creating its root when configured to.
    pub fn open(config: StoreConfig) -> HubResult<Self> {
        if config.create_if_missing {
            fs::create_dir_all(&config.root)
                .map_err(|e| HubError::io("creating store root", &config.root, e))?;
        } else if !config.root.is_dir() {
            return Err(HubError::io(
                "opening store root",
                &config.root,
                std::io::Error::new(ErrorKind::NotFound, "store root does not exist"),
            ));
        }
        Ok(Self { config })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn layout(&self, pipe: &PipeId) -> PipeLayout {
        PipeLayout::new(&self.config.root, pipe.clone())
    }

    /// Take the exclusive lock of a pipe.
    pub fn lock(&self, pipe: &PipeId) -> HubResult<PipeLock> {
        PipeLock::acquire(&self.layout(pipe))
    }

    /// Whether the pipe has been pulled (has an index).
    pub fn contains(&self, pipe: &PipeId) -> bool {
        self.layout(pipe).index_path().is_file()
    }

    /// List every pulled pipe.
    pub fn list_pipes(&self) -> HubResult<Vec<PipeId>> {
        let mut pipes = Vec::new();
        for owner in read_dir_names(&self.config.root)? {
            let owner_dir = self.config.root.join(&owner);
            for name in read_dir_names(&owner_dir)? {
                if let Ok(pipe) = PipeId::new(owner.as_str(), name) {
                    if self.contains(&pipe) {
                        pipes.push(pipe);
                    }
                }
            }
        }
        pipes.sort();
        Ok(pipes)
    }

    // ==================== Blob Operations ====================

    pub fn blob_path(&self, pipe: &PipeId, digest: &Sha256Digest) -> PathBuf {
        self.layout(pipe).blob_path(digest)
    }

    pub fn write_blob(&self, pipe: &PipeId, content: &[u8]) -> HubResult<Sha256Digest> {
        blob::write_blob(&self.layout(pipe), content)
    }

    pub fn read_blob(&self, pipe: &PipeId, digest: &Sha256Digest) -> HubResult<Vec<u8>> {
        blob::read_blob(&self.layout(pipe), digest)
    }

    pub fn has_blob(&self, pipe: &PipeId, digest: &Sha256Digest) -> bool {
        blob::has_blob(&self.layout(pipe), digest)
    }

    pub fn list_blobs(&self, pipe: &PipeId) -> HubResult<Vec<Sha256Digest>> {
        blob::list_blobs(&self.layout(pipe))
    }

    pub fn blob_metadata(&self, pipe: &PipeId, digest: &Sha256Digest) -> HubResult<BlobMetadata> {
        BlobMetadata::load(&self.layout(pipe), digest)
    }

    // ==================== Tag Operations ====================

    pub fn read_pointer(&self, pipe: &PipeId, tag: &TagName) -> HubResult<Option<TagPointer>> {
        pointer::read_pointer(&self.layout(pipe), tag)
    }

    /// The path whose bytes are the tag's current content.
    pub fn content_path(&self, pipe: &PipeId, tag: &TagName) -> HubResult<PathBuf> {
        let layout = self.layout(pipe);
        match pointer::read_pointer(&layout, tag)? {
            Some(pointer) => Ok(pointer.content_path(&layout, tag)),
            None => Err(HubError::ContentMissing {
                pipe: pipe.clone(),
                tag: tag.clone(),
            }),
        }
    }

    /// Read a tag's current content through its pointer.
    pub fn load_content(&self, pipe: &PipeId, tag: &TagName) -> HubResult<Vec<u8>> {
        dirty::read_live_content(&self.layout(pipe), tag)?.ok_or_else(|| HubError::ContentMissing {
            pipe: pipe.clone(),
            tag: tag.clone(),
        })
    }

    /// Store freshly downloaded content for a tag.
    ///
    /// The blob is written first and the pointer second, so an interruption
    /// leaves at worst an orphan blob. The index is not touched.
    pub fn save_content(
        &self,
        pipe: &PipeId,
        tag: &TagName,
        content: &[u8],
        editable: bool,
    ) -> HubResult<Checksums> {
        let layout = self.layout(pipe);
        let checksums = digest::compute_checksums(content);
        blob::write_blob(&layout, content)?;
        if editable {
            pointer::write_editable(&layout, tag, content)?;
        } else {
            pointer::point_tag(&layout, tag, &checksums.sha256)?;
        }
        Ok(checksums)
    }

    /// Point a tag at an existing blob.
    pub fn point_tag(&self, pipe: &PipeId, tag: &TagName, digest: &Sha256Digest) -> HubResult<()> {
        pointer::point_tag(&self.layout(pipe), tag, digest)
    }

    /// Make a tag a directly editable copy of `content`.
    pub fn write_editable(&self, pipe: &PipeId, tag: &TagName, content: &[u8]) -> HubResult<()> {
        pointer::write_editable(&self.layout(pipe), tag, content)
    }

    pub fn remove_pointer(&self, pipe: &PipeId, tag: &TagName) -> HubResult<bool> {
        pointer::remove_pointer(&self.layout(pipe), tag)
    }

    // ==================== Index & HEAD ====================

    pub fn load_index(&self, pipe: &PipeId) -> HubResult<Option<Index>> {
        Index::load(&self.layout(pipe))
    }

    /// Load the index of a pipe that must have been pulled.
    pub fn require_index(&self, pipe: &PipeId) -> HubResult<Index> {
        self.load_index(pipe)?
            .ok_or_else(|| HubError::NotPulled(pipe.clone()))
    }

    pub fn save_index(&self, pipe: &PipeId, index: &Index) -> HubResult<()> {
        index.save(&self.layout(pipe))
    }

    pub fn read_head(&self, pipe: &PipeId) -> HubResult<Option<HeadRef>> {
        head::read_head(&self.layout(pipe))
    }

    pub fn write_head(&self, pipe: &PipeId, head: &HeadRef) -> HubResult<()> {
        head::write_head(&self.layout(pipe), head)
    }

    // ==================== State ====================

    pub fn tag_state(&self, pipe: &PipeId, tag: &TagName) -> HubResult<TagState> {
        let index = self.require_index(pipe)?;
        dirty::tag_state(&self.layout(pipe), &index, tag)
    }

    /// Whether a tag's live content has diverged from its recorded digest.
    pub fn is_dirty(&self, pipe: &PipeId, tag: &TagName) -> HubResult<bool> {
        let index = self.require_index(pipe)?;
        dirty::is_dirty(&self.layout(pipe), &index, tag)
    }

    /// Remove blobs nothing references. The caller holds the pipe lock.
    pub fn garbage_collect(&self, pipe: &PipeId) -> HubResult<GcSummary> {
        gc::garbage_collect(&self.layout(pipe))
    }
}

fn read_dir_names(dir: &Path) -> HubResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HubError::io("listing store", dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| HubError::io("listing store", dir, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}
