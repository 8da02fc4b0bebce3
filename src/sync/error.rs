//! Orchestrator error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::hub::{HubError, PipeId, TagName};
use crate::registry::RegistryError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while pulling, pushing or managing tags.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store error.
    #[error("hub error: {0}")]
    Hub(#[from] HubError),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Downloaded or uploaded content does not hash to what the other side claims.
    #[error("checksum mismatch for {pipe}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        pipe: PipeId,
        expected: String,
        actual: String,
    },

    /// The local tag has edits that a pull would overwrite.
    #[error("{pipe}:{tag} has local changes; use --force to overwrite them")]
    DirtyWorkingTag { pipe: PipeId, tag: TagName },

    /// The last tag of a pipe cannot be removed.
    #[error("cannot delete {pipe}:{tag}, it is the only tag")]
    SoleTagDeletion { pipe: PipeId, tag: TagName },

    /// Neither an active tag nor a HEAD to start from.
    #[error("{0} has no active tag and no HEAD")]
    NoActiveTag(PipeId),

    /// HEAD names a tag whose content is gone.
    #[error("HEAD of {pipe} references tag {tag}, which no longer exists")]
    DanglingHeadReference { pipe: PipeId, tag: TagName },

    /// Tag creation would overwrite an existing tag.
    #[error("tag {pipe}:{tag} already exists; use --force to replace it")]
    TagExists { pipe: PipeId, tag: TagName },

    /// Push found nothing to upload.
    #[error("nothing to push for {pipe}: no hub content and no file at {}", .path.display())]
    SourceNotFound { pipe: PipeId, path: PathBuf },
}

impl SyncError {
    /// Whether repeating the operation with `--force` would get past this error.
    pub fn requires_force(&self) -> bool {
        matches!(
            self,
            SyncError::DirtyWorkingTag { .. } | SyncError::TagExists { .. }
        )
    }

    /// Check if this error indicates the resource doesn't exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::Hub(e) => e.is_not_found(),
            SyncError::Registry(e) => e.is_not_found(),
            SyncError::SourceNotFound { .. } => true,
            _ => false,
        }
    }
}
