//! Hub store error types
//!
//! All errors that can occur during store operations are defined here.
//! Filesystem errors always carry the operation and the path, and the path
//! always sits under the pipe directory, so the pipe is identifiable.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::hub::types::{InvalidDigestError, InvalidNameError, PipeId, Sha256Digest, TagName};

/// the main error type for hub store operations
#[derive(Debug, Error)]
pub enum HubError {
    /// I/O error (filesystem level)
    #[error("{context} {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// invalid owner, pipe or tag name
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// malformed digest
    #[error("{0}")]
    InvalidDigest(#[from] InvalidDigestError),

    /// the pipe has never been pulled, so it has no index
    #[error("no index found for {0}: pull it first")]
    NotPulled(PipeId),

    /// the tag is not recorded in the index
    #[error("tag '{tag}' not found for {pipe}")]
    TagNotFound { pipe: PipeId, tag: TagName },

    /// the content of an editable tag (or its pointer) is gone
    #[error("content missing for {pipe}:{tag}")]
    ContentMissing { pipe: PipeId, tag: TagName },

    /// the blob behind a non-editable tag cannot be read
    #[error("cannot read blob {} for {pipe}:{tag}: {source}", .digest.short())]
    BlobReadFailure {
        pipe: PipeId,
        tag: TagName,
        digest: Sha256Digest,
        #[source]
        source: std::io::Error,
    },

    /// a blob requested by digest is not stored
    #[error("blob {} not found for {pipe}", .digest.short())]
    BlobNotFound { pipe: PipeId, digest: Sha256Digest },

    /// the active tag is set but not present in the tag mapping
    #[error("index corrupted for {pipe}: active tag '{active_tag}' is not in the index")]
    IndexCorruption { pipe: PipeId, active_tag: String },

    /// a pointer or HEAD file could not be understood
    #[error("corrupted data at {}: {reason}", .path.display())]
    CorruptedData { path: PathBuf, reason: String },
}

impl HubError {
    pub(crate) fn io(
        context: &'static str,
        path: impl AsRef<Path>,
        source: std::io::Error,
    ) -> Self {
        HubError::Io {
            context,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HubError::NotPulled(_)
                | HubError::TagNotFound { .. }
                | HubError::ContentMissing { .. }
                | HubError::BlobNotFound { .. }
        )
    }

    /// check if this error signals that the index and the files disagree
    pub fn is_inconsistency(&self) -> bool {
        matches!(
            self,
            HubError::BlobReadFailure { .. }
                | HubError::IndexCorruption { .. }
                | HubError::CorruptedData { .. }
        )
    }
}

/// result type alias for hub store operations
pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let pipe = PipeId::new("alice", "deploy").unwrap();
        let not_found = HubError::TagNotFound {
            pipe: pipe.clone(),
            tag: TagName::latest(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_inconsistency());

        let corrupt = HubError::IndexCorruption {
            pipe,
            active_tag: "gone".to_string(),
        };
        assert!(!corrupt.is_not_found());
        assert!(corrupt.is_inconsistency());
    }

    #[test]
    fn test_io_error_names_path() {
        let err = HubError::io(
            "writing blob",
            "/hub/alice/deploy/blobs/abc",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = err.to_string();
        assert!(message.contains("writing blob"));
        assert!(message.contains("alice/deploy"));
    }
}
