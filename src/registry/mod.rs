//! Remote registry seam.
//!
//! The orchestrator talks to the registry only through the [`Registry`]
//! trait. Two implementations ship with the crate: [`HttpRegistry`] for
//! the real service and [`MemoryRegistry`] for tests and embedding.
//!
//! Nothing returned by a registry is trusted for local storage until the
//! orchestrator has recomputed the digest itself.

mod http;
mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hub::{HubError, PipeId, TagName};

pub use http::HttpRegistry;
pub use memory::MemoryRegistry;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while talking to a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transport failure (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered with an unexpected status.
    #[error("registry returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The requested pipe or tag does not exist remotely.
    #[error("not found on registry: {0}")]
    NotFound(String),

    /// Missing or rejected credentials.
    #[error("not authorized: set a registry token")]
    Unauthorized,

    /// The registry answered with something we cannot use.
    #[error("invalid registry response: {0}")]
    InvalidResponse(String),

    /// Local digest computation failed.
    #[error("hub error: {0}")]
    Hub(#[from] HubError),
}

impl RegistryError {
    /// Check if this error indicates the resource doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

/// Registry metadata for one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDetail {
    /// hex SHA-256 of the tag's content
    #[serde(alias = "sha256")]
    pub primary_digest: String,
    /// hex MD5 of the tag's content
    #[serde(alias = "md5")]
    pub secondary_digest: String,
    pub size_bytes: u64,
}

/// Registry metadata for a pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeMetadata {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of a pipe creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePipeRequest {
    pub name: String,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// What the registry reports after a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// `sha256:<hex>`
    pub digest: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// false when the registry already had this content
    #[serde(default)]
    pub created: bool,
}

/// The registry surface the orchestrator consumes.
pub trait Registry {
    fn get_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<TagDetail>;

    fn download_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<Vec<u8>>;

    /// `None` when the pipe does not exist remotely.
    fn get_pipe(&self, pipe: &PipeId) -> RegistryResult<Option<PipeMetadata>>;

    fn create_pipe(&self, owner: &str, request: &CreatePipeRequest) -> RegistryResult<PipeMetadata>;

    fn push(&self, pipe: &PipeId, content: &[u8], tags: &[TagName]) -> RegistryResult<PushResponse>;
}

impl<R: Registry + ?Sized> Registry for Arc<R> {
    fn get_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<TagDetail> {
        (**self).get_tag(pipe, tag)
    }

    fn download_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<Vec<u8>> {
        (**self).download_tag(pipe, tag)
    }

    fn get_pipe(&self, pipe: &PipeId) -> RegistryResult<Option<PipeMetadata>> {
        (**self).get_pipe(pipe)
    }

    fn create_pipe(
        &self,
        owner: &str,
        request: &CreatePipeRequest,
    ) -> RegistryResult<PipeMetadata> {
        (**self).create_pipe(owner, request)
    }

    fn push(
        &self,
        pipe: &PipeId,
        content: &[u8],
        tags: &[TagName],
    ) -> RegistryResult<PushResponse> {
        (**self).push(pipe, content, tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_detail_accepts_short_field_names() {
        let detail: TagDetail = serde_json::from_str(
            r#"{"sha256": "abc", "md5": "def", "size_bytes": 3}"#,
        )
        .unwrap();
        assert_eq!(detail.primary_digest, "abc");
        assert_eq!(detail.secondary_digest, "def");
    }

    #[test]
    fn test_push_response_defaults() {
        let resp: PushResponse =
            serde_json::from_str(r#"{"digest": "sha256:abc", "size_bytes": 3}"#).unwrap();
        assert!(resp.tags.is_empty());
        assert!(!resp.created);
    }
}
