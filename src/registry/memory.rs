//! In-process registry.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{
    CreatePipeRequest, PipeMetadata, PushResponse, Registry, RegistryError, RegistryResult,
    TagDetail,
};
use crate::hub::{compute_checksums, PipeId, TagName};

struct MemoryPipe {
    metadata: PipeMetadata,
    tags: BTreeMap<TagName, Vec<u8>>,
}

/// A registry that keeps everything in memory.
///
/// Behaves like the remote service for the calls the orchestrator makes,
/// which makes it the registry of choice for tests.
#[derive(Default)]
pub struct MemoryRegistry {
    pipes: Mutex<BTreeMap<PipeId, MemoryPipe>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish content under a tag, creating the pipe if needed.
    pub fn publish(&self, pipe: &PipeId, tag: &TagName, content: &[u8]) {
        let mut pipes = self.pipes.lock();
        let entry = pipes.entry(pipe.clone()).or_insert_with(|| MemoryPipe {
            metadata: metadata_for(pipe, true, None),
            tags: BTreeMap::new(),
        });
        entry.tags.insert(tag.clone(), content.to_vec());
    }

    /// The content currently published under a tag.
    pub fn content(&self, pipe: &PipeId, tag: &TagName) -> Option<Vec<u8>> {
        self.pipes
            .lock()
            .get(pipe)
            .and_then(|p| p.tags.get(tag).cloned())
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.lock().len()
    }

    fn not_found(pipe: &PipeId, tag: Option<&TagName>) -> RegistryError {
        match tag {
            Some(tag) => RegistryError::NotFound(format!("{}:{}", pipe, tag)),
            None => RegistryError::NotFound(pipe.to_string()),
        }
    }
}

fn metadata_for(pipe: &PipeId, is_public: bool, description: Option<String>) -> PipeMetadata {
    PipeMetadata {
        owner: pipe.owner().to_string(),
        name: pipe.name().to_string(),
        is_public,
        description,
        tags: Vec::new(),
    }
}

impl Registry for MemoryRegistry {
    fn get_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<TagDetail> {
        let content = self
            .content(pipe, tag)
            .ok_or_else(|| Self::not_found(pipe, Some(tag)))?;
        let sums = compute_checksums(&content);
        Ok(TagDetail {
            primary_digest: sums.sha256.to_string(),
            secondary_digest: sums.md5,
            size_bytes: content.len() as u64,
        })
    }

    fn download_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<Vec<u8>> {
        self.content(pipe, tag)
            .ok_or_else(|| Self::not_found(pipe, Some(tag)))
    }

    fn get_pipe(&self, pipe: &PipeId) -> RegistryResult<Option<PipeMetadata>> {
        Ok(self.pipes.lock().get(pipe).map(|p| {
            let mut metadata = p.metadata.clone();
            metadata.tags = p.tags.keys().map(|t| t.to_string()).collect();
            metadata
        }))
    }

    fn create_pipe(
        &self,
        owner: &str,
        request: &CreatePipeRequest,
    ) -> RegistryResult<PipeMetadata> {
        let pipe = PipeId::new(owner, request.name.as_str())
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
        let mut pipes = self.pipes.lock();
        if pipes.contains_key(&pipe) {
            return Err(RegistryError::Status {
                status: 409,
                message: format!("pipe {} already exists", pipe),
            });
        }
        let metadata = metadata_for(&pipe, request.is_public, request.description.clone());
        pipes.insert(
            pipe,
            MemoryPipe {
                metadata: metadata.clone(),
                tags: BTreeMap::new(),
            },
        );
        Ok(metadata)
    }

    fn push(
        &self,
        pipe: &PipeId,
        content: &[u8],
        tags: &[TagName],
    ) -> RegistryResult<PushResponse> {
        let mut pipes = self.pipes.lock();
        let entry = pipes.get_mut(pipe).ok_or_else(|| Self::not_found(pipe, None))?;

        let created = !entry.tags.values().any(|existing| existing.as_slice() == content);
        for tag in tags {
            entry.tags.insert(tag.clone(), content.to_vec());
        }

        Ok(PushResponse {
            digest: compute_checksums(content).sha256.prefixed(),
            size_bytes: content.len() as u64,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created,
        })
    }
}
