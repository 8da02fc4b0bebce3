//! Push: hub (or a local pipeline file) to registry.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{info, warn};

use super::error::{SyncError, SyncResult};
use super::{collect_best_effort, digest_matches};
use crate::hub::{
    compute_checksums, GcSummary, HubError, HubStore, Index, PipeId, PipeRef, Sha256Digest,
    TagName, TagRecord,
};
use crate::registry::{CreatePipeRequest, Registry};

/// Push settings beyond the pipe reference.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Tags to publish under. Empty means the reference's tag, else `latest`.
    pub tags: Vec<TagName>,
    /// Directory holding `<name>.yaml` pipeline files, used when the hub
    /// has nothing for the pipe.
    pub local_files_dir: Option<PathBuf>,
    /// Visibility of the registry pipe when it has to be created.
    pub is_public: bool,
}

impl PushOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(mut self, tags: Vec<TagName>) -> Self {
        self.tags = tags;
        self
    }

    pub fn local_files_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_files_dir = Some(dir.into());
        self
    }

    pub fn public(mut self, value: bool) -> Self {
        self.is_public = value;
        self
    }
}

/// Where pushed content was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushSource {
    Tag(TagName),
    File(PathBuf),
}

/// What a push published.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    pub pipe: PipeId,
    pub tags: Vec<TagName>,
    pub digest: Sha256Digest,
    pub size_bytes: u64,
    /// false when the registry already had this content
    pub created: bool,
    pub source: PushSource,
    pub gc: Option<GcSummary>,
}

/// Publish content to the registry, creating the remote pipe if needed.
///
/// When the content came from a hub tag, that tag is re-snapshotted so it
/// is clean afterwards.
pub fn push(
    store: &HubStore,
    registry: &dyn Registry,
    reference: &PipeRef,
    options: &PushOptions,
) -> SyncResult<PushOutcome> {
    let pipe = &reference.pipe;
    let tags = if options.tags.is_empty() {
        vec![reference.tag_or_latest()]
    } else {
        options.tags.clone()
    };
    let _lock = store.lock(pipe)?;

    let index = store.load_index(pipe)?;
    let (source, content) = match hub_source(store, pipe, index.as_ref(), &tags[0])? {
        Some((tag, content)) => (PushSource::Tag(tag), content),
        None => file_source(pipe, options)?,
    };

    if let PushSource::Tag(tag) = &source {
        match store.tag_state(pipe, tag) {
            Ok(state) if state.is_dirty() => {
                warn!(pipe = %pipe, tag = %tag, "pushing uncommitted local changes")
            }
            Ok(_) => {}
            Err(e) => warn!(pipe = %pipe, tag = %tag, error = %e, "could not check local state"),
        }
    }

    if registry.get_pipe(pipe)?.is_none() {
        info!(pipe = %pipe, "creating pipe on registry");
        registry.create_pipe(
            pipe.owner(),
            &CreatePipeRequest {
                name: pipe.name().to_string(),
                is_public: options.is_public,
                description: None,
            },
        )?;
    }

    let checksums = compute_checksums(&content);
    let response = registry.push(pipe, &content, &tags)?;
    if !digest_matches(&checksums.sha256, &response.digest) {
        return Err(SyncError::ChecksumMismatch {
            pipe: pipe.clone(),
            expected: checksums.sha256.prefixed(),
            actual: response.digest,
        });
    }
    info!(
        pipe = %pipe,
        digest = %checksums.sha256.short(),
        size = content.len(),
        created = response.created,
        "pushed"
    );

    let mut gc = None;
    if let (PushSource::Tag(tag), Some(mut index)) = (&source, index) {
        let previous = index.get(tag).cloned();
        let editable = previous.as_ref().map(|r| r.editable).unwrap_or(false);

        store.save_content(pipe, tag, &content, editable)?;
        let mut record = TagRecord::new(&checksums, content.len() as u64).editable(editable);
        if let Some(previous) = previous {
            record.created_at = previous.created_at;
            record.pulled_at = previous.pulled_at;
        }
        index.upsert(tag.clone(), record);
        store.save_index(pipe, &index)?;
        gc = collect_best_effort(store, pipe);
    }

    Ok(PushOutcome {
        pipe: pipe.clone(),
        tags,
        digest: checksums.sha256,
        size_bytes: content.len() as u64,
        created: response.created,
        source,
        gc,
    })
}

/// The first requested tag's content, else the active tag's.
fn hub_source(
    store: &HubStore,
    pipe: &PipeId,
    index: Option<&Index>,
    requested: &TagName,
) -> SyncResult<Option<(TagName, Vec<u8>)>> {
    let Some(index) = index else {
        return Ok(None);
    };

    let mut candidates = Vec::new();
    if index.contains(requested) {
        candidates.push(requested.clone());
    }
    match index.active(pipe) {
        Ok(Some((active, _))) if &active != requested => candidates.push(active),
        Ok(_) => {}
        Err(e) => warn!(pipe = %pipe, error = %e, "ignoring active tag"),
    }

    for tag in candidates {
        match store.load_content(pipe, &tag) {
            Ok(content) => return Ok(Some((tag, content))),
            Err(e) if e.is_not_found() => {
                warn!(pipe = %pipe, tag = %tag, "tag has no content, skipping")
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

fn file_source(pipe: &PipeId, options: &PushOptions) -> SyncResult<(PushSource, Vec<u8>)> {
    let file_name = format!("{}.yaml", pipe.name());
    let path = match &options.local_files_dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    };
    match fs::read(&path) {
        Ok(content) => Ok((PushSource::File(path), content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(SyncError::SourceNotFound {
            pipe: pipe.clone(),
            path,
        }),
        Err(e) => Err(HubError::io("reading pipeline file", &path, e).into()),
    }
}
