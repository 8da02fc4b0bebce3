//! Per-pipe tag index.
//!
//! The index is loaded whole, mutated in memory and written back whole.
//! Tags are kept in a `BTreeMap` so the serialized form is stable.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hub::atomic::write_atomic;
use crate::hub::digest::Checksums;
use crate::hub::error::{HubError, HubResult};
use crate::hub::types::{PipeId, PipeLayout, Sha256Digest, TagName};

/// what the index remembers about one tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub primary_digest: Sha256Digest,
    pub secondary_digest: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub editable: bool,
}

impl TagRecord {
    /// a record for content with the given checksums, without timestamps
    pub fn new(checksums: &Checksums, size_bytes: u64) -> Self {
        Self {
            primary_digest: checksums.sha256.clone(),
            secondary_digest: checksums.md5.clone(),
            size_bytes,
            created_at: None,
            pulled_at: None,
            editable: false,
        }
    }

    pub fn created_now(mut self) -> Self {
        self.created_at = Some(Utc::now());
        self
    }

    pub fn pulled_now(mut self) -> Self {
        self.pulled_at = Some(Utc::now());
        self
    }

    pub fn editable(mut self, value: bool) -> Self {
        self.editable = value;
        self
    }
}

/// tag records plus the active tag of one pipe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default)]
    pub tags: BTreeMap<TagName, TagRecord>,
    /// empty when no tag is selected
    #[serde(default)]
    pub active_tag: String,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// load a pipe's index, or `None` if it has never been written
    pub fn load(layout: &PipeLayout) -> HubResult<Option<Self>> {
        let path = layout.index_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HubError::io("reading index", &path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// rewrite the whole index
    pub fn save(&self, layout: &PipeLayout) -> HubResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(&layout.index_path(), &bytes, "writing index")
    }

    pub fn get(&self, tag: &TagName) -> Option<&TagRecord> {
        self.tags.get(tag)
    }

    pub fn contains(&self, tag: &TagName) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// insert or replace a record
    pub fn upsert(&mut self, tag: TagName, record: TagRecord) -> Option<TagRecord> {
        self.tags.insert(tag, record)
    }

    pub fn remove(&mut self, tag: &TagName) -> Option<TagRecord> {
        self.tags.remove(tag)
    }

    pub fn set_active(&mut self, tag: &TagName) {
        self.active_tag = tag.to_string();
    }

    pub fn clear_active(&mut self) {
        self.active_tag.clear();
    }

    pub fn is_active(&self, tag: &TagName) -> bool {
        self.active_tag == tag.as_str()
    }

    /// the active tag and its record
    ///
    /// `Ok(None)` when no tag is active; an active tag without a record is
    /// reported as corruption
    pub fn active(&self, pipe: &PipeId) -> HubResult<Option<(TagName, &TagRecord)>> {
        if self.active_tag.is_empty() {
            return Ok(None);
        }
        let corrupt = || HubError::IndexCorruption {
            pipe: pipe.clone(),
            active_tag: self.active_tag.clone(),
        };
        let tag = TagName::new(self.active_tag.as_str()).map_err(|_| corrupt())?;
        match self.tags.get(&tag) {
            Some(record) => Ok(Some((tag, record))),
            None => Err(corrupt()),
        }
    }

    /// every digest the index keeps alive
    pub fn referenced_digests(&self) -> impl Iterator<Item = &Sha256Digest> {
        self.tags.values().map(|record| &record.primary_digest)
    }
}
