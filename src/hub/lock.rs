//! Advisory per-pipe lock.
//!
//! Two processes working on the same pipe would otherwise interleave their
//! index read-modify-write cycles. Every mutating operation holds this lock
//! for its whole duration. The lock is not re-entrant: acquire it once, at
//! the operation boundary, never inside store primitives.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use fs4::FileExt;
use tracing::debug;

use crate::hub::error::{HubError, HubResult};
use crate::hub::types::PipeLayout;

/// exclusive lock on a pipe directory, released on drop
#[derive(Debug)]
pub struct PipeLock {
    _file: File,
    path: PathBuf,
}

impl PipeLock {
    /// block until the pipe lock is held
    pub fn acquire(layout: &PipeLayout) -> HubResult<Self> {
        let (file, path) = open_lock_file(layout)?;
        file.lock_exclusive()
            .map_err(|e| HubError::io("locking pipe", &path, e))?;
        debug!(pipe = %layout.pipe, "pipe lock acquired");
        Ok(Self { _file: file, path })
    }

    /// take the lock only if nobody else holds it
    pub fn try_acquire(layout: &PipeLayout) -> HubResult<Option<Self>> {
        let (file, path) = open_lock_file(layout)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file, path })),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(HubError::io("locking pipe", &path, e)),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

fn open_lock_file(layout: &PipeLayout) -> HubResult<(File, PathBuf)> {
    fs::create_dir_all(layout.root())
        .map_err(|e| HubError::io("creating pipe directory", layout.root(), e))?;
    let path = layout.lock_path();
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| HubError::io("opening pipe lock", &path, e))?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::types::PipeId;
    use tempfile::TempDir;

    #[test]
    fn test_lock_excludes_second_holder() {
        let dir = TempDir::new().unwrap();
        let layout = PipeLayout::new(dir.path(), PipeId::new("alice", "deploy").unwrap());

        let held = PipeLock::acquire(&layout).unwrap();
        assert!(held.path().exists());
        assert!(PipeLock::try_acquire(&layout).unwrap().is_none());

        drop(held);
        assert!(PipeLock::try_acquire(&layout).unwrap().is_some());
    }

    #[test]
    fn test_locks_are_per_pipe() {
        let dir = TempDir::new().unwrap();
        let deploy = PipeLayout::new(dir.path(), PipeId::new("alice", "deploy").unwrap());
        let build = PipeLayout::new(dir.path(), PipeId::new("alice", "build").unwrap());

        let _held = PipeLock::acquire(&deploy).unwrap();
        assert!(PipeLock::try_acquire(&build).unwrap().is_some());
    }
}
