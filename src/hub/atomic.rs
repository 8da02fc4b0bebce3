//! Crash-safe file replacement.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::hub::error::{HubError, HubResult};

/// Write `bytes` to `path` by way of a temporary file in the same directory.
///
/// Readers see either the previous file or the complete new one. If any step
/// fails the previous file is left untouched and the temporary is removed.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], context: &'static str) -> HubResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| HubError::CorruptedData {
            path: path.to_path_buf(),
            reason: "path has no parent directory".to_string(),
        })?;

    fs::create_dir_all(dir).map_err(|e| HubError::io(context, dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| HubError::io(context, dir, e))?;
    tmp.write_all(bytes).map_err(|e| HubError::io(context, tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| HubError::io(context, tmp.path(), e))?;
    tmp.persist(path).map_err(|e| HubError::io(context, path, e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file");

        write_atomic(&path, b"one", "writing").unwrap();
        write_atomic(&path, b"two", "writing").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"two");
        // no temporaries left behind
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
