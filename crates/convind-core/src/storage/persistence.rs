//! On-disk layout and atomic file writes
//!
//! Storage location: `~/.local/share/convind/data/` (configurable via `Config`)
//!
//! Layout:
//! - `<identity>/` - one directory per content, named by the identity's text form
//! - `<identity>/.datatype` - the content's MIME type
//! - `<identity>/<revision-id>` - one file per revision, named by the decimal revision ID
//!
//! Every write goes to a dot-prefixed temporary file in the target directory
//! first and is renamed into place, so readers never observe a partial file
//! and directory listings never pick up staged data.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use uuid::Uuid;

use super::error::{StorageError, StorageResult};
use crate::identity::Identity;

/// Name of the per-content metadata file holding the MIME type
pub const MIME_TYPE_FILE: &str = ".datatype";

/// Path helpers for the content store directory tree
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one content's metadata and revisions
    pub fn content_dir(&self, id: &Identity) -> PathBuf {
        self.root.join(id.encode())
    }

    /// Path to a content's MIME type file
    pub fn mime_type_path(&self, id: &Identity) -> PathBuf {
        self.content_dir(id).join(MIME_TYPE_FILE)
    }

    /// Path to one revision's bytes
    pub fn revision_path(&self, id: &Identity, revision_id: u64) -> PathBuf {
        self.content_dir(id).join(revision_id.to_string())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a dot-prefixed temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    atomic_copy(path, &mut io::Cursor::new(data)).map(|_| ())
}

/// Stream a reader into a file atomically
///
/// The temporary file's modification time is stamped with the current wall
/// clock just before the rename; that stamp is returned and is what later
/// reads report as the file's creation time.
pub fn atomic_copy<R: Read + ?Sized>(path: &Path, reader: &mut R) -> StorageResult<SystemTime> {
    let temp_path = staging_path(path);

    match write_staged(&temp_path, reader) {
        Ok(stamp) => {
            fs::rename(&temp_path, path).map_err(|source| {
                let _ = fs::remove_file(&temp_path);
                StorageError::AtomicWriteFailed {
                    from: temp_path.clone(),
                    to: path.to_path_buf(),
                    source,
                }
            })?;
            Ok(stamp)
        }
        Err(err) => {
            let _ = fs::remove_file(&temp_path);
            Err(err)
        }
    }
}

fn write_staged<R: Read + ?Sized>(temp_path: &Path, reader: &mut R) -> StorageResult<SystemTime> {
    let mut file =
        File::create(temp_path).map_err(|e| StorageError::from_io(e, temp_path.to_path_buf()))?;

    io::copy(reader, &mut file).map_err(|e| StorageError::from_io(e, temp_path.to_path_buf()))?;
    file.flush()
        .map_err(|e| StorageError::from_io(e, temp_path.to_path_buf()))?;

    let stamp = SystemTime::now();
    file.set_modified(stamp)
        .map_err(|e| StorageError::from_io(e, temp_path.to_path_buf()))?;

    // Sync to disk before rename
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.to_path_buf()))?;

    Ok(stamp)
}

/// Unique dot-prefixed sibling of `path` used to stage a write
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = format!(".{}.{}.tmp", name, Uuid::new_v4().simple());
    match path.parent() {
        Some(parent) => parent.join(staged),
        None => PathBuf::from(staged),
    }
}

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_dir(path: &Path) -> StorageResult<()> {
    fs::create_dir_all(path).map_err(|source| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = StoreLayout::new("/data");
        let id = Identity { epoch: 10, random: 20 };

        assert_eq!(layout.content_dir(&id), PathBuf::from("/data").join(id.encode()));
        assert!(layout.mime_type_path(&id).ends_with(".datatype"));
        assert!(layout.revision_path(&id, 12345).ends_with("12345"));
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");

        atomic_write(&path, b"test data").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "test data");
    }

    #[test]
    fn test_atomic_copy_leaves_no_staged_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("42");

        atomic_copy(&path, &mut &b"hello"[..]).unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["42".to_string()]);
    }

    #[test]
    fn test_atomic_copy_stamps_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("7");

        let stamp = atomic_copy(&path, &mut &b"x"[..]).unwrap();

        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        let drift = stamp.duration_since(modified).unwrap_or_default();
        assert!(drift < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_failed_copy_removes_staged_file() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "boom"))
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("9");

        assert!(atomic_copy(&path, &mut Failing).is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staged = staging_path(Path::new("/cache/abc"));
        assert_eq!(staged.parent(), Some(Path::new("/cache")));
        assert!(staged
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(".abc."));
    }
}
