//! # Scratch Module
//!
//! Per-submission extraction directories and best-effort cleanup.
//!
//! A scratch directory lives at `<base>/<sha256 hex of the upload path>`.
//! The name is deterministic in the upload artifact path, and every upload
//! gets its own temporary artifact, so two in-flight submissions never share
//! a directory.
//!
//! [`ScratchDir`] removes its tree on drop. Cleanup never fails the request:
//! a missing path is fine, anything else is logged and swallowed.

use crate::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Guard over a scratch directory. The tree is deleted when this drops.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Directory name derived from the upload artifact path.
    pub fn name_for(upload_path: &Path) -> String {
        hex::encode(Sha256::digest(upload_path.as_os_str().as_encoded_bytes()))
    }

    /// Create the scratch directory for `upload_path` under `base`.
    ///
    /// A leftover directory with the same name (from a crashed run) is wiped
    /// and recreated empty.
    pub fn create(base: &Path, upload_path: &Path) -> Result<Self> {
        let path = base.join(Self::name_for(upload_path));
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "stale scratch directory, recreating");
                fs::remove_dir_all(&path)?;
                fs::create_dir(&path)?;
            }
            Err(e) => return Err(e.into()),
        }
        debug!(path = %path.display(), "scratch directory created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        remove_tree_quietly(&self.path);
    }
}

/// Delete the temporary upload artifact. Missing files are ignored.
pub fn remove_upload(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "upload artifact removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove upload artifact"),
    }
}

fn remove_tree_quietly(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "scratch directory removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove scratch directory"),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn name_is_deterministic_per_path() {
        let a = ScratchDir::name_for(Path::new("/tmp/uploads/.tmpA"));
        let b = ScratchDir::name_for(Path::new("/tmp/uploads/.tmpA"));
        let c = ScratchDir::name_for(Path::new("/tmp/uploads/.tmpB"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn drop_removes_tree() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(base.path(), Path::new("upload-1")).unwrap();
            fs::create_dir_all(scratch.path().join("src/nested")).unwrap();
            fs::write(scratch.path().join("src/nested/main.c"), "int main;").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn drop_tolerates_missing_directory() {
        let base = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(base.path(), Path::new("upload-2")).unwrap();
        fs::remove_dir_all(scratch.path()).unwrap();
        drop(scratch);
        assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[test]
    fn stale_directory_is_recreated_empty() {
        let base = tempfile::tempdir().unwrap();
        let stale = base.path().join(ScratchDir::name_for(Path::new("upload-3")));
        fs::create_dir(&stale).unwrap();
        fs::write(stale.join("leftover"), "x").unwrap();

        let scratch = ScratchDir::create(base.path(), Path::new("upload-3")).unwrap();
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn distinct_uploads_get_distinct_directories() {
        let base = tempfile::tempdir().unwrap();
        let a = ScratchDir::create(base.path(), Path::new("upload-a")).unwrap();
        let b = ScratchDir::create(base.path(), Path::new("upload-b")).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn remove_upload_ignores_missing_file() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("etapa1.tgz");
        fs::write(&file, b"data").unwrap();

        remove_upload(&file);
        assert!(!file.exists());
        remove_upload(&file);
    }
}
