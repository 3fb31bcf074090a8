//! # Submission Module
//!
//! The uploaded artifact and the bounds applied while unpacking it.

use crate::Stage;
use std::path::{Path, PathBuf};

/// Default cap on the uploaded archive size (16 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Default cap on the sum of extracted file sizes (64 MiB).
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 64 * 1024 * 1024;

/// Default cap on the number of archive entries.
pub const DEFAULT_MAX_ENTRIES: usize = 4096;

/// One uploaded archive, alive for a single evaluation.
///
/// `upload_path` points at the temporary artifact holding the bytes. The
/// pipeline removes that file once evaluation ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Filename declared by the client (not the on-disk name).
    pub filename: String,
    /// Temporary artifact holding the uploaded bytes.
    pub upload_path: PathBuf,
    /// Stage selected alongside the upload.
    pub stage: Stage,
}

impl Submission {
    pub fn new(filename: impl Into<String>, upload_path: impl Into<PathBuf>, stage: Stage) -> Self {
        Self {
            filename: filename.into(),
            upload_path: upload_path.into(),
            stage,
        }
    }

    pub fn upload_path(&self) -> &Path {
        &self.upload_path
    }
}

/// Size bounds for uploads and their extracted contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_upload_bytes: u64,
    pub max_extracted_bytes: u64,
    pub max_entries: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}
