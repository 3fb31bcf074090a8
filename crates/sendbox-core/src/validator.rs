//! # Validator Module
//!
//! Structural checks on an uploaded submission:
//!
//! 1. The declared filename must be exactly `<stage>.tgz`
//! 2. The archive must unpack cleanly into the scratch directory
//! 3. `makefile` or `Makefile` must sit at the scratch directory root
//!
//! Each step short-circuits the ones after it. Nothing here fails the request:
//! every error becomes a [`StructureOutcome`].

use crate::{Limits, Result, SendboxError, Submission};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

/// Build-control filenames accepted at the archive root. Case-sensitive.
pub const BUILD_FILES: [&str; 2] = ["makefile", "Makefile"];

/// Why a submission passed or failed the structural check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureOutcome {
    Valid,
    FilenameMismatch,
    ExtractionFailed,
    MissingBuildFile,
}

impl StructureOutcome {
    pub fn is_valid(self) -> bool {
        self == StructureOutcome::Valid
    }
}

/// Exact comparison of the declared filename with `<stage>.tgz`.
pub fn filename_matches(filename: &str, stage: crate::Stage) -> bool {
    filename == stage.expected_filename()
}

/// Unpack a gzip-compressed tarball into `dest`.
///
/// Enforces `limits` on the compressed size, the entry count and the sum of
/// entry sizes. Entries that would escape `dest` abort the extraction.
/// Returns the number of entries unpacked.
pub fn extract_archive(archive: &Path, dest: &Path, limits: &Limits) -> Result<usize> {
    let file = File::open(archive)?;
    let compressed = file.metadata()?.len();
    if compressed > limits.max_upload_bytes {
        return Err(SendboxError::LimitExceeded(format!(
            "archive is {} bytes, limit is {}",
            compressed, limits.max_upload_bytes
        )));
    }

    let mut tarball = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut count = 0usize;
    let mut total_bytes = 0u64;

    for entry in tarball.entries()? {
        let mut entry = entry?;

        count += 1;
        if count > limits.max_entries {
            return Err(SendboxError::LimitExceeded(format!(
                "more than {} entries",
                limits.max_entries
            )));
        }

        total_bytes = total_bytes.saturating_add(entry.size());
        if total_bytes > limits.max_extracted_bytes {
            return Err(SendboxError::LimitExceeded(format!(
                "extracted contents exceed {} bytes",
                limits.max_extracted_bytes
            )));
        }

        let entry_path = entry.path()?.display().to_string();
        if !entry.unpack_in(dest)? {
            return Err(SendboxError::UnsafePath(entry_path));
        }
    }

    debug!(entries = count, bytes = total_bytes, dest = %dest.display(), "archive extracted");
    Ok(count)
}

/// True iff a regular file named exactly `makefile` or `Makefile` exists
/// directly in `dir`.
///
/// Names are compared from the directory listing rather than probed with
/// `Path::exists`, so case-insensitive filesystems do not accept `MAKEFILE`.
/// Symlinks do not count.
pub fn has_build_file(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    entries.filter_map(|entry| entry.ok()).any(|entry| {
        let name = entry.file_name();
        BUILD_FILES.iter().any(|build| name == *build)
            && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
    })
}

/// Run the full structural check for `submission`, extracting into `scratch`.
pub fn validate_structure(
    submission: &Submission,
    scratch: &Path,
    limits: &Limits,
) -> StructureOutcome {
    if !filename_matches(&submission.filename, submission.stage) {
        info!(
            filename = %submission.filename,
            expected = %submission.stage.expected_filename(),
            "filename does not match stage"
        );
        return StructureOutcome::FilenameMismatch;
    }

    if let Err(e) = extract_archive(submission.upload_path(), scratch, limits) {
        warn!(filename = %submission.filename, error = %e, "archive extraction failed");
        return StructureOutcome::ExtractionFailed;
    }

    if has_build_file(scratch) {
        StructureOutcome::Valid
    } else {
        info!(filename = %submission.filename, "no makefile at archive root");
        StructureOutcome::MissingBuildFile
    }
}

// =============================================================================
// TESTS
// =============================================================================
