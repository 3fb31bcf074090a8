//! Shared fixtures for sendbox integration tests.

#![allow(clippy::unwrap_used, dead_code)]

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use sendbox::grader::Grader;
use sendbox_core::Stage;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Build an in-memory `.tgz` holding `files`.
pub fn tgz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A project archive with a root Makefile.
pub fn project_tgz() -> Vec<u8> {
    tgz_bytes(&[
        ("Makefile", b"all:\n\tcc -o etapa main.c\n"),
        ("main.c", b"int main(void) { return 0; }\n"),
    ])
}

/// Top-level entries of `dir`. Scratch trees and upload artifacts both sit at
/// the top level, so empty means fully cleaned up.
pub fn leftovers(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            found.push(entry.path());
        }
    }
    found
}

/// One grader call as observed by [`FakeGrader`].
#[derive(Debug, Clone)]
pub struct GradeCall {
    pub stage: Stage,
    pub scratch: PathBuf,
    /// Files present at the scratch root while grading.
    pub scratch_files: Vec<String>,
}

/// Grader double with a fixed verdict that records its calls.
#[derive(Debug, Default)]
pub struct FakeGrader {
    pub pass: bool,
    pub calls: Mutex<Vec<GradeCall>>,
}

impl FakeGrader {
    pub fn passing() -> Self {
        Self {
            pass: true,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<GradeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Grader for FakeGrader {
    async fn grade(&self, stage: Stage, scratch: &Path) -> bool {
        let mut scratch_files: Vec<String> = std::fs::read_dir(scratch)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        scratch_files.sort();

        self.calls.lock().unwrap().push(GradeCall {
            stage,
            scratch: scratch.to_path_buf(),
            scratch_files,
        });
        self.pass
    }
}
