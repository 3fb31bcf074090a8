//! Runtime configuration.
//!
//! Plain values built from CLI flags (see [`crate::cli`]) and passed down
//! explicitly. Nothing here is global.

use sendbox_core::Limits;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_GRADER: &str = "./sendboxgrupo.sh";
pub const DEFAULT_GRADER_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_RATE_LIMIT: u32 = 10;

/// Environment variable through which the grader learns the scratch path.
pub const SCRATCH_DIR_ENV: &str = "SENDBOX_SCRATCH_DIR";

/// Where uploads are staged and how they are bounded.
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Base directory for upload artifacts and scratch directories.
    pub upload_dir: PathBuf,
    pub limits: Limits,
    /// Skip the grader when the structural check fails.
    pub skip_grading_on_invalid: bool,
}

impl EvaluationConfig {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            limits: Limits::default(),
            skip_grading_on_invalid: false,
        }
    }

    /// Create the upload base directory. Called once at startup.
    pub fn prepare(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        info!(upload_dir = %self.upload_dir.display(), "upload directory ready");
        Ok(())
    }
}

/// How the external grading script is launched.
#[derive(Debug, Clone)]
pub struct GraderConfig {
    pub program: PathBuf,
    /// Arguments placed before the stage identifier.
    pub args: Vec<String>,
    /// Working directory for the script. `None` keeps the server's own.
    pub workdir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_GRADER),
            args: Vec::new(),
            workdir: None,
            timeout: Duration::from_secs(DEFAULT_GRADER_TIMEOUT_SECS),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Accepted submissions per second. Zero disables the limiter.
    pub rate_limit_per_sec: u32,
}
