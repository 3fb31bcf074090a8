//! # Command Line Interface
//!
//! `sendbox serve` runs the upload server, `sendbox check` pushes a local
//! archive through the same pipeline, `sendbox stages` lists the stages.
//! Every flag can also be set through a `SENDBOX_*` environment variable.

use crate::api::{AppState, create_router};
use crate::config::{
    DEFAULT_BIND, DEFAULT_GRADER, DEFAULT_GRADER_TIMEOUT_SECS, DEFAULT_RATE_LIMIT,
    DEFAULT_UPLOAD_DIR, EvaluationConfig, GraderConfig, ServerConfig,
};
use crate::grader::{Grader, ScriptGrader};
use crate::pipeline::Evaluator;
use clap::{Args, Parser, Subcommand};
use sendbox_core::submission::{
    DEFAULT_MAX_ENTRIES, DEFAULT_MAX_EXTRACTED_BYTES, DEFAULT_MAX_UPLOAD_BYTES,
};
use sendbox_core::{Limits, Report, Stage, Submission};
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

pub type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Parser)]
#[command(name = "sendbox", version, about = "Submission checker for compiler project stages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP upload server
    Serve {
        #[arg(long, env = "SENDBOX_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,

        /// Accepted submissions per second (0 disables the limit)
        #[arg(long, env = "SENDBOX_RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT)]
        rate_limit: u32,

        #[command(flatten)]
        evaluation: EvaluationArgs,
    },

    /// Evaluate a local archive and print the report
    Check {
        /// Archive to evaluate; its filename is used as the declared name
        archive: PathBuf,

        #[arg(long)]
        stage: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        evaluation: EvaluationArgs,
    },

    /// List the stage identifiers
    Stages {
        #[arg(long)]
        json: bool,
    },
}

/// Flags shared by `serve` and `check`.
#[derive(Debug, Clone, Args)]
pub struct EvaluationArgs {
    /// Base directory for uploads and scratch directories
    #[arg(long, env = "SENDBOX_UPLOAD_DIR", default_value = DEFAULT_UPLOAD_DIR)]
    pub upload_dir: PathBuf,

    /// Grading script, invoked with the stage as its last argument
    #[arg(long, env = "SENDBOX_GRADER", default_value = DEFAULT_GRADER)]
    pub grader: PathBuf,

    /// Extra argument placed before the stage (repeatable)
    #[arg(long = "grader-arg", allow_hyphen_values = true)]
    pub grader_args: Vec<String>,

    /// Working directory for the grading script
    #[arg(long, env = "SENDBOX_GRADER_WORKDIR")]
    pub grader_workdir: Option<PathBuf>,

    #[arg(long, env = "SENDBOX_GRADER_TIMEOUT_SECS", default_value_t = DEFAULT_GRADER_TIMEOUT_SECS)]
    pub grader_timeout_secs: u64,

    #[arg(long, env = "SENDBOX_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,

    #[arg(long, env = "SENDBOX_MAX_EXTRACTED_BYTES", default_value_t = DEFAULT_MAX_EXTRACTED_BYTES)]
    pub max_extracted_bytes: u64,

    #[arg(long, env = "SENDBOX_MAX_ENTRIES", default_value_t = DEFAULT_MAX_ENTRIES)]
    pub max_entries: usize,

    /// Do not run the grader when the structural check fails
    #[arg(long, env = "SENDBOX_SKIP_GRADING_ON_INVALID")]
    pub skip_grading_on_invalid: bool,
}

impl EvaluationArgs {
    pub fn evaluation_config(&self) -> EvaluationConfig {
        EvaluationConfig {
            upload_dir: self.upload_dir.clone(),
            limits: Limits {
                max_upload_bytes: self.max_upload_bytes,
                max_extracted_bytes: self.max_extracted_bytes,
                max_entries: self.max_entries,
            },
            skip_grading_on_invalid: self.skip_grading_on_invalid,
        }
    }

    pub fn grader_config(&self) -> GraderConfig {
        GraderConfig {
            program: self.grader.clone(),
            args: self.grader_args.clone(),
            workdir: self.grader_workdir.clone(),
            timeout: Duration::from_secs(self.grader_timeout_secs),
        }
    }

    fn evaluator(&self) -> Evaluator {
        let grader: Arc<dyn Grader> = Arc::new(ScriptGrader::new(self.grader_config()));
        Evaluator::new(self.evaluation_config(), grader)
    }
}

/// Dispatch a parsed command line. Returns `false` when a checked
/// submission did not pass both checks.
pub async fn run(cli: Cli) -> CliResult<bool> {
    match cli.command {
        Commands::Serve {
            bind,
            rate_limit,
            evaluation,
        } => {
            let server = ServerConfig {
                bind,
                rate_limit_per_sec: rate_limit,
            };
            cmd_serve(&server, evaluation.evaluator()).await?;
            Ok(true)
        }
        Commands::Check {
            archive,
            stage,
            json,
            evaluation,
        } => {
            let report = cmd_check(&archive, &stage, json, &evaluation.evaluator()).await?;
            Ok(report.result.as_ref().is_some_and(|r| r.passed()))
        }
        Commands::Stages { json } => {
            cmd_stages(json)?;
            Ok(true)
        }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Serve the upload API until Ctrl-C.
pub async fn cmd_serve(server: &ServerConfig, evaluator: Evaluator) -> CliResult<()> {
    evaluator.config().prepare()?;

    let state = AppState::new(evaluator).with_rate_limit(server.rate_limit_per_sec);
    let router = create_router(state);

    let listener = TcpListener::bind(server.bind).await?;
    info!(addr = %listener.local_addr()?, "sendbox listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("sendbox stopped");
    Ok(())
}

/// Evaluate a local archive.
///
/// The archive is copied into the upload directory first: the pipeline
/// deletes its upload artifact, and that must never be the caller's file.
pub async fn cmd_check(
    archive: &Path,
    stage: &str,
    json: bool,
    evaluator: &Evaluator,
) -> CliResult<Report> {
    let stage: Stage = stage.parse()?;
    let filename = archive
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or("Archive path has no usable filename")?
        .to_string();

    let config = evaluator.config();
    config.prepare()?;
    let upload = copy_to_upload_dir(archive, &config.upload_dir)?;

    let result = evaluator
        .evaluate(Submission::new(filename, upload, stage))
        .await;
    let report = Report::from_result(result);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }

    Ok(report)
}

/// Print the stage identifiers.
pub fn cmd_stages(json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string(&Stage::ALL)?);
    } else {
        for stage in Stage::ALL {
            println!("{}", stage);
        }
    }
    Ok(())
}

fn copy_to_upload_dir(archive: &Path, dir: &Path) -> CliResult<PathBuf> {
    let mut source = File::open(archive)?;
    let mut temp = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".tgz")
        .tempfile_in(dir)?;
    std::io::copy(&mut source, temp.as_file_mut())?;
    Ok(temp.into_temp_path().keep()?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
