//! External grader invocation.
//!
//! The grader is a capability: given a stage and the submission's scratch
//! directory, answer pass/fail. [`ScriptGrader`] shells out to the grading
//! script; tests plug in their own implementation.
//!
//! On unix the script runs as the leader of its own process group. Once it
//! exits, times out, or the grading future is dropped, the whole group is
//! killed, so nothing the script started outlives the run.

use crate::config::{GraderConfig, SCRATCH_DIR_ENV};
use async_trait::async_trait;
use sendbox_core::Stage;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bytes of each output stream kept for the debug log. The rest is drained.
pub const MAX_GRADER_OUTPUT: u64 = 64 * 1024;

/// How long to wait for the output readers once the group is dead.
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Decides whether a submission passes the stage's tests.
///
/// Implementations never fail: any problem is a `false`.
#[async_trait]
pub trait Grader: Send + Sync {
    async fn grade(&self, stage: Stage, scratch: &Path) -> bool;
}

/// Runs `<program> [args...] <stage>` and maps exit status 0 to a pass.
#[derive(Debug, Clone)]
pub struct ScriptGrader {
    config: GraderConfig,
}

impl ScriptGrader {
    pub fn new(config: GraderConfig) -> Self {
        Self { config }
    }

    fn command(&self, stage: Stage, scratch: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(stage.as_str())
            .env(SCRATCH_DIR_ENV, scratch)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.config.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl Grader for ScriptGrader {
    async fn grade(&self, stage: Stage, scratch: &Path) -> bool {
        let start = Instant::now();

        let mut child = match self.command(stage, scratch).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    program = %self.config.program.display(),
                    error = %e,
                    "failed to launch grader"
                );
                return false;
            }
        };
        let mut group = ProcessGroup { pgid: child.id() };

        let stdout = tokio::spawn(capture(child.stdout.take()));
        let stderr = tokio::spawn(capture(child.stderr.take()));

        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;
        group.kill();

        let status = match waited {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!(%stage, error = %e, "grader wait failed");
                None
            }
            Err(_) => {
                warn!(%stage, timeout_secs = self.config.timeout.as_secs(), "grader timed out");
                None
            }
        };
        if status.is_none() {
            reap(&mut child).await;
        }

        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;
        debug!(
            %stage,
            stdout = %String::from_utf8_lossy(&stdout),
            stderr = %String::from_utf8_lossy(&stderr),
            "grader output"
        );

        let Some(status) = status else {
            return false;
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(%stage, %status, elapsed_ms, "grader finished");

        status.success()
    }
}

/// Kills the grader's process group, at the latest when dropped.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "grader already gone");
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "grader process group killed"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "failed to kill grader process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Keep the first [`MAX_GRADER_OUTPUT`] bytes of `pipe` and discard the rest,
/// so the script never blocks on a full pipe.
async fn capture<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let Some(mut pipe) = pipe else {
        return kept;
    };
    if let Err(e) = (&mut pipe).take(MAX_GRADER_OUTPUT).read_to_end(&mut kept).await {
        debug!(error = %e, "grader output read failed");
        return kept;
    }
    if let Err(e) = tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await {
        debug!(error = %e, "grader output drain failed");
    }
    kept
}

/// A process that left the group can hold the pipe open; give up on it.
async fn collect(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    let abort = handle.abort_handle();
    match tokio::time::timeout(OUTPUT_GRACE, handle).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            debug!(error = %e, "grader output task failed");
            Vec::new()
        }
        Err(_) => {
            abort.abort();
            Vec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str, timeout: Duration) -> ScriptGrader {
        ScriptGrader::new(GraderConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string(), "grader".to_string()],
            workdir: None,
            timeout,
        })
    }

    #[tokio::test]
    async fn zero_exit_passes() {
        let grader = sh("exit 0", Duration::from_secs(10));
        assert!(grader.grade(Stage::Etapa1, Path::new("/nonexistent")).await);
    }

    #[tokio::test]
    async fn nonzero_exit_fails() {
        let grader = sh("exit 3", Duration::from_secs(10));
        assert!(!grader.grade(Stage::Etapa1, Path::new("/nonexistent")).await);
    }

    #[tokio::test]
    async fn stage_is_last_argument() {
        let grader = sh(r#"test "$#" -eq 1 && test "$1" = etapa4"#, Duration::from_secs(10));
        assert!(grader.grade(Stage::Etapa4, Path::new("/nonexistent")).await);
        assert!(!grader.grade(Stage::Etapa5, Path::new("/nonexistent")).await);
    }

    #[tokio::test]
    async fn scratch_dir_is_exported() {
        let grader = sh(
            r#"test "$SENDBOX_SCRATCH_DIR" = /tmp/scratch-xyz"#,
            Duration::from_secs(10),
        );
        assert!(grader.grade(Stage::Etapa2, Path::new("/tmp/scratch-xyz")).await);
    }

    #[tokio::test]
    async fn launch_failure_fails() {
        let grader = ScriptGrader::new(GraderConfig {
            program: PathBuf::from("/definitely/not/a/grader.sh"),
            ..GraderConfig::default()
        });
        assert!(!grader.grade(Stage::Etapa1, Path::new("/nonexistent")).await);
    }

    #[tokio::test]
    async fn timeout_fails() {
        let grader = sh("sleep 5", Duration::from_millis(200));
        let start = Instant::now();
        assert!(!grader.grade(Stage::Etapa6, Path::new("/nonexistent")).await);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn workdir_is_applied() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("marker"), "x").unwrap();
        let grader = ScriptGrader::new(GraderConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "test -f marker".to_string(), "grader".to_string()],
            workdir: Some(temp.path().to_path_buf()),
            timeout: Duration::from_secs(10),
        });
        assert!(grader.grade(Stage::Etapa3, Path::new("/nonexistent")).await);
    }

    #[tokio::test]
    async fn timeout_kills_whole_process_tree() {
        let temp = tempfile::tempdir().unwrap();
        let marker = temp.path().join("late");
        let script = format!("(sleep 1; touch '{}'); true", marker.display());
        let grader = sh(&script, Duration::from_millis(300));

        assert!(!grader.grade(Stage::Etapa5, Path::new("/nonexistent")).await);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "subprocess outlived the grader timeout");
    }

    #[tokio::test]
    async fn background_jobs_die_with_the_grader() {
        let temp = tempfile::tempdir().unwrap();
        let marker = temp.path().join("late");
        let script = format!("(sleep 1; touch '{}') & exit 0", marker.display());
        let grader = sh(&script, Duration::from_secs(10));

        let start = Instant::now();
        assert!(grader.grade(Stage::Etapa1, Path::new("/nonexistent")).await);
        assert!(start.elapsed() < Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "background job outlived the grader");
    }

    #[tokio::test]
    async fn chatty_grader_still_reports_status() {
        let passing = sh("head -c 4000000 /dev/zero; exit 0", Duration::from_secs(10));
        assert!(passing.grade(Stage::Etapa2, Path::new("/nonexistent")).await);

        let failing = sh("head -c 4000000 /dev/zero >&2; exit 4", Duration::from_secs(10));
        assert!(!failing.grade(Stage::Etapa2, Path::new("/nonexistent")).await);
    }

    #[tokio::test]
    async fn captured_output_is_capped() {
        let noise = vec![b'x'; 1 << 20];
        let kept = capture(Some(&noise[..])).await;
        assert_eq!(kept.len() as u64, MAX_GRADER_OUTPUT);

        let empty = capture(None::<&[u8]>).await;
        assert!(empty.is_empty());
    }
}
