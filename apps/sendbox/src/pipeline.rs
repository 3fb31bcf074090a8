//! Evaluation pipeline.
//!
//! `Received → Validating → Grading → Reporting → CleanedUp`
//!
//! The upload artifact and the scratch directory are owned by a [`Cleanup`]
//! guard from the moment validation starts. The guard is dropped on the
//! blocking pool once the result is built, or inline if the request future is
//! cancelled, so both paths are always removed.

use crate::config::EvaluationConfig;
use crate::grader::Grader;
use sendbox_core::{
    EvaluationResult, ScratchDir, StructureOutcome, Submission, remove_upload, validate_structure,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};

/// Runs submissions through validation and grading.
#[derive(Clone)]
pub struct Evaluator {
    config: Arc<EvaluationConfig>,
    grader: Arc<dyn Grader>,
}

impl Evaluator {
    pub fn new(config: EvaluationConfig, grader: Arc<dyn Grader>) -> Self {
        Self {
            config: Arc::new(config),
            grader,
        }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Evaluate one submission. Takes ownership of its upload artifact.
    pub async fn evaluate(&self, submission: Submission) -> EvaluationResult {
        let span = info_span!(
            "evaluate",
            stage = %submission.stage,
            filename = %submission.filename
        );
        self.run(submission).instrument(span).await
    }

    async fn run(&self, submission: Submission) -> EvaluationResult {
        let stage = submission.stage;
        let filename = submission.filename.clone();
        let scratch_path = self
            .config
            .upload_dir
            .join(ScratchDir::name_for(submission.upload_path()));

        let mut cleanup = Cleanup {
            upload: submission.upload_path.clone(),
            scratch: None,
        };

        // Validating
        let config = Arc::clone(&self.config);
        let validated = tokio::task::spawn_blocking(move || {
            let scratch = ScratchDir::create(&config.upload_dir, submission.upload_path())?;
            let outcome = validate_structure(&submission, scratch.path(), &config.limits);
            Ok::<_, sendbox_core::SendboxError>((scratch, outcome))
        })
        .await;

        let structure = match validated {
            Ok(Ok((scratch, outcome))) => {
                cleanup.scratch = Some(scratch);
                outcome
            }
            Ok(Err(e)) => {
                error!(error = %e, "could not prepare scratch directory");
                StructureOutcome::ExtractionFailed
            }
            Err(e) => {
                error!(error = %e, "validation task failed");
                StructureOutcome::ExtractionFailed
            }
        };

        // Grading
        let tests_passed = if self.config.skip_grading_on_invalid && !structure.is_valid() {
            info!(?structure, "structure invalid, grading skipped");
            false
        } else {
            self.grader.grade(stage, &scratch_path).await
        };

        // Reporting
        let result = EvaluationResult::new(stage, filename, structure, tests_passed);
        info!(
            structure_valid = result.structure_valid,
            tests_passed = result.tests_passed,
            "evaluation finished"
        );

        // CleanedUp
        if let Err(e) = tokio::task::spawn_blocking(move || drop(cleanup)).await {
            error!(error = %e, "cleanup task failed");
        }

        result
    }
}

/// Removes the upload artifact and scratch tree when dropped.
struct Cleanup {
    upload: PathBuf,
    scratch: Option<ScratchDir>,
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        drop(self.scratch.take());
        remove_upload(&self.upload);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sendbox_core::Stage;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGrader {
        pass: bool,
        calls: Mutex<Vec<(Stage, PathBuf, bool)>>,
    }

    #[async_trait]
    impl Grader for RecordingGrader {
        async fn grade(&self, stage: Stage, scratch: &Path) -> bool {
            let existed = scratch.is_dir();
            self.calls.lock().unwrap().push((stage, scratch.to_path_buf(), existed));
            self.pass
        }
    }

    #[tokio::test]
    async fn corrupt_upload_still_graded_and_cleaned() {
        let temp = tempfile::tempdir().unwrap();
        let upload = temp.path().join("upload-x");
        std::fs::write(&upload, b"garbage").unwrap();

        let grader = Arc::new(RecordingGrader {
            pass: true,
            ..RecordingGrader::default()
        });
        let evaluator = Evaluator::new(EvaluationConfig::new(temp.path()), grader.clone());

        let result = evaluator
            .evaluate(Submission::new("etapa2.tgz", &upload, Stage::Etapa2))
            .await;

        assert_eq!(result.structure, StructureOutcome::ExtractionFailed);
        assert!(result.tests_passed);

        let calls = grader.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Stage::Etapa2);
        assert!(calls[0].2, "scratch dir should exist while grading");
        assert!(!calls[0].1.exists());
        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn skip_grading_on_invalid() {
        let temp = tempfile::tempdir().unwrap();
        let upload = temp.path().join("upload-y");
        std::fs::write(&upload, b"garbage").unwrap();

        let grader = Arc::new(RecordingGrader {
            pass: true,
            ..RecordingGrader::default()
        });
        let mut config = EvaluationConfig::new(temp.path());
        config.skip_grading_on_invalid = true;
        let evaluator = Evaluator::new(config, grader.clone());

        let result = evaluator
            .evaluate(Submission::new("wrong.tgz", &upload, Stage::Etapa1))
            .await;

        assert_eq!(result.structure, StructureOutcome::FilenameMismatch);
        assert!(!result.tests_passed);
        assert!(grader.calls.lock().unwrap().is_empty());
        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn missing_upload_dir_is_structural_failure() {
        let temp = tempfile::tempdir().unwrap();
        let upload = temp.path().join("upload-z");
        std::fs::write(&upload, b"garbage").unwrap();

        let grader = Arc::new(RecordingGrader::default());
        let evaluator = Evaluator::new(
            EvaluationConfig::new(temp.path().join("does/not/exist")),
            grader,
        );

        let result = evaluator
            .evaluate(Submission::new("etapa1.tgz", &upload, Stage::Etapa1))
            .await;

        assert!(!result.structure_valid);
        assert!(!upload.exists());
    }
}
