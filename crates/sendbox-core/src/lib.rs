//! # Sendbox Core
//!
//! Submission validation for the sendbox grading front-end.
//!
//! A submission is a `.tgz` archive uploaded for one of six stages
//! (`etapa1` .. `etapa6`). This crate owns everything that happens to it on
//! disk:
//!
//! - [`Stage`]: the closed set of stage identifiers
//! - [`ScratchDir`]: per-submission extraction directory, removed on drop
//! - [`validate_structure`]: filename check, extraction, build-file check
//! - [`Report`]: the status blocks shown to the student
//!
//! Running the external grader is NOT done here. The app layer owns process
//! spawning and feeds the outcome back into [`EvaluationResult`].

pub mod error;
pub mod report;
pub mod scratch;
pub mod stage;
pub mod submission;
pub mod validator;

pub use error::{Result, SendboxError};
pub use report::{EvaluationResult, Report, StatusCategory, StatusMessage};
pub use scratch::{ScratchDir, remove_upload};
pub use stage::Stage;
pub use submission::{Limits, Submission};
pub use validator::{
    StructureOutcome, extract_archive, filename_matches, has_build_file, validate_structure,
};
