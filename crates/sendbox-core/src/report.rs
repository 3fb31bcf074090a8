//! # Report Module
//!
//! Turns the two evaluation flags into the status blocks shown to students.
//!
//! Three blocks, each independent:
//! - submission metadata (stage + filename), always `info`
//! - structural validity, `success` or `error`
//! - grading result, `success` or `error`
//!
//! When nothing was uploaded there is no result, only a `warning` block.

use crate::{Stage, StructureOutcome};
use serde::{Deserialize, Serialize};

pub const STRUCTURE_OK: &str = "Estrutura do arquivo: OK!";
pub const STRUCTURE_NOT_OK: &str = "Estrutura do arquivo: Not OK!";
pub const TESTS_OK: &str = "Testes: OK!";
pub const TESTS_NOT_OK: &str = "Testes: Not OK!";
pub const NO_FILE: &str = "Nenhum arquivo enviado.";

/// Presentation category of a status block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    Success,
    Error,
    Warning,
    Info,
}

impl StatusCategory {
    /// Display color for the block.
    pub fn color(self) -> &'static str {
        match self {
            StatusCategory::Success => "green",
            StatusCategory::Error => "red",
            StatusCategory::Warning => "gray",
            StatusCategory::Info => "neutral",
        }
    }

    fn from_flag(ok: bool) -> Self {
        if ok {
            StatusCategory::Success
        } else {
            StatusCategory::Error
        }
    }
}

/// One rendered status block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub category: StatusCategory,
    pub text: String,
}

impl StatusMessage {
    pub fn new(category: StatusCategory, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
        }
    }
}

/// Outcome of evaluating one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub stage: Stage,
    pub filename: String,
    pub structure: StructureOutcome,
    pub structure_valid: bool,
    pub tests_passed: bool,
}

impl EvaluationResult {
    pub fn new(
        stage: Stage,
        filename: impl Into<String>,
        structure: StructureOutcome,
        tests_passed: bool,
    ) -> Self {
        Self {
            stage,
            filename: filename.into(),
            structure,
            structure_valid: structure.is_valid(),
            tests_passed,
        }
    }

    /// Both checks passed.
    pub fn passed(&self) -> bool {
        self.structure_valid && self.tests_passed
    }

    pub fn submission_message(&self) -> StatusMessage {
        StatusMessage::new(
            StatusCategory::Info,
            format!("Etapa: {} | Arquivo: {}", self.stage, self.filename),
        )
    }

    pub fn structure_message(&self) -> StatusMessage {
        let text = if self.structure_valid {
            STRUCTURE_OK
        } else {
            STRUCTURE_NOT_OK
        };
        StatusMessage::new(StatusCategory::from_flag(self.structure_valid), text)
    }

    pub fn tests_message(&self) -> StatusMessage {
        let text = if self.tests_passed { TESTS_OK } else { TESTS_NOT_OK };
        StatusMessage::new(StatusCategory::from_flag(self.tests_passed), text)
    }
}

/// Everything shown for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub submission: StatusMessage,
    pub structure: Option<StatusMessage>,
    pub tests: Option<StatusMessage>,
    pub result: Option<EvaluationResult>,
}

impl Report {
    /// Report for an evaluated submission.
    pub fn from_result(result: EvaluationResult) -> Self {
        Self {
            submission: result.submission_message(),
            structure: Some(result.structure_message()),
            tests: Some(result.tests_message()),
            result: Some(result),
        }
    }

    /// Report for a request that carried no file.
    pub fn no_file() -> Self {
        Self {
            submission: StatusMessage::new(StatusCategory::Warning, NO_FILE),
            structure: None,
            tests: None,
            result: None,
        }
    }

    /// Plain-text rendering for terminals.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("┌─────────────────────────────────────┐\n");
        output.push_str(&format!(
            "│ [{}] {}\n",
            tag(self.submission.category),
            self.submission.text
        ));
        for block in [&self.structure, &self.tests].into_iter().flatten() {
            output.push_str("├─────────────────────────────────────┤\n");
            output.push_str(&format!("│ [{}] {}\n", tag(block.category), block.text));
        }
        output.push_str("└─────────────────────────────────────┘\n");

        output
    }
}

fn tag(category: StatusCategory) -> &'static str {
    match category {
        StatusCategory::Success => "OK",
        StatusCategory::Error => "ERRO",
        StatusCategory::Warning => "AVISO",
        StatusCategory::Info => "INFO",
    }
}

// =============================================================================
// TESTS
// =============================================================================
