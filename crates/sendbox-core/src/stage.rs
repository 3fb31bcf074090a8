//! # Stage Module
//!
//! The six assignment stages a submission can target.

use crate::{Result, SendboxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An assignment stage ("etapa").
///
/// Serialized as its lowercase identifier (`"etapa1"` .. `"etapa6"`), which is
/// also the exact argument handed to the grading script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Etapa1,
    Etapa2,
    Etapa3,
    Etapa4,
    Etapa5,
    Etapa6,
}

impl Stage {
    /// Every stage, in order.
    pub const ALL: [Stage; 6] = [
        Stage::Etapa1,
        Stage::Etapa2,
        Stage::Etapa3,
        Stage::Etapa4,
        Stage::Etapa5,
        Stage::Etapa6,
    ];

    /// The stage identifier, e.g. `"etapa3"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Etapa1 => "etapa1",
            Stage::Etapa2 => "etapa2",
            Stage::Etapa3 => "etapa3",
            Stage::Etapa4 => "etapa4",
            Stage::Etapa5 => "etapa5",
            Stage::Etapa6 => "etapa6",
        }
    }

    /// The only filename accepted for this stage: `<stage>.tgz`.
    pub fn expected_filename(self) -> String {
        format!("{}.tgz", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = SendboxError;

    /// Exact, case-sensitive match on the identifier.
    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| SendboxError::InvalidStage(s.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
