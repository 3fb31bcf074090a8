//! # Error Module
//!
//! Error type shared by the validation pipeline.
//!
//! None of these errors is fatal to a request: the validator folds them into
//! a [`crate::StructureOutcome`], and cleanup logs and discards them.

use thiserror::Error;

/// Errors raised while handling a submission on disk.
#[derive(Debug, Error)]
pub enum SendboxError {
    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stage identifier outside `etapa1` .. `etapa6`.
    #[error("Invalid stage: {0:?} (expected one of etapa1..etapa6)")]
    InvalidStage(String),

    /// Archive exceeded one of the configured [`crate::Limits`].
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Archive entry would land outside the scratch directory.
    #[error("Unsafe archive entry: {0}")]
    UnsafePath(String),
}

/// Result alias for sendbox-core operations.
pub type Result<T> = std::result::Result<T, SendboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SendboxError = io.into();
        assert!(matches!(err, SendboxError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn invalid_stage_message_names_value() {
        let err = SendboxError::InvalidStage("etapa9".to_string());
        assert!(err.to_string().contains("etapa9"));
    }
}
