//! Codegen error types.
//!
//! Everything here is an internal invariant violation: by the time code
//! generation runs, user errors have already aborted the pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("internal codegen error: {0}")]
    Internal(String),

    #[error("unfilled placeholder in code area {0}")]
    UnfilledHole(String),

    #[error("placeholder size mismatch: reserved {reserved} words, got {actual}")]
    HoleSizeMismatch { reserved: usize, actual: usize },
}

pub type CodegenResult<T> = Result<T, CodegenError>;

impl CodegenError {
    pub fn internal(message: impl Into<String>) -> Self {
        CodegenError::Internal(message.into())
    }
}
