//! Diagnostics and frontend errors.
//!
//! Semantic problems are *diagnostics*: they accumulate on the program while
//! a pass runs, and the pipeline aborts between passes when any exist. Parse
//! failures and internal invariant violations are hard errors.

mod diagnostic;
mod formatter;

pub use diagnostic::{Diagnostic, DiagnosticList};
pub use formatter::render_diagnostic;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontError {
    #[error("{}: {}", .0.pos, .0.message)]
    Parse(Diagnostic),

    #[error("compilation failed with {} error(s)", .0.len())]
    Semantic(DiagnosticList),

    #[error("internal compiler error: {0}")]
    Internal(String),
}

pub type FrontResult<T> = Result<T, FrontError>;
