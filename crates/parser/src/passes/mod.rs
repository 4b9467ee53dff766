//! The transform pipeline.
//!
//! A fixed sequence of passes lowers the named tree into a flat,
//! closure-converted form ready for code generation:
//!
//! 1. Namer: resolve names to symbols.
//! 2. DesugarFunctor: functors become import-record to export-record
//!    procedures.
//! 3. DesugarClass: class lowering (no class nodes in the bootstrap
//!    subset, kept as a pipeline stage).
//! 4. Desugar: operators, functions, `for`, `thread`, feature access.
//! 5. PatternMatcher: `case` becomes a decision tree of tests and binds.
//! 6. ConstantFolding: fold builtin applications of constants.
//! 7. Unnester: A-normal form.
//! 8. Flattener: closure conversion into top-level abstractions.
//!
//! Each pass runs to completion and records user errors on the program;
//! the pipeline aborts between passes as soon as any exist.

mod constant_folding;
mod desugar;
mod desugar_class;
mod desugar_functor;
mod flattener;
mod namer;
mod pattern_matcher;
mod unnester;

pub use constant_folding::ConstantFolding;
pub use desugar::Desugar;
pub use desugar_class::DesugarClass;
pub use desugar_functor::DesugarFunctor;
pub use flattener::Flattener;
pub use namer::Namer;
pub use pattern_matcher::PatternMatcher;
pub use unnester::Unnester;

use crate::error::{FrontError, FrontResult};
use crate::symtab::Program;

pub trait Pass {
    fn name(&self) -> &'static str;
    fn run(&mut self, program: &mut Program);
}

pub fn passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(Namer),
        Box::new(DesugarFunctor),
        Box::new(DesugarClass),
        Box::new(Desugar),
        Box::new(PatternMatcher),
        Box::new(ConstantFolding),
        Box::new(Unnester),
        Box::new(Flattener),
    ]
}

/// Run the whole pipeline over `program.raw_code`.
pub fn run_pipeline(program: &mut Program) -> FrontResult<()> {
    for mut pass in passes() {
        pass.run(program);
        if program.has_errors() {
            return Err(FrontError::Semantic(program.errors.clone()));
        }
    }
    Ok(())
}
