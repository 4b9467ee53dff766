//! Class lowering.
//!
//! The bootstrap subset has no class syntax, so there is nothing to lower;
//! the stage is kept so the pipeline order matches the full compiler, where
//! classes turn into method-table records and dispatch procedures between
//! functor lowering and general desugaring.

use crate::symtab::Program;

use super::Pass;

pub struct DesugarClass;

impl Pass for DesugarClass {
    fn name(&self) -> &'static str {
        "desugar-class"
    }

    fn run(&mut self, _program: &mut Program) {}
}
