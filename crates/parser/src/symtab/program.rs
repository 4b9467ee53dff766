//! The program aggregate.
//!
//! A [`Program`] owns everything the pipeline works on: the symbol and
//! abstraction arenas, the builtin registry, the code being compiled and the
//! accumulated diagnostics. Passes mutate it in place and never raise on
//! user errors; the driver aborts between passes when diagnostics exist.

use indexmap::IndexSet;

use crate::ast::{Pos, Statement};
use crate::error::{Diagnostic, DiagnosticList};

use super::{
    AbsId, Abstraction, BuiltinRegistry, Symbol, SymbolId, SymbolTable, VariableFlags,
};

#[derive(Debug)]
pub struct Program {
    pub symbols: SymbolTable,
    pub abstractions: Vec<Abstraction>,
    pub builtins: BuiltinRegistry,
    /// The statement being compiled, before the Flattener distributes it
    /// into abstraction bodies.
    pub raw_code: Option<Statement>,
    pub errors: DiagnosticList,
    /// Names exported by the base environment. Filled from the base
    /// declarations file in module mode, or from the merged base functor
    /// exports when building the base environment itself.
    pub base_declarations: IndexSet<String>,
    pub is_base_environment: bool,
    /// Hidden frame owning the two environment variables below.
    pub env_abs: AbsId,
    pub top_level: AbsId,
    pub base_env_symbol: SymbolId,
    pub boot_mm_symbol: SymbolId,
}

impl Program {
    pub fn new(builtins: BuiltinRegistry) -> Self {
        let mut program = Program {
            symbols: SymbolTable::new(),
            abstractions: Vec::new(),
            builtins,
            raw_code: None,
            errors: DiagnosticList::new(),
            base_declarations: IndexSet::new(),
            is_base_environment: false,
            env_abs: AbsId(0),
            top_level: AbsId(0),
            base_env_symbol: SymbolId(0),
            boot_mm_symbol: SymbolId(0),
        };
        program.env_abs = program.new_abstraction("<environment>", Pos::none());
        program.top_level = program.new_abstraction("<top level>", Pos::none());
        program.base_env_symbol = program.new_local(program.env_abs, "Base", Pos::none());
        program.boot_mm_symbol = program.new_local(program.env_abs, "BootMM", Pos::none());
        program
    }

    pub fn new_abstraction(&mut self, name: impl Into<String>, pos: Pos) -> AbsId {
        let id = AbsId(self.abstractions.len() as u32);
        self.abstractions.push(Abstraction::new(id, name, pos));
        id
    }

    pub fn abstraction(&self, id: AbsId) -> &Abstraction {
        &self.abstractions[id.0 as usize]
    }

    pub fn abstraction_mut(&mut self, id: AbsId) -> &mut Abstraction {
        &mut self.abstractions[id.0 as usize]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        self.symbols.get(id)
    }

    /// Mint a formal parameter of `abs`.
    pub fn new_formal(&mut self, abs: AbsId, name: impl Into<String>, pos: Pos) -> SymbolId {
        let symbol = self.symbols.fresh_variable(
            name,
            abs,
            VariableFlags {
                formal: true,
                ..VariableFlags::default()
            },
            pos,
        );
        self.abstraction_mut(abs).formals.push(symbol);
        symbol
    }

    /// Mint a local variable of `abs`.
    pub fn new_local(&mut self, abs: AbsId, name: impl Into<String>, pos: Pos) -> SymbolId {
        let symbol = self
            .symbols
            .fresh_variable(name, abs, VariableFlags::default(), pos);
        self.abstraction_mut(abs).locals.insert(symbol);
        symbol
    }

    /// Mint a synthetic local `x$N` of `abs`.
    pub fn new_synthetic(&mut self, abs: AbsId) -> SymbolId {
        let symbol = self.symbols.fresh_synthetic(abs, false);
        self.abstraction_mut(abs).locals.insert(symbol);
        symbol
    }

    /// Mint a synthetic formal `x$N` of `abs`.
    pub fn new_synthetic_formal(&mut self, abs: AbsId) -> SymbolId {
        let symbol = self.symbols.fresh_synthetic(abs, true);
        self.abstraction_mut(abs).formals.push(symbol);
        symbol
    }

    /// Move an already-declared variable into `abs` as a formal parameter.
    /// Used when desugaring turns a binding construct into a fabricated
    /// procedure, as the `for` loop lowering does with the loop variable.
    pub fn adopt_as_formal(&mut self, abs: AbsId, symbol: SymbolId) {
        if let Some(old) = self.symbols.get(symbol).owner {
            self.abstraction_mut(old).locals.shift_remove(&symbol);
            self.abstraction_mut(old).formals.retain(|s| *s != symbol);
        }
        self.symbols.place_formal(symbol, abs);
        self.abstraction_mut(abs).formals.push(symbol);
    }

    /// Intern the symbol for a well-known builtin, reporting a diagnostic
    /// when the boot modules do not provide it.
    pub fn well_known(&mut self, module: &str, name: &str, pos: &Pos) -> Option<SymbolId> {
        match self.builtins.lookup(module, name) {
            Some(id) => Some(self.symbols.builtin_symbol(id, name)),
            None => {
                self.report(
                    format!("missing builtin {}.'{}'", module, name),
                    pos.clone(),
                );
                None
            }
        }
    }

    pub fn report(&mut self, message: impl Into<String>, pos: Pos) {
        self.errors.push(Diagnostic::new(message, pos));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Abstractions that compile to code areas, in creation order. The
    /// hidden environment frame never has a body.
    pub fn code_abstractions(&self) -> impl Iterator<Item = &Abstraction> {
        self.abstractions.iter().filter(|abs| abs.body.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_layout() {
        let program = Program::new(BuiltinRegistry::new());
        assert_ne!(program.env_abs, program.top_level);
        assert_eq!(
            program.symbol(program.base_env_symbol).owner,
            Some(program.env_abs)
        );
        assert_eq!(program.symbol(program.boot_mm_symbol).name, "BootMM");
        assert!(!program.has_errors());
    }

    #[test]
    fn test_formals_and_locals_are_placed() {
        let mut program = Program::new(BuiltinRegistry::new());
        let abs = program.new_abstraction("P", Pos::none());
        let x = program.new_formal(abs, "X", Pos::none());
        let t = program.new_synthetic(abs);

        assert_eq!(program.abstraction(abs).formals, vec![x]);
        assert!(program.abstraction(abs).locals.contains(&t));
        assert!(program.symbol(x).flags().formal);
        assert!(program.symbol(t).flags().synthetic);
        assert_eq!(program.symbol(t).owner, Some(abs));
    }

    #[test]
    fn test_missing_well_known_is_reported() {
        let mut program = Program::new(BuiltinRegistry::new());
        assert!(program.well_known("Value", "==", &Pos::none()).is_none());
        assert!(program.has_errors());
    }
}
