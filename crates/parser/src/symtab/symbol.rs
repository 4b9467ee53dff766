//! Symbols.
//!
//! Symbols live in an arena owned by the program; the AST references them by
//! [`SymbolId`], so two occurrences of the same variable compare equal by
//! identity no matter what they were called in the source. Ids are arena
//! indices and therefore pairwise distinct across a compilation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ast::Pos;

use super::{AbsId, BuiltinId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableFlags {
    /// The symbol is a parameter of its owning abstraction.
    pub formal: bool,
    /// The symbol was minted by the compiler rather than written by the user.
    pub synthetic: bool,
    /// The symbol is captured by at least one nested abstraction. Bindings
    /// to captured variables must unify instead of overwriting the register.
    pub captured: bool,
}

#[derive(Debug, Clone)]
pub enum SymbolKind {
    Variable(VariableFlags),
    Builtin(BuiltinId),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// The abstraction the symbol belongs to. Set exactly once, when the
    /// declaring pass places the symbol; builtins have no owner.
    pub owner: Option<AbsId>,
    pub pos: Pos,
}

impl Symbol {
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable(_))
    }

    pub fn as_builtin(&self) -> Option<BuiltinId> {
        match self.kind {
            SymbolKind::Builtin(id) => Some(id),
            _ => None,
        }
    }

    pub fn flags(&self) -> VariableFlags {
        match self.kind {
            SymbolKind::Variable(flags) => flags,
            SymbolKind::Builtin(_) => VariableFlags::default(),
        }
    }

    pub fn is_captured(&self) -> bool {
        self.flags().captured
    }
}

/// The symbol arena.
///
/// The synthetic-name counter is atomic so that minting stays monotonic even
/// under defensive re-entrant use; the compilation pipeline itself is
/// strictly sequential.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    synthetic_counter: AtomicU32,
    builtin_symbols: HashMap<BuiltinId, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: Vec::new(),
            synthetic_counter: AtomicU32::new(0),
            builtin_symbols: HashMap::new(),
        }
    }

    pub fn fresh_variable(
        &mut self,
        name: impl Into<String>,
        owner: AbsId,
        flags: VariableFlags,
        pos: Pos,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: name.into(),
            kind: SymbolKind::Variable(flags),
            owner: Some(owner),
            pos,
        });
        id
    }

    /// Mint a synthetic variable named `x$N`.
    pub fn fresh_synthetic(&mut self, owner: AbsId, formal: bool) -> SymbolId {
        let n = self.synthetic_counter.fetch_add(1, Ordering::Relaxed);
        self.fresh_variable(
            format!("x${}", n),
            owner,
            VariableFlags {
                formal,
                synthetic: true,
                captured: false,
            },
            Pos::none(),
        )
    }

    /// Intern the symbol standing for a builtin procedure.
    pub fn builtin_symbol(&mut self, builtin: BuiltinId, name: &str) -> SymbolId {
        if let Some(&id) = self.builtin_symbols.get(&builtin) {
            return id;
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Builtin(builtin),
            owner: None,
            pos: Pos::none(),
        });
        self.builtin_symbols.insert(builtin, id);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn mark_captured(&mut self, id: SymbolId) {
        if let SymbolKind::Variable(flags) = &mut self.symbols[id.0 as usize].kind {
            flags.captured = true;
        }
    }

    /// Re-own a symbol as a formal parameter of `owner`.
    pub fn place_formal(&mut self, id: SymbolId, owner: AbsId) {
        let symbol = &mut self.symbols[id.0 as usize];
        symbol.owner = Some(owner);
        if let SymbolKind::Variable(flags) = &mut symbol.kind {
            flags.formal = true;
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| (SymbolId(i as u32), symbol))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let mut table = SymbolTable::new();
        let a = table.fresh_variable("X", AbsId(0), VariableFlags::default(), Pos::none());
        let b = table.fresh_variable("X", AbsId(0), VariableFlags::default(), Pos::none());
        assert_ne!(a, b);
        assert_eq!(table.get(a).name, table.get(b).name);
    }

    #[test]
    fn test_synthetic_names() {
        let mut table = SymbolTable::new();
        let a = table.fresh_synthetic(AbsId(0), false);
        let b = table.fresh_synthetic(AbsId(0), false);
        assert_eq!(table.get(a).name, "x$0");
        assert_eq!(table.get(b).name, "x$1");
        assert!(table.get(a).flags().synthetic);
    }

    #[test]
    fn test_builtin_symbols_are_interned() {
        let mut table = SymbolTable::new();
        let a = table.builtin_symbol(BuiltinId(3), "==");
        let b = table.builtin_symbol(BuiltinId(3), "==");
        let c = table.builtin_symbol(BuiltinId(4), ".");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.get(a).as_builtin(), Some(BuiltinId(3)));
        assert!(table.get(a).owner.is_none());
    }

    #[test]
    fn test_mark_captured() {
        let mut table = SymbolTable::new();
        let a = table.fresh_variable("X", AbsId(1), VariableFlags::default(), Pos::none());
        assert!(!table.get(a).is_captured());
        table.mark_captured(a);
        assert!(table.get(a).is_captured());
    }
}
