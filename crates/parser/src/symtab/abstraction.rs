//! Abstractions.
//!
//! An abstraction is one compiled procedure body: its formals and locals map
//! to Y registers, its globals to G registers indexed by their position in
//! the global list. Abstractions are stored in an arena on the program and
//! addressed by [`AbsId`], which breaks the symbol/abstraction ownership
//! cycle.

use std::fmt;

use indexmap::IndexSet;

use crate::ast::{Pos, Statement};

use super::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsId(pub u32);

impl fmt::Display for AbsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

#[derive(Debug)]
pub struct Abstraction {
    pub id: AbsId,
    /// Printable name, also used to derive C++ identifiers.
    pub name: String,
    pub formals: Vec<SymbolId>,
    pub locals: IndexSet<SymbolId>,
    /// Captured variables in first-reference order; the position of a symbol
    /// in this set is its G register.
    pub globals: IndexSet<SymbolId>,
    /// The flat body, set by the Flattener.
    pub body: Option<Statement>,
    pub pos: Pos,
}

impl Abstraction {
    pub fn new(id: AbsId, name: impl Into<String>, pos: Pos) -> Self {
        Abstraction {
            id,
            name: name.into(),
            formals: Vec::new(),
            locals: IndexSet::new(),
            globals: IndexSet::new(),
            body: None,
            pos,
        }
    }

    pub fn arity(&self) -> usize {
        self.formals.len()
    }

    /// Record a captured variable, keeping first-reference order. Returns
    /// the G register index.
    pub fn add_global(&mut self, symbol: SymbolId) -> usize {
        self.globals.insert_full(symbol).0
    }

    pub fn global_index(&self, symbol: SymbolId) -> Option<usize> {
        self.globals.get_index_of(&symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_keep_first_reference_order() {
        let mut abs = Abstraction::new(AbsId(2), "P", Pos::none());
        assert_eq!(abs.add_global(SymbolId(7)), 0);
        assert_eq!(abs.add_global(SymbolId(3)), 1);
        assert_eq!(abs.add_global(SymbolId(7)), 0);
        assert_eq!(abs.global_index(SymbolId(3)), Some(1));
        assert_eq!(abs.global_index(SymbolId(9)), None);
    }
}
