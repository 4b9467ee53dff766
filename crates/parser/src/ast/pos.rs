//! Source positions.
//!
//! Every AST node carries a [`Pos`]. Positions are file/line/column records
//! rather than byte ranges because the base-environment build merges several
//! source files into one tree, and diagnostics must keep pointing at the
//! file the node came from.

use std::fmt;
use std::sync::Arc;

/// A source position: file, 1-based line, 1-based column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pos {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Pos { file, line, column }
    }

    /// Position of compiler-generated nodes.
    pub fn none() -> Self {
        Pos {
            file: Arc::from(""),
            line: 0,
            column: 0,
        }
    }

    /// True for positions created with [`Pos::none`].
    pub fn is_none(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "<generated>")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let pos = Pos::new(Arc::from("Foo.oz"), 3, 7);
        assert_eq!(pos.to_string(), "Foo.oz:3:7");
    }

    #[test]
    fn test_none_is_none() {
        assert!(Pos::none().is_none());
        assert!(!Pos::new(Arc::from("x"), 1, 1).is_none());
    }
}
