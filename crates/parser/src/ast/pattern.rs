//! Match patterns.

use super::pos::Pos;
use super::value::OzValue;
use crate::symtab::SymbolId;

#[derive(Debug, Clone)]
pub enum Pattern {
    Wildcard(WildcardPattern),
    Capture(CapturePattern),
    Literal(LiteralPattern),
    Record(RecordPattern),
}

impl Pattern {
    pub fn pos(&self) -> &Pos {
        match self {
            Pattern::Wildcard(p) => &p.pos,
            Pattern::Capture(p) => &p.pos,
            Pattern::Literal(p) => &p.pos,
            Pattern::Record(p) => &p.pos,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WildcardPattern {
    pub pos: Pos,
}

/// A variable binding; the Namer mints a fresh symbol for it.
#[derive(Debug, Clone)]
pub struct CapturePattern {
    pub name: String,
    pub symbol: Option<SymbolId>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct LiteralPattern {
    pub value: OzValue,
    pub pos: Pos,
}

/// `label(f1:P1 ... fn:Pn)`, optionally open (`label(f1:P1 ...)`).
#[derive(Debug, Clone)]
pub struct RecordPattern {
    pub label: OzValue,
    pub fields: Vec<PatternField>,
    /// An open pattern only requires the listed features to be present.
    pub open: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct PatternField {
    /// `None` for positional fields; Desugar assigns integer features.
    pub feature: Option<OzValue>,
    pub pattern: Pattern,
}
