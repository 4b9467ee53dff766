//! Expression nodes.

use super::pattern::Pattern;
use super::pos::Pos;
use super::stmt::Statement;
use super::value::OzValue;
use crate::symtab::{AbsId, SymbolId};

#[derive(Debug, Clone)]
pub enum Expression {
    /// A variable reference by name, before the Namer.
    RawVariable(RawVariableExpr),
    /// A resolved variable reference.
    Variable(VariableExpr),
    Constant(ConstantExpr),
    Record(RecordExpr),
    /// Feature access `Record.Feature`, lowered to a builtin call.
    Dot(DotExpr),
    BinaryOp(BinaryOpExpr),
    UnaryOp(UnaryOpExpr),
    Call(CallExpr),
    If(IfExpr),
    Match(MatchExpr),
    Proc(ProcExpr),
    Fun(FunExpr),
    Functor(FunctorExpr),
    /// Closure allocation, introduced by the Flattener.
    CreateAbstraction(CreateAbstractionExpr),
}

impl Expression {
    pub fn pos(&self) -> &Pos {
        match self {
            Expression::RawVariable(e) => &e.pos,
            Expression::Variable(e) => &e.pos,
            Expression::Constant(e) => &e.pos,
            Expression::Record(e) => &e.pos,
            Expression::Dot(e) => &e.pos,
            Expression::BinaryOp(e) => &e.pos,
            Expression::UnaryOp(e) => &e.pos,
            Expression::Call(e) => &e.pos,
            Expression::If(e) => &e.pos,
            Expression::Match(e) => &e.pos,
            Expression::Proc(e) => &e.pos,
            Expression::Fun(e) => &e.pos,
            Expression::Functor(e) => &e.pos,
            Expression::CreateAbstraction(e) => &e.pos,
        }
    }

    /// True for the two node kinds allowed as operands after unnesting.
    pub fn is_simple(&self) -> bool {
        matches!(self, Expression::Variable(_) | Expression::Constant(_))
    }

    pub fn as_variable(&self) -> Option<SymbolId> {
        match self {
            Expression::Variable(e) => Some(e.symbol),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&OzValue> {
        match self {
            Expression::Constant(e) => Some(&e.value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawVariableExpr {
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct VariableExpr {
    pub symbol: SymbolId,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct ConstantExpr {
    pub value: OzValue,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct RecordExpr {
    pub label: Box<Expression>,
    pub fields: Vec<RecordField>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct RecordField {
    /// `None` for positional fields; Desugar assigns integer features.
    pub feature: Option<Expression>,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub struct DotExpr {
    pub record: Box<Expression>,
    pub feature: Box<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct BinaryOpExpr {
    pub left: Box<Expression>,
    pub op: String,
    pub right: Box<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct UnaryOpExpr {
    pub op: String,
    pub operand: Box<Expression>,
    pub pos: Pos,
}

/// `{Callee Arg1 ... ArgN}` in expression position. The Unnester rewrites
/// this into a call statement with a trailing output argument.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: Box<Expression>,
    pub args: Vec<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct IfExpr {
    pub condition: Box<Expression>,
    pub then_value: Box<Expression>,
    pub else_value: Box<Expression>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct MatchExpr {
    pub value: Box<Expression>,
    pub clauses: Vec<MatchExprClause>,
    pub else_value: Option<Box<Expression>>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct MatchExprClause {
    pub pattern: Pattern,
    pub value: Expression,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct ProcExpr {
    /// Printable name, used for diagnostics and generated identifiers.
    pub name: String,
    /// `RawVariable` formals before the Namer, `Variable` after.
    pub formals: Vec<Expression>,
    pub body: Box<Statement>,
    /// The abstraction this procedure compiles into, stamped by the Namer
    /// (or by whichever pass fabricates the node).
    pub abs: Option<AbsId>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct FunExpr {
    pub name: String,
    pub formals: Vec<Expression>,
    pub body: Box<Expression>,
    pub abs: Option<AbsId>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct FunctorExpr {
    pub name: String,
    pub requires: Vec<FunctorImport>,
    /// A `RawLocal` before the Namer, a `Local` after.
    pub prepare: Option<Box<Statement>>,
    pub imports: Vec<FunctorImport>,
    pub define: Option<Box<Statement>>,
    pub exports: Vec<FunctorExport>,
    pub abs: Option<AbsId>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct FunctorImport {
    /// `RawVariable` before the Namer, `Variable` after.
    pub var: Expression,
    /// The name the import record feature is derived from.
    pub name: String,
    /// Explicit `at '<url>'` location, if any.
    pub url: Option<String>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct FunctorExport {
    pub feature: OzValue,
    pub value: Expression,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct CreateAbstractionExpr {
    pub abs: AbsId,
    /// Captured variables, in the global order of the target abstraction.
    pub captured: Vec<Expression>,
    pub pos: Pos,
}
