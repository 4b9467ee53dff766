//! Node builders for compiler-generated trees.
//!
//! The transform passes and the program assembler fabricate a lot of
//! resolved AST; these helpers keep that code readable and make sure every
//! generated node carries the position of the construct it was derived from.

use super::expr::*;
use super::pos::Pos;
use super::stmt::*;
use super::value::OzValue;
use crate::symtab::SymbolId;

pub fn var(symbol: SymbolId, pos: Pos) -> Expression {
    Expression::Variable(VariableExpr { symbol, pos })
}

pub fn raw_var(name: impl Into<String>, pos: Pos) -> Expression {
    Expression::RawVariable(RawVariableExpr {
        name: name.into(),
        pos,
    })
}

pub fn constant(value: OzValue, pos: Pos) -> Expression {
    Expression::Constant(ConstantExpr { value, pos })
}

pub fn atom(name: impl Into<String>, pos: Pos) -> Expression {
    constant(OzValue::atom(name), pos)
}

pub fn int(value: i64, pos: Pos) -> Expression {
    constant(OzValue::Int(value), pos)
}

pub fn bind(left: Expression, right: Expression, pos: Pos) -> Statement {
    Statement::Bind(BindStatement { left, right, pos })
}

pub fn call_stmt(callee: Expression, args: Vec<Expression>, pos: Pos) -> Statement {
    Statement::Call(CallStatement { callee, args, pos })
}

pub fn call_expr(callee: Expression, args: Vec<Expression>, pos: Pos) -> Expression {
    Expression::Call(CallExpr {
        callee: Box::new(callee),
        args,
        pos,
    })
}

pub fn dot(record: Expression, feature: Expression, pos: Pos) -> Expression {
    Expression::Dot(DotExpr {
        record: Box::new(record),
        feature: Box::new(feature),
        pos,
    })
}

pub fn if_stmt(condition: Expression, then_body: Statement, else_body: Statement, pos: Pos) -> Statement {
    Statement::If(IfStatement {
        condition,
        then_body: Box::new(then_body),
        else_body: Box::new(else_body),
        pos,
    })
}

pub fn local(declarations: Vec<SymbolId>, body: Statement, pos: Pos) -> Statement {
    Statement::Local(LocalStatement {
        declarations,
        body: Box::new(body),
        pos,
    })
}

/// A record with explicit constant features.
pub fn record(label: Expression, fields: Vec<(Expression, Expression)>, pos: Pos) -> Expression {
    Expression::Record(RecordExpr {
        label: Box::new(label),
        fields: fields
            .into_iter()
            .map(|(feature, value)| RecordField {
                feature: Some(feature),
                value,
            })
            .collect(),
        pos,
    })
}
