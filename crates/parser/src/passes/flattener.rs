//! Closure conversion.
//!
//! Distributes the unnested tree into the abstraction arena: every inline
//! procedure expression is replaced by a `CreateAbstraction` node and its
//! body becomes the body of its abstraction. Free variables are collected
//! bottom-up in first-reference order into the abstraction's global list,
//! and the captured-variable expressions left at the creation site make the
//! parent capture transitively when the variable is not its own.

use crate::ast::walk::{walk_expr, walk_stmt};
use crate::ast::*;
use crate::symtab::{AbsId, Program};

use super::Pass;

pub struct Flattener;

impl Pass for Flattener {
    fn name(&self) -> &'static str {
        "flattener"
    }

    fn run(&mut self, program: &mut Program) {
        if let Some(code) = program.raw_code.take() {
            let top_level = program.top_level;
            let mut rewriter = Rewriter { program: &mut *program };
            let body = rewriter.transform_stmt(code);
            collect_globals(program, top_level, &body);
            program.abstraction_mut(top_level).body = Some(body);
        }
    }
}

struct Rewriter<'p> {
    program: &'p mut Program,
}

impl Transformer for Rewriter<'_> {
    fn transform_stmt(&mut self, stmt: Statement) -> Statement {
        walk_stmt(self, stmt)
    }

    fn transform_expr(&mut self, expr: Expression) -> Expression {
        match expr {
            Expression::Proc(e) => {
                let pos = e.pos;
                let abs = match e.abs {
                    Some(abs) => abs,
                    None => {
                        self.program
                            .report("internal: procedure was not placed", pos.clone());
                        return Expression::Constant(ConstantExpr {
                            value: OzValue::Unit,
                            pos,
                        });
                    }
                };
                // Grandchildren first, so the child's captured lists are
                // complete before its globals are collected.
                let body = self.transform_stmt(*e.body);
                collect_globals(self.program, abs, &body);
                self.program.abstraction_mut(abs).body = Some(body);

                let captured = self
                    .program
                    .abstraction(abs)
                    .globals
                    .iter()
                    .map(|&symbol| build::var(symbol, pos.clone()))
                    .collect();
                Expression::CreateAbstraction(CreateAbstractionExpr {
                    abs,
                    captured,
                    pos,
                })
            }
            other => walk_expr(self, other),
        }
    }
}

/// Record every variable owned by another abstraction as a global of
/// `abs`, preserving first-reference order.
fn collect_globals(program: &mut Program, abs: AbsId, body: &Statement) {
    let mut collector = Collector { program, abs };
    collector.stmt(body);
}

struct Collector<'p> {
    program: &'p mut Program,
    abs: AbsId,
}

impl Collector<'_> {
    fn note(&mut self, symbol: crate::symtab::SymbolId) {
        let info = self.program.symbol(symbol);
        if !info.is_variable() {
            return;
        }
        if info.owner != Some(self.abs) {
            self.program.abstraction_mut(self.abs).add_global(symbol);
            self.program.symbols.mark_captured(symbol);
        }
    }

    fn stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Compound(s) => {
                for child in &s.statements {
                    self.stmt(child);
                }
            }
            Statement::Local(s) => self.stmt(&s.body),
            Statement::Bind(s) => {
                self.expr(&s.left);
                self.expr(&s.right);
            }
            Statement::Call(s) => {
                self.expr(&s.callee);
                for arg in &s.args {
                    self.expr(arg);
                }
            }
            Statement::If(s) => {
                self.expr(&s.condition);
                self.stmt(&s.then_body);
                self.stmt(&s.else_body);
            }
            Statement::Try(s) => {
                self.stmt(&s.body);
                self.expr(&s.catch_var);
                self.stmt(&s.catch_body);
            }
            Statement::Raise(s) => self.expr(&s.value),
            Statement::Skip(_) => {}
            Statement::RawLocal(_)
            | Statement::Match(_)
            | Statement::For(_)
            | Statement::Thread(_) => {
                self.program.report(
                    "internal: unexpected statement shape after unnesting",
                    stmt.pos().clone(),
                );
            }
        }
    }

    fn expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Variable(e) => self.note(e.symbol),
            Expression::Constant(_) => {}
            Expression::Record(e) => {
                self.expr(&e.label);
                for field in &e.fields {
                    if let Some(feature) = &field.feature {
                        self.expr(feature);
                    }
                    self.expr(&field.value);
                }
            }
            // The captured list references the variables in this
            // abstraction; the child body was already collected.
            Expression::CreateAbstraction(e) => {
                for captured in &e.captured {
                    self.expr(captured);
                }
            }
            other => {
                self.program.report(
                    "internal: unexpected expression shape after unnesting",
                    other.pos().clone(),
                );
            }
        }
    }
}
