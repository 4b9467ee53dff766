//! Pattern-match compilation.
//!
//! Compiles `case` into a decision tree of conditionals over the well-known
//! value tests: a literal arm compares with `Value.'=='`, a record arm
//! checks `Value.isRecord`, the label, the width (closed patterns only) and
//! each feature with `Value.hasFeature` before extracting fields with
//! `Value.'.'` and binding subpatterns. A match without an `else` raises the
//! atom `matchFailure`.
//!
//! Match expressions are hoisted into match statements binding a synthetic
//! temporary first; conditional expressions containing one are lowered to
//! conditional statements so no arm is evaluated eagerly.

use crate::ast::walk::walk_stmt;
use crate::ast::*;
use crate::symtab::{AbsId, Program, SymbolId};

use super::Pass;

pub struct PatternMatcher;

impl Pass for PatternMatcher {
    fn name(&self) -> &'static str {
        "pattern-matcher"
    }

    fn run(&mut self, program: &mut Program) {
        if let Some(code) = program.raw_code.take() {
            let top_level = program.top_level;
            let mut rewriter = Rewriter {
                program: &mut *program,
                abs_stack: vec![top_level],
            };
            let code = rewriter.transform_stmt(code);
            program.raw_code = Some(code);
        }
    }
}

/// True when the expression contains a match expression outside of any
/// nested abstraction body.
fn contains_match(expr: &Expression) -> bool {
    match expr {
        Expression::Match(_) => true,
        Expression::Record(e) => e.fields.iter().any(|field| {
            field.feature.as_ref().is_some_and(contains_match) || contains_match(&field.value)
        }),
        Expression::Call(e) => contains_match(&e.callee) || e.args.iter().any(contains_match),
        Expression::If(e) => {
            contains_match(&e.condition)
                || contains_match(&e.then_value)
                || contains_match(&e.else_value)
        }
        Expression::Dot(e) => contains_match(&e.record) || contains_match(&e.feature),
        _ => false,
    }
}

struct Rewriter<'p> {
    program: &'p mut Program,
    abs_stack: Vec<AbsId>,
}

impl Rewriter<'_> {
    fn current_abs(&self) -> AbsId {
        *self.abs_stack.last().expect("abstraction stack is never empty")
    }

    fn builtin(&mut self, name: &str, pos: &Pos) -> Expression {
        match self.program.well_known("Value", name, pos) {
            Some(symbol) => build::var(symbol, pos.clone()),
            None => build::constant(OzValue::Unit, pos.clone()),
        }
    }

    /// Hoist match expressions out of one of the statement's own
    /// expressions, compiling them into preceding match statements.
    fn hoist_expr(
        &mut self,
        expr: Expression,
        pre: &mut Vec<Statement>,
        decls: &mut Vec<SymbolId>,
    ) -> Expression {
        match expr {
            Expression::Match(e) => {
                let pos = e.pos.clone();
                let value = self.hoist_expr(*e.value, pre, decls);
                let result = self.program.new_synthetic(self.current_abs());
                let clauses = e
                    .clauses
                    .into_iter()
                    .map(|clause| MatchClause {
                        pos: clause.pos.clone(),
                        body: build::bind(
                            build::var(result, clause.pos.clone()),
                            clause.value,
                            clause.pos,
                        ),
                        pattern: clause.pattern,
                    })
                    .collect();
                let else_body = e.else_value.map(|value| {
                    let value_pos = value.pos().clone();
                    Box::new(build::bind(
                        build::var(result, value_pos.clone()),
                        *value,
                        value_pos,
                    ))
                });
                let stmt = Statement::Match(MatchStatement {
                    value,
                    clauses,
                    else_body,
                    pos: pos.clone(),
                });
                // The fabricated statement may itself contain matches in the
                // clause bodies; run it through the pass again.
                let stmt = self.transform_stmt(stmt);
                pre.push(stmt);
                decls.push(result);
                build::var(result, pos)
            }
            Expression::If(e) if contains_match(&e.then_value) || contains_match(&e.else_value) => {
                // Lower the conditional itself so neither arm runs eagerly.
                let pos = e.pos.clone();
                let condition = self.hoist_expr(*e.condition, pre, decls);
                let result = self.program.new_synthetic(self.current_abs());
                let then_pos = e.then_value.pos().clone();
                let else_pos = e.else_value.pos().clone();
                let then_body = self.transform_stmt(build::bind(
                    build::var(result, then_pos.clone()),
                    *e.then_value,
                    then_pos,
                ));
                let else_body = self.transform_stmt(build::bind(
                    build::var(result, else_pos.clone()),
                    *e.else_value,
                    else_pos,
                ));
                pre.push(build::if_stmt(condition, then_body, else_body, pos.clone()));
                decls.push(result);
                build::var(result, pos)
            }
            Expression::If(e) => {
                let condition = self.hoist_expr(*e.condition, pre, decls);
                Expression::If(IfExpr {
                    condition: Box::new(condition),
                    then_value: e.then_value,
                    else_value: e.else_value,
                    pos: e.pos,
                })
            }
            Expression::Record(e) => Expression::Record(RecordExpr {
                label: Box::new(self.hoist_expr(*e.label, pre, decls)),
                fields: e
                    .fields
                    .into_iter()
                    .map(|field| RecordField {
                        feature: field
                            .feature
                            .map(|feature| self.hoist_expr(feature, pre, decls)),
                        value: self.hoist_expr(field.value, pre, decls),
                    })
                    .collect(),
                pos: e.pos,
            }),
            Expression::Call(e) => Expression::Call(CallExpr {
                callee: Box::new(self.hoist_expr(*e.callee, pre, decls)),
                args: e
                    .args
                    .into_iter()
                    .map(|arg| self.hoist_expr(arg, pre, decls))
                    .collect(),
                pos: e.pos,
            }),
            other => other,
        }
    }

    /// Rewrite the statement's direct expressions, hoisting any match
    /// expressions into `pre`.
    fn hoist_in_stmt(
        &mut self,
        stmt: Statement,
        pre: &mut Vec<Statement>,
        decls: &mut Vec<SymbolId>,
    ) -> Statement {
        match stmt {
            Statement::Bind(s) => {
                let left = self.hoist_expr(s.left, pre, decls);
                let right = self.hoist_expr(s.right, pre, decls);
                Statement::Bind(BindStatement {
                    left,
                    right,
                    pos: s.pos,
                })
            }
            Statement::Call(s) => {
                let callee = self.hoist_expr(s.callee, pre, decls);
                let args = s
                    .args
                    .into_iter()
                    .map(|arg| self.hoist_expr(arg, pre, decls))
                    .collect();
                Statement::Call(CallStatement {
                    callee,
                    args,
                    pos: s.pos,
                })
            }
            Statement::If(s) => {
                let condition = self.hoist_expr(s.condition, pre, decls);
                Statement::If(IfStatement {
                    condition,
                    then_body: s.then_body,
                    else_body: s.else_body,
                    pos: s.pos,
                })
            }
            Statement::Raise(s) => {
                let value = self.hoist_expr(s.value, pre, decls);
                Statement::Raise(RaiseStatement { value, pos: s.pos })
            }
            Statement::Match(s) => {
                let value = self.hoist_expr(s.value, pre, decls);
                Statement::Match(MatchStatement {
                    value,
                    clauses: s.clauses,
                    else_body: s.else_body,
                    pos: s.pos,
                })
            }
            other => other,
        }
    }

    fn compile_match(&mut self, s: MatchStatement) -> Statement {
        let pos = s.pos;
        let mut pre = Vec::new();
        let mut decls = Vec::new();
        let value_symbol = match s.value.as_variable() {
            Some(symbol) => symbol,
            None => {
                let symbol = self.program.new_synthetic(self.current_abs());
                let value_pos = s.value.pos().clone();
                pre.push(build::bind(
                    build::var(symbol, value_pos.clone()),
                    s.value,
                    value_pos,
                ));
                decls.push(symbol);
                symbol
            }
        };

        let mut result = match s.else_body {
            Some(body) => *body,
            None => Statement::Raise(RaiseStatement {
                value: build::atom("matchFailure", pos.clone()),
                pos: pos.clone(),
            }),
        };
        for clause in s.clauses.into_iter().rev() {
            let value = build::var(value_symbol, clause.pos.clone());
            result = self.compile_pattern(value, clause.pattern, clause.body, result);
        }

        if pre.is_empty() {
            result
        } else {
            pre.push(result);
            build::local(decls, Statement::seq(pre, pos.clone()), pos)
        }
    }

    /// One test: run `then` when `value` matches `pattern`, `fallback`
    /// otherwise.
    fn compile_pattern(
        &mut self,
        value: Expression,
        pattern: Pattern,
        then: Statement,
        fallback: Statement,
    ) -> Statement {
        match pattern {
            Pattern::Wildcard(_) => then,
            Pattern::Capture(p) => {
                let symbol = match p.symbol {
                    Some(symbol) => symbol,
                    None => {
                        self.program.report(
                            "internal: pattern variable was not resolved",
                            p.pos.clone(),
                        );
                        return then;
                    }
                };
                let bind = build::bind(build::var(symbol, p.pos.clone()), value, p.pos.clone());
                build::local(
                    vec![symbol],
                    Statement::seq(vec![bind, then], p.pos.clone()),
                    p.pos,
                )
            }
            Pattern::Literal(p) => {
                let eq = self.builtin("==", &p.pos);
                build::if_stmt(
                    build::call_expr(
                        eq,
                        vec![value, build::constant(p.value, p.pos.clone())],
                        p.pos.clone(),
                    ),
                    then,
                    fallback,
                    p.pos,
                )
            }
            Pattern::Record(p) => self.compile_record_pattern(value, p, then, fallback),
        }
    }

    fn compile_record_pattern(
        &mut self,
        value: Expression,
        pattern: RecordPattern,
        then: Statement,
        fallback: Statement,
    ) -> Statement {
        let pos = pattern.pos;
        let width = pattern.fields.len() as i64;

        // Innermost first: extract and test each field, in reverse so the
        // generated tests run in source order.
        let mut inner = then;
        for field in pattern.fields.into_iter().rev() {
            let feature = match field.feature {
                Some(feature) => feature,
                None => {
                    self.program
                        .report("internal: pattern field has no feature", pos.clone());
                    continue;
                }
            };
            let field_symbol = self.program.new_synthetic(self.current_abs());
            let field_pos = field.pattern.pos().clone();

            let dot = self.builtin(".", &field_pos);
            let extract = build::bind(
                build::var(field_symbol, field_pos.clone()),
                build::call_expr(
                    dot,
                    vec![
                        value.clone(),
                        build::constant(feature.clone(), field_pos.clone()),
                    ],
                    field_pos.clone(),
                ),
                field_pos.clone(),
            );
            let sub = self.compile_pattern(
                build::var(field_symbol, field_pos.clone()),
                field.pattern,
                inner,
                fallback.clone(),
            );

            let has_feature = self.builtin("hasFeature", &field_pos);
            inner = build::if_stmt(
                build::call_expr(
                    has_feature,
                    vec![value.clone(), build::constant(feature, field_pos.clone())],
                    field_pos.clone(),
                ),
                build::local(
                    vec![field_symbol],
                    Statement::seq(vec![extract, sub], field_pos.clone()),
                    field_pos.clone(),
                ),
                fallback.clone(),
                field_pos,
            );
        }

        if !pattern.open {
            let width_builtin = self.builtin("width", &pos);
            let eq = self.builtin("==", &pos);
            inner = build::if_stmt(
                build::call_expr(
                    eq,
                    vec![
                        build::call_expr(width_builtin, vec![value.clone()], pos.clone()),
                        build::int(width, pos.clone()),
                    ],
                    pos.clone(),
                ),
                inner,
                fallback.clone(),
                pos.clone(),
            );
        }

        let label_builtin = self.builtin("label", &pos);
        let eq = self.builtin("==", &pos);
        inner = build::if_stmt(
            build::call_expr(
                eq,
                vec![
                    build::call_expr(label_builtin, vec![value.clone()], pos.clone()),
                    build::constant(pattern.label, pos.clone()),
                ],
                pos.clone(),
            ),
            inner,
            fallback.clone(),
            pos.clone(),
        );

        let is_record = self.builtin("isRecord", &pos);
        build::if_stmt(
            build::call_expr(is_record, vec![value], pos.clone()),
            inner,
            fallback,
            pos,
        )
    }
}

impl Transformer for Rewriter<'_> {
    fn transform_stmt(&mut self, stmt: Statement) -> Statement {
        // Children first, then hoisting, then compilation of a match.
        let stmt = walk_stmt(self, stmt);
        let mut pre = Vec::new();
        let mut decls = Vec::new();
        let stmt = self.hoist_in_stmt(stmt, &mut pre, &mut decls);
        let stmt = match stmt {
            Statement::Match(s) => self.compile_match(s),
            other => other,
        };
        if pre.is_empty() {
            stmt
        } else {
            let pos = stmt.pos().clone();
            pre.push(stmt);
            build::local(decls, Statement::seq(pre, pos.clone()), pos)
        }
    }

    fn transform_expr(&mut self, expr: Expression) -> Expression {
        match expr {
            Expression::Proc(e) => {
                let abs = e.abs;
                if let Some(abs) = abs {
                    self.abs_stack.push(abs);
                }
                let body = self.transform_stmt(*e.body);
                if abs.is_some() {
                    self.abs_stack.pop();
                }
                Expression::Proc(ProcExpr {
                    name: e.name,
                    formals: e.formals,
                    body: Box::new(body),
                    abs,
                    pos: e.pos,
                })
            }
            other => crate::ast::walk::walk_expr(self, other),
        }
    }
}
