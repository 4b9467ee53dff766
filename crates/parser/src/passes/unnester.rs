//! A-normalization.
//!
//! After this pass every operand is flat: call arguments, record field
//! values and bind right-hand sides are variables or constants (with record
//! constructions and procedure expressions allowed directly under a bind).
//! Anything deeper gets a synthetic local and a preceding binding, collected
//! into a `Local` statement. Calls in expression position become call
//! statements with a trailing output argument, and conditional expressions
//! become conditional statements binding their result.

use crate::ast::walk::walk_expr;
use crate::ast::*;
use crate::symtab::{AbsId, Program, SymbolId, SymbolKind};

use super::Pass;

pub struct Unnester;

impl Pass for Unnester {
    fn name(&self) -> &'static str {
        "unnester"
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

struct Rewriter<'p> {
    program: &'p mut Program,
    abs_stack: Vec<AbsId>,
}

impl Rewriter<'_> {
    fn current_abs(&self) -> AbsId {
        *self.abs_stack.last().expect("abstraction stack is never empty")
    }

    fn wrap(pre: Vec<Statement>, decls: Vec<SymbolId>, stmt: Statement) -> Statement {
        if pre.is_empty() && decls.is_empty() {
            return stmt;
        }
        let pos = stmt.pos().clone();
        let mut statements = pre;
        statements.push(stmt);
        let body = Statement::seq(statements, pos.clone());
        if decls.is_empty() {
            body
        } else {
            build::local(decls, body, pos)
        }
    }

    /// Reduce an operand to a variable or constant, hoisting everything
    /// else into a fresh temporary.
    fn simplify(
        &mut self,
        expr: Expression,
        pre: &mut Vec<Statement>,
        decls: &mut Vec<SymbolId>,
    ) -> Expression {
        if expr.is_simple() {
            return expr;
        }
        let pos = expr.pos().clone();
        let symbol = self.program.new_synthetic(self.current_abs());
        decls.push(symbol);
        let binding = self.bind_into(symbol, expr, pre, decls);
        pre.push(binding);
        build::var(symbol, pos)
    }

    /// The statement establishing `target = expr`.
    fn bind_into(
        &mut self,
        target: SymbolId,
        expr: Expression,
        pre: &mut Vec<Statement>,
        decls: &mut Vec<SymbolId>,
    ) -> Statement {
        match expr {
            Expression::Call(e) => {
                let pos = e.pos;
                let callee = self.simplify(*e.callee, pre, decls);
                let mut args: Vec<Expression> = e
                    .args
                    .into_iter()
                    .map(|arg| self.simplify(arg, pre, decls))
                    .collect();
                args.push(build::var(target, pos.clone()));
                self.check_builtin_arity(&callee, args.len(), &pos);
                build::call_stmt(callee, args, pos)
            }
            Expression::If(e) => {
                let pos = e.pos;
                let condition = self.simplify(*e.condition, pre, decls);
                let then_pos = e.then_value.pos().clone();
                let else_pos = e.else_value.pos().clone();
                let then_body = self.transform_stmt(build::bind(
                    build::var(target, then_pos.clone()),
                    *e.then_value,
                    then_pos,
                ));
                let else_body = self.transform_stmt(build::bind(
                    build::var(target, else_pos.clone()),
                    *e.else_value,
                    else_pos,
                ));
                build::if_stmt(condition, then_body, else_body, pos)
            }
            Expression::Record(e) => {
                let pos = e.pos;
                let label = self.simplify_record_label(*e.label, pre, decls);
                let fields = e
                    .fields
                    .into_iter()
                    .map(|field| {
                        let feature = match field.feature {
                            Some(feature) if feature.as_constant().is_some() => Some(feature),
                            Some(feature) => {
                                self.program.report(
                                    "record features must be statically known",
                                    feature.pos().clone(),
                                );
                                Some(feature)
                            }
                            None => {
                                self.program.report(
                                    "internal: record field has no feature",
                                    pos.clone(),
                                );
                                None
                            }
                        };
                        RecordField {
                            feature,
                            value: self.simplify(field.value, pre, decls),
                        }
                    })
                    .collect();
                build::bind(
                    build::var(target, pos.clone()),
                    Expression::Record(RecordExpr {
                        label: Box::new(label),
                        fields,
                        pos: pos.clone(),
                    }),
                    pos,
                )
            }
            Expression::Proc(e) => {
                let pos = e.pos.clone();
                let proc = self.transform_expr(Expression::Proc(e));
                build::bind(build::var(target, pos.clone()), proc, pos)
            }
            other => {
                let pos = other.pos().clone();
                if !other.is_simple() {
                    self.program.report(
                        "internal: unexpected expression shape while unnesting",
                        pos.clone(),
                    );
                }
                build::bind(build::var(target, pos.clone()), other, pos)
            }
        }
    }

    fn simplify_record_label(
        &mut self,
        label: Expression,
        pre: &mut Vec<Statement>,
        decls: &mut Vec<SymbolId>,
    ) -> Expression {
        if label.as_constant().is_some() {
            return label;
        }
        self.program
            .report("record labels must be statically known", label.pos().clone());
        self.simplify(label, pre, decls)
    }

    /// Builtins have a fixed total arity, outputs included.
    fn check_builtin_arity(&mut self, callee: &Expression, arity: usize, pos: &Pos) {
        let Some(symbol) = callee.as_variable() else {
            return;
        };
        let symbol = self.program.symbol(symbol);
        if let SymbolKind::Builtin(id) = symbol.kind {
            let builtin = self.program.builtins.get(id);
            if builtin.arity() != arity {
                self.program.report(
                    format!(
                        "builtin {}.'{}' expects {} arguments, got {}",
                        builtin.module,
                        builtin.name,
                        builtin.arity(),
                        arity
                    ),
                    pos.clone(),
                );
            }
        }
    }

    fn unnest_bind(&mut self, s: BindStatement) -> Statement {
        let mut pre = Vec::new();
        let mut decls = Vec::new();

        let stmt = match (s.left, s.right) {
            (Expression::Variable(left), right) if right.is_simple() => {
                build::bind(Expression::Variable(left), right, s.pos)
            }
            (Expression::Variable(left), right) => {
                let binding = self.bind_into(left.symbol, right, &mut pre, &mut decls);
                binding
            }
            (left, right) => {
                // A complex left-hand side binds symmetrically: reduce the
                // right side to a variable and establish it from the left.
                let right = self.simplify(right, &mut pre, &mut decls);
                match right.as_variable() {
                    Some(target) => self.bind_into(target, left, &mut pre, &mut decls),
                    None => {
                        // Right side is a constant; give it a temporary.
                        let symbol = self.program.new_synthetic(self.current_abs());
                        decls.push(symbol);
                        pre.push(build::bind(
                            build::var(symbol, s.pos.clone()),
                            right,
                            s.pos.clone(),
                        ));
                        self.bind_into(symbol, left, &mut pre, &mut decls)
                    }
                }
            }
        };
        Self::wrap(pre, decls, stmt)
    }
}

impl Transformer for Rewriter<'_> {
    fn transform_stmt(&mut self, stmt: Statement) -> Statement {
        match stmt {
            Statement::Compound(s) => Statement::Compound(CompoundStatement {
                statements: s
                    .statements
                    .into_iter()
                    .map(|child| self.transform_stmt(child))
                    .collect(),
                pos: s.pos,
            }),
            Statement::Local(s) => Statement::Local(LocalStatement {
                declarations: s.declarations,
                body: Box::new(self.transform_stmt(*s.body)),
                pos: s.pos,
            }),
            Statement::Skip(s) => Statement::Skip(s),
            Statement::Bind(s) => self.unnest_bind(s),
            Statement::Call(s) => {
                let mut pre = Vec::new();
                let mut decls = Vec::new();
                let callee = self.simplify(s.callee, &mut pre, &mut decls);
                let args: Vec<Expression> = s
                    .args
                    .into_iter()
                    .map(|arg| self.simplify(arg, &mut pre, &mut decls))
                    .collect();
                self.check_builtin_arity(&callee, args.len(), &s.pos);
                Self::wrap(pre, decls, build::call_stmt(callee, args, s.pos))
            }
            Statement::If(s) => {
                let mut pre = Vec::new();
                let mut decls = Vec::new();
                let condition = self.simplify(s.condition, &mut pre, &mut decls);
                let then_body = self.transform_stmt(*s.then_body);
                let else_body = self.transform_stmt(*s.else_body);
                Self::wrap(
                    pre,
                    decls,
                    build::if_stmt(condition, then_body, else_body, s.pos),
                )
            }
            Statement::Try(s) => Statement::Try(TryStatement {
                body: Box::new(self.transform_stmt(*s.body)),
                catch_var: s.catch_var,
                catch_body: Box::new(self.transform_stmt(*s.catch_body)),
                pos: s.pos,
            }),
            Statement::Raise(s) => {
                let mut pre = Vec::new();
                let mut decls = Vec::new();
                let value = self.simplify(s.value, &mut pre, &mut decls);
                Self::wrap(
                    pre,
                    decls,
                    Statement::Raise(RaiseStatement { value, pos: s.pos }),
                )
            }
            other => {
                self.program.report(
                    "internal: unexpected statement shape while unnesting",
                    other.pos().clone(),
                );
                other
            }
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
            other => walk_expr(self, other),
        }
    }
}
