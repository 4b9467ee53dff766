//! General desugaring.
//!
//! Lowers the remaining syntactic sugar into the kernel tree:
//!
//! - operator forms become builtin calls (`andthen`/`orelse` become
//!   conditionals);
//! - feature access `R.F` becomes a `Value.'.'` call;
//! - functions become procedures binding a trailing result argument;
//! - `for` loops become recursive procedures;
//! - `thread S end` becomes `{Thread.create proc {$} S end}`;
//! - positional record and pattern fields get their integer features.

use crate::ast::walk::{walk_expr, walk_pattern, walk_stmt};
use crate::ast::*;
use crate::symtab::{AbsId, Program, SymbolId};

use super::Pass;

pub struct Desugar;

impl Pass for Desugar {
    fn name(&self) -> &'static str {
        "desugar"
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

/// The builtin a binary operator lowers to.
fn binary_builtin(op: &str) -> Option<(&'static str, &'static str)> {
    match op {
        "==" => Some(("Value", "==")),
        "\\=" => Some(("Value", "\\=")),
        "<" => Some(("Number", "<")),
        "=<" => Some(("Number", "=<")),
        ">" => Some(("Number", ">")),
        ">=" => Some(("Number", ">=")),
        "+" => Some(("Number", "+")),
        "-" => Some(("Number", "-")),
        "*" => Some(("Number", "*")),
        "div" => Some(("Number", "div")),
        "mod" => Some(("Number", "mod")),
        "/" => Some(("Float", "/")),
        _ => None,
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

    /// A reference to a well-known builtin; `Constant(unit)` when the boot
    /// modules do not provide it (the error is already recorded and the
    /// pipeline aborts after this pass).
    fn builtin(&mut self, module: &str, name: &str, pos: &Pos) -> Expression {
        match self.program.well_known(module, name, pos) {
            Some(symbol) => build::var(symbol, pos.clone()),
            None => build::constant(OzValue::Unit, pos.clone()),
        }
    }

    /// Turn a function body into a statement binding `result`.
    fn lower_return(&mut self, body: Expression, result: SymbolId) -> Statement {
        match body {
            Expression::If(e) => build::if_stmt(
                *e.condition,
                self.lower_return(*e.then_value, result),
                self.lower_return(*e.else_value, result),
                e.pos,
            ),
            Expression::Match(e) => Statement::Match(MatchStatement {
                value: *e.value,
                clauses: e
                    .clauses
                    .into_iter()
                    .map(|clause| MatchClause {
                        pos: clause.pos.clone(),
                        body: self.lower_return(clause.value, result),
                        pattern: clause.pattern,
                    })
                    .collect(),
                else_body: e
                    .else_value
                    .map(|value| Box::new(self.lower_return(*value, result))),
                pos: e.pos,
            }),
            other => {
                let pos = other.pos().clone();
                build::bind(build::var(result, pos.clone()), other, pos)
            }
        }
    }

    /// `for I in From..To do S end` becomes a recursive procedure:
    ///
    /// ```text
    /// local Loop F T in
    ///    F = From  T = To
    ///    Loop = proc {$ I}
    ///       if I =< T then S {Loop I+1} end
    ///    end
    ///    {Loop F}
    /// end
    /// ```
    fn lower_for(&mut self, s: ForStatement) -> Statement {
        let pos = s.pos;
        let var_symbol = match s.var.as_variable() {
            Some(symbol) => symbol,
            None => {
                self.program
                    .report("internal: for variable was not resolved", pos.clone());
                return Statement::skip(pos);
            }
        };
        let outer = self.current_abs();
        let loop_abs = self.program.new_abstraction("for", pos.clone());
        self.program.adopt_as_formal(loop_abs, var_symbol);

        let from = self.transform_expr(s.from);
        let to = self.transform_expr(s.to);
        self.abs_stack.push(loop_abs);
        let body = self.transform_stmt(*s.body);
        self.abs_stack.pop();

        let loop_sym = self.program.new_synthetic(outer);
        let from_sym = self.program.new_synthetic(outer);
        let to_sym = self.program.new_synthetic(outer);

        let le = self.builtin("Number", "=<", &pos);
        let add = self.builtin("Number", "+", &pos);

        let condition = build::call_expr(
            le,
            vec![build::var(var_symbol, pos.clone()), build::var(to_sym, pos.clone())],
            pos.clone(),
        );
        let next = build::call_expr(
            add,
            vec![build::var(var_symbol, pos.clone()), build::int(1, pos.clone())],
            pos.clone(),
        );
        let loop_body = build::if_stmt(
            condition,
            Statement::seq(
                vec![
                    body,
                    build::call_stmt(build::var(loop_sym, pos.clone()), vec![next], pos.clone()),
                ],
                pos.clone(),
            ),
            Statement::skip(pos.clone()),
            pos.clone(),
        );
        let loop_proc = Expression::Proc(ProcExpr {
            name: "for".to_string(),
            formals: vec![build::var(var_symbol, pos.clone())],
            body: Box::new(loop_body),
            abs: Some(loop_abs),
            pos: pos.clone(),
        });

        build::local(
            vec![loop_sym, from_sym, to_sym],
            Statement::seq(
                vec![
                    build::bind(build::var(from_sym, pos.clone()), from, pos.clone()),
                    build::bind(build::var(to_sym, pos.clone()), to, pos.clone()),
                    build::bind(build::var(loop_sym, pos.clone()), loop_proc, pos.clone()),
                    build::call_stmt(
                        build::var(loop_sym, pos.clone()),
                        vec![build::var(from_sym, pos.clone())],
                        pos.clone(),
                    ),
                ],
                pos.clone(),
            ),
            pos,
        )
    }

    fn lower_thread(&mut self, s: ThreadStatement) -> Statement {
        let pos = s.pos;
        let thread_abs = self.program.new_abstraction("thread", pos.clone());
        self.abs_stack.push(thread_abs);
        let body = self.transform_stmt(*s.body);
        self.abs_stack.pop();

        let create = self.builtin("Thread", "create", &pos);
        let proc = Expression::Proc(ProcExpr {
            name: "thread".to_string(),
            formals: Vec::new(),
            body: Box::new(body),
            abs: Some(thread_abs),
            pos: pos.clone(),
        });
        build::call_stmt(create, vec![proc], pos)
    }

    /// Assign integer features to positional record fields: `f(a b x:c)`
    /// reads as `f(1:a 2:b x:c)`.
    fn number_record_fields(&mut self, record: RecordExpr) -> Expression {
        let mut next = 1i64;
        let fields = record
            .fields
            .into_iter()
            .map(|field| {
                let feature = match field.feature {
                    Some(feature) => feature,
                    None => {
                        let feature = build::int(next, field.value.pos().clone());
                        next += 1;
                        feature
                    }
                };
                RecordField {
                    feature: Some(feature),
                    value: field.value,
                }
            })
            .collect();
        Expression::Record(RecordExpr {
            label: record.label,
            fields,
            pos: record.pos,
        })
    }
}

impl Transformer for Rewriter<'_> {
    fn transform_stmt(&mut self, stmt: Statement) -> Statement {
        match stmt {
            // These two move their bodies into a fabricated abstraction, so
            // the children must be rewritten in that context.
            Statement::For(s) => self.lower_for(s),
            Statement::Thread(s) => self.lower_thread(s),
            other => walk_stmt(self, other),
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
            Expression::Fun(e) => {
                let abs = match e.abs {
                    Some(abs) => abs,
                    None => {
                        self.program.report(
                            "internal: function was not placed by the namer",
                            e.pos.clone(),
                        );
                        return Expression::Fun(e);
                    }
                };
                self.abs_stack.push(abs);
                let body = self.transform_expr(*e.body);
                let result = self.program.new_synthetic_formal(abs);
                let body = self.lower_return(body, result);
                self.abs_stack.pop();

                let mut formals = e.formals;
                formals.push(build::var(result, e.pos.clone()));
                Expression::Proc(ProcExpr {
                    name: e.name,
                    formals,
                    body: Box::new(body),
                    abs: Some(abs),
                    pos: e.pos,
                })
            }
            other => {
                let expr = walk_expr(self, other);
                match expr {
                    Expression::BinaryOp(e) => {
                        let pos = e.pos.clone();
                        let op = e.op.clone();
                        match op.as_str() {
                            "andthen" => Expression::If(IfExpr {
                                condition: e.left,
                                then_value: e.right,
                                else_value: Box::new(build::constant(
                                    OzValue::Bool(false),
                                    pos.clone(),
                                )),
                                pos,
                            }),
                            "orelse" => Expression::If(IfExpr {
                                condition: e.left,
                                then_value: Box::new(build::constant(
                                    OzValue::Bool(true),
                                    pos.clone(),
                                )),
                                else_value: e.right,
                                pos,
                            }),
                            op => match binary_builtin(op) {
                                Some((module, name)) => {
                                    let builtin = self.builtin(module, name, &pos);
                                    build::call_expr(builtin, vec![*e.left, *e.right], pos)
                                }
                                None => {
                                    self.program
                                        .report(format!("unknown operator {}", op), pos);
                                    Expression::BinaryOp(e)
                                }
                            },
                        }
                    }
                    Expression::UnaryOp(e) => {
                        let pos = e.pos.clone();
                        if e.op == "~" {
                            let builtin = self.builtin("Number", "~", &pos);
                            build::call_expr(builtin, vec![*e.operand], pos)
                        } else {
                            self.program
                                .report(format!("unknown operator {}", e.op), pos);
                            Expression::UnaryOp(e)
                        }
                    }
                    Expression::Dot(e) => {
                        let pos = e.pos;
                        let builtin = self.builtin("Value", ".", &pos);
                        build::call_expr(builtin, vec![*e.record, *e.feature], pos)
                    }
                    Expression::Record(e) => self.number_record_fields(e),
                    other => other,
                }
            }
        }
    }

    fn transform_pattern(&mut self, pattern: Pattern) -> Pattern {
        let pattern = walk_pattern(self, pattern);
        match pattern {
            Pattern::Record(p) => {
                let mut next = 1i64;
                let fields = p
                    .fields
                    .into_iter()
                    .map(|field| {
                        let feature = match field.feature {
                            Some(feature) => feature,
                            None => {
                                let feature = OzValue::Int(next);
                                next += 1;
                                feature
                            }
                        };
                        PatternField {
                            feature: Some(feature),
                            pattern: field.pattern,
                        }
                    })
                    .collect();
                Pattern::Record(RecordPattern {
                    label: p.label,
                    fields,
                    open: p.open,
                    pos: p.pos,
                })
            }
            other => other,
        }
    }
}
