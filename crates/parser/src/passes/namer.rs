//! Name resolution.
//!
//! Replaces `RawVariable` references with resolved `Variable` nodes and
//! `RawLocal` statements with `Local` statements over fresh symbols. Every
//! construct that opens a scope pushes a frame: `local`, procedure and
//! function parameters, `for` and `catch` variables, match-clause patterns,
//! and functor sections. Each `proc`/`fun`/`functor` also allocates its
//! abstraction arena entry here, so every symbol is owned from the moment it
//! is minted.
//!
//! In module and linker mode an otherwise-unbound name listed in the base
//! declarations resolves to a feature access on the base environment.

use std::collections::HashMap;

use crate::ast::walk::{walk_expr, walk_pattern, walk_stmt};
use crate::ast::*;
use crate::symtab::{AbsId, Program, SymbolId};

use super::Pass;

pub struct Namer;

impl Pass for Namer {
    fn name(&self) -> &'static str {
        "namer"
    }

    fn run(&mut self, program: &mut Program) {
        if let Some(code) = program.raw_code.take() {
            let top_level = program.top_level;
            let mut rewriter = Rewriter {
                program: &mut *program,
                scopes: vec![HashMap::new()],
                abs_stack: vec![top_level],
            };
            let code = rewriter.transform_stmt(code);
            program.raw_code = Some(code);
        }
    }
}

struct Rewriter<'p> {
    program: &'p mut Program,
    scopes: Vec<HashMap<String, SymbolId>>,
    abs_stack: Vec<AbsId>,
}

impl Rewriter<'_> {
    fn current_abs(&self) -> AbsId {
        *self.abs_stack.last().expect("abstraction stack is never empty")
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare_local(&mut self, name: &str, pos: &Pos) -> SymbolId {
        if self.scopes.last().is_some_and(|frame| frame.contains_key(name)) {
            self.program
                .report(format!("duplicate declaration of {}", name), pos.clone());
        }
        let symbol = self
            .program
            .new_local(self.current_abs(), name, pos.clone());
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), symbol);
        symbol
    }

    fn declare_formal(&mut self, name: &str, pos: &Pos) -> SymbolId {
        if self.scopes.last().is_some_and(|frame| frame.contains_key(name)) {
            self.program
                .report(format!("duplicate declaration of {}", name), pos.clone());
        }
        let symbol = self
            .program
            .new_formal(self.current_abs(), name, pos.clone());
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), symbol);
        symbol
    }

    fn resolve(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }

    fn resolve_or_report(&mut self, name: &str, pos: &Pos) -> Expression {
        if let Some(symbol) = self.resolve(name) {
            return build::var(symbol, pos.clone());
        }
        // Names exported by the base environment resolve as features of it.
        if !self.program.is_base_environment && self.program.base_declarations.contains(name) {
            return build::dot(
                build::var(self.program.base_env_symbol, pos.clone()),
                build::atom(name, pos.clone()),
                pos.clone(),
            );
        }
        self.program
            .report(format!("unresolved variable {}", name), pos.clone());
        let dummy = self.program.new_synthetic(self.current_abs());
        build::var(dummy, pos.clone())
    }

    /// Resolve a formal written as a raw variable, declaring it.
    fn name_formal(&mut self, formal: Expression) -> Expression {
        match formal {
            Expression::RawVariable(raw) => {
                let symbol = self.declare_formal(&raw.name, &raw.pos);
                build::var(symbol, raw.pos)
            }
            other => {
                self.program.report(
                    "procedure parameters must be variables",
                    other.pos().clone(),
                );
                other
            }
        }
    }

    /// Declare a `RawLocal`-style section and return the `Local` statement
    /// replacing it: declarations first, then their initializer bindings,
    /// then the body.
    fn name_declarations(
        &mut self,
        declarations: Vec<RawDeclaration>,
        body: Statement,
        pos: Pos,
    ) -> Statement {
        let mut symbols = Vec::with_capacity(declarations.len());
        for decl in &declarations {
            symbols.push(self.declare_local(&decl.name, &decl.pos));
        }
        // Initializers see all of the declarations (they may be mutually
        // recursive).
        let mut statements = Vec::new();
        for (decl, symbol) in declarations.into_iter().zip(&symbols) {
            if let Some(initializer) = decl.initializer {
                let initializer = self.transform_expr(initializer);
                statements.push(build::bind(
                    build::var(*symbol, decl.pos.clone()),
                    initializer,
                    decl.pos,
                ));
            }
        }
        statements.push(self.transform_stmt(body));
        build::local(symbols, Statement::seq(statements, pos.clone()), pos)
    }

    /// Imported module variables are locals of the functor, bound from the
    /// import record once it is applied.
    fn name_imports(&mut self, imports: Vec<FunctorImport>) -> Vec<FunctorImport> {
        imports
            .into_iter()
            .map(|import| {
                let var = match import.var {
                    Expression::RawVariable(raw) => {
                        let symbol = self.declare_local(&raw.name, &raw.pos);
                        build::var(symbol, raw.pos)
                    }
                    other => other,
                };
                FunctorImport {
                    var,
                    name: import.name,
                    url: import.url,
                    pos: import.pos,
                }
            })
            .collect()
    }

    fn name_functor(&mut self, functor: FunctorExpr) -> Expression {
        let abs = self.program.new_abstraction(
            if functor.name.is_empty() {
                "functor".to_string()
            } else {
                functor.name.clone()
            },
            functor.pos.clone(),
        );
        self.abs_stack.push(abs);
        self.push_scope();

        let requires = self.name_imports(functor.requires);
        let imports = self.name_imports(functor.imports);

        // Declarations of both sections share the functor scope, so the
        // define part sees the prepare part and exports see both.
        let prepare = functor.prepare.map(|section| match *section {
            Statement::RawLocal(raw) => {
                Box::new(self.name_declarations(raw.declarations, *raw.body, raw.pos))
            }
            other => Box::new(self.transform_stmt(other)),
        });
        let define = functor.define.map(|section| match *section {
            Statement::RawLocal(raw) => {
                Box::new(self.name_declarations(raw.declarations, *raw.body, raw.pos))
            }
            other => Box::new(self.transform_stmt(other)),
        });

        let exports = functor
            .exports
            .into_iter()
            .map(|export| FunctorExport {
                feature: export.feature,
                value: self.transform_expr(export.value),
                pos: export.pos,
            })
            .collect();

        self.pop_scope();
        self.abs_stack.pop();

        Expression::Functor(FunctorExpr {
            name: functor.name,
            requires,
            prepare,
            imports,
            define,
            exports,
            abs: Some(abs),
            pos: functor.pos,
        })
    }
}

impl Transformer for Rewriter<'_> {
    fn transform_stmt(&mut self, stmt: Statement) -> Statement {
        match stmt {
            Statement::RawLocal(s) => {
                self.push_scope();
                let named = self.name_declarations(s.declarations, *s.body, s.pos);
                self.pop_scope();
                named
            }
            Statement::For(s) => {
                let from = self.transform_expr(s.from);
                let to = self.transform_expr(s.to);
                self.push_scope();
                let var = match s.var {
                    Expression::RawVariable(raw) => {
                        let symbol = self.declare_local(&raw.name, &raw.pos);
                        build::var(symbol, raw.pos)
                    }
                    other => other,
                };
                let body = self.transform_stmt(*s.body);
                self.pop_scope();
                Statement::For(ForStatement {
                    var,
                    from,
                    to,
                    body: Box::new(body),
                    pos: s.pos,
                })
            }
            Statement::Try(s) => {
                let body = self.transform_stmt(*s.body);
                self.push_scope();
                let catch_var = match s.catch_var {
                    Expression::RawVariable(raw) => {
                        let symbol = self.declare_local(&raw.name, &raw.pos);
                        build::var(symbol, raw.pos)
                    }
                    other => other,
                };
                let catch_body = self.transform_stmt(*s.catch_body);
                self.pop_scope();
                Statement::Try(TryStatement {
                    body: Box::new(body),
                    catch_var,
                    catch_body: Box::new(catch_body),
                    pos: s.pos,
                })
            }
            Statement::Match(s) => {
                let value = self.transform_expr(s.value);
                let clauses = s
                    .clauses
                    .into_iter()
                    .map(|clause| {
                        self.push_scope();
                        let pattern = self.transform_pattern(clause.pattern);
                        let body = self.transform_stmt(clause.body);
                        self.pop_scope();
                        MatchClause {
                            pattern,
                            body,
                            pos: clause.pos,
                        }
                    })
                    .collect();
                let else_body = s.else_body.map(|body| Box::new(self.transform_stmt(*body)));
                Statement::Match(MatchStatement {
                    value,
                    clauses,
                    else_body,
                    pos: s.pos,
                })
            }
            other => walk_stmt(self, other),
        }
    }

    fn transform_expr(&mut self, expr: Expression) -> Expression {
        match expr {
            Expression::RawVariable(raw) => self.resolve_or_report(&raw.name, &raw.pos),
            Expression::Proc(e) => {
                let abs = self.program.new_abstraction(
                    if e.name.is_empty() {
                        "proc".to_string()
                    } else {
                        e.name.clone()
                    },
                    e.pos.clone(),
                );
                self.abs_stack.push(abs);
                self.push_scope();
                let formals = e
                    .formals
                    .into_iter()
                    .map(|formal| self.name_formal(formal))
                    .collect();
                let body = self.transform_stmt(*e.body);
                self.pop_scope();
                self.abs_stack.pop();
                Expression::Proc(ProcExpr {
                    name: e.name,
                    formals,
                    body: Box::new(body),
                    abs: Some(abs),
                    pos: e.pos,
                })
            }
            Expression::Fun(e) => {
                let abs = self.program.new_abstraction(
                    if e.name.is_empty() {
                        "fun".to_string()
                    } else {
                        e.name.clone()
                    },
                    e.pos.clone(),
                );
                self.abs_stack.push(abs);
                self.push_scope();
                let formals = e
                    .formals
                    .into_iter()
                    .map(|formal| self.name_formal(formal))
                    .collect();
                let body = self.transform_expr(*e.body);
                self.pop_scope();
                self.abs_stack.pop();
                Expression::Fun(FunExpr {
                    name: e.name,
                    formals,
                    body: Box::new(body),
                    abs: Some(abs),
                    pos: e.pos,
                })
            }
            Expression::Functor(e) => self.name_functor(e),
            Expression::Match(e) => {
                let value = self.transform_expr(*e.value);
                let clauses = e
                    .clauses
                    .into_iter()
                    .map(|clause| {
                        self.push_scope();
                        let pattern = self.transform_pattern(clause.pattern);
                        let clause_value = self.transform_expr(clause.value);
                        self.pop_scope();
                        MatchExprClause {
                            pattern,
                            value: clause_value,
                            pos: clause.pos,
                        }
                    })
                    .collect();
                let else_value = e.else_value.map(|value| Box::new(self.transform_expr(*value)));
                Expression::Match(MatchExpr {
                    value: Box::new(value),
                    clauses,
                    else_value,
                    pos: e.pos,
                })
            }
            other => walk_expr(self, other),
        }
    }

    fn transform_pattern(&mut self, pattern: Pattern) -> Pattern {
        match pattern {
            Pattern::Capture(p) => {
                let symbol = match p.symbol {
                    Some(symbol) => symbol,
                    None => self.declare_local(&p.name, &p.pos),
                };
                Pattern::Capture(CapturePattern {
                    name: p.name,
                    symbol: Some(symbol),
                    pos: p.pos,
                })
            }
            other => walk_pattern(self, other),
        }
    }
}
