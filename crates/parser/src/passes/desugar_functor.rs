//! Functor lowering.
//!
//! A functor becomes a two-argument procedure: it receives the import
//! record, binds each imported module variable from the record by feature,
//! runs the prepare and define sections, and binds its second argument to
//! the export record. `require`/`prepare` run together with
//! `import`/`define` here, since the bootstrap applies every functor exactly
//! once.

use crate::ast::walk::walk_expr;
use crate::ast::*;
use crate::symtab::Program;

use super::Pass;

pub struct DesugarFunctor;

impl Pass for DesugarFunctor {
    fn name(&self) -> &'static str {
        "desugar-functor"
    }

    fn run(&mut self, program: &mut Program) {
        if let Some(code) = program.raw_code.take() {
            let mut rewriter = Rewriter { program: &mut *program };
            let code = rewriter.transform_stmt(code);
            program.raw_code = Some(code);
        }
    }
}

struct Rewriter<'p> {
    program: &'p mut Program,
}

impl Rewriter<'_> {
    fn lower(&mut self, functor: FunctorExpr) -> Expression {
        let abs = match functor.abs {
            Some(abs) => abs,
            None => {
                self.program.report(
                    "internal: functor was not placed by the namer",
                    functor.pos.clone(),
                );
                return Expression::Functor(functor);
            }
        };
        let pos = functor.pos;

        let import_record = self.program.new_synthetic_formal(abs);
        let export_record = self.program.new_synthetic_formal(abs);

        let mut import_symbols = Vec::new();
        let mut body = Vec::new();
        for import in functor.requires.into_iter().chain(functor.imports) {
            let symbol = match import.var.as_variable() {
                Some(symbol) => symbol,
                None => {
                    self.program.report(
                        "internal: unresolved functor import",
                        import.pos.clone(),
                    );
                    continue;
                }
            };
            import_symbols.push(symbol);
            body.push(build::bind(
                build::var(symbol, import.pos.clone()),
                build::dot(
                    build::var(import_record, import.pos.clone()),
                    build::atom(import.name, import.pos.clone()),
                    import.pos.clone(),
                ),
                import.pos,
            ));
        }

        if let Some(prepare) = functor.prepare {
            body.push(*prepare);
        }
        if let Some(define) = functor.define {
            body.push(*define);
        }

        let fields = functor
            .exports
            .into_iter()
            .map(|export| {
                (
                    build::constant(export.feature, export.pos.clone()),
                    export.value,
                )
            })
            .collect();
        body.push(build::bind(
            build::var(export_record, pos.clone()),
            build::record(build::atom("export", pos.clone()), fields, pos.clone()),
            pos.clone(),
        ));

        let body = Statement::seq(body, pos.clone());
        let body = if import_symbols.is_empty() {
            body
        } else {
            build::local(import_symbols, body, pos.clone())
        };

        Expression::Proc(ProcExpr {
            name: functor.name,
            formals: vec![
                build::var(import_record, pos.clone()),
                build::var(export_record, pos.clone()),
            ],
            body: Box::new(body),
            abs: Some(abs),
            pos,
        })
    }
}

impl Transformer for Rewriter<'_> {
    fn transform_expr(&mut self, expr: Expression) -> Expression {
        // Children first, so nested functors are already lowered.
        let expr = walk_expr(self, expr);
        match expr {
            Expression::Functor(functor) => self.lower(functor),
            other => other,
        }
    }
}
