//! Structure-preserving tree rewriting.
//!
//! A pass implements [`Transformer`] and overrides the node kinds it cares
//! about; everything else is reconstructed from its rewritten children with
//! the original position by the `walk_*` functions. Nodes are consumed and
//! rebuilt, never mutated in place.

use super::expr::*;
use super::pattern::*;
use super::stmt::*;

pub trait Transformer {
    fn transform_stmt(&mut self, stmt: Statement) -> Statement {
        walk_stmt(self, stmt)
    }

    fn transform_expr(&mut self, expr: Expression) -> Expression {
        walk_expr(self, expr)
    }

    fn transform_pattern(&mut self, pattern: Pattern) -> Pattern {
        walk_pattern(self, pattern)
    }
}

pub fn walk_stmt<T: Transformer + ?Sized>(t: &mut T, stmt: Statement) -> Statement {
    match stmt {
        Statement::Compound(s) => Statement::Compound(CompoundStatement {
            statements: s
                .statements
                .into_iter()
                .map(|child| t.transform_stmt(child))
                .collect(),
            pos: s.pos,
        }),
        Statement::RawLocal(s) => Statement::RawLocal(RawLocalStatement {
            declarations: s
                .declarations
                .into_iter()
                .map(|decl| RawDeclaration {
                    name: decl.name,
                    initializer: decl.initializer.map(|init| t.transform_expr(init)),
                    pos: decl.pos,
                })
                .collect(),
            body: Box::new(t.transform_stmt(*s.body)),
            pos: s.pos,
        }),
        Statement::Local(s) => Statement::Local(LocalStatement {
            declarations: s.declarations,
            body: Box::new(t.transform_stmt(*s.body)),
            pos: s.pos,
        }),
        Statement::Bind(s) => Statement::Bind(BindStatement {
            left: t.transform_expr(s.left),
            right: t.transform_expr(s.right),
            pos: s.pos,
        }),
        Statement::Call(s) => Statement::Call(CallStatement {
            callee: t.transform_expr(s.callee),
            args: s
                .args
                .into_iter()
                .map(|arg| t.transform_expr(arg))
                .collect(),
            pos: s.pos,
        }),
        Statement::If(s) => Statement::If(IfStatement {
            condition: t.transform_expr(s.condition),
            then_body: Box::new(t.transform_stmt(*s.then_body)),
            else_body: Box::new(t.transform_stmt(*s.else_body)),
            pos: s.pos,
        }),
        Statement::Match(s) => Statement::Match(MatchStatement {
            value: t.transform_expr(s.value),
            clauses: s
                .clauses
                .into_iter()
                .map(|clause| MatchClause {
                    pattern: t.transform_pattern(clause.pattern),
                    body: t.transform_stmt(clause.body),
                    pos: clause.pos,
                })
                .collect(),
            else_body: s.else_body.map(|body| Box::new(t.transform_stmt(*body))),
            pos: s.pos,
        }),
        Statement::For(s) => Statement::For(ForStatement {
            var: t.transform_expr(s.var),
            from: t.transform_expr(s.from),
            to: t.transform_expr(s.to),
            body: Box::new(t.transform_stmt(*s.body)),
            pos: s.pos,
        }),
        Statement::Thread(s) => Statement::Thread(ThreadStatement {
            body: Box::new(t.transform_stmt(*s.body)),
            pos: s.pos,
        }),
        Statement::Try(s) => Statement::Try(TryStatement {
            body: Box::new(t.transform_stmt(*s.body)),
            catch_var: t.transform_expr(s.catch_var),
            catch_body: Box::new(t.transform_stmt(*s.catch_body)),
            pos: s.pos,
        }),
        Statement::Raise(s) => Statement::Raise(RaiseStatement {
            value: t.transform_expr(s.value),
            pos: s.pos,
        }),
        Statement::Skip(s) => Statement::Skip(s),
    }
}

pub fn walk_expr<T: Transformer + ?Sized>(t: &mut T, expr: Expression) -> Expression {
    match expr {
        Expression::RawVariable(e) => Expression::RawVariable(e),
        Expression::Variable(e) => Expression::Variable(e),
        Expression::Constant(e) => Expression::Constant(e),
        Expression::Record(e) => Expression::Record(RecordExpr {
            label: Box::new(t.transform_expr(*e.label)),
            fields: e
                .fields
                .into_iter()
                .map(|field| RecordField {
                    feature: field.feature.map(|feature| t.transform_expr(feature)),
                    value: t.transform_expr(field.value),
                })
                .collect(),
            pos: e.pos,
        }),
        Expression::Dot(e) => Expression::Dot(DotExpr {
            record: Box::new(t.transform_expr(*e.record)),
            feature: Box::new(t.transform_expr(*e.feature)),
            pos: e.pos,
        }),
        Expression::BinaryOp(e) => Expression::BinaryOp(BinaryOpExpr {
            left: Box::new(t.transform_expr(*e.left)),
            op: e.op,
            right: Box::new(t.transform_expr(*e.right)),
            pos: e.pos,
        }),
        Expression::UnaryOp(e) => Expression::UnaryOp(UnaryOpExpr {
            op: e.op,
            operand: Box::new(t.transform_expr(*e.operand)),
            pos: e.pos,
        }),
        Expression::Call(e) => Expression::Call(CallExpr {
            callee: Box::new(t.transform_expr(*e.callee)),
            args: e
                .args
                .into_iter()
                .map(|arg| t.transform_expr(arg))
                .collect(),
            pos: e.pos,
        }),
        Expression::If(e) => Expression::If(IfExpr {
            condition: Box::new(t.transform_expr(*e.condition)),
            then_value: Box::new(t.transform_expr(*e.then_value)),
            else_value: Box::new(t.transform_expr(*e.else_value)),
            pos: e.pos,
        }),
        Expression::Match(e) => Expression::Match(MatchExpr {
            value: Box::new(t.transform_expr(*e.value)),
            clauses: e
                .clauses
                .into_iter()
                .map(|clause| MatchExprClause {
                    pattern: t.transform_pattern(clause.pattern),
                    value: t.transform_expr(clause.value),
                    pos: clause.pos,
                })
                .collect(),
            else_value: e.else_value.map(|value| Box::new(t.transform_expr(*value))),
            pos: e.pos,
        }),
        Expression::Proc(e) => Expression::Proc(ProcExpr {
            name: e.name,
            formals: e
                .formals
                .into_iter()
                .map(|formal| t.transform_expr(formal))
                .collect(),
            body: Box::new(t.transform_stmt(*e.body)),
            abs: e.abs,
            pos: e.pos,
        }),
        Expression::Fun(e) => Expression::Fun(FunExpr {
            name: e.name,
            formals: e
                .formals
                .into_iter()
                .map(|formal| t.transform_expr(formal))
                .collect(),
            body: Box::new(t.transform_expr(*e.body)),
            abs: e.abs,
            pos: e.pos,
        }),
        Expression::Functor(e) => Expression::Functor(FunctorExpr {
            name: e.name,
            requires: e
                .requires
                .into_iter()
                .map(|import| walk_functor_import(t, import))
                .collect(),
            prepare: e.prepare.map(|body| Box::new(t.transform_stmt(*body))),
            imports: e
                .imports
                .into_iter()
                .map(|import| walk_functor_import(t, import))
                .collect(),
            define: e.define.map(|body| Box::new(t.transform_stmt(*body))),
            exports: e
                .exports
                .into_iter()
                .map(|export| FunctorExport {
                    feature: export.feature,
                    value: t.transform_expr(export.value),
                    pos: export.pos,
                })
                .collect(),
            abs: e.abs,
            pos: e.pos,
        }),
        Expression::CreateAbstraction(e) => Expression::CreateAbstraction(CreateAbstractionExpr {
            abs: e.abs,
            captured: e
                .captured
                .into_iter()
                .map(|captured| t.transform_expr(captured))
                .collect(),
            pos: e.pos,
        }),
    }
}

fn walk_functor_import<T: Transformer + ?Sized>(t: &mut T, import: FunctorImport) -> FunctorImport {
    FunctorImport {
        var: t.transform_expr(import.var),
        name: import.name,
        url: import.url,
        pos: import.pos,
    }
}

pub fn walk_pattern<T: Transformer + ?Sized>(t: &mut T, pattern: Pattern) -> Pattern {
    match pattern {
        Pattern::Wildcard(p) => Pattern::Wildcard(p),
        Pattern::Capture(p) => Pattern::Capture(p),
        Pattern::Literal(p) => Pattern::Literal(p),
        Pattern::Record(p) => Pattern::Record(RecordPattern {
            label: p.label,
            fields: p
                .fields
                .into_iter()
                .map(|field| PatternField {
                    feature: field.feature,
                    pattern: t.transform_pattern(field.pattern),
                })
                .collect(),
            open: p.open,
            pos: p.pos,
        }),
    }
}
