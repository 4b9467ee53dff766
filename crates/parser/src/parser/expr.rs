//! Expression, pattern and functor parsing.

use crate::ast::*;
use crate::error::Diagnostic;
use crate::lexer::Token;

use super::Parser;

impl Parser {
    pub(crate) fn expression(&mut self) -> Result<Expression, Diagnostic> {
        self.orelse_level()
    }

    fn binary(left: Expression, op: &str, right: Expression, pos: Pos) -> Expression {
        Expression::BinaryOp(BinaryOpExpr {
            left: Box::new(left),
            op: op.to_string(),
            right: Box::new(right),
            pos,
        })
    }

    fn orelse_level(&mut self) -> Result<Expression, Diagnostic> {
        let left = self.andthen_level()?;
        if self.peek() == Some(&Token::Orelse) {
            let pos = self.pos();
            self.advance();
            let right = self.orelse_level()?;
            return Ok(Self::binary(left, "orelse", right, pos));
        }
        Ok(left)
    }

    fn andthen_level(&mut self) -> Result<Expression, Diagnostic> {
        let left = self.comparison_level()?;
        if self.peek() == Some(&Token::Andthen) {
            let pos = self.pos();
            self.advance();
            let right = self.andthen_level()?;
            return Ok(Self::binary(left, "andthen", right, pos));
        }
        Ok(left)
    }

    fn comparison_level(&mut self) -> Result<Expression, Diagnostic> {
        let left = self.hash_level()?;
        let op = match self.peek() {
            Some(Token::EqEq) => "==",
            Some(Token::NotEq) => "\\=",
            Some(Token::Lt) => "<",
            Some(Token::Le) => "=<",
            Some(Token::Gt) => ">",
            Some(Token::Ge) => ">=",
            _ => return Ok(left),
        };
        let pos = self.pos();
        self.advance();
        let right = self.hash_level()?;
        Ok(Self::binary(left, op, right, pos))
    }

    /// `A#B#C` builds one `'#'` tuple, not nested pairs.
    fn hash_level(&mut self) -> Result<Expression, Diagnostic> {
        let pos = self.pos();
        let first = self.additive_level()?;
        if self.peek() != Some(&Token::Hash) {
            return Ok(first);
        }
        let mut fields = vec![RecordField {
            feature: None,
            value: first,
        }];
        while self.eat(&Token::Hash) {
            fields.push(RecordField {
                feature: None,
                value: self.additive_level()?,
            });
        }
        Ok(Expression::Record(RecordExpr {
            label: Box::new(build::atom("#", pos.clone())),
            fields,
            pos,
        }))
    }

    fn additive_level(&mut self) -> Result<Expression, Diagnostic> {
        let mut left = self.multiplicative_level()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => "+",
                Some(Token::Minus) => "-",
                _ => break,
            };
            let pos = self.pos();
            self.advance();
            let right = self.multiplicative_level()?;
            left = Self::binary(left, op, right, pos);
        }
        Ok(left)
    }

    fn multiplicative_level(&mut self) -> Result<Expression, Diagnostic> {
        let mut left = self.unary_level()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => "*",
                Some(Token::Slash) => "/",
                Some(Token::Div) => "div",
                Some(Token::Mod) => "mod",
                _ => break,
            };
            let pos = self.pos();
            self.advance();
            let right = self.unary_level()?;
            left = Self::binary(left, op, right, pos);
        }
        Ok(left)
    }

    fn unary_level(&mut self) -> Result<Expression, Diagnostic> {
        if self.peek() == Some(&Token::Tilde) {
            let pos = self.pos();
            self.advance();
            // Negative literals fold in the parser.
            match self.peek() {
                Some(Token::Int(value)) => {
                    let value = *value;
                    self.advance();
                    return Ok(build::int(-value, pos));
                }
                Some(Token::Float(value)) => {
                    let value = *value;
                    self.advance();
                    return Ok(build::constant(OzValue::Float(-value), pos));
                }
                _ => {}
            }
            let operand = self.unary_level()?;
            return Ok(Expression::UnaryOp(UnaryOpExpr {
                op: "~".to_string(),
                operand: Box::new(operand),
                pos,
            }));
        }
        self.postfix_level()
    }

    fn postfix_level(&mut self) -> Result<Expression, Diagnostic> {
        let mut expr = self.primary()?;
        while self.peek() == Some(&Token::Dot) {
            let pos = self.pos();
            self.advance();
            let feature = self.feature_expression()?;
            expr = build::dot(expr, feature, pos);
        }
        Ok(expr)
    }

    fn feature_expression(&mut self) -> Result<Expression, Diagnostic> {
        let pos = self.pos();
        match self.advance() {
            Some((Token::Atom(name), pos)) => Ok(build::atom(name, pos)),
            Some((Token::QuotedAtom(name), pos)) => Ok(build::atom(name, pos)),
            Some((Token::Int(value), pos)) => Ok(build::int(value, pos)),
            Some((Token::Variable(name), pos)) => Ok(build::raw_var(name, pos)),
            Some((Token::LParen, _)) => {
                let expr = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some((found, pos)) => Err(Diagnostic::new(
                format!("expected a feature but found {}", found.describe()),
                pos,
            )),
            None => Err(Diagnostic::new("expected a feature", pos)),
        }
    }

    fn primary(&mut self) -> Result<Expression, Diagnostic> {
        let pos = self.pos();
        match self.peek() {
            Some(Token::Int(value)) => {
                let value = *value;
                self.advance();
                Ok(build::int(value, pos))
            }
            Some(Token::Float(value)) => {
                let value = *value;
                self.advance();
                Ok(build::constant(OzValue::Float(value), pos))
            }
            Some(Token::True) => {
                self.advance();
                Ok(build::constant(OzValue::Bool(true), pos))
            }
            Some(Token::False) => {
                self.advance();
                Ok(build::constant(OzValue::Bool(false), pos))
            }
            Some(Token::Unit) => {
                self.advance();
                Ok(build::constant(OzValue::Unit, pos))
            }
            Some(Token::Variable(name)) => {
                let name = name.clone();
                self.advance();
                Ok(build::raw_var(name, pos))
            }
            Some(Token::Atom(_)) | Some(Token::QuotedAtom(_)) => {
                let label = match self.advance() {
                    Some((Token::Atom(name), _)) | Some((Token::QuotedAtom(name), _)) => name,
                    _ => unreachable!(),
                };
                if self.peek() == Some(&Token::LParen) {
                    self.record_fields(label, pos)
                } else {
                    Ok(build::atom(label, pos))
                }
            }
            Some(Token::LBrace) => {
                self.advance();
                let callee = self.expression()?;
                let mut args = Vec::new();
                while self.peek() != Some(&Token::RBrace) {
                    if self.peek().is_none() {
                        return Err(self.error("unterminated call"));
                    }
                    args.push(self.expression()?);
                }
                self.expect(Token::RBrace)?;
                Ok(build::call_expr(callee, args, pos))
            }
            Some(Token::LParen) => {
                self.advance();
                let expr = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::If) => {
                self.advance();
                let expr = self.if_expression_tail(pos)?;
                self.expect(Token::End)?;
                Ok(expr)
            }
            Some(Token::Case) => self.case_expression(),
            Some(Token::Proc) | Some(Token::Fun) => {
                let (head, abstraction) = self.abstraction_expression(false)?;
                debug_assert!(head.is_none());
                Ok(abstraction)
            }
            Some(Token::Functor) => self.functor_expression(),
            Some(found) => Err(Diagnostic::new(
                format!("expected an expression but found {}", found.describe()),
                pos,
            )),
            None => Err(Diagnostic::new(
                "expected an expression but found end of file",
                pos,
            )),
        }
    }

    fn record_fields(&mut self, label: String, pos: Pos) -> Result<Expression, Diagnostic> {
        self.expect(Token::LParen)?;
        let mut fields = Vec::new();
        while self.peek() != Some(&Token::RParen) {
            if self.peek().is_none() {
                return Err(self.error("unterminated record"));
            }
            let feature = self.explicit_feature()?;
            fields.push(RecordField {
                feature,
                value: self.expression()?,
            });
        }
        self.expect(Token::RParen)?;
        Ok(Expression::Record(RecordExpr {
            label: Box::new(build::atom(label, pos.clone())),
            fields,
            pos,
        }))
    }

    /// `feature:` prefix of a record field, if present.
    fn explicit_feature(&mut self) -> Result<Option<Expression>, Diagnostic> {
        let has_feature = matches!(
            self.peek(),
            Some(Token::Atom(_) | Token::QuotedAtom(_) | Token::Int(_) | Token::Variable(_))
        ) && self.peek2() == Some(&Token::Colon);
        if !has_feature {
            return Ok(None);
        }
        let feature = match self.advance() {
            Some((Token::Atom(name), pos)) | Some((Token::QuotedAtom(name), pos)) => {
                build::atom(name, pos)
            }
            Some((Token::Int(value), pos)) => build::int(value, pos),
            Some((Token::Variable(name), pos)) => build::raw_var(name, pos),
            _ => unreachable!(),
        };
        self.expect(Token::Colon)?;
        Ok(Some(feature))
    }

    fn if_expression_tail(&mut self, pos: Pos) -> Result<Expression, Diagnostic> {
        let condition = self.expression()?;
        self.expect(Token::Then)?;
        let then_value = self.expression()?;
        let else_value = if self.peek() == Some(&Token::Elseif) {
            let elseif_pos = self.pos();
            self.advance();
            self.if_expression_tail(elseif_pos)?
        } else {
            self.expect(Token::Else)?;
            self.expression()?
        };
        Ok(Expression::If(IfExpr {
            condition: Box::new(condition),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
            pos,
        }))
    }

    fn case_expression(&mut self) -> Result<Expression, Diagnostic> {
        let pos = self.expect(Token::Case)?;
        let value = self.expression()?;
        self.expect(Token::Of)?;
        let mut clauses = Vec::new();
        loop {
            let clause_pos = self.pos();
            let pattern = self.pattern()?;
            self.expect(Token::Then)?;
            let clause_value = self.expression()?;
            clauses.push(MatchExprClause {
                pattern,
                value: clause_value,
                pos: clause_pos,
            });
            if !self.eat(&Token::ChoiceSep) {
                break;
            }
        }
        let else_value = if self.eat(&Token::Else) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        self.expect(Token::End)?;
        Ok(Expression::Match(MatchExpr {
            value: Box::new(value),
            clauses,
            else_value,
            pos,
        }))
    }

    /// `proc {Head X1 ... Xn} S end` or `fun {Head X1 ... Xn} E end`.
    ///
    /// Returns the head variable name when there is one; expression position
    /// requires the anonymous head `$`.
    pub(crate) fn abstraction_expression(
        &mut self,
        allow_named: bool,
    ) -> Result<(Option<String>, Expression), Diagnostic> {
        let pos = self.pos();
        let is_fun = matches!(self.peek(), Some(Token::Fun));
        self.advance();
        self.expect(Token::LBrace)?;

        let head = match self.peek() {
            Some(Token::Dollar) => {
                self.advance();
                None
            }
            Some(Token::Variable(_)) if allow_named => {
                let (name, _) = self.expect_variable()?;
                Some(name)
            }
            _ => {
                return Err(self.error(if allow_named {
                    "expected a procedure head ($ or a variable)"
                } else {
                    "expected the anonymous head $"
                }));
            }
        };

        let mut formals = Vec::new();
        while let Some(Token::Variable(_)) = self.peek() {
            let (name, formal_pos) = self.expect_variable()?;
            formals.push(build::raw_var(name, formal_pos));
        }
        self.expect(Token::RBrace)?;

        let name = head.clone().unwrap_or_default();
        let expr = if is_fun {
            let body = self.expression()?;
            self.expect(Token::End)?;
            Expression::Fun(FunExpr {
                name,
                formals,
                body: Box::new(body),
                abs: None,
                pos,
            })
        } else {
            let body = self.statement_sequence()?;
            self.expect(Token::End)?;
            Expression::Proc(ProcExpr {
                name,
                formals,
                body: Box::new(body),
                abs: None,
                pos,
            })
        };
        Ok((head, expr))
    }

    fn functor_expression(&mut self) -> Result<Expression, Diagnostic> {
        let pos = self.expect(Token::Functor)?;
        self.eat(&Token::Dollar);

        let mut requires = Vec::new();
        let mut prepare = None;
        let mut imports = Vec::new();
        let mut define = None;
        let mut exports = Vec::new();

        loop {
            match self.peek() {
                Some(Token::Require) => {
                    self.advance();
                    requires.extend(self.import_items()?);
                }
                Some(Token::Prepare) => {
                    let section_pos = self.pos();
                    self.advance();
                    prepare = Some(Box::new(self.section_body(section_pos)?));
                }
                Some(Token::Import) => {
                    self.advance();
                    imports.extend(self.import_items()?);
                }
                Some(Token::Define) => {
                    let section_pos = self.pos();
                    self.advance();
                    define = Some(Box::new(self.section_body(section_pos)?));
                }
                Some(Token::Export) => {
                    self.advance();
                    exports.extend(self.export_items()?);
                }
                Some(Token::End) => {
                    self.advance();
                    break;
                }
                _ => return Err(self.error("expected a functor section")),
            }
        }

        Ok(Expression::Functor(FunctorExpr {
            name: String::new(),
            requires,
            prepare,
            imports,
            define,
            exports,
            abs: None,
            pos,
        }))
    }

    fn section_body(&mut self, pos: Pos) -> Result<Statement, Diagnostic> {
        let declarations = self.declarations()?;
        let body = if self.eat(&Token::In) {
            self.statement_sequence()?
        } else {
            Statement::skip(pos.clone())
        };
        Ok(Statement::RawLocal(RawLocalStatement {
            declarations,
            body: Box::new(body),
            pos,
        }))
    }

    fn import_items(&mut self) -> Result<Vec<FunctorImport>, Diagnostic> {
        let mut items = Vec::new();
        while let Some(Token::Variable(_)) = self.peek() {
            let (name, pos) = self.expect_variable()?;
            let url = if self.eat(&Token::At) {
                match self.advance() {
                    Some((Token::QuotedAtom(url), _)) | Some((Token::Atom(url), _)) => Some(url),
                    Some((found, found_pos)) => {
                        return Err(Diagnostic::new(
                            format!("expected a URL atom but found {}", found.describe()),
                            found_pos,
                        ));
                    }
                    None => return Err(self.error("expected a URL atom")),
                }
            } else {
                None
            };
            items.push(FunctorImport {
                var: build::raw_var(name.clone(), pos.clone()),
                name,
                url,
                pos,
            });
        }
        if items.is_empty() {
            Err(self.error("expected at least one import item"))
        } else {
            Ok(items)
        }
    }

    fn export_items(&mut self) -> Result<Vec<FunctorExport>, Diagnostic> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Atom(_) | Token::QuotedAtom(_) | Token::Int(_))
                    if self.peek2() == Some(&Token::Colon) =>
                {
                    let (feature, pos) = match self.advance() {
                        Some((Token::Atom(name), pos)) | Some((Token::QuotedAtom(name), pos)) => {
                            (OzValue::atom(name), pos)
                        }
                        Some((Token::Int(value), pos)) => (OzValue::Int(value), pos),
                        _ => unreachable!(),
                    };
                    self.expect(Token::Colon)?;
                    let (name, _) = self.expect_variable()?;
                    items.push(FunctorExport {
                        feature,
                        value: build::raw_var(name, pos.clone()),
                        pos,
                    });
                }
                Some(Token::Variable(_)) => {
                    let (name, pos) = self.expect_variable()?;
                    // A bare export gets the variable name with its first
                    // character lowercased as feature.
                    let mut feature = String::new();
                    let mut chars = name.chars();
                    if let Some(first) = chars.next() {
                        feature.extend(first.to_lowercase());
                        feature.push_str(chars.as_str());
                    }
                    items.push(FunctorExport {
                        feature: OzValue::atom(feature),
                        value: build::raw_var(name, pos.clone()),
                        pos,
                    });
                }
                _ => break,
            }
        }
        if items.is_empty() {
            Err(self.error("expected at least one export item"))
        } else {
            Ok(items)
        }
    }

    pub(crate) fn pattern(&mut self) -> Result<Pattern, Diagnostic> {
        let pos = self.pos();
        match self.peek() {
            Some(Token::Underscore) => {
                self.advance();
                Ok(Pattern::Wildcard(WildcardPattern { pos }))
            }
            Some(Token::Variable(name)) => {
                let name = name.clone();
                self.advance();
                Ok(Pattern::Capture(CapturePattern {
                    name,
                    symbol: None,
                    pos,
                }))
            }
            Some(Token::Int(value)) => {
                let value = *value;
                self.advance();
                Ok(Pattern::Literal(LiteralPattern {
                    value: OzValue::Int(value),
                    pos,
                }))
            }
            Some(Token::Float(value)) => {
                let value = *value;
                self.advance();
                Ok(Pattern::Literal(LiteralPattern {
                    value: OzValue::Float(value),
                    pos,
                }))
            }
            Some(Token::Tilde) => {
                self.advance();
                match self.advance() {
                    Some((Token::Int(value), _)) => Ok(Pattern::Literal(LiteralPattern {
                        value: OzValue::Int(-value),
                        pos,
                    })),
                    Some((Token::Float(value), _)) => Ok(Pattern::Literal(LiteralPattern {
                        value: OzValue::Float(-value),
                        pos,
                    })),
                    _ => Err(Diagnostic::new("expected a number after ~", pos)),
                }
            }
            Some(Token::True) => {
                self.advance();
                Ok(Pattern::Literal(LiteralPattern {
                    value: OzValue::Bool(true),
                    pos,
                }))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Pattern::Literal(LiteralPattern {
                    value: OzValue::Bool(false),
                    pos,
                }))
            }
            Some(Token::Unit) => {
                self.advance();
                Ok(Pattern::Literal(LiteralPattern {
                    value: OzValue::Unit,
                    pos,
                }))
            }
            Some(Token::Atom(_) | Token::QuotedAtom(_)) => {
                let label = match self.advance() {
                    Some((Token::Atom(name), _)) | Some((Token::QuotedAtom(name), _)) => name,
                    _ => unreachable!(),
                };
                if self.peek() == Some(&Token::LParen) {
                    self.record_pattern(label, pos)
                } else {
                    Ok(Pattern::Literal(LiteralPattern {
                        value: OzValue::atom(label),
                        pos,
                    }))
                }
            }
            Some(found) => Err(Diagnostic::new(
                format!("expected a pattern but found {}", found.describe()),
                pos,
            )),
            None => Err(Diagnostic::new(
                "expected a pattern but found end of file",
                pos,
            )),
        }
    }

    fn record_pattern(&mut self, label: String, pos: Pos) -> Result<Pattern, Diagnostic> {
        self.expect(Token::LParen)?;
        let mut fields = Vec::new();
        let mut open = false;
        loop {
            match self.peek() {
                Some(Token::RParen) => break,
                Some(Token::Ellipsis) => {
                    self.advance();
                    open = true;
                    break;
                }
                None => return Err(self.error("unterminated record pattern")),
                _ => {}
            }
            let feature = self.pattern_feature()?;
            fields.push(PatternField {
                feature,
                pattern: self.pattern()?,
            });
        }
        self.expect(Token::RParen)?;
        Ok(Pattern::Record(RecordPattern {
            label: OzValue::atom(label),
            fields,
            open,
            pos,
        }))
    }

    fn pattern_feature(&mut self) -> Result<Option<OzValue>, Diagnostic> {
        let has_feature = matches!(
            self.peek(),
            Some(Token::Atom(_) | Token::QuotedAtom(_) | Token::Int(_))
        ) && self.peek2() == Some(&Token::Colon);
        if !has_feature {
            return Ok(None);
        }
        let feature = match self.advance() {
            Some((Token::Atom(name), _)) | Some((Token::QuotedAtom(name), _)) => OzValue::atom(name),
            Some((Token::Int(value), _)) => OzValue::Int(value),
            _ => unreachable!(),
        };
        self.expect(Token::Colon)?;
        Ok(Some(feature))
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_expression;
    use crate::ast::*;
    use std::collections::HashSet;

    fn expr(source: &str) -> Expression {
        parse_expression(source, "T.oz", &HashSet::new()).unwrap()
    }

    #[test]
    fn test_precedence() {
        match expr("1 + 2 * 3") {
            Expression::BinaryOp(add) => {
                assert_eq!(add.op, "+");
                assert!(matches!(*add.right, Expression::BinaryOp(ref mul) if mul.op == "*"));
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_comparison_over_arithmetic() {
        match expr("N =< 0 + 1") {
            Expression::BinaryOp(cmp) => assert_eq!(cmp.op, "=<"),
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_negative_literal() {
        assert_eq!(expr("~5").as_constant(), Some(&OzValue::Int(-5)));
    }

    #[test]
    fn test_record_with_features() {
        match expr("point(x:1 y:2)") {
            Expression::Record(record) => {
                assert_eq!(record.fields.len(), 2);
                assert!(record.fields.iter().all(|field| field.feature.is_some()));
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_hash_tuple_is_flat() {
        match expr("1#2#3") {
            Expression::Record(record) => {
                assert_eq!(record.label.as_constant(), Some(&OzValue::atom("#")));
                assert_eq!(record.fields.len(), 3);
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_dot_chain() {
        match expr("A.b.c") {
            Expression::Dot(outer) => match *outer.record {
                Expression::Dot(_) => {}
                other => panic!("unexpected inner {:?}", other),
            },
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_fun_expression() {
        match expr("fun {$ X} X end") {
            Expression::Fun(fun) => {
                assert_eq!(fun.formals.len(), 1);
                assert!(fun.abs.is_none());
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_functor() {
        let parsed = expr("functor export 'F':F define fun {F X} X end end");
        match parsed {
            Expression::Functor(functor) => {
                assert_eq!(functor.exports.len(), 1);
                assert_eq!(functor.exports[0].feature, OzValue::atom("F"));
                assert!(functor.define.is_some());
                assert!(functor.prepare.is_none());
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_functor_import_urls() {
        let parsed = expr("functor import A at 'x-oz://boot/A' B export 'X':X end");
        match parsed {
            Expression::Functor(functor) => {
                assert_eq!(functor.imports.len(), 2);
                assert_eq!(functor.imports[0].url.as_deref(), Some("x-oz://boot/A"));
                assert_eq!(functor.imports[1].url, None);
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_bare_export_feature() {
        let parsed = expr("functor export Foo define Foo = 1 end");
        match parsed {
            Expression::Functor(functor) => {
                assert_eq!(functor.exports[0].feature, OzValue::atom("foo"));
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_open_record_pattern() {
        let parsed = parse_expression("case X of f(a:A ...) then A else 0 end", "T.oz", &HashSet::new())
            .unwrap();
        match parsed {
            Expression::Match(m) => match &m.clauses[0].pattern {
                Pattern::Record(record) => {
                    assert!(record.open);
                    assert_eq!(record.fields.len(), 1);
                }
                other => panic!("unexpected pattern {:?}", other),
            },
            other => panic!("unexpected expression {:?}", other),
        }
    }
}
