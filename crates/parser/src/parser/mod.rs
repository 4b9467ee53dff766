//! Recursive-descent parser for the bootstrap subset of Oz.
//!
//! The grammar covered here is the part of Oz the bootstrap compiler
//! consumes: functors, procedures and functions, `local`, `if`, `case`,
//! `for`, `thread`, `try`/`raise`, bindings, calls, records and the
//! operator set. There is no error recovery; the first error aborts.

mod expr;

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::*;
use crate::error::Diagnostic;
use crate::lexer::{preprocess, tokenize, Token};

/// Parse a whole source file as a statement sequence.
pub fn parse_statement(
    source: &str,
    file: &str,
    defines: &HashSet<String>,
) -> Result<Statement, Diagnostic> {
    let mut parser = Parser::from_source(source, file, defines)?;
    let stmt = parser.statement_sequence()?;
    parser.expect_eof()?;
    Ok(stmt)
}

/// Parse a whole source file as a single expression.
pub fn parse_expression(
    source: &str,
    file: &str,
    defines: &HashSet<String>,
) -> Result<Expression, Diagnostic> {
    let mut parser = Parser::from_source(source, file, defines)?;
    let expr = parser.expression()?;
    parser.expect_eof()?;
    Ok(expr)
}

pub(crate) struct Parser {
    tokens: Vec<(Token, Pos)>,
    index: usize,
    eof_pos: Pos,
}

impl Parser {
    fn from_source(source: &str, file: &str, defines: &HashSet<String>) -> Result<Self, Diagnostic> {
        let file: Arc<str> = Arc::from(file);
        let clean = preprocess(source, &file, defines)?;
        let tokens = tokenize(&clean, &file)?;
        let eof_pos = Pos::new(
            file,
            source.lines().count().max(1) as u32,
            source.lines().last().map_or(1, |l| l.chars().count() as u32 + 1),
        );
        Ok(Parser {
            tokens,
            index: 0,
            eof_pos,
        })
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(token, _)| token)
    }

    pub(crate) fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.index + 1).map(|(token, _)| token)
    }

    pub(crate) fn pos(&self) -> Pos {
        self.tokens
            .get(self.index)
            .map(|(_, pos)| pos.clone())
            .unwrap_or_else(|| self.eof_pos.clone())
    }

    pub(crate) fn advance(&mut self) -> Option<(Token, Pos)> {
        let item = self.tokens.get(self.index).cloned();
        if item.is_some() {
            self.index += 1;
        }
        item
    }

    pub(crate) fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, token: Token) -> Result<Pos, Diagnostic> {
        let pos = self.pos();
        match self.peek() {
            Some(found) if *found == token => {
                self.index += 1;
                Ok(pos)
            }
            Some(found) => Err(Diagnostic::new(
                format!("expected {} but found {}", token.describe(), found.describe()),
                pos,
            )),
            None => Err(Diagnostic::new(
                format!("expected {} but found end of file", token.describe()),
                pos,
            )),
        }
    }

    pub(crate) fn expect_variable(&mut self) -> Result<(String, Pos), Diagnostic> {
        let pos = self.pos();
        match self.advance() {
            Some((Token::Variable(name), pos)) => Ok((name, pos)),
            Some((found, pos)) => Err(Diagnostic::new(
                format!("expected a variable but found {}", found.describe()),
                pos,
            )),
            None => Err(Diagnostic::new(
                "expected a variable but found end of file",
                pos,
            )),
        }
    }

    fn expect_eof(&mut self) -> Result<(), Diagnostic> {
        match self.peek() {
            None => Ok(()),
            Some(found) => Err(Diagnostic::new(
                format!("expected end of file but found {}", found.describe()),
                self.pos(),
            )),
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(message, self.pos())
    }

    fn starts_statement(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Local
                    | Token::LBrace
                    | Token::Variable(_)
                    | Token::If
                    | Token::Case
                    | Token::For
                    | Token::Thread
                    | Token::Try
                    | Token::Raise
                    | Token::Skip
                    | Token::Proc
                    | Token::Fun
            )
        )
    }

    /// One or more statements.
    pub(crate) fn statement_sequence(&mut self) -> Result<Statement, Diagnostic> {
        let pos = self.pos();
        let mut statements = Vec::new();
        while self.starts_statement() {
            statements.push(self.statement()?);
        }
        if statements.is_empty() {
            return Err(self.error(match self.peek() {
                Some(found) => format!("expected a statement but found {}", found.describe()),
                None => "expected a statement but found end of file".to_string(),
            }));
        }
        Ok(Statement::seq(statements, pos))
    }

    fn statement(&mut self) -> Result<Statement, Diagnostic> {
        let pos = self.pos();
        match self.peek() {
            Some(Token::Local) => self.local_statement(),
            Some(Token::Skip) => {
                self.advance();
                Ok(Statement::skip(pos))
            }
            Some(Token::If) => {
                self.advance();
                let stmt = self.if_statement_tail(pos)?;
                self.expect(Token::End)?;
                Ok(stmt)
            }
            Some(Token::Case) => self.case_statement(),
            Some(Token::For) => self.for_statement(),
            Some(Token::Thread) => {
                self.advance();
                let body = self.statement_sequence()?;
                self.expect(Token::End)?;
                Ok(Statement::Thread(ThreadStatement {
                    body: Box::new(body),
                    pos,
                }))
            }
            Some(Token::Try) => self.try_statement(),
            Some(Token::Raise) => {
                self.advance();
                let value = self.expression()?;
                self.expect(Token::End)?;
                Ok(Statement::Raise(RaiseStatement { value, pos }))
            }
            Some(Token::Proc) | Some(Token::Fun) => {
                let (head, abstraction) = self.abstraction_expression(true)?;
                let head = head.ok_or_else(|| {
                    Diagnostic::new("an anonymous procedure cannot be a statement", pos.clone())
                })?;
                Ok(build::bind(build::raw_var(head, pos.clone()), abstraction, pos))
            }
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> Result<Statement, Diagnostic> {
        let pos = self.pos();
        let left = self.expression()?;
        if self.eat(&Token::Eq) {
            let right = self.expression()?;
            return Ok(build::bind(left, right, pos));
        }
        match left {
            Expression::Call(call) => Ok(Statement::Call(CallStatement {
                callee: *call.callee,
                args: call.args,
                pos: call.pos,
            })),
            _ => Err(Diagnostic::new("this expression is not a statement", pos)),
        }
    }

    fn local_statement(&mut self) -> Result<Statement, Diagnostic> {
        let pos = self.expect(Token::Local)?;
        let declarations = self.declarations()?;
        self.expect(Token::In)?;
        let body = self.statement_sequence()?;
        self.expect(Token::End)?;
        Ok(Statement::RawLocal(RawLocalStatement {
            declarations,
            body: Box::new(body),
            pos,
        }))
    }

    /// Declarations of a `local`, `prepare` or `define` section.
    pub(crate) fn declarations(&mut self) -> Result<Vec<RawDeclaration>, Diagnostic> {
        let mut declarations = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Variable(_)) => {
                    let (name, pos) = self.expect_variable()?;
                    let initializer = if self.eat(&Token::Eq) {
                        Some(self.expression()?)
                    } else {
                        None
                    };
                    declarations.push(RawDeclaration {
                        name,
                        initializer,
                        pos,
                    });
                }
                Some(Token::Proc) | Some(Token::Fun) => {
                    let pos = self.pos();
                    let (head, abstraction) = self.abstraction_expression(true)?;
                    let name = head.ok_or_else(|| {
                        Diagnostic::new(
                            "a procedure declaration needs a variable head",
                            pos.clone(),
                        )
                    })?;
                    declarations.push(RawDeclaration {
                        name,
                        initializer: Some(abstraction),
                        pos,
                    });
                }
                _ => break,
            }
        }
        if declarations.is_empty() {
            Err(self.error("expected at least one declaration"))
        } else {
            Ok(declarations)
        }
    }

    /// The part of an `if` after the keyword; `elseif` nests another one.
    fn if_statement_tail(&mut self, pos: Pos) -> Result<Statement, Diagnostic> {
        let condition = self.expression()?;
        self.expect(Token::Then)?;
        let then_body = self.statement_sequence()?;
        let else_body = if self.eat(&Token::Else) {
            self.statement_sequence()?
        } else if self.peek() == Some(&Token::Elseif) {
            let elseif_pos = self.pos();
            self.advance();
            self.if_statement_tail(elseif_pos)?
        } else {
            Statement::skip(pos.clone())
        };
        Ok(build::if_stmt(condition, then_body, else_body, pos))
    }

    fn case_statement(&mut self) -> Result<Statement, Diagnostic> {
        let pos = self.expect(Token::Case)?;
        let value = self.expression()?;
        self.expect(Token::Of)?;
        let mut clauses = Vec::new();
        loop {
            let clause_pos = self.pos();
            let pattern = self.pattern()?;
            self.expect(Token::Then)?;
            let body = self.statement_sequence()?;
            clauses.push(MatchClause {
                pattern,
                body,
                pos: clause_pos,
            });
            if !self.eat(&Token::ChoiceSep) {
                break;
            }
        }
        let else_body = if self.eat(&Token::Else) {
            Some(Box::new(self.statement_sequence()?))
        } else {
            None
        };
        self.expect(Token::End)?;
        Ok(Statement::Match(MatchStatement {
            value,
            clauses,
            else_body,
            pos,
        }))
    }

    fn for_statement(&mut self) -> Result<Statement, Diagnostic> {
        let pos = self.expect(Token::For)?;
        let (name, var_pos) = self.expect_variable()?;
        self.expect(Token::In)?;
        let from = self.expression()?;
        self.expect(Token::DotDot)?;
        let to = self.expression()?;
        self.expect(Token::Do)?;
        let body = self.statement_sequence()?;
        self.expect(Token::End)?;
        Ok(Statement::For(ForStatement {
            var: build::raw_var(name, var_pos),
            from,
            to,
            body: Box::new(body),
            pos,
        }))
    }

    fn try_statement(&mut self) -> Result<Statement, Diagnostic> {
        let pos = self.expect(Token::Try)?;
        let body = self.statement_sequence()?;
        self.expect(Token::Catch)?;
        let (name, var_pos) = self.expect_variable()?;
        self.expect(Token::Then)?;
        let catch_body = self.statement_sequence()?;
        self.expect(Token::End)?;
        Ok(Statement::Try(TryStatement {
            body: Box::new(body),
            catch_var: build::raw_var(name, var_pos),
            catch_body: Box::new(catch_body),
            pos,
        }))
    }
}
