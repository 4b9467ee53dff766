//! Lexer for the bootstrap subset of Oz.

mod preprocess;
mod token;

pub use preprocess::preprocess;
pub use token::{Token, KEYWORDS};

use std::sync::Arc;

use logos::Logos;

use crate::ast::Pos;
use crate::error::Diagnostic;

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Byte offset to line/column translation.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        LineIndex { line_starts }
    }

    fn pos_at(&self, source: &str, offset: usize, file: &Arc<str>) -> Pos {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let start = self.line_starts[line];
        let column = source[start..offset].chars().count();
        Pos::new(file.clone(), line as u32 + 1, column as u32 + 1)
    }
}

/// Tokenize a whole (preprocessed) source buffer.
pub fn tokenize(source: &str, file: &Arc<str>) -> Result<Vec<(Token, Pos)>, Diagnostic> {
    let index = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let pos = index.pos_at(source, lexer.span().start, file);
        match result {
            Ok(token) => tokens.push((token, pos)),
            Err(()) => {
                return Err(Diagnostic::new(
                    format!("unrecognized character sequence '{}'", lexer.slice()),
                    pos,
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        let file: Arc<str> = Arc::from("T.oz");
        tokenize(source, &file)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            lex("local Xa in foo end"),
            vec![
                Token::Local,
                Token::Variable("Xa".into()),
                Token::In,
                Token::Atom("foo".into()),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_quoted_atoms() {
        assert_eq!(
            lex(r"'Foo' 'a b' 'don\'t'"),
            vec![
                Token::QuotedAtom("Foo".into()),
                Token::QuotedAtom("a b".into()),
                Token::QuotedAtom("don't".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex("42 3.14"),
            vec![Token::Int(42), Token::Float(3.14)]
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            lex("== =< = .. . ... []"),
            vec![
                Token::EqEq,
                Token::Le,
                Token::Eq,
                Token::DotDot,
                Token::Dot,
                Token::Ellipsis,
                Token::ChoiceSep,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            lex("a % line comment\n/* block\ncomment */ b"),
            vec![Token::Atom("a".into()), Token::Atom("b".into())]
        );
    }

    #[test]
    fn test_positions() {
        let file: Arc<str> = Arc::from("T.oz");
        let tokens = tokenize("ab\n  cd", &file).unwrap();
        assert_eq!(tokens[0].1.line, 1);
        assert_eq!(tokens[0].1.column, 1);
        assert_eq!(tokens[1].1.line, 2);
        assert_eq!(tokens[1].1.column, 3);
    }

    #[test]
    fn test_bad_character() {
        let file: Arc<str> = Arc::from("T.oz");
        assert!(tokenize("a ? b", &file).is_err());
    }
}
