//! Token definitions for the bootstrap subset of Oz.

use logos::Logos;

fn unquote_atom(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"%[^\n]*")]
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
pub enum Token {
    // Keywords
    #[token("andthen")]
    Andthen,
    #[token("at")]
    At,
    #[token("case")]
    Case,
    #[token("catch")]
    Catch,
    #[token("define")]
    Define,
    #[token("div")]
    Div,
    #[token("do")]
    Do,
    #[token("else")]
    Else,
    #[token("elseif")]
    Elseif,
    #[token("end")]
    End,
    #[token("export")]
    Export,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("fun")]
    Fun,
    #[token("functor")]
    Functor,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("in")]
    In,
    #[token("local")]
    Local,
    #[token("mod")]
    Mod,
    #[token("of")]
    Of,
    #[token("orelse")]
    Orelse,
    #[token("prepare")]
    Prepare,
    #[token("proc")]
    Proc,
    #[token("raise")]
    Raise,
    #[token("require")]
    Require,
    #[token("skip")]
    Skip,
    #[token("then")]
    Then,
    #[token("thread")]
    Thread,
    #[token("true")]
    True,
    #[token("try")]
    Try,
    #[token("unit")]
    Unit,

    // Identifiers and literals
    #[regex("[A-Z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Variable(String),
    #[regex("[a-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Atom(String),
    #[regex(r"'(?:[^'\\]|\\.)*'", unquote_atom)]
    QuotedAtom(String),
    #[regex("[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    // Punctuation and operators
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[]")]
    ChoiceSep,
    #[token("...")]
    Ellipsis,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,
    #[token("==")]
    EqEq,
    #[token("=<")]
    Le,
    #[token("=")]
    Eq,
    #[token(r"\=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">=")]
    Ge,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token(":")]
    Colon,
    #[token("#")]
    Hash,
    #[token("$")]
    Dollar,
    #[token("~")]
    Tilde,
    #[token("_")]
    Underscore,
}

impl Token {
    /// Printable form for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Variable(name) => format!("variable {}", name),
            Token::Atom(name) => format!("atom {}", name),
            Token::QuotedAtom(name) => format!("atom '{}'", name),
            Token::Int(value) => format!("integer {}", value),
            Token::Float(value) => format!("float {:?}", value),
            other => format!("'{}'", other.fixed_text()),
        }
    }

    fn fixed_text(&self) -> &'static str {
        match self {
            Token::Andthen => "andthen",
            Token::At => "at",
            Token::Case => "case",
            Token::Catch => "catch",
            Token::Define => "define",
            Token::Div => "div",
            Token::Do => "do",
            Token::Else => "else",
            Token::Elseif => "elseif",
            Token::End => "end",
            Token::Export => "export",
            Token::False => "false",
            Token::For => "for",
            Token::Fun => "fun",
            Token::Functor => "functor",
            Token::If => "if",
            Token::Import => "import",
            Token::In => "in",
            Token::Local => "local",
            Token::Mod => "mod",
            Token::Of => "of",
            Token::Orelse => "orelse",
            Token::Prepare => "prepare",
            Token::Proc => "proc",
            Token::Raise => "raise",
            Token::Require => "require",
            Token::Skip => "skip",
            Token::Then => "then",
            Token::Thread => "thread",
            Token::True => "true",
            Token::Try => "try",
            Token::Unit => "unit",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::ChoiceSep => "[]",
            Token::Ellipsis => "...",
            Token::DotDot => "..",
            Token::Dot => ".",
            Token::EqEq => "==",
            Token::Le => "=<",
            Token::Eq => "=",
            Token::NotEq => "\\=",
            Token::Lt => "<",
            Token::Ge => ">=",
            Token::Gt => ">",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Colon => ":",
            Token::Hash => "#",
            Token::Dollar => "$",
            Token::Tilde => "~",
            Token::Underscore => "_",
            Token::Variable(_)
            | Token::Atom(_)
            | Token::QuotedAtom(_)
            | Token::Int(_)
            | Token::Float(_) => "",
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "andthen", "at", "case", "catch", "define", "div", "do", "else", "elseif", "end", "export",
    "false", "for", "fun", "functor", "if", "import", "in", "local", "mod", "of", "orelse",
    "prepare", "proc", "raise", "require", "skip", "then", "thread", "true", "try", "unit",
];
