//! Conditional-compilation directives.
//!
//! `\ifdef SYM`, `\ifndef SYM`, `\else` and `\endif` are handled line by
//! line before lexing, against the `-D` define set. Excluded lines are
//! replaced by blank lines so positions in the remaining code stay valid.

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::Pos;
use crate::error::Diagnostic;

struct Frame {
    active: bool,
    seen_else: bool,
}

pub fn preprocess(
    source: &str,
    file: &Arc<str>,
    defines: &HashSet<String>,
) -> Result<String, Diagnostic> {
    let mut out = String::with_capacity(source.len());
    let mut stack: Vec<Frame> = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let pos = || Pos::new(file.clone(), index as u32 + 1, 1);
        let trimmed = line.trim_start();

        if let Some(rest) = trimmed.strip_prefix('\\') {
            let mut words = rest.split_whitespace();
            match words.next() {
                Some("ifdef") | Some("ifndef") => {
                    let negate = rest.starts_with("ifndef");
                    let symbol = words.next().ok_or_else(|| {
                        Diagnostic::new("directive is missing a symbol", pos())
                    })?;
                    let enclosing = stack.last().map(|frame| frame.active).unwrap_or(true);
                    let defined = defines.contains(symbol);
                    stack.push(Frame {
                        active: enclosing && (defined != negate),
                        seen_else: false,
                    });
                }
                Some("else") => {
                    let enclosing = if stack.len() >= 2 {
                        stack[stack.len() - 2].active
                    } else {
                        true
                    };
                    match stack.last_mut() {
                        Some(frame) if !frame.seen_else => {
                            frame.seen_else = true;
                            frame.active = enclosing && !frame.active;
                        }
                        _ => {
                            return Err(Diagnostic::new("unexpected \\else", pos()));
                        }
                    }
                }
                Some("endif") => {
                    if stack.pop().is_none() {
                        return Err(Diagnostic::new("unexpected \\endif", pos()));
                    }
                }
                other => {
                    return Err(Diagnostic::new(
                        format!("unknown directive \\{}", other.unwrap_or("")),
                        pos(),
                    ));
                }
            }
            out.push('\n');
            continue;
        }

        if stack.last().map(|frame| frame.active).unwrap_or(true) {
            out.push_str(line);
        }
        out.push('\n');
    }

    if stack.is_empty() {
        Ok(out)
    } else {
        Err(Diagnostic::new(
            "missing \\endif",
            Pos::new(file.clone(), source.lines().count() as u32, 1),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defines(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_ifdef_keeps_lines_when_defined() {
        let file: Arc<str> = Arc::from("T.oz");
        let source = "a\n\\ifdef FOO\nb\n\\else\nc\n\\endif\nd\n";
        let kept = preprocess(source, &file, &defines(&["FOO"])).unwrap();
        assert_eq!(kept, "a\n\n\nb\n\n\n\nd\n");
    }

    #[test]
    fn test_ifdef_drops_lines_when_undefined() {
        let file: Arc<str> = Arc::from("T.oz");
        let source = "\\ifdef FOO\nb\n\\else\nc\n\\endif\n";
        let kept = preprocess(source, &file, &defines(&[])).unwrap();
        assert!(!kept.contains('b'));
        assert!(kept.contains('c'));
    }

    #[test]
    fn test_missing_endif_is_an_error() {
        let file: Arc<str> = Arc::from("T.oz");
        assert!(preprocess("\\ifdef FOO\n", &file, &defines(&[])).is_err());
    }

    #[test]
    fn test_line_numbers_survive() {
        let file: Arc<str> = Arc::from("T.oz");
        let source = "\\ifdef FOO\nskip\n\\endif\nX\n";
        let kept = preprocess(source, &file, &defines(&[])).unwrap();
        // The X is still on line 4.
        assert_eq!(kept.lines().nth(3), Some("X"));
    }
}
