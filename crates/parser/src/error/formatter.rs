//! Diagnostic rendering.
//!
//! Renders a diagnostic as `file:line:column: error: message`, followed by
//! the offending source line and a caret under the token when the source is
//! available.

use super::Diagnostic;

pub fn render_diagnostic(diagnostic: &Diagnostic, source: Option<&str>) -> String {
    let mut out = format!("{}: error: {}", diagnostic.pos, diagnostic.message);

    if diagnostic.pos.is_none() {
        return out;
    }

    if let Some(source) = source {
        let line_index = diagnostic.pos.line as usize - 1;
        if let Some(line) = source.lines().nth(line_index) {
            out.push('\n');
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
            out.push_str("  ");
            // The caret lines up with the column, counting characters the
            // way the lexer does.
            let column = diagnostic.pos.column as usize - 1;
            for c in line.chars().take(column) {
                out.push(if c == '\t' { '\t' } else { ' ' });
            }
            out.push('^');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Pos;
    use std::sync::Arc;

    #[test]
    fn test_caret_points_at_column() {
        let diagnostic = Diagnostic::new(
            "unresolved variable Y",
            Pos::new(Arc::from("Foo.oz"), 2, 5),
        );
        let source = "local X in\n{P  Y}\nend\n";
        let rendered = render_diagnostic(&diagnostic, Some(source));

        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "Foo.oz:2:5: error: unresolved variable Y");
        assert_eq!(lines[1], "  {P  Y}");
        assert_eq!(lines[2], "      ^");
    }

    #[test]
    fn test_without_source() {
        let diagnostic = Diagnostic::new("boom", Pos::new(Arc::from("A.oz"), 1, 1));
        assert_eq!(
            render_diagnostic(&diagnostic, None),
            "A.oz:1:1: error: boom"
        );
    }
}
