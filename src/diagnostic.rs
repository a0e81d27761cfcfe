//! User-facing rendering of conversion failures.

use std::fmt;

use crate::error::{ErrorKind, TranspileError};

/// A conversion failure ready to show to a user. Every diagnostic is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Short category label, e.g. `unsupported`.
    pub code: &'static str,
    pub message: String,
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn from_error(error: &TranspileError, file: impl Into<String>) -> Self {
        let code = match error.kind {
            ErrorKind::Unsupported(_) => "unsupported",
            ErrorKind::Scope(_) => "scope",
            ErrorKind::Structural(_) => "structure",
        };
        let (line, column) = if error.pos.is_known() {
            (Some(error.pos.line), Some(error.pos.column))
        } else {
            (None, None)
        };
        Self {
            code,
            message: error.message(),
            file: file.into(),
            line,
            column,
        }
    }

    /// Formats the diagnostic, quoting the offending line of `source` with a
    /// caret under the column when both are known.
    pub fn render(&self, source: Option<&str>) -> String {
        let mut out = format!("{self}\n");
        let (Some(line), Some(source)) = (self.line, source) else {
            return out;
        };
        let Some(text) = source.lines().nth(line.saturating_sub(1) as usize) else {
            return out;
        };
        let gutter = line.to_string();
        out.push_str(&format!("{gutter} | {text}\n"));
        if let Some(column) = self.column {
            let pad = " ".repeat(column.saturating_sub(1) as usize);
            out.push_str(&format!("{} | {pad}^\n", " ".repeat(gutter.len())));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{line}:{column}: ", self.file)?,
            (Some(line), None) => write!(f, "{}:{line}: ", self.file)?,
            _ => write!(f, "{}: ", self.file)?,
        }
        write!(f, "error[{}]: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Pos;
    use crate::error::{ScopeError, UnsupportedFeature};

    #[test]
    fn renders_position_and_caret() {
        let error = TranspileError::new(
            Pos::new(2, 5),
            ScopeError::Unresolved {
                name: "b".to_string(),
            },
        );
        let diagnostic = Diagnostic::from_error(&error, "script");
        assert_eq!(diagnostic.to_string(), "script:2:5: error[scope]: unresolved reference 'b'");
        assert_eq!(
            diagnostic.render(Some("a := 1\nc := b + 1\n")),
            "script:2:5: error[scope]: unresolved reference 'b'\n2 | c := b + 1\n  |     ^\n"
        );
    }

    #[test]
    fn unknown_position_omits_location() {
        let error = TranspileError::new(Pos::default(), UnsupportedFeature::Import);
        let diagnostic = Diagnostic::from_error(&error, "main.tengo");
        assert_eq!(diagnostic.line, None);
        assert_eq!(
            diagnostic.render(Some("x := import(\"fmt\")")),
            "main.tengo: error[unsupported]: import expression not supported\n"
        );
    }

    #[test]
    fn line_past_end_of_source_is_not_quoted() {
        let error = TranspileError::new(Pos::new(9, 1), UnsupportedFeature::Export);
        let rendered = Diagnostic::from_error(&error, "script").render(Some("one line"));
        assert_eq!(rendered, "script:9:1: error[unsupported]: export statement not supported\n");
    }
}
