//! Source positions attached to expressions for diagnostics.

use std::fmt;
use std::sync::Arc;

/// A location in a component-definition source file.
///
/// Lines and columns are 1-based. A line of `0` means the position is
/// unknown (for example, an expression bound programmatically).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Position {
    /// Source file name, if known.
    pub file: Option<Arc<str>>,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl Position {
    /// A position without a file name.
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            file: None,
            line,
            column,
        }
    }

    /// A position inside a named file.
    pub fn in_file(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
            column,
        }
    }

    /// The unknown position.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Whether this position carries no location information.
    pub fn is_unknown(&self) -> bool {
        self.line == 0 && self.file.is_none()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (None, 0) => f.write_str("<unknown>"),
            (Some(file), 0) => f.write_str(file),
            (Some(file), line) => write!(f, "{file}:{line}:{}", self.column),
            (None, line) => write!(f, "{line}:{}", self.column),
        }
    }
}
