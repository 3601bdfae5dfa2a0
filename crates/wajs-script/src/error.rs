//! Error types for lexing, parsing and evaluating host scripts.

use crate::value::Value;
use std::fmt;

/// Maximum number of syntax errors kept before the rest are only counted.
pub const MAX_SYNTAX_ERRORS: usize = 20;

/// Source location. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(line: u32, col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            line,
            col,
            end_line,
            end_col,
        }
    }

    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// Span from the start of `self` to the end of `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.line, self.col, other.end_line, other.end_col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// One lexing or parsing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    /// The offending source line, for rendering.
    pub source_line: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

/// Syntax errors collected while reading one script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxErrors {
    /// Name of the script, used as a prefix when rendering.
    pub script: String,
    pub errors: Vec<SyntaxError>,
    pub total: usize,
}

impl SyntaxErrors {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            errors: Vec::new(),
            total: 0,
        }
    }

    pub fn push(&mut self, error: SyntaxError) {
        if self.errors.len() < MAX_SYNTAX_ERRORS {
            self.errors.push(error);
        }
        self.total += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn is_full(&self) -> bool {
        self.total >= MAX_SYNTAX_ERRORS
    }

    pub fn extend(&mut self, other: SyntaxErrors) {
        self.total += other.total - other.errors.len();
        for e in other.errors {
            self.push(e);
        }
    }
}

impl fmt::Display for SyntaxErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(first) => write!(f, "{}:{first}", self.script)?,
            None => write!(f, "{}: no errors", self.script)?,
        }
        if self.total > 1 {
            write!(f, " (+{} more)", self.total - 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxErrors {}

/// Failure raised while running a script.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    /// Read of a name that is declared nowhere.
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    /// Value passed to `throw`.
    #[error("Uncaught {}", .0.to_display_string())]
    Thrown(Value),

    /// Error raised by the embedding host.
    #[error("{0}")]
    Host(String),

    #[error("script exceeded the step limit of {0}")]
    StepLimit(u64),

    #[error("maximum call depth of {0} exceeded")]
    CallDepth(usize),

    #[error("{0}")]
    Syntax(SyntaxErrors),
}

impl EvalError {
    /// Whether `try`/`catch` in script code may intercept this error.
    pub fn is_catchable(&self) -> bool {
        matches!(
            self,
            Self::Reference(_) | Self::Type(_) | Self::Thrown(_) | Self::Host(_)
        )
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to() {
        let a = Span::new(1, 5, 1, 9);
        let b = Span::new(3, 2, 3, 7);
        assert_eq!(a.to(b), Span::new(1, 5, 3, 7));
        assert_eq!(a.to(b).to_string(), "1:5");
    }

    #[test]
    fn test_syntax_errors_cap() {
        let mut all = SyntaxErrors::new("init");
        for i in 0..30 {
            all.push(SyntaxError {
                message: format!("bad {i}"),
                span: Span::point(i + 1, 1),
                source_line: String::new(),
            });
        }
        assert_eq!(all.errors.len(), MAX_SYNTAX_ERRORS);
        assert_eq!(all.total, 30);
        assert!(all.is_full());
        assert_eq!(all.to_string(), "init:1:1: bad 0 (+29 more)");
    }

    #[test]
    fn test_catchable() {
        assert!(EvalError::Reference("document".into()).is_catchable());
        assert!(EvalError::Thrown(Value::Number(1.0)).is_catchable());
        assert!(!EvalError::StepLimit(10).is_catchable());
    }
}
