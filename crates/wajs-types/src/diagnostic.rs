use crate::DeclSite;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of diagnostics of one severity kept in a collection.
pub const MAX_DIAGNOSTICS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic category, determined by code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Declaration,
    Synthesis,
    Load,
    Runtime,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declaration => write!(f, "declaration"),
            Self::Synthesis => write!(f, "synthesis"),
            Self::Load => write!(f, "load"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// Numeric diagnostic code (W100–W499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Declaration (W100–W199) ──
    pub const MALFORMED_METADATA: Self = Self(100);
    pub const UNSUPPORTED_KIND: Self = Self(101);
    pub const NON_TRAILING_DEFAULT: Self = Self(102);
    pub const DUPLICATE_SNIPPET: Self = Self(103);
    pub const DUPLICATE_EXPORT: Self = Self(104);
    pub const RESERVED_IDENTIFIER: Self = Self(105);

    // ── Synthesis (W200–W299) ──
    pub const MALFORMED_MODULE: Self = Self(200);
    pub const UNREFERENCED_SNIPPET: Self = Self(201);
    pub const SIGNATURE_MISMATCH: Self = Self(202);
    pub const SLOT_COUNT_MISMATCH: Self = Self(203);
    pub const FOREIGN_IMPORT: Self = Self(204);
    pub const ALREADY_SYNTHESIZED: Self = Self(205);
    pub const MISSING_MEMORY: Self = Self(206);
    pub const DECLARED_EXPORT_ABSENT: Self = Self(207);

    // ── Load (W300–W399) ──
    pub const MISSING_EXPORT: Self = Self(300);
    pub const MALFORMED_MANIFEST: Self = Self(301);
    pub const CHECKSUM_MISMATCH: Self = Self(302);
    pub const SNIPPET_COMPILE: Self = Self(303);

    // ── Runtime (W400–W499) ──
    pub const UNKNOWN_EXPORT: Self = Self(400);
    pub const FEATURE_UNAVAILABLE: Self = Self(401);
    pub const STALE_VIEW: Self = Self(402);
    pub const SCRIPT_ERROR: Self = Self(403);

    pub fn category(self) -> DiagnosticCategory {
        match self.0 {
            100..=199 => DiagnosticCategory::Declaration,
            200..=299 => DiagnosticCategory::Synthesis,
            300..=399 => DiagnosticCategory::Load,
            _ => DiagnosticCategory::Runtime,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// A structured report from any stage of the bridge.
///
/// Tools render these; they must not parse the message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub category: DiagnosticCategory,
    pub message: String,
    /// Declaration the diagnostic is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<DeclSite>,
    /// Other declarations involved, such as the first of two duplicates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<DeclSite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            site: None,
            related: Vec::new(),
            suggestion: None,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn at(mut self, site: DeclSite) -> Self {
        self.site = Some(site);
        self
    }

    pub fn related_to(mut self, site: DeclSite) -> Self {
        self.related.push(site);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(site) = &self.site {
            write!(f, "{site}: ")?;
        }
        write!(f, "{} [{}] {}", self.code, self.category, self.message)?;
        for other in &self.related {
            write!(f, " (see also {other})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Errors and warnings collected by one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Record a diagnostic by its severity, respecting [`MAX_DIAGNOSTICS`].
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let (list, total) = match diagnostic.severity {
            Severity::Error => (&mut self.errors, &mut self.total_errors),
            Severity::Warning => (&mut self.warnings, &mut self.total_warnings),
        };
        if list.len() < MAX_DIAGNOSTICS {
            list.push(diagnostic);
        }
        *total += 1;
    }

    pub fn extend(&mut self, other: Diagnostics) {
        for d in other.errors.into_iter().chain(other.warnings) {
            self.push(d);
        }
    }

    /// True when some stored error carries `code`.
    pub fn contains(&self, code: ErrorCode) -> bool {
        self.errors.iter().chain(&self.warnings).any(|d| d.code == code)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.errors {
            writeln!(f, "{d}")?;
        }
        let hidden = self.total_errors - self.errors.len();
        if hidden > 0 {
            writeln!(f, "... and {hidden} more error(s)")?;
        }
        write!(f, "{} error(s), {} warning(s)", self.total_errors, self.total_warnings)
    }
}

impl std::error::Error for Diagnostics {}
