use crate::Signature;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a declaration lives in native source, as `file:line`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclSite {
    pub file: String,
    pub line: u32,
}

impl DeclSite {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Parse `file:line`. The file part may itself contain colons.
    pub fn parse(text: &str) -> Option<Self> {
        let (file, line) = text.rsplit_once(':')?;
        if file.is_empty() {
            return None;
        }
        Some(Self::new(file, line.parse().ok()?))
    }
}

impl fmt::Display for DeclSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A bridge function harvested from a linked module.
///
/// `id` is the dispatch slot; it is assigned by the synthesizer in import
/// order and is unique within one artifact, as is `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetRecord {
    pub id: u32,
    pub name: String,
    pub signature: Signature,
    /// Host source text, verbatim.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
    pub site: DeclSite,
}

impl SnippetRecord {
    pub fn arity(&self) -> usize {
        self.signature.arity()
    }
}

/// A native function reachable by name from host code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub name: String,
    pub signature: Signature,
    /// Function index of the entry point in the module.
    pub function_index: u32,
    /// Whether the export was declared through the export macro, as opposed
    /// to merely appearing in the module's export section.
    #[serde(default)]
    pub declared: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_parse() {
        let site = DeclSite::parse("src/main.rs:42").unwrap();
        assert_eq!(site, DeclSite::new("src/main.rs", 42));
        assert_eq!(site.to_string(), "src/main.rs:42");
    }

    #[test]
    fn test_site_parse_windows_path() {
        let site = DeclSite::parse(r"C:\work\lib.rs:7").unwrap();
        assert_eq!(site.file, r"C:\work\lib.rs");
        assert_eq!(site.line, 7);
    }

    #[test]
    fn test_site_parse_rejects_garbage() {
        assert_eq!(DeclSite::parse("no-line"), None);
        assert_eq!(DeclSite::parse(":12"), None);
        assert_eq!(DeclSite::parse("a.rs:x"), None);
    }
}
