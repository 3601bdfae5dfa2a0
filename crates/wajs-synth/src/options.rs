//! Build options for the post-link pass.

use serde::{Deserialize, Serialize};

/// A file carried inside the artifact as a custom section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl EmbeddedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Options controlling synthesis.
///
/// Every field has a default, so a partial `[build]` table in a config file
/// deserializes cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthOptions {
    /// Short generated identifiers, compact loader, no `name` section.
    pub minify: bool,
    /// Strip the `name` section even when not minifying.
    pub strip_names: bool,
    /// Import modules other than `wajs` that the host will provide.
    pub allow_imports: Vec<String>,
    /// Report unreferenced snippets as warnings instead of errors.
    pub allow_unreferenced: bool,
    /// Export to start instead of the usual entry convention.
    pub entry: Option<String>,
    /// URL the loader fetches the module from when the page gives none.
    pub wasm_url: Option<String>,
    /// Files to embed; supplied by the caller rather than a config file.
    #[serde(skip)]
    pub embed: Vec<EmbeddedFile>,
}

impl SynthOptions {
    pub fn minified() -> Self {
        Self {
            minify: true,
            ..Self::default()
        }
    }

    pub fn with_embedded(mut self, file: EmbeddedFile) -> Self {
        self.embed.push(file);
        self
    }

    pub fn strips_names(&self) -> bool {
        self.minify || self.strip_names
    }
}
