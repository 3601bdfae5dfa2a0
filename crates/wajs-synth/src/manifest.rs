//! The dispatch manifest: everything a host needs to wire a synthesized
//! module, in JSON.

use serde::{Deserialize, Serialize};
use wajs_types::{ExportRecord, SnippetRecord};

/// Module allocator exports used by the string helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorExports {
    pub malloc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free: Option<String>,
}

/// One initialisation block, run once before any snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitBlock {
    /// Scope the block runs in; `None` is the global scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    pub source: String,
}

/// Init blocks of `slots`, one per distinct (library, init) pair, in order of
/// first appearance.
pub fn init_blocks(slots: &[SnippetRecord]) -> Vec<InitBlock> {
    let mut out: Vec<InitBlock> = Vec::new();
    for slot in slots {
        let Some(source) = &slot.init else { continue };
        let block = InitBlock {
            library: slot.library.clone(),
            source: source.clone(),
        };
        if !out.contains(&block) {
            out.push(block);
        }
    }
    out
}

/// Library names of `slots` in order of first appearance.
pub fn libraries(slots: &[SnippetRecord]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for lib in slots.iter().filter_map(|s| s.library.as_deref()) {
        if !out.contains(&lib) {
            out.push(lib);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the synthesizer that wrote the manifest.
    pub version: String,
    pub checksum: String,
    pub slots: Vec<SnippetRecord>,
    #[serde(default)]
    pub inits: Vec<InitBlock>,
    #[serde(default)]
    pub exports: Vec<ExportRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Whether `__wasm_call_ctors` runs before the entry point.
    #[serde(default)]
    pub ctors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocator: Option<AllocatorExports>,
    /// Names of files embedded as custom sections.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub minified: bool,
}

impl Manifest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn slot(&self, id: u32) -> Option<&SnippetRecord> {
        self.slots.get(id as usize).filter(|s| s.id == id)
    }

    pub fn export(&self, name: &str) -> Option<&ExportRecord> {
        self.exports.iter().find(|e| e.name == name)
    }

    pub fn declared_exports(&self) -> impl Iterator<Item = &ExportRecord> {
        self.exports.iter().filter(|e| e.declared)
    }
}
