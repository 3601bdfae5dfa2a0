//! wajs post-link synthesizer.
//!
//! # Pipeline
//!
//! ```text
//! linked .wasm → scan → harvest → dispatch table → rewrite → .wasm + loader.js + manifest
//! ```
//!
//! The input is the linker's output: bridge functions are imports from the
//! `wajs` module whose names carry their encoded declarations, and exported
//! functions are described by the `wajs.exports` custom section. The output
//! module imports slot `N` for bridge function `N` and carries a
//! `wajs.dispatch` section the loader checks before linking.

pub mod dispatch;
pub mod error;
pub mod fixture;
pub mod harvest;
pub mod loader;
pub mod manifest;
pub mod options;
pub mod rewrite;
pub mod scan;

use std::collections::HashMap;

use serde::Serialize;
use wajs_types::metadata::{self, DISPATCH_SECTION, FILE_SECTION_PREFIX};
use wajs_types::{Diagnostics, ErrorCode, ExportRecord, SnippetRecord};

pub use dispatch::{DispatchInfo, DispatchTable};
pub use error::{SynthError, SynthResult};
pub use manifest::{AllocatorExports, InitBlock, Manifest};
pub use options::{EmbeddedFile, SynthOptions};

/// Version written into manifests and loaders.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_WASM_URL: &str = "module.wasm";

/// The paired output of one synthesis.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub wasm: Vec<u8>,
    pub loader: String,
    pub manifest: Manifest,
    /// Warnings found while harvesting.
    pub diagnostics: Diagnostics,
}

impl Artifact {
    pub fn manifest_json(&self) -> SynthResult<String> {
        Ok(self.manifest.to_json()?)
    }
}

fn validate_input(bytes: &[u8]) -> SynthResult<()> {
    wasmparser::validate(bytes)
        .map(|_| ())
        .map_err(|e| SynthError::Malformed(e.to_string()))
}

/// Check that the rewritten module imports exactly slots `0..expected` from
/// the bridge module, in order.
fn check_slots(wasm: &[u8], expected: usize) -> SynthResult<()> {
    let rescanned = scan::scan(wasm)?;
    let slots: Vec<&str> = rescanned
        .imports
        .iter()
        .filter(|i| i.module == metadata::SNIPPET_MODULE)
        .map(|i| i.name.as_str())
        .collect();
    let in_order = slots
        .iter()
        .enumerate()
        .all(|(id, name)| *name == id.to_string());
    if slots.len() != expected || !in_order {
        return Err(SynthError::SlotCount {
            expected,
            found: slots.len(),
        });
    }
    Ok(())
}

/// Run the post-link pass over a linked module.
pub fn synthesize(bytes: &[u8], opts: &SynthOptions) -> SynthResult<Artifact> {
    validate_input(bytes)?;
    let scanned = scan::scan(bytes)?;
    let harvest = harvest::harvest(&scanned, opts);
    if harvest.has_errors() {
        return Err(SynthError::Invalid(harvest.diagnostics));
    }

    let renames: HashMap<usize, u32> = harvest
        .snippets
        .iter()
        .enumerate()
        .map(|(id, s)| (s.import_index, id as u32))
        .collect();
    let table = DispatchTable::build(harvest.snippets.into_iter().map(|s| s.meta));

    let wasm = rewrite::rewrite(bytes, &renames, &table.info(), opts)?;
    check_slots(&wasm, table.len())?;

    let slots = table.slots().to_vec();
    let manifest = Manifest {
        version: VERSION.to_string(),
        checksum: table.checksum().to_string(),
        inits: manifest::init_blocks(&slots),
        slots,
        exports: harvest.exports,
        entry: harvest.entry,
        ctors: harvest.ctors,
        allocator: harvest.allocator,
        files: opts.embed.iter().map(|f| f.name.clone()).collect(),
        minified: opts.minify,
    };
    let loader = loader::generate(
        &manifest,
        opts.wasm_url.as_deref().unwrap_or(DEFAULT_WASM_URL),
    );

    log::info!(
        "synthesized {} slot(s), {} export(s): {} -> {} bytes, loader {} bytes",
        table.len(),
        manifest.exports.len(),
        bytes.len(),
        wasm.len(),
        loader.len()
    );
    Ok(Artifact {
        wasm,
        loader,
        manifest,
        diagnostics: harvest.diagnostics,
    })
}

/// What a module declares, for tooling.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    /// Whether the module already went through [`synthesize`].
    pub synthesized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchInfo>,
    pub snippets: Vec<SnippetRecord>,
    pub exports: Vec<ExportRecord>,
    /// Imports from modules other than the bridge, as `module.name`.
    pub foreign_imports: Vec<String>,
    pub entry: Option<String>,
    pub ctors: bool,
    pub allocator: Option<AllocatorExports>,
    pub files: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// Describe a linked or synthesized module without changing it.
pub fn inspect(bytes: &[u8]) -> SynthResult<Inspection> {
    validate_input(bytes)?;
    let scanned = scan::scan(bytes)?;
    let dispatch = match scanned.custom(DISPATCH_SECTION) {
        Some(section) => Some(DispatchInfo::from_bytes(&section.data)?),
        None => None,
    };
    let opts = SynthOptions {
        allow_unreferenced: true,
        ..SynthOptions::default()
    };
    let harvest = harvest::harvest(&scanned, &opts);

    let mut diagnostics = Diagnostics::new();
    for d in harvest
        .diagnostics
        .errors
        .into_iter()
        .chain(harvest.diagnostics.warnings)
    {
        if !(dispatch.is_some() && d.code == ErrorCode::ALREADY_SYNTHESIZED) {
            diagnostics.push(d);
        }
    }

    let snippets = harvest
        .snippets
        .into_iter()
        .enumerate()
        .map(|(id, s)| s.meta.into_record(id as u32))
        .collect();
    Ok(Inspection {
        synthesized: dispatch.is_some(),
        dispatch,
        snippets,
        exports: harvest.exports,
        foreign_imports: scanned
            .imports
            .iter()
            .filter(|i| i.module != metadata::SNIPPET_MODULE)
            .map(|i| format!("{}.{}", i.module, i.name))
            .collect(),
        entry: harvest.entry,
        ctors: harvest.ctors,
        allocator: harvest.allocator,
        files: scanned
            .customs
            .iter()
            .filter_map(|c| c.name.strip_prefix(FILE_SECTION_PREFIX))
            .map(str::to_string)
            .collect(),
        diagnostics,
    })
}
