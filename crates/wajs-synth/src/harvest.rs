//! Harvest bridge records from a scanned module and check them against the
//! module itself.
//!
//! Every finding is collected; the caller decides whether errors are fatal.

use std::collections::HashMap;

use wajs_types::metadata::{self, MetadataError, SnippetMeta};
use wajs_types::{Diagnostic, Diagnostics, ErrorCode, ExportRecord, ReturnKind, Signature};

use crate::manifest::AllocatorExports;
use crate::options::SynthOptions;
use crate::scan::{ExportKind, ImportKind, ModuleScan};

/// Entry points tried in order when no entry is configured.
pub const ENTRY_CONVENTION: [&str; 4] = ["WajsMain", "main", "__main_argc_argv", "_start"];

/// Static constructors run before the entry point.
pub const CTORS_EXPORT: &str = "__wasm_call_ctors";

/// Names the generated loader binds at top level. Snippet names and
/// parameters may not shadow them.
pub const LOADER_NAMES: &[&str] = &[
    "WA", "ASM", "MEM", "MU8", "MU16", "MI32", "MU32", "MF32", "MF64", "MStrGet", "MStrPut",
    "MArrPut", "D", "SLOTS", "CHECKSUM", "MEMCHECK",
];

const JS_RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
    "undefined", "NaN", "Infinity",
];

pub fn is_reserved(name: &str) -> bool {
    JS_RESERVED.contains(&name) || LOADER_NAMES.contains(&name)
}

/// A snippet import found in the module.
#[derive(Debug, Clone)]
pub struct HarvestedSnippet {
    /// Position in the import section.
    pub import_index: usize,
    pub func_index: u32,
    pub meta: SnippetMeta,
}

/// Everything the later stages need from the input module.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub snippets: Vec<HarvestedSnippet>,
    pub exports: Vec<ExportRecord>,
    pub entry: Option<String>,
    pub ctors: bool,
    pub allocator: Option<AllocatorExports>,
    pub diagnostics: Diagnostics,
}

impl Harvest {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

fn metadata_error(err: &MetadataError, import: &str) -> Diagnostic {
    let code = match err {
        MetadataError::UnknownKind { .. } => ErrorCode::UNSUPPORTED_KIND,
        MetadataError::NonTrailingDefault(_) => ErrorCode::NON_TRAILING_DEFAULT,
        _ => ErrorCode::MALFORMED_METADATA,
    };
    let mut shown: String = import.chars().take(48).collect();
    shown = shown.replace(metadata::FIELD_SEP, "|").replace(metadata::ITEM_SEP, ",");
    Diagnostic::error(code, format!("bridge import `{shown}`: {err}"))
}

fn check_snippet(
    scan: &ModuleScan,
    snippet: &HarvestedSnippet,
    opts: &SynthOptions,
    out: &mut Diagnostics,
) {
    let meta = &snippet.meta;

    let params = meta.signature.params.iter().map(|p| p.name.as_str());
    for name in std::iter::once(meta.name.as_str()).chain(params) {
        if is_reserved(name) {
            out.push(
                Diagnostic::error(
                    ErrorCode::RESERVED_IDENTIFIER,
                    format!("`{name}` is reserved in host scripts"),
                )
                .at(meta.site.clone())
                .with_suggestion(format!("rename `{name}`")),
            );
        }
    }

    match scan.func_shape(snippet.func_index) {
        Some(shape) if shape.matches(&meta.signature) => {}
        Some(shape) => out.push(
            Diagnostic::error(
                ErrorCode::SIGNATURE_MISMATCH,
                format!(
                    "bridge function `{}` is declared {} but imported as {shape}",
                    meta.name, meta.signature
                ),
            )
            .at(meta.site.clone()),
        ),
        None => out.push(
            Diagnostic::error(
                ErrorCode::SIGNATURE_MISMATCH,
                format!("bridge function `{}` is not imported with a function type", meta.name),
            )
            .at(meta.site.clone()),
        ),
    }

    if !scan.is_referenced(snippet.func_index) {
        let message = format!("bridge function `{}` is imported but never called", meta.name);
        let diagnostic = if opts.allow_unreferenced {
            Diagnostic::warning(ErrorCode::UNREFERENCED_SNIPPET, message)
        } else {
            Diagnostic::error(ErrorCode::UNREFERENCED_SNIPPET, message)
        };
        out.push(diagnostic.at(meta.site.clone()));
    }
}

fn harvest_snippets(scan: &ModuleScan, opts: &SynthOptions, out: &mut Harvest) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (import_index, import) in scan.imports.iter().enumerate() {
        let (ImportKind::Func(_), Some(func_index)) = (import.kind, import.func_index) else {
            if import.module == metadata::SNIPPET_MODULE
                || !opts.allow_imports.contains(&import.module)
            {
                out.diagnostics.push(Diagnostic::error(
                    ErrorCode::FOREIGN_IMPORT,
                    format!(
                        "non-function import `{}.{}` cannot be provided by the loader",
                        import.module,
                        import.name.escape_debug()
                    ),
                ));
            }
            continue;
        };

        if import.module != metadata::SNIPPET_MODULE {
            if !opts.allow_imports.contains(&import.module) {
                out.diagnostics.push(
                    Diagnostic::error(
                        ErrorCode::FOREIGN_IMPORT,
                        format!("import `{}.{}` has no provider", import.module, import.name),
                    )
                    .with_suggestion(format!(
                        "allow the `{}` module in the build options",
                        import.module
                    )),
                );
            }
            continue;
        }

        if metadata::is_slot_name(&import.name) {
            out.diagnostics.push(
                Diagnostic::error(
                    ErrorCode::ALREADY_SYNTHESIZED,
                    format!(
                        "import `{}` is a dispatch slot; the module was already synthesized",
                        import.name
                    ),
                )
                .with_suggestion("run the synthesizer on the linker output"),
            );
            continue;
        }

        let meta = match metadata::decode_snippet(&import.name) {
            Ok(meta) => meta,
            Err(err) => {
                out.diagnostics.push(metadata_error(&err, &import.name));
                continue;
            }
        };
        log::debug!(
            "harvested bridge function `{}` {} from {}",
            meta.name,
            meta.signature,
            meta.site
        );

        let snippet = HarvestedSnippet {
            import_index,
            func_index,
            meta,
        };
        check_snippet(scan, &snippet, opts, &mut out.diagnostics);

        if let Some(&first) = seen.get(&snippet.meta.name) {
            let first = &out.snippets[first].meta;
            out.diagnostics.push(
                Diagnostic::error(
                    ErrorCode::DUPLICATE_SNIPPET,
                    format!("bridge function `{}` is declared more than once", snippet.meta.name),
                )
                .at(snippet.meta.site.clone())
                .related_to(first.site.clone()),
            );
            continue;
        }
        seen.insert(snippet.meta.name.clone(), out.snippets.len());
        out.snippets.push(snippet);
    }
}

fn harvest_exports(scan: &ModuleScan, out: &mut Harvest) {
    let mut declared: Vec<(String, Signature)> = Vec::new();
    for section in scan.customs.iter().filter(|c| c.name == metadata::EXPORTS_SECTION) {
        match metadata::decode_exports(&section.data) {
            Ok(records) => declared.extend(records),
            Err(err) => out.diagnostics.push(Diagnostic::error(
                ErrorCode::MALFORMED_METADATA,
                format!("`{}` section: {err}", metadata::EXPORTS_SECTION),
            )),
        }
    }

    let mut names: HashMap<&str, &Signature> = HashMap::new();
    for (name, signature) in &declared {
        if let Some(previous) = names.insert(name.as_str(), signature) {
            // The same record twice is what two identical statics look like.
            if previous != signature {
                out.diagnostics.push(Diagnostic::error(
                    ErrorCode::DUPLICATE_EXPORT,
                    format!("export `{name}` is declared as both {previous} and {signature}"),
                ));
            }
            continue;
        }
        let Some(index) = scan.func_export(name) else {
            out.diagnostics.push(
                Diagnostic::error(
                    ErrorCode::DECLARED_EXPORT_ABSENT,
                    format!("export `{name}` is declared but the module does not export it"),
                )
                .with_suggestion("check that the linker keeps the symbol"),
            );
            continue;
        };
        match scan.func_shape(index) {
            Some(shape) if shape.matches(signature) => out.exports.push(ExportRecord {
                name: name.clone(),
                signature: signature.clone(),
                function_index: index,
                declared: true,
            }),
            shape => out.diagnostics.push(Diagnostic::error(
                ErrorCode::SIGNATURE_MISMATCH,
                format!(
                    "export `{name}` is declared {signature} but has type {}",
                    shape.map_or_else(|| "unknown".to_string(), ToString::to_string)
                ),
            )),
        }
    }

    // Undeclared function exports stay reachable through ASM when their
    // types fit the vocabulary.
    for export in scan.exports.iter().filter(|e| e.kind == ExportKind::Func) {
        if names.contains_key(export.name.as_str()) {
            continue;
        }
        if let Some(signature) = scan.func_shape(export.index).and_then(|s| s.to_signature()) {
            out.exports.push(ExportRecord {
                name: export.name.clone(),
                signature,
                function_index: export.index,
                declared: false,
            });
        }
    }
}

fn find_allocator(scan: &ModuleScan) -> Option<AllocatorExports> {
    let malloc = scan.func_export("malloc")?;
    let shape = scan.func_shape(malloc)?.to_signature()?;
    let pointer_in_out = shape.arity() == 1 && shape.ret == ReturnKind::Int32;
    pointer_in_out.then(|| AllocatorExports {
        malloc: "malloc".to_string(),
        free: scan.func_export("free").map(|_| "free".to_string()),
    })
}

/// Harvest snippets, exports and loader facts from `scan`.
pub fn harvest(scan: &ModuleScan, opts: &SynthOptions) -> Harvest {
    let mut out = Harvest::default();
    harvest_snippets(scan, opts, &mut out);
    harvest_exports(scan, &mut out);

    if !scan.exports_memory() {
        let message = "module does not export its memory as `memory`";
        let diagnostic = if out.snippets.is_empty() {
            Diagnostic::warning(ErrorCode::MISSING_MEMORY, message)
        } else {
            Diagnostic::error(ErrorCode::MISSING_MEMORY, message)
        };
        out.diagnostics.push(diagnostic);
    }

    out.ctors = scan.func_export(CTORS_EXPORT).is_some();
    out.entry = match &opts.entry {
        Some(entry) => {
            if scan.func_export(entry).is_none() {
                out.diagnostics.push(Diagnostic::error(
                    ErrorCode::DECLARED_EXPORT_ABSENT,
                    format!("configured entry `{entry}` is not an exported function"),
                ));
            }
            Some(entry.clone())
        }
        None => ENTRY_CONVENTION
            .iter()
            .find(|name| scan.func_export(name).is_some())
            .map(|name| name.to_string()),
    };
    out.allocator = find_allocator(scan);

    log::info!(
        "harvested {} bridge function(s), {} export(s), {} error(s), {} warning(s)",
        out.snippets.len(),
        out.exports.len(),
        out.diagnostics.total_errors,
        out.diagnostics.total_warnings
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{ModuleBuilder, Ty};
    use crate::scan::scan;
    use wajs_types::{ArgKind, DeclSite, Param};

    fn meta(name: &str, params: Vec<Param>, ret: ReturnKind, line: u32) -> SnippetMeta {
        SnippetMeta {
            name: name.into(),
            signature: Signature::new(params, ret),
            source: "return 0;".into(),
            library: None,
            init: None,
            site: DeclSite::new("src/lib.rs", line),
        }
    }

    fn harvest_module(m: &ModuleBuilder, opts: &SynthOptions) -> Harvest {
        harvest(&scan(&m.finish()).unwrap(), opts)
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("new"));
        assert!(is_reserved("MU8"));
        assert!(!is_reserved("beep"));
    }

    #[test]
    fn test_reserved_parameter_rejected() {
        let mut m = ModuleBuilder::new();
        let f = m
            .snippet(&meta("f", vec![Param::new("delete", ArgKind::Int32)], ReturnKind::Void, 3))
            .unwrap();
        m.memory(1);
        let main = m.func(&[], &[], |b| {
            b.i32_const(0).call(f);
        });
        m.export_func("main", main);
        let h = harvest_module(&m, &SynthOptions::default());
        assert!(h.diagnostics.contains(ErrorCode::RESERVED_IDENTIFIER));
    }

    #[test]
    fn test_foreign_import_allowed_by_option() {
        let mut m = ModuleBuilder::new();
        let log = m.import_func("env", "log", &[Ty::I32], &[]);
        m.memory(1);
        let main = m.func(&[], &[], |b| {
            b.i32_const(1).call(log);
        });
        m.export_func("main", main);

        let strict = harvest_module(&m, &SynthOptions::default());
        assert!(strict.diagnostics.contains(ErrorCode::FOREIGN_IMPORT));

        let opts = SynthOptions {
            allow_imports: vec!["env".into()],
            ..SynthOptions::default()
        };
        assert!(!harvest_module(&m, &opts).has_errors());
    }

    #[test]
    fn test_entry_convention_order() {
        let mut m = ModuleBuilder::new();
        m.memory(1);
        let a = m.func(&[], &[], |_| {});
        let b = m.func(&[], &[], |_| {});
        m.export_func("_start", a).export_func("main", b);
        let h = harvest_module(&m, &SynthOptions::default());
        assert_eq!(h.entry.as_deref(), Some("main"));
        assert!(!h.ctors);
    }

    #[test]
    fn test_undeclared_i64_export_skipped() {
        let mut m = ModuleBuilder::new();
        m.memory(1);
        let wide = m.func(&[Ty::I64], &[], |_| {});
        let narrow = m.func(&[Ty::F32], &[Ty::F64], |b| {
            b.f64_const(0.0);
        });
        m.export_func("wide", wide).export_func("narrow", narrow);
        let h = harvest_module(&m, &SynthOptions::default());
        let names: Vec<_> = h.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["narrow"]);
        assert!(!h.exports[0].declared);
    }

    #[test]
    fn test_missing_memory_only_fatal_with_snippets() {
        let mut m = ModuleBuilder::new();
        let main = m.func(&[], &[], |_| {});
        m.export_func("main", main);
        let h = harvest_module(&m, &SynthOptions::default());
        assert!(!h.has_errors());
        assert!(h.diagnostics.contains(ErrorCode::MISSING_MEMORY));
    }
}
