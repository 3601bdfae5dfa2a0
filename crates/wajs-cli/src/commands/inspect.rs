use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use wajs_synth::Inspection;

/// Plain-text summary of an inspection.
pub fn render(inspection: &Inspection) -> String {
    let mut out = String::new();
    match &inspection.dispatch {
        Some(info) => {
            let _ = writeln!(out, "synthesized: {} slot(s), checksum {}", info.slots, info.checksum);
        }
        None => out.push_str("linked module (not synthesized)\n"),
    }

    let _ = writeln!(out, "bridge functions: {}", inspection.snippets.len());
    for s in &inspection.snippets {
        let library = s.library.as_deref().map(|l| format!(" [{l}]")).unwrap_or_default();
        let _ = writeln!(out, "  #{} {} {}{library}  ({})", s.id, s.name, s.signature, s.site);
    }

    let _ = writeln!(out, "exports: {}", inspection.exports.len());
    for e in &inspection.exports {
        let marker = if e.declared { "" } else { " (undeclared)" };
        let _ = writeln!(out, "  {} {}{marker}", e.name, e.signature);
    }

    if !inspection.foreign_imports.is_empty() {
        let _ = writeln!(out, "foreign imports: {}", inspection.foreign_imports.join(", "));
    }
    if let Some(entry) = &inspection.entry {
        let _ = writeln!(out, "entry: {entry}{}", if inspection.ctors { " (after ctors)" } else { "" });
    }
    if let Some(alloc) = &inspection.allocator {
        let _ = writeln!(out, "allocator: {}", alloc.malloc);
    }
    if !inspection.files.is_empty() {
        let _ = writeln!(out, "files: {}", inspection.files.join(", "));
    }
    for d in inspection
        .diagnostics
        .errors
        .iter()
        .chain(&inspection.diagnostics.warnings)
    {
        let _ = writeln!(out, "{d}");
    }
    out
}

pub fn run(input: &Path, json: bool) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let inspection =
        wajs_synth::inspect(&bytes).with_context(|| format!("failed to inspect {}", input.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    } else {
        print!("{}", render(&inspection));
    }
    Ok(())
}
