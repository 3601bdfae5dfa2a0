use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use wajs_runtime::{Runtime, RuntimeOptions};
use wajs_synth::Manifest;

/// `<stem>.manifest.json` for `<stem>.wasm`.
pub fn default_manifest(wasm: &Path) -> PathBuf {
    wasm.with_extension("manifest.json")
}

/// What a run printed and reported.
#[derive(Debug)]
pub struct RunReport {
    pub output: String,
    pub timers_fired: usize,
    pub pending_timers: usize,
    pub now: u64,
    pub warnings: Vec<String>,
}

pub fn run_module(
    wasm: &Path,
    manifest: Option<&Path>,
    advance: Option<u64>,
    options: RuntimeOptions,
) -> Result<RunReport> {
    let bytes = fs::read(wasm).with_context(|| format!("failed to read {}", wasm.display()))?;
    let manifest_path = manifest.map_or_else(|| default_manifest(wasm), Path::to_path_buf);
    let text = fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read manifest {}", manifest_path.display()))?;
    let manifest = Manifest::from_json(&text)
        .with_context(|| format!("invalid manifest {}", manifest_path.display()))?;

    // Script errors hold interpreter values, which are not `Send`; keep the text.
    let mut runtime = Runtime::load(&bytes, &manifest, options)
        .map_err(|e| anyhow!("failed to load {}: {e}", wasm.display()))?;
    runtime.start().map_err(|e| anyhow!("entry point failed: {e}"))?;
    let timers_fired = match advance {
        Some(ms) => runtime.advance(ms),
        None => runtime.run_until_idle(),
    };

    let diagnostics = runtime.diagnostics();
    let warnings = diagnostics
        .errors
        .iter()
        .chain(&diagnostics.warnings)
        .map(ToString::to_string)
        .collect();
    Ok(RunReport {
        output: runtime.output().to_string(),
        timers_fired,
        pending_timers: runtime.pending_timers(),
        now: runtime.now(),
        warnings,
    })
}

pub fn run(wasm: &Path, manifest: Option<&Path>, advance: Option<u64>, options: RuntimeOptions) -> Result<()> {
    let report = run_module(wasm, manifest, advance, options)?;
    print!("{}", report.output);
    for warning in &report.warnings {
        log::warn!("{warning}");
    }
    log::info!(
        "{} timer(s) fired, {} pending at {} ms",
        report.timers_fired,
        report.pending_timers,
        report.now
    );
    Ok(())
}
