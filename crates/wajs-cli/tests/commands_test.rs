use std::fs;
use std::path::Path;

use tempfile::TempDir;
use wajs_cli::commands::{build, inspect, run};
use wajs_cli::config::WajsConfig;
use wajs_runtime::RuntimeOptions;
use wajs_synth::fixture::ModuleBuilder;
use wajs_synth::SynthOptions;
use wajs_types::metadata::SnippetMeta;
use wajs_types::{ArgKind, DeclSite, Param, ReturnKind, Signature};

fn snippet(name: &str, source: &str, line: u32) -> SnippetMeta {
    SnippetMeta {
        name: name.into(),
        signature: Signature::new(vec![Param::new("n", ArgKind::Int32)], ReturnKind::Void),
        source: source.into(),
        library: None,
        init: None,
        site: DeclSite::new("src/main.rs", line),
    }
}

/// `main` prints 42 at once and 7 after 100 ms.
fn write_linked(dir: &Path) -> std::path::PathBuf {
    let mut m = ModuleBuilder::new();
    let print = m.snippet(&snippet("print_num", "WA.print(n + '\\n');", 3)).unwrap();
    let later = m
        .snippet(&snippet(
            "print_later",
            "setTimeout(function () { WA.print('late ' + n + '\\n'); }, 100);",
            7,
        ))
        .unwrap();
    m.memory(1);
    let main = m.func(&[], &[], |f| {
        f.i32_const(42).call(print);
        f.i32_const(7).call(later);
    });
    m.export_func("main", main);
    let path = dir.join("app.wasm");
    fs::write(&path, m.finish()).unwrap();
    path
}

// ══════════════════════════════════════════════════════════════════════════════
// build
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_build_writes_three_files() {
    let dir = TempDir::new().unwrap();
    let input = write_linked(dir.path());
    let outputs = build::build_file(&input, None, &SynthOptions::default()).unwrap();

    assert_eq!(outputs.wasm, dir.path().join("app.wajs.wasm"));
    assert_eq!(outputs.loader, dir.path().join("app.wajs.js"));
    assert_eq!(outputs.manifest, dir.path().join("app.wajs.manifest.json"));
    assert_eq!(&fs::read(&outputs.wasm).unwrap()[..4], b"\0asm");
    assert!(fs::read_to_string(&outputs.loader).unwrap().contains("print_later"));
    let manifest = fs::read_to_string(&outputs.manifest).unwrap();
    assert!(manifest.contains("\"print_num\""));
}

#[test]
fn test_build_refuses_to_overwrite_input() {
    let dir = TempDir::new().unwrap();
    let input = write_linked(dir.path());
    let err = build::build_file(&input, Some(dir.path().join("app").as_path()), &SynthOptions::default()).unwrap_err();
    assert!(err.to_string().contains("overwrite"));
}

#[test]
fn test_build_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("junk.wasm");
    fs::write(&input, b"junk").unwrap();
    let err = build::build_file(&input, None, &SynthOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("malformed module"));
}

#[test]
fn test_embed_flags_override_config() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "from config").unwrap();
    fs::write(dir.path().join("b.txt"), "from flag").unwrap();
    let config = WajsConfig::parse("[embed]\n\"data.txt\" = \"a.txt\"\n", dir.path()).unwrap();

    let flag = format!("data.txt={}", dir.path().join("b.txt").display());
    let opts = build::build_options(&config, true, &[flag]).unwrap();
    assert!(opts.minify);
    assert_eq!(opts.embed.len(), 1);
    assert_eq!(opts.embed[0].data, b"from flag");

    assert!(build::parse_embed("nopath").is_err());
    assert!(build::parse_embed("=x").is_err());
}

// ══════════════════════════════════════════════════════════════════════════════
// inspect
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_inspect_summary() {
    let dir = TempDir::new().unwrap();
    let input = write_linked(dir.path());
    let linked = wajs_synth::inspect(&fs::read(&input).unwrap()).unwrap();
    let text = inspect::render(&linked);
    assert!(text.starts_with("linked module (not synthesized)"));
    assert!(text.contains("bridge functions: 2"));
    assert!(text.contains("#0 print_num (i32) -> void  (src/main.rs:3)"));
    assert!(text.contains("entry: main"));

    let outputs = build::build_file(&input, None, &SynthOptions::default()).unwrap();
    let built = wajs_synth::inspect(&fs::read(&outputs.wasm).unwrap()).unwrap();
    assert!(inspect::render(&built).starts_with("synthesized: 2 slot(s)"));
}

// ══════════════════════════════════════════════════════════════════════════════
// run
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_run_until_idle() {
    let dir = TempDir::new().unwrap();
    let input = write_linked(dir.path());
    let outputs = build::build_file(&input, None, &SynthOptions::default()).unwrap();

    let report = run::run_module(&outputs.wasm, None, None, RuntimeOptions::default()).unwrap();
    assert_eq!(report.output, "42\nlate 7\n");
    assert_eq!(report.timers_fired, 1);
    assert_eq!(report.pending_timers, 0);
    assert_eq!(report.now, 100);
    assert!(report.warnings.is_empty());
}

#[test]
fn test_run_with_advance() {
    let dir = TempDir::new().unwrap();
    let input = write_linked(dir.path());
    let outputs = build::build_file(&input, None, &SynthOptions::default()).unwrap();

    let report =
        run::run_module(&outputs.wasm, Some(outputs.manifest.as_path()), Some(50), RuntimeOptions::default()).unwrap();
    assert_eq!(report.output, "42\n");
    assert_eq!(report.timers_fired, 0);
    assert_eq!(report.pending_timers, 1);
    assert_eq!(report.now, 50);
}

#[test]
fn test_run_needs_manifest() {
    let dir = TempDir::new().unwrap();
    let input = write_linked(dir.path());
    let err = run::run_module(&input, None, None, RuntimeOptions::default()).unwrap_err();
    assert!(err.to_string().contains("failed to read manifest"));
}
