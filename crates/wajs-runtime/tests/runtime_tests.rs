//! Loading synthesized modules into the in-process host: linking by slot,
//! marshalling, memory growth, export lookup and the timer loop.

use wajs_runtime::{LoadError, Runtime, RuntimeError, RuntimeOptions, ViewKind};
use wajs_synth::fixture::{ModuleBuilder, Ty};
use wajs_synth::{synthesize, Artifact, EmbeddedFile, SynthError, SynthOptions};
use wajs_types::metadata::SnippetMeta;
use wajs_types::{
    ArgKind, DeclSite, ErrorCode, ExportError, ExportRecord, Param, ReturnKind, Signature, Value,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn meta(name: &str, params: Vec<Param>, ret: ReturnKind, source: &str, line: u32) -> SnippetMeta {
    SnippetMeta {
        name: name.into(),
        signature: Signature::new(params, ret),
        source: source.into(),
        library: None,
        init: None,
        site: DeclSite::new("src/main.rs", line),
    }
}

fn add_meta() -> SnippetMeta {
    meta(
        "add",
        vec![
            Param::new("a", ArgKind::Int32).with_default("1"),
            Param::new("b", ArgKind::Int32).with_default("2"),
        ],
        ReturnKind::Int32,
        "return a + b;",
        3,
    )
}

fn build(m: &ModuleBuilder) -> Artifact {
    synthesize(&m.finish(), &SynthOptions::default()).unwrap()
}

fn load(artifact: &Artifact) -> Runtime {
    Runtime::load(&artifact.wasm, &artifact.manifest, RuntimeOptions::default()).unwrap()
}

fn load_err(wasm: &[u8], manifest: &wajs_synth::Manifest) -> LoadError {
    match Runtime::load(wasm, manifest, RuntimeOptions::default()) {
        Err(err) => err,
        Ok(rt) => panic!("expected load to fail, got {rt:?}"),
    }
}

/// `add` with every call shape a caller can produce: both arguments, the
/// second defaulted, both defaulted.
fn add_module() -> ModuleBuilder {
    let mut m = ModuleBuilder::new();
    let add = m.snippet(&add_meta()).unwrap();
    m.memory(1);
    let add_2 = m.func(&[Ty::I32, Ty::I32], &[Ty::I32], |f| {
        f.get(0).get(1).call(add);
    });
    let add_1 = m.func(&[Ty::I32], &[Ty::I32], |f| {
        f.get(0).i32_const(2).call(add);
    });
    let add_0 = m.func(&[], &[Ty::I32], |f| {
        f.i32_const(1).i32_const(2).call(add);
    });
    m.export_func("add", add_2)
        .export_func("add_1", add_1)
        .export_func("add_0", add_0);
    m.declare_export("add", &[ArgKind::Int32, ArgKind::Int32], ReturnKind::Int32)
        .unwrap();
    m
}

fn text_at(rt: &Runtime, ptr: usize, len: usize) -> &[u8] {
    &rt.memory()[ptr..ptr + len]
}

// ══════════════════════════════════════════════════════════════════════════════
// Bridge calls
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_default_stubs_match_full_call() {
    let mut rt = load(&build(&add_module()));
    assert_eq!(rt.call_export("add_0", &[]).unwrap(), Value::I32(3));
    assert_eq!(rt.call_export("add_1", &[Value::I32(5)]).unwrap(), Value::I32(7));
    assert_eq!(
        rt.call_export("add", &[Value::I32(5), Value::I32(5)]).unwrap(),
        Value::I32(10)
    );
    assert_eq!(
        rt.call_export("add_0", &[]).unwrap(),
        rt.call_export("add", &[Value::I32(1), Value::I32(2)]).unwrap()
    );
}

#[test]
fn test_missing_arguments_are_zeroed() {
    let mut rt = load(&build(&add_module()));
    assert_eq!(rt.call_export("add", &[Value::I32(4)]).unwrap(), Value::I32(4));
}

#[test]
fn test_scalars_cross_exactly() {
    let mut m = ModuleBuilder::new();
    let echo_i32 = m
        .snippet(&meta("echo_i32", vec![Param::new("x", ArgKind::Int32)], ReturnKind::Int32, "return x;", 1))
        .unwrap();
    let echo_f32 = m
        .snippet(&meta("echo_f32", vec![Param::new("x", ArgKind::Float32)], ReturnKind::Float32, "return x;", 2))
        .unwrap();
    let echo_f64 = m
        .snippet(&meta("echo_f64", vec![Param::new("x", ArgKind::Float64)], ReturnKind::Float64, "return x;", 3))
        .unwrap();
    m.memory(1);
    for (name, ty, snippet) in [
        ("rt_i32", Ty::I32, echo_i32),
        ("rt_f32", Ty::F32, echo_f32),
        ("rt_f64", Ty::F64, echo_f64),
    ] {
        let f = m.func(&[ty], &[ty], |f| {
            f.get(0).call(snippet);
        });
        m.export_func(name, f);
    }
    let mut rt = load(&build(&m));

    for v in [0, 1, -1, i32::MIN, i32::MAX] {
        assert_eq!(rt.call_export("rt_i32", &[Value::I32(v)]).unwrap(), Value::I32(v));
    }
    for v in [0.1f32, -0.0, f32::MAX, f32::MIN_POSITIVE, 1e-45, 16_777_216.0] {
        let out = rt.call_export("rt_f32", &[Value::F32(v)]).unwrap();
        assert_eq!(out.to_f32().to_bits(), v.to_bits());
    }
    for v in [0.1f64, -0.0, f64::MAX, f64::MIN_POSITIVE, 5e-324, 9_007_199_254_740_992.0] {
        let out = rt.call_export("rt_f64", &[Value::F64(v)]).unwrap();
        assert_eq!(out.to_f64().to_bits(), v.to_bits());
    }
}

#[test]
fn test_print_output_and_library_init() {
    let mut m = ModuleBuilder::new();
    let add = m.snippet(&add_meta()).unwrap();
    let log = m
        .snippet(&SnippetMeta {
            library: Some("LOG".into()),
            init: Some("var lines = 0;".into()),
            ..meta(
                "log_num",
                vec![Param::new("n", ArgKind::Int32)],
                ReturnKind::Void,
                "lines += 1; WA.print(lines + ': ' + n + '\\n');",
                8,
            )
        })
        .unwrap();
    m.memory(1);
    let main = m.func(&[], &[], |f| {
        f.i32_const(5).i32_const(5).call(add).call(log);
        f.i32_const(1).i32_const(2).call(add).call(log);
    });
    m.export_func("main", main);
    let mut rt = load(&build(&m));

    assert_eq!(rt.output(), "");
    rt.start().unwrap();
    assert_eq!(rt.take_output(), "1: 10\n2: 3\n");
    assert!(matches!(rt.start(), Err(RuntimeError::AlreadyStarted)));
}

#[test]
fn test_missing_feature_degrades() {
    let mut m = ModuleBuilder::new();
    let vibrate = m
        .snippet(&meta("vibrate", vec![], ReturnKind::Int32, "navigator.vibrate(20); return 1;", 12))
        .unwrap();
    m.memory(1);
    let buzz = m.func(&[], &[Ty::I32], |f| {
        f.call(vibrate);
    });
    m.export_func("buzz", buzz);
    let mut rt = load(&build(&m));

    assert_eq!(rt.call_export("buzz", &[]).unwrap(), Value::I32(0));
    assert_eq!(rt.call_export("buzz", &[]).unwrap(), Value::I32(0));
    let diagnostics = rt.diagnostics();
    assert!(diagnostics.contains(ErrorCode::FEATURE_UNAVAILABLE));
    assert_eq!(diagnostics.total_warnings, 1);
    assert_eq!(diagnostics.warnings[0].site, Some(DeclSite::new("src/main.rs", 12)));
}

#[test]
fn test_script_error_traps() {
    let mut m = ModuleBuilder::new();
    let boom = m
        .snippet(&meta("boom", vec![], ReturnKind::Void, "throw 'boom';", 20))
        .unwrap();
    m.memory(1);
    let run = m.func(&[], &[], |f| {
        f.call(boom);
    });
    m.export_func("run", run);
    let mut rt = load(&build(&m));

    let err = rt.call_export("run", &[]).unwrap_err();
    assert!(matches!(err, RuntimeError::Trap(_)));
    assert!(err.to_string().contains("boom"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Strings and memory
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_str_put_truncates() {
    let mut m = ModuleBuilder::new();
    let fill = m
        .snippet(&meta(
            "fill",
            vec![Param::new("ptr", ArgKind::Pointer), Param::new("cap", ArgKind::Int32)],
            ReturnKind::Int32,
            "return MStrPut('hello world', ptr, cap);",
            30,
        ))
        .unwrap();
    m.memory(1);
    let f = m.func(&[Ty::I32, Ty::I32], &[Ty::I32], |f| {
        f.get(0).get(1).call(fill);
    });
    m.export_func("fill", f);
    let mut rt = load(&build(&m));

    const AT: usize = 100;
    for cap in [0usize, 1, 2, 6, 11, 12, 40] {
        rt.memory_mut()[AT..AT + 48].fill(0xaa);
        let n = rt
            .call_export("fill", &[Value::I32(AT as i32), Value::I32(cap as i32)])
            .unwrap()
            .to_i32() as usize;
        let expected = if cap == 0 { 0 } else { 11.min(cap - 1) };
        assert_eq!(n, expected, "cap {cap}");
        assert_eq!(text_at(&rt, AT, n), &b"hello world"[..n]);
        let untouched = if cap == 0 {
            AT
        } else {
            assert_eq!(rt.memory()[AT + n], 0, "cap {cap}");
            AT + n + 1
        };
        assert!(rt.memory()[untouched..AT + 48].iter().all(|&b| b == 0xaa), "cap {cap}");
    }
    rt.call_export("fill", &[Value::I32(AT as i32), Value::I32(6)]).unwrap();
    assert_eq!(rt.read_cstr(AT as u32, None), "hello");
}

#[test]
fn test_str_get_and_allocating_put() {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    m.bump_allocator(1024);
    let mut rt = load(&build(&m));

    let ptr = rt.put_cstr("héllo").unwrap();
    assert!(ptr >= 1024);
    let read = rt.eval(&format!("MStrGet({ptr})")).unwrap();
    assert_eq!(read.to_display_string(), "héllo");
    assert_eq!(rt.eval(&format!("MStrGet({ptr}, 1)")).unwrap().to_display_string(), "h");
    assert_eq!(rt.eval("MStrGet(0)").unwrap().to_display_string(), "");

    let copied = rt.eval("MStrPut('abc')").unwrap().to_uint32();
    assert_eq!(rt.read_cstr(copied, None), "abc");
    let bytes = rt.eval("MArrPut([1, 2, 255, 256])").unwrap().to_uint32();
    assert_eq!(text_at(&rt, bytes as usize, 4), &[1, 2, 255, 0]);
}

#[test]
fn test_growth_invalidates_views() {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    m.bump_allocator(1024);
    let mut rt = load(&build(&m));

    let before = rt.view(ViewKind::U8);
    let generation = rt.generation();
    assert_eq!(rt.eval("var old = MU8; old.length").unwrap().to_number(), 65536.0);

    rt.put_cstr(&"x".repeat(70_000)).unwrap();
    assert_eq!(rt.memory().len(), 2 * 65536);
    assert_eq!(rt.generation(), generation + 1);

    let err = rt.read_view(before, 0).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::STALE_VIEW));
    let after = rt.view(ViewKind::U8);
    assert_eq!(rt.read_view(after, 1024).unwrap(), Some(f64::from(b'x')));
    assert!(rt.write_view(after, 131_071, 7.0).unwrap());
    assert!(!rt.write_view(after, 131_072, 7.0).unwrap());

    assert_eq!(rt.eval("MU8.length").unwrap().to_number(), 131072.0);
    assert_eq!(rt.eval("MU8[131071]").unwrap().to_number(), 7.0);
    let stale = rt.eval("old[0]").unwrap_err();
    assert!(stale.to_string().contains("W402"), "{stale}");
}

#[test]
fn test_typed_views_share_memory() {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    let mut rt = load(&build(&m));
    rt.eval("MF64[2] = 0.1; MI32[0] = -2;").unwrap();
    assert_eq!(&rt.memory()[16..24], &0.1f64.to_le_bytes());
    assert_eq!(rt.eval("MU32[0]").unwrap().to_number(), 4_294_967_294.0);
    assert_eq!(rt.eval("MU8[0] + MU8[1]").unwrap().to_number(), 509.0);
    assert_eq!(rt.eval("MF32.BYTES_PER_ELEMENT").unwrap().to_number(), 4.0);
}

#[test]
fn test_embedded_file() {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    let opts = SynthOptions::default().with_embedded(EmbeddedFile::new("data.bin", vec![1, 2, 3]));
    let artifact = synthesize(&m.finish(), &opts).unwrap();
    let mut rt = load(&artifact);

    assert_eq!(rt.embedded_file("data.bin"), Some(&[1u8, 2, 3][..]));
    assert_eq!(rt.embedded_file("other.bin"), None);
    assert_eq!(rt.eval("WA.file('data.bin')[2]").unwrap().to_number(), 3.0);
    assert_eq!(rt.eval("WA.file('other.bin') === null").unwrap().to_display_string(), "true");
}

// ══════════════════════════════════════════════════════════════════════════════
// Exports
// ══════════════════════════════════════════════════════════════════════════════

fn many_exports() -> ModuleBuilder {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    let funcs: Vec<u32> = (0..60)
        .map(|i| {
            m.func(&[], &[Ty::I32], |f| {
                f.i32_const(i * 3);
            })
        })
        .collect();
    for (i, func) in funcs.iter().enumerate() {
        let name = format!("get_{i}");
        m.export_func(&name, *func);
        m.declare_export(&name, &[], ReturnKind::Int32).unwrap();
    }
    m
}

#[test]
fn test_export_lookup_by_name() {
    let mut rt = load(&build(&many_exports()));
    assert_eq!(rt.export_names().len(), 60);
    for i in 0..60 {
        let name = format!("get_{i}");
        assert!(rt.has_export(&name));
        assert_eq!(rt.call_export(&name, &[]).unwrap(), Value::I32(i * 3));
    }

    let err = rt.call_export("get_60", &[]).unwrap_err();
    assert!(matches!(err, RuntimeError::Export(ExportError::Unknown(ref n)) if n == "get_60"));
    assert_eq!(err.code(), Some(ErrorCode::UNKNOWN_EXPORT));
}

#[test]
fn test_exports_through_asm() {
    let mut rt = load(&build(&many_exports()));
    assert_eq!(rt.eval("ASM.get_42()").unwrap().to_number(), 126.0);
    assert_eq!(rt.eval("WA.asm.get_7.name").unwrap().to_display_string(), "get_7");
    assert_eq!(rt.eval("typeof ASM.get_1").unwrap().to_display_string(), "function");
    assert_eq!(rt.eval("typeof ASM.nope").unwrap().to_display_string(), "undefined");
    assert_eq!(rt.eval("WA.hasExport('get_59')").unwrap().to_display_string(), "true");

    let err = rt.eval("ASM.nope()").unwrap_err();
    assert!(err.to_string().contains("TypeError"), "{err}");
    assert!(rt.eval("ASM.get_1 = 5").is_err());
}

// ══════════════════════════════════════════════════════════════════════════════
// Load failures
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_declared_export() {
    let artifact = build(&add_module());
    let mut manifest = artifact.manifest.clone();
    manifest.exports.push(ExportRecord {
        name: "onResize".into(),
        signature: Signature::from_kinds(&[ArgKind::Int32], ReturnKind::Void),
        function_index: 0,
        declared: true,
    });
    let err = load_err(&artifact.wasm, &manifest);
    assert!(matches!(err, LoadError::MissingExport(ref name) if name == "onResize"));
    assert_eq!(err.code(), Some(ErrorCode::MISSING_EXPORT));
}

#[test]
fn test_absent_declared_export_never_loads() {
    let mut m = add_module();
    m.declare_export("onResize", &[ArgKind::Int32], ReturnKind::Void)
        .unwrap();
    match synthesize(&m.finish(), &SynthOptions::default()) {
        Err(SynthError::Invalid(diagnostics)) => {
            assert!(diagnostics.contains(ErrorCode::DECLARED_EXPORT_ABSENT));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(artifact) => panic!("synthesized without `onResize`: {:?}", artifact.manifest.exports),
    }
}

#[test]
fn test_checksum_mismatch() {
    let adds = build(&add_module());
    let mut other = ModuleBuilder::new();
    let beep = other
        .snippet(&meta("beep", vec![Param::new("hz", ArgKind::Float64)], ReturnKind::Void, "WA.print(hz);", 40))
        .unwrap();
    other.memory(1);
    let main = other.func(&[], &[], |f| {
        f.f64_const(440.0).call(beep);
    });
    other.export_func("main", main);
    let beeps = build(&other);

    let err = load_err(&adds.wasm, &beeps.manifest);
    assert!(matches!(err, LoadError::ChecksumMismatch { .. }));
    assert_eq!(err.code(), Some(ErrorCode::CHECKSUM_MISMATCH));
    assert_eq!(err.to_diagnostic().code, ErrorCode::CHECKSUM_MISMATCH);
}

#[test]
fn test_edited_manifest_rejected() {
    let artifact = build(&add_module());
    let mut manifest = artifact.manifest.clone();
    manifest.slots[0].name = "sum".into();
    let err = load_err(&artifact.wasm, &manifest);
    assert!(matches!(err, LoadError::ManifestTampered));
}

#[test]
fn test_unsynthesized_module_rejected() {
    let artifact = build(&add_module());
    let err = load_err(&add_module().finish(), &artifact.manifest);
    assert!(matches!(err, LoadError::MissingDispatch));
    assert_eq!(err.code(), Some(ErrorCode::MALFORMED_MANIFEST));
}

// ══════════════════════════════════════════════════════════════════════════════
// Event loop
// ══════════════════════════════════════════════════════════════════════════════

/// `main` arms a 250 ms timer whose callback calls `onTick(ms)`; `onTick`
/// stores its argument at 16 and counts calls at 20.
fn tick_module() -> ModuleBuilder {
    let mut m = ModuleBuilder::new();
    let arm = m
        .snippet(&meta(
            "arm",
            vec![Param::new("ms", ArgKind::Int32)],
            ReturnKind::Void,
            "setTimeout(function () { ASM.onTick(ms); }, ms);",
            50,
        ))
        .unwrap();
    m.memory(1);
    let main = m.func(&[], &[], |f| {
        f.i32_const(250).call(arm);
    });
    let on_tick = m.func(&[Ty::I32], &[], |f| {
        f.i32_const(0).get(0).i32_store(16);
        f.i32_const(0).i32_const(0).i32_load(20).i32_const(1).i32_add().i32_store(20);
    });
    m.export_func("main", main).export_func("onTick", on_tick);
    m.declare_export("onTick", &[ArgKind::Int32], ReturnKind::Void)
        .unwrap();
    m
}

fn read_i32(rt: &Runtime, at: usize) -> i32 {
    i32::from_le_bytes(rt.memory()[at..at + 4].try_into().unwrap())
}

#[test]
fn test_tick_fires_once_with_exact_ms() {
    let mut rt = load(&build(&tick_module()));
    rt.start().unwrap();
    assert_eq!(rt.pending_timers(), 1);

    assert_eq!(rt.advance(249), 0);
    assert_eq!(read_i32(&rt, 20), 0);
    assert_eq!(rt.advance(1), 1);
    assert_eq!(rt.now(), 250);
    assert_eq!(read_i32(&rt, 16), 250);
    assert_eq!(read_i32(&rt, 20), 1);

    assert_eq!(rt.run_until_idle(), 0);
    assert_eq!(rt.advance(10_000), 0);
    assert_eq!(read_i32(&rt, 20), 1);
}

#[test]
fn test_schedule_and_cancel_export() {
    let mut rt = load(&build(&tick_module()));
    let first = rt.schedule_export("onTick", vec![Value::I32(5)], 5).unwrap();
    let second = rt.schedule_export("onTick", vec![Value::I32(9)], 9).unwrap();
    assert!(rt.cancel(second));
    assert!(!rt.cancel(second));
    assert_ne!(first, second);

    assert_eq!(rt.run_until_idle(), 1);
    assert_eq!(read_i32(&rt, 16), 5);
    assert!(rt.schedule_export("onResize", vec![], 1).is_err());
}

#[test]
fn test_timers_in_host_code() {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    let mut rt = load(&build(&m));
    rt.eval(
        "var order = [];
         setTimeout(function () { order.push('b'); }, 20);
         setTimeout(function () { order.push('a'); }, 10);
         setTimeout(function () { order.push('c'); }, 20);
         var id = setTimeout(function () { order.push('never'); }, 15);
         clearTimeout(id);
         var n = 0;
         var every = setInterval(function () { n += 1; if (n === 3) clearInterval(every); }, 7);",
    )
    .unwrap();

    assert_eq!(rt.run_until_idle(), 6);
    assert_eq!(rt.eval("order.join('')").unwrap().to_display_string(), "abc");
    assert_eq!(rt.eval("n").unwrap().to_number(), 3.0);
    assert_eq!(rt.now(), 21);
}

#[test]
fn test_failing_timer_is_reported() {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    let mut rt = load(&build(&m));
    rt.eval(
        "setTimeout(function () { throw 'late'; }, 1);
         setTimeout(function () { console.log('after', 2); }, 2);",
    )
    .unwrap();
    assert_eq!(rt.run_until_idle(), 2);
    assert_eq!(rt.output(), "after 2\n");
    assert!(rt.diagnostics().contains(ErrorCode::SCRIPT_ERROR));
}

#[test]
fn test_zero_delay_rearm_yields_to_the_clock() {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    let mut rt = load(&build(&m));
    rt.eval("var n = 0; function f() { n += 1; setTimeout(f, 0); } f();")
        .unwrap();

    assert_eq!(rt.advance(10), 11);
    assert_eq!(rt.now(), 10);
    assert_eq!(rt.pending_timers(), 1);
    assert_eq!(rt.eval("n").unwrap().to_number(), 12.0);
}

#[test]
fn test_advance_stops_at_task_limit() {
    let mut m = ModuleBuilder::new();
    m.memory(1);
    let artifact = build(&m);
    let options = RuntimeOptions {
        max_tasks: 5,
        ..RuntimeOptions::default()
    };
    let mut rt = Runtime::load(&artifact.wasm, &artifact.manifest, options).unwrap();
    rt.eval("var n = 0; setInterval(function () { n += 1; }, 1);").unwrap();

    assert_eq!(rt.advance(1_000), 5);
    assert_eq!(rt.now(), 5);
    assert_eq!(rt.eval("n").unwrap().to_number(), 5.0);
    assert_eq!(rt.pending_timers(), 1);
}
