//! Bridge functions and exports driven through the native script host.

use std::cell::Cell;
use std::rc::Rc;

use wajs::native;
use wajs::{ExportError, Value};
use wajs_runtime::ScriptHost;

wajs::bridge! {
    /// Sum computed by the host.
    pub fn add(a: i32 = 1, b: i32 = 2) -> i32 {
        "return a + b;"
    }

    fn start_timer(ms: i32) {
        "setTimeout(function () { ASM.onTick(ms); }, ms);"
    }

    fn greet(buf: *mut u8, cap: i32) -> i32 {
        "return MStrPut('hello, world', buf, cap);"
    }

    fn say(text: *const u8) {
        "WA.print(MStrGet(text) + '\\n');"
    }

    #[library("COUNTER")]
    #[init("var calls = 0;")]
    fn count() -> i32 {
        "calls += 1; return calls;"
    }

    fn through_export(x: i32) -> i32 {
        "return ASM.twice(x) + 1;"
    }

    fn mix(i: i32, f: f32, d: f64, u: u32) -> f64 {
        "return i + f + d + u;"
    }
}

thread_local! {
    static TICKS: Cell<(i32, u32)> = const { Cell::new((0, 0)) };
}

#[wajs::export(name = "onTick", name = "tick")]
fn on_tick(ms: i32) {
    TICKS.with(|t| {
        let (_, n) = t.get();
        t.set((ms, n + 1));
    });
}

#[wajs::export]
fn twice(x: i32) -> i32 {
    add(x, x)
}

fn host() -> Rc<ScriptHost> {
    let table = native::export_table().unwrap();
    let host = Rc::new(ScriptHost::new(table.iter().map(|(_, e)| *e)).unwrap());
    native::install(host.clone());
    host
}

fn text_at(host: &ScriptHost, ptr: u32, len: usize) -> Vec<u8> {
    host.with_memory(|m| m.data()[ptr as usize..ptr as usize + len].to_vec())
}

// ══════════════════════════════════════════════════════════════════════════════
// Default stubs
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_default_arguments() {
    let _host = host();
    assert_eq!(add_0(), 3);
    assert_eq!(add_1(5), 7);
    assert_eq!(add(5, 5), 10);
}

#[test]
fn test_default_stub_matches_full_call() {
    let _host = host();
    for a in [-4, 0, 9, i32::MAX] {
        assert_eq!(add_1(a), add(a, 2));
    }
    assert_eq!(add_0(), add(1, 2));
}

#[test]
fn test_scalars_reach_the_host() {
    let _host = host();
    assert_eq!(mix(1, 0.5, 0.25, 4), 5.75);
}

// ══════════════════════════════════════════════════════════════════════════════
// Exports and timers
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_tick_fires_once_with_exact_ms() {
    let host = host();
    TICKS.with(|t| t.set((0, 0)));
    start_timer(250);
    assert_eq!(host.advance(249), 0);
    assert_eq!(TICKS.with(Cell::get), (0, 0));
    assert_eq!(host.advance(1), 1);
    assert_eq!(TICKS.with(Cell::get), (250, 1));
    assert_eq!(host.advance(1_000), 0);
    assert_eq!(TICKS.with(Cell::get), (250, 1));
}

#[test]
fn test_aliases_share_one_function() {
    let table = native::export_table().unwrap();
    let on_tick = table.get("onTick").unwrap();
    let tick = table.get("tick").unwrap();
    assert_eq!(on_tick.invoke as usize, tick.invoke as usize);
    assert_eq!(on_tick.params, &[wajs::ArgKind::Int32]);
    assert_eq!(
        table.get("ontick").unwrap_err(),
        ExportError::Unknown("ontick".into())
    );
}

#[test]
fn test_exports_registered_by_name() {
    let names: Vec<&str> = native::exports().iter().map(|e| e.name).collect();
    assert_eq!(names, ["onTick", "tick", "twice"]);
}

#[test]
fn test_reentrant_export() {
    let host = host();
    assert_eq!(through_export(4), 9);
    assert_eq!(host.call_export("twice", &[Value::I32(6)]).unwrap(), Value::I32(12));
}

// ══════════════════════════════════════════════════════════════════════════════
// Strings and libraries
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_strings_in_owned_memory() {
    let host = host();
    let buf = host.with_memory(|m| m.alloc(16)).unwrap();
    let written = greet(buf as usize as *mut u8, 6);
    assert_eq!(written, 5);
    assert_eq!(text_at(&host, buf, 6), b"hello\0");

    let written = greet(buf as usize as *mut u8, 16);
    assert_eq!(written, 12);
    say(buf as usize as *const u8);
    assert_eq!(host.take_output(), "hello, world\n");
}

#[test]
fn test_library_init_runs_once() {
    let _host = host();
    assert_eq!(count(), 1);
    assert_eq!(count(), 2);
    assert_eq!(count(), 3);
}

#[test]
#[should_panic(expected = "no host installed")]
fn test_call_without_host_panics() {
    native::uninstall();
    add(1, 1);
}
