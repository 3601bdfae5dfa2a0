//! Integration tests for the host script interpreter.
//!
//! Covers scoping, closures, control flow, exceptions, built-ins and the
//! realm callback path used for host objects.

use std::collections::HashMap;

use wajs_script::{EvalError, EvalResult, HostRef, Interpreter, NoRealm, Realm, Value};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn eval(source: &str) -> Value {
    match Interpreter::new().eval_source(&mut NoRealm, source, "test.js") {
        Ok(v) => v,
        Err(e) => panic!("script failed: {e}"),
    }
}

fn eval_str(source: &str) -> String {
    eval(source).to_display_string()
}

fn eval_num(source: &str) -> f64 {
    eval(source).to_number()
}

/// A realm with one host object `HOST`: properties are stored in a map,
/// calling it sums its arguments, and reading `callback` calls back into the
/// interpreter.
#[derive(Default)]
struct MapRealm {
    props: HashMap<String, Value>,
    calls: usize,
}

const HOST: HostRef = HostRef {
    class: 1,
    index: 0,
    tag: 0,
};

impl Realm for MapRealm {
    fn get(&mut self, interp: &Interpreter, _: HostRef, key: &Value) -> EvalResult<Value> {
        let key = key.to_display_string();
        if key == "callback" {
            let f = interp.global("double").unwrap_or_default();
            return interp.call(self, &f, vec![Value::from(21)]);
        }
        Ok(self.props.get(&key).cloned().unwrap_or_default())
    }

    fn set(&mut self, _: &Interpreter, _: HostRef, key: &Value, value: Value) -> EvalResult<()> {
        self.props.insert(key.to_display_string(), value);
        Ok(())
    }

    fn call(&mut self, _: &Interpreter, _: HostRef, args: Vec<Value>) -> EvalResult<Value> {
        self.calls += 1;
        Ok(Value::Number(args.iter().map(Value::to_number).sum()))
    }

    fn type_of(&self, _: HostRef) -> &'static str {
        "function"
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Scoping and closures
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_var_is_function_scoped() {
    assert_eq!(eval_num("function f() { if (true) { var x = 5; } return x; } f()"), 5.0);
}

#[test]
fn test_let_is_block_scoped() {
    let err = Interpreter::new()
        .eval_source(&mut NoRealm, "{ let y = 1; } y", "test.js")
        .unwrap_err();
    assert!(matches!(err, EvalError::Reference(ref name) if name == "y"));
}

#[test]
fn test_function_declarations_hoisted() {
    assert_eq!(eval_num("var r = twice(4); function twice(n) { return n * 2; } r"), 8.0);
}

#[test]
fn test_closure_counter() {
    let source = "
        function counter() {
            var n = 0;
            return function () { n += 1; return n; };
        }
        var c = counter();
        c(); c();
        c()
    ";
    assert_eq!(eval_num(source), 3.0);
}

#[test]
fn test_arrow_functions() {
    assert_eq!(eval_str("[1, 2, 3].map(x => x * x).join('-')"), "1-4-9");
    assert_eq!(eval_num("var add = (a, b) => { return a + b; }; add(2, 3)"), 5.0);
}

#[test]
fn test_const_assignment_fails() {
    let err = Interpreter::new()
        .eval_source(&mut NoRealm, "const k = 1; k = 2;", "test.js")
        .unwrap_err();
    assert!(matches!(err, EvalError::Type(_)));
}

#[test]
fn test_undeclared_assignment_creates_global() {
    let interp = Interpreter::new();
    interp
        .eval_source(&mut NoRealm, "function f() { leaked = 7; } f();", "test.js")
        .unwrap();
    assert_eq!(interp.global("leaked").map(|v| v.to_number()), Some(7.0));
}

// ══════════════════════════════════════════════════════════════════════════════
// Control flow
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_loops_with_break_and_continue() {
    let source = "
        var total = 0;
        for (var i = 0; i < 10; i++) {
            if (i % 2) continue;
            if (i > 6) break;
            total += i;
        }
        var j = 0;
        do { j++; } while (j < 3);
        while (j < 10) j += 4;
        total * 100 + j
    ";
    assert_eq!(eval_num(source), 1211.0);
}

#[test]
fn test_try_catch_finally() {
    let source = "
        var log = [];
        try {
            log.push('a');
            throw new Error('boom');
        } catch (e) {
            log.push(e.message);
        } finally {
            log.push('done');
        }
        log.join(',')
    ";
    assert_eq!(eval_str(source), "a,boom,done");
}

#[test]
fn test_catch_binds_reference_error() {
    let source = "
        var kind;
        try { missingFeature(); } catch (e) { kind = e.name + ':' + e.message; }
        kind
    ";
    assert_eq!(eval_str(source), "ReferenceError:missingFeature is not defined");
}

#[test]
fn test_uncaught_throw_carries_value() {
    let err = Interpreter::new()
        .eval_source(&mut NoRealm, "throw 42;", "test.js")
        .unwrap_err();
    match err {
        EvalError::Thrown(v) => assert_eq!(v.to_number(), 42.0),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_new_unknown_constructor_is_reference_error() {
    let err = Interpreter::new()
        .eval_source(&mut NoRealm, "new AudioContext()", "test.js")
        .unwrap_err();
    assert!(matches!(err, EvalError::Reference(_)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators and built-ins
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_int32_semantics() {
    assert_eq!(eval_num("(0x7fffffff + 1) | 0"), -2147483648.0);
    assert_eq!(eval_num("-1 >>> 0"), 4294967295.0);
    assert_eq!(eval_num("~5"), -6.0);
    assert_eq!(eval_num("Math.imul(65536, 65536)"), 0.0);
}

#[test]
fn test_equality_and_typeof() {
    assert_eq!(eval_str("[1 == '1', 1 === '1', null == undefined, NaN == NaN].join()"), "true,false,true,false");
    assert_eq!(eval_str("typeof notDeclared"), "undefined");
    assert_eq!(eval_str("typeof function () {}"), "function");
    assert_eq!(eval_str("typeof null"), "object");
}

#[test]
fn test_string_methods() {
    assert_eq!(eval_num("'héllo'.length"), 5.0);
    assert_eq!(eval_num("'ABC'.charCodeAt(1)"), 66.0);
    assert_eq!(eval_str("'a,b,c'.split(',').length + ':' + 'abcdef'.slice(-3)"), "3:def");
    assert_eq!(eval_str("String.fromCharCode(72, 105)"), "Hi");
    assert_eq!(eval_str("'7'.padStart(3, '0')"), "007");
}

#[test]
fn test_number_formatting() {
    assert_eq!(eval_str("'' + 1.5"), "1.5");
    assert_eq!(eval_str("'' + 10 / 4"), "2.5");
    assert_eq!(eval_str("(255).toString(16)"), "ff");
    assert_eq!(eval_str("(3.14159).toFixed(2)"), "3.14");
    assert_eq!(eval_str("1 / 0"), "Infinity");
}

#[test]
fn test_objects_and_arrays() {
    let source = "
        var o = { a: 1, b: { c: [1, 2, 3] } };
        o.b.c[5] = 9;
        o['d'] = o.b.c.length;
        Object.keys(o).join('') + o.d + (o.b.c[4] === undefined)
    ";
    assert_eq!(eval_str(source), "abd6true");
}

#[test]
fn test_reduce_and_filter() {
    assert_eq!(eval_num("[1, 2, 3, 4].filter(x => x % 2 == 0).reduce((a, b) => a + b, 0)"), 6.0);
}

// ══════════════════════════════════════════════════════════════════════════════
// Compiled functions and realms
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_compile_function_called_with_args() {
    let interp = Interpreter::new();
    let f = interp
        .compile_function("add", &["a".into(), "b".into()], "return a + b;")
        .unwrap();
    let out = interp
        .call(&mut NoRealm, &f, vec![Value::from(2), Value::from(40)])
        .unwrap();
    assert_eq!(out.to_number(), 42.0);
}

#[test]
fn test_library_scope_shared_between_functions() {
    let interp = Interpreter::new();
    let scope = interp.new_scope();
    let init = wajs_script::parse_program("var hits = 0;", "init").unwrap();
    interp.run_in(&mut NoRealm, &init, &scope).unwrap();
    let bump = interp
        .compile_function_in(&scope, "bump", &[], "hits++; return hits;")
        .unwrap();
    interp.call(&mut NoRealm, &bump, vec![]).unwrap();
    let out = interp.call(&mut NoRealm, &bump, vec![]).unwrap();
    assert_eq!(out.to_number(), 2.0);
    assert!(interp.global("hits").is_none());
}

#[test]
fn test_realm_property_access_and_calls() {
    let interp = Interpreter::new();
    interp.define_global("HOST", Value::Host(HOST));
    let mut realm = MapRealm::default();
    let out = interp
        .eval_source(&mut realm, "HOST.x = 5; HOST(HOST.x, 2) + (typeof HOST)", "test.js")
        .unwrap();
    assert_eq!(out.to_display_string(), "7function");
    assert_eq!(realm.calls, 1);
}

#[test]
fn test_realm_reentry() {
    let interp = Interpreter::new();
    interp.define_global("HOST", Value::Host(HOST));
    let mut realm = MapRealm::default();
    let out = interp
        .eval_source(&mut realm, "function double(n) { return n * 2; } HOST.callback", "test.js")
        .unwrap();
    assert_eq!(out.to_number(), 42.0);
}

#[test]
fn test_step_limit_stops_runaway_loop() {
    let interp = Interpreter::new().with_step_limit(1_000);
    let err = interp
        .eval_source(&mut NoRealm, "for (;;) {}", "spin.js")
        .unwrap_err();
    assert!(matches!(err, EvalError::StepLimit(1_000)));
    assert!(!err.is_catchable());
}
