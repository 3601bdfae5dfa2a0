//! Parser tests over whole scripts: statement forms, automatic statement
//! termination, error recovery and nesting limits.

use wajs_script::ast::*;
use wajs_script::{parse_function, parse_program, SyntaxErrors};

fn parse_ok(source: &str) -> Program {
    match parse_program(source, "test.js") {
        Ok(p) => p,
        Err(errors) => {
            for e in &errors.errors {
                eprintln!("  ERROR: {e}");
            }
            panic!("unexpected parse errors (see above)");
        }
    }
}

fn parse_err(source: &str) -> SyntaxErrors {
    match parse_program(source, "test.js") {
        Ok(_) => panic!("expected parse errors for {source:?}"),
        Err(errors) => errors,
    }
}

// ─────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_typical_snippet_body() {
    let program = parse_ok(
        "var s = MStrGet(ptr);\n\
         if (!s.length) return 0;\n\
         WA.print('[' + s + ']\\n');\n\
         return s.length;",
    );
    assert_eq!(program.body.len(), 4);
    assert!(matches!(program.body[1], Stmt::If { .. }));
    assert!(matches!(program.body[3], Stmt::Return(Some(_), _)));
}

#[test]
fn test_statements_without_semicolons() {
    let program = parse_ok("var a = 1\nvar b = 2\na + b");
    assert_eq!(program.body.len(), 3);
}

#[test]
fn test_return_followed_by_newline_returns_nothing() {
    let program = parse_ok("return\n42");
    assert!(matches!(program.body[0], Stmt::Return(None, _)));
    assert!(matches!(program.body[1], Stmt::Expr(_)));
}

#[test]
fn test_for_loop_parts_optional() {
    let program = parse_ok("for (;;) { break; }");
    match &program.body[0] {
        Stmt::For {
            init, test, update, ..
        } => assert!(init.is_none() && test.is_none() && update.is_none()),
        other => panic!("expected for loop, got {other:?}"),
    }
}

#[test]
fn test_try_requires_handler() {
    let errors = parse_err("try { f(); }");
    assert!(errors.errors[0].message.contains("catch"));
}

#[test]
fn test_catch_without_binding() {
    let program = parse_ok("try { f(); } catch { g(); } finally { h(); }");
    match &program.body[0] {
        Stmt::Try {
            param,
            handler,
            finalizer,
            ..
        } => {
            assert!(param.is_none());
            assert!(handler.is_some() && finalizer.is_some());
        }
        other => panic!("expected try, got {other:?}"),
    }
}

#[test]
fn test_object_literal_forms() {
    let program = parse_ok("var o = { a: 1, 'b c': 2, 3: 4, a2, f(x) { return x; } };");
    let Stmt::Decl { decls, .. } = &program.body[0] else {
        panic!("expected declaration");
    };
    let Some(Expr {
        kind: ExprKind::Object(props),
        ..
    }) = &decls[0].1
    else {
        panic!("expected object literal");
    };
    let keys: Vec<_> = props.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["a", "b c", "3", "a2", "f"]);
}

#[test]
fn test_keyword_property_names() {
    parse_ok("x.default = x.new + x.function;");
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_template_literal_rejected() {
    let errors = parse_err("var s = `x`;");
    assert!(errors.errors[0].message.contains("template"));
}

#[test]
fn test_missing_operand_reports_location() {
    let errors = parse_err("var a = 1;\nvar b = ;");
    assert_eq!(errors.errors[0].span.line, 2);
    assert_eq!(errors.errors[0].source_line, "var b = ;");
}

#[test]
fn test_recovers_after_error() {
    let errors = parse_err("var = 1;\nvar x = (;\nvar ok = 3;");
    assert_eq!(errors.total, 2);
}

#[test]
fn test_deep_nesting_is_an_error_not_a_crash() {
    let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
    let errors = parse_err(&source);
    assert!(errors.errors[0].message.contains("nesting"));
}

#[test]
fn test_function_body_parse() {
    let def = parse_function("f", &["a".to_string()], "return a | 0;").unwrap();
    assert_eq!(def.name.as_deref(), Some("f"));
    assert_eq!(def.params, ["a"]);
}
