//! Tree-walking evaluator.
//!
//! The interpreter takes `&self` everywhere so host code reached through a
//! [`Realm`] may call back into it. Mutable state lives behind `Cell`s and the
//! shared scope chain.

use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::ast::*;
use crate::builtins;
use crate::env::{Assign, Scope};
use crate::error::{EvalError, EvalResult, SyntaxErrors};
use crate::parser::{parse_function, parse_program};
use crate::realm::Realm;
use crate::value::{BuiltinFn, Closure, Object, Value};

/// Statements and calls allowed per outermost entry.
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Nested script function calls allowed before failing.
pub const MAX_CALL_DEPTH: usize = 64;

/// Largest array index a script may write.
const MAX_ARRAY_INDEX: usize = 1 << 24;

/// How a statement finished.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// A place that can be read and written.
enum Place {
    Name(String),
    Property(Value, Value),
}

#[derive(Clone)]
pub struct Interpreter {
    globals: Rc<Scope>,
    steps: Rc<Cell<u64>>,
    step_limit: u64,
    depth: Rc<Cell<usize>>,
    entries: Rc<Cell<usize>>,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("globals", &self.globals.names())
            .field("steps", &self.steps.get())
            .field("step_limit", &self.step_limit)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the entry count when an outermost call unwinds.
struct Entry<'a>(&'a Cell<usize>);

impl Drop for Entry<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl Interpreter {
    /// An interpreter with the standard built-ins installed.
    pub fn new() -> Self {
        let globals = Scope::global();
        builtins::install(&globals);
        Self {
            globals,
            steps: Rc::new(Cell::new(0)),
            step_limit: DEFAULT_STEP_LIMIT,
            depth: Rc::new(Cell::new(0)),
            entries: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn globals(&self) -> &Rc<Scope> {
        &self.globals
    }

    /// Steps used since the current outermost entry began.
    pub fn steps_used(&self) -> u64 {
        self.steps.get()
    }

    pub fn define_global(&self, name: &str, value: Value) {
        self.globals.declare(name, value, true);
    }

    /// Assign a global, declaring it when absent.
    pub fn set_global(&self, name: &str, value: Value) {
        if self.globals.assign(name, value.clone()) != Assign::Done {
            self.globals.declare(name, value, true);
        }
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.lookup(name)
    }

    /// A fresh function scope below the globals, for grouping related code.
    pub fn new_scope(&self) -> Rc<Scope> {
        Scope::function(&self.globals)
    }

    // ── Entry Points ──────────────────────────────────────────────────────────

    fn entry(&self) -> Entry<'_> {
        if self.entries.get() == 0 {
            self.steps.set(0);
            self.depth.set(0);
        }
        self.entries.set(self.entries.get() + 1);
        Entry(&self.entries)
    }

    /// Run a program in the global scope. Yields the value of the last
    /// top-level expression statement.
    pub fn run(&self, realm: &mut dyn Realm, program: &Program) -> EvalResult<Value> {
        let scope = Rc::clone(&self.globals);
        self.run_in(realm, program, &scope)
    }

    pub fn run_in(
        &self,
        realm: &mut dyn Realm,
        program: &Program,
        scope: &Rc<Scope>,
    ) -> EvalResult<Value> {
        let _entry = self.entry();
        hoist_vars(&program.body, scope);
        self.hoist_functions(&program.body, scope);
        let mut completion = Value::Undefined;
        for stmt in &program.body {
            if let Stmt::Expr(expr) = stmt {
                self.tick()?;
                completion = self.eval(realm, expr, scope)?;
                continue;
            }
            if let Flow::Return(value) = self.exec_stmt(realm, stmt, scope)? {
                return Ok(value);
            }
        }
        Ok(completion)
    }

    pub fn eval_source(
        &self,
        realm: &mut dyn Realm,
        text: &str,
        script: &str,
    ) -> EvalResult<Value> {
        let program = parse_program(text, script).map_err(EvalError::Syntax)?;
        self.run(realm, &program)
    }

    /// Compile `body` into a function closing over the globals.
    pub fn compile_function(
        &self,
        name: &str,
        params: &[String],
        body: &str,
    ) -> Result<Value, SyntaxErrors> {
        self.compile_function_in(&self.globals, name, params, body)
    }

    pub fn compile_function_in(
        &self,
        scope: &Rc<Scope>,
        name: &str,
        params: &[String],
        body: &str,
    ) -> Result<Value, SyntaxErrors> {
        let def = parse_function(name, params, body)?;
        Ok(Value::Function(Rc::new(Closure {
            def,
            scope: Rc::clone(scope),
        })))
    }

    /// Call any callable value from outside the interpreter.
    pub fn call(
        &self,
        realm: &mut dyn Realm,
        callee: &Value,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let _entry = self.entry();
        self.call_value(realm, callee, args)
    }

    // ── Metering ──────────────────────────────────────────────────────────────

    fn tick(&self) -> EvalResult<()> {
        let used = self.steps.get() + 1;
        self.steps.set(used);
        if used > self.step_limit {
            return Err(EvalError::StepLimit(self.step_limit));
        }
        Ok(())
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn hoist_functions(&self, stmts: &[Stmt], scope: &Rc<Scope>) {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    let closure = Closure {
                        def: Rc::clone(def),
                        scope: Rc::clone(scope),
                    };
                    scope.declare(name, Value::Function(Rc::new(closure)), true);
                }
            }
        }
    }

    fn exec_block(
        &self,
        realm: &mut dyn Realm,
        stmts: &[Stmt],
        scope: &Rc<Scope>,
    ) -> EvalResult<Flow> {
        self.hoist_functions(stmts, scope);
        for stmt in stmts {
            match self.exec_stmt(realm, stmt, scope)? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, realm: &mut dyn Realm, stmt: &Stmt, scope: &Rc<Scope>) -> EvalResult<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Decl { kind, decls, .. } => {
                for (name, init) in decls {
                    let value = match init {
                        Some(expr) => Some(self.eval(realm, expr, scope)?),
                        None => None,
                    };
                    match kind {
                        DeclKind::Var => scope.declare_var(name, value),
                        DeclKind::Let => scope.declare(name, value.unwrap_or_default(), true),
                        DeclKind::Const => scope.declare(name, value.unwrap_or_default(), false),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(realm, expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Return(value, _) => {
                let value = match value {
                    Some(expr) => self.eval(realm, expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If { cond, then, els } => {
                if self.eval(realm, cond, scope)?.truthy() {
                    self.exec_stmt(realm, then, scope)
                } else if let Some(els) = els {
                    self.exec_stmt(realm, els, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(realm, cond, scope)?.truthy() {
                    self.tick()?;
                    match self.exec_stmt(realm, body, scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, cond } => {
                loop {
                    self.tick()?;
                    match self.exec_stmt(realm, body, scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(realm, cond, scope)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let loop_scope = Scope::block(scope);
                if let Some(init) = init {
                    self.exec_stmt(realm, init, &loop_scope)?;
                }
                loop {
                    self.tick()?;
                    if let Some(test) = test {
                        if !self.eval(realm, test, &loop_scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec_stmt(realm, body, &loop_scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(realm, update, &loop_scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => self.exec_block(realm, stmts, &Scope::block(scope)),
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::Throw(expr, _) => Err(EvalError::Thrown(self.eval(realm, expr, scope)?)),
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(realm, block, &Scope::block(scope));
                let caught = match (&result, handler) {
                    (Err(err), Some(handler)) if err.is_catchable() => {
                        Some((error_value(err), handler))
                    }
                    _ => None,
                };
                if let Some((thrown, handler)) = caught {
                    let catch_scope = Scope::block(scope);
                    if let Some(param) = param {
                        catch_scope.declare(param, thrown, true);
                    }
                    result = self.exec_block(realm, handler, &catch_scope);
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(realm, finalizer, &Scope::block(scope))? {
                        Flow::Normal => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                result
            }
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn eval(&self, realm: &mut dyn Realm, expr: &Expr, scope: &Rc<Scope>) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(Rc::clone(s))),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined | ExprKind::This => Ok(Value::Undefined),
            ExprKind::Ident(name) => scope
                .lookup(name)
                .ok_or_else(|| EvalError::Reference(name.clone())),
            ExprKind::Array(items) => Ok(Value::array(self.eval_list(realm, items, scope)?)),
            ExprKind::Object(props) => {
                let mut obj = Object::new();
                for (key, value) in props {
                    obj.set(key, self.eval(realm, value, scope)?);
                }
                Ok(Value::object(obj))
            }
            ExprKind::Function(def) => Ok(Value::Function(Rc::new(Closure {
                def: Rc::clone(def),
                scope: Rc::clone(scope),
            }))),
            ExprKind::Unary { op, operand } => self.eval_unary(realm, *op, operand, scope),
            ExprKind::Update {
                increment,
                prefix,
                target,
            } => {
                let place = self.resolve(realm, target, scope)?;
                let old = self.read(realm, &place, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write(realm, place, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.eval(realm, left, scope)?;
                let r = self.eval(realm, right, scope)?;
                Ok(binary(*op, &l, &r))
            }
            ExprKind::Logical { op, left, right } => {
                let l = self.eval(realm, left, scope)?;
                let short = match op {
                    LogicalOp::And => !l.truthy(),
                    LogicalOp::Or => l.truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short {
                    Ok(l)
                } else {
                    self.eval(realm, right, scope)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let place = self.resolve(realm, target, scope)?;
                let value = match op {
                    None => self.eval(realm, value, scope)?,
                    Some(op) => {
                        let current = self.read(realm, &place, scope)?;
                        let rhs = self.eval(realm, value, scope)?;
                        binary(*op, &current, &rhs)
                    }
                };
                self.write(realm, place, value.clone(), scope)?;
                Ok(value)
            }
            ExprKind::Conditional { test, then, els } => {
                if self.eval(realm, test, scope)?.truthy() {
                    self.eval(realm, then, scope)
                } else {
                    self.eval(realm, els, scope)
                }
            }
            ExprKind::Member { object, property } => {
                let target = self.eval(realm, object, scope)?;
                self.get_property(realm, &target, &Value::from(property.as_str()))
            }
            ExprKind::Index { object, index } => {
                let target = self.eval(realm, object, scope)?;
                let key = self.eval(realm, index, scope)?;
                self.get_property(realm, &target, &key)
            }
            ExprKind::Call { callee, args } => {
                let function = self.eval(realm, callee, scope)?;
                let args = self.eval_list(realm, args, scope)?;
                if !function.is_callable() {
                    return Err(EvalError::type_error(format!(
                        "{} is not a function",
                        callee_text(callee)
                    )));
                }
                self.call_value(realm, &function, args)
            }
            ExprKind::New { callee, args } => {
                let ctor = self.eval(realm, callee, scope)?;
                let args = self.eval_list(realm, args, scope)?;
                match &ctor {
                    Value::Builtin(f) if f.id.is_constructor() => {
                        self.call_builtin(realm, f, args)
                    }
                    _ => Err(EvalError::type_error(format!(
                        "{} is not a constructor",
                        callee_text(callee)
                    ))),
                }
            }
            ExprKind::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(realm, item, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_list(
        &self,
        realm: &mut dyn Realm,
        items: &[Expr],
        scope: &Rc<Scope>,
    ) -> EvalResult<Vec<Value>> {
        items.iter().map(|e| self.eval(realm, e, scope)).collect()
    }

    fn eval_unary(
        &self,
        realm: &mut dyn Realm,
        op: UnaryOp,
        operand: &Expr,
        scope: &Rc<Scope>,
    ) -> EvalResult<Value> {
        if op == UnaryOp::Typeof {
            let value = match &operand.kind {
                ExprKind::Ident(name) => scope.lookup(name).unwrap_or_default(),
                _ => self.eval(realm, operand, scope)?,
            };
            let text = match value {
                Value::Host(r) => realm.type_of(r),
                other => other.type_of(),
            };
            return Ok(Value::from(text));
        }
        let value = self.eval(realm, operand, scope)?;
        Ok(match op {
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::BitNot => Value::from(!value.to_int32()),
            UnaryOp::Void | UnaryOp::Typeof => Value::Undefined,
        })
    }

    fn resolve(&self, realm: &mut dyn Realm, target: &Expr, scope: &Rc<Scope>) -> EvalResult<Place> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Place::Name(name.clone())),
            ExprKind::Member { object, property } => Ok(Place::Property(
                self.eval(realm, object, scope)?,
                Value::from(property.as_str()),
            )),
            ExprKind::Index { object, index } => {
                let object = self.eval(realm, object, scope)?;
                let key = self.eval(realm, index, scope)?;
                Ok(Place::Property(object, key))
            }
            _ => Err(EvalError::type_error("invalid assignment target")),
        }
    }

    fn read(&self, realm: &mut dyn Realm, place: &Place, scope: &Rc<Scope>) -> EvalResult<Value> {
        match place {
            Place::Name(name) => scope
                .lookup(name)
                .ok_or_else(|| EvalError::Reference(name.clone())),
            Place::Property(object, key) => self.get_property(realm, object, key),
        }
    }

    fn write(
        &self,
        realm: &mut dyn Realm,
        place: Place,
        value: Value,
        scope: &Rc<Scope>,
    ) -> EvalResult<()> {
        match place {
            Place::Name(name) => match scope.assign(&name, value.clone()) {
                Assign::Done => Ok(()),
                Assign::Undeclared => {
                    self.globals.declare(&name, value, true);
                    Ok(())
                }
                Assign::Constant => Err(EvalError::type_error(format!(
                    "assignment to constant variable '{name}'"
                ))),
            },
            Place::Property(object, key) => self.set_property(realm, &object, &key, value),
        }
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    pub(crate) fn call_value(
        &self,
        realm: &mut dyn Realm,
        callee: &Value,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(realm, closure, args),
            Value::Builtin(f) => self.call_builtin(realm, f, args),
            Value::Host(r) => realm.call(self, *r, args),
            other => Err(EvalError::type_error(format!(
                "{} is not a function",
                other.to_display_string()
            ))),
        }
    }

    fn call_closure(
        &self,
        realm: &mut dyn Realm,
        closure: &Closure,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        self.tick()?;
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepth(MAX_CALL_DEPTH));
        }
        self.depth.set(depth + 1);
        let result = self.invoke_closure(realm, closure, args);
        self.depth.set(depth);
        result
    }

    fn invoke_closure(
        &self,
        realm: &mut dyn Realm,
        closure: &Closure,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let def = &closure.def;
        let scope = Scope::function(&closure.scope);
        if let Some(name) = &def.name {
            if !def.params.contains(name) {
                scope.declare(
                    name,
                    Value::Function(Rc::new(Closure {
                        def: Rc::clone(def),
                        scope: Rc::clone(&closure.scope),
                    })),
                    true,
                );
            }
        }
        let mut args = args.into_iter();
        for param in &def.params {
            scope.declare(param, args.next().unwrap_or_default(), true);
        }
        match &def.body {
            FunctionBody::Expr(expr) => self.eval(realm, expr, &scope),
            FunctionBody::Block(stmts) => {
                hoist_vars(stmts, &scope);
                match self.exec_block(realm, stmts, &scope)? {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    // ── Properties ────────────────────────────────────────────────────────────

    pub(crate) fn get_property(
        &self,
        realm: &mut dyn Realm,
        target: &Value,
        key: &Value,
    ) -> EvalResult<Value> {
        let bind = |id| {
            Value::Builtin(BuiltinFn {
                id,
                this: Some(Rc::new(target.clone())),
            })
        };
        match target {
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "cannot read properties of {} (reading '{}')",
                target.to_display_string(),
                key.to_display_string()
            ))),
            Value::Host(r) => realm.get(self, *r, key),
            Value::Str(s) => {
                if let Some(index) = array_index(key) {
                    let unit = s.encode_utf16().nth(index);
                    return Ok(unit
                        .map(|u| Value::from(String::from_utf16_lossy(&[u])))
                        .unwrap_or_default());
                }
                let name = key.to_display_string();
                if name == "length" {
                    return Ok(Value::Number(s.encode_utf16().count() as f64));
                }
                Ok(builtins::string_method(&name).map(bind).unwrap_or_default())
            }
            Value::Array(items) => {
                if let Some(index) = array_index(key) {
                    return Ok(items.borrow().get(index).cloned().unwrap_or_default());
                }
                let name = key.to_display_string();
                if name == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                Ok(builtins::array_method(&name).map(bind).unwrap_or_default())
            }
            Value::Object(obj) => Ok(obj
                .borrow()
                .get(&key.to_display_string())
                .cloned()
                .unwrap_or_default()),
            Value::Number(_) => Ok(builtins::number_method(&key.to_display_string())
                .map(bind)
                .unwrap_or_default()),
            Value::Function(closure) => match key.to_display_string().as_str() {
                "name" => Ok(Value::from(closure.def.name.as_deref().unwrap_or(""))),
                "length" => Ok(Value::Number(closure.def.params.len() as f64)),
                _ => Ok(Value::Undefined),
            },
            Value::Builtin(f) => {
                let name = key.to_display_string();
                if name == "name" {
                    return Ok(Value::from(f.id.name()));
                }
                Ok(f.id.static_member(&name).map(Value::builtin).unwrap_or_default())
            }
            Value::Bool(_) => Ok(Value::Undefined),
        }
    }

    pub(crate) fn set_property(
        &self,
        realm: &mut dyn Realm,
        target: &Value,
        key: &Value,
        value: Value,
    ) -> EvalResult<()> {
        match target {
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "cannot set properties of {} (setting '{}')",
                target.to_display_string(),
                key.to_display_string()
            ))),
            Value::Host(r) => realm.set(self, *r, key, value),
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                if let Some(index) = array_index(key) {
                    if index >= MAX_ARRAY_INDEX {
                        return Err(EvalError::type_error(format!("array index {index} too large")));
                    }
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                } else if key.to_display_string() == "length" {
                    let len = value.to_number();
                    if !(0.0..=MAX_ARRAY_INDEX as f64).contains(&len) || len.fract() != 0.0 {
                        return Err(EvalError::type_error("invalid array length"));
                    }
                    items.resize(len as usize, Value::Undefined);
                }
                Ok(())
            }
            Value::Object(obj) => {
                obj.borrow_mut().set(&key.to_display_string(), value);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn hoist_vars(stmts: &[Stmt], scope: &Rc<Scope>) {
    for stmt in stmts {
        match stmt {
            Stmt::Decl {
                kind: DeclKind::Var,
                decls,
                ..
            } => {
                for (name, _) in decls {
                    scope.declare_var(name, None);
                }
            }
            Stmt::If { then, els, .. } => {
                hoist_vars(std::slice::from_ref(then.as_ref()), scope);
                if let Some(els) = els {
                    hoist_vars(std::slice::from_ref(els.as_ref()), scope);
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => {
                hoist_vars(std::slice::from_ref(body.as_ref()), scope);
            }
            Stmt::For { init, body, .. } => {
                if let Some(init) = init {
                    hoist_vars(std::slice::from_ref(init.as_ref()), scope);
                }
                hoist_vars(std::slice::from_ref(body.as_ref()), scope);
            }
            Stmt::Block(body) => hoist_vars(body, scope),
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                hoist_vars(block, scope);
                for body in [handler, finalizer].into_iter().flatten() {
                    hoist_vars(body, scope);
                }
            }
            _ => {}
        }
    }
}

/// The value a `catch` clause binds for an error.
pub fn error_value(err: &EvalError) -> Value {
    let obj = match err {
        EvalError::Thrown(value) => return value.clone(),
        EvalError::Reference(name) => {
            Object::error("ReferenceError", &format!("{name} is not defined"))
        }
        EvalError::Type(message) => Object::error("TypeError", message),
        EvalError::Host(message) => Object::error("Error", message),
        other => Object::error("Error", &other.to_string()),
    };
    Value::object(obj)
}

fn callee_text(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Member { object, property } => format!("{}.{property}", callee_text(object)),
        ExprKind::Index { object, .. } => format!("{}[...]", callee_text(object)),
        _ => "expression".into(),
    }
}

/// Integer property keys, as used for array and string indexing.
pub(crate) fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < 4_294_967_295.0 => {
            Some(*n as usize)
        }
        Value::Str(s) => {
            let index: usize = s.parse().ok()?;
            (index.to_string() == s.as_ref()).then_some(index)
        }
        _ => None,
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Builtin(_) => {
            Value::from(value.to_display_string())
        }
        other => other.clone(),
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (to_primitive(l), to_primitive(r)) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn shift_count(v: &Value) -> u32 {
    v.to_uint32() & 31
}

/// Evaluate a binary operator on two values.
pub fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(l.to_number(), r.to_number()));
    let int = |f: fn(i32, i32) -> i32| Value::from(f(l.to_int32(), r.to_int32()));
    match op {
        BinaryOp::Add => {
            let (lp, rp) = (to_primitive(l), to_primitive(r));
            if matches!(lp, Value::Str(_)) || matches!(rp, Value::Str(_)) {
                let mut text = lp.to_display_string();
                text.push_str(&rp.to_display_string());
                Value::from(text)
            } else {
                Value::Number(lp.to_number() + rp.to_number())
            }
        }
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Exp => num(|a, b| if b.is_nan() { f64::NAN } else { a.powf(b) }),
        BinaryOp::Shl => Value::from(l.to_int32().wrapping_shl(shift_count(r))),
        BinaryOp::Shr => Value::from(l.to_int32().wrapping_shr(shift_count(r))),
        BinaryOp::UShr => Value::from(l.to_uint32().wrapping_shr(shift_count(r))),
        BinaryOp::BitAnd => int(|a, b| a & b),
        BinaryOp::BitOr => int(|a, b| a | b),
        BinaryOp::BitXor => int(|a, b| a ^ b),
        BinaryOp::Lt => Value::Bool(compare(l, r) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(l, r) == Some(Ordering::Greater)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(l, r),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(l, r),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(l.loose_equals(r)),
        BinaryOp::NotEq => Value::Bool(!l.loose_equals(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_equals(r)),
        BinaryOp::StrictNotEq => Value::Bool(!l.strict_equals(r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::NoRealm;
    use crate::value::to_int32;

    fn eval(text: &str) -> Value {
        Interpreter::new().eval_source(&mut NoRealm, text, "test").unwrap()
    }

    #[test]
    fn test_binary_arithmetic_matches_js() {
        assert_eq!(binary(BinaryOp::Add, &Value::from("a"), &Value::from(1)).to_string(), "a1");
        assert_eq!(binary(BinaryOp::Rem, &Value::from(-7), &Value::from(3)).to_number(), -1.0);
        assert_eq!(binary(BinaryOp::UShr, &Value::from(-1), &Value::from(0)).to_number(), 4294967295.0);
        assert_eq!(binary(BinaryOp::Shl, &Value::from(1), &Value::from(33)).to_number(), 2.0);
        assert_eq!(to_int32(2147483648.0 + 1.0), -2147483647);
    }

    #[test]
    fn test_completion_value() {
        assert_eq!(eval("var a = 2; a * 21").to_number(), 42.0);
    }

    #[test]
    fn test_step_limit_resets_per_entry() {
        let interp = Interpreter::new().with_step_limit(200);
        let err = interp
            .eval_source(&mut NoRealm, "while (true) {}", "spin")
            .unwrap_err();
        assert!(matches!(err, EvalError::StepLimit(200)));
        assert!(interp.eval_source(&mut NoRealm, "1 + 1", "ok").is_ok());
    }

    #[test]
    fn test_array_index_keys() {
        assert_eq!(array_index(&Value::from(3)), Some(3));
        assert_eq!(array_index(&Value::from("3")), Some(3));
        assert_eq!(array_index(&Value::from("03")), None);
        assert_eq!(array_index(&Value::from(1.5)), None);
    }
}
