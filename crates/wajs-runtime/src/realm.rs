//! Host objects seen by snippet code, and the dispatch logic shared by the
//! wasm runtime and the native script host.
//!
//! Everything a snippet can reach that is not plain script data is a
//! [`HostRef`] resolved here: `WA`, `ASM` and its exports, the memory
//! views, `console`, and the intrinsic functions such as `MStrPut` or
//! `setTimeout`. A [`Backend`] supplies the memory, the state and the way
//! to enter native code.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use wajs_script::{
    parse_program, EvalError, EvalResult, HostRef, Interpreter, Object, Realm, Scope,
    Value as ScriptValue,
};
use wajs_types::{Diagnostic, Diagnostics, ErrorCode, ExportError, ExportTable, Signature, SnippetRecord, Value};

use crate::error::{RuntimeError, RuntimeResult};
use crate::event_loop::{EventLoop, Fired, TimerId};
use crate::marshal::{self, arg_from_script, from_script, to_script};
use crate::memory::{MemoryViews, ViewHandle, ViewKind};

const CLASS_WA: u32 = 0;
const CLASS_ASM: u32 = 1;
const CLASS_EXPORT: u32 = 2;
const CLASS_VIEW: u32 = 3;
const CLASS_INTRINSIC: u32 = 4;
const CLASS_CONSOLE: u32 = 5;

/// Host functions installed as globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intrinsic {
    Print,
    Error,
    HasExport,
    File,
    StrGet,
    StrPut,
    ArrPut,
    SetTimeout,
    ClearTimeout,
    SetInterval,
    ClearInterval,
    ConsoleLog,
}

impl Intrinsic {
    const ALL: [Intrinsic; 12] = [
        Intrinsic::Print,
        Intrinsic::Error,
        Intrinsic::HasExport,
        Intrinsic::File,
        Intrinsic::StrGet,
        Intrinsic::StrPut,
        Intrinsic::ArrPut,
        Intrinsic::SetTimeout,
        Intrinsic::ClearTimeout,
        Intrinsic::SetInterval,
        Intrinsic::ClearInterval,
        Intrinsic::ConsoleLog,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Error => "error",
            Self::HasExport => "hasExport",
            Self::File => "file",
            Self::StrGet => "MStrGet",
            Self::StrPut => "MStrPut",
            Self::ArrPut => "MArrPut",
            Self::SetTimeout => "setTimeout",
            Self::ClearTimeout => "clearTimeout",
            Self::SetInterval => "setInterval",
            Self::ClearInterval => "clearInterval",
            Self::ConsoleLog => "log",
        }
    }

    fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    fn value(self) -> ScriptValue {
        ScriptValue::Host(HostRef::new(CLASS_INTRINSIC, self as u32, 0))
    }
}

fn view_value(handle: ViewHandle) -> ScriptValue {
    ScriptValue::Host(HostRef::new(CLASS_VIEW, handle.kind.index(), handle.generation))
}

/// Work queued on the event loop.
#[derive(Debug, Clone)]
pub enum Task {
    Script {
        callback: ScriptValue,
        args: Vec<ScriptValue>,
    },
    Export {
        name: String,
        args: Vec<Value>,
    },
}

/// A compiled bridge function.
#[derive(Debug, Clone)]
pub struct Slot {
    pub record: SnippetRecord,
    /// `None` when the source failed to compile.
    pub function: Option<ScriptValue>,
    /// Set once the snippet hit a missing host feature; it returns zero
    /// from then on.
    pub dead: bool,
}

#[derive(Debug, Clone)]
pub struct ExportSlot<E> {
    pub name: String,
    pub signature: Signature,
    pub entry: E,
}

/// State shared by every entry into host code. `E` is how the backend
/// reaches an exported native function.
#[derive(Debug)]
pub struct HostState<E> {
    pub(crate) interp: Interpreter,
    pub(crate) slots: Vec<Slot>,
    pub(crate) views: MemoryViews,
    pub(crate) timers: EventLoop<Task>,
    pub(crate) output: String,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) allocator: Option<String>,
    pub(crate) files: BTreeMap<String, Vec<u8>>,
    wa: Object,
    scopes: HashMap<String, Rc<Scope>>,
    export_names: ExportTable<u32>,
    exports: Vec<ExportSlot<E>>,
}

impl<E: Copy> HostState<E> {
    pub(crate) fn new(interp: Interpreter, memory_len: usize) -> Self {
        let state = Self {
            interp,
            slots: Vec::new(),
            views: MemoryViews::new(memory_len),
            timers: EventLoop::new(),
            output: String::new(),
            diagnostics: Diagnostics::new(),
            allocator: None,
            files: BTreeMap::new(),
            wa: Object::new(),
            scopes: HashMap::new(),
            export_names: ExportTable::new(),
            exports: Vec::new(),
        };
        let interp = &state.interp;
        interp.define_global("WA", ScriptValue::Host(HostRef::new(CLASS_WA, 0, 0)));
        interp.define_global("ASM", ScriptValue::Host(HostRef::new(CLASS_ASM, 0, 0)));
        interp.define_global("console", ScriptValue::Host(HostRef::new(CLASS_CONSOLE, 0, 0)));
        for intrinsic in Intrinsic::ALL {
            if !matches!(
                intrinsic,
                Intrinsic::HasExport | Intrinsic::File | Intrinsic::ConsoleLog
            ) {
                interp.define_global(intrinsic.name(), intrinsic.value());
            }
        }
        state.rebind_views();
        state
    }

    /// Point the view globals at the current generation.
    fn rebind_views(&self) {
        for kind in ViewKind::ALL {
            self.interp
                .set_global(kind.global(), view_value(self.views.handle(kind)));
        }
    }

    /// Scope snippets of `library` share; the global scope when `None`.
    pub(crate) fn scope_for(&mut self, library: Option<&str>) -> Rc<Scope> {
        let Some(library) = library else {
            return Rc::clone(self.interp.globals());
        };
        let interp = &self.interp;
        Rc::clone(
            self.scopes
                .entry(library.to_string())
                .or_insert_with(|| interp.new_scope()),
        )
    }

    /// Compile `record` into the next slot. Source that does not parse
    /// leaves a slot that returns zero.
    pub(crate) fn add_slot(&mut self, record: SnippetRecord) -> u32 {
        let scope = self.scope_for(record.library.as_deref());
        let params: Vec<String> = record
            .signature
            .params
            .iter()
            .map(|p| p.name.clone())
            .collect();
        let function = match self.interp.compile_function_in(
            &scope,
            &format!("f_{}", record.name),
            &params,
            &record.source,
        ) {
            Ok(function) => Some(function),
            Err(errors) => {
                log::warn!("bridge function `{}` does not compile: {errors}", record.name);
                self.diagnostics.push(
                    Diagnostic::warning(
                        ErrorCode::SNIPPET_COMPILE,
                        format!("`{}` does not compile and will return zero: {errors}", record.name),
                    )
                    .at(record.site.clone()),
                );
                None
            }
        };
        log::debug!("slot {} -> {}{}", self.slots.len(), record.name, record.signature);
        let dead = function.is_none();
        self.slots.push(Slot {
            record,
            function,
            dead,
        });
        self.slots.len() as u32 - 1
    }

    pub(crate) fn add_export(
        &mut self,
        name: &str,
        signature: Signature,
        entry: E,
    ) -> Result<(), ExportError> {
        self.export_names.insert(name, self.exports.len() as u32)?;
        self.exports.push(ExportSlot {
            name: name.to_string(),
            signature,
            entry,
        });
        Ok(())
    }

    pub(crate) fn has_export(&self, name: &str) -> bool {
        self.export_names.contains(name)
    }

    pub(crate) fn export_names(&self) -> impl Iterator<Item = &str> {
        self.export_names.names()
    }

    fn export_at(&self, index: u32) -> Option<&ExportSlot<E>> {
        self.exports.get(index as usize)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Access to memory, state and native code for one entry into host code.
pub trait Backend {
    type Entry: Copy;

    fn with_state<R>(&mut self, f: impl FnOnce(&mut HostState<Self::Entry>) -> R) -> R;

    fn with_memory<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R;

    /// Call an export with arguments already coerced to its signature.
    fn invoke(
        &mut self,
        entry: Self::Entry,
        signature: &Signature,
        args: &[Value],
    ) -> RuntimeResult<Value>;

    /// Reserve `size` bytes of linear memory.
    fn alloc(&mut self, size: usize) -> RuntimeResult<u32>;
}

// ── Shared Entry Points ──────────────────────────────────────────────────────

/// Rebind the views when memory changed size since the last check.
pub(crate) fn memcheck<B: Backend>(b: &mut B) {
    let len = b.with_memory(|m| m.len());
    b.with_state(|s| {
        if s.views.observe(len) {
            log::debug!(
                "memory is {len} bytes, view generation {}",
                s.views.generation()
            );
            s.rebind_views();
        }
    });
}

/// Run bridge function `id` with wire arguments.
pub(crate) fn dispatch<B: Backend>(b: &mut B, id: u32, args: &[Value]) -> RuntimeResult<Value> {
    memcheck(b);
    let (interp, slot) = b.with_state(|s| (s.interp.clone(), s.slots.get(id as usize).cloned()));
    let slot = slot.ok_or_else(|| ExportError::Unknown(format!("slot {id}")))?;
    let ret = slot.record.signature.ret;
    let function = match slot.function {
        Some(function) if !slot.dead => function,
        _ => return Ok(ret.zero()),
    };
    let script_args: Vec<ScriptValue> = args.iter().map(|v| to_script(*v)).collect();
    let result = interp.call(&mut HostRealm::new(b), &function, script_args);
    match result {
        Ok(value) => Ok(from_script(&value, ret)),
        Err(err @ EvalError::Reference(_)) => {
            log::warn!("`{}` degraded to a no-op: {err}", slot.record.name);
            b.with_state(|s| {
                if let Some(stored) = s.slots.get_mut(id as usize) {
                    stored.dead = true;
                }
                s.report(
                    Diagnostic::warning(
                        ErrorCode::FEATURE_UNAVAILABLE,
                        format!("{} is unavailable: {err}", slot.record.name),
                    )
                    .at(slot.record.site.clone()),
                );
            });
            Ok(ret.zero())
        }
        Err(err) => Err(RuntimeError::Script(err)),
    }
}

pub(crate) fn call_export<B: Backend>(b: &mut B, name: &str, args: &[Value]) -> RuntimeResult<Value> {
    let index = b.with_state(|s| s.export_names.get(name).copied())?;
    call_export_at(b, index, args)
}

fn call_export_at<B: Backend>(b: &mut B, index: u32, args: &[Value]) -> RuntimeResult<Value> {
    let (entry, signature) = b
        .with_state(|s| s.export_at(index).map(|e| (e.entry, e.signature.clone())))
        .ok_or_else(|| ExportError::Unknown(format!("#{index}")))?;
    let args: Vec<Value> = signature
        .kinds()
        .enumerate()
        .map(|(i, kind)| args.get(i).map_or(kind.zero(), |v| v.coerce(kind.into())))
        .collect();
    let result = b.invoke(entry, &signature, &args);
    memcheck(b);
    Ok(result?.coerce(signature.ret))
}

/// Run host source in `library`'s scope, or the global scope.
pub(crate) fn run_source<B: Backend>(
    b: &mut B,
    library: Option<&str>,
    source: &str,
    script: &str,
) -> Result<ScriptValue, EvalError> {
    let (interp, scope) = b.with_state(|s| (s.interp.clone(), s.scope_for(library)));
    let program = parse_program(source, script).map_err(EvalError::Syntax)?;
    interp.run_in(&mut HostRealm::new(b), &program, &scope)
}

fn run_task<B: Backend>(b: &mut B, task: Task) -> RuntimeResult<()> {
    match task {
        Task::Script { callback, args } => {
            let interp = b.with_state(|s| s.interp.clone());
            interp.call(&mut HostRealm::new(b), &callback, args)?;
        }
        Task::Export { name, args } => {
            call_export(b, &name, &args)?;
        }
    }
    Ok(())
}

fn fire<B: Backend>(b: &mut B, timer: Fired<Task>) {
    let result = run_task(b, timer.task);
    b.with_state(|s| s.timers.task_done());
    if let Err(err) = result {
        log::error!("timer {} failed at {} ms: {err}", timer.id, timer.due);
        b.with_state(|s| {
            s.report(Diagnostic::warning(
                err.code().unwrap_or(ErrorCode::SCRIPT_ERROR),
                format!("timer {} failed: {err}", timer.id),
            ))
        });
    }
}

/// Fire every timer due by `until`, then move the clock there. A failing
/// task is reported and does not stop the loop. After `max_tasks` tasks
/// the clock stops at the last due time.
pub(crate) fn run_due<B: Backend>(b: &mut B, until: u64, max_tasks: usize) -> usize {
    let mut fired = 0;
    while fired < max_tasks {
        let Some(timer) = b.with_state(|s| s.timers.pop_due(until)) else {
            b.with_state(|s| s.timers.set_now(until));
            return fired;
        };
        fired += 1;
        fire(b, timer);
    }
    log::warn!("event loop still busy after {max_tasks} task(s)");
    fired
}

/// Jump from due time to due time until no timer is left or `max_tasks`
/// have run.
pub(crate) fn run_until_idle<B: Backend>(b: &mut B, max_tasks: usize) -> usize {
    let mut fired = 0;
    while fired < max_tasks {
        let Some(due) = b.with_state(|s| s.timers.next_due()) else {
            return fired;
        };
        let Some(timer) = b.with_state(|s| s.timers.pop_due(due)) else {
            return fired;
        };
        fired += 1;
        fire(b, timer);
    }
    log::warn!("event loop still busy after {max_tasks} task(s)");
    fired
}

pub(crate) fn schedule_export<B: Backend>(
    b: &mut B,
    name: &str,
    args: Vec<Value>,
    delay: u64,
) -> RuntimeResult<TimerId> {
    let id = b.with_state(|s| -> Result<TimerId, ExportError> {
        s.export_names.get(name)?;
        Ok(s.timers.schedule(
            delay,
            Task::Export {
                name: name.to_string(),
                args,
            },
        ))
    })?;
    Ok(id)
}

// ── Realm ────────────────────────────────────────────────────────────────────

/// Integer index of a property key, for view element access.
fn element_index(key: &ScriptValue) -> Option<usize> {
    match key {
        ScriptValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < 9.007_199_254_740_992e15 => {
            Some(*n as usize)
        }
        ScriptValue::Str(s) if s.as_ref() == "0" || (!s.starts_with('0') && !s.is_empty()) => {
            s.parse().ok()
        }
        _ => None,
    }
}

fn timer_delay(value: Option<&ScriptValue>) -> u64 {
    let ms = value.map_or(0.0, ScriptValue::to_number);
    if ms.is_finite() && ms > 0.0 {
        ms.floor() as u64
    } else {
        0
    }
}

pub struct HostRealm<'r, B: Backend> {
    b: &'r mut B,
}

impl<'r, B: Backend> HostRealm<'r, B> {
    pub fn new(b: &'r mut B) -> Self {
        Self { b }
    }

    fn checked_view(&mut self, target: HostRef) -> EvalResult<ViewKind> {
        let kind = ViewKind::from_index(target.index)
            .ok_or_else(|| EvalError::type_error("unknown memory view"))?;
        let handle = ViewHandle {
            kind,
            generation: target.tag,
        };
        self.b
            .with_state(|s| s.views.check(handle))
            .map_err(|stale| RuntimeError::from(stale).into_eval())?;
        Ok(kind)
    }

    fn alloc(&mut self, size: usize) -> EvalResult<u32> {
        let ptr = self.b.alloc(size).map_err(RuntimeError::into_eval)?;
        memcheck(self.b);
        Ok(ptr)
    }

    fn call_intrinsic(&mut self, intrinsic: Intrinsic, args: Vec<ScriptValue>) -> EvalResult<ScriptValue> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        match intrinsic {
            Intrinsic::Print => {
                let text = arg(0).to_display_string();
                self.b.with_state(|s| s.output.push_str(&text));
                Ok(ScriptValue::Undefined)
            }
            Intrinsic::ConsoleLog => {
                let line: Vec<String> = args.iter().map(ScriptValue::to_display_string).collect();
                self.b.with_state(|s| {
                    s.output.push_str(&line.join(" "));
                    s.output.push('\n');
                });
                Ok(ScriptValue::Undefined)
            }
            Intrinsic::Error => {
                let code = ErrorCode(arg(0).to_number() as u16);
                let text = arg(1).to_display_string();
                log::warn!("{code}: {text}");
                self.b
                    .with_state(|s| s.report(Diagnostic::warning(code, text)));
                Ok(ScriptValue::Undefined)
            }
            Intrinsic::HasExport => {
                let name = arg(0).to_display_string();
                Ok(ScriptValue::Bool(self.b.with_state(|s| s.has_export(&name))))
            }
            Intrinsic::File => {
                let name = arg(0).to_display_string();
                let data = self.b.with_state(|s| s.files.get(&name).cloned());
                Ok(match data {
                    Some(bytes) => ScriptValue::array(
                        bytes.iter().map(|b| ScriptValue::from(u32::from(*b))).collect(),
                    ),
                    None => ScriptValue::Null,
                })
            }
            Intrinsic::StrGet => {
                let ptr = arg(0).to_uint32();
                let max = args
                    .get(1)
                    .filter(|v| !v.is_undefined())
                    .map(|v| v.to_number().max(0.0) as usize);
                memcheck(self.b);
                let text = self.b.with_memory(|m| marshal::read_cstr(m, ptr, max));
                Ok(ScriptValue::from(text))
            }
            Intrinsic::StrPut => {
                let text = arg(0).to_display_string();
                if arg(1).is_undefined() {
                    let ptr = self.alloc(text.len() + 1)?;
                    let mut bytes = text.into_bytes();
                    bytes.push(0);
                    self.b
                        .with_memory(|m| marshal::write_bytes(m, ptr, &bytes))
                        .map_err(|e| RuntimeError::from(e).into_eval())?;
                    return Ok(ScriptValue::from(ptr));
                }
                let ptr = arg(1).to_uint32();
                let cap = arg(2).to_uint32();
                memcheck(self.b);
                let written = self
                    .b
                    .with_memory(|m| marshal::write_cstr(m, ptr, cap, &text))
                    .map_err(|e| RuntimeError::from(e).into_eval())?;
                Ok(ScriptValue::Number(written as f64))
            }
            Intrinsic::ArrPut => {
                let bytes: Vec<u8> = match arg(0) {
                    ScriptValue::Array(items) => items
                        .borrow()
                        .iter()
                        .map(|v| v.to_int32() as u8)
                        .collect(),
                    other => {
                        return Err(EvalError::type_error(format!(
                            "MArrPut expects an array, got {}",
                            other.type_of()
                        )))
                    }
                };
                let ptr = self.alloc(bytes.len())?;
                self.b
                    .with_memory(|m| marshal::write_bytes(m, ptr, &bytes))
                    .map_err(|e| RuntimeError::from(e).into_eval())?;
                Ok(ScriptValue::from(ptr))
            }
            Intrinsic::SetTimeout | Intrinsic::SetInterval => {
                let callback = arg(0);
                if !callback.is_callable() {
                    return Err(EvalError::type_error(format!(
                        "{} expects a function",
                        intrinsic.name()
                    )));
                }
                let delay = timer_delay(args.get(1));
                let task = Task::Script {
                    callback,
                    args: args.iter().skip(2).cloned().collect(),
                };
                let id = self.b.with_state(|s| {
                    if intrinsic == Intrinsic::SetTimeout {
                        s.timers.schedule(delay, task)
                    } else {
                        s.timers.schedule_interval(delay, task)
                    }
                });
                Ok(ScriptValue::from(id))
            }
            Intrinsic::ClearTimeout | Intrinsic::ClearInterval => {
                let id = arg(0).to_uint32();
                self.b.with_state(|s| s.timers.cancel(id));
                Ok(ScriptValue::Undefined)
            }
        }
    }
}

impl<B: Backend> Realm for HostRealm<'_, B> {
    fn get(&mut self, _: &Interpreter, target: HostRef, key: &ScriptValue) -> EvalResult<ScriptValue> {
        let name = key.to_display_string();
        match target.class {
            CLASS_WA => {
                if let Some(value) = self.b.with_state(|s| s.wa.get(&name).cloned()) {
                    return Ok(value);
                }
                Ok(match name.as_str() {
                    "print" => Intrinsic::Print.value(),
                    "error" => Intrinsic::Error.value(),
                    "hasExport" => Intrinsic::HasExport.value(),
                    "file" => Intrinsic::File.value(),
                    "asm" => ScriptValue::Host(HostRef::new(CLASS_ASM, 0, 0)),
                    _ => ScriptValue::Undefined,
                })
            }
            CLASS_ASM => Ok(self
                .b
                .with_state(|s| s.export_names.get(&name).ok().copied())
                .map(|index| ScriptValue::Host(HostRef::new(CLASS_EXPORT, index, 0)))
                .unwrap_or_default()),
            CLASS_EXPORT => {
                let export = self
                    .b
                    .with_state(|s| s.export_at(target.index).map(|e| (e.name.clone(), e.signature.arity())));
                Ok(match (export, name.as_str()) {
                    (Some((export, _)), "name") => ScriptValue::from(export),
                    (Some((_, arity)), "length") => ScriptValue::Number(arity as f64),
                    _ => ScriptValue::Undefined,
                })
            }
            CLASS_VIEW => {
                let kind = self.checked_view(target)?;
                if let Some(index) = element_index(key) {
                    let value = self.b.with_memory(|m| kind.load(m, index));
                    return Ok(value.map(ScriptValue::Number).unwrap_or_default());
                }
                Ok(match name.as_str() {
                    "length" => {
                        ScriptValue::Number((self.b.with_memory(|m| m.len()) / kind.width()) as f64)
                    }
                    "BYTES_PER_ELEMENT" => ScriptValue::Number(kind.width() as f64),
                    _ => ScriptValue::Undefined,
                })
            }
            CLASS_INTRINSIC => Ok(match (Intrinsic::from_index(target.index), name.as_str()) {
                (Some(intrinsic), "name") => ScriptValue::from(intrinsic.name()),
                _ => ScriptValue::Undefined,
            }),
            CLASS_CONSOLE => Ok(match name.as_str() {
                "log" | "info" | "warn" | "error" => Intrinsic::ConsoleLog.value(),
                _ => ScriptValue::Undefined,
            }),
            _ => Err(EvalError::type_error("unknown host object")),
        }
    }

    fn set(
        &mut self,
        _: &Interpreter,
        target: HostRef,
        key: &ScriptValue,
        value: ScriptValue,
    ) -> EvalResult<()> {
        match target.class {
            CLASS_WA => {
                let name = key.to_display_string();
                self.b.with_state(|s| s.wa.set(&name, value));
                Ok(())
            }
            CLASS_VIEW => {
                let kind = self.checked_view(target)?;
                if let Some(index) = element_index(key) {
                    let n = value.to_number();
                    self.b.with_memory(|m| kind.store(m, index, n));
                }
                Ok(())
            }
            CLASS_ASM => Err(EvalError::type_error(format!(
                "cannot assign ASM.{}: the export table is fixed at load",
                key.to_display_string()
            ))),
            _ => Err(EvalError::type_error(format!(
                "cannot set '{}' on a host function",
                key.to_display_string()
            ))),
        }
    }

    fn call(&mut self, _: &Interpreter, target: HostRef, args: Vec<ScriptValue>) -> EvalResult<ScriptValue> {
        match target.class {
            CLASS_EXPORT => {
                let kinds: Vec<_> = self
                    .b
                    .with_state(|s| s.export_at(target.index).map(|e| e.signature.kinds().collect()))
                    .unwrap_or_default();
                let wire: Vec<Value> = kinds
                    .iter()
                    .enumerate()
                    .map(|(i, kind)| arg_from_script(args.get(i), *kind))
                    .collect();
                let result = call_export_at(self.b, target.index, &wire)
                    .map_err(RuntimeError::into_eval)?;
                Ok(to_script(result))
            }
            CLASS_INTRINSIC => match Intrinsic::from_index(target.index) {
                Some(intrinsic) => self.call_intrinsic(intrinsic, args),
                None => Err(EvalError::type_error("unknown host function")),
            },
            _ => Err(EvalError::type_error("host object is not a function")),
        }
    }

    fn type_of(&self, target: HostRef) -> &'static str {
        match target.class {
            CLASS_EXPORT | CLASS_INTRINSIC => "function",
            _ => "object",
        }
    }
}
