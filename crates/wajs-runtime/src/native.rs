//! Native simulation host: runs bridge functions for code compiled to a
//! non-wasm target.
//!
//! Pointers are offsets into memory the host owns, not addresses in the
//! native process. Snippets that pass strings work on that memory; native
//! code reaches it through [`ScriptHost::with_memory`].

use std::cell::{Ref, RefCell};
use std::collections::HashMap;

use wajs_script::{Interpreter, Value as ScriptValue};
use wajs_types::{
    BridgeHost, Diagnostics, ExportError, HostError, NativeExport, Signature, SnippetDecl, Value,
};

use crate::error::{RuntimeError, RuntimeResult};
use crate::event_loop::TimerId;
use crate::memory::OwnedMemory;
use crate::options::RuntimeOptions;
use crate::realm::{self, Backend, HostState};

type DeclKey = (&'static str, &'static str, u32);

#[derive(Debug)]
pub struct ScriptHost {
    state: RefCell<HostState<NativeExport>>,
    memory: RefCell<OwnedMemory>,
    slots: RefCell<HashMap<DeclKey, u32>>,
    inits: RefCell<Vec<(Option<&'static str>, &'static str)>>,
    options: RuntimeOptions,
}

struct NativeBackend<'h> {
    host: &'h ScriptHost,
}

impl Backend for NativeBackend<'_> {
    type Entry = NativeExport;

    fn with_state<R>(&mut self, f: impl FnOnce(&mut HostState<NativeExport>) -> R) -> R {
        f(&mut self.host.state.borrow_mut())
    }

    fn with_memory<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(self.host.memory.borrow_mut().data_mut())
    }

    fn invoke(&mut self, export: NativeExport, _: &Signature, args: &[Value]) -> RuntimeResult<Value> {
        Ok(export.call(args))
    }

    fn alloc(&mut self, size: usize) -> RuntimeResult<u32> {
        self.host
            .memory
            .borrow_mut()
            .alloc(size)
            .ok_or(RuntimeError::OutOfMemory(size))
    }
}

impl ScriptHost {
    /// A host exposing `exports` through `ASM`.
    pub fn new<'a>(exports: impl IntoIterator<Item = &'a NativeExport>) -> Result<Self, ExportError> {
        Self::with_options(exports, RuntimeOptions::default())
    }

    pub fn with_options<'a>(
        exports: impl IntoIterator<Item = &'a NativeExport>,
        options: RuntimeOptions,
    ) -> Result<Self, ExportError> {
        let memory = OwnedMemory::new(options.native_pages);
        let interp = Interpreter::new().with_step_limit(options.step_limit);
        let mut state = HostState::new(interp, memory.len());
        for export in exports {
            state.add_export(export.name, export.signature(), *export)?;
        }
        Ok(Self {
            state: RefCell::new(state),
            memory: RefCell::new(memory),
            slots: RefCell::new(HashMap::new()),
            inits: RefCell::new(Vec::new()),
            options,
        })
    }

    fn backend(&self) -> NativeBackend<'_> {
        NativeBackend { host: self }
    }

    /// Slot of `decl`, compiling it and running its init block on first use.
    fn slot_for(&self, decl: &'static SnippetDecl) -> Result<u32, HostError> {
        if let Some(id) = self.slots.borrow().get(&decl.key()) {
            return Ok(*id);
        }
        if let Some(init) = decl.init {
            let pair = (decl.library, init);
            let first = !self.inits.borrow().contains(&pair);
            if first {
                self.inits.borrow_mut().push(pair);
                let script = format!("init {}", decl.library.unwrap_or("global"));
                realm::run_source(&mut self.backend(), decl.library, init, &script)
                    .map_err(|e| HostError(format!("init block of `{}` failed: {e}", decl.name)))?;
            }
        }
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.slots.len() as u32;
            state.add_slot(decl.to_record(id))
        };
        self.slots.borrow_mut().insert(decl.key(), id);
        Ok(id)
    }

    pub fn call_export(&self, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        realm::call_export(&mut self.backend(), name, args)
    }

    pub fn eval(&self, source: &str) -> RuntimeResult<ScriptValue> {
        Ok(realm::run_source(&mut self.backend(), None, source, "eval")?)
    }

    pub fn now(&self) -> u64 {
        self.state.borrow().timers.now()
    }

    pub fn advance(&self, ms: u64) -> usize {
        let until = self.now().saturating_add(ms);
        realm::run_due(&mut self.backend(), until, self.options.max_tasks)
    }

    pub fn run_until_idle(&self) -> usize {
        realm::run_until_idle(&mut self.backend(), self.options.max_tasks)
    }

    pub fn schedule_export(&self, name: &str, args: Vec<Value>, delay: u64) -> RuntimeResult<TimerId> {
        realm::schedule_export(&mut self.backend(), name, args, delay)
    }

    pub fn cancel(&self, timer: TimerId) -> bool {
        self.state.borrow_mut().timers.cancel(timer)
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.pending()
    }

    pub fn output(&self) -> String {
        self.state.borrow().output.clone()
    }

    pub fn take_output(&self) -> String {
        std::mem::take(&mut self.state.borrow_mut().output)
    }

    pub fn diagnostics(&self) -> Ref<'_, Diagnostics> {
        Ref::map(self.state.borrow(), |s| &s.diagnostics)
    }

    pub fn generation(&self) -> u32 {
        self.state.borrow().views.generation()
    }

    /// Run `f` over the owned memory. Growth done by `f` is picked up by
    /// the views before the next host call.
    pub fn with_memory<R>(&self, f: impl FnOnce(&mut OwnedMemory) -> R) -> R {
        let result = f(&mut self.memory.borrow_mut());
        realm::memcheck(&mut self.backend());
        result
    }
}

impl BridgeHost for ScriptHost {
    fn call(&self, decl: &'static SnippetDecl, args: &[Value]) -> Result<Value, HostError> {
        let id = self.slot_for(decl)?;
        let args: Vec<Value> = decl
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| args.get(i).map_or(p.kind.zero(), |v| v.coerce(p.kind.into())))
            .collect();
        realm::dispatch(&mut self.backend(), id, &args)
            .map(|v| v.coerce(decl.ret))
            .map_err(|e| HostError(format!("{}: {e}", decl.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wajs_types::{ArgKind, ErrorCode, ParamDecl, ReturnKind};

    static AB: [ParamDecl; 2] = [
        ParamDecl {
            name: "a",
            kind: ArgKind::Int32,
            default: Some("1"),
        },
        ParamDecl {
            name: "b",
            kind: ArgKind::Int32,
            default: Some("2"),
        },
    ];

    static ADD: SnippetDecl = SnippetDecl {
        name: "add",
        params: &AB,
        ret: ReturnKind::Int32,
        source: "return a + b;",
        library: None,
        init: None,
        file: "src/lib.rs",
        line: 3,
    };

    static COUNT: SnippetDecl = SnippetDecl {
        name: "count",
        params: &[],
        ret: ReturnKind::Int32,
        source: "calls += 1; return calls;",
        library: Some("COUNTER"),
        init: Some("var calls = 0;"),
        file: "src/lib.rs",
        line: 9,
    };

    static MISSING: SnippetDecl = SnippetDecl {
        name: "vibrate",
        params: &[],
        ret: ReturnKind::Int32,
        source: "navigator.vibrate(20); return 1;",
        library: None,
        init: None,
        file: "src/lib.rs",
        line: 15,
    };

    #[test]
    fn test_call_compiles_once() {
        let host = ScriptHost::new([]).unwrap();
        let result = host.call(&ADD, &[Value::I32(5), Value::I32(5)]).unwrap();
        assert_eq!(result, Value::I32(10));
        host.call(&ADD, &[Value::I32(1), Value::I32(2)]).unwrap();
        assert_eq!(host.state.borrow().slots.len(), 1);
    }

    #[test]
    fn test_library_init_runs_once() {
        let host = ScriptHost::new([]).unwrap();
        assert_eq!(host.call(&COUNT, &[]).unwrap(), Value::I32(1));
        assert_eq!(host.call(&COUNT, &[]).unwrap(), Value::I32(2));
        // library state stays out of the global scope
        assert_eq!(host.eval("typeof calls").unwrap().to_display_string(), "undefined");
    }

    #[test]
    fn test_missing_feature_degrades_once() {
        let host = ScriptHost::new([]).unwrap();
        assert_eq!(host.call(&MISSING, &[]).unwrap(), Value::I32(0));
        assert_eq!(host.call(&MISSING, &[]).unwrap(), Value::I32(0));
        let diagnostics = host.diagnostics();
        assert!(diagnostics.contains(ErrorCode::FEATURE_UNAVAILABLE));
        assert_eq!(diagnostics.total_warnings, 1);
    }

    #[test]
    fn test_self_rearming_timer_returns() {
        let host = ScriptHost::new([]).unwrap();
        host.eval("var n = 0; function f() { n++; setTimeout(f, 0); } f();")
            .unwrap();
        assert_eq!(host.advance(10), 11);
        assert_eq!(host.now(), 10);
        assert_eq!(host.eval("n").unwrap().to_number(), 12.0);
        assert_eq!(host.pending_timers(), 1);
    }
}
