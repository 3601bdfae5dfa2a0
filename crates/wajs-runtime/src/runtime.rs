//! The wasm host: loads a synthesized module into `wasmi` and links every
//! dispatch slot to its compiled snippet.

use wajs_script::{Interpreter, Value as ScriptValue};
use wajs_synth::dispatch::{self, DispatchInfo};
use wajs_synth::harvest::CTORS_EXPORT;
use wajs_synth::scan::{self, ModuleScan};
use wajs_synth::Manifest;
use wajs_types::metadata::{DISPATCH_SECTION, FILE_SECTION_PREFIX, SNIPPET_MODULE};
use wajs_types::{ArgKind, Diagnostics, ExportError, Signature, Value};
use wasmi::{
    AsContextMut, Caller, Engine, ExternType, Func, Instance, Linker, Memory, Module, Store,
    StoreContextMut, Val,
};

use crate::error::{LoadError, LoadResult, RuntimeError, RuntimeResult};
use crate::event_loop::TimerId;
use crate::marshal::{self, from_wasm, to_wasm};
use crate::memory::{ViewHandle, ViewKind};
use crate::options::RuntimeOptions;
use crate::realm::{self, Backend, HostState};

/// Store data of a loaded module.
#[derive(Debug)]
pub struct WasmState {
    host: HostState<Func>,
    memory: Option<Memory>,
}

struct WasmBackend<'a> {
    ctx: StoreContextMut<'a, WasmState>,
}

impl Backend for WasmBackend<'_> {
    type Entry = Func;

    fn with_state<R>(&mut self, f: impl FnOnce(&mut HostState<Func>) -> R) -> R {
        f(&mut self.ctx.data_mut().host)
    }

    fn with_memory<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        match self.ctx.data().memory {
            Some(memory) => f(memory.data_mut(&mut self.ctx)),
            None => f(&mut []),
        }
    }

    fn invoke(&mut self, func: Func, signature: &Signature, args: &[Value]) -> RuntimeResult<Value> {
        let inputs: Vec<Val> = args.iter().map(|v| to_wasm(*v)).collect();
        let mut outputs: Vec<Val> = signature
            .ret
            .as_arg()
            .map(|kind| to_wasm(kind.zero()))
            .into_iter()
            .collect();
        func.call(&mut self.ctx, &inputs, &mut outputs)?;
        Ok(outputs
            .first()
            .map_or(Value::Void, |v| from_wasm(v, signature.ret)))
    }

    fn alloc(&mut self, size: usize) -> RuntimeResult<u32> {
        let malloc = self
            .with_state(|s| s.allocator.clone())
            .ok_or(RuntimeError::NoAllocator)?;
        let request = i32::try_from(size).map_err(|_| RuntimeError::OutOfMemory(size))?;
        match realm::call_export(self, &malloc, &[Value::I32(request)])?.to_u32() {
            0 => Err(RuntimeError::OutOfMemory(size)),
            ptr => Ok(ptr),
        }
    }
}

/// Check the module's dispatch record against the manifest.
fn verify(scanned: &ModuleScan, manifest: &Manifest) -> LoadResult<()> {
    let section = scanned
        .custom(DISPATCH_SECTION)
        .ok_or(LoadError::MissingDispatch)?;
    let info = DispatchInfo::from_bytes(&section.data)
        .map_err(|e| LoadError::MalformedDispatch(e.to_string()))?;
    if dispatch::checksum(&manifest.slots) != manifest.checksum {
        return Err(LoadError::ManifestTampered);
    }
    if info.slots as usize != manifest.slots.len() || info.checksum != manifest.checksum {
        return Err(LoadError::ChecksumMismatch {
            expected_slots: manifest.slots.len(),
            expected: manifest.checksum.clone(),
            found_slots: info.slots,
            found: info.checksum,
        });
    }
    Ok(())
}

fn dispatch_trap(err: RuntimeError) -> wasmi::Error {
    wasmi::Error::new(err.to_string())
}

/// A synthesized module running in-process.
pub struct Runtime {
    store: Store<WasmState>,
    instance: Instance,
    manifest: Manifest,
    options: RuntimeOptions,
    started: bool,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("slots", &self.manifest.slots.len())
            .field("exports", &self.export_names())
            .field("started", &self.started)
            .finish()
    }
}

impl Runtime {
    /// Verify, link and instantiate `wasm`. Init blocks run and snippets
    /// are compiled before the module is instantiated; the entry point
    /// runs only on [`Runtime::start`].
    pub fn load(wasm: &[u8], manifest: &Manifest, options: RuntimeOptions) -> LoadResult<Self> {
        let scanned = scan::scan(wasm)?;
        verify(&scanned, manifest)?;

        let engine = Engine::default();
        let module = Module::new(&engine, wasm)?;

        let interp = Interpreter::new().with_step_limit(options.step_limit);
        let mut host = HostState::new(interp, 0);
        host.allocator = manifest.allocator.as_ref().map(|a| a.malloc.clone());
        host.files = scanned
            .customs
            .iter()
            .filter_map(|c| {
                c.name
                    .strip_prefix(FILE_SECTION_PREFIX)
                    .map(|name| (name.to_string(), c.data.clone()))
            })
            .collect();
        let mut store = Store::new(&engine, WasmState { host, memory: None });

        let mut backend = WasmBackend {
            ctx: store.as_context_mut(),
        };
        for block in &manifest.inits {
            let library = block.library.as_deref();
            let script = format!("init {}", library.unwrap_or("global"));
            realm::run_source(&mut backend, library, &block.source, &script)
                .map_err(LoadError::Init)?;
        }
        for slot in &manifest.slots {
            store.data_mut().host.add_slot(slot.clone());
        }

        let mut linker = <Linker<WasmState>>::new(&engine);
        for import in module.imports() {
            let unresolved = || LoadError::UnresolvedImport {
                module: import.module().to_string(),
                name: import.name().to_string(),
            };
            if import.module() != SNIPPET_MODULE {
                return Err(unresolved());
            }
            let ExternType::Func(ty) = import.ty() else {
                return Err(unresolved());
            };
            let id: u32 = import
                .name()
                .parse()
                .map_err(|_| LoadError::UnknownSlot(import.name().to_string()))?;
            let record = manifest
                .slot(id)
                .ok_or_else(|| LoadError::UnknownSlot(import.name().to_string()))?;
            let kinds: Vec<ArgKind> = record.signature.kinds().collect();
            let ret = record.signature.ret;
            linker
                .func_new(
                    SNIPPET_MODULE,
                    import.name(),
                    ty.clone(),
                    move |mut caller: Caller<'_, WasmState>, params: &[Val], results: &mut [Val]| {
                        let args: Vec<Value> = params
                            .iter()
                            .zip(&kinds)
                            .map(|(v, kind)| from_wasm(v, (*kind).into()))
                            .collect();
                        let mut backend = WasmBackend {
                            ctx: caller.as_context_mut(),
                        };
                        let value = realm::dispatch(&mut backend, id, &args).map_err(dispatch_trap)?;
                        if let Some(out) = results.first_mut() {
                            *out = to_wasm(value.coerce(ret));
                        }
                        Ok(())
                    },
                )
                .map_err(wasmi::Error::from)?;
        }

        let instance = linker.instantiate(&mut store, &module)?.start(&mut store)?;
        let memory = instance.get_memory(&store, "memory");
        store.data_mut().memory = memory;

        for export in &manifest.exports {
            match instance.get_func(&store, &export.name) {
                Some(func) => {
                    store
                        .data_mut()
                        .host
                        .add_export(&export.name, export.signature.clone(), func)?;
                }
                None if export.declared => return Err(LoadError::MissingExport(export.name.clone())),
                None => log::warn!("export `{}` is listed but absent", export.name),
            }
        }

        let mut runtime = Self {
            store,
            instance,
            manifest: manifest.clone(),
            options,
            started: false,
        };
        realm::memcheck(&mut runtime.backend());
        log::info!(
            "loaded module: {} slot(s), {} export(s), {} byte(s) of memory",
            runtime.manifest.slots.len(),
            runtime.export_names().len(),
            runtime.memory().len()
        );
        Ok(runtime)
    }

    fn backend(&mut self) -> WasmBackend<'_> {
        WasmBackend {
            ctx: self.store.as_context_mut(),
        }
    }

    fn host(&self) -> &HostState<Func> {
        &self.store.data().host
    }

    /// Call a raw module export with zeroed arguments.
    fn call_raw(&mut self, name: &str) -> RuntimeResult<()> {
        let func = self
            .instance
            .get_func(&self.store, name)
            .ok_or_else(|| ExportError::Unknown(name.to_string()))?;
        let ty = func.ty(&self.store);
        let params: Vec<Val> = ty.params().iter().map(|t| Val::default(*t)).collect();
        let mut results: Vec<Val> = ty.results().iter().map(|t| Val::default(*t)).collect();
        func.call(&mut self.store, &params, &mut results)?;
        realm::memcheck(&mut self.backend());
        Ok(())
    }

    /// Run static constructors, then the entry point with zeroed arguments.
    pub fn start(&mut self) -> RuntimeResult<()> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.started = true;
        if self.manifest.ctors {
            self.call_raw(CTORS_EXPORT)?;
        }
        if let Some(entry) = self.manifest.entry.clone() {
            log::debug!("starting `{entry}`");
            self.call_raw(&entry)?;
        }
        Ok(())
    }

    /// Call an export by name, as host code does through `ASM`.
    pub fn call_export(&mut self, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        realm::call_export(&mut self.backend(), name, args)
    }

    pub fn has_export(&self, name: &str) -> bool {
        self.host().has_export(name)
    }

    pub fn export_names(&self) -> Vec<&str> {
        self.host().export_names().collect()
    }

    /// Run host source in the global scope and return its completion value.
    pub fn eval(&mut self, source: &str) -> RuntimeResult<ScriptValue> {
        Ok(realm::run_source(&mut self.backend(), None, source, "eval")?)
    }

    // ── Event Loop ────────────────────────────────────────────────────────────

    pub fn now(&self) -> u64 {
        self.host().timers.now()
    }

    /// Move the clock forward by `ms`, firing every timer that falls due.
    /// Returns the number of timers fired.
    pub fn advance(&mut self, ms: u64) -> usize {
        let until = self.now().saturating_add(ms);
        let max = self.options.max_tasks;
        realm::run_due(&mut self.backend(), until, max)
    }

    /// Fire timers until none is left, up to the configured task limit.
    pub fn run_until_idle(&mut self) -> usize {
        let max = self.options.max_tasks;
        realm::run_until_idle(&mut self.backend(), max)
    }

    /// Call export `name` with `args` once, `delay` ms from now.
    pub fn schedule_export(&mut self, name: &str, args: Vec<Value>, delay: u64) -> RuntimeResult<TimerId> {
        realm::schedule_export(&mut self.backend(), name, args, delay)
    }

    pub fn cancel(&mut self, timer: TimerId) -> bool {
        self.store.data_mut().host.timers.cancel(timer)
    }

    pub fn pending_timers(&self) -> usize {
        self.host().timers.pending()
    }

    // ── Output And Memory ─────────────────────────────────────────────────────

    /// Text written by `print`, `WA.print` and `console.log`.
    pub fn output(&self) -> &str {
        &self.host().output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.store.data_mut().host.output)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.host().diagnostics
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn embedded_file(&self, name: &str) -> Option<&[u8]> {
        self.host().files.get(name).map(Vec::as_slice)
    }

    pub fn memory(&self) -> &[u8] {
        match self.store.data().memory {
            Some(memory) => memory.data(&self.store),
            None => &[],
        }
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        match self.store.data().memory {
            Some(memory) => memory.data_mut(&mut self.store),
            None => &mut [],
        }
    }

    /// Handle of the current view of `kind`.
    pub fn view(&self, kind: ViewKind) -> ViewHandle {
        self.host().views.handle(kind)
    }

    pub fn generation(&self) -> u32 {
        self.host().views.generation()
    }

    /// Read through a view handle; stale handles fail.
    pub fn read_view(&self, handle: ViewHandle, index: usize) -> RuntimeResult<Option<f64>> {
        self.host().views.check(handle)?;
        Ok(handle.kind.load(self.memory(), index))
    }

    /// Write through a view handle; stale handles fail.
    pub fn write_view(&mut self, handle: ViewHandle, index: usize, value: f64) -> RuntimeResult<bool> {
        self.host().views.check(handle)?;
        Ok(handle.kind.store(self.memory_mut(), index, value))
    }

    pub fn read_cstr(&self, ptr: u32, max: Option<usize>) -> String {
        marshal::read_cstr(self.memory(), ptr, max)
    }

    pub fn write_cstr(&mut self, ptr: u32, cap: u32, text: &str) -> RuntimeResult<usize> {
        Ok(marshal::write_cstr(self.memory_mut(), ptr, cap, text)?)
    }

    /// Copy `text` into memory from the module's allocator, terminated.
    pub fn put_cstr(&mut self, text: &str) -> RuntimeResult<u32> {
        let mut backend = self.backend();
        let ptr = backend.alloc(text.len() + 1)?;
        realm::memcheck(&mut backend);
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        backend.with_memory(|m| marshal::write_bytes(m, ptr, &bytes))?;
        Ok(ptr)
    }
}
