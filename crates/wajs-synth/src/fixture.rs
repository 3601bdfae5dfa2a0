//! Small module builder for tests and examples.
//!
//! Produces modules shaped like linker output: bridge imports carrying
//! encoded metadata, a `memory` export, an optional bump allocator and a
//! `wajs.exports` section. Function indices follow wasm numbering, so all
//! imports must be added before the first defined function.

use std::borrow::Cow;

use wajs_types::metadata::{self, MetadataError, SnippetMeta};
use wajs_types::{ArgKind, ReturnKind};
use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, CustomSection, DataSection, EntityType, ExportKind,
    ExportSection, Function, FunctionSection, GlobalSection, GlobalType, ImportSection,
    Instruction, MemArg, MemorySection, MemoryType, Module, StartSection, TypeSection, ValType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    I32,
    I64,
    F32,
    F64,
}

impl Ty {
    pub fn of_kind(kind: ArgKind) -> Self {
        match kind {
            ArgKind::Int32 | ArgKind::Pointer => Self::I32,
            ArgKind::Float32 => Self::F32,
            ArgKind::Float64 => Self::F64,
        }
    }

    fn val(self) -> ValType {
        match self {
            Self::I32 => ValType::I32,
            Self::I64 => ValType::I64,
            Self::F32 => ValType::F32,
            Self::F64 => ValType::F64,
        }
    }
}

fn memarg(offset: u64, align: u32) -> MemArg {
    MemArg {
        offset,
        align,
        memory_index: 0,
    }
}

/// Instructions of one function body. `End` is appended on finish.
#[derive(Debug, Clone)]
pub struct Body {
    next_local: u32,
    locals: Vec<(u32, ValType)>,
    code: Vec<Instruction<'static>>,
}

impl Body {
    fn new(params: u32) -> Self {
        Self {
            next_local: params,
            locals: Vec::new(),
            code: Vec::new(),
        }
    }

    /// Declare a local and return its index.
    pub fn local(&mut self, ty: Ty) -> u32 {
        let idx = self.next_local;
        self.next_local += 1;
        self.locals.push((1, ty.val()));
        idx
    }

    pub fn op(&mut self, instr: Instruction<'static>) -> &mut Self {
        self.code.push(instr);
        self
    }

    pub fn get(&mut self, local: u32) -> &mut Self {
        self.op(Instruction::LocalGet(local))
    }

    pub fn set(&mut self, local: u32) -> &mut Self {
        self.op(Instruction::LocalSet(local))
    }

    pub fn tee(&mut self, local: u32) -> &mut Self {
        self.op(Instruction::LocalTee(local))
    }

    pub fn i32_const(&mut self, v: i32) -> &mut Self {
        self.op(Instruction::I32Const(v))
    }

    pub fn f32_const(&mut self, v: f32) -> &mut Self {
        self.op(Instruction::F32Const(v))
    }

    pub fn f64_const(&mut self, v: f64) -> &mut Self {
        self.op(Instruction::F64Const(v))
    }

    pub fn call(&mut self, func: u32) -> &mut Self {
        self.op(Instruction::Call(func))
    }

    pub fn global_get(&mut self, global: u32) -> &mut Self {
        self.op(Instruction::GlobalGet(global))
    }

    pub fn global_set(&mut self, global: u32) -> &mut Self {
        self.op(Instruction::GlobalSet(global))
    }

    pub fn i32_add(&mut self) -> &mut Self {
        self.op(Instruction::I32Add)
    }

    pub fn i32_load(&mut self, offset: u64) -> &mut Self {
        self.op(Instruction::I32Load(memarg(offset, 2)))
    }

    pub fn i32_load8_u(&mut self, offset: u64) -> &mut Self {
        self.op(Instruction::I32Load8U(memarg(offset, 0)))
    }

    pub fn i32_store(&mut self, offset: u64) -> &mut Self {
        self.op(Instruction::I32Store(memarg(offset, 2)))
    }

    pub fn i32_store8(&mut self, offset: u64) -> &mut Self {
        self.op(Instruction::I32Store8(memarg(offset, 0)))
    }

    pub fn f64_store(&mut self, offset: u64) -> &mut Self {
        self.op(Instruction::F64Store(memarg(offset, 3)))
    }

    pub fn drop_value(&mut self) -> &mut Self {
        self.op(Instruction::Drop)
    }

    pub fn memory_size(&mut self) -> &mut Self {
        self.op(Instruction::MemorySize(0))
    }

    pub fn memory_grow(&mut self) -> &mut Self {
        self.op(Instruction::MemoryGrow(0))
    }

    fn encode(&self) -> Function {
        let mut f = Function::new(self.locals.clone());
        for instr in &self.code {
            f.instruction(instr);
        }
        f.instruction(&Instruction::End);
        f
    }
}

/// Indices of the generated allocator pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocator {
    pub malloc: u32,
    pub free: u32,
    pub heap_global: u32,
}

/// Builder for small test modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleBuilder {
    types: Vec<(Vec<ValType>, Vec<ValType>)>,
    imports: Vec<(String, String, u32)>,
    funcs: Vec<(u32, Body)>,
    exports: Vec<(String, ExportKind, u32)>,
    memory: Option<(u64, Option<u64>)>,
    globals: Vec<(ValType, bool, i32)>,
    data: Vec<(i32, Vec<u8>)>,
    declared_exports: String,
    customs: Vec<(String, Vec<u8>)>,
    start: Option<u32>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn type_index(&mut self, params: &[Ty], results: &[Ty]) -> u32 {
        let key = (
            params.iter().map(|t| t.val()).collect::<Vec<_>>(),
            results.iter().map(|t| t.val()).collect::<Vec<_>>(),
        );
        if let Some(idx) = self.types.iter().position(|t| *t == key) {
            return idx as u32;
        }
        self.types.push(key);
        self.types.len() as u32 - 1
    }

    /// Add a function import and return its function index.
    ///
    /// # Panics
    /// When a function has already been defined.
    pub fn import_func(&mut self, module: &str, name: &str, params: &[Ty], results: &[Ty]) -> u32 {
        assert!(
            self.funcs.is_empty(),
            "imports must be added before defined functions"
        );
        let ty = self.type_index(params, results);
        self.imports.push((module.to_string(), name.to_string(), ty));
        self.imports.len() as u32 - 1
    }

    /// Import a bridge function declared by `meta`.
    pub fn snippet(&mut self, meta: &SnippetMeta) -> Result<u32, MetadataError> {
        let name = metadata::encode_snippet(meta)?;
        let params: Vec<Ty> = meta.signature.kinds().map(Ty::of_kind).collect();
        let results: Vec<Ty> = meta.signature.ret.as_arg().map(Ty::of_kind).into_iter().collect();
        Ok(self.import_func(metadata::SNIPPET_MODULE, &name, &params, &results))
    }

    /// Define a function and return its function index.
    pub fn func(&mut self, params: &[Ty], results: &[Ty], build: impl FnOnce(&mut Body)) -> u32 {
        let ty = self.type_index(params, results);
        let mut body = Body::new(params.len() as u32);
        build(&mut body);
        self.funcs.push((ty, body));
        (self.imports.len() + self.funcs.len()) as u32 - 1
    }

    pub fn export_func(&mut self, name: &str, func: u32) -> &mut Self {
        self.exports.push((name.to_string(), ExportKind::Func, func));
        self
    }

    /// Add a `wajs.exports` record for `name`.
    pub fn declare_export(
        &mut self,
        name: &str,
        params: &[ArgKind],
        ret: ReturnKind,
    ) -> Result<&mut Self, MetadataError> {
        self.declared_exports += &metadata::encode_export(name, params, ret)?;
        Ok(self)
    }

    /// Define memory 0 with `pages` initial pages and export it as `memory`.
    pub fn memory(&mut self, pages: u64) -> &mut Self {
        self.memory = Some((pages, None));
        self.exports.push(("memory".to_string(), ExportKind::Memory, 0));
        self
    }

    /// Define memory 0 without exporting it.
    pub fn hidden_memory(&mut self, pages: u64) -> &mut Self {
        self.memory = Some((pages, None));
        self
    }

    pub fn global_i32(&mut self, init: i32, mutable: bool) -> u32 {
        self.globals.push((ValType::I32, mutable, init));
        self.globals.len() as u32 - 1
    }

    pub fn data(&mut self, offset: i32, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.data.push((offset, bytes.into()));
        self
    }

    pub fn custom(&mut self, name: &str, data: impl Into<Vec<u8>>) -> &mut Self {
        self.customs.push((name.to_string(), data.into()));
        self
    }

    pub fn start(&mut self, func: u32) -> &mut Self {
        self.start = Some(func);
        self
    }

    /// Define and export `malloc`/`free`: an 8-byte aligned bump allocator
    /// starting at `heap_base` that grows memory when it runs out.
    pub fn bump_allocator(&mut self, heap_base: i32) -> Allocator {
        let heap = self.global_i32(heap_base, true);
        let malloc = self.func(&[Ty::I32], &[Ty::I32], |f| {
            let old = f.local(Ty::I32);
            let missing = f.local(Ty::I32);
            f.global_get(heap).set(old);
            f.global_get(heap)
                .get(0)
                .i32_add()
                .i32_const(7)
                .i32_add()
                .i32_const(-8)
                .op(Instruction::I32And)
                .global_set(heap);
            // pages needed beyond the current size
            f.global_get(heap)
                .i32_const(0xffff)
                .i32_add()
                .i32_const(16)
                .op(Instruction::I32ShrU)
                .memory_size()
                .op(Instruction::I32Sub)
                .tee(missing)
                .i32_const(0)
                .op(Instruction::I32GtS)
                .op(Instruction::If(BlockType::Empty))
                .get(missing)
                .memory_grow()
                .drop_value()
                .op(Instruction::End);
            f.get(old);
        });
        let free = self.func(&[Ty::I32], &[], |_| {});
        self.export_func("malloc", malloc);
        self.export_func("free", free);
        Allocator {
            malloc,
            free,
            heap_global: heap,
        }
    }

    /// Encode the module.
    pub fn finish(&self) -> Vec<u8> {
        let mut module = Module::new();

        let mut types = TypeSection::new();
        for (params, results) in &self.types {
            types
                .ty()
                .function(params.iter().copied(), results.iter().copied());
        }
        module.section(&types);

        if !self.imports.is_empty() {
            let mut imports = ImportSection::new();
            for (module_name, name, ty) in &self.imports {
                imports.import(module_name, name, EntityType::Function(*ty));
            }
            module.section(&imports);
        }

        let mut functions = FunctionSection::new();
        for (ty, _) in &self.funcs {
            functions.function(*ty);
        }
        module.section(&functions);

        if let Some((minimum, maximum)) = self.memory {
            let mut memories = MemorySection::new();
            memories.memory(MemoryType {
                minimum,
                maximum,
                memory64: false,
                shared: false,
                page_size_log2: None,
            });
            module.section(&memories);
        }

        if !self.globals.is_empty() {
            let mut globals = GlobalSection::new();
            for (val_type, mutable, init) in &self.globals {
                globals.global(
                    GlobalType {
                        val_type: *val_type,
                        mutable: *mutable,
                        shared: false,
                    },
                    &ConstExpr::i32_const(*init),
                );
            }
            module.section(&globals);
        }

        let mut exports = ExportSection::new();
        for (name, kind, index) in &self.exports {
            exports.export(name, *kind, *index);
        }
        module.section(&exports);

        if let Some(function_index) = self.start {
            module.section(&StartSection { function_index });
        }

        let mut code = CodeSection::new();
        for (_, body) in &self.funcs {
            code.function(&body.encode());
        }
        module.section(&code);

        if !self.data.is_empty() {
            let mut data = DataSection::new();
            for (offset, bytes) in &self.data {
                data.active(0, &ConstExpr::i32_const(*offset), bytes.iter().copied());
            }
            module.section(&data);
        }

        if !self.declared_exports.is_empty() {
            module.section(&CustomSection {
                name: Cow::Borrowed(metadata::EXPORTS_SECTION),
                data: Cow::Borrowed(self.declared_exports.as_bytes()),
            });
        }
        for (name, data) in &self.customs {
            module.section(&CustomSection {
                name: Cow::Borrowed(name),
                data: Cow::Borrowed(data),
            });
        }

        module.finish()
    }
}
