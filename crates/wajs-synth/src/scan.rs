//! Module scanner: one pass over a linked module collecting everything the
//! harvester and the rewriter need.

use std::collections::BTreeSet;

use wajs_types::{ArgKind, ReturnKind, Signature};
use wasmparser::{
    CompositeInnerType, ElementItems, ExternalKind, Operator, OperatorsReader, Parser, Payload,
    TypeRef, ValType,
};

use crate::error::SynthResult;

/// Value type as far as the bridge cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmType {
    I32,
    I64,
    F32,
    F64,
    Other,
}

impl From<ValType> for WasmType {
    fn from(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Self::I32,
            ValType::I64 => Self::I64,
            ValType::F32 => Self::F32,
            ValType::F64 => Self::F64,
            _ => Self::Other,
        }
    }
}

fn wasm_type_of(kind: ArgKind) -> WasmType {
    match kind {
        ArgKind::Int32 | ArgKind::Pointer => WasmType::I32,
        ArgKind::Float32 => WasmType::F32,
        ArgKind::Float64 => WasmType::F64,
    }
}

fn kind_of(ty: WasmType) -> Option<ArgKind> {
    match ty {
        WasmType::I32 => Some(ArgKind::Int32),
        WasmType::F32 => Some(ArgKind::Float32),
        WasmType::F64 => Some(ArgKind::Float64),
        WasmType::I64 | WasmType::Other => None,
    }
}

/// Parameter and result types of a function type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncShape {
    pub params: Vec<WasmType>,
    pub results: Vec<WasmType>,
}

impl FuncShape {
    /// True when a function of this type can carry `signature`.
    pub fn matches(&self, signature: &Signature) -> bool {
        let results: Vec<WasmType> = signature.ret.as_arg().map(wasm_type_of).into_iter().collect();
        self.results == results && self.params.iter().copied().eq(signature.kinds().map(wasm_type_of))
    }

    /// The signature this type expresses, if every value is in the bridge
    /// vocabulary. Pointers read back as plain integers.
    pub fn to_signature(&self) -> Option<Signature> {
        let kinds = self
            .params
            .iter()
            .map(|&ty| kind_of(ty))
            .collect::<Option<Vec<_>>>()?;
        let ret = match self.results.as_slice() {
            [] => ReturnKind::Void,
            [ty] => ReturnKind::from(kind_of(*ty)?),
            _ => return None,
        };
        Some(Signature::from_kinds(&kinds, ret))
    }
}

impl std::fmt::Display for FuncShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |types: &[WasmType]| {
            types
                .iter()
                .map(|t| format!("{t:?}").to_lowercase())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "({}) -> ({})", names(&self.params), names(&self.results))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// A function import with its type index.
    Func(u32),
    Memory,
    Table,
    Global,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub module: String,
    pub name: String,
    pub kind: ImportKind,
    /// Function index, for function imports.
    pub func_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub name: String,
    pub kind: ExportKind,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSection {
    pub name: String,
    pub data: Vec<u8>,
}

/// What one pass over a module found.
#[derive(Debug, Clone, Default)]
pub struct ModuleScan {
    /// Every type, `None` for non-function types.
    pub types: Vec<Option<FuncShape>>,
    pub imports: Vec<ImportEntry>,
    /// Type index of every function, imported ones first.
    pub functions: Vec<u32>,
    pub exports: Vec<ExportEntry>,
    pub start: Option<u32>,
    /// Functions named by a call, `ref.func`, element segment, export or
    /// the start section.
    pub referenced: BTreeSet<u32>,
    pub customs: Vec<CustomSection>,
    /// Imported plus defined memories.
    pub memories: u32,
}

impl ModuleScan {
    pub fn imported_functions(&self) -> usize {
        self.imports.iter().filter(|i| i.func_index.is_some()).count()
    }

    pub fn func_shape(&self, func_index: u32) -> Option<&FuncShape> {
        let ty = *self.functions.get(func_index as usize)?;
        self.types.get(ty as usize)?.as_ref()
    }

    pub fn export(&self, name: &str) -> Option<&ExportEntry> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Function index behind a function export.
    pub fn func_export(&self, name: &str) -> Option<u32> {
        self.export(name)
            .filter(|e| e.kind == ExportKind::Func)
            .map(|e| e.index)
    }

    pub fn exports_memory(&self) -> bool {
        self.export("memory")
            .is_some_and(|e| e.kind == ExportKind::Memory)
    }

    pub fn custom(&self, name: &str) -> Option<&CustomSection> {
        self.customs.iter().find(|c| c.name == name)
    }

    pub fn is_referenced(&self, func_index: u32) -> bool {
        self.referenced.contains(&func_index)
    }
}

fn collect_refs(mut ops: OperatorsReader<'_>, out: &mut BTreeSet<u32>) -> SynthResult<()> {
    while !ops.eof() {
        match ops.read()? {
            Operator::Call { function_index }
            | Operator::ReturnCall { function_index }
            | Operator::RefFunc { function_index } => {
                out.insert(function_index);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Scan a module. The module must already be valid.
pub fn scan(bytes: &[u8]) -> SynthResult<ModuleScan> {
    let mut out = ModuleScan::default();

    for payload in Parser::new(0).parse_all(bytes) {
        match payload? {
            Payload::TypeSection(reader) => {
                for group in reader {
                    for sub in group?.into_types() {
                        let shape = match &sub.composite_type.inner {
                            CompositeInnerType::Func(f) => Some(FuncShape {
                                params: f.params().iter().map(|&t| t.into()).collect(),
                                results: f.results().iter().map(|&t| t.into()).collect(),
                            }),
                            _ => None,
                        };
                        out.types.push(shape);
                    }
                }
            }
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import?;
                    let kind = match import.ty {
                        TypeRef::Func(ty) => ImportKind::Func(ty),
                        TypeRef::Memory(_) => ImportKind::Memory,
                        TypeRef::Table(_) => ImportKind::Table,
                        TypeRef::Global(_) => ImportKind::Global,
                        _ => ImportKind::Tag,
                    };
                    let func_index = match kind {
                        ImportKind::Func(ty) => {
                            out.functions.push(ty);
                            Some(out.functions.len() as u32 - 1)
                        }
                        ImportKind::Memory => {
                            out.memories += 1;
                            None
                        }
                        _ => None,
                    };
                    out.imports.push(ImportEntry {
                        module: import.module.to_string(),
                        name: import.name.to_string(),
                        kind,
                        func_index,
                    });
                }
            }
            Payload::FunctionSection(reader) => {
                for ty in reader {
                    out.functions.push(ty?);
                }
            }
            Payload::MemorySection(reader) => {
                out.memories += reader.count();
            }
            Payload::GlobalSection(reader) => {
                for global in reader {
                    collect_refs(global?.init_expr.get_operators_reader(), &mut out.referenced)?;
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export?;
                    let kind = match export.kind {
                        ExternalKind::Func => ExportKind::Func,
                        ExternalKind::Table => ExportKind::Table,
                        ExternalKind::Memory => ExportKind::Memory,
                        ExternalKind::Global => ExportKind::Global,
                        _ => ExportKind::Tag,
                    };
                    if kind == ExportKind::Func {
                        out.referenced.insert(export.index);
                    }
                    out.exports.push(ExportEntry {
                        name: export.name.to_string(),
                        kind,
                        index: export.index,
                    });
                }
            }
            Payload::StartSection { func, .. } => {
                out.start = Some(func);
                out.referenced.insert(func);
            }
            Payload::ElementSection(reader) => {
                for element in reader {
                    match element?.items {
                        ElementItems::Functions(funcs) => {
                            for func in funcs {
                                out.referenced.insert(func?);
                            }
                        }
                        ElementItems::Expressions(_, exprs) => {
                            for expr in exprs {
                                collect_refs(expr?.get_operators_reader(), &mut out.referenced)?;
                            }
                        }
                    }
                }
            }
            Payload::CodeSectionEntry(body) => {
                collect_refs(body.get_operators_reader()?, &mut out.referenced)?;
            }
            Payload::CustomSection(reader) => {
                out.customs.push(CustomSection {
                    name: reader.name().to_string(),
                    data: reader.data().to_vec(),
                });
            }
            _ => {}
        }
    }

    log::debug!(
        "scanned module: {} type(s), {} import(s), {} function(s), {} export(s)",
        out.types.len(),
        out.imports.len(),
        out.functions.len(),
        out.exports.len()
    );
    Ok(out)
}
