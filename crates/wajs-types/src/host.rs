//! Static descriptors used by dispatch stubs compiled for non-wasm targets.
//!
//! On wasm32 a bridge function is an import whose name carries its
//! metadata. Everywhere else the declaration macro emits a
//! [`SnippetDecl`] and the stub hands it to whatever [`BridgeHost`] is
//! installed, which lets native tests and tools run bridge code in-process.

use crate::{ArgKind, DeclSite, Param, ReturnKind, Signature, SnippetRecord, Value};

#[derive(Debug)]
pub struct ParamDecl {
    pub name: &'static str,
    pub kind: ArgKind,
    pub default: Option<&'static str>,
}

/// Compile-time description of one bridge function.
#[derive(Debug)]
pub struct SnippetDecl {
    pub name: &'static str,
    pub params: &'static [ParamDecl],
    pub ret: ReturnKind,
    pub source: &'static str,
    pub library: Option<&'static str>,
    pub init: Option<&'static str>,
    pub file: &'static str,
    pub line: u32,
}

impl SnippetDecl {
    pub fn signature(&self) -> Signature {
        let params = self
            .params
            .iter()
            .map(|p| Param {
                name: p.name.to_string(),
                kind: p.kind,
                default: p.default.map(str::to_string),
            })
            .collect();
        Signature::new(params, self.ret)
    }

    pub fn site(&self) -> DeclSite {
        DeclSite::new(self.file, self.line)
    }

    /// Key identifying this declaration among all others in a program.
    pub fn key(&self) -> (&'static str, &'static str, u32) {
        (self.name, self.file, self.line)
    }

    pub fn to_record(&self, id: u32) -> SnippetRecord {
        SnippetRecord {
            id,
            name: self.name.to_string(),
            signature: self.signature(),
            source: self.source.to_string(),
            library: self.library.map(str::to_string),
            init: self.init.map(str::to_string),
            site: self.site(),
        }
    }
}

/// Adapter generated for every exported native function.
pub type ExportFn = fn(&[Value]) -> Value;

/// A native export registered for in-process hosts.
#[derive(Debug, Clone, Copy)]
pub struct NativeExport {
    pub name: &'static str,
    pub params: &'static [ArgKind],
    pub ret: ReturnKind,
    pub invoke: ExportFn,
}

impl NativeExport {
    pub fn signature(&self) -> Signature {
        Signature::from_kinds(self.params, self.ret)
    }

    /// Call the export. Missing trailing arguments arrive as zero.
    pub fn call(&self, args: &[Value]) -> Value {
        let args: Vec<Value> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, kind)| match args.get(i) {
                Some(v) => v.coerce(ReturnKind::from(*kind)),
                None => kind.zero(),
            })
            .collect();
        (self.invoke)(&args).coerce(self.ret)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// Executes bridge functions on behalf of non-wasm dispatch stubs.
///
/// Methods take `&self`: a host function may call an export that calls
/// another bridge function before the first call returns.
pub trait BridgeHost {
    fn call(&self, decl: &'static SnippetDecl, args: &[Value]) -> Result<Value, HostError>;
}
