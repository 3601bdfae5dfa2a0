//! Shared types for the wajs bridge.
//!
//! This crate defines the closed vocabulary of values that may cross the
//! native/host boundary, the snippet and export records harvested from a
//! linked module, the metadata encoding both sides agree on, the export
//! lookup table, and the structured diagnostics every stage reports.

mod diagnostic;
mod exports;
mod host;
mod kind;
pub mod metadata;
mod record;
mod signature;

pub use diagnostic::{
    Diagnostic, DiagnosticCategory, Diagnostics, ErrorCode, Severity, MAX_DIAGNOSTICS,
};
pub use exports::{ExportError, ExportTable};
pub use host::{BridgeHost, ExportFn, HostError, NativeExport, ParamDecl, SnippetDecl};
pub use kind::{ArgKind, FromValue, IntoValue, ReturnKind, Value};
pub use record::{DeclSite, ExportRecord, SnippetRecord};
pub use signature::{Param, Signature};
