use wajs_script::EvalError;
use wajs_types::{Diagnostic, ErrorCode, ExportError};

use crate::marshal::OutOfBounds;
use crate::memory::StaleView;

/// Failure to bring an artifact up. Nothing ran.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("W301: module has no dispatch section")]
    MissingDispatch,

    #[error("W301: malformed dispatch record: {0}")]
    MalformedDispatch(String),

    #[error("W302: module has {found_slots} slot(s) with checksum {found}, manifest expects {expected_slots} with {expected}")]
    ChecksumMismatch {
        expected_slots: usize,
        expected: String,
        found_slots: u32,
        found: String,
    },

    #[error("W301: manifest checksum does not match its own slots")]
    ManifestTampered,

    #[error("W300: declared export `{0}` is missing from the instance")]
    MissingExport(String),

    #[error("import `{module}.{name}` is not provided by this host")]
    UnresolvedImport { module: String, name: String },

    #[error("W301: import `wajs.{0}` is not a slot of this manifest")]
    UnknownSlot(String),

    #[error("W300: export table: {0}")]
    Exports(#[from] ExportError),

    #[error("W301: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("malformed module: {0}")]
    Scan(#[from] wajs_synth::SynthError),

    #[error("instantiation failed: {0}")]
    Wasm(#[from] wasmi::Error),

    #[error("init block failed: {0}")]
    Init(EvalError),
}

impl LoadError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::MissingDispatch
            | Self::MalformedDispatch(_)
            | Self::ManifestTampered
            | Self::UnknownSlot(_)
            | Self::Manifest(_) => Some(ErrorCode::MALFORMED_MANIFEST),
            Self::ChecksumMismatch { .. } => Some(ErrorCode::CHECKSUM_MISMATCH),
            Self::MissingExport(_) | Self::Exports(_) => Some(ErrorCode::MISSING_EXPORT),
            _ => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(
            self.code().unwrap_or(ErrorCode::MALFORMED_MANIFEST),
            self.to_string(),
        )
    }
}

/// Failure while the module runs.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("W400: {0}")]
    Export(#[from] ExportError),

    #[error("W402: {0}")]
    StaleView(#[from] StaleView),

    #[error("W403: {0}")]
    Script(#[from] EvalError),

    #[error("{0}")]
    Memory(#[from] OutOfBounds),

    #[error("module has no allocator export")]
    NoAllocator,

    #[error("allocation of {0} byte(s) failed")]
    OutOfMemory(usize),

    #[error("trap: {0}")]
    Trap(#[from] wasmi::Error),

    #[error("module was already started")]
    AlreadyStarted,
}

impl RuntimeError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Export(_) => Some(ErrorCode::UNKNOWN_EXPORT),
            Self::StaleView(_) => Some(ErrorCode::STALE_VIEW),
            Self::Script(_) => Some(ErrorCode::SCRIPT_ERROR),
            _ => None,
        }
    }

    /// The error as script code sees it when thrown through a host call.
    pub fn into_eval(self) -> EvalError {
        match self {
            Self::Script(e) => e,
            Self::Export(ExportError::Unknown(name)) => {
                EvalError::type_error(format!("ASM.{name} is not a function"))
            }
            other => EvalError::Host(other.to_string()),
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
