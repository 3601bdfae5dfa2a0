//! Synthesizer error types.

use thiserror::Error;
use wajs_types::Diagnostics;

/// Errors that stop the post-link pass.
#[derive(Debug, Error)]
pub enum SynthError {
    /// The input is not a decodable WebAssembly module.
    #[error("malformed module: {0}")]
    Malformed(String),

    /// Harvesting found declaration or module errors.
    #[error("bridge metadata rejected:\n{0}")]
    Invalid(Diagnostics),

    /// The rewritten module does not import exactly one function per slot.
    #[error("dispatch table has {expected} slot(s) but the rewritten module imports {found}")]
    SlotCount { expected: usize, found: usize },

    /// The rewritten module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),

    /// An embedded file name cannot be stored as a section name.
    #[error("embedded file name `{0}` is empty or contains a path separator")]
    BadFileName(String),

    #[error("JSON metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<wasmparser::BinaryReaderError> for SynthError {
    fn from(err: wasmparser::BinaryReaderError) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl SynthError {
    /// The diagnostics behind an [`SynthError::Invalid`] error.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Invalid(diagnostics) => Some(diagnostics),
            _ => None,
        }
    }
}

/// Synthesizer result type alias.
pub type SynthResult<T> = Result<T, SynthError>;
