//! wajs post-link synthesizer as a WASM module for JavaScript build tools.
//!
//! # Usage (JavaScript)
//!
//! ```js
//! import init, { synthesize } from 'wajs-wasm';
//!
//! await init();
//!
//! const linked = new Uint8Array(await fs.readFile("app.wasm"));
//! const result = JSON.parse(synthesize(linked, { minify: true }, [
//!   { name: "level1.txt", data: new TextEncoder().encode("...") },
//! ]));
//! // { success: true, wasm: [0, 97, 115, 109, ...], loader: "...", manifest: { ... }, errors: { ... } }
//! ```

use serde::{Deserialize, Serialize};
use wajs_synth::{EmbeddedFile, Manifest, SynthError, SynthOptions};
use wajs_types::{Diagnostic, Diagnostics, ErrorCode};
use wasm_bindgen::prelude::*;

/// Result of [`synthesize`], serialized as JSON.
#[derive(Debug, Serialize)]
pub struct SynthOutput {
    pub success: bool,
    pub wasm: Option<Vec<u8>>,
    pub loader: Option<String>,
    pub manifest: Option<Manifest>,
    /// Errors on failure, harvest warnings on success.
    pub errors: Diagnostics,
}

/// A file passed from JavaScript for embedding.
#[derive(Debug, Deserialize)]
struct FileInput {
    name: String,
    data: Vec<u8>,
}

fn failure(errors: Diagnostics) -> SynthOutput {
    SynthOutput {
        success: false,
        wasm: None,
        loader: None,
        manifest: None,
        errors,
    }
}

fn single_error(code: ErrorCode, message: String) -> Diagnostics {
    let mut errors = Diagnostics::new();
    errors.push(Diagnostic::error(code, message));
    errors
}

fn error_diagnostics(err: SynthError) -> Diagnostics {
    let code = match err {
        SynthError::Invalid(diagnostics) => return diagnostics,
        SynthError::SlotCount { .. } => ErrorCode::SLOT_COUNT_MISMATCH,
        SynthError::BadFileName(_) | SynthError::Json(_) => ErrorCode::MALFORMED_METADATA,
        SynthError::Malformed(_) | SynthError::ValidationFailed(_) => ErrorCode::MALFORMED_MODULE,
    };
    single_error(code, err.to_string())
}

/// Run the pass and package the outcome; the browser entry point only adds
/// option decoding.
pub fn synthesize_output(bytes: &[u8], options: &SynthOptions) -> SynthOutput {
    match wajs_synth::synthesize(bytes, options) {
        Ok(artifact) => SynthOutput {
            success: true,
            wasm: Some(artifact.wasm),
            loader: Some(artifact.loader),
            manifest: Some(artifact.manifest),
            errors: artifact.diagnostics,
        },
        Err(err) => failure(error_diagnostics(err)),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        format!(
            r#"{{"success":false,"errors":{{"errors":[{{"message":"Serialization error: {}"}}],"warnings":[],"total_errors":1,"total_warnings":0}}}}"#,
            e
        )
    })
}

fn decode_options(options: JsValue, files: JsValue) -> Result<SynthOptions, String> {
    let mut opts: SynthOptions = if options.is_undefined() || options.is_null() {
        SynthOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| format!("invalid options: {e}"))?
    };
    if !files.is_undefined() && !files.is_null() {
        let files: Vec<FileInput> =
            serde_wasm_bindgen::from_value(files).map_err(|e| format!("invalid files: {e}"))?;
        opts.embed = files
            .into_iter()
            .map(|f| EmbeddedFile::new(f.name, f.data))
            .collect();
    }
    Ok(opts)
}

/// Synthesize a linked module.
///
/// `options` takes the fields of the `[build]` table of `wajs.toml`;
/// `files` is an optional array of `{ name, data }` to embed. Returns a JSON
/// [`SynthOutput`]. On failure `success` is `false` and `errors` holds the
/// structured diagnostics.
#[wasm_bindgen]
pub fn synthesize(bytes: &[u8], options: JsValue, files: JsValue) -> String {
    let output = match decode_options(options, files) {
        Ok(opts) => synthesize_output(bytes, &opts),
        Err(message) => failure(single_error(ErrorCode::MALFORMED_METADATA, message)),
    };
    to_json(&output)
}

/// Describe the bridge functions, exports and imports of a module as JSON.
#[wasm_bindgen]
pub fn inspect(bytes: &[u8]) -> String {
    match wajs_synth::inspect(bytes) {
        Ok(inspection) => to_json(&inspection),
        Err(err) => to_json(&failure(error_diagnostics(err))),
    }
}

/// Return the synthesizer version string.
#[wasm_bindgen]
pub fn version() -> String {
    wajs_synth::VERSION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wajs_synth::fixture::ModuleBuilder;
    use wajs_types::metadata::SnippetMeta;
    use wajs_types::{ArgKind, DeclSite, Param, ReturnKind, Signature};

    fn linked() -> Vec<u8> {
        let mut m = ModuleBuilder::new();
        let hello = m
            .snippet(&SnippetMeta {
                name: "hello".into(),
                signature: Signature::new(vec![Param::new("n", ArgKind::Int32)], ReturnKind::Void),
                source: "WA.print('hello ' + n);".into(),
                library: None,
                init: None,
                site: DeclSite::new("src/main.rs", 4),
            })
            .unwrap();
        m.memory(1);
        let main = m.func(&[], &[], |f| {
            f.i32_const(7).call(hello);
        });
        m.export_func("main", main);
        m.finish()
    }

    #[test]
    fn test_successful_output() {
        let output = synthesize_output(&linked(), &SynthOptions::default());
        assert!(output.success);
        assert!(output.wasm.is_some());
        assert!(output.loader.unwrap().contains("hello "));
        assert_eq!(output.manifest.unwrap().slots.len(), 1);
        assert!(!output.errors.has_errors());
    }

    #[test]
    fn test_malformed_input_is_structured() {
        let output = synthesize_output(b"not wasm", &SynthOptions::default());
        assert!(!output.success);
        assert!(output.wasm.is_none());
        assert_eq!(output.errors.total_errors, 1);
        assert_eq!(output.errors.errors[0].code, ErrorCode::MALFORMED_MODULE);

        let json: serde_json::Value = serde_json::from_str(&to_json(&output)).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["wasm"].is_null());
    }

    #[test]
    fn test_invalid_metadata_keeps_diagnostics() {
        let mut m = ModuleBuilder::new();
        let meta = SnippetMeta {
            name: "twice".into(),
            signature: Signature::new(vec![], ReturnKind::Void),
            source: "WA.print(1);".into(),
            library: None,
            init: None,
            site: DeclSite::new("src/main.rs", 1),
        };
        m.snippet(&meta).unwrap();
        m.snippet(&SnippetMeta {
            site: DeclSite::new("src/lib.rs", 9),
            ..meta
        })
        .unwrap();
        m.memory(1);
        let output = synthesize_output(&m.finish(), &SynthOptions::default());
        assert!(!output.success);
        assert!(output.errors.contains(ErrorCode::DUPLICATE_SNIPPET));
    }

    #[test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
