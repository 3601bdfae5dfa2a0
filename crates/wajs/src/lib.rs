//! # wajs
//!
//! Call host JavaScript from Rust compiled to WebAssembly, and call Rust
//! back from JavaScript, with ordinary function calls.
//!
//! ```rust,ignore
//! wajs::bridge! {
//!     /// Start a host timer that calls back into `onTick`.
//!     pub fn start_timer(ms: i32) {
//!         "setTimeout(function () { ASM.onTick(ms); }, ms);"
//!     }
//! }
//!
//! #[wajs::export(name = "onTick")]
//! fn on_tick(ms: i32) {
//!     // ...
//! }
//! ```
//!
//! On wasm32 each bridge function becomes an import whose name carries its
//! declaration; `wajs build` turns the linked module into a wasm file, a
//! loader script and a manifest. On other targets the stubs call the host
//! installed with [`native::install`], usually a `wajs_runtime::ScriptHost`,
//! which runs the same host source with an embedded interpreter.

pub use wajs_macros::{bridge, export};
pub use wajs_types::{
    ArgKind, BridgeHost, ExportError, ExportTable, FromValue, HostError, IntoValue, NativeExport,
    ParamDecl, ReturnKind, SnippetDecl, Value,
};

#[cfg(not(target_arch = "wasm32"))]
pub use inventory;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;

#[cfg(all(
    target_arch = "wasm32",
    feature = "allocator",
    not(any(target_os = "wasi", target_os = "emscripten"))
))]
mod allocator;

/// Support for generated code. Not a public API.
#[doc(hidden)]
pub mod __private {
    use crate::Value;

    #[cfg(not(target_arch = "wasm32"))]
    use crate::{FromValue, SnippetDecl};

    /// Run `decl` on the installed host.
    ///
    /// # Panics
    ///
    /// When no host is installed on this thread, or the host fails. A
    /// bridge function has no error channel of its own.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn invoke<R: FromValue>(decl: &'static SnippetDecl, args: &[Value]) -> R {
        let Some(host) = crate::native::current() else {
            panic!(
                "bridge function `{}` ({}) called with no host installed; see wajs::native::install",
                decl.name,
                decl.site()
            );
        };
        match host.call(decl, args) {
            Ok(value) => R::from_value(value),
            Err(err) => panic!("bridge function `{}` failed: {err}", decl.name),
        }
    }

    /// Argument `index`, or void when the caller passed fewer.
    pub fn arg(args: &[Value], index: usize) -> Value {
        args.get(index).copied().unwrap_or(Value::Void)
    }
}
