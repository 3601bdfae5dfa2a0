//! Declaration macros for the wajs bridge. Use them through the `wajs`
//! crate, which the generated code refers to.

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod bridge;
mod export;
mod kind;

/// Declare functions implemented by host source text.
///
/// ```rust,ignore
/// wajs::bridge! {
///     /// Sum computed by the host.
///     pub fn add(a: i32 = 1, b: i32 = 2) -> i32 {
///         "return a + b;"
///     }
///
///     #[library("AUDIO")]
///     #[init("var ctx = new AudioContext();")]
///     pub fn beep(hz: f64, ms: u32 = 100) {
///         "var o = ctx.createOscillator(); o.frequency.value = hz; o.start(); o.stop(ctx.currentTime + ms / 1000);"
///     }
/// }
/// ```
///
/// Parameters and return values are limited to `i32`, `u32`, `f32`, `f64`
/// and raw pointers. Defaults must form a trailing suffix; every defaulted
/// suffix gets a `<name>_<arity>` stub, so the example also defines
/// `add_1(a)`, `add_0()` and `beep_1(hz)`.
#[proc_macro]
pub fn bridge(input: TokenStream) -> TokenStream {
    bridge::expand(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Make a native function callable from host code through `ASM`.
///
/// ```rust,ignore
/// #[wajs::export(name = "onTick")]
/// fn on_tick(ms: i32) {
///     /* ... */
/// }
/// ```
///
/// Without a `name` the function is exported under its own name. Repeat
/// `name = "..."` to export one function under several names.
#[proc_macro_attribute]
pub fn export(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args as export::ExportArgs);
    let item = parse_macro_input!(item as syn::ItemFn);
    export::expand(args, item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
