//! `bridge!`: bridge function declarations.
//!
//! Each declaration expands to a stub with the declared signature. On
//! wasm32 the stub calls an import from the `wajs` module whose name
//! carries the encoded declaration; elsewhere it hands a static
//! [`SnippetDecl`](wajs_types::SnippetDecl) to the installed host. Every
//! suffix of defaulted parameters adds a `<name>_<arity>` stub that fills
//! in the defaults and forwards to the full one.

use std::collections::HashMap;

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote, quote_spanned, ToTokens};
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{braced, parenthesized, Attribute, Expr, Ident, LitStr, ReturnType, Token, Type, Visibility};
use wajs_types::metadata::{self, MetadataError};
use wajs_types::{ArgKind, Param, ReturnKind, Signature};

use crate::kind;

struct BridgeArg {
    name: Ident,
    ty: Type,
    default: Option<Expr>,
}

impl Parse for BridgeArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name = input.call(Ident::parse_any)?;
        input.parse::<Token![:]>()?;
        let ty = input.parse()?;
        let default = if input.peek(Token![=]) {
            input.parse::<Token![=]>()?;
            Some(input.parse()?)
        } else {
            None
        };
        Ok(Self { name, ty, default })
    }
}

pub(crate) struct BridgeFn {
    attrs: Vec<Attribute>,
    vis: Visibility,
    name: Ident,
    args: Vec<BridgeArg>,
    output: ReturnType,
    source: LitStr,
    library: Option<LitStr>,
    init: Option<LitStr>,
}

impl Parse for BridgeFn {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut attrs = input.call(Attribute::parse_outer)?;
        let vis = input.parse()?;
        input.parse::<Token![fn]>()?;
        let name: Ident = input.parse()?;

        let content;
        parenthesized!(content in input);
        let args = Punctuated::<BridgeArg, Token![,]>::parse_terminated(&content)?
            .into_iter()
            .collect();
        let output = input.parse()?;

        let body;
        braced!(body in input);
        if !body.peek(LitStr) {
            return Err(body.error("the body of a bridge function is its host source as one string literal"));
        }
        let source = body.parse()?;
        if body.peek(Token![;]) {
            body.parse::<Token![;]>()?;
        }
        if !body.is_empty() {
            return Err(body.error("expected nothing after the host source"));
        }

        let mut library = None;
        let mut init = None;
        let mut rest = Vec::with_capacity(attrs.len());
        for attr in attrs.drain(..) {
            if attr.path().is_ident("library") {
                library = Some(attr.parse_args()?);
            } else if attr.path().is_ident("init") {
                init = Some(attr.parse_args()?);
            } else {
                rest.push(attr);
            }
        }

        Ok(Self {
            attrs: rest,
            vis,
            name,
            args,
            output,
            source,
            library,
            init,
        })
    }
}

impl BridgeFn {
    fn js_name(&self) -> String {
        self.name.unraw().to_string()
    }

    fn kinds(&self) -> syn::Result<Vec<ArgKind>> {
        self.args.iter().map(|a| kind::arg_kind(&a.ty)).collect()
    }

    fn ret(&self) -> syn::Result<ReturnKind> {
        kind::return_kind(&self.output)
    }

    pub(crate) fn signature(&self) -> syn::Result<Signature> {
        let params = self
            .args
            .iter()
            .zip(self.kinds()?)
            .map(|(arg, kind)| {
                let param = Param::new(arg.name.unraw().to_string(), kind);
                match &arg.default {
                    Some(expr) => param.with_default(expr.to_token_stream().to_string()),
                    None => param,
                }
            })
            .collect();
        Ok(Signature::new(params, self.ret()?))
    }

    /// The import name without its `file:line` suffix.
    pub(crate) fn prefix(&self) -> syn::Result<String> {
        let library = self.library.as_ref().map(LitStr::value);
        let init = self.init.as_ref().map(LitStr::value);
        metadata::encode_snippet_prefix(
            &self.js_name(),
            &self.signature()?,
            library.as_deref(),
            init.as_deref(),
            &self.source.value(),
        )
        .map_err(|err| {
            let span = match &err {
                MetadataError::ReservedCharacter("source text") => self.source.span(),
                MetadataError::ReservedCharacter("library name") => {
                    self.library.as_ref().map_or(self.name.span(), LitStr::span)
                }
                MetadataError::ReservedCharacter("init code") => {
                    self.init.as_ref().map_or(self.name.span(), LitStr::span)
                }
                _ => self.name.span(),
            };
            syn::Error::new(span, err.to_string())
        })
    }

    fn expand(&self) -> syn::Result<TokenStream> {
        let prefix = LitStr::new(&self.prefix()?, Span::call_site());
        let kinds = self.kinds()?;
        let ret = self.ret()?;

        let attrs = &self.attrs;
        let vis = &self.vis;
        let name = &self.name;
        let output = &self.output;
        let ret_ty = kind::return_type(output);
        let names: Vec<&Ident> = self.args.iter().map(|a| &a.name).collect();
        let types: Vec<&Type> = self.args.iter().map(|a| &a.ty).collect();
        let line = quote_spanned!(name.span()=> line!());

        let js_name = self.js_name();
        let source = &self.source;
        let library = option_tokens(self.library.as_ref());
        let init = option_tokens(self.init.as_ref());
        let ret_kind = kind::return_tokens(ret);
        let count = self.args.len();
        let params = self.args.iter().zip(&kinds).map(|(arg, kind)| {
            let param = arg.name.unraw().to_string();
            let kind = kind::arg_tokens(*kind);
            let default = match &arg.default {
                Some(expr) => {
                    let text = expr.to_token_stream().to_string();
                    quote!(::core::option::Option::Some(#text))
                }
                None => quote!(::core::option::Option::None),
            };
            quote! {
                ::wajs::ParamDecl { name: #param, kind: #kind, default: #default }
            }
        });

        let stub = quote! {
            #(#attrs)*
            #vis fn #name(#(#names: #types),*) #output {
                #[cfg(target_arch = "wasm32")]
                {
                    #[link(wasm_import_module = "wajs")]
                    extern "C" {
                        #[link_name = concat!(#prefix, file!(), ":", #line)]
                        fn bridge(#(#names: #types),*) #output;
                    }
                    unsafe { bridge(#(#names),*) }
                }
                #[cfg(not(target_arch = "wasm32"))]
                {
                    static PARAMS: [::wajs::ParamDecl; #count] = [#(#params),*];
                    static DECL: ::wajs::SnippetDecl = ::wajs::SnippetDecl {
                        name: #js_name,
                        params: &PARAMS,
                        ret: #ret_kind,
                        source: #source,
                        library: #library,
                        init: #init,
                        file: file!(),
                        line: #line,
                    };
                    ::wajs::__private::invoke::<#ret_ty>(
                        &DECL,
                        &[#(::wajs::IntoValue::into_value(#names)),*],
                    )
                }
            }
        };

        let passthrough: Vec<&Attribute> = attrs.iter().filter(|a| !a.path().is_ident("doc")).collect();
        let defaulted = self
            .args
            .iter()
            .rev()
            .take_while(|a| a.default.is_some())
            .count();
        let defaults = (1..=defaulted).map(|missing| {
            let arity = count - missing;
            let stub_name = format_ident!("{}_{}", name, arity);
            let kept = &self.args[..arity];
            let kept_names = kept.iter().map(|a| &a.name);
            let kept_types = kept.iter().map(|a| &a.ty);
            let forwarded = kept
                .iter()
                .map(|a| a.name.to_token_stream())
                .chain(self.args[arity..].iter().filter_map(|a| a.default.as_ref()).map(ToTokens::to_token_stream));
            let doc = format!(" [`{name}`] with the last {missing} argument(s) defaulted.");
            quote! {
                #(#passthrough)*
                #[doc = #doc]
                #vis fn #stub_name(#(#kept_names: #kept_types),*) #output {
                    #name(#(#forwarded),*)
                }
            }
        });

        Ok(quote! {
            #stub
            #(#defaults)*
        })
    }
}

fn option_tokens(lit: Option<&LitStr>) -> TokenStream {
    match lit {
        Some(lit) => quote!(::core::option::Option::Some(#lit)),
        None => quote!(::core::option::Option::None),
    }
}

pub(crate) struct BridgeBlock {
    fns: Vec<BridgeFn>,
}

impl Parse for BridgeBlock {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut fns = Vec::new();
        while !input.is_empty() {
            fns.push(input.parse()?);
        }
        Ok(Self { fns })
    }
}

fn push_error(errors: &mut Option<syn::Error>, err: syn::Error) {
    match errors {
        Some(all) => all.combine(err),
        None => *errors = Some(err),
    }
}

pub(crate) fn expand(input: TokenStream) -> syn::Result<TokenStream> {
    let block: BridgeBlock = syn::parse2(input)?;
    let mut errors = None;
    let mut seen: HashMap<String, &Ident> = HashMap::new();
    let mut out = TokenStream::new();

    for f in &block.fns {
        if let Some(first) = seen.insert(f.js_name(), &f.name) {
            push_error(
                &mut errors,
                syn::Error::new(
                    f.name.span(),
                    format!("bridge function `{}` is declared twice in this block", f.js_name()),
                ),
            );
            push_error(&mut errors, syn::Error::new(first.span(), "first declared here"));
            continue;
        }
        match f.expand() {
            Ok(tokens) => out.extend(tokens),
            Err(err) => push_error(&mut errors, err),
        }
    }

    match errors {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_fn(tokens: TokenStream) -> BridgeFn {
        syn::parse2(tokens).unwrap()
    }

    fn expand_err(tokens: TokenStream) -> String {
        expand(tokens).unwrap_err().to_string()
    }

    #[test]
    fn test_signature_and_prefix() {
        let f = parse_fn(quote! {
            /// Sum of two numbers.
            pub fn add(a: i32 = 1, b: i32 = 2) -> i32 { "return a + b;" }
        });
        assert_eq!(f.signature().unwrap().to_string(), "(i32, i32) -> i32");
        assert_eq!(
            f.prefix().unwrap(),
            "add\u{11}a:i=1\u{12}b:i=2\u{11}i\u{11}\u{11}\u{11}return a + b;\u{11}"
        );
        assert_eq!(f.attrs.len(), 1);
    }

    #[test]
    fn test_library_and_init_attributes() {
        let f = parse_fn(quote! {
            #[library("AUDIO")]
            #[init("var ctx = null;")]
            fn beep(hz: f64, ms: u32 = 100) { "WA.print(hz);" }
        });
        let prefix = f.prefix().unwrap();
        assert!(prefix.contains("\u{11}AUDIO\u{11}var ctx = null;\u{11}"));
        assert!(f.attrs.is_empty());
    }

    #[test]
    fn test_default_stubs_generated() {
        let out = expand(quote! {
            pub fn add(a: i32 = 1, b: i32 = 2) -> i32 { "return a + b;" }
            fn tone(hz: f64, ms: u32 = 100) { "WA.print(hz);" }
        })
        .unwrap()
        .to_string();
        assert!(out.contains("fn add_1 (a : i32)"));
        assert!(out.contains("fn add_0 ()"));
        assert!(out.contains("fn tone_1 (hz : f64)"));
        assert!(!out.contains("fn add_2"));
        assert!(!out.contains("fn tone_0"));
    }

    #[test]
    fn test_duplicate_in_block() {
        let err = expand_err(quote! {
            fn ping() { "" }
            fn ping() { "" }
        });
        assert!(err.contains("declared twice"));
    }

    #[test]
    fn test_non_trailing_default() {
        let err = expand_err(quote! {
            fn f(a: i32 = 1, b: i32) { "" }
        });
        assert!(err.contains("follows a defaulted parameter"));
    }

    #[test]
    fn test_unsupported_type() {
        let err = expand_err(quote! {
            fn f(flag: bool) { "" }
        });
        assert!(err.contains("cannot cross the bridge"));
    }

    #[test]
    fn test_body_must_be_string() {
        let err = expand_err(quote! {
            fn f() { let x = 1; }
        });
        assert!(err.contains("one string literal"));
        let err = expand_err(quote! {
            fn f() { "a" "b" }
        });
        assert!(err.contains("nothing after"));
    }

    #[test]
    fn test_reserved_separator_in_source() {
        let err = expand_err(quote! {
            fn f() { "a\u{11}b" }
        });
        assert!(err.contains("reserved separator"));
    }
}
