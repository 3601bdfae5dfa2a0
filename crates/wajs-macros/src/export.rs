//! `#[export]`: native functions callable by name from host code.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Expr, ExprLit, FnArg, ItemFn, Lit, LitByteStr, LitStr, MetaNameValue, Token};
use wajs_types::metadata;

use crate::kind;

/// `name = "..."` pairs; an empty list exports under the function's name.
pub(crate) struct ExportArgs {
    names: Vec<LitStr>,
}

impl Parse for ExportArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let pairs = Punctuated::<MetaNameValue, Token![,]>::parse_terminated(input)?;
        let mut names: Vec<LitStr> = Vec::new();
        for pair in pairs {
            if !pair.path.is_ident("name") {
                return Err(syn::Error::new_spanned(
                    &pair.path,
                    "unknown export option; only `name = \"...\"` is supported",
                ));
            }
            let name = match pair.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(name), ..
                }) => name,
                other => {
                    return Err(syn::Error::new_spanned(other, "export name must be a string literal"))
                }
            };
            if let Some(first) = names.iter().find(|n| n.value() == name.value()) {
                let mut err = syn::Error::new(name.span(), format!("`{}` is listed twice", name.value()));
                err.combine(syn::Error::new(first.span(), "first listed here"));
                return Err(err);
            }
            names.push(name);
        }
        Ok(Self { names })
    }
}

fn check_signature(item: &ItemFn) -> syn::Result<()> {
    let sig = &item.sig;
    let problem = if !sig.generics.params.is_empty() {
        Some("an exported function cannot be generic")
    } else if sig.asyncness.is_some() {
        Some("an exported function cannot be async")
    } else if sig.variadic.is_some() {
        Some("an exported function cannot be variadic")
    } else if matches!(sig.inputs.first(), Some(FnArg::Receiver(_))) {
        Some("an exported function cannot take `self`")
    } else {
        None
    };
    match problem {
        Some(message) => Err(syn::Error::new_spanned(&sig.ident, message)),
        None => Ok(()),
    }
}

pub(crate) fn expand(args: ExportArgs, item: ItemFn) -> syn::Result<TokenStream> {
    check_signature(&item)?;
    let ident = &item.sig.ident;
    let names = if args.names.is_empty() {
        vec![LitStr::new(&ident.unraw().to_string(), ident.span())]
    } else {
        args.names
    };

    let mut types = Vec::new();
    let mut kinds = Vec::new();
    for input in &item.sig.inputs {
        if let FnArg::Typed(pat) = input {
            kinds.push(kind::arg_kind(&pat.ty)?);
            types.push(pat.ty.as_ref().clone());
        }
    }
    let ret = kind::return_kind(&item.sig.output)?;
    let output = &item.sig.output;
    let args: Vec<_> = (0..types.len()).map(|i| format_ident!("a{}", i)).collect();
    let indices = 0..types.len();
    let kind_tokens: Vec<TokenStream> = kinds.iter().map(|k| kind::arg_tokens(*k)).collect();
    let ret_tokens = kind::return_tokens(ret);
    let adapter = format_ident!("__wajs_invoke_{}", ident.unraw());

    let mut registrations = TokenStream::new();
    for (n, name) in names.iter().enumerate() {
        let record = metadata::encode_export(&name.value(), &kinds, ret)
            .map_err(|err| syn::Error::new(name.span(), err.to_string()))?;
        let bytes = LitByteStr::new(record.as_bytes(), Span::call_site());
        let len = record.len();
        let forward = format_ident!("__wajs_export_{}_{}", ident.unraw(), n);
        let section = format_ident!("__WAJS_EXPORT_{}_{}", ident.unraw(), n);
        registrations.extend(quote! {
            #[cfg(target_arch = "wasm32")]
            #[doc(hidden)]
            #[export_name = #name]
            extern "C" fn #forward(#(#args: #types),*) #output {
                #ident(#(#args),*)
            }

            #[cfg(target_arch = "wasm32")]
            #[doc(hidden)]
            #[allow(non_upper_case_globals)]
            #[link_section = "wajs.exports"]
            #[used]
            static #section: [u8; #len] = *#bytes;

            #[cfg(not(target_arch = "wasm32"))]
            ::wajs::inventory::submit! {
                ::wajs::native::RegisteredExport(::wajs::NativeExport {
                    name: #name,
                    params: &[#(#kind_tokens),*],
                    ret: #ret_tokens,
                    invoke: #adapter,
                })
            }
        });
    }

    Ok(quote! {
        #item

        #[cfg(not(target_arch = "wasm32"))]
        #[doc(hidden)]
        fn #adapter(args: &[::wajs::Value]) -> ::wajs::Value {
            ::wajs::IntoValue::into_value(#ident(
                #(::wajs::FromValue::from_value(::wajs::__private::arg(args, #indices))),*
            ))
        }

        #registrations
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn names(args: TokenStream) -> syn::Result<Vec<String>> {
        let args: ExportArgs = syn::parse2(args)?;
        Ok(args.names.iter().map(LitStr::value).collect())
    }

    #[test]
    fn test_names_and_aliases() {
        assert!(names(quote!()).unwrap().is_empty());
        assert_eq!(
            names(quote!(name = "onTick", name = "tick")).unwrap(),
            ["onTick", "tick"]
        );
        let err = names(quote!(name = "a", name = "a")).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
        let err = names(quote!(title = "a")).unwrap_err();
        assert!(err.to_string().contains("unknown export option"));
        let err = names(quote!(name = 5)).unwrap_err();
        assert!(err.to_string().contains("string literal"));
    }

    #[test]
    fn test_expansion_names_every_alias() {
        let item: ItemFn = parse_quote! {
            fn on_tick(ms: i32) {}
        };
        let args: ExportArgs = parse_quote!(name = "onTick", name = "tick");
        let out = expand(args, item).unwrap().to_string();
        assert!(out.contains("\"onTick\""));
        assert!(out.contains("\"tick\""));
        assert!(out.contains("__wajs_export_on_tick_1"));
        assert!(out.contains("__wajs_invoke_on_tick"));
    }

    #[test]
    fn test_default_name_is_function_name() {
        let item: ItemFn = parse_quote! {
            pub fn resize(w: u32, h: u32) -> i32 { 0 }
        };
        let out = expand(ExportArgs { names: vec![] }, item).unwrap().to_string();
        assert!(out.contains("export_name = \"resize\""));
    }

    #[test]
    fn test_rejected_signatures() {
        let generic: ItemFn = parse_quote! { fn f<T>(x: i32) {} };
        assert!(expand(ExportArgs { names: vec![] }, generic).is_err());
        let wide: ItemFn = parse_quote! { fn f(x: i64) {} };
        let err = expand(ExportArgs { names: vec![] }, wide).unwrap_err();
        assert!(err.to_string().contains("cannot cross the bridge"));
    }
}
