//! Mapping from Rust types in declarations to bridge value kinds.

use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use syn::{ReturnType, Type};
use wajs_types::{ArgKind, ReturnKind};

fn unsupported(ty: &Type) -> syn::Error {
    syn::Error::new_spanned(
        ty,
        format!(
            "`{}` cannot cross the bridge; use i32, u32, f32, f64 or a raw pointer",
            ty.to_token_stream()
        ),
    )
}

pub(crate) fn arg_kind(ty: &Type) -> syn::Result<ArgKind> {
    match ty {
        Type::Paren(inner) => arg_kind(&inner.elem),
        Type::Group(inner) => arg_kind(&inner.elem),
        Type::Ptr(_) => Ok(ArgKind::Pointer),
        Type::Path(path) if path.qself.is_none() => {
            let Some(ident) = path.path.get_ident() else {
                return Err(unsupported(ty));
            };
            match ident.to_string().as_str() {
                "i32" | "u32" => Ok(ArgKind::Int32),
                "f32" => Ok(ArgKind::Float32),
                "f64" => Ok(ArgKind::Float64),
                _ => Err(unsupported(ty)),
            }
        }
        _ => Err(unsupported(ty)),
    }
}

pub(crate) fn return_kind(output: &ReturnType) -> syn::Result<ReturnKind> {
    match output {
        ReturnType::Default => Ok(ReturnKind::Void),
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Tuple(tuple) if tuple.elems.is_empty() => Ok(ReturnKind::Void),
            other => arg_kind(other).map(ReturnKind::from),
        },
    }
}

/// The Rust type a stub returns, `()` for void.
pub(crate) fn return_type(output: &ReturnType) -> TokenStream {
    match output {
        ReturnType::Default => quote!(()),
        ReturnType::Type(_, ty) => ty.to_token_stream(),
    }
}

pub(crate) fn arg_tokens(kind: ArgKind) -> TokenStream {
    match kind {
        ArgKind::Int32 => quote!(::wajs::ArgKind::Int32),
        ArgKind::Float32 => quote!(::wajs::ArgKind::Float32),
        ArgKind::Float64 => quote!(::wajs::ArgKind::Float64),
        ArgKind::Pointer => quote!(::wajs::ArgKind::Pointer),
    }
}

pub(crate) fn return_tokens(kind: ReturnKind) -> TokenStream {
    match kind {
        ReturnKind::Void => quote!(::wajs::ReturnKind::Void),
        ReturnKind::Int32 => quote!(::wajs::ReturnKind::Int32),
        ReturnKind::Float32 => quote!(::wajs::ReturnKind::Float32),
        ReturnKind::Float64 => quote!(::wajs::ReturnKind::Float64),
        ReturnKind::Pointer => quote!(::wajs::ReturnKind::Pointer),
    }
}
