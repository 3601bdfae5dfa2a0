//! Metadata encoding shared by the declaration macros and the synthesizer.
//!
//! A bridge function is a function import from [`SNIPPET_MODULE`] whose
//! import name holds seven fields separated by [`FIELD_SEP`]:
//!
//! ```text
//! name ␑ params ␑ ret ␑ library ␑ init ␑ source ␑ file:line
//! ```
//!
//! `params` lists `name:code[=default]` entries separated by [`ITEM_SEP`].
//! Linkers drop imports nothing calls, so unreferenced snippets leave no
//! trace in the artifact while referenced ones always survive.
//!
//! Every name given to the export macro adds one record to the custom
//! section [`EXPORTS_SECTION`]:
//!
//! ```text
//! name ␑ param-codes ␑ ret-code ␒
//! ```
//!
//! After synthesis the snippet imports are renamed to their decimal slot
//! number and [`DISPATCH_SECTION`] records the slot count and checksum.

use crate::{ArgKind, DeclSite, Param, ReturnKind, Signature, SnippetRecord};

pub const SNIPPET_MODULE: &str = "wajs";
pub const EXPORTS_SECTION: &str = "wajs.exports";
pub const DISPATCH_SECTION: &str = "wajs.dispatch";
/// Embedded files live in custom sections named `|<file name>`.
pub const FILE_SECTION_PREFIX: &str = "|";
pub const FIELD_SEP: char = '\u{11}';
pub const ITEM_SEP: char = '\u{12}';

const SNIPPET_FIELDS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("`{0}` is not a valid identifier")]
    BadIdentifier(String),

    #[error("unknown kind code `{code}` for {what}")]
    UnknownKind { code: String, what: String },

    #[error("parameter entry `{0}` is malformed")]
    BadParam(String),

    #[error("declaration site `{0}` is not of the form file:line")]
    BadSite(String),

    #[error("parameter `{0}` has no default but follows a defaulted parameter")]
    NonTrailingDefault(String),

    #[error("{0} contains a reserved separator character")]
    ReservedCharacter(&'static str),

    #[error("export record `{0}` is not terminated")]
    Unterminated(String),

    #[error("metadata is not valid UTF-8")]
    Utf8,
}

/// A decoded snippet import, before a dispatch slot is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetMeta {
    pub name: String,
    pub signature: Signature,
    pub source: String,
    pub library: Option<String>,
    pub init: Option<String>,
    pub site: DeclSite,
}

impl SnippetMeta {
    pub fn into_record(self, id: u32) -> SnippetRecord {
        SnippetRecord {
            id,
            name: self.name,
            signature: self.signature,
            source: self.source,
            library: self.library,
            init: self.init,
            site: self.site,
        }
    }
}

/// True for `[A-Za-z_$][A-Za-z0-9_$]*`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// True for import names already rewritten to a dispatch slot.
pub fn is_slot_name(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn check_text(text: &str, what: &'static str) -> Result<(), MetadataError> {
    if text.contains(FIELD_SEP) || text.contains(ITEM_SEP) {
        return Err(MetadataError::ReservedCharacter(what));
    }
    Ok(())
}

/// Encode every field but the declaration site.
///
/// The result ends with a separator so that the macro can append
/// `file!():line!()` at compile time.
pub fn encode_snippet_prefix(
    name: &str,
    signature: &Signature,
    library: Option<&str>,
    init: Option<&str>,
    source: &str,
) -> Result<String, MetadataError> {
    if !is_identifier(name) {
        return Err(MetadataError::BadIdentifier(name.to_string()));
    }
    if let Some(param) = signature.non_trailing_default() {
        return Err(MetadataError::NonTrailingDefault(param.to_string()));
    }

    let mut params = Vec::with_capacity(signature.arity());
    for param in &signature.params {
        if !is_identifier(&param.name) {
            return Err(MetadataError::BadIdentifier(param.name.clone()));
        }
        let mut entry = format!("{}:{}", param.name, param.kind.code());
        if let Some(default) = &param.default {
            check_text(default, "default value")?;
            entry.push('=');
            entry.push_str(default);
        }
        params.push(entry);
    }

    let library = library.unwrap_or_default();
    let init = init.unwrap_or_default();
    check_text(library, "library name")?;
    check_text(init, "init code")?;
    check_text(source, "source text")?;

    let fields = [
        name.to_string(),
        params.join(&ITEM_SEP.to_string()),
        signature.ret.code().to_string(),
        library.to_string(),
        init.to_string(),
        source.to_string(),
    ];
    let mut out = fields.join(&FIELD_SEP.to_string());
    out.push(FIELD_SEP);
    Ok(out)
}

pub fn encode_snippet(meta: &SnippetMeta) -> Result<String, MetadataError> {
    let mut out = encode_snippet_prefix(
        &meta.name,
        &meta.signature,
        meta.library.as_deref(),
        meta.init.as_deref(),
        &meta.source,
    )?;
    out.push_str(&meta.site.to_string());
    Ok(out)
}

fn decode_param(entry: &str) -> Result<Param, MetadataError> {
    let (name, rest) = entry
        .split_once(':')
        .ok_or_else(|| MetadataError::BadParam(entry.to_string()))?;
    if !is_identifier(name) {
        return Err(MetadataError::BadIdentifier(name.to_string()));
    }
    let mut chars = rest.chars();
    let code = chars
        .next()
        .ok_or_else(|| MetadataError::BadParam(entry.to_string()))?;
    let kind = ArgKind::from_code(code).ok_or_else(|| MetadataError::UnknownKind {
        code: code.to_string(),
        what: format!("parameter `{name}`"),
    })?;
    let tail = chars.as_str();
    let default = match tail.strip_prefix('=') {
        Some(text) => Some(text.to_string()),
        None if tail.is_empty() => None,
        None => return Err(MetadataError::BadParam(entry.to_string())),
    };
    Ok(Param {
        name: name.to_string(),
        kind,
        default,
    })
}

fn decode_return(text: &str, what: &str) -> Result<ReturnKind, MetadataError> {
    let mut chars = text.chars();
    let kind = match (chars.next(), chars.next()) {
        (Some(code), None) => ReturnKind::from_code(code),
        _ => None,
    };
    kind.ok_or_else(|| MetadataError::UnknownKind {
        code: text.to_string(),
        what: what.to_string(),
    })
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

/// Decode a snippet import name.
pub fn decode_snippet(text: &str) -> Result<SnippetMeta, MetadataError> {
    let fields: Vec<&str> = text.split(FIELD_SEP).collect();
    if fields.len() != SNIPPET_FIELDS {
        return Err(MetadataError::FieldCount {
            expected: SNIPPET_FIELDS,
            found: fields.len(),
        });
    }
    let name = fields[0];
    if !is_identifier(name) {
        return Err(MetadataError::BadIdentifier(name.to_string()));
    }

    let params = if fields[1].is_empty() {
        Vec::new()
    } else {
        fields[1]
            .split(ITEM_SEP)
            .map(decode_param)
            .collect::<Result<Vec<_>, _>>()?
    };
    let ret = decode_return(fields[2], "the return value")?;
    let signature = Signature::new(params, ret);
    if let Some(param) = signature.non_trailing_default() {
        return Err(MetadataError::NonTrailingDefault(param.to_string()));
    }

    let site =
        DeclSite::parse(fields[6]).ok_or_else(|| MetadataError::BadSite(fields[6].to_string()))?;

    Ok(SnippetMeta {
        name: name.to_string(),
        signature,
        source: fields[5].to_string(),
        library: non_empty(fields[3]),
        init: non_empty(fields[4]),
        site,
    })
}

/// Encode one export record, terminator included.
pub fn encode_export(
    name: &str,
    params: &[ArgKind],
    ret: ReturnKind,
) -> Result<String, MetadataError> {
    if name.is_empty() {
        return Err(MetadataError::BadIdentifier(String::new()));
    }
    check_text(name, "export name")?;
    let codes: String = params.iter().map(|k| k.code()).collect();
    Ok(format!(
        "{name}{FIELD_SEP}{codes}{FIELD_SEP}{}{ITEM_SEP}",
        ret.code()
    ))
}

/// Decode the concatenated records of an exports section.
pub fn decode_exports(data: &[u8]) -> Result<Vec<(String, Signature)>, MetadataError> {
    let text = std::str::from_utf8(data).map_err(|_| MetadataError::Utf8)?;
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (record, tail) = rest
            .split_once(ITEM_SEP)
            .ok_or_else(|| MetadataError::Unterminated(rest.to_string()))?;
        rest = tail;

        let fields: Vec<&str> = record.split(FIELD_SEP).collect();
        if fields.len() != 3 {
            return Err(MetadataError::FieldCount {
                expected: 3,
                found: fields.len(),
            });
        }
        let name = fields[0];
        let kinds = fields[1]
            .chars()
            .map(|c| {
                ArgKind::from_code(c).ok_or_else(|| MetadataError::UnknownKind {
                    code: c.to_string(),
                    what: format!("export `{name}`"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ret = decode_return(fields[2], &format!("export `{name}`"))?;
        out.push((name.to_string(), Signature::from_kinds(&kinds, ret)));
    }
    Ok(out)
}
