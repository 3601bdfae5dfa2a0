//! Binary rewrite: rename bridge imports to their slots and swap the
//! metadata sections.
//!
//! Sections other than imports and custom sections are copied byte for
//! byte, so function indices, code and data are untouched.

use std::borrow::Cow;
use std::collections::HashMap;

use wajs_types::metadata::{DISPATCH_SECTION, EXPORTS_SECTION, FILE_SECTION_PREFIX};
use wasm_encoder::{CustomSection, Encode, Module, RawSection, SectionId};
use wasmparser::{ImportSectionReader, Parser, Payload};

use crate::dispatch::DispatchInfo;
use crate::error::{SynthError, SynthResult};
use crate::options::SynthOptions;

/// Re-encode the import section, renaming the imports at the given
/// positions. Type descriptors are copied raw.
fn rename_imports(
    bytes: &[u8],
    reader: ImportSectionReader<'_>,
    renames: &HashMap<usize, u32>,
) -> SynthResult<Vec<u8>> {
    let section_end = reader.range().end;
    let count = reader.count();
    let items = reader
        .into_iter_with_offsets()
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::new();
    count.encode(&mut out);
    for (i, (start, import)) in items.iter().enumerate() {
        let end = items.get(i + 1).map_or(section_end, |(next, _)| *next);
        let mut head = Vec::new();
        import.module.encode(&mut head);
        import.name.encode(&mut head);
        let descriptor = bytes
            .get(start + head.len()..end)
            .ok_or_else(|| SynthError::Malformed(format!("import {i} overruns its section")))?;

        import.module.encode(&mut out);
        match renames.get(&i) {
            Some(id) => id.to_string().encode(&mut out),
            None => import.name.encode(&mut out),
        }
        out.extend_from_slice(descriptor);
    }
    Ok(out)
}

fn is_replaced(name: &str, opts: &SynthOptions) -> bool {
    name == EXPORTS_SECTION
        || name == DISPATCH_SECTION
        || name.starts_with(FILE_SECTION_PREFIX)
        || (name == "name" && opts.strips_names())
}

/// Rewrite `bytes`: rename imports, drop consumed metadata, append the
/// dispatch record and embedded files, then validate the result.
pub fn rewrite(
    bytes: &[u8],
    renames: &HashMap<usize, u32>,
    dispatch: &DispatchInfo,
    opts: &SynthOptions,
) -> SynthResult<Vec<u8>> {
    let mut module = Module::new();

    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload?;
        match payload {
            Payload::ImportSection(reader) => {
                let data = rename_imports(bytes, reader, renames)?;
                module.section(&RawSection {
                    id: SectionId::Import as u8,
                    data: &data,
                });
            }
            Payload::CustomSection(reader) => {
                if is_replaced(reader.name(), opts) {
                    log::debug!("dropping custom section `{}`", reader.name());
                    continue;
                }
                module.section(&CustomSection {
                    name: Cow::Borrowed(reader.name()),
                    data: Cow::Borrowed(reader.data()),
                });
            }
            other => {
                if let Some((id, range)) = other.as_section() {
                    module.section(&RawSection {
                        id,
                        data: &bytes[range],
                    });
                }
            }
        }
    }

    let info = dispatch.to_bytes()?;
    module.section(&CustomSection {
        name: Cow::Borrowed(DISPATCH_SECTION),
        data: Cow::Owned(info),
    });
    for file in &opts.embed {
        if file.name.is_empty() || file.name.contains(['/', '\\']) {
            return Err(SynthError::BadFileName(file.name.clone()));
        }
        module.section(&CustomSection {
            name: Cow::Owned(format!("{FILE_SECTION_PREFIX}{}", file.name)),
            data: Cow::Borrowed(&file.data),
        });
    }

    let out = module.finish();
    wasmparser::validate(&out).map_err(|e| SynthError::ValidationFailed(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{ModuleBuilder, Ty};
    use crate::options::EmbeddedFile;
    use crate::scan::scan;

    fn info() -> DispatchInfo {
        DispatchInfo {
            slots: 1,
            checksum: "00".into(),
        }
    }

    #[test]
    fn test_renames_only_listed_imports() {
        let mut m = ModuleBuilder::new();
        let a = m.import_func("env", "keep", &[Ty::I32], &[]);
        let b = m.import_func("wajs", "long\u{11}name", &[], &[Ty::F64]);
        m.memory(1);
        let main = m.func(&[], &[], |f| {
            f.i32_const(1).call(a).call(b).drop_value();
        });
        m.export_func("main", main);

        let renames = HashMap::from([(1, 0)]);
        let out = rewrite(&m.finish(), &renames, &info(), &SynthOptions::default()).unwrap();
        let scanned = scan(&out).unwrap();
        let names: Vec<_> = scanned.imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["keep", "0"]);
        assert_eq!(scanned.func_export("main"), Some(main));
    }

    #[test]
    fn test_sections_swapped() {
        let mut m = ModuleBuilder::new();
        m.memory(1);
        m.custom("name", vec![0u8, 0]).custom("producers", b"x".to_vec());
        let main = m.func(&[], &[], |_| {});
        m.export_func("main", main);
        m.declare_export("main", &[], wajs_types::ReturnKind::Void).unwrap();

        let opts = SynthOptions::minified()
            .with_embedded(EmbeddedFile::new("readme.txt", b"hello".to_vec()));
        let out = rewrite(&m.finish(), &HashMap::new(), &info(), &opts).unwrap();
        let scanned = scan(&out).unwrap();
        let names: Vec<_> = scanned.customs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["producers", DISPATCH_SECTION, "|readme.txt"]);
        assert_eq!(scanned.custom("|readme.txt").unwrap().data, b"hello");
    }

    #[test]
    fn test_bad_file_name() {
        let mut m = ModuleBuilder::new();
        m.memory(1);
        let opts = SynthOptions::default().with_embedded(EmbeddedFile::new("a/b", vec![]));
        let err = rewrite(&m.finish(), &HashMap::new(), &info(), &opts).unwrap_err();
        assert!(matches!(err, SynthError::BadFileName(_)));
    }
}
