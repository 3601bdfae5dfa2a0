//! The numeric dispatch table and its integrity record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use wajs_types::metadata::SnippetMeta;
use wajs_types::SnippetRecord;

/// Contents of the `wajs.dispatch` custom section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchInfo {
    pub slots: u32,
    pub checksum: String,
}

impl DispatchInfo {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// Slot id to snippet, ids assigned densely in import order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    slots: Vec<SnippetRecord>,
    checksum: String,
}

impl DispatchTable {
    pub fn build(snippets: impl IntoIterator<Item = SnippetMeta>) -> Self {
        let slots: Vec<SnippetRecord> = snippets
            .into_iter()
            .enumerate()
            .map(|(id, meta)| meta.into_record(id as u32))
            .collect();
        let checksum = checksum(&slots);
        Self { slots, checksum }
    }

    pub fn slots(&self) -> &[SnippetRecord] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn info(&self) -> DispatchInfo {
        DispatchInfo {
            slots: self.slots.len() as u32,
            checksum: self.checksum.clone(),
        }
    }
}

/// One line per slot: `id TAB name TAB codes`.
pub fn canonical(slots: &[SnippetRecord]) -> String {
    slots
        .iter()
        .map(|s| format!("{}\t{}\t{}\n", s.id, s.name, s.signature.codes()))
        .collect()
}

/// Hex SHA-256 of the canonical slot list.
pub fn checksum(slots: &[SnippetRecord]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical(slots).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wajs_types::{ArgKind, DeclSite, Param, ReturnKind, Signature};

    fn meta(name: &str, kinds: &[ArgKind]) -> SnippetMeta {
        SnippetMeta {
            name: name.into(),
            signature: Signature::new(
                kinds
                    .iter()
                    .enumerate()
                    .map(|(i, &k)| Param::new(format!("p{i}"), k))
                    .collect(),
                ReturnKind::Void,
            ),
            source: String::new(),
            library: None,
            init: None,
            site: DeclSite::new("a.rs", 1),
        }
    }

    #[test]
    fn test_ids_follow_input_order() {
        let table = DispatchTable::build([meta("b", &[]), meta("a", &[ArgKind::Int32])]);
        let ids: Vec<_> = table.slots().iter().map(|s| (s.id, s.name.as_str())).collect();
        assert_eq!(ids, [(0, "b"), (1, "a")]);
        assert_eq!(canonical(table.slots()), "0\tb\t>v\n1\ta\ti>v\n");
    }

    #[test]
    fn test_checksum_tracks_shape() {
        let one = DispatchTable::build([meta("f", &[ArgKind::Int32])]);
        let same = DispatchTable::build([meta("f", &[ArgKind::Int32])]);
        let other = DispatchTable::build([meta("f", &[ArgKind::Pointer])]);
        assert_eq!(one.checksum(), same.checksum());
        assert_ne!(one.checksum(), other.checksum());
        assert_eq!(one.checksum().len(), 64);
    }

    #[test]
    fn test_info_bytes() {
        let table = DispatchTable::build([meta("f", &[])]);
        let info = DispatchInfo::from_bytes(&table.info().to_bytes().unwrap()).unwrap();
        assert_eq!(info.slots, 1);
        assert_eq!(info.checksum, table.checksum());
    }
}
