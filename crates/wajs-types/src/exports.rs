use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("no export named `{0}`")]
    Unknown(String),

    #[error("export `{0}` is registered more than once")]
    Duplicate(String),
}

/// Name-indexed table of native entry points.
///
/// Populated once when a module is instantiated and queried whenever host
/// code calls back into native code. Several names may map to the same
/// entry; one name never maps to two.
#[derive(Debug, Clone)]
pub struct ExportTable<E> {
    entries: BTreeMap<String, E>,
}

impl<E> Default for ExportTable<E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<E> ExportTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, rejecting duplicate names.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, ExportError>
    where
        I: IntoIterator<Item = (S, E)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, entry) in entries {
            table.insert(name, entry)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: E) -> Result<(), ExportError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(ExportError::Duplicate(name));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&E, ExportError> {
        self.entries
            .get(name)
            .ok_or_else(|| ExportError::Unknown(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &E)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_among_many() {
        let table = ExportTable::from_entries((0..64).map(|i| (format!("export_{i}"), i))).unwrap();
        assert_eq!(table.len(), 64);
        for i in 0..64 {
            assert_eq!(table.get(&format!("export_{i}")), Ok(&i));
        }
    }

    #[test]
    fn test_unknown_name() {
        let table: ExportTable<u32> = ExportTable::new();
        assert_eq!(
            table.get("onTick"),
            Err(ExportError::Unknown("onTick".into()))
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = ExportTable::from_entries([("tick", 1), ("tick", 2)]).unwrap_err();
        assert_eq!(err, ExportError::Duplicate("tick".into()));
    }

    #[test]
    fn test_aliases_share_an_entry() {
        let table = ExportTable::from_entries([("tick", 7), ("onTick", 7)]).unwrap();
        assert_eq!(table.get("tick"), table.get("onTick"));
        assert_eq!(table.names().collect::<Vec<_>>(), ["onTick", "tick"]);
    }
}
