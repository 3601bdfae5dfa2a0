use crate::{ArgKind, ReturnKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One declared parameter of a bridge function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: ArgKind,
    /// Default expression as written at the declaration, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Ordered parameter list plus return kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Param>,
    pub ret: ReturnKind,
}

impl Signature {
    pub fn new(params: Vec<Param>, ret: ReturnKind) -> Self {
        Self { params, ret }
    }

    /// Signature with anonymous parameters, as recovered from a wasm type.
    pub fn from_kinds(kinds: &[ArgKind], ret: ReturnKind) -> Self {
        let params = kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| Param::new(format!("a{i}"), kind))
            .collect();
        Self { params, ret }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Number of leading parameters without a default.
    pub fn required_arity(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| p.default.is_none())
            .count()
    }

    /// Name of the first parameter lacking a default after a defaulted one.
    pub fn non_trailing_default(&self) -> Option<&str> {
        self.params
            .iter()
            .skip(self.required_arity())
            .find(|p| p.default.is_none())
            .map(|p| p.name.as_str())
    }

    pub fn kinds(&self) -> impl Iterator<Item = ArgKind> + '_ {
        self.params.iter().map(|p| p.kind)
    }

    /// Parameter and return codes, e.g. `ii>i`.
    pub fn codes(&self) -> String {
        let mut out: String = self.kinds().map(ArgKind::code).collect();
        out.push('>');
        out.push(self.ret.code());
        out
    }

    /// True when both signatures have the same kinds, ignoring names and
    /// defaults.
    pub fn same_shape(&self, other: &Signature) -> bool {
        self.ret == other.ret && self.kinds().eq(other.kinds())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, kind) in self.kinds().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(kind.name())?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_sig() -> Signature {
        Signature::new(
            vec![
                Param::new("a", ArgKind::Int32).with_default("1"),
                Param::new("b", ArgKind::Int32).with_default("2"),
            ],
            ReturnKind::Int32,
        )
    }

    #[test]
    fn test_required_arity() {
        assert_eq!(add_sig().required_arity(), 0);
        let sig = Signature::new(
            vec![
                Param::new("p", ArgKind::Pointer),
                Param::new("n", ArgKind::Int32).with_default("7"),
            ],
            ReturnKind::Void,
        );
        assert_eq!(sig.required_arity(), 1);
        assert_eq!(sig.arity(), 2);
        assert_eq!(sig.non_trailing_default(), None);
    }

    #[test]
    fn test_non_trailing_default_detected() {
        let sig = Signature::new(
            vec![
                Param::new("a", ArgKind::Int32).with_default("1"),
                Param::new("b", ArgKind::Int32),
            ],
            ReturnKind::Void,
        );
        assert_eq!(sig.non_trailing_default(), Some("b"));
    }

    #[test]
    fn test_display_and_codes() {
        let sig = Signature::from_kinds(&[ArgKind::Pointer, ArgKind::Float64], ReturnKind::Float32);
        assert_eq!(sig.to_string(), "(ptr, f64) -> f32");
        assert_eq!(sig.codes(), "pd>f");
        assert_eq!(add_sig().codes(), "ii>i");
    }

    #[test]
    fn test_same_shape_ignores_names() {
        let anon = Signature::from_kinds(&[ArgKind::Int32, ArgKind::Int32], ReturnKind::Int32);
        assert!(add_sig().same_shape(&anon));
        let other = Signature::from_kinds(&[ArgKind::Int32], ReturnKind::Int32);
        assert!(!add_sig().same_shape(&other));
    }
}
