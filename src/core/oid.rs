//! Purpose: Owned object identifier made of `u32` sub-identifiers.
//! Exports: `Oid`.
//! Role: Addressing type shared by the schema model, transports and the walker.
//! Invariants: Text form is dotted decimal; a single leading dot is accepted on parse.
//! Invariants: Ordering is lexicographic over sub-identifiers (protocol walk order).
use crate::core::error::Error;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(parts: Vec<u32>) -> Self {
        Self(parts)
    }

    pub fn from_slice(parts: &[u32]) -> Self {
        Self(parts.to_vec())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns `self` followed by `suffix`.
    pub fn concat(&self, suffix: &[u32]) -> Oid {
        let mut parts = Vec::with_capacity(self.0.len() + suffix.len());
        parts.extend_from_slice(&self.0);
        parts.extend_from_slice(suffix);
        Oid(parts)
    }

    pub fn child(&self, sub_id: u32) -> Oid {
        self.concat(&[sub_id])
    }

    /// Sub-identifiers after the first `len`; empty when `len` exceeds the oid.
    pub fn suffix_after(&self, len: usize) -> &[u32] {
        self.0.get(len..).unwrap_or(&[])
    }

    pub fn parent(&self) -> Option<Oid> {
        let (_, head) = self.0.split_last()?;
        Some(Oid(head.to_vec()))
    }
}

impl From<Vec<u32>> for Oid {
    fn from(parts: Vec<u32>) -> Self {
        Self(parts)
    }
}

impl From<&[u32]> for Oid {
    fn from(parts: &[u32]) -> Self {
        Self::from_slice(parts)
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(Error::usage("object identifier is empty"));
        }
        body.split('.')
            .map(|part| {
                part.parse::<u32>().map_err(|err| {
                    Error::usage(format!("invalid sub-identifier {part:?} in {text:?}"))
                        .with_source(err)
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Oid)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Oid;
    use crate::core::error::ErrorKind;

    #[test]
    fn parses_with_and_without_leading_dot() {
        let a: Oid = "1.3.6.1.2.1".parse().expect("oid");
        let b: Oid = ".1.3.6.1.2.1".parse().expect("oid");
        assert_eq!(a, b);
        assert_eq!(a.as_slice(), &[1, 3, 6, 1, 2, 1]);
        assert_eq!(a.to_string(), "1.3.6.1.2.1");
    }

    #[test]
    fn rejects_empty_and_non_numeric_parts() {
        for text in ["", ".", "1..3", "1.x.3", "1.4294967296"] {
            let err = text.parse::<Oid>().expect_err(text);
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
    }

    #[test]
    fn suffix_after_is_bounded() {
        let oid = Oid::from_slice(&[1, 2, 3, 4]);
        assert_eq!(oid.suffix_after(2), &[3, 4]);
        assert_eq!(oid.suffix_after(4), &[] as &[u32]);
        assert_eq!(oid.suffix_after(9), &[] as &[u32]);
    }

    #[test]
    fn ordering_follows_walk_order() {
        let a = Oid::from_slice(&[1, 3, 6, 1]);
        let b = Oid::from_slice(&[1, 3, 6, 1, 0]);
        let c = Oid::from_slice(&[1, 3, 7]);
        assert!(a < b);
        assert!(b < c);
        assert!(b.starts_with(&a));
        assert!(!c.starts_with(&a));
    }

    #[test]
    fn serde_uses_dotted_text() {
        let oid = Oid::from_slice(&[1, 3, 6]);
        let json = serde_json::to_string(&oid).expect("encode");
        assert_eq!(json, "\"1.3.6\"");
        let back: Oid = serde_json::from_str(&json).expect("decode");
        assert_eq!(back, oid);
    }
}
