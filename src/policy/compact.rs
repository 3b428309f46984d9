//! The string-or-list wire shape shared by `Action`, `Resource` and the
//! values of a `Principal` object.

use std::fmt;

use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TosError};

/// A list of strings encoded as a bare JSON string when it holds exactly one
/// element and as a JSON array otherwise.
///
/// Decoding accepts either form, so `"s"` and `["s"]` produce equal values.
/// An empty `Compact` stands for an absent field; containers skip it with
/// `skip_serializing_if = "Compact::is_empty"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Compact(Vec<String>);

impl Compact {
    pub fn new() -> Self {
        Self::default()
    }

    /// A compact holding a single value.
    pub fn one(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.0.push(value.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    /// Returns `true` if any element equals `value`.
    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    /// Encodes to the canonical wire form.
    ///
    /// An empty compact yields an empty byte sequence.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::to_vec(self).map_err(TosError::from)
    }

    /// Decodes either wire form.
    ///
    /// Empty input and `null` decode to an empty compact. Input that starts
    /// with anything other than `"` or `[` is rejected.
    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        let data = trim_json(data);
        match data.first() {
            None => Ok(Self::default()),
            Some(b'n' | b'"' | b'[') => {
                serde_json::from_slice(data).map_err(TosError::invalid_policy_syntax)
            }
            Some(other) => Err(TosError::invalid_policy_syntax(format!(
                "expected a string or an array of strings, found byte 0x{:02x}",
                other
            ))),
        }
    }
}

/// Strips JSON insignificant whitespace from both ends.
pub(crate) fn trim_json(data: &[u8]) -> &[u8] {
    let is_ws = |b: &u8| matches!(b, b' ' | b'\t' | b'\n' | b'\r');
    let start = data.iter().position(|b| !is_ws(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !is_ws(b)).map_or(start, |i| i + 1);
    &data[start..end]
}

impl From<&str> for Compact {
    fn from(value: &str) -> Self {
        Self::one(value)
    }
}

impl From<String> for Compact {
    fn from(value: String) -> Self {
        Self::one(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for Compact {
    fn from(values: Vec<S>) -> Self {
        values.into_iter().collect()
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Compact {
    fn from(values: [S; N]) -> Self {
        values.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Compact {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a Compact {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Compact {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let [single] = self.0.as_slice() {
            return serializer.serialize_str(single);
        }
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for value in &self.0 {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

struct CompactVisitor;

impl<'de> Visitor<'de> for CompactVisitor {
    type Value = Compact;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or an array of strings")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Compact, E> {
        Ok(Compact::one(v))
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> std::result::Result<Compact, E> {
        Ok(Compact::one(v))
    }

    fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Compact, E> {
        Ok(Compact::default())
    }

    fn visit_none<E: serde::de::Error>(self) -> std::result::Result<Compact, E> {
        Ok(Compact::default())
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Compact, D::Error> {
        d.deserialize_any(CompactVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Compact, A::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element::<String>()? {
            values.push(value);
        }
        Ok(Compact(values))
    }
}

impl<'de> Deserialize<'de> for Compact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(CompactVisitor)
    }
}
