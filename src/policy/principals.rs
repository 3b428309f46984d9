use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::compact::{Compact, trim_json};
use crate::error::{Result, TosError};

/// The wildcard principal.
pub const ALL_PRINCIPALS: &str = "*";

/// The identities a statement applies to.
///
/// `All` and `Multi` are kept apart strictly by wire shape: `"*"` and
/// `["*"]` decode to `All`, while `{"TOS":"*"}` decodes to `Multi`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Principals {
    /// No principal (the field is absent).
    #[default]
    None,
    /// Any caller.
    All,
    /// Identity-provider key (e.g. `TOS`) to principal identifiers.
    Multi(BTreeMap<String, Compact>),
}

impl Principals {
    pub fn all() -> Self {
        Principals::All
    }

    /// Builds a `Multi` variant from `(provider, identifiers)` pairs.
    ///
    /// Providers without identifiers are dropped; if none remain the result
    /// is `None`.
    pub fn multi<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Compact>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: BTreeMap<String, Compact> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        if entries.is_empty() {
            Principals::None
        } else {
            Principals::Multi(entries)
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Principals::None)
    }

    /// `true` when nothing would be encoded: `None`, or a `Multi` whose
    /// entries are all empty.
    pub fn is_absent(&self) -> bool {
        match self {
            Principals::None => true,
            Principals::All => false,
            Principals::Multi(entries) => entries.values().all(Compact::is_empty),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Principals::All)
    }

    /// Identifiers listed for `provider`, for the `Multi` variant.
    pub fn get(&self, provider: &str) -> Option<&Compact> {
        match self {
            Principals::Multi(map) => map.get(provider),
            _ => None,
        }
    }

    /// Encodes to the wire form; an absent value yields an empty byte sequence.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        if self.is_absent() {
            return Ok(Vec::new());
        }
        serde_json::to_vec(self).map_err(TosError::from)
    }

    /// Decodes any accepted wire form; empty input and `null` yield `None`.
    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        let data = trim_json(data);
        if data.is_empty() {
            return Ok(Principals::None);
        }
        serde_json::from_slice(data).map_err(TosError::invalid_policy_syntax)
    }
}

impl Serialize for Principals {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Principals::None => serializer.serialize_none(),
            Principals::All => serializer.serialize_str(ALL_PRINCIPALS),
            Principals::Multi(entries) => {
                let mut map = serializer.serialize_map(None)?;
                for (provider, ids) in entries.iter().filter(|(_, ids)| !ids.is_empty()) {
                    map.serialize_entry(provider, ids)?;
                }
                map.end()
            }
        }
    }
}

struct PrincipalsVisitor;

impl<'de> Visitor<'de> for PrincipalsVisitor {
    type Value = Principals;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(r#""*", ["*"], or an object of identity providers"#)
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Principals, E> {
        if v == ALL_PRINCIPALS {
            Ok(Principals::All)
        } else {
            Err(E::custom(format!(
                "principal string must be \"*\", got \"{}\"",
                v
            )))
        }
    }

    fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Principals, E> {
        Ok(Principals::None)
    }

    fn visit_none<E: serde::de::Error>(self) -> std::result::Result<Principals, E> {
        Ok(Principals::None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Principals, D::Error> {
        d.deserialize_any(PrincipalsVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Principals, A::Error> {
        let mut values = Vec::new();
        while let Some(value) = seq.next_element::<String>()? {
            values.push(value);
        }
        match values.as_slice() {
            [single] if single == ALL_PRINCIPALS => Ok(Principals::All),
            _ => Err(serde::de::Error::custom(format!(
                "principal array must be [\"*\"], got {:?}",
                values
            ))),
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Principals, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((provider, ids)) = map.next_entry::<String, Compact>()? {
            entries.insert(provider, ids);
        }
        Ok(Principals::Multi(entries))
    }
}

impl<'de> Deserialize<'de> for Principals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(PrincipalsVisitor)
    }
}
