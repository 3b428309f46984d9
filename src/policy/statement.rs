use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::compact::Compact;
use super::principals::Principals;

/// Actions a statement covers, e.g. `tos:GetObject`.
pub type Actions = Compact;

/// Resources a statement covers, e.g. `trn:tos:::bucket/*`.
pub type Resources = Compact;

/// Condition operator (e.g. `StringEquals`) to condition key to allowed values.
pub type Conditions = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Whether a statement grants or denies access.
///
/// Unknown values are kept as `Other` so a document written by a newer
/// service still decodes; [`super::Rules::validate`] reports them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Effect {
    Allow,
    Deny,
    Other(String),
}

impl Effect {
    pub fn as_str(&self) -> &str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
            Effect::Other(other) => other,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Effect {
    fn from(value: &str) -> Self {
        match value {
            "Allow" => Effect::Allow,
            "Deny" => Effect::Deny,
            other => Effect::Other(other.to_string()),
        }
    }
}

impl Serialize for Effect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Effect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Effect::from(value.as_str()))
    }
}

/// One Allow-or-Deny rule of a policy document.
///
/// Every field is optional; absent fields are omitted when encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Sid", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(rename = "Effect", default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<Effect>,

    #[serde(
        rename = "Principal",
        default,
        skip_serializing_if = "Principals::is_absent"
    )]
    pub principals: Principals,

    #[serde(rename = "Action", default, skip_serializing_if = "Compact::is_empty")]
    pub actions: Actions,

    #[serde(rename = "Resource", default, skip_serializing_if = "Compact::is_empty")]
    pub resources: Resources,

    #[serde(
        rename = "Condition",
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "deserialize_conditions"
    )]
    pub conditions: Conditions,
}

impl Statement {
    /// An empty statement with effect `Allow`.
    pub fn allow() -> Self {
        Self {
            effect: Some(Effect::Allow),
            ..Self::default()
        }
    }

    /// An empty statement with effect `Deny`.
    pub fn deny() -> Self {
        Self {
            effect: Some(Effect::Deny),
            ..Self::default()
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_principals(mut self, principals: Principals) -> Self {
        self.principals = principals;
        self
    }

    pub fn with_actions(mut self, actions: impl Into<Actions>) -> Self {
        self.actions = actions.into();
        self
    }

    pub fn with_resources(mut self, resources: impl Into<Resources>) -> Self {
        self.resources = resources.into();
        self
    }

    /// Adds allowed values for `key` under the condition `operator`.
    pub fn with_condition<I, S>(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions
            .entry(operator.into())
            .or_default()
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }
}

/// Condition values accept a bare string or an array; they are always
/// written back as arrays.
fn deserialize_conditions<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Conditions, D::Error> {
    let raw = Option::<BTreeMap<String, BTreeMap<String, Compact>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(operator, keys)| {
            let keys = keys
                .into_iter()
                .map(|(key, values)| (key, values.into_inner()))
                .collect();
            (operator, keys)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_round_trips_unknown_values() {
        let effect: Effect = serde_json::from_str(r#""Audit""#).unwrap();
        assert_eq!(effect, Effect::Other("Audit".to_string()));
        assert_eq!(serde_json::to_string(&effect).unwrap(), r#""Audit""#);
    }

    #[test]
    fn minimal_statement_omits_absent_fields() {
        let statement = Statement::allow()
            .with_principals(Principals::All)
            .with_actions("tos:GetObject")
            .with_resources("trn:tos:::b/*");
        let json = serde_json::to_value(&statement).unwrap();
        let object = json.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["Action", "Effect", "Principal", "Resource"]);
    }

    #[test]
    fn principals_without_identifiers_are_omitted() {
        let statement = Statement::allow()
            .with_principals(Principals::Multi(BTreeMap::from([(
                "TOS".to_string(),
                Compact::new(),
            )])))
            .with_actions("tos:*");
        assert_eq!(
            serde_json::to_string(&statement).unwrap(),
            r#"{"Effect":"Allow","Action":"tos:*"}"#
        );

        let built = Statement::allow()
            .with_principals(Principals::multi([("TOS", Vec::<&str>::new())]))
            .with_actions("tos:*");
        let json = serde_json::to_string(&built).unwrap();
        assert_eq!(serde_json::from_str::<Statement>(&json).unwrap(), built);
    }

    #[test]
    fn empty_statement_encodes_to_empty_object() {
        assert_eq!(serde_json::to_string(&Statement::default()).unwrap(), "{}");
    }

    #[test]
    fn conditions_accept_scalar_values() {
        let statement: Statement = serde_json::from_str(
            r#"{"Condition":{"StringEquals":{"tos:x-tos-acl":"public-read"}}}"#,
        )
        .unwrap();
        assert_eq!(
            statement.conditions["StringEquals"]["tos:x-tos-acl"],
            vec!["public-read".to_string()]
        );
        assert_eq!(
            serde_json::to_string(&statement).unwrap(),
            r#"{"Condition":{"StringEquals":{"tos:x-tos-acl":["public-read"]}}}"#
        );
    }

    #[test]
    fn null_fields_decode_as_absent() {
        let statement: Statement = serde_json::from_str(
            r#"{"Sid":null,"Effect":"Deny","Principal":null,"Action":null,"Resource":null,"Condition":null}"#,
        )
        .unwrap();
        assert_eq!(statement, Statement::deny());
    }

    #[test]
    fn with_condition_accumulates_values() {
        let statement = Statement::allow()
            .with_condition("StringEquals", "tos:x-tos-acl", ["public-read"])
            .with_condition("StringEquals", "tos:x-tos-acl", ["private"]);
        assert_eq!(
            statement.conditions["StringEquals"]["tos:x-tos-acl"],
            vec!["public-read".to_string(), "private".to_string()]
        );
    }
}
