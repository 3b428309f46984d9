//! Bucket policy documents.
//!
//! Policies use an IAM-style JSON format whose `Principal`, `Action` and
//! `Resource` fields are polymorphic: a bare string, an array of strings,
//! or (for `Principal`) an object keyed by identity provider. The types in
//! this module accept every shape on input and write the most compact one
//! on output, so that documents round-trip without losing the distinction
//! between the wildcard principal and an explicit list.
//!
//! ```
//! use rs_tos::policy::{Principals, Rules, Statement};
//!
//! let rules = Rules::new().with_statement(
//!     Statement::allow()
//!         .with_sid("PublicRead")
//!         .with_principals(Principals::All)
//!         .with_actions("tos:GetObject")
//!         .with_resources("trn:tos:::my-bucket/*"),
//! );
//!
//! let json = rules.to_json().unwrap();
//! assert_eq!(Rules::from_json(&json).unwrap(), rules);
//! ```

mod compact;
mod principals;
mod statement;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TosError};

pub use compact::Compact;
pub use principals::{ALL_PRINCIPALS, Principals};
pub use statement::{Actions, Conditions, Effect, Resources, Statement};

/// Policy language version written by [`Rules::new`].
pub const POLICY_VERSION: &str = "2012-10-17";

/// The action matching every operation of the service.
pub const ALL_ACTIONS: &str = "tos:*";

/// Actions holding only [`ALL_ACTIONS`].
pub fn all_actions() -> Actions {
    Compact::one(ALL_ACTIONS)
}

static SID_REGEX: OnceLock<Regex> = OnceLock::new();

fn sid_regex() -> &'static Regex {
    SID_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9]*$").expect("Invalid SID_REGEX pattern"))
}

/// A policy document: version, optional id, and ordered statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    #[serde(rename = "Version", default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        rename = "Statement",
        default,
        deserialize_with = "deserialize_statements"
    )]
    pub statements: Vec<Statement>,
}

/// A soft problem found while encoding a document.
///
/// The service is authoritative on policy validity, so these are logged
/// and never fail the encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyWarning {
    MissingEffect { index: usize },
    UnknownEffect { index: usize, effect: String },
    InvalidSid { index: usize, sid: String },
    MissingActions { index: usize },
}

impl fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyWarning::MissingEffect { index } => {
                write!(f, "statement {} has no Effect", index)
            }
            PolicyWarning::UnknownEffect { index, effect } => write!(
                f,
                "statement {} has Effect '{}', expected Allow or Deny",
                index, effect
            ),
            PolicyWarning::InvalidSid { index, sid } => write!(
                f,
                "statement {} has Sid '{}' with characters outside [A-Za-z0-9]",
                index, sid
            ),
            PolicyWarning::MissingActions { index } => {
                write!(f, "statement {} has no Action", index)
            }
        }
    }
}

impl Rules {
    /// An empty document with [`POLICY_VERSION`].
    pub fn new() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Appends a statement, keeping insertion order.
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Reports soft problems with the document.
    pub fn validate(&self) -> Vec<PolicyWarning> {
        let mut warnings = Vec::new();
        for (index, statement) in self.statements.iter().enumerate() {
            match &statement.effect {
                None => warnings.push(PolicyWarning::MissingEffect { index }),
                Some(Effect::Other(effect)) => warnings.push(PolicyWarning::UnknownEffect {
                    index,
                    effect: effect.clone(),
                }),
                Some(Effect::Allow | Effect::Deny) => {}
            }
            if let Some(sid) = &statement.sid
                && !sid_regex().is_match(sid)
            {
                warnings.push(PolicyWarning::InvalidSid {
                    index,
                    sid: sid.clone(),
                });
            }
            if statement.actions.is_empty() {
                warnings.push(PolicyWarning::MissingActions { index });
            }
        }
        warnings
    }

    /// Encodes the document to compact JSON, logging validation warnings.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        for warning in self.validate() {
            tracing::warn!(policy_id = ?self.id, %warning, "policy document validation");
        }
        serde_json::to_vec(self).map_err(TosError::from)
    }

    /// Decodes a document, accepting every polymorphic field shape.
    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(TosError::invalid_policy_syntax)
    }

    pub fn to_json(&self) -> Result<String> {
        let bytes = self.marshal()?;
        String::from_utf8(bytes).map_err(|e| TosError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::unmarshal(json.as_bytes())
    }
}

/// `Statement` may be a single object, an array, or `null`.
fn deserialize_statements<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<Statement>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        // Tried first: a derived struct would also accept `[]` positionally.
        Many(Vec<Statement>),
        One(Statement),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(statement)) => vec![statement],
        Some(OneOrMany::Many(statements)) => statements,
    })
}
