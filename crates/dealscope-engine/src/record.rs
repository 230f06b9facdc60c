//! Input records and dimension metadata.
//!
//! Records arrive from an external record source as flat JSON objects: an
//! identifier, the `won` outcome flag, and any number of dimension fields.
//!
//! ```
//! use dealscope_engine::record::{Record, Value};
//!
//! let record: Record = serde_json::from_str(
//!     r#"{"id": "opp-1", "won": true, "amount": 1200.5, "segment": "smb", "region": null}"#,
//! )
//! .unwrap();
//! assert_eq!(record.get("amount"), Some(&Value::Number(1200.5)));
//! assert_eq!(record.get("region"), None);
//! ```

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A scalar dimension value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value.
    ///
    /// Booleans map to `1.0`/`0.0` and text is parsed after trimming.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Type-coercing equality: two values are equal when their [`key`]s match.
    ///
    /// Numeric text equals the number it parses to and `"true"`/`"false"`
    /// equal the booleans. Booleans never equal numbers, which keeps the
    /// relation transitive.
    ///
    /// ```
    /// use dealscope_engine::record::Value;
    ///
    /// assert!(Value::Number(10.0).loose_eq(&Value::Text("10".into())));
    /// assert!(Value::Bool(true).loose_eq(&Value::Text("true".into())));
    /// assert!(!Value::Bool(true).loose_eq(&Value::Number(1.0)));
    /// assert!(!Value::Text("smb".into()).loose_eq(&Value::Text("SMB".into())));
    /// ```
    ///
    /// [`key`]: Value::key
    #[must_use]
    pub fn loose_eq(&self, other: &Value) -> bool {
        self.key() == other.key()
    }

    /// Canonical string form of the value.
    ///
    /// Used as the key of categorical encodings.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Value::Text(s) => {
                let trimmed = s.trim();
                match trimmed.parse::<f64>() {
                    Ok(n) if n.is_finite() => n.to_string(),
                    _ if trimmed == "true" || trimmed == "false" => trimmed.to_owned(),
                    _ => s.clone(),
                }
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// A labeled business record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: String,
    pub won: bool,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<Value>>,
}

impl Record {
    #[must_use]
    pub fn new(id: impl Into<String>, won: bool) -> Self {
        Self {
            id: id.into(),
            won,
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, dimension: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(dimension.into(), Some(value.into()));
        self
    }

    #[must_use]
    pub fn with_missing(mut self, dimension: impl Into<String>) -> Self {
        self.values.insert(dimension.into(), None);
        self
    }

    /// The value of a dimension, or `None` when absent or null.
    #[must_use]
    pub fn get(&self, dimension: &str) -> Option<&Value> {
        self.values.get(dimension).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    #[default]
    Numeric,
    Categorical,
}

/// Dimension metadata.
///
/// Deserializes either from a full object or from a bare name, which
/// describes a numeric dimension without a declared domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DimensionRepr")]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DimensionRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        kind: DimensionKind,
        #[serde(default)]
        domain: Option<Vec<Value>>,
    },
}

impl From<DimensionRepr> for Dimension {
    fn from(repr: DimensionRepr) -> Self {
        match repr {
            DimensionRepr::Name(name) => Dimension::numeric(name),
            DimensionRepr::Full { name, kind, domain } => Dimension { name, kind, domain },
        }
    }
}

impl Dimension {
    #[must_use]
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Numeric,
            domain: None,
        }
    }

    #[must_use]
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Categorical,
            domain: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Vec<Value>) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn is_categorical(&self) -> bool {
        self.kind == DimensionKind::Categorical
    }
}
