//! Claims extracted from a verified access token

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single `user_metadata` value
///
/// Scalars get their own variants; arrays and objects are kept as
/// [`MetadataValue::Structured`]. Accessors return `None` on a shape mismatch
/// instead of coercing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum MetadataValue {
    /// JSON `null`
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(serde_json::Number),
    /// JSON string
    String(String),
    /// JSON array or object
    Structured(serde_json::Value),
}

impl MetadataValue {
    /// The string value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean value, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The numeric value as `f64`, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// The numeric value as `i64`, if this is an integer that fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Whether this is JSON `null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            structured => Self::Structured(structured),
        }
    }
}

impl From<MetadataValue> for serde_json::Value {
    fn from(value: MetadataValue) -> Self {
        match value {
            MetadataValue::Null => Self::Null,
            MetadataValue::Bool(b) => Self::Bool(b),
            MetadataValue::Number(n) => Self::Number(n),
            MetadataValue::String(s) => Self::String(s),
            MetadataValue::Structured(v) => v,
        }
    }
}

/// `user_metadata` as a map of tagged values
pub type Metadata = HashMap<String, MetadataValue>;

/// Identity claims of a validated token
///
/// Produced fresh for every validation and never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claims {
    /// Subject (`sub`): the caller's user id, never empty
    pub subject: String,
    /// `email` claim
    pub email: Option<String>,
    /// `role` claim (e.g. `authenticated`)
    pub role: Option<String>,
    /// `iat` claim, seconds since the epoch
    pub issued_at: Option<i64>,
    /// `exp` claim, seconds since the epoch
    pub expires_at: Option<i64>,
    /// `user_metadata` claim
    pub metadata: Metadata,
}

impl Claims {
    /// Display name stored under `user_metadata.username`
    ///
    /// `None` when the entry is absent or not a string.
    pub fn username(&self) -> Option<&str> {
        self.metadata.get("username").and_then(MetadataValue::as_str)
    }

    /// `iat` as a timestamp
    pub fn issued_at_time(&self) -> Option<DateTime<Utc>> {
        self.issued_at.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// `exp` as a timestamp
    pub fn expires_at_time(&self) -> Option<DateTime<Utc>> {
        self.expires_at.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Wire shape of the token payload
#[derive(Debug, Deserialize)]
pub(crate) struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub user_metadata: Metadata,
}

/// NumericDate may carry a fractional part; it is truncated to whole seconds
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumericDate {
        Whole(i64),
        Fractional(f64),
    }

    Ok(
        Option::<NumericDate>::deserialize(deserializer)?.map(|date| match date {
            NumericDate::Whole(secs) => secs,
            NumericDate::Fractional(secs) => secs.trunc() as i64,
        }),
    )
}

/// Accept any JSON for `user_metadata`; anything but an object reads as empty
fn lenient_metadata<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Object(entries) => entries
            .into_iter()
            .map(|(key, value)| (key, MetadataValue::from(value)))
            .collect(),
        _ => Metadata::new(),
    })
}
