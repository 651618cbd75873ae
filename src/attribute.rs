//! Typed attribute codec.
//!
//! Every remote command is built from an ordered set of `(field id, typed
//! value)` pairs, and every result decodes back into a mapping from field id
//! to raw value. This module owns both directions: [`encode`] renders typed
//! values into wire attributes with their `xsi:type` annotations, and
//! [`decode`] folds a wire attribute list back into an [`AttributeMap`].
//!
//! The codec is pure: it performs no I/O and holds no state.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;

/// A decoded attribute set: field id to raw value.
///
/// Raw values are whatever the transport's tree conversion produced, usually
/// strings. When the same field id appears more than once in a wire list,
/// the last occurrence wins.
pub type AttributeMap = HashMap<String, Value>;

/// A typed value ready for wire encoding.
///
/// Each variant maps to exactly one wire type tag and one canonical string
/// serialization. [`UnsignedInteger`](AttributeValue::UnsignedInteger) is
/// distinct from [`SignedInteger`](AttributeValue::SignedInteger) purely to
/// select the correct wire type.
///
/// # Examples
///
/// ```rust
/// use identikey_client::attribute::AttributeValue;
///
/// assert_eq!(AttributeValue::from("master").xsi_type(), "xsd:string");
/// assert_eq!(AttributeValue::from(true).to_wire_string(), "true");
///
/// // Negative input is rejected at construction time.
/// assert!(AttributeValue::unsigned(-1).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// A plain string, tagged `xsd:string`.
    String(String),
    /// A signed integer, tagged `xsd:int`.
    SignedInteger(i64),
    /// A non-negative integer, tagged `xsd:unsignedInt`.
    UnsignedInteger(u64),
    /// A boolean, tagged `xsd:boolean`.
    Boolean(bool),
    /// An instant, tagged `xsd:datetime`, serialized as UTC ISO-8601.
    Timestamp(DateTime<Utc>),
}

impl AttributeValue {
    /// Checked constructor for [`AttributeValue::UnsignedInteger`].
    ///
    /// Fails with a usage error when `value` is negative, before any request
    /// is built or any network interaction happens.
    pub fn unsigned(value: i64) -> Result<Self> {
        u64::try_from(value)
            .map(Self::UnsignedInteger)
            .map_err(|_| Error::usage(format!("invalid input for unsigned integer: {value}")))
    }

    /// The wire type tag annotating this value.
    pub fn xsi_type(&self) -> &'static str {
        match self {
            Self::String(_) => "xsd:string",
            Self::SignedInteger(_) => "xsd:int",
            Self::UnsignedInteger(_) => "xsd:unsignedInt",
            Self::Boolean(_) => "xsd:boolean",
            Self::Timestamp(_) => "xsd:datetime",
        }
    }

    /// The canonical string serialization of this value.
    ///
    /// Timestamps render as UTC ISO-8601 with a `Z` suffix.
    pub fn to_wire_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::SignedInteger(n) => n.to_string(),
            Self::UnsignedInteger(n) => n.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire_string())
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::SignedInteger(value)
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        Self::UnsignedInteger(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Render one typed attribute into its wire tree form.
pub fn wire_attribute(field_id: &str, value: &AttributeValue) -> Value {
    json!({
        "attributeID": field_id,
        "value": {
            "@xsi:type": value.xsi_type(),
            "$value": value.to_wire_string(),
        },
    })
}

/// Encode an ordered set of fields into wire attributes.
///
/// Fields whose value is `None` are omitted entirely rather than encoded.
/// Order is preserved.
///
/// # Examples
///
/// ```rust
/// use identikey_client::attribute::{self, AttributeValue};
///
/// let wire = attribute::encode(&[
///     ("CREDFLD_USERID", Some(AttributeValue::from("admin"))),
///     ("CREDFLD_EMAIL", None),
/// ]);
/// assert_eq!(wire.len(), 1);
/// assert_eq!(wire[0]["attributeID"], "CREDFLD_USERID");
/// ```
pub fn encode(fields: &[(&str, Option<AttributeValue>)]) -> Vec<Value> {
    fields
        .iter()
        .filter_map(|(field_id, value)| {
            value.as_ref().map(|value| wire_attribute(field_id, value))
        })
        .collect()
}

/// Decode a wire attribute list into an [`AttributeMap`].
///
/// Entries fold left-to-right; a later duplicate field id overwrites an
/// earlier one. An entry missing its `attribute_id` or `value` member is a
/// parse error.
pub fn decode<'a, I>(entries: I) -> Result<AttributeMap>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut map = AttributeMap::new();

    for entry in entries {
        let field_id = entry
            .get("attribute_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::parse(format!("attribute entry has no attribute_id: {entry}")))?;

        let value = entry
            .get("value")
            .ok_or_else(|| Error::parse(format!("attribute {field_id} has no value")))?;

        map.insert(field_id.to_string(), value.clone());
    }

    Ok(map)
}

/// A string field from a decoded attribute set.
///
/// Null values and absent fields are both `None`.
pub fn string_of(map: &AttributeMap, field_id: &str) -> Option<String> {
    match map.get(field_id)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// A boolean field from a decoded attribute set.
///
/// Accepts native booleans and the `"true"` / `"false"` strings an XML
/// transport produces.
pub fn bool_of(map: &AttributeMap, field_id: &str) -> Option<bool> {
    match map.get(field_id)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// An integer field from a decoded attribute set.
///
/// Accepts native numbers and numeric strings.
pub fn int_of(map: &AttributeMap, field_id: &str) -> Option<i64> {
    match map.get(field_id)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A timestamp field from a decoded attribute set.
///
/// Accepts RFC 3339 strings and naive `YYYY-MM-DDTHH:MM:SS` values, which
/// are taken as UTC.
pub fn time_of(map: &AttributeMap, field_id: &str) -> Option<DateTime<Utc>> {
    let raw = match map.get(field_id)? {
        Value::String(s) => s.trim(),
        _ => return None,
    };

    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// Build the response-side tree form of an attribute list.
///
/// This is the inverse of what the transport hands back and exists for test
/// fixtures and transports that need to synthesize response shapes.
pub fn response_attribute(field_id: &str, value: Value) -> Value {
    let mut entry = Map::new();
    entry.insert("attribute_id".to_string(), Value::String(field_id.to_string()));
    entry.insert("value".to_string(), value);
    Value::Object(entry)
}
