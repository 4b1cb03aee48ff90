//! Serde codec for [`Value`] trees.
//!
//! Encoding follows the Fauna wire format: scalars and arrays serialise as
//! bare JSON, objects wrap their entries under an `"object"` key, and the
//! special types serialise as single-key tagged objects (`@ref`, `@set`,
//! `@ts`, `@date`, `@bytes`, `@query`).
//!
//! Decoding reads the whole node into a key-order-preserving JSON tree first,
//! then dispatches on node type; objects dispatch on their *first* key to
//! recognise tagged forms.

use crate::error::DecodeError;
use crate::value::Value;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Long(n) => serializer.serialize_i64(*n),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Null => serializer.serialize_unit(),
            Value::Array(vs) => serializer.collect_seq(vs),
            Value::Object(m) => tagged(serializer, "object", m),
            Value::Ref(r) => tagged(serializer, "@ref", r),
            Value::SetRef(m) => tagged(serializer, "@set", m),
            Value::Time(t) => tagged(serializer, "@ts", &format_timestamp(t)),
            Value::Date(d) => tagged(serializer, "@date", &d.format("%Y-%m-%d").to_string()),
            Value::Bytes(b) => tagged(serializer, "@bytes", &URL_SAFE.encode(b)),
            Value::Query(q) => tagged(serializer, "@query", q),
        }
    }
}

/// Serialises a single-key object `{tag: payload}`.
fn tagged<S: Serializer, T: Serialize>(
    serializer: S,
    tag: &'static str,
    payload: &T,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(tag, payload)?;
    map.end()
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tree = serde_json::Value::deserialize(deserializer)?;
        from_json(tree).map_err(serde::de::Error::custom)
    }
}

/// Converts a raw JSON tree into a [`Value`], recognising tagged objects.
pub fn from_json(node: serde_json::Value) -> Result<Value, DecodeError> {
    match node {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
        serde_json::Value::Number(n) => Ok(from_number(&n)),
        serde_json::Value::String(s) => Ok(Value::String(s)),
        serde_json::Value::Array(items) => Ok(Value::Array(
            items.into_iter().map(from_json).collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Object(map) => from_json_object(map),
    }
}

/// Longs are numbers written without a decimal point or exponent and fitting
/// a signed 64-bit; everything else becomes a double.
fn from_number(n: &serde_json::Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Long(i),
        None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
    }
}

/// Tagged-object dispatch: the first key of the object decides the variant.
///
/// `@query` is deliberately absent here; it is only produced by the explicit
/// [`Value::query`] constructor, so `{"@query": ...}` falls through to the
/// plain-object arm.
fn from_json_object(
    map: serde_json::Map<String, serde_json::Value>,
) -> Result<Value, DecodeError> {
    let mut entries = map.into_iter();
    let Some((first_key, payload)) = entries.next() else {
        return Ok(Value::Object(IndexMap::new()));
    };

    match first_key.as_str() {
        "@ref" => match payload {
            serde_json::Value::String(s) => Ok(Value::Ref(s)),
            _ => Err(DecodeError::InvalidTagPayload {
                tag: "@ref",
                expected: "string",
            }),
        },
        "@set" => match payload {
            serde_json::Value::Object(params) => Ok(Value::SetRef(decode_entries(params)?)),
            _ => Err(DecodeError::InvalidTagPayload {
                tag: "@set",
                expected: "object",
            }),
        },
        "@ts" => match payload {
            serde_json::Value::String(s) => Ok(Value::Time(parse_timestamp(&s)?)),
            _ => Err(DecodeError::InvalidTagPayload {
                tag: "@ts",
                expected: "string",
            }),
        },
        "@date" => match payload {
            serde_json::Value::String(s) => Ok(Value::Date(parse_date(&s)?)),
            _ => Err(DecodeError::InvalidTagPayload {
                tag: "@date",
                expected: "string",
            }),
        },
        "@bytes" => match payload {
            serde_json::Value::String(s) => Ok(Value::Bytes(URL_SAFE.decode(s.as_bytes())?)),
            _ => Err(DecodeError::InvalidTagPayload {
                tag: "@bytes",
                expected: "string",
            }),
        },
        "@obj" => match payload {
            serde_json::Value::Object(inner) => Ok(Value::Object(decode_entries(inner)?)),
            _ => Err(DecodeError::InvalidTagPayload {
                tag: "@obj",
                expected: "object",
            }),
        },
        _ => {
            let mut values = IndexMap::new();
            values.insert(first_key, from_json(payload)?);
            for (key, node) in entries {
                values.insert(key, from_json(node)?);
            }
            Ok(Value::Object(values))
        }
    }
}

/// Decodes object entries in encounter order; JSON nulls become `Value::Null`.
fn decode_entries(
    map: serde_json::Map<String, serde_json::Value>,
) -> Result<IndexMap<String, Value>, DecodeError> {
    map.into_iter()
        .map(|(k, v)| Ok((k, from_json(v)?)))
        .collect()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(DecodeError::InvalidTimestamp)
}

fn parse_date(s: &str) -> Result<NaiveDate, DecodeError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(DecodeError::InvalidDate)
}

fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
