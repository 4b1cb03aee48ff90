//! The Fauna value sum type.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use std::hash::{Hash, Hasher};

/// Any scalar or non-scalar value in the Fauna query language.
///
/// Covers all of the JSON value types plus the Fauna-specific tagged types.
/// Every inhabitant is immutable; values compare by deep structural equality.
///
/// Objects and set parameters use an order-preserving map so that round trips
/// through the codec keep key encounter order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Null,
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// An opaque document reference, tagged `@ref` on the wire.
    Ref(String),
    /// Parameters of a set query, tagged `@set` on the wire.
    SetRef(IndexMap<String, Value>),
    /// A high-precision timestamp, tagged `@ts` on the wire.
    Time(DateTime<Utc>),
    /// A calendar date, tagged `@date` on the wire.
    Date(NaiveDate),
    /// A byte blob, tagged `@bytes` (base64url) on the wire.
    Bytes(Vec<u8>),
    /// A stored lambda, tagged `@query` on the wire. The payload is kept as
    /// raw JSON since its shape is owned by the server.
    Query(serde_json::Map<String, serde_json::Value>),
}

impl Value {
    pub const NULL: Value = Value::Null;

    /// Builds an `Object` from key/value pairs, preserving their order.
    pub fn object<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds an `Array` from a sequence of values.
    pub fn array<I: IntoIterator<Item = Value>>(values: I) -> Value {
        Value::Array(values.into_iter().collect())
    }

    /// Builds a `Query` from a raw lambda representation.
    ///
    /// This is the only way to obtain the `Query` variant: the generic
    /// decoder leaves `{"@query": ...}` alone and produces an `Object`.
    pub fn query(lambda: serde_json::Map<String, serde_json::Value>) -> Value {
        Value::Query(lambda)
    }

    /// A short name for this variant's underlying type, used in errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Ref(_) => "ref",
            Value::SetRef(_) => "setref",
            Value::Time(_) => "time",
            Value::Date(_) => "date",
            Value::Bytes(_) => "bytes",
            Value::Query(_) => "query",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(vs) => Some(vs),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<&str> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_set_ref(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::SetRef(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Hash sentinel for `Null`, distinct from every payload-carrying variant.
const NULL_HASH_SENTINEL: i32 = -1;

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => state.write_i32(NULL_HASH_SENTINEL),
            Value::String(s) => {
                state.write_u8(1);
                s.hash(state);
            }
            Value::Long(n) => {
                state.write_u8(2);
                n.hash(state);
            }
            Value::Double(d) => {
                state.write_u8(3);
                d.to_bits().hash(state);
            }
            Value::Boolean(b) => {
                state.write_u8(4);
                b.hash(state);
            }
            Value::Array(vs) => {
                state.write_u8(5);
                vs.hash(state);
            }
            Value::Object(m) => {
                state.write_u8(6);
                for (k, v) in m {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Value::Ref(r) => {
                state.write_u8(7);
                r.hash(state);
            }
            Value::SetRef(m) => {
                state.write_u8(8);
                for (k, v) in m {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Value::Time(t) => {
                state.write_u8(9);
                t.hash(state);
            }
            Value::Date(d) => {
                state.write_u8(10);
                d.hash(state);
            }
            Value::Bytes(b) => {
                state.write_u8(11);
                b.hash(state);
            }
            Value::Query(q) => {
                state.write_u8(12);
                for (k, v) in q {
                    k.hash(state);
                    v.to_string().hash(state);
                }
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_deep_equality() {
        let a = Value::object([("k", Value::array([Value::Long(1), Value::Null]))]);
        let b = Value::object([("k", Value::array([Value::Long(1), Value::Null]))]);
        assert_eq!(a, b);
        assert_ne!(a, Value::object([("k", Value::array([Value::Long(2)]))]));
    }

    #[test]
    fn test_bytes_compare_bytewise() {
        assert_eq!(Value::Bytes(vec![1, 2, 3]), Value::Bytes(vec![1, 2, 3]));
        assert_ne!(Value::Bytes(vec![1, 2, 3]), Value::Bytes(vec![1, 2]));
    }

    #[test]
    fn test_long_and_double_are_distinct() {
        assert_ne!(Value::Long(1), Value::Double(1.0));
    }

    #[test]
    fn test_null_hash_is_stable_and_distinct() {
        assert_eq!(hash_of(&Value::Null), hash_of(&Value::Null));
        for other in [
            Value::Boolean(false),
            Value::Long(-1),
            Value::String(String::new()),
            Value::Array(vec![]),
            Value::Object(IndexMap::new()),
        ] {
            assert_ne!(hash_of(&Value::Null), hash_of(&other));
        }
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(Value::from("s").as_str(), Some("s"));
        assert_eq!(Value::from(7i64).as_long(), Some(7));
        assert_eq!(Value::from(1.5).as_double(), Some(1.5));
        assert_eq!(Value::from(true).as_boolean(), Some(true));
        assert_eq!(Value::Ref("classes/users/42".into()).as_ref_id(), Some("classes/users/42"));
        assert_eq!(Value::from("s").as_long(), None);
        assert!(Value::Null.is_null());
    }
}
