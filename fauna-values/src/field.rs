//! Tree navigation over [`Value`] nodes.

use crate::value::Value;
use thiserror::Error;

/// Errors raised by the typed `get` navigation forms.
///
/// Distinguishes a key/index that is simply missing from a node whose type
/// cannot be navigated at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("value not found at {path}")]
    Absent { path: String },

    #[error("expected {expected} at {path}, found {actual}")]
    UnexpectedType {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },
}

fn key_path(keys: &[&str], depth: usize) -> String {
    if depth == 0 {
        "/".to_string()
    } else {
        format!("/{}", keys[..depth].join("/"))
    }
}

fn index_path(indexes: &[usize], depth: usize) -> String {
    if depth == 0 {
        "/".to_string()
    } else {
        let parts: Vec<String> = indexes[..depth].iter().map(usize::to_string).collect();
        format!("/{}", parts.join("/"))
    }
}

impl Value {
    /// Navigates through object keys, returning the value under the path.
    ///
    /// Fails with `Absent` if a key is missing, and with `UnexpectedType` if
    /// navigation hits a non-object node.
    pub fn get(&self, keys: &[&str]) -> Result<&Value, FieldError> {
        let mut current = self;
        for (depth, key) in keys.iter().enumerate() {
            match current {
                Value::Object(map) => match map.get(*key) {
                    Some(next) => current = next,
                    None => {
                        return Err(FieldError::Absent {
                            path: key_path(keys, depth + 1),
                        })
                    }
                },
                other => {
                    return Err(FieldError::UnexpectedType {
                        path: key_path(keys, depth),
                        expected: "object",
                        actual: other.type_name(),
                    })
                }
            }
        }
        Ok(current)
    }

    /// Navigates through array indexes, returning the value under the path.
    pub fn get_index(&self, indexes: &[usize]) -> Result<&Value, FieldError> {
        let mut current = self;
        for (depth, index) in indexes.iter().enumerate() {
            match current {
                Value::Array(items) => match items.get(*index) {
                    Some(next) => current = next,
                    None => {
                        return Err(FieldError::Absent {
                            path: index_path(indexes, depth + 1),
                        })
                    }
                },
                other => {
                    return Err(FieldError::UnexpectedType {
                        path: index_path(indexes, depth),
                        expected: "array",
                        actual: other.type_name(),
                    })
                }
            }
        }
        Ok(current)
    }

    /// Navigates through object keys, returning `Null` when the path does not
    /// resolve.
    pub fn at(&self, keys: &[&str]) -> &Value {
        self.get(keys).unwrap_or(&Value::NULL)
    }

    /// Navigates through array indexes, returning `Null` when the path does
    /// not resolve.
    pub fn at_index(&self, indexes: &[usize]) -> &Value {
        self.get_index(indexes).unwrap_or(&Value::NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::object([
            ("ref", Value::Ref("some/ref".into())),
            (
                "data",
                Value::object([
                    ("someKey", Value::from("string1")),
                    ("someKey2", Value::from(123i64)),
                    ("list", Value::array([Value::from("a"), Value::from("b")])),
                ]),
            ),
        ])
    }

    #[test]
    fn test_get_by_keys() {
        let node = sample();
        assert_eq!(
            node.get(&["data", "someKey"]).unwrap(),
            &Value::from("string1")
        );
        assert_eq!(node.get(&[]).unwrap(), &node);
    }

    #[test]
    fn test_get_absent_key() {
        let node = sample();
        assert_eq!(
            node.get(&["data", "missing"]),
            Err(FieldError::Absent {
                path: "/data/missing".into()
            })
        );
    }

    #[test]
    fn test_get_type_mismatch() {
        let node = sample();
        assert_eq!(
            node.get(&["ref", "inner"]),
            Err(FieldError::UnexpectedType {
                path: "/ref".into(),
                expected: "object",
                actual: "ref",
            })
        );
    }

    #[test]
    fn test_at_returns_null_for_absent() {
        let node = sample();
        assert_eq!(node.at(&["nope"]), &Value::Null);
        assert_eq!(node.at(&["data", "someKey2"]), &Value::Long(123));
    }

    #[test]
    fn test_index_navigation() {
        let node = sample();
        let list = node.get(&["data", "list"]).unwrap();
        assert_eq!(list.get_index(&[1]).unwrap(), &Value::from("b"));
        assert_eq!(
            list.get_index(&[5]),
            Err(FieldError::Absent { path: "/5".into() })
        );
        assert_eq!(list.at_index(&[5]), &Value::Null);
        assert!(matches!(
            node.get_index(&[0]),
            Err(FieldError::UnexpectedType { .. })
        ));
    }
}
