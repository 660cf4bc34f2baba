//! Session data values.
//!
//! [`SessionValue`] is the closed set of shapes a client may store under a
//! session-data key. JSON is the serialization at both the storage and the
//! wire boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value stored under a session-data key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionValue {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    List(Vec<SessionValue>),
    /// String-keyed map.
    Map(BTreeMap<String, SessionValue>),
}

impl SessionValue {
    /// Borrow as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Read as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, SessionValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for SessionValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for SessionValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for SessionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for SessionValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<BTreeMap<String, SessionValue>> for SessionValue {
    fn from(m: BTreeMap<String, SessionValue>) -> Self {
        Self::Map(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_each_shape() {
        let v: SessionValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(v, SessionValue::Bool(true));
        let v: SessionValue = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(v, SessionValue::Integer(12));
        let v: SessionValue = serde_json::from_value(json!("x")).unwrap();
        assert_eq!(v, SessionValue::String("x".into()));
        let v: SessionValue = serde_json::from_value(json!({"a": [1, "b"]})).unwrap();
        let inner = v.as_map().unwrap().get("a").unwrap();
        assert_eq!(
            inner,
            &SessionValue::List(vec![SessionValue::Integer(1), SessionValue::from("b")])
        );
    }

    #[test]
    fn rejects_null_and_floats() {
        assert!(serde_json::from_value::<SessionValue>(json!(null)).is_err());
        assert!(serde_json::from_value::<SessionValue>(json!(1.5)).is_err());
    }

    #[test]
    fn to_json_matches_serde() {
        let mut map = BTreeMap::new();
        let _ = map.insert("geometry".to_owned(), SessionValue::from("800x600"));
        let _ = map.insert("visible".to_owned(), SessionValue::from(true));
        let value = SessionValue::Map(map);
        assert_eq!(value.to_json(), serde_json::to_value(&value).unwrap());
    }

    #[test]
    fn accessors() {
        assert_eq!(SessionValue::from(5_i64).as_i64(), Some(5));
        assert_eq!(SessionValue::from("s").as_str(), Some("s"));
        assert_eq!(SessionValue::from(false).as_bool(), Some(false));
        assert_eq!(SessionValue::from(5_i64).as_str(), None);
    }
}
