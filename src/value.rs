//! Structured values: integers, strings, lists and string-keyed mappings.
//!
//! Mappings are stored in a `BTreeMap<String, _>`; Rust orders `String` by UTF-8
//! bytes, which is the same order as Unicode code points, so serialising a map in
//! iteration order already yields the canonical key order.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EncodingError;

/// A structured value tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Build a flat integer list, the shape of a point-edit state vector.
    pub fn int_list(values: &[i64]) -> Self {
        Value::List(values.iter().copied().map(Value::Int).collect())
    }

    /// View this value as a flat integer state vector.
    pub fn as_int_list(&self) -> Option<Vec<i64>> {
        match self {
            Value::List(items) => items
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert producer JSON into a value, rejecting shapes with no canonical form.
    pub fn from_json(json: serde_json::Value) -> Result<Self, EncodingError> {
        match json {
            serde_json::Value::Null => Err(EncodingError::UnsupportedShape("null".into())),
            serde_json::Value::Bool(b) => {
                Err(EncodingError::UnsupportedShape(format!("boolean {b}")))
            }
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if n.is_u64() {
                    Err(EncodingError::UnsupportedShape(format!(
                        "integer {n} exceeds i64"
                    )))
                } else {
                    Err(EncodingError::NonInteger(n.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            serde_json::Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k, Value::from_json(v)?);
                }
                Ok(Value::Map(out))
            }
        }
    }

    /// Convert a float, which is only accepted when it is an exact finite integer.
    pub fn from_f64(f: f64) -> Result<Self, EncodingError> {
        if !f.is_finite() {
            return Err(EncodingError::NonInteger(format!("{f}")));
        }
        if f.fract() != 0.0 || f < i64::MIN as f64 || f >= i64::MAX as f64 {
            return Err(EncodingError::NonInteger(format!("{f}")));
        }
        Ok(Value::Int(f as i64))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Count leaves (ints and strings).
    pub fn leaf_count(&self) -> usize {
        match self {
            Value::Int(_) | Value::Str(_) => 1,
            Value::List(items) => items.iter().map(Value::leaf_count).sum(),
            Value::Map(map) => map.values().map(Value::leaf_count).sum(),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, string, list or string-keyed map")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {v} exceeds i64")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Err(E::custom(format!("floats are not canonical: {v}")))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Err(E::custom(format!("booleans are not canonical: {v}")))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Err(E::custom("null is not canonical"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some(key) = access.next_key::<String>()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate mapping key {key:?}")));
            }
            let value = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Build a `Value::Map` from `(key, value)` pairs.
#[macro_export]
macro_rules! map {
    ($($k:expr => $v:expr),* $(,)?) => {{
        let mut m = ::std::collections::BTreeMap::new();
        $( m.insert(::std::string::String::from($k), $crate::Value::from($v)); )*
        $crate::Value::Map(m)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_accepts_supported_shapes() {
        let json = serde_json::json!({"b": [1, "x", {"c": -7}], "a": "é"});
        let v = Value::from_json(json.clone()).unwrap();
        assert_eq!(v.to_json(), json);
        assert_eq!(v.leaf_count(), 4);
    }

    #[test]
    fn test_from_json_rejects_unsupported_shapes() {
        assert!(Value::from_json(serde_json::json!(null)).is_err());
        assert!(Value::from_json(serde_json::json!(true)).is_err());
        assert!(matches!(
            Value::from_json(serde_json::json!(1.5)),
            Err(EncodingError::NonInteger(_))
        ));
        assert!(Value::from_json(serde_json::json!(u64::MAX)).is_err());
    }

    #[test]
    fn test_from_f64_rejects_non_finite() {
        assert!(Value::from_f64(f64::NAN).is_err());
        assert!(Value::from_f64(f64::INFINITY).is_err());
        assert!(Value::from_f64(0.25).is_err());
        assert_eq!(Value::from_f64(3.0).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_keys() {
        let err = serde_json::from_str::<Value>(r#"{"a":1,"a":2}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_int_list_round_trip() {
        let v = Value::int_list(&[3, -1, 0]);
        assert_eq!(v.as_int_list(), Some(vec![3, -1, 0]));
        assert_eq!(Value::from("x").as_int_list(), None);
    }

    #[test]
    fn test_map_macro() {
        let v = crate::map! { "z" => 1i64, "a" => "s" };
        let Value::Map(m) = v else { panic!("not a map") };
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a", "z"]);
    }
}
