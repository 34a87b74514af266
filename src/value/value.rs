use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Number;

use crate::error::{StateError, StateResult};

/// The dynamic value graph held by a store.
///
/// Cloning is structural (a full deep copy), so a cloned `Value` never
/// shares mutable state with the original. `Object` keeps string keys in
/// insertion order; `Map` keeps arbitrary-keyed entries in insertion order
/// and survives serialization round-trips through the canonical
/// `{"dataType":"Map","value":[[k,v],...]}` encoding.
///
/// There is no function variant: callables cannot be stored.
///
/// # Examples
///
/// ```
/// use canister::Value;
///
/// let v = Value::object([("count", Value::from(3))]);
/// assert_eq!(v.get("count").and_then(Value::as_i64), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Build an object from `(key, value)` entries, preserving order.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a map from `(key, value)` entries, preserving order.
    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        Value::Map(entries.into_iter().collect())
    }

    /// Build an array from values.
    pub fn array<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Array(values.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Vec<(Value, Value)>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a field on an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    /// True for the container variants (arrays, objects and maps), which
    /// the observation engine traverses rather than shadowing.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_) | Value::Map(_))
    }

    /// Bridge any serializable type into a `Value`.
    ///
    /// Plain maps and structs become `Object`; a type can opt into the
    /// `Map` variant by serializing the canonical map encoding.
    pub fn from_serialize<T: Serialize>(value: &T) -> StateResult<Value> {
        let json = serde_json::to_value(value).map_err(|e| StateError::InvalidData(e.to_string()))?;
        Value::deserialize(json).map_err(|e| StateError::InvalidData(e.to_string()))
    }

    /// Bridge a `Value` back into a typed representation.
    pub fn to_typed<T: de::DeserializeOwned>(&self) -> StateResult<T> {
        let json = serde_json::to_value(self).map_err(|e| StateError::InvalidData(e.to_string()))?;
        serde_json::from_value(json).map_err(|e| StateError::InvalidData(e.to_string()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
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

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(values)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// Serializes entry lists as [[k, v], ...] for the canonical map encoding.
struct MapEntries<'a>(&'a [(Value, Value)]);

impl Serialize for MapEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, value) in self.0 {
            seq.serialize_element(&(key, value))?;
        }
        seq.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Value::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("dataType", "Map")?;
                map.serialize_entry("value", &MapEntries(entries))?;
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any valid store value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }

    fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Number(Number::from(n)))
    }

    fn visit_u64<E>(self, n: u64) -> Result<Value, E> {
        Ok(Value::Number(Number::from(n)))
    }

    fn visit_f64<E>(self, n: f64) -> Result<Value, E> {
        Ok(Number::from_f64(n).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_string()))
    }

    fn visit_string<E>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut values = Vec::new();
        while let Some(value) = seq.next_element()? {
            values.push(value);
        }
        Ok(Value::Array(values))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut entries = IndexMap::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            entries.insert(key, value);
        }
        Ok(revive_map(entries))
    }
}

/// Revive the canonical map encoding back into the `Map` variant. Any
/// other object shape stays an `Object`.
fn revive_map(entries: IndexMap<String, Value>) -> Value {
    let is_map = entries.get("dataType").and_then(Value::as_str) == Some("Map");
    if is_map {
        if let Some(Value::Array(pairs)) = entries.get("value") {
            let revived: Option<Vec<(Value, Value)>> = pairs
                .iter()
                .map(|pair| match pair.as_array().map(Vec::as_slice) {
                    Some([key, value]) => Some((key.clone(), value.clone())),
                    _ => None,
                })
                .collect();
            if let Some(revived) = revived {
                return Value::Map(revived);
            }
        }
    }
    Value::Object(entries)
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_builder_preserves_order() {
        let v = Value::object([("b", Value::from(1)), ("a", Value::from(2))]);
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn from_serialize_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Point {
            x: i32,
            y: i32,
        }

        let v = Value::from_serialize(&Point { x: 1, y: -2 }).unwrap();
        assert_eq!(v.get("x").and_then(Value::as_i64), Some(1));

        let back: Point = v.to_typed().unwrap();
        assert_eq!(back, Point { x: 1, y: -2 });
    }

    #[test]
    fn map_encoding_revives() {
        let encoded = r#"{"dataType":"Map","value":[["a",1],["b",2]]}"#;
        let v: Value = serde_json::from_str(encoded).unwrap();
        let entries = v.as_map().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Value::from("a"));
        assert_eq!(entries[1].1, Value::from(2));
    }

    #[test]
    fn malformed_map_encoding_stays_object() {
        let encoded = r#"{"dataType":"Map","value":[["a",1,3]]}"#;
        let v: Value = serde_json::from_str(encoded).unwrap();
        assert!(v.as_object().is_some());
    }

    #[test]
    fn non_finite_float_degrades_to_null() {
        assert_eq!(Value::from(f64::NAN), Value::Null);
    }
}
