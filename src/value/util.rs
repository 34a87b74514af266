//! Equality and clone utilities over [`Value`] graphs.
//!
//! Two comparison modes exist on purpose. Shallow comparison works on the
//! canonical string form, so a `Map` and a plain object holding its encoded
//! shape compare equal; it is the single dirty definition used by the
//! listener pipeline. Deep comparison recurses structurally and keeps the
//! variants distinct.

use crate::error::{StateError, StateResult};
use crate::value::Value;

/// Serialize a value to its canonical string form.
///
/// Maps are encoded as `{"dataType":"Map","value":[[k,v],...]}` with entry
/// order preserved; object keys keep insertion order.
pub fn stringify(value: &Value) -> String {
    // The Value serializer only ever emits string keys, so this cannot fail.
    serde_json::to_string(value).expect("value serialization is infallible")
}

/// Parse a canonical string form back into a value, reviving the map
/// encoding into the `Map` variant.
pub fn parse(text: &str) -> StateResult<Value> {
    serde_json::from_str(text).map_err(|e| StateError::InvalidData(e.to_string()))
}

/// Clone by serialization round-trip.
///
/// Maps survive through the canonical encoding; anything the string form
/// cannot distinguish is flattened. Use [`Value::clone`] for a structural
/// deep clone.
pub fn shallow_clone(value: &Value) -> Value {
    parse(&stringify(value)).expect("canonical form always parses")
}

/// Compare two values by their canonical string forms.
pub fn shallow_equals(a: &Value, b: &Value) -> bool {
    stringify(a) == stringify(b)
}

/// Structural deep clone, preserving the `Map` variant as-is.
pub fn deep_clone(value: &Value) -> Value {
    value.clone()
}

/// Structural, type-preserving equality.
///
/// Arrays compare element-wise, maps by size then key list then value list,
/// objects by matching key sets with per-key recursion. Unlike
/// [`shallow_equals`], a `Map` never equals the object holding its encoded
/// shape.
pub fn deep_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(v, w)| deep_equals(v, w))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x.iter().zip(y).all(|((k, _), (l, _))| deep_equals(k, l))
                && x.iter().zip(y).all(|((_, v), (_, w))| deep_equals(v, w))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, v)| y.get(key).is_some_and(|w| deep_equals(v, w)))
        }
        _ => a == b,
    }
}

/// Find a nested value by a dotted path such as `"employees.0.name"`.
///
/// Path segments index objects by key and arrays by position. Map entries
/// are not addressable by path.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(entries) => entries.get(segment),
        Value::Array(values) => segment.parse::<usize>().ok().and_then(|i| values.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::object([
            ("name", Value::from("codes")),
            (
                "table",
                Value::map([
                    (Value::from("a"), Value::from(1)),
                    (Value::from("b"), Value::object([("nested", Value::from(true))])),
                ]),
            ),
            ("tags", Value::array([Value::from("x"), Value::from("y")])),
        ])
    }

    #[test]
    fn stringify_map_encoding_is_canonical() {
        let v = Value::map([(Value::from("k"), Value::from(1))]);
        assert_eq!(stringify(&v), r#"{"dataType":"Map","value":[["k",1]]}"#);
    }

    #[test]
    fn round_trip_preserves_maps() {
        let v = sample();
        let back = parse(&stringify(&v)).unwrap();
        assert!(deep_equals(&v, &back));
        assert!(back.get("table").unwrap().as_map().is_some());
    }

    #[test]
    fn shallow_clone_is_independent() {
        let v = sample();
        let mut clone = shallow_clone(&v);
        clone
            .as_object_mut()
            .unwrap()
            .insert("name".to_string(), Value::from("changed"));
        assert_eq!(v.get("name").unwrap(), &Value::from("codes"));
    }

    #[test]
    fn map_and_encoded_object_disagree_between_modes() {
        let map = Value::map([(Value::from("a"), Value::from(1))]);
        let encoded = parse(&stringify(&map)).unwrap();
        // Round trip revives the map, so force the object shape directly.
        let object = Value::object([
            ("dataType", Value::from("Map")),
            (
                "value",
                Value::array([Value::array([Value::from("a"), Value::from(1)])]),
            ),
        ]);
        assert!(deep_equals(&map, &encoded));
        assert!(shallow_equals(&map, &object));
        assert!(!deep_equals(&map, &object));
    }

    #[test]
    fn deep_equals_objects_ignore_key_order() {
        let a = Value::object([("x", Value::from(1)), ("y", Value::from(2))]);
        let b = Value::object([("y", Value::from(2)), ("x", Value::from(1))]);
        assert!(deep_equals(&a, &b));
        assert!(!shallow_equals(&a, &b));
    }

    #[test]
    fn deep_equals_rejects_missing_keys() {
        let a = Value::object([("x", Value::from(1))]);
        let b = Value::object([("x", Value::from(1)), ("y", Value::from(2))]);
        assert!(!deep_equals(&a, &b));
    }

    #[test]
    fn path_lookup_crosses_arrays() {
        let v = Value::object([(
            "rows",
            Value::array([Value::object([("id", Value::from(7))])]),
        )]);
        assert_eq!(get_path(&v, "rows.0.id"), Some(&Value::from(7)));
        assert_eq!(get_path(&v, "rows.1.id"), None);
    }
}
