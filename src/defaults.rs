//! Payload coercion and declared defaults.
use serde_json::{Map, Value};

use crate::schema::Schema;

/// Coerce any decoded value into an initialization payload.
///
/// Maps are kept as-is and arrays become index-keyed maps, so both document
/// shapes go through the same defaulting and lookup path. `null` is an empty
/// payload; a bare scalar sits at index `"0"`.
pub fn payload_from(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Value::Null => Map::new(),
        scalar => {
            let mut map = Map::new();
            map.insert("0".into(), scalar);
            map
        }
    }
}

/// Fill every declared property that is absent or `null` with its default,
/// or with `null` when none is declared.
pub fn apply_defaults(schema: &Schema, payload: &mut Map<String, Value>) {
    for (name, descriptor) in schema.iter() {
        let missing = payload.get(name).is_none_or(Value::is_null);
        if missing {
            let default = descriptor.default().cloned().unwrap_or(Value::Null);
            payload.insert(name.to_string(), default);
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeDecl;
    use crate::schema::extract;
    use serde_json::json;

    fn schema() -> Schema {
        extract(&TypeDecl::new("Thing").with_header(
            "
            @property string $name
            @property string[] $tags {@default []}
            @property int $size {@default 10}
            ",
        ))
    }

    #[test]
    fn missing_and_null_take_defaults() {
        let mut payload = payload_from(json!({"name": "n", "size": null, "extra": 1}));
        apply_defaults(&schema(), &mut payload);
        assert_eq!(
            Value::Object(payload),
            json!({"name": "n", "size": 10, "extra": 1, "tags": []})
        );
    }

    #[test]
    fn undeclared_default_is_null() {
        let mut payload = payload_from(json!({}));
        apply_defaults(&schema(), &mut payload);
        assert_eq!(payload.get("name"), Some(&Value::Null));
    }

    #[test]
    fn arrays_become_index_keyed_payloads() {
        let payload = payload_from(json!(["a", "b"]));
        assert_eq!(Value::Object(payload), json!({"0": "a", "1": "b"}));
        assert!(payload_from(Value::Null).is_empty());
        assert_eq!(Value::Object(payload_from(json!(3))), json!({"0": 3}));
    }
}
