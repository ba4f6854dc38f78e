//! Default-value synthesis from a resolved schema, used when a replicant
//! declares no explicit `defaultValue` of its own.
//!
//! Only `required` properties (or properties carrying their own explicit
//! `default`) are populated on synthesized objects — this keeps synthesized
//! defaults minimal rather than guessing at every optional field a schema
//! happens to describe.

use serde_json::{json, Map, Value};

pub fn synthesize_default(schema: &Value) -> Value {
    if let Some(default) = schema.get("default") {
        return default.clone();
    }
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => synthesize_object_default(schema),
        Some("array") => Value::Array(Vec::new()),
        Some("string") => Value::String(String::new()),
        Some("number") | Some("integer") => json!(0),
        Some("boolean") => Value::Bool(false),
        Some("null") => Value::Null,
        _ => {
            if schema.get("properties").is_some() {
                synthesize_object_default(schema)
            } else if let Some(Value::Array(all_of)) = schema.get("allOf") {
                let mut merged = Value::Object(Map::new());
                for sub in all_of {
                    merge_shallow(&mut merged, &synthesize_default(sub));
                }
                merged
            } else {
                Value::Null
            }
        }
    }
}

fn synthesize_object_default(schema: &Value) -> Value {
    let mut obj = Map::new();
    if let Some(Value::Object(props)) = schema.get("properties") {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        for (key, sub) in props {
            if required.contains(&key.as_str()) || sub.get("default").is_some() {
                obj.insert(key.clone(), synthesize_default(sub));
            }
        }
    }
    Value::Object(obj)
}

fn merge_shallow(into: &mut Value, from: &Value) {
    if let (Value::Object(a), Value::Object(b)) = (into, from) {
        for (k, v) in b {
            a.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn explicit_default_wins() {
        let schema = json!({"type": "number", "default": 42});
        assert_eq!(synthesize_default(&schema), json!(42));
    }

    #[test]
    fn object_only_fills_required_fields() {
        let schema = json!({
            "type": "object",
            "required": ["x"],
            "properties": {
                "x": {"type": "number"},
                "y": {"type": "string"},
            },
        });
        assert_eq!(synthesize_default(&schema), json!({"x": 0}));
    }

    #[test]
    fn nested_object_default() {
        let schema = json!({
            "type": "object",
            "required": ["a"],
            "properties": {
                "a": {
                    "type": "object",
                    "required": ["b"],
                    "properties": {"b": {"type": "number"}},
                },
            },
        });
        assert_eq!(synthesize_default(&schema), json!({"a": {"b": 0}}));
    }

    #[test]
    fn primitive_defaults() {
        assert_eq!(synthesize_default(&json!({"type": "array"})), json!([]));
        assert_eq!(synthesize_default(&json!({"type": "string"})), json!(""));
        assert_eq!(synthesize_default(&json!({"type": "boolean"})), json!(false));
    }
}
