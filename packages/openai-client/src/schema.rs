//! Strict-mode rewriting of JSON schemas for structured outputs.
//!
//! Callers usually produce the root schema with `schemars::schema_for!`.
//!
//! Strict mode wants every object closed (`additionalProperties: false`), every property
//! listed in `required` (nullable ones included), and no `$ref` indirection.

use serde_json::Value;

/// Rewrite a schemars root schema into strict form.
pub fn to_strict_schema(mut root: Value) -> Value {
    let definitions = match &mut root {
        Value::Object(map) => {
            map.remove("$schema");
            map.remove("definitions").unwrap_or(Value::Null)
        }
        _ => Value::Null,
    };

    strictify(&mut root, &definitions);
    root
}

fn strictify(value: &mut Value, definitions: &Value) {
    if let Some(def) = resolve_ref(value, definitions) {
        *value = def;
        strictify(value, definitions);
        return;
    }

    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));

                let required: Option<Vec<Value>> = map
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| props.keys().cloned().map(Value::String).collect());
                if let Some(required) = required {
                    map.insert("required".to_string(), Value::Array(required));
                }
            }

            for child in map.values_mut() {
                strictify(child, definitions);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strictify(item, definitions);
            }
        }
        _ => {}
    }
}

fn resolve_ref(value: &Value, definitions: &Value) -> Option<Value> {
    let name = value
        .get("$ref")?
        .as_str()?
        .strip_prefix("#/definitions/")?;
    definitions.get(name).cloned()
}
