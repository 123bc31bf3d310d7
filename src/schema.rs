//! Output schemas for structured generation
//!
//! A schema is held as the same JSON document that is sent to the model as
//! `response_schema` (OpenAPI subset used by Gemini), and responses are
//! validated locally against it before deserialization.

use serde_json::{json, Map, Value};
use std::fmt;

/// Immutable schema object, built once and shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    root: Value,
}

/// First violation found while validating a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: {}", self.path, self.message)
    }
}

impl OutputSchema {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn as_json(&self) -> &Value {
        &self.root
    }

    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        validate_node(&self.root, value, "$")
    }
}

//
// ================= Builders =================
//

pub fn string(description: &str) -> Value {
    json!({ "type": "STRING", "description": description })
}

pub fn number(description: &str) -> Value {
    json!({ "type": "NUMBER", "description": description })
}

pub fn boolean(description: &str) -> Value {
    json!({ "type": "BOOLEAN", "description": description })
}

pub fn array(items: Value, description: &str) -> Value {
    json!({ "type": "ARRAY", "items": items, "description": description })
}

/// Object schema; each property is `(name, schema, required)`.
pub fn object(properties: Vec<(&str, Value, bool)>) -> Value {
    let mut props = Map::new();
    let mut required = Vec::new();
    let mut ordering = Vec::new();

    for (name, schema, is_required) in properties {
        if is_required {
            required.push(Value::String(name.to_string()));
        }
        ordering.push(Value::String(name.to_string()));
        props.insert(name.to_string(), schema);
    }

    json!({
        "type": "OBJECT",
        "properties": props,
        "required": required,
        "propertyOrdering": ordering,
    })
}

//
// ================= Validation =================
//

fn violation(path: &str, message: impl Into<String>) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn validate_node(schema: &Value, value: &Value, path: &str) -> Result<(), SchemaViolation> {
    let ty = schema
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_ascii_uppercase);

    let nullable = schema
        .get("nullable")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if value.is_null() && nullable {
        return Ok(());
    }

    match ty.as_deref() {
        Some("STRING") => value
            .is_string()
            .then_some(())
            .ok_or_else(|| violation(path, format!("expected string, found {}", type_name(value)))),
        Some("NUMBER") => value
            .is_number()
            .then_some(())
            .ok_or_else(|| violation(path, format!("expected number, found {}", type_name(value)))),
        Some("INTEGER") => (value.is_i64() || value.is_u64())
            .then_some(())
            .ok_or_else(|| violation(path, format!("expected integer, found {}", type_name(value)))),
        Some("BOOLEAN") => value
            .is_boolean()
            .then_some(())
            .ok_or_else(|| violation(path, format!("expected boolean, found {}", type_name(value)))),
        Some("ARRAY") => {
            let items = value.as_array().ok_or_else(|| {
                violation(path, format!("expected array, found {}", type_name(value)))
            })?;
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_node(item_schema, item, &format!("{}[{}]", path, i))?;
                }
            }
            Ok(())
        }
        Some("OBJECT") => {
            let fields = value.as_object().ok_or_else(|| {
                violation(path, format!("expected object, found {}", type_name(value)))
            })?;

            let required = schema
                .get("required")
                .and_then(Value::as_array)
                .map(|names| names.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default();

            for name in &required {
                match fields.get(*name) {
                    None | Some(Value::Null) => {
                        return Err(violation(
                            &format!("{}.{}", path, name),
                            "required field is missing",
                        ))
                    }
                    Some(_) => {}
                }
            }

            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (name, prop_schema) in properties {
                    match fields.get(name) {
                        // Optional fields may be omitted or null.
                        None | Some(Value::Null) if !required.contains(&name.as_str()) => {}
                        Some(field) => {
                            validate_node(prop_schema, field, &format!("{}.{}", path, name))?
                        }
                        None => {}
                    }
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric_schema() -> OutputSchema {
        OutputSchema::new(object(vec![
            ("summary", string("summary"), true),
            (
                "points",
                array(
                    object(vec![
                        ("period", string("period"), true),
                        ("revenue", number("revenue"), false),
                    ]),
                    "points",
                ),
                true,
            ),
            ("estimated", boolean("flag"), false),
        ]))
    }

    #[test]
    fn test_valid_document() {
        let schema = metric_schema();
        let value = json!({
            "summary": "ok",
            "points": [{"period": "Q1", "revenue": 10.5}, {"period": "Q2"}],
            "extra": "ignored"
        });
        assert!(schema.validate(&value).is_ok());
    }

    #[test]
    fn test_optional_null_is_accepted() {
        let schema = metric_schema();
        let value = json!({
            "summary": "ok",
            "points": [{"period": "Q1", "revenue": null}],
            "estimated": null
        });
        assert!(schema.validate(&value).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let schema = metric_schema();
        let err = schema.validate(&json!({"points": []})).unwrap_err();
        assert_eq!(err.path, "$.summary");
    }

    #[test]
    fn test_numeric_fields_must_be_numbers() {
        let schema = metric_schema();
        let err = schema
            .validate(&json!({
                "summary": "ok",
                "points": [{"period": "Q1"}, {"period": "Q2", "revenue": "1,200"}]
            }))
            .unwrap_err();
        assert_eq!(err.path, "$.points[1].revenue");
        assert!(err.to_string().contains("expected number, found string"));
    }

    #[test]
    fn test_root_must_be_object() {
        let schema = metric_schema();
        assert!(schema.validate(&json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_builder_records_required_and_ordering() {
        let schema = object(vec![("a", string("a"), true), ("b", number("b"), false)]);
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["required"], json!(["a"]));
        assert_eq!(schema["propertyOrdering"], json!(["a", "b"]));
    }
}
