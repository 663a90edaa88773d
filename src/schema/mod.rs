//! Declarative argument schemas for tools and prompts.
//!
//! Each tool declares an [`ObjectSchema`] describing its arguments. The
//! schema serves two purposes:
//!
//! 1. **Introspection**: [`ObjectSchema::to_json_schema`] produces the JSON
//!    Schema advertised through `tools/list`, including per-field
//!    descriptions the client's model reads for self-documentation.
//! 2. **Validation**: [`ObjectSchema::validate`] checks a raw argument
//!    payload before the handler runs, applying defaults and collecting
//!    per-field issues. Validation failures become protocol-level
//!    `InvalidParams` errors, never tool-level `isError` results.
//!
//! Field order is preserved (via `IndexMap`) so repeated `tools/list` calls
//! return byte-identical descriptors.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// The type of a single schema node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    /// A UTF-8 string.
    String,
    /// An integer.
    Integer,
    /// Any JSON number.
    Number,
    /// A boolean.
    Boolean,
    /// A 0/1 integer flag.
    ///
    /// Flags are stored as integers rather than booleans for wire
    /// compatibility with the storage layer.
    Flag,
    /// An array with uniformly typed items.
    Array(Box<SchemaNode>),
}

impl SchemaNode {
    fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer | Self::Flag => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array(_) => "array",
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            Self::Flag => json!({ "type": "integer", "enum": [0, 1] }),
            Self::Array(items) => json!({ "type": "array", "items": items.to_json_schema() }),
            other => json!({ "type": other.type_name() }),
        }
    }

    /// Checks a value against this node, coercing where allowed.
    fn check(&self, value: &Value, path: &str, issues: &mut Vec<FieldIssue>) {
        let ok = match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Flag => matches!(value.as_i64(), Some(0 | 1)),
            Self::Array(items) => {
                if let Some(elements) = value.as_array() {
                    for (index, element) in elements.iter().enumerate() {
                        items.check(element, &format!("{path}[{index}]"), issues);
                    }
                    return;
                }
                false
            }
        };

        if !ok {
            let message = match self {
                Self::Flag => "expected 0 or 1".to_string(),
                other => format!("expected {}", other.type_name()),
            };
            issues.push(FieldIssue {
                field: path.to_string(),
                message,
            });
        }
    }
}

/// A named field within an [`ObjectSchema`].
#[derive(Debug, Clone)]
pub struct Field {
    node: SchemaNode,
    description: Option<String>,
    required: bool,
    nullable: bool,
    default: Option<Value>,
}

impl Field {
    fn new(node: SchemaNode) -> Self {
        Self {
            node,
            description: None,
            required: true,
            nullable: false,
            default: None,
        }
    }

    /// A required string field.
    #[must_use]
    pub fn string() -> Self {
        Self::new(SchemaNode::String)
    }

    /// A required integer field.
    #[must_use]
    pub fn integer() -> Self {
        Self::new(SchemaNode::Integer)
    }

    /// A required number field.
    #[must_use]
    pub fn number() -> Self {
        Self::new(SchemaNode::Number)
    }

    /// A required boolean field.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(SchemaNode::Boolean)
    }

    /// A required 0/1 flag field.
    #[must_use]
    pub fn flag() -> Self {
        Self::new(SchemaNode::Flag)
    }

    /// A required array field with uniformly typed items.
    #[must_use]
    pub fn array_of(items: SchemaNode) -> Self {
        Self::new(SchemaNode::Array(Box::new(items)))
    }

    /// Attaches a human-readable description, surfaced in introspection.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the field optional: it may be omitted from the payload.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Allows an explicit `null` value (distinct from omission).
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets a default, applied when the field is omitted. Implies optional.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.required = false;
        self
    }

    /// Returns this field's description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns whether this field must be present.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }
}

/// A single validation problem, tied to the field that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Dotted path of the offending field.
    pub field: String,
    /// What went wrong.
    pub message: String,
}

/// Validation failure carrying one issue per offending field.
#[derive(Debug, Clone, Error)]
#[error("{}", format_issues(.issues))]
pub struct ValidationError {
    /// The collected issues.
    pub issues: Vec<FieldIssue>,
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// An ordered collection of named fields describing an argument object.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    fields: IndexMap<String, Field>,
}

impl ObjectSchema {
    /// Creates an empty schema (a tool taking no arguments).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. Later fields keep their declaration order in the
    /// serialised schema.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Returns true when the schema declares no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the declared fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Serialises this schema into the protocol's JSON Schema wire format.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, field) in &self.fields {
            let mut node = field.node.to_json_schema();
            if let Some(description) = &field.description {
                node["description"] = json!(description);
            }
            if let Some(default) = &field.default {
                node["default"] = default.clone();
            }
            properties.insert(name.clone(), node);
            if field.required {
                required.push(json!(name));
            }
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = Value::Array(required);
        }
        schema
    }

    /// Validates a raw argument payload against this schema.
    ///
    /// Returns the checked argument object with defaults applied. Unknown
    /// fields are dropped. Explicit nulls survive for nullable fields so
    /// handlers can distinguish "clear" from "keep".
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every offending field.
    pub fn validate(&self, raw: Option<&Value>) -> Result<Map<String, Value>, ValidationError> {
        let empty = Map::new();
        let object = match raw {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(object)) => object,
            Some(other) => {
                return Err(ValidationError {
                    issues: vec![FieldIssue {
                        field: "arguments".to_string(),
                        message: format!("expected object, got {}", json_type_name(other)),
                    }],
                })
            }
        };

        let mut checked = Map::new();
        let mut issues = Vec::new();

        for (name, field) in &self.fields {
            match object.get(name) {
                None => {
                    if let Some(default) = &field.default {
                        checked.insert(name.clone(), default.clone());
                    } else if field.required {
                        issues.push(FieldIssue {
                            field: name.clone(),
                            message: "required field is missing".to_string(),
                        });
                    }
                }
                Some(Value::Null) => {
                    if field.nullable {
                        checked.insert(name.clone(), Value::Null);
                    } else {
                        issues.push(FieldIssue {
                            field: name.clone(),
                            message: "field may not be null".to_string(),
                        });
                    }
                }
                Some(value) => {
                    field.node.check(value, name, &mut issues);
                    checked.insert(name.clone(), value.clone());
                }
            }
        }

        if issues.is_empty() {
            Ok(checked)
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
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

    fn entry_schema() -> ObjectSchema {
        ObjectSchema::new()
            .field("title", Field::string().describe("The title of the entry"))
            .field("content", Field::string())
            .field("mood", Field::string().optional().nullable())
            .field("isPrivate", Field::flag().default_value(json!(1)))
            .field(
                "tags",
                Field::array_of(SchemaNode::Integer).optional(),
            )
    }

    #[test]
    fn json_schema_shape() {
        let schema = entry_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["title"]["type"], "string");
        assert_eq!(
            schema["properties"]["title"]["description"],
            "The title of the entry"
        );
        assert_eq!(schema["properties"]["isPrivate"]["enum"], json!([0, 1]));
        assert_eq!(schema["properties"]["isPrivate"]["default"], 1);
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "integer");
        assert_eq!(schema["required"], json!(["title", "content"]));
    }

    #[test]
    fn json_schema_is_order_stable() {
        let first = entry_schema().to_json_schema().to_string();
        let second = entry_schema().to_json_schema().to_string();
        assert_eq!(first, second);
        // Declared order, not alphabetical.
        assert!(first.find("title").unwrap() < first.find("content").unwrap());
    }

    #[test]
    fn validate_applies_defaults() {
        let args = json!({ "title": "t", "content": "c" });
        let checked = entry_schema().validate(Some(&args)).unwrap();
        assert_eq!(checked["isPrivate"], 1);
        assert!(!checked.contains_key("mood"));
    }

    #[test]
    fn validate_missing_required_field() {
        let args = json!({ "title": "t" });
        let error = entry_schema().validate(Some(&args)).unwrap_err();
        assert_eq!(error.issues.len(), 1);
        assert_eq!(error.issues[0].field, "content");
        assert!(error.to_string().contains("content"));
    }

    #[test]
    fn validate_wrong_types_collects_all_issues() {
        let args = json!({ "title": 7, "content": "c", "isPrivate": 3, "tags": [1, "x"] });
        let error = entry_schema().validate(Some(&args)).unwrap_err();
        let fields: Vec<&str> = error.issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "isPrivate", "tags[1]"]);
        assert!(error.issues[1].message.contains("0 or 1"));
    }

    #[test]
    fn validate_null_handling() {
        let schema = entry_schema();

        let nullable = json!({ "title": "t", "content": "c", "mood": null });
        let checked = schema.validate(Some(&nullable)).unwrap();
        assert_eq!(checked["mood"], Value::Null);

        let not_nullable = json!({ "title": null, "content": "c" });
        let error = schema.validate(Some(&not_nullable)).unwrap_err();
        assert_eq!(error.issues[0].field, "title");
    }

    #[test]
    fn validate_drops_unknown_fields() {
        let args = json!({ "title": "t", "content": "c", "bogus": true });
        let checked = entry_schema().validate(Some(&args)).unwrap();
        assert!(!checked.contains_key("bogus"));
    }

    #[test]
    fn validate_missing_params_with_no_required_fields() {
        let schema = ObjectSchema::new().field("limit", Field::integer().optional());
        assert!(schema.validate(None).is_ok());
    }

    #[test]
    fn validate_non_object_payload() {
        let error = entry_schema().validate(Some(&json!([1, 2]))).unwrap_err();
        assert!(error.issues[0].message.contains("array"));
    }
}
