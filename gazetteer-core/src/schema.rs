//! Attribute schemas and field validation.
//!
//! An [`AttributeSchema`] declares the fields an entity may carry and their
//! types. [`EntitySchema`] resolves it against the entity's natural-key fields
//! once, at construction, and is then reused on every create and update.
//!
//! Validation is strict: a present, non-null value must have exactly the
//! declared type. There is no widening, so the JSON literal `5` does not
//! satisfy [`FieldType::Float`] and `5.0` does not satisfy
//! [`FieldType::Integer`]. Null and absent values are always accepted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::error::ValidationError;
use crate::identity::Document;
use crate::key::{normalize_str, CompositeKey};

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Float,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Whether a non-null value has exactly this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Float, Value::Number(n)) => n.is_f64(),
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    /// Name of the runtime type of a JSON value, for error messages.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_f64() => "float",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Float => "float",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    /// Part of the natural key.
    pub is_key: bool,
    /// String values are trimmed and lower-cased before persistence.
    pub normalized: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_key: false,
            normalized: false,
        }
    }
}

/// Field name to declared type, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    fields: Vec<FieldSpec>,
}

impl AttributeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldSpec::new(name, field_type));
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Type-check every declared attribute present in `input`.
    ///
    /// Reports the first offending field in declaration order.
    pub fn validate(&self, input: &Document) -> Result<(), ValidationError> {
        for spec in &self.fields {
            match input.get(&spec.name) {
                None | Some(Value::Null) => continue,
                Some(value) if spec.field_type.matches(value) => continue,
                Some(value) => {
                    return Err(ValidationError::TypeMismatch {
                        field: spec.name.clone(),
                        expected: spec.field_type,
                        found: FieldType::describe(value),
                    })
                }
            }
        }
        Ok(())
    }
}

/// An attribute schema resolved against an entity's natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    attributes: AttributeSchema,
    key_fields: Vec<String>,
}

impl EntitySchema {
    /// Resolve `attributes` against `key_fields`.
    ///
    /// Every key field must be declared in the schema, key fields must be
    /// non-empty and distinct, and attributes must be declared once.
    pub fn new<S: AsRef<str>>(
        attributes: AttributeSchema,
        key_fields: &[S],
    ) -> Result<Self, ValidationError> {
        if key_fields.is_empty() {
            return Err(ValidationError::EmptyKeyFields);
        }

        let mut seen = HashSet::new();
        for spec in attributes.fields() {
            if !seen.insert(spec.name.as_str()) {
                return Err(ValidationError::DuplicateAttribute {
                    field: spec.name.clone(),
                });
            }
        }

        let mut keys: Vec<String> = Vec::with_capacity(key_fields.len());
        for field in key_fields {
            let field = field.as_ref();
            if keys.iter().any(|k| k == field) {
                return Err(ValidationError::DuplicateKeyField {
                    field: field.to_string(),
                });
            }
            if !attributes.contains(field) {
                return Err(ValidationError::UnknownKeyField {
                    field: field.to_string(),
                });
            }
            keys.push(field.to_string());
        }

        let mut attributes = attributes;
        for spec in &mut attributes.fields {
            if keys.contains(&spec.name) {
                spec.is_key = true;
                spec.normalized = spec.field_type == FieldType::String;
            }
        }

        Ok(Self {
            attributes,
            key_fields: keys,
        })
    }

    pub fn attributes(&self) -> &AttributeSchema {
        &self.attributes
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn validate(&self, input: &Document) -> Result<(), ValidationError> {
        self.attributes.validate(input)
    }

    /// Normalize a value for the given field if the field is normalized.
    pub fn normalize_value(&self, field: &str, value: &Value) -> Value {
        match (self.attributes.get(field), value) {
            (Some(spec), Value::String(s)) if spec.normalized => Value::String(normalize_str(s)),
            _ => value.clone(),
        }
    }

    /// Keep the declared, non-null fields of `input`, normalizing key strings.
    ///
    /// Callers must run [`EntitySchema::validate`] first.
    pub fn project(&self, input: &Document) -> Document {
        let mut out = Document::new();
        for spec in self.attributes.fields() {
            match input.get(&spec.name) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    out.insert(spec.name.clone(), self.normalize_value(&spec.name, value));
                }
            }
        }
        out
    }

    /// Names of input fields the schema does not declare.
    pub fn undeclared<'a>(&self, input: &'a Document) -> Vec<&'a str> {
        input
            .keys()
            .filter(|k| !self.attributes.contains(k.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// First key field absent or null in `document`.
    pub fn first_missing_key<'a>(&'a self, document: &Document) -> Option<&'a str> {
        self.key_fields
            .iter()
            .find(|k| document.get(k.as_str()).map_or(true, Value::is_null))
            .map(String::as_str)
    }

    /// Composite key of a projected document.
    pub fn key_of(&self, document: &Document) -> CompositeKey {
        CompositeKey::from_document(&self.key_fields, document)
    }

    /// Composite key from positional values, normalizing each slot the way
    /// the write path does.
    pub fn key_from_values(&self, values: &[Value]) -> Result<CompositeKey, ValidationError> {
        if values.len() != self.key_fields.len() {
            return Err(ValidationError::KeyArity {
                expected: self.key_fields.len(),
                got: values.len(),
            });
        }
        let normalized: Vec<Value> = self
            .key_fields
            .iter()
            .zip(values)
            .map(|(field, value)| self.normalize_value(field, value))
            .collect();
        Ok(CompositeKey::from_values(&normalized))
    }
}
