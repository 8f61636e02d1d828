//! Field schema and the mutable field set collected during a form dialogue.

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationFailure;

/// Scalar type a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "string"),
            Self::Number => write!(f, "number"),
        }
    }
}

/// One named field of a form.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Human description, shown to the LLM in summaries.
    pub description: Option<String>,
    /// Text fields only: the value must match this pattern.
    pub pattern: Option<Regex>,
}

impl FieldSpec {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
            description: None,
            pattern: None,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Number,
            description: None,
            pattern: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        if value.is_null() {
            return Ok(());
        }
        match (self.kind, value) {
            (FieldKind::Text, Value::String(s)) => {
                if let Some(ref pattern) = self.pattern
                    && !s.is_empty()
                    && !pattern.is_match(s)
                {
                    return Err(ValidationFailure::new(
                        &self.name,
                        format!("Field '{}' does not match the expected format", self.name),
                    ));
                }
                Ok(())
            }
            (FieldKind::Number, Value::Number(_)) => Ok(()),
            (kind, _) => Err(ValidationFailure::new(
                &self.name,
                format!("Field '{}' should be a valid {}", self.name, kind),
            )),
        }
    }
}

/// Whether a value counts as "not yet provided": null, empty string or zero.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// The ordered field values of one form instance.
///
/// Field names are fixed at construction; values start out null.
#[derive(Debug, Clone)]
pub struct FieldSet {
    fields: Vec<FieldSpec>,
    values: Vec<Value>,
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        self.names().eq(other.names()) && self.values == other.values
    }
}

impl FieldSet {
    /// An empty field set for the given schema.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        let values = vec![Value::Null; fields.len()];
        Self { fields, values }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Value of a single field, `None` for unknown names.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.values[i])
    }

    /// Ordered mapping of field name to value.
    pub fn get(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name.clone(), v.clone()))
            .collect()
    }

    /// Names of fields that are still empty, in schema order.
    pub fn empty_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .zip(&self.values)
            .filter(|(_, v)| is_empty_value(v))
            .map(|(f, _)| f.name.clone())
            .collect()
    }

    pub fn is_completed(&self) -> bool {
        self.values.iter().all(|v| !is_empty_value(v))
    }

    /// A copy with every non-empty incoming value applied.
    ///
    /// Empty incoming values and unknown field names are ignored, so a set
    /// value can be overwritten but never erased.
    pub fn merged(&self, partial: &Map<String, Value>) -> FieldSet {
        let mut next = self.clone();
        for (name, value) in partial {
            if is_empty_value(value) {
                continue;
            }
            match next.position(name) {
                Some(i) => next.values[i] = value.clone(),
                None => tracing::debug!(field = %name, "Ignoring unknown field in extraction"),
            }
        }
        next
    }

    /// Check every value against its field's constraints.
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        self.fields
            .iter()
            .zip(&self.values)
            .try_for_each(|(f, v)| f.validate(v))
    }

    /// Merge and validate in one step; returns whether anything changed.
    ///
    /// On a validation failure `self` is left untouched.
    pub fn merge(&mut self, partial: &Map<String, Value>) -> Result<bool, ValidationFailure> {
        let next = self.merged(partial);
        if next == *self {
            return Ok(false);
        }
        next.validate()?;
        *self = next;
        Ok(true)
    }

    /// Zip positional values with the field names into a JSON object.
    pub fn positional_json(&self, values: &[Value]) -> Map<String, Value> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), values.get(i).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// `name: value` lines, used for summaries.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| {
                let label = f.description.as_deref().unwrap_or(&f.name);
                let shown = match v {
                    Value::Null => "(missing)".to_string(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("- {label}: {shown}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}
