//! Serialized argument values and the schemas that validate them.
//!
//! Activity arguments arrive from planners as JSON values. Each activity
//! type declares its [`Parameter`]s with a [`ValueSchema`]; the engine
//! checks arguments against those schemas before any simulated time
//! passes.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A serialized argument or resource value.
pub type SerializedValue = serde_json::Value;

/// Named activity arguments. Ordered by name so iteration is deterministic.
pub type Arguments = BTreeMap<String, SerializedValue>;

/// The accepted shape of a serialized value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueSchema {
    /// Any JSON number.
    Real,
    /// A number representable as `i64`.
    Int,
    /// `true` or `false`.
    Boolean,
    /// Any string.
    String,
    /// A duration in integer microseconds.
    Duration,
    /// An array whose elements all match `items`.
    Series {
        /// Schema of every element.
        items: Box<ValueSchema>,
    },
    /// An object with exactly these fields.
    Struct {
        /// Field name to field schema, in declaration order.
        fields: IndexMap<String, ValueSchema>,
    },
    /// One of a fixed set of strings.
    Variant {
        /// The allowed labels.
        variants: Vec<String>,
    },
    /// Anything at all.
    Any,
}

impl ValueSchema {
    /// Check `value` against this schema, describing the first mismatch.
    pub fn check(&self, value: &SerializedValue) -> Result<(), String> {
        match self {
            Self::Real if value.is_number() => Ok(()),
            Self::Real => Err(format!("expected a real number, got {value}")),
            Self::Int | Self::Duration if value.as_i64().is_some() => Ok(()),
            Self::Int => Err(format!("expected an integer, got {value}")),
            Self::Duration => Err(format!("expected a duration in microseconds, got {value}")),
            Self::Boolean if value.is_boolean() => Ok(()),
            Self::Boolean => Err(format!("expected a boolean, got {value}")),
            Self::String if value.is_string() => Ok(()),
            Self::String => Err(format!("expected a string, got {value}")),
            Self::Series { items } => {
                let elements = value
                    .as_array()
                    .ok_or_else(|| format!("expected a series, got {value}"))?;
                for (i, element) in elements.iter().enumerate() {
                    items.check(element).map_err(|e| format!("element {i}: {e}"))?;
                }
                Ok(())
            }
            Self::Struct { fields } => {
                let object = value
                    .as_object()
                    .ok_or_else(|| format!("expected a struct, got {value}"))?;
                for (name, schema) in fields {
                    let field = object
                        .get(name)
                        .ok_or_else(|| format!("missing field '{name}'"))?;
                    schema.check(field).map_err(|e| format!("field '{name}': {e}"))?;
                }
                if let Some(extra) = object.keys().find(|k| !fields.contains_key(*k)) {
                    return Err(format!("unexpected field '{extra}'"));
                }
                Ok(())
            }
            Self::Variant { variants } => match value.as_str() {
                Some(label) if variants.iter().any(|v| v == label) => Ok(()),
                _ => Err(format!("expected one of {variants:?}, got {value}")),
            },
            Self::Any => Ok(()),
        }
    }
}

/// One declared parameter of an activity type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Argument name.
    pub name: String,
    /// Accepted shape.
    pub schema: ValueSchema,
    /// Value used when the argument is omitted. `None` makes it required.
    pub default: Option<SerializedValue>,
}

impl Parameter {
    /// A parameter that must be supplied.
    pub fn required(name: impl Into<String>, schema: ValueSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
        }
    }

    /// A parameter that falls back to `default` when omitted.
    pub fn optional(name: impl Into<String>, schema: ValueSchema, default: SerializedValue) -> Self {
        Self {
            name: name.into(),
            schema,
            default: Some(default),
        }
    }
}
