//! Wireproof expectation schema generator
//!
//! Derives, from a resolved navigation stack, the structural schema a
//! conformant response payload must satisfy: each hop requires a field
//! named after the hop, shaped as an array of objects when the cumulative
//! multiplicity at that point is `many` and as a single object otherwise,
//! with the schema for hop *i* wrapping the schema for hop *i+1*.
//!
//! Validation is structural only: field presence, nesting, and
//! array-vs-object shape. Value-level equality belongs to individual
//! rules, not here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use wireproof_types::NavigationStack;

/// Payload-encoding generation of the service under test.
///
/// The generations differ in how expanded collections are wrapped: V3
/// nests them in a `{"results": [...]}` object, V4 embeds a bare array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatVersion {
    V3,
    V4,
}

/// Expected shape of an expanded navigation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Object,
    ArrayOfObject,
}

/// One level of structural expectation: a required field and the shape
/// of its value, wrapping the expectation for the next nesting level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRequirement {
    /// Field the payload must contain at this level
    pub field: String,
    /// Required shape of the field's value
    pub shape: Shape,
    /// Expectation each object under this field must satisfy
    pub nested: Option<Box<FieldRequirement>>,
}

/// A structural schema derived from one navigation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFragment {
    version: FormatVersion,
    root: Option<FieldRequirement>,
}

/// Where and how a payload diverged from its expectation schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("schema mismatch at '{path}': expected {expected}, found {found}")]
pub struct SchemaMismatch {
    /// Logical path of the diverging field, slash-separated
    pub path: String,
    pub expected: String,
    pub found: String,
}

/// Derive the expectation schema for a navigation stack.
///
/// An empty stack derives an empty schema that any payload satisfies.
pub fn derive_schema(stack: &NavigationStack, version: FormatVersion) -> SchemaFragment {
    // Build inside-out: the leaf requirement first, each earlier hop
    // wrapping what came after it.
    let mut root: Option<FieldRequirement> = None;
    for step in stack.steps.iter().rev() {
        root = Some(FieldRequirement {
            field: step.property.name.clone(),
            shape: if step.cumulative.is_many() {
                Shape::ArrayOfObject
            } else {
                Shape::Object
            },
            nested: root.map(Box::new),
        });
    }
    SchemaFragment { version, root }
}

impl SchemaFragment {
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Whether the schema imposes any requirement at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Structurally validate a response payload against this schema.
    pub fn validate(&self, payload: &Value) -> Result<(), SchemaMismatch> {
        match &self.root {
            None => Ok(()),
            Some(requirement) => check(requirement, payload, self.version, ""),
        }
    }
}

fn check(
    requirement: &FieldRequirement,
    payload: &Value,
    version: FormatVersion,
    parent: &str,
) -> Result<(), SchemaMismatch> {
    let path = if parent.is_empty() {
        requirement.field.clone()
    } else {
        format!("{parent}/{}", requirement.field)
    };

    let Some(object) = payload.as_object() else {
        return Err(SchemaMismatch {
            path: parent.to_string(),
            expected: "object".into(),
            found: kind(payload).into(),
        });
    };
    let Some(value) = object.get(&requirement.field) else {
        return Err(SchemaMismatch {
            path,
            expected: format!("field '{}' present", requirement.field),
            found: "absent".into(),
        });
    };

    match requirement.shape {
        Shape::Object => {
            if !value.is_object() {
                return Err(SchemaMismatch {
                    path,
                    expected: "single object".into(),
                    found: kind(value).into(),
                });
            }
            if let Some(nested) = &requirement.nested {
                check(nested, value, version, &path)?;
            }
        }
        Shape::ArrayOfObject => {
            let (elements, collection_path) = collection_elements(value, version, &path)?;
            for (i, element) in elements.iter().enumerate() {
                if !element.is_object() {
                    return Err(SchemaMismatch {
                        path: format!("{collection_path}[{i}]"),
                        expected: "object".into(),
                        found: kind(element).into(),
                    });
                }
                if let Some(nested) = &requirement.nested {
                    check(nested, element, version, &format!("{collection_path}[{i}]"))?;
                }
            }
        }
    }
    Ok(())
}

/// Unwrap a collection value according to the payload generation.
fn collection_elements<'a>(
    value: &'a Value,
    version: FormatVersion,
    path: &str,
) -> Result<(&'a [Value], String), SchemaMismatch> {
    match version {
        FormatVersion::V4 => match value.as_array() {
            Some(elements) => Ok((elements, path.to_string())),
            None => Err(SchemaMismatch {
                path: path.to_string(),
                expected: "array of objects".into(),
                found: kind(value).into(),
            }),
        },
        FormatVersion::V3 => {
            let Some(wrapper) = value.as_object() else {
                return Err(SchemaMismatch {
                    path: path.to_string(),
                    expected: "results-wrapped collection".into(),
                    found: kind(value).into(),
                });
            };
            let results_path = format!("{path}/results");
            match wrapper.get("results").and_then(Value::as_array) {
                Some(elements) => Ok((elements, results_path)),
                None => Err(SchemaMismatch {
                    path: results_path,
                    expected: "results array".into(),
                    found: wrapper
                        .get("results")
                        .map(kind)
                        .unwrap_or("absent")
                        .into(),
                }),
            }
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
