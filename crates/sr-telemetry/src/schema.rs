//! Structural schema inference for event payloads.
//!
//! The extractor walks a `serde_json::Value` (objects keep insertion order)
//! and produces one [`SchemaEntry`] per field. Lists report the merged shape
//! of their elements; nested objects recurse. Nothing here performs I/O.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Default nesting limit, matching `schema.max_depth`.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Property name used for non-object list elements.
pub const LIST_ELEMENT_NAME: &str = "[]";

/// Structural type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    String,
    Int,
    Float,
    Boolean,
    Null,
    Undefined,
    List,
    Object,
    Unknown,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Boolean => "boolean",
            TypeTag::Null => "null",
            TypeTag::Undefined => "undefined",
            TypeTag::List => "list",
            TypeTag::Object => "object",
            TypeTag::Unknown => "unknown",
        }
    }

    /// Parse a lowercase tag. Unrecognized tags map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "string" => TypeTag::String,
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "boolean" => TypeTag::Boolean,
            "null" => TypeTag::Null,
            "undefined" => TypeTag::Undefined,
            "list" => TypeTag::List,
            "object" => TypeTag::Object,
            _ => TypeTag::Unknown,
        }
    }

    /// Classify a single value without looking inside containers.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => TypeTag::Int,
            Value::Number(_) => TypeTag::Float,
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::List,
            Value::Object(_) => TypeTag::Object,
        }
    }

    fn is_absent(&self) -> bool {
        matches!(self, TypeTag::Null | TypeTag::Undefined)
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TypeTag::parse(&raw))
    }
}

/// One property of an inferred schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaEntry {
    pub property_name: String,
    pub property_type: TypeTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SchemaEntry>>,
}

impl SchemaEntry {
    /// Entry without children.
    pub fn scalar(name: impl Into<String>, property_type: TypeTag) -> Self {
        SchemaEntry {
            property_name: name.into(),
            property_type,
            children: None,
        }
    }

    /// Entry for a container with the given children.
    pub fn nested(
        name: impl Into<String>,
        property_type: TypeTag,
        children: Vec<SchemaEntry>,
    ) -> Self {
        SchemaEntry {
            property_name: name.into(),
            property_type,
            children: Some(children),
        }
    }
}

/// Errors from schema extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema nesting exceeds the limit of {limit} levels")]
    RecursionLimitExceeded { limit: usize },

    #[error("expected an object at the top level, found {found}")]
    NotAnObject { found: TypeTag },
}

impl From<SchemaError> for sr_common::Error {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::RecursionLimitExceeded { limit } => {
                sr_common::Error::RecursionLimitExceeded { limit }
            }
            other => sr_common::Error::Schema(other.to_string()),
        }
    }
}

/// Recursive-descent schema classifier.
#[derive(Debug, Clone, Copy)]
pub struct SchemaExtractor {
    max_depth: usize,
}

impl Default for SchemaExtractor {
    fn default() -> Self {
        SchemaExtractor {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SchemaExtractor {
    pub fn new(max_depth: usize) -> Self {
        SchemaExtractor { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Infer the schema of a top-level payload.
    ///
    /// `null` yields an empty schema; any other non-object is rejected.
    pub fn extract(&self, value: &Value) -> Result<Vec<SchemaEntry>, SchemaError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Object(map) => self.extract_object(map, 1),
            other => Err(SchemaError::NotAnObject {
                found: TypeTag::of(other),
            }),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), SchemaError> {
        if depth > self.max_depth {
            return Err(SchemaError::RecursionLimitExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn extract_object(
        &self,
        map: &Map<String, Value>,
        depth: usize,
    ) -> Result<Vec<SchemaEntry>, SchemaError> {
        self.check_depth(depth)?;
        map.iter()
            .map(|(name, value)| self.extract_entry(name, value, depth))
            .collect()
    }

    fn extract_entry(
        &self,
        name: &str,
        value: &Value,
        depth: usize,
    ) -> Result<SchemaEntry, SchemaError> {
        let property_type = TypeTag::of(value);
        let children = match value {
            Value::Object(map) => Some(self.extract_object(map, depth + 1)?),
            Value::Array(items) => Some(self.extract_list(items, depth + 1)?),
            _ => None,
        };
        Ok(SchemaEntry {
            property_name: name.to_string(),
            property_type,
            children,
        })
    }

    /// Merged shape of all list elements.
    ///
    /// Object elements contribute their fields at the list's own level;
    /// anything else contributes a single `"[]"` entry.
    fn extract_list(&self, items: &[Value], depth: usize) -> Result<Vec<SchemaEntry>, SchemaError> {
        self.check_depth(depth)?;
        let mut merged = Vec::new();
        for item in items {
            let contributed = match item {
                Value::Object(map) => map
                    .iter()
                    .map(|(name, value)| self.extract_entry(name, value, depth))
                    .collect::<Result<Vec<_>, _>>()?,
                other => vec![self.extract_entry(LIST_ELEMENT_NAME, other, depth)?],
            };
            merge_entries(&mut merged, contributed);
        }
        Ok(merged)
    }
}

/// Infer a schema with the default depth limit.
pub fn extract_schema(value: &Value) -> Result<Vec<SchemaEntry>, SchemaError> {
    SchemaExtractor::default().extract(value)
}

/// Merge `incoming` into `target` by property name, keeping first-appearance order.
pub fn merge_entries(target: &mut Vec<SchemaEntry>, incoming: Vec<SchemaEntry>) {
    for entry in incoming {
        match target
            .iter_mut()
            .find(|existing| existing.property_name == entry.property_name)
        {
            Some(existing) => merge_entry(existing, entry),
            None => target.push(entry),
        }
    }
}

// First concrete type wins; null/undefined yield to a later type and int
// widens to float. Same-kind containers merge their children.
fn merge_entry(existing: &mut SchemaEntry, incoming: SchemaEntry) {
    match (existing.property_type, incoming.property_type) {
        (current, next) if current.is_absent() && !next.is_absent() => {
            existing.property_type = next;
            existing.children = incoming.children;
        }
        (TypeTag::Int, TypeTag::Float) => existing.property_type = TypeTag::Float,
        (TypeTag::Object, TypeTag::Object) | (TypeTag::List, TypeTag::List) => {
            match (existing.children.as_mut(), incoming.children) {
                (Some(children), Some(more)) => merge_entries(children, more),
                (None, Some(more)) => existing.children = Some(more),
                _ => {}
            }
        }
        _ => {}
    }
}
