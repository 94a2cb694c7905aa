use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::constraints::{Constraints, Extension};
use crate::types::PrimitiveKind;

/// How a schema node obtained its identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdSource {
    /// Declared with `$id`.
    Explicit,
    /// Root of a fetched document; identity is the document URI.
    Document,
    /// Derived from the parent identity plus a JSON pointer.
    #[default]
    Synthesized,
}

/// Value schema for properties not listed in `properties`.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Arc<Schema>),
}

/// Element schema(s) of an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    /// Homogeneous list.
    Single(Arc<Schema>),
    /// Fixed, positional list.
    Tuple(Vec<Arc<Schema>>),
}

/// One node of a loaded schema document.
///
/// Nodes are immutable once a document has been decoded and are shared
/// through `Arc`. A `$ref` node carries only its identity and `reference`;
/// it is resolved through a [`Resolver`](crate::store::Resolver).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Absolute URI identifying this node.
    pub id: String,
    pub id_source: IdSource,
    /// Absolute target of `$ref`.
    pub reference: Option<String>,
    /// Declared `type`; `Unknown` when absent.
    pub kind: PrimitiveKind,
    /// `type` listed `"null"` next to the declared kind.
    pub nullable: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub properties: BTreeMap<String, Arc<Schema>>,
    pub required: Vec<String>,
    pub additional_properties: Option<AdditionalProperties>,
    pub items: Option<Items>,
    pub all_of: Vec<Arc<Schema>>,
    pub one_of: Vec<Arc<Schema>>,
    pub definitions: BTreeMap<String, Arc<Schema>>,
    /// `enum` members; `const` is decoded as a single member.
    pub enum_values: Vec<Value>,
    pub constraints: Constraints,
    pub extension: Extension,
}

impl Schema {
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|name| name == property)
    }

    /// Declared kind, or the kind implied by the keywords present.
    pub fn effective_kind(&self) -> PrimitiveKind {
        if self.kind != PrimitiveKind::Unknown {
            return self.kind;
        }
        if !self.properties.is_empty() || self.additional_properties.is_some() {
            return PrimitiveKind::Object;
        }
        if self.items.is_some() {
            return PrimitiveKind::Array;
        }
        self.enum_kind().unwrap_or(PrimitiveKind::Unknown)
    }

    /// Common kind of all `enum` members, if they share one.
    ///
    /// A mix of integers and fractional numbers is reported as `Number`.
    pub fn enum_kind(&self) -> Option<PrimitiveKind> {
        let mut kinds = self.enum_values.iter().map(value_kind);
        let first = kinds.next()?;
        kinds.try_fold(first, |acc, kind| match (acc, kind) {
            (left, right) if left == right => Some(left),
            (PrimitiveKind::Integer, PrimitiveKind::Number)
            | (PrimitiveKind::Number, PrimitiveKind::Integer) => Some(PrimitiveKind::Number),
            _ => None,
        })
    }

    /// JSON pointer fragment of the identity, if the identity has one.
    pub fn pointer(&self) -> Option<&str> {
        let (_, fragment) = self.id.split_once('#')?;
        fragment.starts_with('/').then_some(fragment)
    }
}

/// Primitive kind of a literal JSON value.
pub fn value_kind(value: &Value) -> PrimitiveKind {
    match value {
        Value::Null => PrimitiveKind::Null,
        Value::Bool(_) => PrimitiveKind::Boolean,
        Value::Number(number) if number.is_i64() || number.is_u64() => PrimitiveKind::Integer,
        Value::Number(_) => PrimitiveKind::Number,
        Value::String(_) => PrimitiveKind::String,
        Value::Array(_) => PrimitiveKind::Array,
        Value::Object(_) => PrimitiveKind::Object,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infers_kind_from_keywords() {
        let object = Schema {
            properties: BTreeMap::from([("a".to_string(), Arc::new(Schema::default()))]),
            ..Schema::default()
        };
        assert_eq!(object.effective_kind(), PrimitiveKind::Object);

        let list = Schema {
            items: Some(Items::Single(Arc::new(Schema::default()))),
            ..Schema::default()
        };
        assert_eq!(list.effective_kind(), PrimitiveKind::Array);

        let numbers = Schema {
            enum_values: vec![json!(1), json!(2.5)],
            ..Schema::default()
        };
        assert_eq!(numbers.effective_kind(), PrimitiveKind::Number);
    }

    #[test]
    fn mixed_enum_has_no_kind() {
        let mixed = Schema {
            enum_values: vec![json!("a"), json!(1)],
            ..Schema::default()
        };
        assert_eq!(mixed.enum_kind(), None);
        assert_eq!(mixed.effective_kind(), PrimitiveKind::Unknown);
    }

    #[test]
    fn pointer_requires_slash_fragment() {
        let pointer = Schema {
            id: "file:///a.json#/definitions/A".to_string(),
            ..Schema::default()
        };
        assert_eq!(pointer.pointer(), Some("/definitions/A"));

        let anchor = Schema {
            id: "file:///pkg#Widget".to_string(),
            ..Schema::default()
        };
        assert_eq!(anchor.pointer(), None);
    }
}
