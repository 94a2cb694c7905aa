use std::collections::BTreeSet;
use std::sync::Arc;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::schema::{AdditionalProperties, IdSource, Items, Schema};

/// Validate internal consistency of a decoded document.
///
/// This checks:
/// - every node has a non-empty identity
/// - explicit `$id` values are unique within the document
/// - lower bounds do not exceed upper bounds
/// - `multipleOf` is positive
/// - discriminators name a property and non-empty targets
pub fn validate_document(document: &Document) -> Result<()> {
    let mut explicit = BTreeSet::new();
    let mut stack = vec![Arc::clone(&document.root)];

    while let Some(schema) = stack.pop() {
        if schema.id.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "node without identity in {}",
                document.uri
            )));
        }

        if schema.id_source == IdSource::Explicit && !explicit.insert(schema.id.clone()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate $id: {}",
                schema.id
            )));
        }

        validate_bounds(&schema)?;

        if let Some(discriminator) = &schema.extension.discriminator {
            if discriminator.property.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "discriminator without property name: {}",
                    schema.id
                )));
            }
            if let Some((value, _)) = discriminator
                .mapping
                .iter()
                .find(|(_, target)| target.is_empty())
            {
                return Err(Error::InvalidSchema(format!(
                    "discriminator value '{value}' has no target: {}",
                    schema.id
                )));
            }
        }

        stack.extend(children(&schema));
    }

    Ok(())
}

fn validate_bounds(schema: &Schema) -> Result<()> {
    let c = &schema.constraints;
    let pairs = [
        ("minLength", "maxLength", c.min_length, c.max_length),
        ("minItems", "maxItems", c.min_items, c.max_items),
        (
            "minProperties",
            "maxProperties",
            c.min_properties,
            c.max_properties,
        ),
    ];
    for (low_name, high_name, low, high) in pairs {
        if let (Some(low), Some(high)) = (low, high) {
            if low > high {
                return Err(Error::InvalidSchema(format!(
                    "{low_name} {low} exceeds {high_name} {high}: {}",
                    schema.id
                )));
            }
        }
    }

    if let (Some(minimum), Some(maximum)) = (c.minimum, c.maximum) {
        if minimum > maximum {
            return Err(Error::InvalidSchema(format!(
                "minimum {minimum} exceeds maximum {maximum}: {}",
                schema.id
            )));
        }
    }

    if let Some(multiple_of) = c.multiple_of {
        if multiple_of <= 0.0 {
            return Err(Error::InvalidSchema(format!(
                "multipleOf must be positive: {}",
                schema.id
            )));
        }
    }

    Ok(())
}

fn children(schema: &Schema) -> Vec<Arc<Schema>> {
    let mut children: Vec<Arc<Schema>> = schema
        .properties
        .values()
        .chain(schema.definitions.values())
        .chain(schema.all_of.iter())
        .chain(schema.one_of.iter())
        .cloned()
        .collect();

    if let Some(AdditionalProperties::Schema(value)) = &schema.additional_properties {
        children.push(Arc::clone(value));
    }
    match &schema.items {
        Some(Items::Single(item)) => children.push(Arc::clone(item)),
        Some(Items::Tuple(items)) => children.extend(items.iter().cloned()),
        None => {}
    }

    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::decode_document;
    use serde_json::json;

    #[test]
    fn accepts_consistent_document() {
        let doc = decode_document(
            "file:///ok.json",
            &json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1, "maxLength": 3 }
                }
            }),
        )
        .expect("decode");
        validate_document(&doc).expect("valid");
    }

    #[test]
    fn rejects_inverted_bounds() {
        let doc = decode_document(
            "file:///bad.json",
            &json!({
                "properties": {
                    "tags": { "type": "array", "minItems": 4, "maxItems": 2 }
                }
            }),
        )
        .expect("decode");
        let err = validate_document(&doc).expect_err("inverted bounds");
        assert!(err.to_string().contains("minItems 4 exceeds maxItems 2"));
    }

    #[test]
    fn rejects_duplicate_explicit_ids() {
        let doc = decode_document(
            "file:///dup.json",
            &json!({
                "definitions": {
                    "A": { "$id": "thing.json", "type": "string" },
                    "B": { "$id": "thing.json", "type": "string" }
                }
            }),
        )
        .expect("decode");
        let err = validate_document(&doc).expect_err("duplicate id");
        assert!(err.to_string().contains("duplicate $id"));
    }

    #[test]
    fn rejects_non_positive_multiple_of() {
        let doc = decode_document("file:///m.json", &json!({ "multipleOf": 0 })).expect("decode");
        assert!(validate_document(&doc).is_err());
    }
}
