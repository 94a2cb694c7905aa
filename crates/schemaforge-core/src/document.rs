//! Decoding of JSON schema documents into the [`Schema`] model.
//!
//! Every node receives an absolute identity: its `$id` when declared, the
//! document URI for the root, or `<base>#<json-pointer>` otherwise. All
//! nodes are collected so a store can resolve `$ref` targets by identity.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::constraints::{Constraints, Discriminator, Extension};
use crate::error::{Error, Result};
use crate::schema::{AdditionalProperties, IdSource, Items, Schema};
use crate::types::PrimitiveKind;

/// Extension keyword controlling output.
pub const EXTENSION_KEYWORD: &str = "x-schemaforge";

/// A decoded schema document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Document URI without fragment.
    pub uri: String,
    pub root: Arc<Schema>,
    /// Every node keyed by each identity it is reachable under.
    pub nodes: BTreeMap<String, Arc<Schema>>,
    /// Documents referenced from this one that must be loaded separately.
    pub external_refs: BTreeSet<String>,
}

impl Document {
    /// Definitions declared at the document root.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.root.definitions.values()
    }
}

/// Decode a JSON document fetched from `uri`.
pub fn decode_document(uri: &str, value: &Value) -> Result<Document> {
    let base = parse_uri(uri)?;
    let doc_uri = strip_fragment(&base);

    let mut decoder = Decoder {
        doc_uri: doc_uri.clone(),
        nodes: BTreeMap::new(),
        bases: BTreeSet::from([doc_uri.clone()]),
        references: BTreeSet::new(),
    };

    let root = decoder.node(value, &base, "", "", true)?;

    let external_refs = decoder
        .references
        .iter()
        .map(|reference| document_part(reference).to_string())
        .filter(|document| !decoder.bases.contains(document))
        .collect();

    Ok(Document {
        uri: doc_uri,
        root,
        nodes: decoder.nodes,
        external_refs,
    })
}

/// Normalize an identity: drop an empty trailing fragment.
pub fn normalize_id(id: &str) -> String {
    id.strip_suffix('#').unwrap_or(id).to_string()
}

/// Document portion of an absolute reference.
pub fn document_part(reference: &str) -> &str {
    reference
        .split_once('#')
        .map(|(document, _)| document)
        .unwrap_or(reference)
}

fn parse_uri(uri: &str) -> Result<Url> {
    Url::parse(uri).map_err(|source| Error::InvalidUri {
        uri: uri.to_string(),
        source,
    })
}

fn join_uri(base: &Url, reference: &str) -> Result<Url> {
    base.join(reference).map_err(|source| Error::InvalidUri {
        uri: reference.to_string(),
        source,
    })
}

fn strip_fragment(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

struct Decoder {
    doc_uri: String,
    nodes: BTreeMap<String, Arc<Schema>>,
    bases: BTreeSet<String>,
    references: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExtension {
    #[serde(rename = "type")]
    type_path: Option<String>,
    discriminator: Option<RawDiscriminator>,
    #[serde(default)]
    exclude: bool,
    #[serde(default)]
    no_validate: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDiscriminator {
    #[serde(alias = "propertyName")]
    property: String,
    #[serde(default)]
    mapping: BTreeMap<String, String>,
}

impl Decoder {
    /// Decode one node. `pointer` is relative to `base`; `doc_pointer` is
    /// relative to the document root.
    fn node(
        &mut self,
        value: &Value,
        base: &Url,
        pointer: &str,
        doc_pointer: &str,
        root: bool,
    ) -> Result<Arc<Schema>> {
        let object = match value {
            Value::Object(object) => object,
            Value::Bool(true) => {
                let schema = Schema {
                    id: self.synthesized_id(base, pointer),
                    ..Schema::default()
                };
                return Ok(self.register(schema, doc_pointer));
            }
            Value::Bool(false) => {
                return Err(Error::Unsupported(format!(
                    "false schema at {}#{}",
                    self.doc_uri, doc_pointer
                )));
            }
            other => {
                return Err(Error::InvalidSchema(format!(
                    "expected object at {}#{}, found {}",
                    self.doc_uri,
                    doc_pointer,
                    kind_name(other)
                )));
            }
        };

        let (base, pointer, id, id_source) = match object.get("$id").and_then(Value::as_str) {
            Some(declared) => {
                let resolved = join_uri(base, declared)?;
                let mut child_base = resolved.clone();
                child_base.set_fragment(None);
                self.bases.insert(strip_fragment(&resolved));
                // Children of an anchored node are identified under the anchor.
                let anchor = resolved
                    .fragment()
                    .filter(|fragment| !fragment.is_empty() && !fragment.starts_with('/'))
                    .unwrap_or_default()
                    .to_string();
                (
                    child_base,
                    anchor,
                    normalize_id(resolved.as_str()),
                    IdSource::Explicit,
                )
            }
            None if root => (
                base.clone(),
                pointer.to_string(),
                self.doc_uri.clone(),
                IdSource::Document,
            ),
            None => (
                base.clone(),
                pointer.to_string(),
                self.synthesized_id(base, pointer),
                IdSource::Synthesized,
            ),
        };
        let base = &base;
        let pointer = pointer.as_str();

        // Definitions next to a `$ref` are still addressable.
        let mut definitions = BTreeMap::new();
        for keyword in ["$defs", "definitions"] {
            if let Some(defs) = object.get(keyword) {
                let defs = defs.as_object().ok_or_else(|| {
                    Error::InvalidSchema(format!("{keyword} must be an object at {id}"))
                })?;
                for (name, value) in defs {
                    let segment = format!("/{keyword}/{}", escape_pointer(name));
                    let child = self.child(value, base, pointer, doc_pointer, &segment)?;
                    definitions.insert(name.clone(), child);
                }
            }
        }

        if let Some(reference) = object.get("$ref") {
            let reference = reference.as_str().ok_or_else(|| {
                Error::InvalidSchema(format!("$ref must be a string at {id}"))
            })?;
            let target = normalize_id(join_uri(base, reference)?.as_str());
            self.references.insert(target.clone());
            let schema = Schema {
                id,
                id_source,
                reference: Some(target),
                description: string_field(object, "description"),
                definitions,
                ..Schema::default()
            };
            return Ok(self.register(schema, doc_pointer));
        }

        let (kind, nullable) = decode_type(object.get("type"), &id)?;

        let mut properties = BTreeMap::new();
        if let Some(props) = object.get("properties") {
            let props = props.as_object().ok_or_else(|| {
                Error::InvalidSchema(format!("properties must be an object at {id}"))
            })?;
            for (name, value) in props {
                let segment = format!("/properties/{}", escape_pointer(name));
                let child = self.child(value, base, pointer, doc_pointer, &segment)?;
                properties.insert(name.clone(), child);
            }
        }

        let required = match object.get("required") {
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().map(str::to_string).ok_or_else(|| {
                        Error::InvalidSchema(format!("required entries must be strings at {id}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(Error::InvalidSchema(format!(
                    "required must be an array at {id}"
                )));
            }
            None => Vec::new(),
        };

        let additional_properties = match object.get("additionalProperties") {
            Some(Value::Bool(allowed)) => Some(AdditionalProperties::Allowed(*allowed)),
            Some(value) => Some(AdditionalProperties::Schema(self.child(
                value,
                base,
                pointer,
                doc_pointer,
                "/additionalProperties",
            )?)),
            None => None,
        };

        let items = if let Some(prefix) = object.get("prefixItems") {
            Some(Items::Tuple(self.children(
                prefix,
                base,
                pointer,
                doc_pointer,
                "prefixItems",
                &id,
            )?))
        } else {
            match object.get("items") {
                Some(Value::Array(_)) => Some(Items::Tuple(self.children(
                    &object["items"],
                    base,
                    pointer,
                    doc_pointer,
                    "items",
                    &id,
                )?)),
                Some(value) => Some(Items::Single(self.child(
                    value,
                    base,
                    pointer,
                    doc_pointer,
                    "/items",
                )?)),
                None => None,
            }
        };

        let all_of = match object.get("allOf") {
            Some(value) => self.children(value, base, pointer, doc_pointer, "allOf", &id)?,
            None => Vec::new(),
        };
        let one_of = match object.get("oneOf") {
            Some(value) => self.children(value, base, pointer, doc_pointer, "oneOf", &id)?,
            None => Vec::new(),
        };

        let enum_values = match (object.get("enum"), object.get("const")) {
            (Some(Value::Array(values)), _) => values.clone(),
            (Some(_), _) => {
                return Err(Error::InvalidSchema(format!("enum must be an array at {id}")));
            }
            (None, Some(value)) => vec![value.clone()],
            (None, None) => Vec::new(),
        };

        let constraints = decode_constraints(object, &id)?;
        let extension = self.decode_extension(object, base, &id)?;

        let schema = Schema {
            id,
            id_source,
            reference: None,
            kind,
            nullable,
            title: string_field(object, "title"),
            description: string_field(object, "description"),
            properties,
            required,
            additional_properties,
            items,
            all_of,
            one_of,
            definitions,
            enum_values,
            constraints,
            extension,
        };

        Ok(self.register(schema, doc_pointer))
    }

    fn child(
        &mut self,
        value: &Value,
        base: &Url,
        pointer: &str,
        doc_pointer: &str,
        segment: &str,
    ) -> Result<Arc<Schema>> {
        self.node(
            value,
            base,
            &format!("{pointer}{segment}"),
            &format!("{doc_pointer}{segment}"),
            false,
        )
    }

    fn children(
        &mut self,
        value: &Value,
        base: &Url,
        pointer: &str,
        doc_pointer: &str,
        keyword: &str,
        id: &str,
    ) -> Result<Vec<Arc<Schema>>> {
        let values = value.as_array().ok_or_else(|| {
            Error::InvalidSchema(format!("{keyword} must be an array at {id}"))
        })?;
        values
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                let segment = format!("/{keyword}/{idx}");
                self.child(value, base, pointer, doc_pointer, &segment)
            })
            .collect()
    }

    fn synthesized_id(&self, base: &Url, pointer: &str) -> String {
        let base = strip_fragment(base);
        if pointer.is_empty() {
            base
        } else {
            format!("{base}#{pointer}")
        }
    }

    fn register(&mut self, schema: Schema, doc_pointer: &str) -> Arc<Schema> {
        let schema = Arc::new(schema);
        let alias = if doc_pointer.is_empty() {
            self.doc_uri.clone()
        } else {
            format!("{}#{}", self.doc_uri, doc_pointer)
        };
        self.nodes.insert(schema.id.clone(), Arc::clone(&schema));
        self.nodes.entry(alias).or_insert_with(|| Arc::clone(&schema));
        schema
    }

    fn decode_extension(
        &mut self,
        object: &Map<String, Value>,
        base: &Url,
        id: &str,
    ) -> Result<Extension> {
        let raw = match object.get(EXTENSION_KEYWORD) {
            Some(value) => serde_json::from_value::<RawExtension>(value.clone()).map_err(|err| {
                Error::InvalidSchema(format!("invalid {EXTENSION_KEYWORD} at {id}: {err}"))
            })?,
            None => RawExtension {
                type_path: None,
                discriminator: None,
                exclude: false,
                no_validate: false,
            },
        };

        let raw_discriminator = match (raw.discriminator, object.get("discriminator")) {
            (Some(discriminator), _) => Some(discriminator),
            (None, Some(value)) => Some(
                serde_json::from_value::<RawDiscriminator>(value.clone()).map_err(|err| {
                    Error::InvalidSchema(format!("invalid discriminator at {id}: {err}"))
                })?,
            ),
            (None, None) => None,
        };

        let discriminator = match raw_discriminator {
            Some(raw) => {
                let mut mapping = BTreeMap::new();
                for (value, reference) in raw.mapping {
                    let target = normalize_id(join_uri(base, &reference)?.as_str());
                    self.references.insert(target.clone());
                    mapping.insert(value, target);
                }
                Some(Discriminator {
                    property: raw.property,
                    mapping,
                })
            }
            None => None,
        };

        Ok(Extension {
            type_path: raw.type_path,
            discriminator,
            exclude: raw.exclude,
            no_validate: raw.no_validate,
        })
    }
}

fn decode_type(value: Option<&Value>, id: &str) -> Result<(PrimitiveKind, bool)> {
    let parse = |name: &Value| {
        name.as_str()
            .and_then(PrimitiveKind::from_name)
            .ok_or_else(|| Error::InvalidSchema(format!("unknown type {name} at {id}")))
    };

    match value {
        None => Ok((PrimitiveKind::Unknown, false)),
        Some(Value::Array(names)) => {
            let kinds = names.iter().map(parse).collect::<Result<Vec<_>>>()?;
            let nullable = kinds.contains(&PrimitiveKind::Null);
            let concrete: Vec<_> = kinds
                .into_iter()
                .filter(|kind| *kind != PrimitiveKind::Null)
                .collect();
            match concrete.as_slice() {
                [] if nullable => Ok((PrimitiveKind::Null, false)),
                [] => Ok((PrimitiveKind::Unknown, false)),
                [kind] => Ok((*kind, nullable)),
                _ => Err(Error::Unsupported(format!(
                    "multiple non-null types at {id}"
                ))),
            }
        }
        Some(name) => Ok((parse(name)?, false)),
    }
}

fn decode_constraints(object: &Map<String, Value>, id: &str) -> Result<Constraints> {
    let unsigned = |key: &str| -> Result<Option<u64>> {
        match object.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                Error::InvalidSchema(format!("{key} must be a non-negative integer at {id}"))
            }),
        }
    };
    let number = |key: &str| -> Result<Option<f64>> {
        match object.get(key) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                Error::InvalidSchema(format!("{key} must be a number at {id}"))
            }),
        }
    };

    let mut constraints = Constraints {
        pattern: string_field(object, "pattern"),
        min_length: unsigned("minLength")?,
        max_length: unsigned("maxLength")?,
        minimum: number("minimum")?,
        maximum: number("maximum")?,
        multiple_of: number("multipleOf")?,
        min_items: unsigned("minItems")?,
        max_items: unsigned("maxItems")?,
        unique_items: object
            .get("uniqueItems")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        min_properties: unsigned("minProperties")?,
        max_properties: unsigned("maxProperties")?,
        format: string_field(object, "format"),
        ..Constraints::default()
    };

    // Draft 4 uses boolean flags; draft 6 and later carry the bound itself.
    match object.get("exclusiveMinimum") {
        Some(Value::Bool(flag)) => constraints.exclusive_minimum = *flag,
        Some(value) => {
            constraints.minimum = value.as_f64();
            constraints.exclusive_minimum = true;
        }
        None => {}
    }
    match object.get("exclusiveMaximum") {
        Some(Value::Bool(flag)) => constraints.exclusive_maximum = *flag,
        Some(value) => {
            constraints.maximum = value.as_f64();
            constraints.exclusive_maximum = true;
        }
        None => {}
    }

    Ok(constraints)
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn kind_name(value: &Value) -> &'static str {
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
    use serde_json::json;

    #[test]
    fn synthesizes_identities_from_pointers() {
        let doc = decode_document(
            "file:///schemas/widget.json",
            &json!({
                "type": "object",
                "properties": {
                    "count": { "type": "integer" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            }),
        )
        .expect("decode");

        assert_eq!(doc.root.id, "file:///schemas/widget.json");
        assert_eq!(doc.root.id_source, IdSource::Document);
        let count = &doc.root.properties["count"];
        assert_eq!(count.id, "file:///schemas/widget.json#/properties/count");
        assert_eq!(count.kind, PrimitiveKind::Integer);
        assert!(
            doc.nodes
                .contains_key("file:///schemas/widget.json#/properties/tags/items")
        );
    }

    #[test]
    fn explicit_id_rebases_children() {
        let doc = decode_document(
            "file:///schemas/a.json",
            &json!({
                "$id": "pkg#Widget",
                "type": "object",
                "properties": { "count": { "type": "integer" } }
            }),
        )
        .expect("decode");

        assert_eq!(doc.root.id, "file:///schemas/pkg#Widget");
        assert_eq!(doc.root.id_source, IdSource::Explicit);
        assert_eq!(
            doc.root.properties["count"].id,
            "file:///schemas/pkg#Widget/properties/count"
        );
        assert!(doc.nodes.contains_key("file:///schemas/a.json"));
        assert!(doc.external_refs.is_empty());
    }

    #[test]
    fn collects_external_references() {
        let doc = decode_document(
            "file:///schemas/a.json",
            &json!({
                "type": "object",
                "properties": {
                    "local": { "$ref": "#/definitions/Local" },
                    "remote": { "$ref": "c.json#/definitions/Thing" }
                },
                "definitions": { "Local": { "type": "string" } }
            }),
        )
        .expect("decode");

        assert_eq!(
            doc.root.properties["local"].reference.as_deref(),
            Some("file:///schemas/a.json#/definitions/Local")
        );
        assert_eq!(
            doc.external_refs.iter().collect::<Vec<_>>(),
            vec!["file:///schemas/c.json"]
        );
    }

    #[test]
    fn nullable_type_arrays_and_exclusive_bounds() {
        let doc = decode_document(
            "file:///n.json",
            &json!({
                "type": ["integer", "null"],
                "exclusiveMinimum": 0,
                "maximum": 10,
                "exclusiveMaximum": false
            }),
        )
        .expect("decode");

        assert_eq!(doc.root.kind, PrimitiveKind::Integer);
        assert!(doc.root.nullable);
        assert_eq!(doc.root.constraints.minimum, Some(0.0));
        assert!(doc.root.constraints.exclusive_minimum);
        assert!(!doc.root.constraints.exclusive_maximum);
    }

    #[test]
    fn reads_extension_and_openapi_discriminator() {
        let doc = decode_document(
            "file:///u.json",
            &json!({
                "oneOf": [{ "$ref": "#/definitions/Cat" }],
                "discriminator": {
                    "propertyName": "kind",
                    "mapping": { "cat": "#/definitions/Cat" }
                },
                "x-schemaforge": { "type": "pets.Pet", "noValidate": true },
                "definitions": { "Cat": { "type": "object" } }
            }),
        )
        .expect("decode");

        let extension = &doc.root.extension;
        assert_eq!(extension.type_path.as_deref(), Some("pets.Pet"));
        assert!(extension.no_validate);
        let discriminator = extension.discriminator.as_ref().expect("discriminator");
        assert_eq!(discriminator.property, "kind");
        assert_eq!(
            discriminator.mapping["cat"],
            "file:///u.json#/definitions/Cat"
        );
    }

    #[test]
    fn rejects_false_schema() {
        let err = decode_document("file:///f.json", &json!({ "items": false }))
            .expect_err("false schema");
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
