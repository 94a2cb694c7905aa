use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::document::{normalize_id, Document};
use crate::error::{Error, Result};
use crate::schema::Schema;

/// Upper bound on `$ref` hops followed for a single node.
const MAX_REFERENCE_DEPTH: usize = 64;

/// Resolves absolute schema identities to loaded nodes.
pub trait Resolver: Send + Sync {
    /// Look up the node identified by `uri`.
    fn resolve(&self, uri: &str) -> Option<Arc<Schema>>;
}

/// Thread-safe index of every node of every loaded document.
#[derive(Debug, Default)]
pub struct SchemaStore {
    nodes: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index all nodes of a decoded document.
    ///
    /// Fails without inserting anything when another document already
    /// declared one of its identities. Inserting the same document again
    /// is a no-op.
    pub fn insert_document(&self, document: &Document) -> Result<()> {
        let mut nodes = self
            .nodes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (id, schema) in &document.nodes {
            if let Some(existing) = nodes.get(id) {
                if !Arc::ptr_eq(existing, schema) {
                    return Err(Error::InvalidSchema(format!(
                        "{id} is declared by {} and by another loaded document",
                        document.uri
                    )));
                }
            }
        }

        for (id, schema) in &document.nodes {
            nodes.insert(id.clone(), Arc::clone(schema));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Resolver for SchemaStore {
    fn resolve(&self, uri: &str) -> Option<Arc<Schema>> {
        self.nodes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&normalize_id(uri))
            .cloned()
    }
}

/// Follow `$ref` links until a node with content is reached.
pub fn dereference(resolver: &dyn Resolver, schema: &Arc<Schema>) -> Result<Arc<Schema>> {
    let mut current = Arc::clone(schema);
    for _ in 0..MAX_REFERENCE_DEPTH {
        let Some(target) = current.reference.as_deref() else {
            return Ok(current);
        };
        current = resolver
            .resolve(target)
            .ok_or_else(|| Error::DanglingReference(target.to_string()))?;
    }
    Err(Error::InvalidSchema(format!(
        "reference chain starting at {} does not terminate",
        schema.id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::decode_document;
    use serde_json::json;

    #[test]
    fn dereferences_chains_across_documents() {
        let store = SchemaStore::new();
        let a = decode_document(
            "file:///a.json",
            &json!({ "properties": { "b": { "$ref": "b.json" } } }),
        )
        .expect("decode a");
        let b = decode_document(
            "file:///b.json",
            &json!({
                "$ref": "#/definitions/B",
                "definitions": { "B": { "type": "string" } }
            }),
        )
        .expect("decode b");
        store.insert_document(&a).expect("insert a");

        let property = Arc::clone(&a.root.properties["b"]);
        let dangling = dereference(&store, &property).expect_err("b.json not loaded yet");
        assert!(matches!(dangling, Error::DanglingReference(_)));

        store.insert_document(&b).expect("insert b");
        let resolved = dereference(&store, &property).expect("resolve through b.json");
        assert_eq!(resolved.id, "file:///b.json#/definitions/B");
    }

    #[test]
    fn resolves_local_definitions() {
        let store = SchemaStore::new();
        let doc = decode_document(
            "file:///a.json",
            &json!({
                "properties": { "b": { "$ref": "#/definitions/B" } },
                "definitions": { "B": { "type": "string" } }
            }),
        )
        .expect("decode");
        store.insert_document(&doc).expect("insert");

        let resolved = dereference(&store, &doc.root.properties["b"]).expect("resolve");
        assert_eq!(resolved.id, "file:///a.json#/definitions/B");
    }

    #[test]
    fn detects_reference_cycles() {
        let store = SchemaStore::new();
        let doc = decode_document(
            "file:///a.json",
            &json!({
                "definitions": {
                    "A": { "$ref": "#/definitions/B" },
                    "B": { "$ref": "#/definitions/A" }
                }
            }),
        )
        .expect("decode");
        store.insert_document(&doc).expect("insert");

        let err = dereference(&store, &doc.root.definitions["A"]).expect_err("cycle");
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn rejects_identities_declared_by_two_documents() {
        let store = SchemaStore::new();
        let first = decode_document(
            "file:///schemas/a.json",
            &json!({ "$id": "shared.json", "type": "object" }),
        )
        .expect("decode a");
        let second = decode_document(
            "file:///schemas/b.json",
            &json!({ "$id": "shared.json", "type": "string" }),
        )
        .expect("decode b");

        store.insert_document(&first).expect("insert a");
        store.insert_document(&first).expect("insert a again");
        let err = store.insert_document(&second).expect_err("conflicting id");
        assert!(matches!(err, Error::InvalidSchema(_)));

        let kept = store.resolve("file:///schemas/shared.json").expect("shared");
        assert!(Arc::ptr_eq(&kept, &first.nodes["file:///schemas/shared.json"]));
        assert!(store.resolve("file:///schemas/b.json").is_none());
    }
}
