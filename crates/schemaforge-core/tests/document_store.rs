use std::sync::Arc;

use schemaforge_core::{
    decode_document, dereference, validate_document, Items, PrimitiveKind, Resolver, SchemaStore,
};
use serde_json::json;

#[test]
fn store_resolves_nodes_across_documents() {
    let store = SchemaStore::new();
    let order = decode_document(
        "file:///schemas/order.json",
        &json!({
            "type": "object",
            "properties": {
                "lines": { "type": "array", "items": { "$ref": "line.json" } }
            }
        }),
    )
    .expect("decode order");
    let line = decode_document(
        "file:///schemas/line.json",
        &json!({
            "type": "object",
            "properties": { "sku": { "type": "string", "pattern": "^[A-Z]+$" } }
        }),
    )
    .expect("decode line");

    validate_document(&order).expect("order is consistent");
    validate_document(&line).expect("line is consistent");
    assert_eq!(
        order.external_refs.iter().collect::<Vec<_>>(),
        vec!["file:///schemas/line.json"]
    );

    store.insert_document(&order).expect("insert order");
    store.insert_document(&line).expect("insert line");
    assert!(!store.is_empty());

    let lines = store
        .resolve("file:///schemas/order.json#/properties/lines")
        .expect("lines node");
    let Some(Items::Single(item)) = &lines.items else {
        panic!("expected single items schema");
    };
    let resolved = dereference(&store, item).expect("dereference line");
    assert_eq!(resolved.id, "file:///schemas/line.json");
    assert_eq!(resolved.effective_kind(), PrimitiveKind::Object);
    assert!(Arc::ptr_eq(
        &resolved,
        &store.resolve("file:///schemas/line.json#").expect("root by trailing fragment")
    ));
}
