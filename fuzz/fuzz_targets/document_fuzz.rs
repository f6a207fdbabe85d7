//! Fuzz test for schema validation and key extraction
//!
//! Feeds arbitrary JSON objects through a cities-like entity schema to find
//! panics and broken invariants in validation, projection and keying.
//!
//! Run with: cargo +nightly fuzz run document_fuzz -- -max_total_time=60

#![no_main]

use gazetteer_core::{normalize_str, AttributeSchema, Document, EntitySchema, FieldType};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(document) = serde_json::from_slice::<Document>(data) else {
        return;
    };

    let attributes = AttributeSchema::new()
        .field("name", FieldType::String)
        .field("state", FieldType::String)
        .field("nation", FieldType::String)
        .field("population", FieldType::Float);
    let Ok(schema) = EntitySchema::new(attributes, &["name", "state"]) else {
        panic!("Static schema must resolve");
    };

    if schema.validate(&document).is_err() {
        return;
    }

    let projected = schema.project(&document);

    // 1. Projection keeps only declared, non-null fields
    for (name, value) in &projected {
        assert!(schema.attributes().contains(name), "Undeclared field {} kept", name);
        assert!(!value.is_null(), "Null kept for {}", name);
    }

    // 2. Projection is idempotent
    assert_eq!(schema.project(&projected), projected);

    // 3. Key strings are normalized
    for field in schema.key_fields() {
        if let Some(Value::String(s)) = projected.get(field) {
            assert_eq!(&normalize_str(s), s, "Key field {} not normalized", field);
        }
    }

    // 4. Key arity always equals the number of key fields
    assert_eq!(schema.key_of(&projected).arity(), schema.key_fields().len());
});
