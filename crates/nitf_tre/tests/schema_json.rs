use nitf_tre::error::{ErrorCategory, Result};
use nitf_tre::{EntryKind, Length, LoopCount, Registry, SchemaEntry, SchemaSet};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

fn registry() -> Registry {
    let sets: Vec<SchemaSet> = serde_json::from_str(include_str!("../resources/schemas.json"))
        .expect("schema resource should parse");
    sets.into_iter().collect()
}

#[test]
fn entries_deserialize() {
    let entry: SchemaEntry =
        serde_json::from_str(r#"{ "kind": { "loop": { "constant": 3 } }, "expr": "- 1" }"#)
            .unwrap();
    assert_eq!(entry.kind, EntryKind::Loop(LoopCount::Constant(3)));
    assert_eq!(entry.expr.as_deref(), Some("- 1"));
    assert_eq!(entry.name, "");

    let entry: SchemaEntry = serde_json::from_str(
        r#"{ "name": "DATA", "kind": { "field": "binary" }, "length": "conditional" }"#,
    )
    .unwrap();
    assert_eq!(entry, SchemaEntry::conditional("DATA", nitf_tre::FieldType::Binary));
    assert_eq!(entry.length, Length::Conditional);
}

#[traced_test]
#[test]
fn decode_with_loaded_schemas() -> Result<()> {
    let registry = registry();
    assert_eq!(registry.len(), 3);

    let data = b"01RED02\xAA\xBBYgood";
    let mut record = registry.record("BANDTA", Some(data.len()))?;
    record.decode_slice(data)?;
    assert_eq!(record.field("DATA[0]").unwrap().as_bytes(), &[0xAA, 0xBB]);
    assert_eq!(record.field("NOTE").unwrap().as_str(), "good");
    assert_eq!(record.to_bytes()?, data.to_vec());

    let mut record = registry.record("BANDTA", None)?;
    record.decode_slice(b"00N")?;
    assert!(!record.contains("NOTE"));
    assert!(record.is_sane());
    Ok(())
}

#[test]
fn default_layout_lends_its_length() -> Result<()> {
    let registry = registry();
    let record = registry.record("VERSNA", None)?;
    assert_eq!(record.layout().name, "VERSNA_V2");
    assert_eq!(record.declared_length(), Some(6));

    let record = registry.record("VERSNA", Some(4))?;
    assert_eq!(record.layout().name, "VERSNA_V1");
    Ok(())
}

#[test]
fn unknown_tag() {
    let err = registry().record("NOPE00", None).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NoMatchingSchema);
}
