use medsynth_core::{
    CardinalityPolicy, CrossFieldConstraint, DatasetSchema, FieldType, GenerationRule,
    PopulationPredicate, SchemaError, SchemaRegistry, hospital_schema,
};
use schemars::schema_for;

#[test]
fn hospital_schema_roundtrips_through_json() {
    let schema = hospital_schema();
    let json = serde_json::to_string_pretty(&schema).expect("serialize schema");
    let parsed: DatasetSchema = serde_json::from_str(&json).expect("parse schema");

    assert_eq!(parsed, schema);
    let registry = SchemaRegistry::from_schema(parsed).expect("registry from parsed schema");
    assert_eq!(registry.len(), 8);
}

#[test]
fn tagged_variants_use_snake_case() {
    let schema = hospital_schema();
    let json = serde_json::to_value(&schema).expect("serialize schema");
    let tables = json["tables"].as_array().expect("tables array");

    let vitals = tables
        .iter()
        .find(|table| table["name"] == "vital_signs")
        .expect("vital_signs table");
    let temperature = vitals["fields"]
        .as_array()
        .expect("fields")
        .iter()
        .find(|field| field["name"] == "temperature_c")
        .expect("temperature field");

    assert_eq!(temperature["rule"]["kind"], "float_range");
    assert_eq!(temperature["populate_when"]["kind"], "parent_field_in");
    assert_eq!(temperature["populate_when"]["values"][0], "Thermometer");
    assert_eq!(temperature["nullable"], true);

    let fks = vitals["foreign_keys"].as_array().expect("foreign keys");
    assert_eq!(fks[0]["cardinality"]["policy"], "per_parent");
    assert_eq!(fks[1]["cardinality"]["policy"], "independent");
}

#[test]
fn minimal_schema_parses_with_defaults() {
    let json = serde_json::json!({
        "schema_version": "0.1",
        "name": "clinic",
        "tables": [
            {
                "name": "rooms",
                "domain": "operational",
                "primary_key": "room_id",
                "fields": [
                    {"name": "room_id", "field_type": "string_id", "rule": {"kind": "sequence", "prefix": "R", "width": 2}}
                ]
            },
            {
                "name": "visits",
                "domain": "clinical",
                "primary_key": "visit_id",
                "fields": [
                    {"name": "visit_id", "field_type": "string_id", "rule": {"kind": "uuid"}},
                    {"name": "room_id", "field_type": "string_id", "rule": {"kind": "foreign_key"}},
                    {"name": "start", "field_type": "date", "rule": {"kind": "date_range", "min": "2024-01-01", "max": "2024-06-30"}},
                    {"name": "end", "field_type": "date", "rule": {"kind": "date_range", "min": "2024-01-01", "max": "2024-12-31", "not_before": "start"}}
                ],
                "foreign_keys": [
                    {"field": "room_id", "references_table": "rooms", "references_field": "room_id"}
                ],
                "constraints": [
                    {"kind": "field_order", "earlier": "start", "later": "end"}
                ]
            }
        ]
    });

    let schema: DatasetSchema = serde_json::from_value(json).expect("parse schema");
    let visits = &schema.tables[1];
    assert_eq!(visits.foreign_keys[0].cardinality, CardinalityPolicy::Independent);
    assert_eq!(
        visits.constraints[0],
        CrossFieldConstraint::FieldOrder {
            earlier: "start".to_string(),
            later: "end".to_string(),
            strict: false,
        }
    );
    assert!(!visits.fields[0].nullable);
    assert_eq!(visits.fields[2].field_type, FieldType::Date);

    let registry = SchemaRegistry::from_schema(schema).expect("valid schema");
    assert_eq!(registry.name(), "clinic");
    assert_eq!(registry.graph().topological_order(), &["rooms", "visits"]);
}

#[test]
fn declaration_order_does_not_matter_for_bulk_construction() {
    let mut schema = hospital_schema();
    schema.tables.reverse();
    let registry = SchemaRegistry::from_schema(schema).expect("registry");

    let order = registry.graph().topological_order();
    let position = |name: &str| order.iter().position(|table| table == name).unwrap();
    assert!(position("wards") < position("staff_assignments"));
    assert!(position("devices") < position("vital_signs"));
    assert!(position("admissions") < position("diagnoses"));
}

#[test]
fn parent_predicate_must_reference_a_parent_field() {
    let mut schema = hospital_schema();
    let vitals = schema
        .tables
        .iter_mut()
        .find(|table| table.name == "vital_signs")
        .unwrap();
    let spo2 = vitals
        .fields
        .iter_mut()
        .find(|field| field.name == "spo2")
        .unwrap();
    spo2.populate_when = Some(PopulationPredicate::ParentFieldIn {
        foreign_key: "device_id".to_string(),
        field: "colour".to_string(),
        values: vec!["red".to_string()],
    });

    let err = SchemaRegistry::from_schema(schema).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidSchema(message) if message.contains("colour")));
}

#[test]
fn foreign_key_must_target_primary_key() {
    let mut schema = hospital_schema();
    let devices = schema
        .tables
        .iter_mut()
        .find(|table| table.name == "devices")
        .unwrap();
    devices.foreign_keys[0].references_field = "ward_name".to_string();

    let err = SchemaRegistry::from_schema(schema).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidSchema(message) if message.contains("primary key")));
}

#[test]
fn json_schema_describes_rules() {
    let generated = schema_for!(DatasetSchema);
    let json = serde_json::to_value(&generated).expect("serialize json schema");
    let text = json.to_string();

    assert!(text.contains("timestamp_range"));
    assert!(text.contains("parent_field_in"));
    assert!(text.contains("email_matches_name"));

    let rule = GenerationRule::OffsetDays {
        base: "a".to_string(),
        days: "b".to_string(),
    };
    assert_eq!(rule.dependencies(), vec!["a", "b"]);
}
