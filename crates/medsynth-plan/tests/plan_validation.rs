use std::fs;
use std::path::{Path, PathBuf};

use medsynth_core::{CardinalityPolicy, SchemaRegistry};
use medsynth_plan::{
    PlanError, load_plan, load_schema, plan_json_schema_value, read_document, validate_plan,
    validate_plan_json,
};

fn shipped_plan() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../plans/hospital.plan.toml")
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("medsynth-plan-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::hospital().expect("hospital registry")
}

#[test]
fn shipped_plan_validates() {
    let validated = load_plan(&shipped_plan(), &registry()).expect("shipped plan is valid");
    assert!(validated.warnings.is_empty(), "unexpected warnings");

    let targets = validated.plan.target_rows();
    assert_eq!(targets["wards"], 10);
    assert_eq!(targets["vital_signs"], 2000);
    assert_eq!(validated.plan.max_attempts_row(), Some(50));
}

#[test]
fn toml_and_json_documents_agree() {
    let toml_value = read_document(&shipped_plan()).expect("read toml plan");

    let dir = temp_dir();
    let json_path = dir.join("plan.json");
    fs::write(
        &json_path,
        serde_json::to_string_pretty(&toml_value).expect("serialize plan"),
    )
    .expect("write json plan");

    let json_value = read_document(&json_path).expect("read json plan");
    assert_eq!(json_value, toml_value);
    fs::remove_dir_all(dir).ok();
}

#[test]
fn structural_errors_carry_json_pointers() {
    let plan_schema = plan_json_schema_value().expect("plan schema");
    let plan_json = serde_json::json!({
        "plan_version": "0.1",
        "seed": "not-a-number",
        "targets": [{"table": "wards", "rows": 1}],
        "unexpected": true
    });

    let report = validate_plan_json(&plan_json, &plan_schema).expect("schema compiles");
    assert!(!report.is_ok());
    assert!(report.errors.iter().any(|issue| issue.path == "/seed"));
    assert!(report.errors.iter().all(|issue| issue.code == "schema_violation"));
}

#[test]
fn unknown_tables_are_reported() {
    let plan_schema = plan_json_schema_value().expect("plan schema");
    let plan_json = serde_json::json!({
        "plan_version": "0.1",
        "seed": 1,
        "targets": [
            {"table": "wards", "rows": 2},
            {"table": "patients", "rows": 2},
            {"table": "staff", "rows": 2},
            {"table": "pharmacy", "rows": 5}
        ]
    });

    let report = validate_plan(&plan_json, &plan_schema, &registry()).unwrap_err();
    let issue = report
        .errors
        .iter()
        .find(|issue| issue.code == "unknown_table")
        .expect("unknown_table issue");
    assert_eq!(issue.path, "/targets/3/table");
}

#[test]
fn cardinality_overrides_reach_the_registry() {
    let plan_schema = plan_json_schema_value().expect("plan schema");
    let plan_json = serde_json::json!({
        "plan_version": "0.1",
        "seed": 9,
        "targets": [
            {"table": "wards", "rows": 1},
            {"table": "patients", "rows": 3},
            {"table": "staff", "rows": 3}
        ],
        "cardinality": [
            {"table": "staff_assignments", "foreign_key": "ward_id", "min": 3, "max": 3}
        ]
    });

    let validated =
        validate_plan(&plan_json, &plan_schema, &registry()).expect("plan validates");
    let adjusted = validated
        .plan
        .apply_cardinality(&registry())
        .expect("apply overrides");
    let assignments = adjusted.lookup("staff_assignments").expect("table");
    assert_eq!(
        assignments
            .foreign_key("ward_id")
            .expect("ward fk")
            .cardinality,
        CardinalityPolicy::PerParent { min: 3, max: 3 }
    );
}

#[test]
fn invalid_plan_file_surfaces_report() {
    let dir = temp_dir();
    let path = dir.join("broken.plan.toml");
    fs::write(
        &path,
        "plan_version = \"0.1\"\nseed = 1\n\n[[targets]]\ntable = \"wards\"\nrows = 0\n",
    )
    .expect("write plan");

    let err = load_plan(&path, &registry()).unwrap_err();
    match err {
        PlanError::Invalid(report) => {
            assert!(report.has_code("rows_zero"));
            assert!(report.has_code("missing_target"));
        }
        other => panic!("unexpected error: {other}"),
    }
    fs::remove_dir_all(dir).ok();
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = temp_dir();
    let path = dir.join("plan.yaml");
    fs::write(&path, "seed: 1").expect("write plan");

    let err = read_document(&path).unwrap_err();
    assert!(matches!(err, PlanError::UnsupportedFormat(ext) if ext == "yaml"));
    fs::remove_dir_all(dir).ok();
}

#[test]
fn schema_documents_load_into_a_registry() {
    let dir = temp_dir();
    let path = dir.join("hospital.schema.json");
    let schema = medsynth_core::hospital_schema();
    fs::write(
        &path,
        serde_json::to_string(&schema).expect("serialize schema"),
    )
    .expect("write schema");

    let registry = load_schema(&path).expect("load schema");
    assert_eq!(registry.len(), 8);
    fs::remove_dir_all(dir).ok();
}
