use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use medsynth_core::{SchemaRegistry, vocabulary};
use medsynth_eval::{
    ViolationKind, load_dataset_csv, render_report, validate, validate_with_summary,
};
use medsynth_generate::{CsvSink, Dataset, GeneratedValue, TableRows, generate};

fn registry() -> SchemaRegistry {
    SchemaRegistry::hospital().expect("hospital registry")
}

fn dataset(registry: &SchemaRegistry) -> Dataset {
    let targets: BTreeMap<String, u64> = [
        ("wards", 3),
        ("patients", 15),
        ("staff", 5),
        ("admissions", 20),
        ("vital_signs", 120),
    ]
    .into_iter()
    .map(|(table, rows)| (table.to_string(), rows))
    .collect();
    generate(registry, &targets, 42).expect("dataset")
}

fn table_mut<'d>(dataset: &'d mut Dataset, name: &str) -> &'d mut TableRows {
    dataset
        .tables
        .iter_mut()
        .find(|table| table.name == name)
        .expect("table present")
}

fn set(table: &mut TableRows, row: usize, field: &str, value: GeneratedValue) {
    let idx = table
        .fields
        .iter()
        .position(|name| name == field)
        .expect("field present");
    table.rows[row].set(idx, value);
}

fn text(value: &str) -> GeneratedValue {
    GeneratedValue::Text(value.to_string())
}

fn kinds(violations: &[medsynth_eval::Violation]) -> BTreeSet<ViolationKind> {
    violations.iter().map(|violation| violation.kind).collect()
}

#[test]
fn generated_dataset_is_clean() {
    let registry = registry();
    let dataset = dataset(&registry);

    let violations = validate(&dataset, &registry);
    assert!(violations.is_empty(), "unexpected violations: {violations:?}");

    let outcome = validate_with_summary(&dataset, &registry);
    assert!(outcome.is_clean());
    assert_eq!(outcome.summary.tables.len(), registry.len());
    assert_eq!(outcome.summary.rows_checked, dataset.total_rows());
}

#[test]
fn validation_is_idempotent() {
    let registry = registry();
    let mut dataset = dataset(&registry);
    set(table_mut(&mut dataset, "wards"), 0, "floor", GeneratedValue::Int(99));

    let first = validate(&dataset, &registry);
    let second = validate(&dataset, &registry);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn corrupted_values_are_reported() {
    let registry = registry();
    let mut dataset = dataset(&registry);

    set(table_mut(&mut dataset, "wards"), 0, "floor", GeneratedValue::Int(99));
    set(
        table_mut(&mut dataset, "admissions"),
        0,
        "patient_id",
        text("P999999"),
    );
    {
        let admissions = table_mut(&mut dataset, "admissions");
        let admit = admissions.rows[1].get("admit_ts").cloned().expect("admit_ts");
        let earlier = match admit {
            GeneratedValue::Timestamp(stamp) => {
                GeneratedValue::Timestamp(stamp - chrono::Duration::days(1))
            }
            other => panic!("unexpected admit_ts {other:?}"),
        };
        set(admissions, 1, "discharge_ts", earlier);
    }

    let violations = validate(&dataset, &registry);
    let found = kinds(&violations);
    assert!(found.contains(&ViolationKind::Domain));
    assert!(found.contains(&ViolationKind::ForeignKey));
    assert!(found.contains(&ViolationKind::CrossField));

    let floor = violations
        .iter()
        .find(|violation| violation.kind == ViolationKind::Domain)
        .expect("domain violation");
    assert_eq!(floor.table, "wards");
    assert_eq!(floor.row_index, Some(0));
    assert_eq!(floor.row_id.as_deref(), Some("W001"));
    assert_eq!(floor.fields, vec!["floor".to_string()]);
    assert_eq!(floor.rule, "int_range");

    let broken = violations
        .iter()
        .find(|violation| violation.kind == ViolationKind::ForeignKey)
        .expect("fk violation");
    assert_eq!(broken.table, "admissions");
    assert_eq!(broken.fields, vec!["patient_id".to_string()]);
}

#[test]
fn duplicate_keys_and_missing_tables_are_reported() {
    let registry = registry();
    let mut dataset = dataset(&registry);

    let patients = table_mut(&mut dataset, "patients");
    let first_id = patients.rows[0].get("patient_id").cloned().expect("patient_id");
    set(patients, 1, "patient_id", first_id);
    dataset.tables.retain(|table| table.name != "diagnoses");

    let violations = validate(&dataset, &registry);
    let found = kinds(&violations);
    assert!(found.contains(&ViolationKind::PrimaryKey));
    assert!(found.contains(&ViolationKind::MissingTable));
    assert!(
        violations
            .iter()
            .any(|violation| violation.kind == ViolationKind::MissingTable
                && violation.table == "diagnoses")
    );
}

#[test]
fn child_count_bounds_are_rechecked() {
    let registry = registry();
    let mut dataset = dataset(&registry);

    let ward_id = dataset.table("wards").expect("wards").rows[0]
        .get("ward_id")
        .cloned()
        .expect("ward_id");
    let devices = table_mut(&mut dataset, "devices");
    devices
        .rows
        .retain(|device| device.get("ward_id") != Some(&ward_id));

    let violations = validate(&dataset, &registry);
    let cardinality = violations
        .iter()
        .find(|violation| violation.kind == ViolationKind::Cardinality)
        .expect("cardinality violation");
    assert_eq!(cardinality.table, "devices");
    assert_eq!(cardinality.row_id.as_deref(), Some("W001"));
    assert_eq!(cardinality.rule, "per_parent(1..=5)");
}

#[test]
fn conditional_fields_are_rechecked() {
    let registry = registry();
    let mut dataset = dataset(&registry);

    let devices = dataset.table("devices").expect("devices").clone();
    let vitals = table_mut(&mut dataset, "vital_signs");
    let position = vitals
        .rows
        .iter()
        .position(|reading| {
            let device_id = reading
                .get("device_id")
                .and_then(GeneratedValue::as_str)
                .unwrap_or_default();
            devices
                .find_by("device_id", device_id)
                .and_then(|device| device.get("device_type"))
                .and_then(GeneratedValue::as_str)
                != Some(vocabulary::DEVICE_GLUCOMETER)
        })
        .expect("a reading from a device without glucose");
    set(vitals, position, "glucose_mg_dl", GeneratedValue::Int(100));

    let violations = validate(&dataset, &registry);
    assert_eq!(violations.len(), 1, "{violations:?}");
    assert_eq!(violations[0].kind, ViolationKind::Population);
    assert_eq!(violations[0].fields, vec!["glucose_mg_dl".to_string()]);
}

#[test]
fn csv_output_reloads_and_validates() {
    let registry = registry();
    let dataset = dataset(&registry);

    let dir = std::env::temp_dir().join(format!("medsynth-eval-{}", uuid::Uuid::new_v4()));
    let mut sink = CsvSink::new(&dir);
    dataset.write_to(&registry, &mut sink).expect("write csv");

    let loaded = load_dataset_csv(&dir, &registry).expect("load csv");
    assert_eq!(loaded.fingerprint(), dataset.fingerprint());

    let outcome = validate_with_summary(&loaded, &registry);
    assert!(outcome.is_clean(), "{:?}", outcome.violations);
    let report = render_report(&outcome, 20);
    assert!(report.contains("| vital_signs | 120 | 0 |"));

    fs::remove_file(dir.join("iot/devices.csv")).expect("remove devices");
    let partial = load_dataset_csv(&dir, &registry).expect("load partial");
    let violations = validate(&partial, &registry);
    assert!(violations.iter().any(|violation| {
        violation.kind == ViolationKind::MissingTable && violation.table == "devices"
    }));

    fs::remove_dir_all(dir).ok();
}

#[test]
fn missing_directory_is_an_error() {
    let registry = registry();
    let dir = std::env::temp_dir().join(format!("medsynth-eval-missing-{}", uuid::Uuid::new_v4()));
    assert!(load_dataset_csv(&dir, &registry).is_err());
}
