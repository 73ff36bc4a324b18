//! Built-in hospital dataset: clinical (EHR), operational (ERP) and device
//! telemetry (IoT) tables.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::SCHEMA_VERSION;
use crate::constraints::{CardinalityPolicy, CrossFieldConstraint, ForeignKeySpec};
use crate::schema::{DatasetSchema, Domain, FieldSpec, TableSchema};
use crate::types::{FieldType, GenerationRule, PopulationPredicate};
use crate::vocabulary::{self as vocab, alternation, to_strings};

pub const HOSPITAL_DATASET: &str = "hospital";

/// Default row counts. Root tables are exact; child counts are advisory and
/// reconciled with their per-parent bounds.
pub const DEFAULT_TARGETS: &[(&str, u64)] = &[
    ("wards", 10),
    ("patients", 200),
    ("staff", 60),
    ("devices", 30),
    ("staff_assignments", 120),
    ("admissions", 400),
    ("diagnoses", 500),
    ("vital_signs", 2000),
];

const PHONE_PATTERN: &str = r"\+39 3[0-9]{9}";

pub fn hospital_schema() -> DatasetSchema {
    DatasetSchema {
        schema_version: SCHEMA_VERSION.to_string(),
        name: HOSPITAL_DATASET.to_string(),
        tables: hospital_tables(),
    }
}

/// Tables in registration order.
pub fn hospital_tables() -> Vec<TableSchema> {
    vec![
        wards(),
        patients(),
        staff(),
        staff_assignments(),
        devices(),
        admissions(),
        diagnoses(),
        vital_signs(),
    ]
}

fn wards() -> TableSchema {
    TableSchema {
        name: "wards".to_string(),
        domain: Domain::Operational,
        primary_key: "ward_id".to_string(),
        fields: vec![
            sequence("ward_id", "W", 3),
            FieldSpec::new(
                "ward_name",
                FieldType::Text,
                GenerationRule::Sequence {
                    prefix: "Ward ".to_string(),
                    width: 2,
                },
            ),
            choice("specialty", vocab::SPECIALTIES),
            int_range("floor", 0, 8),
            int_range("bed_count", 8, 40),
        ],
        foreign_keys: Vec::new(),
        constraints: Vec::new(),
        comment: Some("Hospital wards and their clinical specialty.".to_string()),
    }
}

fn patients() -> TableSchema {
    TableSchema {
        name: "patients".to_string(),
        domain: Domain::Clinical,
        primary_key: "patient_id".to_string(),
        fields: vec![
            sequence("patient_id", "P", 6),
            text_choice("first_name", vocab::FIRST_NAMES),
            text_choice("last_name", vocab::LAST_NAMES),
            choice("sex", vocab::SEXES),
            date_range("birth_date", day(1950, 1, 1), day(2010, 12, 31), None),
            choice("city", vocab::CITIES),
            pattern(
                "address",
                FieldType::Text,
                &format!("{} [1-9][0-9]?", alternation(vocab::STREETS)),
            ),
            pattern("postal_code", FieldType::Text, "[1-9][0-9]{4}"),
            choice("country", vocab::COUNTRIES),
            email("email", "example.it", 4),
            pattern("phone", FieldType::Text, PHONE_PATTERN),
            pattern("tax_code", FieldType::StringId, "CF[0-9]{10}").unique(),
            choice("marital_status", vocab::MARITAL_STATUSES),
            choice("primary_language", vocab::LANGUAGES),
            choice("insurance_provider", vocab::INSURANCE_PROVIDERS),
            choice("insurance_plan", vocab::INSURANCE_PLANS),
            pattern("insurance_id", FieldType::StringId, "INS[0-9]{7}"),
            pattern(
                "emergency_contact_name",
                FieldType::Text,
                &format!(
                    "{} {}",
                    alternation(vocab::FIRST_NAMES),
                    alternation(vocab::LAST_NAMES)
                ),
            ),
            pattern("emergency_contact_phone", FieldType::Text, PHONE_PATTERN),
            int_range("height_cm", 140, 200),
            int_range("weight_kg", 45, 120),
            choice("blood_type", vocab::BLOOD_TYPES),
        ],
        foreign_keys: Vec::new(),
        constraints: vec![email_matches_name()],
        comment: Some("Patient registry.".to_string()),
    }
}

fn staff() -> TableSchema {
    TableSchema {
        name: "staff".to_string(),
        domain: Domain::Operational,
        primary_key: "staff_id".to_string(),
        fields: vec![
            sequence("staff_id", "S", 5),
            text_choice("first_name", vocab::FIRST_NAMES),
            text_choice("last_name", vocab::LAST_NAMES),
            choice("role", vocab::STAFF_ROLES),
            choice("department", vocab::SPECIALTIES),
            choice("employment_type", vocab::EMPLOYMENT_TYPES),
            email("email", "hospital.example.it", 0),
            pattern("phone", FieldType::Text, PHONE_PATTERN),
            pattern("license_id", FieldType::StringId, "LIC[0-9]{6}").unique(),
            date_range("hire_date", day(2010, 1, 1), day(2024, 12, 31), None),
        ],
        foreign_keys: Vec::new(),
        constraints: vec![email_matches_name()],
        comment: None,
    }
}

fn staff_assignments() -> TableSchema {
    TableSchema {
        name: "staff_assignments".to_string(),
        domain: Domain::Operational,
        primary_key: "assignment_id".to_string(),
        fields: vec![
            sequence("assignment_id", "ASG", 6),
            foreign_key("staff_id"),
            foreign_key("ward_id"),
            choice("shift", vocab::SHIFTS),
            FieldSpec::new(
                "department",
                FieldType::Categorical,
                GenerationRule::ParentField {
                    foreign_key: "ward_id".to_string(),
                    field: "specialty".to_string(),
                },
            ),
        ],
        foreign_keys: vec![
            independent("staff_id", "staff", "staff_id"),
            per_parent("ward_id", "wards", "ward_id", 2, 12),
        ],
        constraints: vec![CrossFieldConstraint::MatchesParent {
            field: "department".to_string(),
            foreign_key: "ward_id".to_string(),
            parent_field: "specialty".to_string(),
        }],
        comment: Some("Shift assignments; the department follows the ward specialty.".to_string()),
    }
}

fn devices() -> TableSchema {
    TableSchema {
        name: "devices".to_string(),
        domain: Domain::Device,
        primary_key: "device_id".to_string(),
        fields: vec![
            sequence("device_id", "D", 5),
            foreign_key("ward_id"),
            choice("device_type", vocab::DEVICE_TYPES),
            choice("manufacturer", vocab::DEVICE_MANUFACTURERS),
            choice("model", vocab::DEVICE_MODELS),
            pattern("serial_number", FieldType::StringId, "SN[0-9]{10}").unique(),
            weighted("status", vocab::DEVICE_STATUSES, vocab::DEVICE_STATUS_WEIGHTS),
            date_range("purchase_date", day(2018, 1, 1), day(2024, 12, 31), None),
            date_range(
                "last_calibration_date",
                day(2024, 1, 1),
                day(2026, 12, 31),
                Some("purchase_date"),
            ),
        ],
        foreign_keys: vec![per_parent("ward_id", "wards", "ward_id", 1, 5)],
        constraints: vec![CrossFieldConstraint::FieldOrder {
            earlier: "purchase_date".to_string(),
            later: "last_calibration_date".to_string(),
            strict: false,
        }],
        comment: None,
    }
}

fn admissions() -> TableSchema {
    TableSchema {
        name: "admissions".to_string(),
        domain: Domain::Clinical,
        primary_key: "admission_id".to_string(),
        fields: vec![
            sequence("admission_id", "ADM", 7),
            foreign_key("patient_id"),
            foreign_key("ward_id"),
            FieldSpec::new(
                "admit_ts",
                FieldType::Timestamp,
                GenerationRule::TimestampRange {
                    min: at_midnight(day(2024, 1, 1)),
                    max: end_of_day(day(2026, 12, 31)),
                },
            ),
            FieldSpec::new(
                "discharge_ts",
                FieldType::Timestamp,
                GenerationRule::OffsetDays {
                    base: "admit_ts".to_string(),
                    days: "length_of_stay_days".to_string(),
                },
            ),
            int_range("length_of_stay_days", 1, 30),
            choice("admission_type", vocab::ADMISSION_TYPES),
            choice("admission_source", vocab::ADMISSION_SOURCES),
            weighted(
                "discharge_outcome",
                vocab::DISCHARGE_OUTCOMES,
                vocab::DISCHARGE_OUTCOME_WEIGHTS,
            ),
        ],
        foreign_keys: vec![
            per_parent("patient_id", "patients", "patient_id", 0, 4),
            independent("ward_id", "wards", "ward_id"),
        ],
        constraints: vec![
            CrossFieldConstraint::FieldOrder {
                earlier: "admit_ts".to_string(),
                later: "discharge_ts".to_string(),
                strict: false,
            },
            CrossFieldConstraint::DayDelta {
                start: "admit_ts".to_string(),
                end: "discharge_ts".to_string(),
                days: "length_of_stay_days".to_string(),
            },
            CrossFieldConstraint::NotBeforeParent {
                field: "admit_ts".to_string(),
                foreign_key: "patient_id".to_string(),
                parent_field: "birth_date".to_string(),
            },
        ],
        comment: Some("Inpatient stays.".to_string()),
    }
}

fn diagnoses() -> TableSchema {
    TableSchema {
        name: "diagnoses".to_string(),
        domain: Domain::Clinical,
        primary_key: "diagnosis_id".to_string(),
        fields: vec![
            sequence("diagnosis_id", "DX", 7),
            foreign_key("admission_id"),
            choice("icd10_code", vocab::ICD10_CODES),
            weighted("severity", vocab::SEVERITIES, vocab::SEVERITY_WEIGHTS),
        ],
        foreign_keys: vec![per_parent(
            "admission_id",
            "admissions",
            "admission_id",
            1,
            3,
        )],
        constraints: Vec::new(),
        comment: None,
    }
}

fn vital_signs() -> TableSchema {
    let mut fields = vec![
        sequence("measurement_id", "VS", 7),
        foreign_key("patient_id"),
        foreign_key("device_id"),
        FieldSpec::new(
            "measured_at",
            FieldType::Timestamp,
            GenerationRule::TimestampRange {
                min: at_midnight(day(2025, 1, 1)),
                max: end_of_day(day(2026, 12, 31)),
            },
        ),
    ];

    let measurements = [
        int_range("heart_rate", 50, 120),
        int_range("spo2", 90, 100),
        int_range("systolic_bp", 95, 160),
        int_range("diastolic_bp", 60, 100),
        FieldSpec::new(
            "temperature_c",
            FieldType::Float,
            GenerationRule::FloatRange {
                min: 35.0,
                max: 40.5,
                scale: Some(1),
            },
        ),
        int_range("respiratory_rate", 10, 30),
        int_range("glucose_mg_dl", 70, 180),
    ];
    for field in measurements {
        let devices = to_strings(vocab::devices_recording(&field.name));
        fields.push(field.populate_when(PopulationPredicate::ParentFieldIn {
            foreign_key: "device_id".to_string(),
            field: "device_type".to_string(),
            values: devices,
        }));
    }

    TableSchema {
        name: "vital_signs".to_string(),
        domain: Domain::Device,
        primary_key: "measurement_id".to_string(),
        fields,
        foreign_keys: vec![
            per_parent("patient_id", "patients", "patient_id", 0, 15),
            independent("device_id", "devices", "device_id"),
        ],
        constraints: vec![
            CrossFieldConstraint::FieldOrder {
                earlier: "diastolic_bp".to_string(),
                later: "systolic_bp".to_string(),
                strict: true,
            },
            CrossFieldConstraint::NotBeforeParent {
                field: "measured_at".to_string(),
                foreign_key: "device_id".to_string(),
                parent_field: "purchase_date".to_string(),
            },
        ],
        comment: Some("Device readings; populated measurements depend on the device type.".to_string()),
    }
}

fn sequence(name: &str, prefix: &str, width: usize) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::StringId,
        GenerationRule::Sequence {
            prefix: prefix.to_string(),
            width,
        },
    )
}

fn foreign_key(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::StringId, GenerationRule::ForeignKey)
}

fn choice(name: &str, values: &[&str]) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Categorical,
        GenerationRule::Choice {
            values: to_strings(values),
            weights: None,
        },
    )
}

fn text_choice(name: &str, values: &[&str]) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Text,
        GenerationRule::Choice {
            values: to_strings(values),
            weights: None,
        },
    )
}

fn weighted(name: &str, values: &[&str], weights: &[f64]) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Categorical,
        GenerationRule::Choice {
            values: to_strings(values),
            weights: Some(weights.to_vec()),
        },
    )
}

fn int_range(name: &str, min: i64, max: i64) -> FieldSpec {
    FieldSpec::new(name, FieldType::Integer, GenerationRule::IntRange { min, max })
}

fn date_range(name: &str, min: NaiveDate, max: NaiveDate, not_before: Option<&str>) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Date,
        GenerationRule::DateRange {
            min,
            max,
            not_before: not_before.map(|field| field.to_string()),
        },
    )
}

fn pattern(name: &str, field_type: FieldType, regex: &str) -> FieldSpec {
    FieldSpec::new(
        name,
        field_type,
        GenerationRule::Pattern {
            regex: regex.to_string(),
        },
    )
}

fn email(name: &str, domain: &str, suffix_digits: u32) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Text,
        GenerationRule::Email {
            first_name: "first_name".to_string(),
            last_name: "last_name".to_string(),
            domain: domain.to_string(),
            suffix_digits,
        },
    )
}

fn email_matches_name() -> CrossFieldConstraint {
    CrossFieldConstraint::EmailMatchesName {
        email: "email".to_string(),
        first_name: "first_name".to_string(),
        last_name: "last_name".to_string(),
    }
}

fn per_parent(field: &str, table: &str, key: &str, min: u32, max: u32) -> ForeignKeySpec {
    ForeignKeySpec {
        field: field.to_string(),
        references_table: table.to_string(),
        references_field: key.to_string(),
        cardinality: CardinalityPolicy::PerParent { min, max },
    }
}

fn independent(field: &str, table: &str, key: &str) -> ForeignKeySpec {
    ForeignKeySpec {
        field: field.to_string(),
        references_table: table.to_string(),
        references_field: key.to_string(),
        cardinality: CardinalityPolicy::Independent,
    }
}

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}
