use std::collections::HashSet;
use std::sync::Arc;

use medsynth_core::TableSchema;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::checks::{CheckOutcome, ParentLookup, evaluate_constraint, predicate_holds};
use crate::errors::GenerationError;
use crate::generators::{FieldGenerator, GeneratedValue, GeneratorContext};
use crate::seed::row_rng;

/// One generated record; values follow the table's declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Arc<Vec<String>>,
    values: Vec<GeneratedValue>,
}

impl Row {
    pub fn new(fields: Arc<Vec<String>>, values: Vec<GeneratedValue>) -> Self {
        Self { fields, values }
    }

    /// Row with every field null.
    pub fn empty(fields: Arc<Vec<String>>) -> Self {
        let values = vec![GeneratedValue::Null; fields.len()];
        Self { fields, values }
    }

    pub fn get(&self, field: &str) -> Option<&GeneratedValue> {
        self.fields
            .iter()
            .position(|name| name == field)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn set(&mut self, idx: usize, value: GeneratedValue) {
        if let Some(slot) = self.values.get_mut(idx) {
            *slot = value;
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn values(&self) -> &[GeneratedValue] {
        &self.values
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.fields.iter().zip(&self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Parent rows picked for a child row, plus values pinned by the caller.
#[derive(Debug, Clone, Default)]
pub struct ParentContext<'p> {
    parents: Vec<(&'p str, &'p Row)>,
    presets: Vec<(String, GeneratedValue)>,
}

impl<'p> ParentContext<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, foreign_key: &'p str, row: &'p Row) -> Self {
        self.parents.push((foreign_key, row));
        self
    }

    /// Pin `field` to `value` instead of drawing it.
    pub fn with_preset(mut self, field: &str, value: GeneratedValue) -> Self {
        self.presets.push((field.to_string(), value));
        self
    }

    pub fn preset(&self, field: &str) -> Option<&GeneratedValue> {
        self.presets
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

impl ParentLookup for ParentContext<'_> {
    fn parent(&self, foreign_key: &str) -> Option<&Row> {
        self.parents
            .iter()
            .find(|(name, _)| *name == foreign_key)
            .map(|(_, row)| *row)
    }
}

/// Keys already issued for a table's primary key and unique fields.
#[derive(Debug, Clone, Default)]
pub struct UniqueSet {
    fields: Vec<(usize, String)>,
    seen: Vec<HashSet<String>>,
}

impl UniqueSet {
    pub fn for_table(table: &TableSchema) -> Self {
        let mut fields: Vec<(usize, String)> = Vec::new();
        for (idx, field) in table.fields.iter().enumerate() {
            if field.name == table.primary_key || field.unique {
                fields.push((idx, field.name.clone()));
            }
        }
        let seen = vec![HashSet::new(); fields.len()];
        Self { fields, seen }
    }

    /// First unique field whose value in `row` was already issued.
    pub fn conflict(&self, row: &Row) -> Option<&str> {
        self.fields
            .iter()
            .zip(&self.seen)
            .find(|((idx, _), seen)| {
                row.values()
                    .get(*idx)
                    .filter(|value| !value.is_null())
                    .is_some_and(|value| seen.contains(&value.to_key()))
            })
            .map(|((_, name), _)| name.as_str())
    }

    /// Record the row's keys. Callers check [`UniqueSet::conflict`] first.
    pub fn claim(&mut self, row: &Row) {
        for ((idx, _), seen) in self.fields.iter().zip(self.seen.iter_mut()) {
            if let Some(value) = row.values().get(*idx).filter(|value| !value.is_null()) {
                seen.insert(value.to_key());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.first().map_or(0, HashSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A row that satisfied every constraint, with the retries it took.
#[derive(Debug, Clone)]
pub struct GeneratedRow {
    pub row: Row,
    pub retries: u32,
}

/// Draws rows of one table.
#[derive(Debug, Clone)]
pub struct RowGenerator<'t> {
    table: &'t TableSchema,
    fields: Arc<Vec<String>>,
    order: Vec<usize>,
    generators: Vec<FieldGenerator>,
    max_attempts: u32,
}

impl<'t> RowGenerator<'t> {
    pub fn new(table: &'t TableSchema, max_attempts: u32) -> Result<Self, GenerationError> {
        let order = table.generation_order()?;
        let generators = table
            .fields
            .iter()
            .map(|field| FieldGenerator::prepare(table, field))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            table,
            fields: Arc::new(table.field_names()),
            order,
            generators,
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn table(&self) -> &TableSchema {
        self.table
    }

    pub fn generate(
        &self,
        row_index: u64,
        table_seed: u64,
        parents: &ParentContext<'_>,
        unique: &mut UniqueSet,
    ) -> Result<GeneratedRow, GenerationError> {
        let mut last_reason = String::new();

        for attempt in 1..=self.max_attempts {
            let row = self.draw(row_index, table_seed, attempt, parents)?;
            match self.check(&row, parents, unique) {
                Ok(()) => {
                    unique.claim(&row);
                    return Ok(GeneratedRow {
                        row,
                        retries: attempt - 1,
                    });
                }
                Err(reason) => last_reason = reason,
            }
        }

        Err(GenerationError::ConstraintUnsatisfiable {
            table: self.table.name.clone(),
            row_index,
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }

    fn draw(
        &self,
        row_index: u64,
        table_seed: u64,
        attempt: u32,
        parents: &ParentContext<'_>,
    ) -> Result<Row, GenerationError> {
        let mut rng = row_rng(table_seed, row_index, attempt);
        let mut row = Row::empty(Arc::clone(&self.fields));

        for &idx in &self.order {
            let spec = &self.table.fields[idx];
            if let Some(value) = parents.preset(&spec.name) {
                row.set(idx, value.clone());
                continue;
            }
            if let Some(predicate) = &spec.populate_when {
                if !predicate_holds(predicate, &row, parents) {
                    continue;
                }
            }
            let value = {
                let mut ctx = GeneratorContext {
                    table: self.table,
                    ordinal: row_index + 1,
                    row: &row,
                    parents,
                    rng: &mut rng,
                };
                self.generators[idx].generate(&mut ctx)?
            };
            row.set(idx, value);
        }

        Ok(row)
    }

    fn check(
        &self,
        row: &Row,
        parents: &ParentContext<'_>,
        unique: &UniqueSet,
    ) -> Result<(), String> {
        for (spec, value) in self.table.fields.iter().zip(row.values()) {
            if !value.is_null() {
                continue;
            }
            if !spec.nullable {
                return Err(format!("{} is null", spec.name));
            }
            if let Some(predicate) = &spec.populate_when {
                if predicate_holds(predicate, row, parents) {
                    return Err(format!("{} must be populated", spec.name));
                }
            }
        }

        for constraint in &self.table.constraints {
            if let CheckOutcome::Failed(reason) = evaluate_constraint(constraint, row, parents) {
                return Err(format!("{}: {reason}", constraint.name()));
            }
        }

        if let Some(field) = unique.conflict(row) {
            return Err(format!("duplicate value for {field}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use medsynth_core::{
        CrossFieldConstraint, Domain, FieldSpec, FieldType, GenerationRule, SchemaRegistry,
    };

    use super::*;

    fn stamp(day: u32, hour: u32) -> GeneratedValue {
        GeneratedValue::Timestamp(
            NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn pinned_admission_discharges_after_admit() {
        let registry = SchemaRegistry::hospital().expect("registry");
        let patients = registry.lookup("patients").expect("patients");
        let wards = registry.lookup("wards").expect("wards");
        let admissions = registry.lookup("admissions").expect("admissions");

        let patient = RowGenerator::new(patients, 50)
            .expect("patients generator")
            .generate(0, 1, &ParentContext::new(), &mut UniqueSet::for_table(patients))
            .expect("patient")
            .row;
        let ward = RowGenerator::new(wards, 50)
            .expect("wards generator")
            .generate(0, 2, &ParentContext::new(), &mut UniqueSet::for_table(wards))
            .expect("ward")
            .row;

        let generator = RowGenerator::new(admissions, 50).expect("admissions generator");
        let mut unique = UniqueSet::for_table(admissions);
        let admit = stamp(10, 8);
        for row_index in 0..100 {
            let parents = ParentContext::new()
                .with_parent("patient_id", &patient)
                .with_parent("ward_id", &ward)
                .with_preset("admit_ts", admit.clone());
            let generated = generator
                .generate(row_index, 3, &parents, &mut unique)
                .expect("admission");
            let row = generated.row;

            assert_eq!(row.get("admit_ts"), Some(&admit));
            let discharge = row.get("discharge_ts").and_then(GeneratedValue::as_datetime);
            let admit_at = admit.as_datetime();
            assert!(discharge >= admit_at);
            let los = row
                .get("length_of_stay_days")
                .and_then(GeneratedValue::as_i64)
                .expect("length of stay");
            assert!((1..=30).contains(&los));
            assert_eq!(row.get("patient_id"), patient.get("patient_id"));
        }
        assert_eq!(unique.len(), 100);
    }

    #[test]
    fn unsatisfiable_rows_fail_after_budget() {
        let table = TableSchema {
            name: "impossible".to_string(),
            domain: Domain::Operational,
            primary_key: "id".to_string(),
            fields: vec![
                FieldSpec::new(
                    "id",
                    FieldType::StringId,
                    GenerationRule::Sequence {
                        prefix: "X".to_string(),
                        width: 2,
                    },
                ),
                FieldSpec::new("a", FieldType::Integer, GenerationRule::IntRange { min: 5, max: 9 }),
                FieldSpec::new("b", FieldType::Integer, GenerationRule::IntRange { min: 0, max: 4 }),
            ],
            foreign_keys: Vec::new(),
            constraints: vec![CrossFieldConstraint::FieldOrder {
                earlier: "a".to_string(),
                later: "b".to_string(),
                strict: false,
            }],
            comment: None,
        };

        let generator = RowGenerator::new(&table, 7).expect("generator");
        let err = generator
            .generate(0, 9, &ParentContext::new(), &mut UniqueSet::for_table(&table))
            .unwrap_err();
        match err {
            GenerationError::ConstraintUnsatisfiable {
                table, attempts, ..
            } => {
                assert_eq!(table, "impossible");
                assert_eq!(attempts, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unique_set_rejects_repeated_keys() {
        let registry = SchemaRegistry::hospital().expect("registry");
        let wards = registry.lookup("wards").expect("wards");
        let generator = RowGenerator::new(wards, 5).expect("generator");
        let mut unique = UniqueSet::for_table(wards);

        let first = generator
            .generate(0, 1, &ParentContext::new(), &mut unique)
            .expect("first ward");
        assert_eq!(unique.conflict(&first.row), Some("ward_id"));

        let err = generator
            .generate(0, 1, &ParentContext::new(), &mut unique)
            .unwrap_err();
        assert!(matches!(err, GenerationError::ConstraintUnsatisfiable { .. }));
    }
}
