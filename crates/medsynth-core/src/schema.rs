use std::collections::{BTreeSet, HashMap};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{CrossFieldConstraint, ForeignKeySpec};
use crate::error::{Result, SchemaError};
use crate::types::{FieldType, GenerationRule, PopulationPredicate};

/// Declarative description of a synthetic dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetSchema {
    /// Contract version for this schema format.
    pub schema_version: String,
    /// Dataset name, used in reports.
    pub name: String,
    /// Table definitions; order is the registration order.
    pub tables: Vec<TableSchema>,
}

/// Business domain a table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Electronic health records.
    Clinical,
    /// Staffing and facilities.
    Operational,
    /// Device telemetry.
    Device,
}

impl Domain {
    /// Output sub-directory for tables of this domain.
    pub fn directory(&self) -> &'static str {
        match self {
            Domain::Clinical => "ehr",
            Domain::Operational => "erp",
            Domain::Device => "iot",
        }
    }
}

/// A table with its fields, relationships and row-level constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    pub name: String,
    pub domain: Domain,
    pub primary_key: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<CrossFieldConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A single field: its type, generation rule and population behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub rule: GenerationRule,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    /// The field is null exactly when this predicate is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populate_when: Option<PopulationPredicate>,
}

impl FieldSpec {
    pub fn new(name: &str, field_type: FieldType, rule: GenerationRule) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            rule,
            nullable: false,
            unique: false,
            populate_when: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the field nullable and gates it behind `predicate`.
    pub fn populate_when(mut self, predicate: PopulationPredicate) -> Self {
        self.nullable = true;
        self.populate_when = Some(predicate);
        self
    }
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }

    pub fn foreign_key(&self, field: &str) -> Option<&ForeignKeySpec> {
        self.foreign_keys.iter().find(|fk| fk.field == field)
    }

    /// The relationship that decides the child row count, if any.
    pub fn driving_foreign_key(&self) -> Option<&ForeignKeySpec> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.cardinality.is_per_parent())
    }

    /// Parent tables in declaration order, without duplicates.
    pub fn parent_tables(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.foreign_keys
            .iter()
            .filter(|fk| seen.insert(fk.references_table.as_str()))
            .map(|fk| fk.references_table.as_str())
            .collect()
    }

    /// Field indices in the order values must be drawn within a row.
    ///
    /// A field comes after every sibling its rule or predicate reads; ties
    /// keep declaration order.
    pub fn generation_order(&self) -> Result<Vec<usize>> {
        let index: HashMap<&str, usize> = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.as_str(), idx))
            .collect();

        let mut indegree = vec![0_usize; self.fields.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.fields.len()];

        for (idx, field) in self.fields.iter().enumerate() {
            let mut inputs = field.rule.dependencies();
            if let Some(dep) = field
                .populate_when
                .as_ref()
                .and_then(|predicate| predicate.sibling_dependency())
            {
                inputs.push(dep);
            }

            for input in inputs {
                let input_idx = index.get(input).copied().ok_or_else(|| {
                    SchemaError::InvalidSchema(format!(
                        "field '{}.{}' depends on unknown field '{}'",
                        self.name, field.name, input
                    ))
                })?;
                if input_idx == idx {
                    return Err(SchemaError::InvalidSchema(format!(
                        "field '{}.{}' depends on itself",
                        self.name, field.name
                    )));
                }
                indegree[idx] += 1;
                dependents[input_idx].push(idx);
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(idx, degree)| if *degree == 0 { Some(idx) } else { None })
            .collect();
        let mut order = Vec::with_capacity(self.fields.len());

        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for dependent in &dependents[idx] {
                indegree[*dependent] = indegree[*dependent].saturating_sub(1);
                if indegree[*dependent] == 0 {
                    ready.insert(*dependent);
                }
            }
        }

        if order.len() != self.fields.len() {
            let stuck: Vec<&str> = indegree
                .iter()
                .enumerate()
                .filter(|(_, degree)| **degree > 0)
                .map(|(idx, _)| self.fields[idx].name.as_str())
                .collect();
            return Err(SchemaError::InvalidSchema(format!(
                "cyclic field dependencies in '{}': {}",
                self.name,
                stuck.join(", ")
            )));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerationRule;

    fn table(fields: Vec<FieldSpec>) -> TableSchema {
        TableSchema {
            name: "t".to_string(),
            domain: Domain::Clinical,
            primary_key: "id".to_string(),
            fields,
            foreign_keys: Vec::new(),
            constraints: Vec::new(),
            comment: None,
        }
    }

    #[test]
    fn generation_order_puts_inputs_first() {
        let table = table(vec![
            FieldSpec::new(
                "end",
                FieldType::Date,
                GenerationRule::OffsetDays {
                    base: "start".to_string(),
                    days: "days".to_string(),
                },
            ),
            FieldSpec::new(
                "start",
                FieldType::Date,
                GenerationRule::DateRange {
                    min: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    max: chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
                    not_before: None,
                },
            ),
            FieldSpec::new("days", FieldType::Integer, GenerationRule::IntRange { min: 1, max: 3 }),
        ]);

        assert_eq!(table.generation_order().unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn generation_order_rejects_cycles() {
        let table = table(vec![
            FieldSpec::new(
                "a",
                FieldType::Date,
                GenerationRule::OffsetDays {
                    base: "b".to_string(),
                    days: "n".to_string(),
                },
            ),
            FieldSpec::new(
                "b",
                FieldType::Date,
                GenerationRule::OffsetDays {
                    base: "a".to_string(),
                    days: "n".to_string(),
                },
            ),
            FieldSpec::new("n", FieldType::Integer, GenerationRule::IntRange { min: 0, max: 1 }),
        ]);

        let err = table.generation_order().unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
    }

    #[test]
    fn domain_directories_match_output_layout() {
        assert_eq!(Domain::Clinical.directory(), "ehr");
        assert_eq!(Domain::Operational.directory(), "erp");
        assert_eq!(Domain::Device.directory(), "iot");
    }
}
