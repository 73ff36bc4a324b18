//! Post-hoc validation of an assembled dataset.
//!
//! Every finding is collected; nothing short-circuits. Row-level predicates
//! are shared with the generator through `medsynth_generate::checks`, but key
//! resolution, uniqueness and child counts are recomputed over whole tables.

use std::collections::{BTreeMap, HashMap};

use medsynth_core::{CardinalityPolicy, PopulationPredicate, SchemaRegistry, TableSchema};
use medsynth_generate::{
    CheckOutcome, Dataset, ParentContext, ParentLookup, Row, TableRows, evaluate_constraint,
    predicate_holds,
};

use crate::model::{TableSummary, ValidationOutcome, ValidationSummary, Violation, ViolationKind};
use crate::rules::FieldDomain;

/// Primary key value to row position, per table.
type KeyIndex<'d> = HashMap<&'d str, HashMap<String, usize>>;

/// Re-check every schema rule across `dataset`. Empty when the dataset is clean.
pub fn validate(dataset: &Dataset, registry: &SchemaRegistry) -> Vec<Violation> {
    let mut violations = Vec::new();
    let keys = index_keys(dataset, registry);

    for name in registry.graph().topological_order() {
        let Ok(table) = registry.lookup(name) else {
            continue;
        };
        let Some(rows) = dataset.table(name) else {
            violations.push(
                Violation::new(ViolationKind::MissingTable, name, "table_present")
                    .with_message(format!("dataset has no rows for '{name}'")),
            );
            continue;
        };

        check_layout(table, rows, &mut violations);
        check_primary_key(table, rows, &mut violations);
        check_rows(table, rows, dataset, &keys, &mut violations);
        check_cardinality(table, rows, dataset, &mut violations);
    }

    sort_violations(&mut violations);
    violations
}

/// [`validate`] plus per-table and per-kind counts.
pub fn validate_with_summary(dataset: &Dataset, registry: &SchemaRegistry) -> ValidationOutcome {
    let violations = validate(dataset, registry);

    let mut per_table: BTreeMap<&str, u64> = BTreeMap::new();
    let mut by_kind: BTreeMap<String, u64> = BTreeMap::new();
    for violation in &violations {
        *per_table.entry(violation.table.as_str()).or_default() += 1;
        *by_kind.entry(violation.kind.as_str().to_string()).or_default() += 1;
    }

    let mut summary = ValidationSummary::default();
    for name in registry.graph().topological_order() {
        let rows = dataset.table(name).map(|rows| rows.len() as u64).unwrap_or(0);
        summary.rows_checked += rows;
        summary.tables.push(TableSummary {
            table: name.clone(),
            rows,
            violations: per_table.get(name.as_str()).copied().unwrap_or(0),
        });
    }
    summary.violations_total = violations.len() as u64;
    summary.violations_by_kind = by_kind;

    ValidationOutcome {
        summary,
        violations,
    }
}

fn index_keys<'d>(dataset: &'d Dataset, registry: &SchemaRegistry) -> KeyIndex<'d> {
    let mut index = HashMap::new();
    for rows in &dataset.tables {
        let Ok(table) = registry.lookup(&rows.name) else {
            continue;
        };
        let mut keys = HashMap::with_capacity(rows.len());
        for (position, row) in rows.rows.iter().enumerate() {
            if let Some(key) = row_key(table, row) {
                keys.entry(key).or_insert(position);
            }
        }
        index.insert(rows.name.as_str(), keys);
    }
    index
}

fn row_key(table: &TableSchema, row: &Row) -> Option<String> {
    row.get(&table.primary_key)
        .filter(|value| !value.is_null())
        .map(|value| value.to_key())
}

fn check_layout(table: &TableSchema, rows: &TableRows, violations: &mut Vec<Violation>) {
    let declared = table.field_names();
    let missing: Vec<&String> = declared
        .iter()
        .filter(|name| !rows.fields.contains(name))
        .collect();
    let extra: Vec<&String> = rows
        .fields
        .iter()
        .filter(|name| !declared.contains(name))
        .collect();

    if missing.is_empty() && extra.is_empty() {
        return;
    }

    let mut message = Vec::new();
    if !missing.is_empty() {
        message.push(format!("missing fields: {}", join(&missing)));
    }
    if !extra.is_empty() {
        message.push(format!("unexpected fields: {}", join(&extra)));
    }
    let fields: Vec<&String> = missing.into_iter().chain(extra).collect();
    violations.push(
        Violation::new(ViolationKind::FieldLayout, &table.name, "field_layout")
            .with_fields(&fields)
            .with_message(message.join("; ")),
    );
}

fn check_primary_key(table: &TableSchema, rows: &TableRows, violations: &mut Vec<Violation>) {
    if !rows.fields.contains(&table.primary_key) {
        return;
    }
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for (position, row) in rows.rows.iter().enumerate() {
        let violation = Violation::new(ViolationKind::PrimaryKey, &table.name, "primary_key")
            .with_fields(&[table.primary_key.as_str()]);
        match row_key(table, row) {
            None => violations.push(
                violation
                    .at_row(position, None)
                    .with_message("primary key is null"),
            ),
            Some(key) => {
                if let Some(first) = seen.get(&key) {
                    violations.push(
                        violation
                            .at_row(position, Some(key.clone()))
                            .with_message(format!("duplicates the key of row #{first}")),
                    );
                } else {
                    seen.insert(key, position);
                }
            }
        }
    }
}

fn check_rows(
    table: &TableSchema,
    rows: &TableRows,
    dataset: &Dataset,
    keys: &KeyIndex<'_>,
    violations: &mut Vec<Violation>,
) {
    let mut domains = Vec::with_capacity(table.fields.len());
    for spec in &table.fields {
        match FieldDomain::prepare(spec) {
            Ok(domain) => domains.push(domain),
            Err(message) => {
                violations.push(
                    Violation::new(ViolationKind::Domain, &table.name, spec.rule.id())
                        .with_fields(&[spec.name.as_str()])
                        .with_message(message),
                );
                domains.push(FieldDomain::type_only(spec));
            }
        }
    }

    for (position, row) in rows.rows.iter().enumerate() {
        let row_id = row_key(table, row);
        let at = |violation: Violation| violation.at_row(position, row_id.clone());

        let mut parents = ParentContext::new();
        for fk in &table.foreign_keys {
            let Some(value) = row.get(&fk.field).filter(|value| !value.is_null()) else {
                continue;
            };
            let key = value.to_key();
            let parent = keys
                .get(fk.references_table.as_str())
                .and_then(|index| index.get(&key))
                .zip(dataset.table(&fk.references_table))
                .and_then(|(idx, parent)| parent.rows.get(*idx));
            match parent {
                Some(parent) => parents = parents.with_parent(fk.field.as_str(), parent),
                None => violations.push(at(Violation::new(
                    ViolationKind::ForeignKey,
                    &table.name,
                    format!("references({}.{})", fk.references_table, fk.references_field),
                )
                .with_fields(&[fk.field.as_str()])
                .with_message(format!(
                    "'{key}' does not match any {}.{}",
                    fk.references_table, fk.references_field
                )))),
            }
        }

        for (spec, domain) in table.fields.iter().zip(&domains) {
            let Some(value) = row.get(&spec.name) else {
                continue;
            };

            if let Some(predicate) = &spec.populate_when {
                if !predicate_resolvable(predicate, &parents) {
                    continue;
                }
                let required = predicate_holds(predicate, row, &parents);
                if required == value.is_null() {
                    let message = if required {
                        "must be populated for this row"
                    } else {
                        "must be null for this row"
                    };
                    violations.push(at(Violation::new(
                        ViolationKind::Population,
                        &table.name,
                        "populate_when",
                    )
                    .with_fields(&[spec.name.as_str()])
                    .with_message(message)));
                    continue;
                }
            } else if value.is_null() && !spec.nullable {
                violations.push(at(Violation::new(
                    ViolationKind::NotNull,
                    &table.name,
                    "not_null",
                )
                .with_fields(&[spec.name.as_str()])
                .with_message("value is null")));
                continue;
            }

            if value.is_null() {
                continue;
            }
            if let Err(message) = domain.check(value) {
                violations.push(at(Violation::new(
                    ViolationKind::Domain,
                    &table.name,
                    spec.rule.id(),
                )
                .with_fields(&[spec.name.as_str()])
                .with_message(message)));
            }
        }

        for constraint in &table.constraints {
            if let Some((foreign_key, _)) = constraint.parent_reference() {
                if parents_missing(&parents, foreign_key) {
                    continue;
                }
            }
            if let CheckOutcome::Failed(reason) = evaluate_constraint(constraint, row, &parents) {
                violations.push(at(Violation::new(
                    ViolationKind::CrossField,
                    &table.name,
                    constraint.name(),
                )
                .with_fields(&constraint.fields())
                .with_message(reason)));
            }
        }
    }
}

/// A parent-field predicate cannot be decided while its parent is unresolved;
/// the broken reference is already reported.
fn predicate_resolvable(predicate: &PopulationPredicate, parents: &ParentContext<'_>) -> bool {
    match predicate {
        PopulationPredicate::FieldIn { .. } => true,
        PopulationPredicate::ParentFieldIn { foreign_key, .. } => {
            !parents_missing(parents, foreign_key)
        }
    }
}

fn parents_missing(parents: &ParentContext<'_>, foreign_key: &str) -> bool {
    parents.parent(foreign_key).is_none()
}

fn check_cardinality(
    table: &TableSchema,
    rows: &TableRows,
    dataset: &Dataset,
    violations: &mut Vec<Violation>,
) {
    for fk in &table.foreign_keys {
        let CardinalityPolicy::PerParent { min, max } = fk.cardinality else {
            continue;
        };
        let Some(parent_rows) = dataset.table(&fk.references_table) else {
            continue;
        };

        let mut counts: HashMap<String, u32> = HashMap::new();
        for row in &rows.rows {
            if let Some(value) = row.get(&fk.field).filter(|value| !value.is_null()) {
                *counts.entry(value.to_key()).or_default() += 1;
            }
        }

        for parent in &parent_rows.rows {
            let Some(key) = parent
                .get(&fk.references_field)
                .filter(|value| !value.is_null())
                .map(|value| value.to_key())
            else {
                continue;
            };
            let count = counts.get(&key).copied().unwrap_or(0);
            if count < min || count > max {
                let mut violation = Violation::new(
                    ViolationKind::Cardinality,
                    &table.name,
                    format!("per_parent({min}..={max})"),
                )
                .with_fields(&[fk.field.as_str()])
                .with_message(format!(
                    "{} '{key}' has {count} {} rows",
                    fk.references_table, table.name
                ));
                violation.row_id = Some(key);
                violations.push(violation);
            }
        }
    }
}

fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| {
        (
            &a.table,
            a.kind,
            a.row_index.unwrap_or(u64::MAX),
            &a.row_id,
            &a.fields,
            &a.rule,
            &a.message,
        )
            .cmp(&(
                &b.table,
                b.kind,
                b.row_index.unwrap_or(u64::MAX),
                &b.row_id,
                &b.fields,
                &b.rule,
                &b.message,
            ))
    });
}

fn join(names: &[&String]) -> String {
    names
        .iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
