//! Row-level predicates shared by generation and validation.

use std::cmp::Ordering;

use medsynth_core::{CrossFieldConstraint, PopulationPredicate};

use crate::generators::{GeneratedValue, compare_values};
use crate::row::Row;

/// Resolves the parent row referenced by a foreign key field.
pub trait ParentLookup {
    fn parent(&self, foreign_key: &str) -> Option<&Row>;
}

/// Result of evaluating a cross-field constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed(String),
}

impl CheckOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, CheckOutcome::Passed)
    }
}

/// Evaluate `constraint` for `row`. Null operands pass.
pub fn evaluate_constraint(
    constraint: &CrossFieldConstraint,
    row: &Row,
    parents: &dyn ParentLookup,
) -> CheckOutcome {
    match constraint {
        CrossFieldConstraint::FieldOrder {
            earlier,
            later,
            strict,
        } => {
            let (Some(left), Some(right)) = (present(row, earlier), present(row, later)) else {
                return CheckOutcome::Passed;
            };
            match compare_values(left, right) {
                Some(Ordering::Less) => CheckOutcome::Passed,
                Some(Ordering::Equal) if !strict => CheckOutcome::Passed,
                Some(_) => CheckOutcome::Failed(format!(
                    "{earlier} ({}) must be {} {later} ({})",
                    left.to_key(),
                    if *strict { "before" } else { "no later than" },
                    right.to_key()
                )),
                None => CheckOutcome::Failed(format!(
                    "{earlier} and {later} cannot be compared"
                )),
            }
        }
        CrossFieldConstraint::DayDelta { start, end, days } => {
            let (Some(start_value), Some(end_value), Some(days_value)) =
                (present(row, start), present(row, end), present(row, days))
            else {
                return CheckOutcome::Passed;
            };
            let (Some(from), Some(to), Some(expected)) = (
                start_value.as_datetime(),
                end_value.as_datetime(),
                days_value.as_i64(),
            ) else {
                return CheckOutcome::Failed(format!(
                    "{start}, {end} and {days} must be temporal, temporal and integer"
                ));
            };
            let actual = (to - from).num_days();
            if actual == expected {
                CheckOutcome::Passed
            } else {
                CheckOutcome::Failed(format!(
                    "{end} is {actual} days after {start}, but {days} is {expected}"
                ))
            }
        }
        CrossFieldConstraint::EmailMatchesName {
            email,
            first_name,
            last_name,
        } => {
            let (Some(email_value), Some(first), Some(last)) = (
                present(row, email),
                present(row, first_name),
                present(row, last_name),
            ) else {
                return CheckOutcome::Passed;
            };
            let (Some(email_text), Some(first), Some(last)) =
                (email_value.as_str(), first.as_str(), last.as_str())
            else {
                return CheckOutcome::Failed(format!("{email} and the name fields must be text"));
            };
            if email_matches_name(email_text, first, last) {
                CheckOutcome::Passed
            } else {
                CheckOutcome::Failed(format!(
                    "{email} '{email_text}' does not match '{first} {last}'"
                ))
            }
        }
        CrossFieldConstraint::MatchesParent {
            field,
            foreign_key,
            parent_field,
        } => {
            let Some(value) = present(row, field) else {
                return CheckOutcome::Passed;
            };
            let Some(parent) = parents.parent(foreign_key) else {
                return CheckOutcome::Failed(format!("no parent row for {foreign_key}"));
            };
            match parent.get(parent_field) {
                Some(expected) if expected == value => CheckOutcome::Passed,
                Some(expected) => CheckOutcome::Failed(format!(
                    "{field} '{}' differs from parent {parent_field} '{}'",
                    value.to_key(),
                    expected.to_key()
                )),
                None => CheckOutcome::Failed(format!("parent has no field {parent_field}")),
            }
        }
        CrossFieldConstraint::NotBeforeParent {
            field,
            foreign_key,
            parent_field,
        } => {
            let Some(value) = present(row, field) else {
                return CheckOutcome::Passed;
            };
            let Some(parent) = parents.parent(foreign_key) else {
                return CheckOutcome::Failed(format!("no parent row for {foreign_key}"));
            };
            let Some(bound) = parent.get(parent_field).filter(|value| !value.is_null()) else {
                return CheckOutcome::Passed;
            };
            match compare_values(value, bound) {
                Some(Ordering::Less) => CheckOutcome::Failed(format!(
                    "{field} ({}) is before parent {parent_field} ({})",
                    value.to_key(),
                    bound.to_key()
                )),
                Some(_) => CheckOutcome::Passed,
                None => CheckOutcome::Failed(format!(
                    "{field} and parent {parent_field} cannot be compared"
                )),
            }
        }
    }
}

/// Returns true when a field gated by `predicate` must be populated.
pub fn predicate_holds(
    predicate: &PopulationPredicate,
    row: &Row,
    parents: &dyn ParentLookup,
) -> bool {
    let value = match predicate {
        PopulationPredicate::FieldIn { field, .. } => row.get(field),
        PopulationPredicate::ParentFieldIn {
            foreign_key, field, ..
        } => parents.parent(foreign_key).and_then(|parent| parent.get(field)),
    };
    match value {
        Some(value) if !value.is_null() => {
            let key = value.to_key();
            predicate.values().iter().any(|candidate| *candidate == key)
        }
        _ => false,
    }
}

/// `first.last`, lowercased, keeping only alphanumeric characters of each name.
pub fn email_local_part(first_name: &str, last_name: &str) -> String {
    format!("{}.{}", normalize_name(first_name), normalize_name(last_name))
}

pub fn email_matches_name(email: &str, first_name: &str, last_name: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if domain.is_empty() {
        return false;
    }
    local
        .strip_prefix(&email_local_part(first_name, last_name))
        .is_some_and(|suffix| suffix.chars().all(|ch| ch.is_ascii_digit()))
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn present<'r>(row: &'r Row, field: &str) -> Option<&'r GeneratedValue> {
    row.get(field).filter(|value| !value.is_null())
}
