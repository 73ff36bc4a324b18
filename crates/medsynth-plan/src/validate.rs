use std::collections::{HashMap, HashSet};

use jsonschema::JSONSchema;
use medsynth_core::{CardinalityPolicy, SchemaRegistry};
use serde_json::Value;

use crate::errors::{IssueSeverity, PlanError, ValidationIssue, ValidationReport};
use crate::model::{PLAN_VERSION, Plan};

/// Validated plan with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: Plan,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(
    plan_json: &Value,
    plan_schema: &Value,
) -> Result<ValidationReport, PlanError> {
    let compiled =
        JSONSchema::compile(plan_schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Validate a parsed plan against a schema registry.
pub fn validate_plan_against_registry(plan: &Plan, registry: &SchemaRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.plan_version != PLAN_VERSION {
        report.push_error(
            ValidationIssue::error(
                "plan_version_mismatch",
                "/plan_version",
                format!(
                    "plan_version '{}' is not supported (expected '{PLAN_VERSION}')",
                    plan.plan_version
                ),
            )
            .with_hint("set plan_version to the supported contract version"),
        );
    }

    validate_targets(plan, registry, &mut report);
    validate_cardinality(plan, registry, &mut report);
    validate_options(plan, &mut report);

    if report.is_ok() {
        check_reachable_targets(plan, registry, &mut report);
    }

    report
}

/// Validate the plan end-to-end, returning structured issues on failure.
pub fn validate_plan(
    plan_json: &Value,
    plan_schema: &Value,
    registry: &SchemaRegistry,
) -> Result<ValidatedPlan, ValidationReport> {
    let structural = match validate_plan_json(plan_json, plan_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_validation_error",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let plan: Plan = match serde_json::from_value(plan_json.clone()) {
        Ok(plan) => plan,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "invalid_plan_json",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };

    let registry_report = validate_plan_against_registry(&plan, registry);
    if !registry_report.is_ok() {
        return Err(registry_report);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: registry_report.warnings,
    })
}

fn validate_targets(plan: &Plan, registry: &SchemaRegistry, report: &mut ValidationReport) {
    if plan.targets.is_empty() {
        report.push_error(ValidationIssue::error(
            "targets_empty",
            "/targets",
            "plan must declare at least one target",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, target) in plan.targets.iter().enumerate() {
        let path = format!("/targets/{idx}");

        if !registry.contains(&target.table) {
            report.push_error(
                ValidationIssue::error(
                    "unknown_table",
                    format!("{path}/table"),
                    format!("table '{}' is not part of the schema", target.table),
                )
                .with_hint("check the table name against `medsynth schema`"),
            );
            continue;
        }

        if target.rows == 0 {
            report.push_error(ValidationIssue::error(
                "rows_zero",
                format!("{path}/rows"),
                format!("target '{}' must request at least one row", target.table),
            ));
        }

        if !seen.insert(target.table.as_str()) {
            report.push_error(ValidationIssue::error(
                "duplicate_target",
                path,
                format!("table '{}' is targeted more than once", target.table),
            ));
        }
    }

    let targeted: HashSet<&str> = plan
        .targets
        .iter()
        .map(|target| target.table.as_str())
        .collect();
    for table in registry.tables() {
        if table.driving_foreign_key().is_none() && !targeted.contains(table.name.as_str()) {
            report.push_error(
                ValidationIssue::error(
                    "missing_target",
                    "/targets",
                    format!("table '{}' has no per-parent relationship and needs a row target", table.name),
                )
                .with_hint("add a target with the number of rows to generate"),
            );
        }
    }
}

fn validate_cardinality(plan: &Plan, registry: &SchemaRegistry, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for (idx, rule) in plan.cardinality.iter().enumerate() {
        let path = format!("/cardinality/{idx}");

        let table = match registry.lookup(&rule.table) {
            Ok(table) => table,
            Err(_) => {
                report.push_error(ValidationIssue::error(
                    "cardinality_unknown_table",
                    format!("{path}/table"),
                    format!("table '{}' is not part of the schema", rule.table),
                ));
                continue;
            }
        };

        match table.foreign_key(&rule.foreign_key) {
            Some(fk) if fk.cardinality.is_per_parent() => {}
            Some(_) => report.push_error(
                ValidationIssue::error(
                    "cardinality_not_per_parent",
                    format!("{path}/foreign_key"),
                    format!(
                        "'{}.{}' is an independent relationship",
                        rule.table, rule.foreign_key
                    ),
                )
                .with_hint("only per-parent relationships have child-count bounds"),
            ),
            None => report.push_error(ValidationIssue::error(
                "cardinality_not_per_parent",
                format!("{path}/foreign_key"),
                format!("'{}' has no foreign key on '{}'", rule.table, rule.foreign_key),
            )),
        }

        if rule.min > rule.max {
            report.push_error(ValidationIssue::error(
                "cardinality_inverted",
                path.clone(),
                format!("min {} is greater than max {}", rule.min, rule.max),
            ));
        }

        if !seen.insert((rule.table.as_str(), rule.foreign_key.as_str())) {
            report.push_error(ValidationIssue::error(
                "duplicate_cardinality",
                path,
                format!(
                    "'{}.{}' has more than one cardinality override",
                    rule.table, rule.foreign_key
                ),
            ));
        }
    }
}

fn validate_options(plan: &Plan, report: &mut ValidationReport) {
    if plan.max_attempts_row() == Some(0) {
        report.push_error(ValidationIssue::error(
            "max_attempts_zero",
            "/options/max_attempts_row",
            "max_attempts_row must be at least 1",
        ));
    }
}

/// Warn about child targets that the per-parent bounds cannot reach.
fn check_reachable_targets(plan: &Plan, registry: &SchemaRegistry, report: &mut ValidationReport) {
    let overrides: HashMap<(&str, &str), (u32, u32)> = plan
        .cardinality
        .iter()
        .map(|rule| ((rule.table.as_str(), rule.foreign_key.as_str()), (rule.min, rule.max)))
        .collect();
    let targets = plan.target_rows();

    let mut ranges: HashMap<&str, (u64, u64)> = HashMap::new();
    for name in registry.graph().topological_order() {
        let Ok(table) = registry.lookup(name) else {
            continue;
        };
        let range = match table.driving_foreign_key() {
            None => {
                let rows = targets.get(name).copied().unwrap_or(0);
                (rows, rows)
            }
            Some(fk) => {
                let (min, max) = overrides
                    .get(&(name.as_str(), fk.field.as_str()))
                    .copied()
                    .or_else(|| match fk.cardinality {
                        CardinalityPolicy::PerParent { min, max } => Some((min, max)),
                        CardinalityPolicy::Independent => None,
                    })
                    .unwrap_or((0, 0));
                let (lo, hi) = ranges
                    .get(fk.references_table.as_str())
                    .copied()
                    .unwrap_or((0, 0));
                let reachable = (
                    lo.saturating_mul(u64::from(min)),
                    hi.saturating_mul(u64::from(max)),
                );
                match targets.get(name) {
                    Some(&rows) if rows < reachable.0 || rows > reachable.1 => {
                        let idx = plan
                            .targets
                            .iter()
                            .position(|target| &target.table == name)
                            .unwrap_or(0);
                        report.push_warning(
                            ValidationIssue::warning(
                                "target_clamped",
                                format!("/targets/{idx}/rows"),
                                format!(
                                    "target {rows} for '{name}' is outside the reachable range {}..={} and will be clamped",
                                    reachable.0, reachable.1
                                ),
                            )
                            .with_hint("child targets are advisory; adjust parent targets or cardinality bounds"),
                        );
                        (rows.clamp(reachable.0, reachable.1), rows.clamp(reachable.0, reachable.1))
                    }
                    Some(&rows) => (rows, rows),
                    None => reachable,
                }
            }
        };
        ranges.insert(name.as_str(), range);
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardinalityRule, PlanOptions};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::hospital().expect("hospital registry")
    }

    #[test]
    fn default_plan_is_clean() {
        let report = validate_plan_against_registry(&Plan::hospital_default(7), &registry());
        assert!(report.is_ok(), "{}", report.summary());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn root_tables_need_targets() {
        let mut plan = Plan::hospital_default(7);
        plan.targets.retain(|target| target.table != "staff");
        let report = validate_plan_against_registry(&plan, &registry());
        assert!(report.has_code("missing_target"));
    }

    #[test]
    fn unreachable_child_target_warns() {
        let mut plan = Plan::hospital_default(7);
        for target in plan.targets.iter_mut() {
            if target.table == "diagnoses" {
                target.rows = 5_000;
            }
        }
        let report = validate_plan_against_registry(&plan, &registry());
        assert!(report.is_ok());
        assert!(report.has_code("target_clamped"));
    }

    #[test]
    fn cardinality_rules_are_checked() {
        let mut plan = Plan::hospital_default(7);
        plan.cardinality = vec![
            CardinalityRule {
                table: "admissions".to_string(),
                foreign_key: "ward_id".to_string(),
                min: 1,
                max: 2,
            },
            CardinalityRule {
                table: "diagnoses".to_string(),
                foreign_key: "admission_id".to_string(),
                min: 3,
                max: 1,
            },
        ];
        plan.options = Some(PlanOptions {
            max_attempts_row: Some(0),
            parallel: None,
        });
        let report = validate_plan_against_registry(&plan, &registry());
        assert!(report.has_code("cardinality_not_per_parent"));
        assert!(report.has_code("cardinality_inverted"));
        assert!(report.has_code("max_attempts_zero"));
    }

    #[test]
    fn empty_pointer_is_root() {
        assert_eq!(normalized_json_pointer(""), "/");
        assert_eq!(normalized_json_pointer("/seed"), "/seed");
    }
}
