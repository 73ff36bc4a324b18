use std::path::Path;

use crate::errors::EvalError;
use crate::model::{ValidationOutcome, Violation, ViolationKind};

/// Render a deterministic markdown report for a validation pass.
pub fn render_report(outcome: &ValidationOutcome, max_examples: usize) -> String {
    let summary = &outcome.summary;
    let mut lines = Vec::new();

    lines.push("# Medsynth Validation Report".to_string());
    lines.push(String::new());
    lines.push("## Summary".to_string());
    lines.push(format!("- tables: {}", summary.tables.len()));
    lines.push(format!("- rows_checked: {}", summary.rows_checked));
    lines.push(format!("- violations: {}", summary.violations_total));
    lines.push(String::new());

    lines.push("## Tables".to_string());
    lines.push("| table | rows | violations |".to_string());
    lines.push("| --- | --- | --- |".to_string());
    for table in &summary.tables {
        lines.push(format!(
            "| {} | {} | {} |",
            table.table, table.rows, table.violations
        ));
    }
    lines.push(String::new());

    if !summary.violations_by_kind.is_empty() {
        lines.push("## Violations by kind".to_string());
        lines.push("| kind | count |".to_string());
        lines.push("| --- | --- |".to_string());
        for (kind, count) in &summary.violations_by_kind {
            lines.push(format!("| {kind} | {count} |"));
        }
        lines.push(String::new());
    }

    if !outcome.violations.is_empty() {
        lines.push("## Top violations".to_string());
        for violation in outcome.violations.iter().take(max_examples) {
            lines.push(format!(
                "- {} `{}` ({}): {}",
                violation.kind,
                violation.location(),
                violation.rule,
                violation.message
            ));
        }
        let hidden = outcome.violations.len().saturating_sub(max_examples);
        if hidden > 0 {
            lines.push(format!("- ... {hidden} more in violations.json"));
        }
        lines.push(String::new());
    }

    lines.push("## Recommendations".to_string());
    lines.extend(recommendations(&outcome.violations));
    lines.join("\n")
}

/// Persist the full violation list as pretty JSON.
pub fn write_violations(path: &Path, violations: &[Violation]) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(violations)?)?;
    Ok(())
}

fn recommendations(violations: &[Violation]) -> Vec<String> {
    let has = |kind: ViolationKind| violations.iter().any(|violation| violation.kind == kind);
    let mut lines = Vec::new();
    if has(ViolationKind::MissingTable) || has(ViolationKind::FieldLayout) {
        lines.push("- regenerate the dataset with the same schema it is validated against.".to_string());
    }
    if has(ViolationKind::PrimaryKey) || has(ViolationKind::ForeignKey) {
        lines.push("- check that parent tables were written alongside their children.".to_string());
    }
    if has(ViolationKind::Domain) || has(ViolationKind::NotNull) || has(ViolationKind::Population) {
        lines.push("- compare field rules with the values found; the data was edited or produced by another schema.".to_string());
    }
    if has(ViolationKind::CrossField) {
        lines.push("- raise max_attempts_row or relax the failing constraint.".to_string());
    }
    if has(ViolationKind::Cardinality) {
        lines.push("- review per-parent bounds and cardinality overrides in the plan.".to_string());
    }
    if violations.is_empty() {
        lines.push("- no violations detected; compare fingerprints across runs for drift.".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TableSummary, ValidationSummary};

    fn outcome(violations: Vec<Violation>) -> ValidationOutcome {
        let mut summary = ValidationSummary {
            tables: vec![TableSummary {
                table: "wards".to_string(),
                rows: 2,
                violations: violations.len() as u64,
            }],
            rows_checked: 2,
            violations_total: violations.len() as u64,
            ..ValidationSummary::default()
        };
        for violation in &violations {
            *summary
                .violations_by_kind
                .entry(violation.kind.as_str().to_string())
                .or_default() += 1;
        }
        ValidationOutcome {
            summary,
            violations,
        }
    }

    #[test]
    fn clean_report_has_no_violation_section() {
        let report = render_report(&outcome(Vec::new()), 10);
        assert!(report.starts_with("# Medsynth Validation Report"));
        assert!(report.contains("| wards | 2 | 0 |"));
        assert!(!report.contains("## Top violations"));
        assert!(report.contains("no violations detected"));
    }

    #[test]
    fn examples_are_capped() {
        let violations = (0..3)
            .map(|idx| {
                Violation::new(ViolationKind::Domain, "wards", "int_range")
                    .at_row(idx, Some(format!("W00{idx}")))
                    .with_fields(&["floor"])
                    .with_message("'9' is outside [0, 8]")
            })
            .collect();
        let report = render_report(&outcome(violations), 2);
        assert!(report.contains("- domain `wards[W000].floor` (int_range)"));
        assert!(!report.contains("W002"));
        assert!(report.contains("1 more in violations.json"));
        assert!(report.contains("| domain | 3 |"));
    }
}
