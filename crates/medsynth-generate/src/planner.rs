use std::collections::BTreeMap;

use medsynth_core::{SchemaError, SchemaRegistry};

use crate::errors::GenerationError;

/// Planned generation task for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub table: String,
    /// Exact for tables without a per-parent relationship, advisory otherwise.
    pub target: Option<u64>,
}

/// Group tables into dependency levels. Tables of one level only reference
/// tables of earlier levels and can be generated concurrently.
pub fn plan_levels(
    registry: &SchemaRegistry,
    targets: &BTreeMap<String, u64>,
) -> Result<Vec<Vec<GenerationTask>>, GenerationError> {
    if let Some(unknown) = targets.keys().find(|name| !registry.contains(name)) {
        return Err(SchemaError::UnknownTable(unknown.clone()).into());
    }

    let mut levels = Vec::new();
    for level in registry.graph().levels() {
        let mut tasks = Vec::with_capacity(level.len());
        for name in level {
            let table = registry.lookup(&name)?;
            let target = targets.get(&name).copied();
            if target.is_none() && table.driving_foreign_key().is_none() {
                return Err(GenerationError::MissingTarget(name));
            }
            tasks.push(GenerationTask {
                table: name,
                target,
            });
        }
        levels.push(tasks);
    }

    if levels.is_empty() {
        return Err(GenerationError::InvalidPlan(
            "schema has no tables to generate".to_string(),
        ));
    }

    Ok(levels)
}
