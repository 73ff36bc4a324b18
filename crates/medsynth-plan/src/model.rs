use std::collections::BTreeMap;

use medsynth_core::{DEFAULT_TARGETS, SchemaError, SchemaRegistry};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Contract version for plan documents.
pub const PLAN_VERSION: &str = "0.1";

/// Generation plan: seed, row targets and tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Plan contract version.
    pub plan_version: String,
    /// Master seed; equal seeds and plans give identical datasets.
    pub seed: u64,
    /// Row targets. Exact for root tables, advisory for per-parent children.
    pub targets: Vec<Target>,
    /// Per-parent child-count overrides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cardinality: Vec<CardinalityRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PlanOptions>,
}

/// A target table and requested row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Target {
    pub table: String,
    pub rows: u64,
}

/// Override of the child-count bounds of one per-parent relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CardinalityRule {
    pub table: String,
    /// Child field of the relationship.
    pub foreign_key: String,
    pub min: u32,
    pub max: u32,
}

/// Optional engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PlanOptions {
    /// Attempts per row before a constraint is declared unsatisfiable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts_row: Option<u32>,
    /// Generate independent tables of a level concurrently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
}

impl Plan {
    /// Plan with the default hospital row counts.
    pub fn hospital_default(seed: u64) -> Self {
        Self {
            plan_version: PLAN_VERSION.to_string(),
            seed,
            targets: DEFAULT_TARGETS
                .iter()
                .map(|(table, rows)| Target {
                    table: table.to_string(),
                    rows: *rows,
                })
                .collect(),
            cardinality: Vec::new(),
            options: None,
        }
    }

    /// Requested rows keyed by table.
    pub fn target_rows(&self) -> BTreeMap<String, u64> {
        self.targets
            .iter()
            .map(|target| (target.table.clone(), target.rows))
            .collect()
    }

    /// Registry with this plan's child-count overrides applied.
    pub fn apply_cardinality(
        &self,
        registry: &SchemaRegistry,
    ) -> Result<SchemaRegistry, SchemaError> {
        let mut current = registry.clone();
        for rule in &self.cardinality {
            current = current.with_cardinality(&rule.table, &rule.foreign_key, rule.min, rule.max)?;
        }
        Ok(current)
    }

    pub fn max_attempts_row(&self) -> Option<u32> {
        self.options.as_ref().and_then(|opts| opts.max_attempts_row)
    }

    pub fn parallel(&self) -> Option<bool> {
        self.options.as_ref().and_then(|opts| opts.parallel)
    }
}
