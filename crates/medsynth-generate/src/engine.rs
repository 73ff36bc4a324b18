use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use medsynth_core::{SchemaRegistry, TableSchema};
use medsynth_plan::Plan;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::allocator::ReferentialAllocator;
use crate::dataset::{Dataset, TableRows};
use crate::errors::GenerationError;
use crate::model::{GenerateOptions, GenerationIssue, GenerationReport, TableReport};
use crate::planner::{GenerationTask, plan_levels};
use crate::row::{ParentContext, RowGenerator, UniqueSet};
use crate::seed::{allocation_rng, table_seed};

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub dataset: Dataset,
    pub report: GenerationReport,
}

/// Entry point for generating a dataset from a schema registry.
#[derive(Debug, Clone, Default)]
pub struct GenerationEngine {
    options: GenerateOptions,
}

struct TableOutput {
    rows: TableRows,
    report: TableReport,
    clamped: Option<(u64, u64)>,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Generate every table of `registry`. Root tables get exactly their
    /// target; child tables treat targets as advisory.
    pub fn run(
        &self,
        registry: &SchemaRegistry,
        targets: &BTreeMap<String, u64>,
        seed: u64,
    ) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();

        info!(
            dataset = %registry.name(),
            tables = registry.len(),
            seed,
            parallel = self.options.parallel,
            max_attempts_row = self.options.max_attempts_row,
            "generation started"
        );

        match self.run_levels(registry, targets, seed) {
            Ok((dataset, mut report)) => {
                report.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    tables = report.tables.len(),
                    rows = report.rows_total,
                    retries = report.retries_total,
                    warnings = report.warnings.len(),
                    duration_ms = report.duration_ms,
                    "generation completed"
                );
                Ok(GenerationResult { dataset, report })
            }
            Err(err) => {
                warn!(seed, error = %err, "generation failed");
                Err(err)
            }
        }
    }

    /// Run a validated plan: apply its cardinality overrides and options.
    pub fn run_plan(
        &self,
        registry: &SchemaRegistry,
        plan: &Plan,
    ) -> Result<GenerationResult, GenerationError> {
        let registry = plan.apply_cardinality(registry)?;
        let options = GenerateOptions {
            max_attempts_row: plan
                .max_attempts_row()
                .unwrap_or(self.options.max_attempts_row),
            parallel: plan.parallel().unwrap_or(self.options.parallel),
        };
        GenerationEngine::new(options).run(&registry, &plan.target_rows(), plan.seed)
    }

    fn run_levels(
        &self,
        registry: &SchemaRegistry,
        targets: &BTreeMap<String, u64>,
        seed: u64,
    ) -> Result<(Dataset, GenerationReport), GenerationError> {
        let levels = plan_levels(registry, targets)?;
        let mut done: HashMap<String, TableRows> = HashMap::new();
        let mut table_reports: HashMap<String, TableReport> = HashMap::new();
        let mut report = GenerationReport::new(seed);

        for level in &levels {
            let outputs = self.run_level(registry, level, seed, &done)?;
            for output in outputs {
                let name = output.rows.name.clone();
                if let Some((requested, allocated)) = output.clamped {
                    record_warning(
                        &mut report,
                        GenerationIssue::warning(
                            "child_target_clamped",
                            &name,
                            format!(
                                "target {requested} for '{name}' is outside what its per-parent bounds allow; generated {allocated}"
                            ),
                        ),
                    );
                }
                if output.rows.is_empty() {
                    record_warning(
                        &mut report,
                        GenerationIssue::warning(
                            "table_empty",
                            &name,
                            format!("no rows were generated for '{name}'"),
                        ),
                    );
                }
                table_reports.insert(name.clone(), output.report);
                done.insert(name, output.rows);
            }
        }

        let mut tables = Vec::with_capacity(done.len());
        for name in registry.graph().topological_order() {
            if let Some(rows) = done.remove(name) {
                tables.push(rows);
            }
            if let Some(table_report) = table_reports.remove(name) {
                report.record_table(table_report);
            }
        }

        Ok((Dataset::new(tables), report))
    }

    /// Generate the tables of one level, concurrently when enabled. The first
    /// failure raises a shared flag that stops sibling tasks.
    fn run_level(
        &self,
        registry: &SchemaRegistry,
        level: &[GenerationTask],
        seed: u64,
        done: &HashMap<String, TableRows>,
    ) -> Result<Vec<TableOutput>, GenerationError> {
        let cancel = AtomicBool::new(false);
        let run_task = |task: &GenerationTask| {
            let result = self.generate_table(registry, task, seed, done, &cancel);
            if let Err(err) = &result {
                if !matches!(err, GenerationError::Cancelled) {
                    cancel.store(true, Ordering::Relaxed);
                }
            }
            result
        };

        let outcomes: Vec<Result<TableOutput, GenerationError>> = if self.options.parallel {
            level.par_iter().map(run_task).collect()
        } else {
            level.iter().map(run_task).collect()
        };

        let mut outputs = Vec::with_capacity(outcomes.len());
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome {
                Ok(output) => outputs.push(output),
                Err(GenerationError::Cancelled) => cancelled = true,
                Err(err) => return Err(err),
            }
        }
        if cancelled {
            return Err(GenerationError::Cancelled);
        }
        Ok(outputs)
    }

    fn generate_table(
        &self,
        registry: &SchemaRegistry,
        task: &GenerationTask,
        seed: u64,
        done: &HashMap<String, TableRows>,
        cancel: &AtomicBool,
    ) -> Result<TableOutput, GenerationError> {
        let table_start = Instant::now();
        let table = registry.lookup(&task.table)?;
        let table_seed = table_seed(seed, &table.name);

        info!(
            table = %table.name,
            domain = table.domain.directory(),
            rows_target = ?task.target,
            "generating table"
        );

        let parent_tables = parent_tables(table, done)?;
        let parent_rows: HashMap<&str, usize> = table
            .foreign_keys
            .iter()
            .zip(&parent_tables)
            .map(|(fk, rows)| (fk.references_table.as_str(), rows.len()))
            .collect();

        let allocation = ReferentialAllocator::new(table).allocate(
            &parent_rows,
            task.target,
            &mut allocation_rng(table_seed),
        )?;

        let generator = RowGenerator::new(table, self.options.max_attempts_row)?;
        let mut unique = UniqueSet::for_table(table);
        let mut rows = Vec::with_capacity(allocation.assignments.len());
        let mut retries = 0_u64;

        for (row_index, assignment) in allocation.assignments.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                return Err(GenerationError::Cancelled);
            }

            let mut parents = ParentContext::new();
            for ((fk, parent), pick) in table
                .foreign_keys
                .iter()
                .zip(&parent_tables)
                .zip(&assignment.picks)
            {
                let row = parent.rows.get(*pick).ok_or_else(|| {
                    GenerationError::NoParentsAvailable {
                        table: table.name.clone(),
                        parent: fk.references_table.clone(),
                    }
                })?;
                parents = parents.with_parent(fk.field.as_str(), row);
            }

            let generated = generator.generate(row_index as u64, table_seed, &parents, &mut unique)?;
            retries += u64::from(generated.retries);
            rows.push(generated.row);
        }

        let duration_ms = table_start.elapsed().as_millis() as u64;
        info!(
            table = %table.name,
            rows_generated = rows.len(),
            retries,
            duration_ms,
            "table generated"
        );

        let rows_generated = rows.len() as u64;
        Ok(TableOutput {
            rows: TableRows::new(&table.name, std::sync::Arc::new(table.field_names()), rows),
            report: TableReport {
                table: table.name.clone(),
                domain: table.domain.directory().to_string(),
                rows_requested: task.target,
                rows_generated,
                retries,
                duration_ms,
            },
            clamped: allocation.clamped,
        })
    }
}

/// Generate a dataset with default options.
pub fn generate(
    registry: &SchemaRegistry,
    targets: &BTreeMap<String, u64>,
    seed: u64,
) -> Result<Dataset, GenerationError> {
    GenerationEngine::new(GenerateOptions::default())
        .run(registry, targets, seed)
        .map(|result| result.dataset)
}

fn parent_tables<'d>(
    table: &TableSchema,
    done: &'d HashMap<String, TableRows>,
) -> Result<Vec<&'d TableRows>, GenerationError> {
    table
        .foreign_keys
        .iter()
        .map(|fk| {
            done.get(&fk.references_table)
                .ok_or_else(|| GenerationError::NoParentsAvailable {
                    table: table.name.clone(),
                    parent: fk.references_table.clone(),
                })
        })
        .collect()
}

fn record_warning(report: &mut GenerationReport, issue: GenerationIssue) {
    log_issue(&issue);
    report.record_warning(issue);
}

fn log_issue(issue: &GenerationIssue) {
    warn!(
        code = %issue.code,
        table = issue.table.as_deref().unwrap_or(""),
        column = issue.column.as_deref().unwrap_or(""),
        message = %issue.message
    );
}
