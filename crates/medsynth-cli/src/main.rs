mod registry;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use medsynth_core::{SCHEMA_VERSION, SchemaError, SchemaRegistry};
use medsynth_eval::{
    EvalError, load_dataset_csv, render_report, validate_with_summary, write_violations,
};
use medsynth_generate::{
    CsvSink, GenerateOptions, GenerationEngine, GenerationError, JsonLinesSink, RowSink,
};
use medsynth_plan::{
    Plan, PlanError, PlanOptions, ValidatedPlan, dataset_json_schema, load_plan, load_schema,
    plan_json_schema_value, read_document, validate_plan, validate_plan_against_registry,
};
use registry::{LogFormat, RunContext, init_logging, start_run, write_json};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_SEED: u64 = 42;
const REPORT_EXAMPLES: usize = 20;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("dataset has {0} violation(s)")]
    Violations(u64),
}

#[derive(Parser, Debug)]
#[command(name = "medsynth", version, about = "Synthetic hospital dataset generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a dataset into a new run directory.
    Generate(GenerateArgs),
    /// Validate a CSV dataset directory against the schema.
    Validate(ValidateArgs),
    /// Check a plan file without generating.
    CheckPlan(CheckPlanArgs),
    /// Print the built-in schema or a JSON Schema contract.
    Schema(SchemaArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Jsonl,
}

impl OutputFormat {
    fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Plan file (.json or .toml); defaults to the built-in hospital row counts.
    #[arg(long)]
    plan: Option<PathBuf>,
    /// Dataset schema file (.json or .toml); defaults to the built-in hospital schema.
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Override the plan seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    out_dir: PathBuf,
    /// Table file format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
    /// Generate tables one at a time.
    #[arg(long, default_value_t = false)]
    sequential: bool,
    /// Exit with an error when validation finds violations.
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Console log format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Directory holding `<domain>/<table>.csv` files.
    dir: PathBuf,
    /// Dataset schema file; defaults to the built-in hospital schema.
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Write the full violation list to this path.
    #[arg(long)]
    violations: Option<PathBuf>,
    /// Exit with an error when violations are found.
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Console log format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Args, Debug)]
struct CheckPlanArgs {
    /// Plan file (.json or .toml).
    plan: PathBuf,
    /// Dataset schema file; defaults to the built-in hospital schema.
    #[arg(long)]
    schema: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Print the JSON Schema of the dataset schema format.
    #[arg(long, default_value_t = false, conflicts_with = "plan_json_schema")]
    json_schema: bool,
    /// Print the JSON Schema of the plan format.
    #[arg(long, default_value_t = false)]
    plan_json_schema: bool,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Validate(args) => run_validate(args),
        Command::CheckPlan(args) => run_check_plan(args),
        Command::Schema(args) => run_schema(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs {
        plan,
        schema,
        seed,
        out_dir,
        format,
        sequential,
        strict,
        log_format,
    } = args;

    let registry = load_registry(schema.as_deref())?;
    let ValidatedPlan {
        plan: mut resolved,
        warnings,
    } = match plan.as_deref() {
        Some(path) => load_plan(path, &registry)?,
        None => default_plan(&registry)?,
    };
    if let Some(seed) = seed {
        resolved.seed = seed;
    }

    let defaults = GenerateOptions::default();
    let options = GenerateOptions {
        max_attempts_row: resolved
            .max_attempts_row()
            .unwrap_or(defaults.max_attempts_row),
        parallel: !sequential && resolved.parallel().unwrap_or(defaults.parallel),
    };
    resolved.options = Some(PlanOptions {
        max_attempts_row: Some(options.max_attempts_row),
        parallel: Some(options.parallel),
    });
    let registry = resolved.apply_cardinality(&registry)?;

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        dataset: registry.name().to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        plan_version: resolved.plan_version.clone(),
        seed: resolved.seed,
        plan_path: plan.clone(),
        schema_path: schema.clone(),
        format: format.as_str().to_string(),
        parallel: options.parallel,
        max_attempts_row: options.max_attempts_row,
        strict,
        out_dir,
    };

    let run_paths = start_run(&run_ctx)?;
    init_logging(log_format, Some(&run_paths.log_path))?;

    info!(
        event = "run_started",
        run_id = %run_id,
        dataset = %run_ctx.dataset,
        seed = resolved.seed
    );
    for issue in &warnings {
        warn!(event = "plan_warning", code = %issue.code, path = %issue.path, message = %issue.message);
    }

    let timer = Instant::now();
    let engine = GenerationEngine::new(options);
    let result = engine.run_plan(&registry, &resolved)?;

    let mut sink: Box<dyn RowSink> = match format {
        OutputFormat::Csv => Box::new(CsvSink::new(&run_paths.root)),
        OutputFormat::Jsonl => Box::new(JsonLinesSink::new(&run_paths.root)),
    };
    let bytes = result.dataset.write_to(&registry, sink.as_mut())?;
    info!(
        event = "dataset_written",
        path = %run_paths.root.display(),
        format = format.as_str(),
        bytes
    );

    write_json(&run_paths.generation_report_path, &result.report)?;

    let outcome = validate_with_summary(&result.dataset, &registry);
    std::fs::write(
        &run_paths.validation_report_path,
        render_report(&outcome, REPORT_EXAMPLES),
    )
    .map_err(registry::RegistryError::from)?;
    if !outcome.is_clean() {
        write_violations(&run_paths.violations_path, &outcome.violations)?;
        warn!(
            event = "validation_failed",
            violations = outcome.summary.violations_total,
            path = %run_paths.violations_path.display()
        );
    }

    info!(
        event = "run_finished",
        status = if outcome.is_clean() { "success" } else { "violations" },
        rows = result.report.rows_total,
        fingerprint = %result.dataset.fingerprint(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    println!("{}", run_paths.root.display());

    if strict && !outcome.is_clean() {
        return Err(CliError::Violations(outcome.summary.violations_total));
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    init_logging(args.log_format, None)?;

    let registry = load_registry(args.schema.as_deref())?;
    let dataset = load_dataset_csv(&args.dir, &registry)?;
    let outcome = validate_with_summary(&dataset, &registry);

    info!(
        event = "validation_finished",
        dir = %args.dir.display(),
        rows = outcome.summary.rows_checked,
        violations = outcome.summary.violations_total
    );
    println!("{}", render_report(&outcome, REPORT_EXAMPLES));

    if let Some(path) = &args.violations {
        write_violations(path, &outcome.violations)?;
    }
    if args.strict && !outcome.is_clean() {
        return Err(CliError::Violations(outcome.summary.violations_total));
    }
    Ok(())
}

fn run_check_plan(args: CheckPlanArgs) -> Result<(), CliError> {
    let registry = load_registry(args.schema.as_deref())?;
    let plan_json = read_document(&args.plan)?;
    let plan_schema = plan_json_schema_value()?;

    match validate_plan(&plan_json, &plan_schema, &registry) {
        Ok(validated) => {
            for issue in &validated.warnings {
                println!("{issue}");
            }
            println!(
                "plan ok: {} target(s), seed {}",
                validated.plan.targets.len(),
                validated.plan.seed
            );
            Ok(())
        }
        Err(report) => {
            for issue in report.errors.iter().chain(&report.warnings) {
                println!("{issue}");
            }
            Err(CliError::InvalidPlan(report.summary()))
        }
    }
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let document = if args.json_schema {
        serde_json::to_string_pretty(&dataset_json_schema())?
    } else if args.plan_json_schema {
        serde_json::to_string_pretty(&plan_json_schema_value()?)?
    } else {
        serde_json::to_string_pretty(&SchemaRegistry::hospital()?.to_schema())?
    };
    println!("{document}");
    Ok(())
}

fn load_registry(path: Option<&Path>) -> Result<SchemaRegistry, CliError> {
    match path {
        Some(path) => Ok(load_schema(path)?),
        None => Ok(SchemaRegistry::hospital()?),
    }
}

fn default_plan(registry: &SchemaRegistry) -> Result<ValidatedPlan, CliError> {
    let plan = Plan::hospital_default(DEFAULT_SEED);
    let report = validate_plan_against_registry(&plan, registry);
    if !report.is_ok() {
        return Err(CliError::InvalidPlan(report.summary()));
    }
    Ok(ValidatedPlan {
        plan,
        warnings: report.warnings,
    })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_flags_parse() {
        let cli = Cli::try_parse_from([
            "medsynth",
            "generate",
            "--plan",
            "plans/hospital.plan.toml",
            "--seed",
            "7",
            "--format",
            "jsonl",
            "--sequential",
            "--log-format",
            "json",
        ])
        .expect("parse");
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.format, OutputFormat::Jsonl);
        assert!(args.sequential);
        assert!(!args.strict);
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.out_dir, PathBuf::from("runs"));
    }

    #[test]
    fn schema_flags_conflict() {
        let err = Cli::try_parse_from(["medsynth", "schema", "--json-schema", "--plan-json-schema"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn default_plan_fits_hospital_schema() {
        let registry = SchemaRegistry::hospital().expect("registry");
        let validated = default_plan(&registry).expect("default plan");
        assert_eq!(validated.plan.seed, DEFAULT_SEED);
        assert!(validated.warnings.is_empty());
    }
}
