use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{RegistryError, RegistryResult};

/// Metadata captured at run start.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub run_id: String,
    #[serde(serialize_with = "rfc3339")]
    pub started_at: DateTime<Utc>,
    pub dataset: String,
    pub schema_version: String,
    pub plan_version: String,
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,
    pub format: String,
    pub parallel: bool,
    pub max_attempts_row: u32,
    pub strict: bool,
    #[serde(skip)]
    pub out_dir: PathBuf,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
struct RunConfig<'a> {
    #[serde(flatten)]
    context: &'a RunContext,
    git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub log_path: PathBuf,
    pub generation_report_path: PathBuf,
    pub validation_report_path: PathBuf,
    pub violations_path: PathBuf,
}

/// Create `<out>/<timestamp>__run_<run_id>/` and write its `config.json`.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.out_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        context: ctx,
        git: collect_git_info(),
    };
    write_json(&root.join("config.json"), &config)?;

    let log_path = root.join("run.log");
    OpenOptions::new().create(true).append(true).open(&log_path)?;

    Ok(RunPaths {
        log_path,
        generation_report_path: root.join("generation_report.json"),
        validation_report_path: root.join("validation_report.md"),
        violations_path: root.join("violations.json"),
        root,
    })
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

fn rfc3339<S: serde::Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_run_creates_directory_and_config() {
        let out_dir = std::env::temp_dir().join(format!("medsynth-runs-{}", uuid::Uuid::new_v4()));
        let ctx = RunContext {
            run_id: "abc".to_string(),
            started_at: DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z")
                .expect("timestamp")
                .with_timezone(&Utc),
            dataset: "hospital".to_string(),
            schema_version: "0.1".to_string(),
            plan_version: "0.1".to_string(),
            seed: 42,
            plan_path: None,
            schema_path: None,
            format: "csv".to_string(),
            parallel: true,
            max_attempts_row: 50,
            strict: false,
            out_dir: out_dir.clone(),
        };

        let paths = start_run(&ctx).expect("start run");
        assert_eq!(paths.root, out_dir.join("2025-03-04T05-06-07Z__run_abc"));
        assert!(paths.log_path.exists());

        let config: serde_json::Value = serde_json::from_slice(
            &std::fs::read(paths.root.join("config.json")).expect("config.json"),
        )
        .expect("config json");
        assert_eq!(config["run_id"], "abc");
        assert_eq!(config["seed"], 42);
        assert_eq!(config["started_at"], "2025-03-04T05:06:07+00:00");
        assert!(config.get("out_dir").is_none());
        assert!(config.get("git").is_some());

        std::fs::remove_dir_all(out_dir).ok();
    }
}
