use medsynth_core::SchemaError;
use thiserror::Error;

/// Errors emitted by the generation engine.
///
/// Every variant is fatal to the run; no partial dataset is returned.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(
        "row {row_index} of '{table}' violated its constraints {attempts} times in a row (last failure: {reason})"
    )]
    ConstraintUnsatisfiable {
        table: String,
        row_index: u64,
        attempts: u32,
        reason: String,
    },
    #[error("table '{table}' references '{parent}', which has no rows")]
    NoParentsAvailable { table: String, parent: String },
    #[error("table '{0}' needs a row target")]
    MissingTarget(String),
    #[error("invalid rule for '{table}.{field}': {message}")]
    InvalidRule {
        table: String,
        field: String,
        message: String,
    },
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("generation cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl GenerationError {
    pub(crate) fn invalid_rule(table: &str, field: &str, message: impl Into<String>) -> Self {
        GenerationError::InvalidRule {
            table: table.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}
