use medsynth_core::DatasetSchema;
use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::errors::{PlanError, Result};
use crate::model::Plan;

/// Emit the JSON Schema for plan documents.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(Plan)
}

/// Emit the JSON Schema for dataset schema documents.
pub fn dataset_json_schema() -> RootSchema {
    schema_for!(DatasetSchema)
}

/// Plan JSON Schema as a JSON value, ready for validation.
pub fn plan_json_schema_value() -> Result<serde_json::Value> {
    serde_json::to_value(plan_json_schema()).map_err(PlanError::from)
}
