use std::fs;
use std::path::Path;

use medsynth_core::{DatasetSchema, SchemaRegistry};
use serde_json::Value;

use crate::errors::{PlanError, Result};
use crate::schema::plan_json_schema_value;
use crate::validate::{ValidatedPlan, validate_plan};

/// Read a `.json` or `.toml` document into a JSON value.
pub fn read_document(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(serde_json::from_str(&contents)?),
        Some("toml") => {
            let value: toml::Value = toml::from_str(&contents)?;
            Ok(serde_json::to_value(value)?)
        }
        other => Err(PlanError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

/// Load and fully validate a plan file against a registry.
pub fn load_plan(path: &Path, registry: &SchemaRegistry) -> Result<ValidatedPlan> {
    let plan_json = read_document(path)?;
    let plan_schema = plan_json_schema_value()?;
    validate_plan(&plan_json, &plan_schema, registry).map_err(PlanError::Invalid)
}

/// Load a dataset schema document and build its registry.
pub fn load_schema(path: &Path) -> Result<SchemaRegistry> {
    let document = read_document(path)?;
    let schema: DatasetSchema = serde_json::from_value(document)?;
    Ok(SchemaRegistry::from_schema(schema)?)
}
