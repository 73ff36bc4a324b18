//! Generation plan contracts, loading and validation.

pub mod errors;
pub mod load;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{IssueSeverity, PlanError, ValidationIssue, ValidationReport};
pub use load::{load_plan, load_schema, read_document};
pub use model::{CardinalityRule, PLAN_VERSION, Plan, PlanOptions, Target};
pub use schema::{dataset_json_schema, plan_json_schema, plan_json_schema_value};
pub use validate::{
    ValidatedPlan, validate_plan, validate_plan_against_registry, validate_plan_json,
};
