//! Post-hoc validation of generated datasets.

pub mod errors;
pub mod load;
pub mod model;
pub mod report;
mod rules;
pub mod validator;

pub use errors::EvalError;
pub use load::load_dataset_csv;
pub use model::{TableSummary, ValidationOutcome, ValidationSummary, Violation, ViolationKind};
pub use report::{render_report, write_violations};
pub use validator::{validate, validate_with_summary};
