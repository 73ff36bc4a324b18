//! Deterministic relational sampling for medsynth.
//!
//! Tables are generated parents first. The allocator decides how many rows a
//! table gets and which parent rows each one references; the row generator
//! draws field values and retries rows that break a constraint.

pub mod allocator;
pub mod checks;
pub mod dataset;
pub mod engine;
pub mod errors;
pub mod generators;
pub mod model;
pub mod output;
pub mod planner;
pub mod row;
pub mod seed;

pub use allocator::{Allocation, Assignment, ReferentialAllocator};
pub use checks::{CheckOutcome, ParentLookup, evaluate_constraint, predicate_holds};
pub use dataset::{Dataset, TableRows};
pub use engine::{GenerationEngine, GenerationResult, generate};
pub use errors::GenerationError;
pub use generators::{GeneratedValue, compare_values};
pub use model::{GenerateOptions, GenerationIssue, GenerationReport, TableReport};
pub use output::{CsvSink, JsonLinesSink, RowSink};
pub use row::{GeneratedRow, ParentContext, Row, RowGenerator, UniqueSet};
