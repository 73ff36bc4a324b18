//! Core contracts for medsynth.
//!
//! This crate defines the declarative dataset schema (tables, fields,
//! generation rules, relationships and cross-field constraints), the schema
//! registry that validates it, the relationship graph that orders tables for
//! generation, and the built-in hospital dataset.

pub mod constraints;
pub mod error;
pub mod graph;
pub mod hospital;
pub mod registry;
pub mod schema;
pub mod types;
pub mod vocabulary;

pub use constraints::{CardinalityPolicy, CrossFieldConstraint, ForeignKeySpec};
pub use error::{Result, SchemaError};
pub use graph::{GraphSummary, RelationshipEdge, RelationshipGraph};
pub use hospital::{DEFAULT_TARGETS, HOSPITAL_DATASET, hospital_schema};
pub use registry::SchemaRegistry;
pub use schema::{DatasetSchema, Domain, FieldSpec, TableSchema};
pub use types::{FieldType, GenerationRule, PopulationPredicate};

/// Current contract version for dataset schema documents.
pub const SCHEMA_VERSION: &str = "0.1";
