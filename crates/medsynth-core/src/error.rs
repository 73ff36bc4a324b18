use thiserror::Error;

/// Schema-level errors raised while building or querying the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A table with the same name is already registered.
    #[error("duplicate table '{0}'")]
    DuplicateTable(String),
    /// The table definition violates an internal invariant.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// The requested table is not part of the registry.
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    /// Foreign keys form a cycle between the listed tables.
    #[error("foreign key cycle detected between: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Convenience alias for results returned by medsynth crates.
pub type Result<T> = std::result::Result<T, SchemaError>;
