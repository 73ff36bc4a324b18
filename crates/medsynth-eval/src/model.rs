use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A schema table has no rows container in the dataset.
    MissingTable,
    /// Dataset fields differ from the declared fields.
    FieldLayout,
    PrimaryKey,
    ForeignKey,
    NotNull,
    /// Value outside the type, set, range or format of its rule.
    Domain,
    /// Conditional field populated when it should be null, or the reverse.
    Population,
    CrossField,
    /// Parent row with a child count outside its per-parent bounds.
    Cardinality,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::MissingTable => "missing_table",
            ViolationKind::FieldLayout => "field_layout",
            ViolationKind::PrimaryKey => "primary_key",
            ViolationKind::ForeignKey => "foreign_key",
            ViolationKind::NotNull => "not_null",
            ViolationKind::Domain => "domain",
            ViolationKind::Population => "population",
            ViolationKind::CrossField => "cross_field",
            ViolationKind::Cardinality => "cardinality",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured violation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub table: String,
    /// Primary key of the offending row (the parent row for cardinality).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    /// Zero-based position of the row in its table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
    pub fields: Vec<String>,
    /// Rule or constraint identifier that was broken.
    pub rule: String,
    pub message: String,
}

impl Violation {
    pub(crate) fn new(kind: ViolationKind, table: &str, rule: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.to_string(),
            row_id: None,
            row_index: None,
            fields: Vec::new(),
            rule: rule.into(),
            message: String::new(),
        }
    }

    pub(crate) fn at_row(mut self, row_index: usize, row_id: Option<String>) -> Self {
        self.row_index = Some(row_index as u64);
        self.row_id = row_id;
        self
    }

    pub(crate) fn with_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = fields
            .iter()
            .map(|field| field.as_ref().to_string())
            .collect();
        self
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// `table[row_id].field` style location used in reports.
    pub fn location(&self) -> String {
        let mut location = self.table.clone();
        if let Some(row_id) = &self.row_id {
            location.push_str(&format!("[{row_id}]"));
        } else if let Some(row_index) = self.row_index {
            location.push_str(&format!("[#{row_index}]"));
        }
        if !self.fields.is_empty() {
            location.push('.');
            location.push_str(&self.fields.join(","));
        }
        location
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}): {}", self.kind, self.location(), self.rule, self.message)
    }
}

/// Row counts and findings per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table: String,
    pub rows: u64,
    pub violations: u64,
}

/// Aggregate counts over a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub tables: Vec<TableSummary>,
    pub rows_checked: u64,
    pub violations_total: u64,
    pub violations_by_kind: BTreeMap<String, u64>,
}

/// Violations plus their summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub summary: ValidationSummary,
    pub violations: Vec<Violation>,
}

impl ValidationOutcome {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}
