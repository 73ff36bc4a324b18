use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Logical value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Identifier string (primary or foreign key, codes).
    StringId,
    /// Closed set of labels.
    Categorical,
    Integer,
    Float,
    /// Calendar date without time of day.
    Date,
    /// Date and time at second resolution.
    Timestamp,
    /// Free-form text (names, addresses, contacts).
    Text,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::StringId => "string_id",
            FieldType::Categorical => "categorical",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
            FieldType::Text => "text",
        }
    }

    /// Returns true when values of this type are textual.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldType::StringId | FieldType::Categorical | FieldType::Text
        )
    }

    /// Returns true when values of this type are calendar based.
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Timestamp)
    }

    /// Returns true when values of this type can be ordered against each other.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Float | FieldType::Date | FieldType::Timestamp
        )
    }
}

/// How a field value is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationRule {
    /// Monotonic per-table identifier: `prefix` followed by a zero-padded ordinal.
    Sequence { prefix: String, width: usize },
    /// Random UUID token, checked against keys already issued for the table.
    Uuid,
    /// Label drawn from a closed set, optionally weighted.
    Choice {
        values: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weights: Option<Vec<f64>>,
    },
    /// Integer in `[min, max]`.
    IntRange { min: i64, max: i64 },
    /// Float in `[min, max]`, rounded to `scale` decimals when set.
    FloatRange {
        min: f64,
        max: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<u32>,
    },
    /// Calendar date in `[min, max]`; `not_before` names a sibling date that
    /// raises the lower bound for the row.
    DateRange {
        min: NaiveDate,
        max: NaiveDate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        not_before: Option<String>,
    },
    /// Timestamp in `[min, max]` at second resolution.
    TimestampRange {
        min: NaiveDateTime,
        max: NaiveDateTime,
    },
    /// String matching a regular expression.
    Pattern { regex: String },
    /// `first.last<digits>@domain`, built from sibling name fields.
    Email {
        first_name: String,
        last_name: String,
        domain: String,
        #[serde(default)]
        suffix_digits: u32,
    },
    /// Primary key of the parent row supplied by the allocator.
    ForeignKey,
    /// Copy of a field from the parent row referenced by `foreign_key`.
    ParentField { foreign_key: String, field: String },
    /// Sibling date or timestamp `base` shifted by the sibling day count `days`.
    OffsetDays { base: String, days: String },
}

impl GenerationRule {
    /// Stable identifier used in reports and error messages.
    pub fn id(&self) -> &'static str {
        match self {
            GenerationRule::Sequence { .. } => "sequence",
            GenerationRule::Uuid => "uuid",
            GenerationRule::Choice { .. } => "choice",
            GenerationRule::IntRange { .. } => "int_range",
            GenerationRule::FloatRange { .. } => "float_range",
            GenerationRule::DateRange { .. } => "date_range",
            GenerationRule::TimestampRange { .. } => "timestamp_range",
            GenerationRule::Pattern { .. } => "pattern",
            GenerationRule::Email { .. } => "email",
            GenerationRule::ForeignKey => "foreign_key",
            GenerationRule::ParentField { .. } => "parent_field",
            GenerationRule::OffsetDays { .. } => "offset_days",
        }
    }

    /// Sibling fields that must be drawn before this rule runs.
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            GenerationRule::DateRange {
                not_before: Some(field),
                ..
            } => vec![field.as_str()],
            GenerationRule::Email {
                first_name,
                last_name,
                ..
            } => vec![first_name.as_str(), last_name.as_str()],
            GenerationRule::OffsetDays { base, days } => vec![base.as_str(), days.as_str()],
            _ => Vec::new(),
        }
    }

    /// Returns true when the rule can produce values of `field_type`.
    pub fn supports(&self, field_type: FieldType) -> bool {
        match self {
            GenerationRule::Sequence { .. } | GenerationRule::Pattern { .. } => {
                matches!(field_type, FieldType::StringId | FieldType::Text)
            }
            GenerationRule::Uuid => field_type == FieldType::StringId,
            GenerationRule::Choice { .. } => {
                matches!(field_type, FieldType::Categorical | FieldType::Text)
            }
            GenerationRule::IntRange { .. } => field_type == FieldType::Integer,
            GenerationRule::FloatRange { .. } => field_type == FieldType::Float,
            GenerationRule::DateRange { .. } => field_type == FieldType::Date,
            GenerationRule::TimestampRange { .. } => field_type == FieldType::Timestamp,
            GenerationRule::Email { .. } => field_type == FieldType::Text,
            GenerationRule::ForeignKey => field_type == FieldType::StringId,
            GenerationRule::ParentField { .. } => true,
            GenerationRule::OffsetDays { .. } => field_type.is_temporal(),
        }
    }
}

/// Condition deciding whether a nullable field is populated for a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PopulationPredicate {
    /// Sibling field value is one of `values`.
    FieldIn { field: String, values: Vec<String> },
    /// Field of the parent row referenced by `foreign_key` is one of `values`.
    ParentFieldIn {
        foreign_key: String,
        field: String,
        values: Vec<String>,
    },
}

impl PopulationPredicate {
    /// Sibling field the predicate reads, if any.
    pub fn sibling_dependency(&self) -> Option<&str> {
        match self {
            PopulationPredicate::FieldIn { field, .. } => Some(field.as_str()),
            PopulationPredicate::ParentFieldIn { .. } => None,
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            PopulationPredicate::FieldIn { values, .. }
            | PopulationPredicate::ParentFieldIn { values, .. } => values,
        }
    }
}
