use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Foreign key from a child field to the primary key of a parent table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeySpec {
    /// Child field holding the reference.
    pub field: String,
    pub references_table: String,
    /// Referenced field; must be the parent's primary key.
    pub references_field: String,
    #[serde(default)]
    pub cardinality: CardinalityPolicy,
}

/// How child rows are spread over parent rows for one relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CardinalityPolicy {
    /// Each parent row receives between `min` and `max` children (inclusive).
    /// This relationship decides how many child rows exist.
    PerParent { min: u32, max: u32 },
    /// Each child row picks its parent uniformly at random.
    #[default]
    Independent,
}

impl CardinalityPolicy {
    pub fn is_per_parent(&self) -> bool {
        matches!(self, CardinalityPolicy::PerParent { .. })
    }

    /// Inclusive child-count bounds for per-parent relationships.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        match self {
            CardinalityPolicy::PerParent { min, max } => Some((*min, *max)),
            CardinalityPolicy::Independent => None,
        }
    }
}

/// Predicate over fields of one row, or a row and its parent row.
///
/// A constraint whose operands are null holds vacuously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossFieldConstraint {
    /// `earlier <= later`, or `earlier < later` when `strict`.
    FieldOrder {
        earlier: String,
        later: String,
        #[serde(default)]
        strict: bool,
    },
    /// Integer field `days` equals the whole days between `start` and `end`.
    DayDelta {
        start: String,
        end: String,
        days: String,
    },
    /// Local part of `email` is `first.last`, optionally followed by digits.
    EmailMatchesName {
        email: String,
        first_name: String,
        last_name: String,
    },
    /// `field` equals `parent_field` of the row referenced by `foreign_key`.
    MatchesParent {
        field: String,
        foreign_key: String,
        parent_field: String,
    },
    /// `field` is not earlier than `parent_field` of the referenced row.
    NotBeforeParent {
        field: String,
        foreign_key: String,
        parent_field: String,
    },
}

impl CrossFieldConstraint {
    /// Short human-readable label, e.g. `field_order(admit_ts <= discharge_ts)`.
    pub fn name(&self) -> String {
        match self {
            CrossFieldConstraint::FieldOrder {
                earlier,
                later,
                strict,
            } => {
                let op = if *strict { "<" } else { "<=" };
                format!("field_order({earlier} {op} {later})")
            }
            CrossFieldConstraint::DayDelta { start, end, days } => {
                format!("day_delta({days} = {end} - {start})")
            }
            CrossFieldConstraint::EmailMatchesName {
                email,
                first_name,
                last_name,
            } => format!("email_matches_name({email} ~ {first_name}.{last_name})"),
            CrossFieldConstraint::MatchesParent {
                field,
                foreign_key,
                parent_field,
            } => format!("matches_parent({field} = {foreign_key}->{parent_field})"),
            CrossFieldConstraint::NotBeforeParent {
                field,
                foreign_key,
                parent_field,
            } => format!("not_before_parent({field} >= {foreign_key}->{parent_field})"),
        }
    }

    /// Fields of the constrained row the predicate reads.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            CrossFieldConstraint::FieldOrder { earlier, later, .. } => {
                vec![earlier.as_str(), later.as_str()]
            }
            CrossFieldConstraint::DayDelta { start, end, days } => {
                vec![start.as_str(), end.as_str(), days.as_str()]
            }
            CrossFieldConstraint::EmailMatchesName {
                email,
                first_name,
                last_name,
            } => vec![email.as_str(), first_name.as_str(), last_name.as_str()],
            CrossFieldConstraint::MatchesParent {
                field, foreign_key, ..
            }
            | CrossFieldConstraint::NotBeforeParent {
                field, foreign_key, ..
            } => vec![field.as_str(), foreign_key.as_str()],
        }
    }

    /// Foreign key field and parent field read from the parent row, if any.
    pub fn parent_reference(&self) -> Option<(&str, &str)> {
        match self {
            CrossFieldConstraint::MatchesParent {
                foreign_key,
                parent_field,
                ..
            }
            | CrossFieldConstraint::NotBeforeParent {
                foreign_key,
                parent_field,
                ..
            } => Some((foreign_key.as_str(), parent_field.as_str())),
            _ => None,
        }
    }
}
