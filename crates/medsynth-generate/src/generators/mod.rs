pub mod derive;
pub mod primitives;
pub mod semantic;

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use medsynth_core::{FieldSpec, FieldType, GenerationRule, TableSchema};
use rand_chacha::ChaCha8Rng;
use serde::{Serialize, Serializer};

use crate::errors::GenerationError;
use crate::row::{ParentContext, Row};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Generated value for a field.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl GeneratedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GeneratedValue::Null)
    }

    pub fn to_csv(&self, field: &FieldSpec) -> String {
        match self {
            GeneratedValue::Float(value) => match field.rule {
                GenerationRule::FloatRange {
                    scale: Some(scale), ..
                } => {
                    let scale = scale as usize;
                    format!("{value:.scale$}")
                }
                _ => value.to_string(),
            },
            other => other.to_key(),
        }
    }

    /// Parse a CSV cell written by [`GeneratedValue::to_csv`].
    pub fn from_csv(raw: &str, field: &FieldSpec) -> Result<GeneratedValue, String> {
        if raw.is_empty() {
            return Ok(GeneratedValue::Null);
        }
        match field.field_type {
            FieldType::StringId | FieldType::Categorical | FieldType::Text => {
                Ok(GeneratedValue::Text(raw.to_string()))
            }
            FieldType::Integer => raw
                .parse::<i64>()
                .map(GeneratedValue::Int)
                .map_err(|err| format!("'{raw}' is not an integer: {err}")),
            FieldType::Float => raw
                .parse::<f64>()
                .map(GeneratedValue::Float)
                .map_err(|err| format!("'{raw}' is not a number: {err}")),
            FieldType::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(GeneratedValue::Date)
                .map_err(|err| format!("'{raw}' is not a date: {err}")),
            FieldType::Timestamp => NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
                .map(GeneratedValue::Timestamp)
                .map_err(|err| format!("'{raw}' is not a timestamp: {err}")),
        }
    }

    /// Canonical text form, used for uniqueness keys and set membership.
    pub fn to_key(&self) -> String {
        match self {
            GeneratedValue::Null => String::new(),
            GeneratedValue::Int(value) => value.to_string(),
            GeneratedValue::Float(value) => value.to_string(),
            GeneratedValue::Text(value) => value.clone(),
            GeneratedValue::Date(value) => value.format(DATE_FORMAT).to_string(),
            GeneratedValue::Timestamp(value) => value.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Returns true when the value has the representation `field_type` expects.
    pub fn matches_type(&self, field_type: FieldType) -> bool {
        match self {
            GeneratedValue::Null => true,
            GeneratedValue::Int(_) => field_type == FieldType::Integer,
            GeneratedValue::Float(_) => field_type == FieldType::Float,
            GeneratedValue::Text(_) => field_type.is_textual(),
            GeneratedValue::Date(_) => field_type == FieldType::Date,
            GeneratedValue::Timestamp(_) => field_type == FieldType::Timestamp,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GeneratedValue::Int(value) => Some(*value as f64),
            GeneratedValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GeneratedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeneratedValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            GeneratedValue::Date(value) => Some(*value),
            GeneratedValue::Timestamp(value) => Some(value.date()),
            _ => None,
        }
    }

    /// Dates are promoted to midnight.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            GeneratedValue::Date(value) => Some(value.and_time(NaiveTime::MIN)),
            GeneratedValue::Timestamp(value) => Some(*value),
            _ => None,
        }
    }
}

/// Order two values of compatible kinds; `None` when they cannot be compared.
pub fn compare_values(left: &GeneratedValue, right: &GeneratedValue) -> Option<Ordering> {
    use GeneratedValue::*;
    match (left, right) {
        (Int(a), Int(b)) => Some(a.cmp(b)),
        (Int(_) | Float(_), Int(_) | Float(_)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Text(a), Text(b)) => Some(a.cmp(b)),
        (Date(a), Date(b)) => Some(a.cmp(b)),
        (Date(_) | Timestamp(_), Date(_) | Timestamp(_)) => {
            Some(left.as_datetime()?.cmp(&right.as_datetime()?))
        }
        _ => None,
    }
}

impl Serialize for GeneratedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GeneratedValue::Null => serializer.serialize_none(),
            GeneratedValue::Int(value) => serializer.serialize_i64(*value),
            GeneratedValue::Float(value) => serializer.serialize_f64(*value),
            GeneratedValue::Text(value) => serializer.serialize_str(value),
            GeneratedValue::Date(_) | GeneratedValue::Timestamp(_) => {
                serializer.serialize_str(&self.to_key())
            }
        }
    }
}

/// State visible to a field generator while a row is being drawn.
pub struct GeneratorContext<'a, 'p> {
    pub table: &'a TableSchema,
    /// One-based position of the row in its table.
    pub ordinal: u64,
    /// Fields drawn so far; later fields are still null.
    pub row: &'a Row,
    pub parents: &'a ParentContext<'p>,
    pub rng: &'a mut ChaCha8Rng,
}

/// A field's rule, prepared once per table.
#[derive(Debug, Clone)]
pub struct FieldGenerator {
    pub field: String,
    kind: Prepared,
}

#[derive(Debug, Clone)]
enum Prepared {
    Primitive(primitives::Primitive),
    Semantic(semantic::Semantic),
    Derived(derive::Derived),
}

impl FieldGenerator {
    pub fn prepare(table: &TableSchema, field: &FieldSpec) -> Result<Self, GenerationError> {
        let kind = match &field.rule {
            GenerationRule::Email { .. } => {
                Prepared::Semantic(semantic::Semantic::prepare(table, field)?)
            }
            GenerationRule::ForeignKey
            | GenerationRule::ParentField { .. }
            | GenerationRule::OffsetDays { .. } => {
                Prepared::Derived(derive::Derived::prepare(table, field)?)
            }
            _ => Prepared::Primitive(primitives::Primitive::prepare(table, field)?),
        };
        Ok(Self {
            field: field.name.clone(),
            kind,
        })
    }

    pub fn generate(&self, ctx: &mut GeneratorContext<'_, '_>) -> Result<GeneratedValue, GenerationError> {
        match &self.kind {
            Prepared::Primitive(primitive) => Ok(primitive.generate(ctx)),
            Prepared::Semantic(semantic) => Ok(semantic.generate(ctx)),
            Prepared::Derived(derived) => derived.generate(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(field_type: FieldType, rule: GenerationRule) -> FieldSpec {
        FieldSpec::new("value", field_type, rule)
    }

    #[test]
    fn floats_render_with_scale() {
        let spec = field(
            FieldType::Float,
            GenerationRule::FloatRange {
                min: 35.0,
                max: 40.5,
                scale: Some(1),
            },
        );
        assert_eq!(GeneratedValue::Float(37.0).to_csv(&spec), "37.0");
        assert_eq!(
            GeneratedValue::from_csv("37.0", &spec),
            Ok(GeneratedValue::Float(37.0))
        );
    }

    #[test]
    fn csv_cells_parse_by_field_type() {
        let stamp = field(
            FieldType::Timestamp,
            GenerationRule::OffsetDays {
                base: "a".to_string(),
                days: "b".to_string(),
            },
        );
        let parsed = GeneratedValue::from_csv("2024-01-10T08:00:00", &stamp).expect("timestamp");
        assert_eq!(parsed.to_csv(&stamp), "2024-01-10T08:00:00");
        assert_eq!(GeneratedValue::from_csv("", &stamp), Ok(GeneratedValue::Null));
        assert!(GeneratedValue::from_csv("yesterday", &stamp).is_err());
    }

    #[test]
    fn dates_compare_against_timestamps_at_midnight() {
        let date = GeneratedValue::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        let stamp = GeneratedValue::Timestamp(
            NaiveDate::from_ymd_opt(2024, 1, 10)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        );
        assert_eq!(compare_values(&date, &stamp), Some(Ordering::Less));
        assert_eq!(
            compare_values(&GeneratedValue::Int(3), &GeneratedValue::Float(3.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&GeneratedValue::Int(3), &GeneratedValue::Text("3".to_string())),
            None
        );
    }
}
