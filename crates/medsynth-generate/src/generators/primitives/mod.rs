use chrono::{Duration, NaiveDate, NaiveDateTime};
use medsynth_core::{FieldSpec, GenerationRule, TableSchema};
use rand::Rng;
use rand::distr::weighted::WeightedIndex;
use rand_regex::Regex as RandRegex;

use crate::errors::GenerationError;
use crate::generators::{GeneratedValue, GeneratorContext};

const DEFAULT_MAX_REPEAT: u32 = 32;

/// Rules that draw a value without looking at other fields, except the
/// optional lower bound of a date range.
#[derive(Debug, Clone)]
pub enum Primitive {
    Sequence {
        prefix: String,
        width: usize,
    },
    Uuid,
    Choice {
        values: Vec<String>,
        weights: Option<WeightedIndex<f64>>,
    },
    IntRange {
        min: i64,
        max: i64,
    },
    FloatRange {
        min: f64,
        max: f64,
        scale: Option<u32>,
    },
    DateRange {
        min: NaiveDate,
        max: NaiveDate,
        not_before: Option<String>,
    },
    TimestampRange {
        min: NaiveDateTime,
        max: NaiveDateTime,
    },
    Pattern(Box<RandRegex>),
}

impl Primitive {
    pub fn prepare(table: &TableSchema, field: &FieldSpec) -> Result<Self, GenerationError> {
        let invalid = |message: String| GenerationError::invalid_rule(&table.name, &field.name, message);

        let primitive = match &field.rule {
            GenerationRule::Sequence { prefix, width } => Primitive::Sequence {
                prefix: prefix.clone(),
                width: *width,
            },
            GenerationRule::Uuid => Primitive::Uuid,
            GenerationRule::Choice { values, weights } => {
                if values.is_empty() {
                    return Err(invalid("choice needs at least one value".to_string()));
                }
                let weights = match weights {
                    Some(weights) if weights.len() != values.len() => {
                        return Err(invalid(format!(
                            "{} weights for {} values",
                            weights.len(),
                            values.len()
                        )));
                    }
                    Some(weights) => Some(
                        WeightedIndex::new(weights.iter().copied())
                            .map_err(|err| invalid(format!("invalid weights: {err}")))?,
                    ),
                    None => None,
                };
                Primitive::Choice {
                    values: values.clone(),
                    weights,
                }
            }
            GenerationRule::IntRange { min, max } => {
                if min > max {
                    return Err(invalid(format!("min {min} is greater than max {max}")));
                }
                Primitive::IntRange {
                    min: *min,
                    max: *max,
                }
            }
            GenerationRule::FloatRange { min, max, scale } => {
                if !(min.is_finite() && max.is_finite()) || min > max {
                    return Err(invalid(format!("invalid float range {min}..={max}")));
                }
                Primitive::FloatRange {
                    min: *min,
                    max: *max,
                    scale: *scale,
                }
            }
            GenerationRule::DateRange {
                min,
                max,
                not_before,
            } => {
                if min > max {
                    return Err(invalid(format!("min {min} is after max {max}")));
                }
                Primitive::DateRange {
                    min: *min,
                    max: *max,
                    not_before: not_before.clone(),
                }
            }
            GenerationRule::TimestampRange { min, max } => {
                if min > max {
                    return Err(invalid(format!("min {min} is after max {max}")));
                }
                Primitive::TimestampRange {
                    min: *min,
                    max: *max,
                }
            }
            GenerationRule::Pattern { regex } => {
                let compiled = RandRegex::compile(regex, DEFAULT_MAX_REPEAT)
                    .map_err(|err| invalid(format!("invalid regex pattern '{regex}': {err}")))?;
                Primitive::Pattern(Box::new(compiled))
            }
            other => {
                return Err(invalid(format!("'{}' is not a primitive rule", other.id())));
            }
        };
        Ok(primitive)
    }

    pub fn generate(&self, ctx: &mut GeneratorContext<'_, '_>) -> GeneratedValue {
        match self {
            Primitive::Sequence { prefix, width } => {
                let ordinal = ctx.ordinal;
                GeneratedValue::Text(format!("{prefix}{ordinal:0width$}"))
            }
            Primitive::Uuid => {
                let bytes: [u8; 16] = ctx.rng.random();
                GeneratedValue::Text(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
            }
            Primitive::Choice { values, weights } => {
                let idx = match weights {
                    Some(weights) => ctx.rng.sample(weights),
                    None => ctx.rng.random_range(0..values.len()),
                };
                GeneratedValue::Text(values[idx].clone())
            }
            Primitive::IntRange { min, max } => GeneratedValue::Int(ctx.rng.random_range(*min..=*max)),
            Primitive::FloatRange { min, max, scale } => {
                let value = if min == max {
                    *min
                } else {
                    ctx.rng.random_range(*min..=*max)
                };
                GeneratedValue::Float(round_to_scale(value, *scale).clamp(*min, *max))
            }
            Primitive::DateRange {
                min,
                max,
                not_before,
            } => {
                let lower = not_before
                    .as_deref()
                    .and_then(|sibling| ctx.row.get(sibling))
                    .and_then(GeneratedValue::as_date)
                    .map_or(*min, |bound| bound.max(*min));
                if lower > *max {
                    // Unreachable for this row; the not-null check rejects it.
                    return GeneratedValue::Null;
                }
                let span = (*max - lower).num_days();
                let offset = ctx.rng.random_range(0..=span);
                GeneratedValue::Date(lower + Duration::days(offset))
            }
            Primitive::TimestampRange { min, max } => {
                let span = (*max - *min).num_seconds();
                let offset = ctx.rng.random_range(0..=span);
                GeneratedValue::Timestamp(*min + Duration::seconds(offset))
            }
            Primitive::Pattern(regex) => {
                let value: String = ctx.rng.sample(regex.as_ref());
                GeneratedValue::Text(value)
            }
        }
    }
}

fn round_to_scale(value: f64, scale: Option<u32>) -> f64 {
    match scale {
        Some(scale) => {
            let factor = 10_f64.powi(scale as i32);
            (value * factor).round() / factor
        }
        None => value,
    }
}
