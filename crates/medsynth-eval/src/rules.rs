//! Per-field domain checks: value type plus the range, set or format of the
//! field's generation rule.

use std::fmt::Display;

use chrono::{NaiveDate, NaiveDateTime};
use medsynth_core::{FieldSpec, GenerationRule};
use medsynth_generate::GeneratedValue;
use regex::Regex;
use uuid::Uuid;

/// Domain checker for one field; pattern rules are compiled once.
#[derive(Debug)]
pub(crate) struct FieldDomain<'t> {
    spec: &'t FieldSpec,
    pattern: Option<Regex>,
}

impl<'t> FieldDomain<'t> {
    pub(crate) fn prepare(spec: &'t FieldSpec) -> Result<Self, String> {
        let pattern = match &spec.rule {
            GenerationRule::Pattern { regex } => Some(
                Regex::new(&format!("^(?:{regex})$"))
                    .map_err(|err| format!("pattern for {} does not compile: {err}", spec.name))?,
            ),
            _ => None,
        };
        Ok(Self { spec, pattern })
    }

    /// Fallback used when the pattern cannot be compiled: only the type is checked.
    pub(crate) fn type_only(spec: &'t FieldSpec) -> Self {
        Self {
            spec,
            pattern: None,
        }
    }

    /// Check a non-null value.
    pub(crate) fn check(&self, value: &GeneratedValue) -> Result<(), String> {
        if !value.matches_type(self.spec.field_type) {
            return Err(format!(
                "expected a {} value, found '{}'",
                self.spec.field_type.as_str(),
                value.to_key()
            ));
        }

        match &self.spec.rule {
            GenerationRule::Sequence { prefix, width } => {
                let text = value.as_str().unwrap_or_default();
                let digits = text.strip_prefix(prefix.as_str()).unwrap_or_default();
                if digits.len() >= *width && !digits.is_empty() && is_digits(digits) {
                    Ok(())
                } else {
                    Err(format!(
                        "'{text}' is not '{prefix}' followed by {width} or more digits"
                    ))
                }
            }
            GenerationRule::Uuid => {
                let text = value.as_str().unwrap_or_default();
                Uuid::parse_str(text)
                    .map(|_| ())
                    .map_err(|_| format!("'{text}' is not a uuid"))
            }
            GenerationRule::Choice { values, .. } => {
                let key = value.to_key();
                if values.iter().any(|candidate| *candidate == key) {
                    Ok(())
                } else {
                    Err(format!("'{key}' is not one of {}", values.join(", ")))
                }
            }
            GenerationRule::IntRange { min, max } => match value.as_i64() {
                Some(number) if (*min..=*max).contains(&number) => Ok(()),
                _ => Err(out_of_range(value, min, max)),
            },
            GenerationRule::FloatRange { min, max, .. } => match value.as_f64() {
                Some(number) if number >= *min && number <= *max => Ok(()),
                _ => Err(out_of_range(value, min, max)),
            },
            GenerationRule::DateRange { min, max, .. } => check_date(value, *min, *max),
            GenerationRule::TimestampRange { min, max } => check_timestamp(value, *min, *max),
            GenerationRule::Pattern { regex } => {
                let text = value.as_str().unwrap_or_default();
                match &self.pattern {
                    Some(compiled) if !compiled.is_match(text) => {
                        Err(format!("'{text}' does not match /{regex}/"))
                    }
                    _ => Ok(()),
                }
            }
            GenerationRule::Email { domain, .. } => {
                let text = value.as_str().unwrap_or_default();
                match text.split_once('@') {
                    Some((local, host)) if !local.is_empty() && host == domain.as_str() => Ok(()),
                    _ => Err(format!("'{text}' is not an address at {domain}")),
                }
            }
            GenerationRule::ForeignKey
            | GenerationRule::ParentField { .. }
            | GenerationRule::OffsetDays { .. } => Ok(()),
        }
    }
}

fn check_date(value: &GeneratedValue, min: NaiveDate, max: NaiveDate) -> Result<(), String> {
    match value.as_date() {
        Some(date) if date >= min && date <= max => Ok(()),
        _ => Err(out_of_range(value, &min, &max)),
    }
}

fn check_timestamp(
    value: &GeneratedValue,
    min: NaiveDateTime,
    max: NaiveDateTime,
) -> Result<(), String> {
    match value.as_datetime() {
        Some(stamp) if stamp >= min && stamp <= max => Ok(()),
        _ => Err(out_of_range(value, &min, &max)),
    }
}

fn out_of_range(value: &GeneratedValue, min: &dyn Display, max: &dyn Display) -> String {
    format!("'{}' is outside [{min}, {max}]", value.to_key())
}

fn is_digits(text: &str) -> bool {
    text.chars().all(|ch| ch.is_ascii_digit())
}
