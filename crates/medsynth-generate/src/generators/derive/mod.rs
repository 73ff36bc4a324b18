use chrono::Duration;
use medsynth_core::{FieldSpec, GenerationRule, TableSchema};

use crate::checks::ParentLookup;
use crate::errors::GenerationError;
use crate::generators::{GeneratedValue, GeneratorContext};

/// Rules whose value is a function of the parent row or of sibling fields.
#[derive(Debug, Clone)]
pub enum Derived {
    /// Copy the referenced key of the parent picked for `field`.
    ForeignKey {
        table: String,
        field: String,
        references_field: String,
    },
    ParentField {
        table: String,
        field: String,
        foreign_key: String,
        parent_field: String,
    },
    OffsetDays {
        base: String,
        days: String,
    },
}

impl Derived {
    pub fn prepare(table: &TableSchema, field: &FieldSpec) -> Result<Self, GenerationError> {
        match &field.rule {
            GenerationRule::ForeignKey => {
                let fk = table.foreign_key(&field.name).ok_or_else(|| {
                    GenerationError::invalid_rule(
                        &table.name,
                        &field.name,
                        "foreign_key rule without a matching relationship",
                    )
                })?;
                Ok(Derived::ForeignKey {
                    table: table.name.clone(),
                    field: field.name.clone(),
                    references_field: fk.references_field.clone(),
                })
            }
            GenerationRule::ParentField {
                foreign_key,
                field: parent_field,
            } => Ok(Derived::ParentField {
                table: table.name.clone(),
                field: field.name.clone(),
                foreign_key: foreign_key.clone(),
                parent_field: parent_field.clone(),
            }),
            GenerationRule::OffsetDays { base, days } => Ok(Derived::OffsetDays {
                base: base.clone(),
                days: days.clone(),
            }),
            other => Err(GenerationError::invalid_rule(
                &table.name,
                &field.name,
                format!("'{}' is not a derived rule", other.id()),
            )),
        }
    }

    pub fn generate(
        &self,
        ctx: &mut GeneratorContext<'_, '_>,
    ) -> Result<GeneratedValue, GenerationError> {
        match self {
            Derived::ForeignKey {
                table,
                field,
                references_field,
            } => parent_value(ctx, table, field, field, references_field),
            Derived::ParentField {
                table,
                field,
                foreign_key,
                parent_field,
            } => parent_value(ctx, table, field, foreign_key, parent_field),
            Derived::OffsetDays { base, days } => {
                let base = ctx.row.get(base).cloned().unwrap_or(GeneratedValue::Null);
                let Some(days) = ctx.row.get(days).and_then(GeneratedValue::as_i64) else {
                    return Ok(GeneratedValue::Null);
                };
                Ok(match base {
                    GeneratedValue::Date(date) => GeneratedValue::Date(date + Duration::days(days)),
                    GeneratedValue::Timestamp(ts) => {
                        GeneratedValue::Timestamp(ts + Duration::days(days))
                    }
                    _ => GeneratedValue::Null,
                })
            }
        }
    }
}

fn parent_value(
    ctx: &GeneratorContext<'_, '_>,
    table: &str,
    field: &str,
    foreign_key: &str,
    parent_field: &str,
) -> Result<GeneratedValue, GenerationError> {
    let parent = ctx.parents.parent(foreign_key).ok_or_else(|| {
        GenerationError::invalid_rule(
            table,
            field,
            format!("no parent row supplied for '{foreign_key}'"),
        )
    })?;
    Ok(parent
        .get(parent_field)
        .cloned()
        .unwrap_or(GeneratedValue::Null))
}
