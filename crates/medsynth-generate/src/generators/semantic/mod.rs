use medsynth_core::{FieldSpec, GenerationRule, TableSchema};
use rand::Rng;

use crate::checks::email_local_part;
use crate::errors::GenerationError;
use crate::generators::{GeneratedValue, GeneratorContext};

const MAX_SUFFIX_DIGITS: u32 = 9;

/// Rules that build realistic values out of sibling fields.
#[derive(Debug, Clone)]
pub enum Semantic {
    Email {
        first_name: String,
        last_name: String,
        domain: String,
        suffix_digits: u32,
    },
}

impl Semantic {
    pub fn prepare(table: &TableSchema, field: &FieldSpec) -> Result<Self, GenerationError> {
        match &field.rule {
            GenerationRule::Email {
                first_name,
                last_name,
                domain,
                suffix_digits,
            } => {
                if *suffix_digits > MAX_SUFFIX_DIGITS {
                    return Err(GenerationError::invalid_rule(
                        &table.name,
                        &field.name,
                        format!("suffix_digits must be at most {MAX_SUFFIX_DIGITS}"),
                    ));
                }
                Ok(Semantic::Email {
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    domain: domain.clone(),
                    suffix_digits: *suffix_digits,
                })
            }
            other => Err(GenerationError::invalid_rule(
                &table.name,
                &field.name,
                format!("'{}' is not a semantic rule", other.id()),
            )),
        }
    }

    pub fn generate(&self, ctx: &mut GeneratorContext<'_, '_>) -> GeneratedValue {
        match self {
            Semantic::Email {
                first_name,
                last_name,
                domain,
                suffix_digits,
            } => {
                let first = ctx.row.get(first_name).and_then(GeneratedValue::as_str);
                let last = ctx.row.get(last_name).and_then(GeneratedValue::as_str);
                let (Some(first), Some(last)) = (first, last) else {
                    return GeneratedValue::Null;
                };

                let local = email_local_part(first, last);
                let suffix = if *suffix_digits == 0 {
                    String::new()
                } else {
                    let upper = 10_u64.pow(*suffix_digits);
                    ctx.rng.random_range(1..upper).to_string()
                };
                GeneratedValue::Text(format!("{local}{suffix}@{domain}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use medsynth_core::{Domain, FieldType};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::row::{ParentContext, Row};

    #[test]
    fn email_is_built_from_names() {
        let fields = vec![
            FieldSpec::new(
                "first_name",
                FieldType::Text,
                GenerationRule::Choice {
                    values: vec!["Anna Maria".to_string()],
                    weights: None,
                },
            ),
            FieldSpec::new(
                "last_name",
                FieldType::Text,
                GenerationRule::Choice {
                    values: vec!["Rossi".to_string()],
                    weights: None,
                },
            ),
            FieldSpec::new(
                "email",
                FieldType::Text,
                GenerationRule::Email {
                    first_name: "first_name".to_string(),
                    last_name: "last_name".to_string(),
                    domain: "example.it".to_string(),
                    suffix_digits: 2,
                },
            ),
        ];
        let table = TableSchema {
            name: "people".to_string(),
            domain: Domain::Clinical,
            primary_key: "email".to_string(),
            fields,
            foreign_keys: Vec::new(),
            constraints: Vec::new(),
            comment: None,
        };

        let mut row = Row::empty(Arc::new(table.field_names()));
        row.set(0, GeneratedValue::Text("Anna Maria".to_string()));
        row.set(1, GeneratedValue::Text("Rossi".to_string()));

        let semantic = Semantic::prepare(&table, &table.fields[2]).expect("prepare");
        let parents = ParentContext::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut ctx = GeneratorContext {
            table: &table,
            ordinal: 1,
            row: &row,
            parents: &parents,
            rng: &mut rng,
        };
        let value = semantic.generate(&mut ctx);
        let email = value.as_str().expect("email");

        let (local, domain) = email.split_once('@').expect("at sign");
        assert_eq!(domain, "example.it");
        let digits = local.strip_prefix("annamaria.rossi").expect("name prefix");
        assert!(!digits.is_empty() && digits.len() <= 2);
        assert!(digits.chars().all(|ch| ch.is_ascii_digit()));
    }
}
