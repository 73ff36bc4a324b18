use std::collections::{BTreeSet, HashMap};

use crate::SCHEMA_VERSION;
use crate::constraints::{CardinalityPolicy, CrossFieldConstraint, ForeignKeySpec};
use crate::error::{Result, SchemaError};
use crate::graph::RelationshipGraph;
use crate::hospital::{HOSPITAL_DATASET, hospital_tables};
use crate::schema::{DatasetSchema, FieldSpec, TableSchema};
use crate::types::{FieldType, GenerationRule, PopulationPredicate};

/// Validated, read-only catalog of table schemas and their relationship graph.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    name: String,
    tables: Vec<TableSchema>,
    graph: RelationshipGraph,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            name: "dataset".to_string(),
            tables: Vec::new(),
            graph: RelationshipGraph::default(),
        }
    }

    /// Build a registry from a complete set of tables.
    ///
    /// References are resolved against the whole set, so declaration order
    /// does not matter; cyclic foreign keys fail with [`SchemaError::Cycle`].
    pub fn from_tables(tables: Vec<TableSchema>) -> Result<Self> {
        let mut names = BTreeSet::new();
        for table in &tables {
            if !names.insert(table.name.as_str()) {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
        }

        for table in &tables {
            check_table(table)?;
        }

        let by_name: HashMap<&str, &TableSchema> = tables
            .iter()
            .map(|table| (table.name.as_str(), table))
            .collect();
        for table in &tables {
            check_references(table, |name| by_name.get(name).copied())?;
        }

        let graph = RelationshipGraph::build(&tables)?;
        Ok(Self {
            name: "dataset".to_string(),
            tables,
            graph,
        })
    }

    pub fn from_schema(schema: DatasetSchema) -> Result<Self> {
        let mut registry = Self::from_tables(schema.tables)?;
        registry.name = schema.name;
        Ok(registry)
    }

    /// Registry for the built-in hospital dataset.
    pub fn hospital() -> Result<Self> {
        let mut registry = Self::from_tables(hospital_tables())?;
        registry.name = HOSPITAL_DATASET.to_string();
        Ok(registry)
    }

    /// Register one table. Referenced parents must already be registered.
    pub fn register_table(&mut self, table: TableSchema) -> Result<()> {
        if self.contains(&table.name) {
            return Err(SchemaError::DuplicateTable(table.name));
        }
        if table
            .foreign_keys
            .iter()
            .any(|fk| fk.references_table == table.name)
        {
            return Err(SchemaError::Cycle(vec![table.name]));
        }

        check_table(&table)?;
        check_references(&table, |name| {
            self.tables.iter().find(|candidate| candidate.name == name)
        })?;

        self.tables.push(table);
        self.graph = RelationshipGraph::build(&self.tables)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookup(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.iter().any(|table| table.name == name)
    }

    /// Tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    /// Copy of the registry with new per-parent bounds for one relationship.
    pub fn with_cardinality(
        &self,
        table: &str,
        foreign_key: &str,
        min: u32,
        max: u32,
    ) -> Result<Self> {
        let mut tables = self.tables.clone();
        let target = tables
            .iter_mut()
            .find(|candidate| candidate.name == table)
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))?;
        let fk = target
            .foreign_keys
            .iter_mut()
            .find(|fk| fk.field == foreign_key)
            .ok_or_else(|| {
                SchemaError::InvalidSchema(format!(
                    "'{table}' has no foreign key on '{foreign_key}'"
                ))
            })?;
        if !fk.cardinality.is_per_parent() {
            return Err(SchemaError::InvalidSchema(format!(
                "'{table}.{foreign_key}' is not a per-parent relationship"
            )));
        }
        fk.cardinality = CardinalityPolicy::PerParent { min, max };

        let mut registry = Self::from_tables(tables)?;
        registry.name = self.name.clone();
        Ok(registry)
    }

    pub fn to_schema(&self) -> DatasetSchema {
        DatasetSchema {
            schema_version: SCHEMA_VERSION.to_string(),
            name: self.name.clone(),
            tables: self.tables.clone(),
        }
    }
}

fn invalid(message: String) -> SchemaError {
    SchemaError::InvalidSchema(message)
}

/// Checks that only need the table itself.
fn check_table(table: &TableSchema) -> Result<()> {
    let name = &table.name;
    if name.trim().is_empty() {
        return Err(invalid("table name must not be empty".to_string()));
    }
    if table.fields.is_empty() {
        return Err(invalid(format!("table '{name}' has no fields")));
    }

    let mut seen = BTreeSet::new();
    for field in &table.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(invalid(format!("duplicate field '{name}.{}'", field.name)));
        }
    }

    let pk = table.field(&table.primary_key).ok_or_else(|| {
        invalid(format!(
            "primary key '{}' is not a field of '{name}'",
            table.primary_key
        ))
    })?;
    if pk.nullable || pk.populate_when.is_some() {
        return Err(invalid(format!(
            "primary key '{name}.{}' must not be nullable",
            pk.name
        )));
    }

    let mut fk_fields = BTreeSet::new();
    let mut per_parent = 0;
    for fk in &table.foreign_keys {
        if !fk_fields.insert(fk.field.as_str()) {
            return Err(invalid(format!(
                "duplicate foreign key on '{name}.{}'",
                fk.field
            )));
        }
        let field = table.field(&fk.field).ok_or_else(|| {
            invalid(format!("foreign key field '{name}.{}' does not exist", fk.field))
        })?;
        if field.rule != GenerationRule::ForeignKey {
            return Err(invalid(format!(
                "foreign key field '{name}.{}' must use the foreign_key rule",
                fk.field
            )));
        }
        if let CardinalityPolicy::PerParent { min, max } = fk.cardinality {
            per_parent += 1;
            if min > max {
                return Err(invalid(format!(
                    "child count bounds for '{name}.{}' are inverted ({min} > {max})",
                    fk.field
                )));
            }
        }
    }
    if per_parent > 1 {
        return Err(invalid(format!(
            "table '{name}' declares more than one per-parent relationship"
        )));
    }

    for field in &table.fields {
        check_field_rule(table, field.name.as_str(), field.field_type, &field.rule)?;

        if let Some(predicate) = &field.populate_when {
            if !field.nullable {
                return Err(invalid(format!(
                    "conditionally populated field '{name}.{}' must be nullable",
                    field.name
                )));
            }
            if predicate.values().is_empty() {
                return Err(invalid(format!(
                    "population predicate of '{name}.{}' has no values",
                    field.name
                )));
            }
            match predicate {
                PopulationPredicate::FieldIn { field: sibling, .. } => {
                    require_field(table, sibling)?;
                }
                PopulationPredicate::ParentFieldIn { foreign_key, .. } => {
                    require_foreign_key(table, foreign_key)?;
                }
            }
        }
    }

    for constraint in &table.constraints {
        check_constraint(table, constraint)?;
    }

    table.generation_order()?;
    Ok(())
}

fn check_field_rule(
    table: &TableSchema,
    field: &str,
    field_type: FieldType,
    rule: &GenerationRule,
) -> Result<()> {
    let name = &table.name;
    if !rule.supports(field_type) {
        return Err(invalid(format!(
            "rule '{}' cannot produce {} values for '{name}.{field}'",
            rule.id(),
            field_type.as_str()
        )));
    }

    match rule {
        GenerationRule::Choice { values, weights } => {
            if values.is_empty() {
                return Err(invalid(format!("choice for '{name}.{field}' has no values")));
            }
            if let Some(weights) = weights {
                if weights.len() != values.len() {
                    return Err(invalid(format!(
                        "choice for '{name}.{field}' has {} weights for {} values",
                        weights.len(),
                        values.len()
                    )));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0)
                    || weights.iter().sum::<f64>() <= 0.0
                {
                    return Err(invalid(format!(
                        "choice weights for '{name}.{field}' must be non-negative with a positive sum"
                    )));
                }
            }
        }
        GenerationRule::IntRange { min, max } => {
            if min > max {
                return Err(invalid(format!("range for '{name}.{field}' is inverted")));
            }
        }
        GenerationRule::FloatRange { min, max, .. } => {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(invalid(format!("range for '{name}.{field}' is invalid")));
            }
        }
        GenerationRule::DateRange {
            min,
            max,
            not_before,
        } => {
            if min > max {
                return Err(invalid(format!("range for '{name}.{field}' is inverted")));
            }
            if let Some(sibling) = not_before {
                let sibling = require_field(table, sibling)?;
                if sibling.field_type != FieldType::Date {
                    return Err(invalid(format!(
                        "lower bound '{}' of '{name}.{field}' must be a date",
                        sibling.name
                    )));
                }
            }
        }
        GenerationRule::TimestampRange { min, max } => {
            if min > max {
                return Err(invalid(format!("range for '{name}.{field}' is inverted")));
            }
        }
        GenerationRule::Pattern { regex } => {
            if regex.is_empty() {
                return Err(invalid(format!("pattern for '{name}.{field}' is empty")));
            }
        }
        GenerationRule::Email {
            first_name,
            last_name,
            domain,
            suffix_digits,
        } => {
            for sibling in [first_name, last_name] {
                if !require_field(table, sibling)?.field_type.is_textual() {
                    return Err(invalid(format!(
                        "email source '{sibling}' of '{name}.{field}' must be textual"
                    )));
                }
            }
            if domain.is_empty() || *suffix_digits > 9 {
                return Err(invalid(format!(
                    "email rule for '{name}.{field}' needs a domain and at most 9 digits"
                )));
            }
        }
        GenerationRule::ForeignKey => {
            if table.foreign_key(field).is_none() {
                return Err(invalid(format!(
                    "field '{name}.{field}' uses the foreign_key rule without a foreign key"
                )));
            }
        }
        GenerationRule::ParentField { foreign_key, .. } => {
            require_foreign_key(table, foreign_key)?;
        }
        GenerationRule::OffsetDays { base, days } => {
            if require_field(table, base)?.field_type != field_type {
                return Err(invalid(format!(
                    "offset base '{base}' of '{name}.{field}' must share its type"
                )));
            }
            if require_field(table, days)?.field_type != FieldType::Integer {
                return Err(invalid(format!(
                    "offset '{days}' of '{name}.{field}' must be an integer"
                )));
            }
        }
        GenerationRule::Sequence { .. } | GenerationRule::Uuid => {}
    }

    Ok(())
}

fn check_constraint(table: &TableSchema, constraint: &CrossFieldConstraint) -> Result<()> {
    let name = &table.name;
    for field in constraint.fields() {
        require_field(table, field)?;
    }

    match constraint {
        CrossFieldConstraint::FieldOrder { earlier, later, .. } => {
            let earlier = require_field(table, earlier)?;
            let later = require_field(table, later)?;
            let comparable = (earlier.field_type.is_temporal() && later.field_type.is_temporal())
                || (!earlier.field_type.is_temporal()
                    && earlier.field_type.is_ordered()
                    && later.field_type.is_ordered()
                    && !later.field_type.is_temporal());
            if !comparable {
                return Err(invalid(format!(
                    "{} on '{name}' compares incompatible fields",
                    constraint.name()
                )));
            }
        }
        CrossFieldConstraint::DayDelta { start, end, days } => {
            if !require_field(table, start)?.field_type.is_temporal()
                || !require_field(table, end)?.field_type.is_temporal()
                || require_field(table, days)?.field_type != FieldType::Integer
            {
                return Err(invalid(format!(
                    "{} on '{name}' needs temporal bounds and an integer day count",
                    constraint.name()
                )));
            }
        }
        CrossFieldConstraint::EmailMatchesName { .. } => {}
        CrossFieldConstraint::MatchesParent { foreign_key, .. }
        | CrossFieldConstraint::NotBeforeParent { foreign_key, .. } => {
            require_foreign_key(table, foreign_key)?;
        }
    }

    Ok(())
}

/// Checks that resolve parent tables through `lookup`.
fn check_references<'a, F>(table: &TableSchema, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<&'a TableSchema>,
{
    let name = &table.name;
    let parent_for = |foreign_key: &str| -> Result<&'a TableSchema> {
        let fk = require_foreign_key(table, foreign_key)?;
        lookup(&fk.references_table).ok_or_else(|| {
            invalid(format!(
                "'{name}.{}' references unregistered table '{}'",
                fk.field, fk.references_table
            ))
        })
    };

    for fk in &table.foreign_keys {
        let parent = parent_for(&fk.field)?;
        if fk.references_field != parent.primary_key {
            return Err(invalid(format!(
                "'{name}.{}' must reference the primary key of '{}' ('{}'), not '{}'",
                fk.field, parent.name, parent.primary_key, fk.references_field
            )));
        }
        let child_type = require_field(table, &fk.field)?.field_type;
        let parent_type = require_field(parent, &parent.primary_key)?.field_type;
        if child_type != parent_type {
            return Err(invalid(format!(
                "'{name}.{}' type does not match '{}.{}'",
                fk.field, parent.name, parent.primary_key
            )));
        }
    }

    for field in &table.fields {
        if let GenerationRule::ParentField {
            foreign_key,
            field: parent_field,
        } = &field.rule
        {
            let parent = parent_for(foreign_key)?;
            if require_field(parent, parent_field)?.field_type != field.field_type {
                return Err(invalid(format!(
                    "'{name}.{}' does not share the type of '{}.{parent_field}'",
                    field.name, parent.name
                )));
            }
        }
        if let Some(PopulationPredicate::ParentFieldIn {
            foreign_key,
            field: parent_field,
            ..
        }) = &field.populate_when
        {
            require_field(parent_for(foreign_key)?, parent_field)?;
        }
    }

    for constraint in &table.constraints {
        if let Some((foreign_key, parent_field)) = constraint.parent_reference() {
            let parent_field = require_field(parent_for(foreign_key)?, parent_field)?;
            if let CrossFieldConstraint::NotBeforeParent { field, .. } = constraint {
                let own = require_field(table, field)?;
                if !own.field_type.is_temporal() || !parent_field.field_type.is_temporal() {
                    return Err(invalid(format!(
                        "{} on '{name}' needs temporal fields",
                        constraint.name()
                    )));
                }
            }
        }
    }

    Ok(())
}

fn require_field<'t>(table: &'t TableSchema, field: &str) -> Result<&'t FieldSpec> {
    table.field(field).ok_or_else(|| {
        invalid(format!(
            "field '{field}' referenced in '{}' does not exist",
            table.name
        ))
    })
}

fn require_foreign_key<'t>(
    table: &'t TableSchema,
    field: &str,
) -> Result<&'t ForeignKeySpec> {
    table.foreign_key(field).ok_or_else(|| {
        invalid(format!(
            "'{}.{field}' is not a declared foreign key",
            table.name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ForeignKeySpec;
    use crate::schema::{Domain, FieldSpec};

    fn simple(name: &str) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            domain: Domain::Operational,
            primary_key: "id".to_string(),
            fields: vec![FieldSpec::new(
                "id",
                FieldType::StringId,
                GenerationRule::Sequence {
                    prefix: "X".to_string(),
                    width: 3,
                },
            )],
            foreign_keys: Vec::new(),
            constraints: Vec::new(),
            comment: None,
        }
    }

    fn with_parent(mut table: TableSchema, parent: &str) -> TableSchema {
        let field = format!("{parent}_id");
        table.fields.push(FieldSpec::new(
            &field,
            FieldType::StringId,
            GenerationRule::ForeignKey,
        ));
        table.foreign_keys.push(ForeignKeySpec {
            field,
            references_table: parent.to_string(),
            references_field: "id".to_string(),
            cardinality: CardinalityPolicy::PerParent { min: 1, max: 2 },
        });
        table
    }

    #[test]
    fn hospital_registry_builds() {
        let registry = SchemaRegistry::hospital().unwrap();
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.name(), "hospital");
        assert_eq!(
            registry.graph().topological_order(),
            &[
                "wards",
                "patients",
                "staff",
                "staff_assignments",
                "devices",
                "admissions",
                "diagnoses",
                "vital_signs"
            ]
        );
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = SchemaRegistry::new();
        registry.register_table(simple("a")).unwrap();
        let err = registry.register_table(simple("a")).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTable("a".to_string()));
    }

    #[test]
    fn register_requires_registered_parent() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register_table(with_parent(simple("child"), "parent"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));

        registry.register_table(simple("parent")).unwrap();
        registry
            .register_table(with_parent(simple("child"), "parent"))
            .unwrap();
        assert_eq!(registry.graph().topological_order(), &["parent", "child"]);
    }

    #[test]
    fn register_rejects_self_reference() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register_table(with_parent(simple("node"), "node"))
            .unwrap_err();
        assert_eq!(err, SchemaError::Cycle(vec!["node".to_string()]));
    }

    #[test]
    fn bulk_construction_detects_cycles() {
        let a = with_parent(simple("a"), "b");
        let b = with_parent(simple("b"), "a");
        let err = SchemaRegistry::from_tables(vec![a, b]).unwrap_err();
        assert!(matches!(err, SchemaError::Cycle(tables) if tables.len() == 2));
    }

    #[test]
    fn missing_primary_key_is_invalid() {
        let mut table = simple("a");
        table.primary_key = "missing".to_string();
        let err = SchemaRegistry::from_tables(vec![table]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
    }

    #[test]
    fn lookup_reports_unknown_table() {
        let registry = SchemaRegistry::hospital().unwrap();
        assert!(registry.lookup("wards").is_ok());
        assert_eq!(
            registry.lookup("pharmacy").unwrap_err(),
            SchemaError::UnknownTable("pharmacy".to_string())
        );
    }

    #[test]
    fn cardinality_override_returns_new_registry() {
        let registry = SchemaRegistry::hospital().unwrap();
        let updated = registry
            .with_cardinality("devices", "ward_id", 2, 2)
            .unwrap();
        let fk = updated.lookup("devices").unwrap().foreign_key("ward_id").unwrap();
        assert_eq!(fk.cardinality, CardinalityPolicy::PerParent { min: 2, max: 2 });

        let original = registry.lookup("devices").unwrap().foreign_key("ward_id").unwrap();
        assert_eq!(original.cardinality, CardinalityPolicy::PerParent { min: 1, max: 5 });

        assert!(registry.with_cardinality("admissions", "ward_id", 1, 2).is_err());
        assert!(registry.with_cardinality("devices", "ward_id", 3, 1).is_err());
    }

    #[test]
    fn rule_must_match_field_type() {
        let mut table = simple("a");
        table.fields.push(FieldSpec::new(
            "age",
            FieldType::Text,
            GenerationRule::IntRange { min: 0, max: 10 },
        ));
        let err = SchemaRegistry::from_tables(vec![table]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(message) if message.contains("int_range")));
    }

    #[test]
    fn predicate_requires_nullable_field() {
        let mut table = simple("a");
        table.fields.push(FieldSpec::new(
            "kind",
            FieldType::Categorical,
            GenerationRule::Choice {
                values: vec!["x".to_string()],
                weights: None,
            },
        ));
        let mut gated = FieldSpec::new(
            "value",
            FieldType::Integer,
            GenerationRule::IntRange { min: 0, max: 1 },
        );
        gated.populate_when = Some(PopulationPredicate::FieldIn {
            field: "kind".to_string(),
            values: vec!["x".to_string()],
        });
        table.fields.push(gated);

        let err = SchemaRegistry::from_tables(vec![table]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(message) if message.contains("nullable")));
    }
}
