use std::sync::Arc;

use medsynth_core::SchemaRegistry;
use sha2::{Digest, Sha256};

use crate::errors::GenerationError;
use crate::output::RowSink;
use crate::row::Row;

/// Rows of one table, in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRows {
    pub name: String,
    pub fields: Arc<Vec<String>>,
    pub rows: Vec<Row>,
}

impl TableRows {
    pub fn new(name: &str, fields: Arc<Vec<String>>, rows: Vec<Row>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row whose `key_field` renders as `key`.
    pub fn find_by(&self, key_field: &str, key: &str) -> Option<&Row> {
        self.rows.iter().find(|row| {
            row.get(key_field)
                .is_some_and(|value| value.to_key() == key)
        })
    }
}

/// Generated tables, parents before children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub tables: Vec<TableRows>,
}

impl Dataset {
    pub fn new(tables: Vec<TableRows>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableRows> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|table| table.rows.len() as u64).sum()
    }

    /// SHA-256 over every table, field and value; equal datasets hash equally.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for table in &self.tables {
            hasher.update(table.name.as_bytes());
            hasher.update([0x1e]);
            for field in table.fields.iter() {
                hasher.update(field.as_bytes());
                hasher.update([0x1f]);
            }
            for row in &table.rows {
                for value in row.values() {
                    hasher.update(value.to_key().as_bytes());
                    hasher.update([0x1f]);
                }
                hasher.update([0x1e]);
            }
        }
        hex::encode(hasher.finalize())
    }

    /// Hand every table to `sink` in topological order; returns bytes written.
    pub fn write_to(
        &self,
        registry: &SchemaRegistry,
        sink: &mut dyn RowSink,
    ) -> Result<u64, GenerationError> {
        let mut written = 0_u64;
        for name in registry.graph().topological_order() {
            let Some(rows) = self.table(name) else {
                continue;
            };
            let schema = registry.lookup(name)?;
            written += sink.write_table(schema, &rows.rows)?;
        }
        Ok(written)
    }
}
