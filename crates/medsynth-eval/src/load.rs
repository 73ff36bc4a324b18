use std::path::Path;
use std::sync::Arc;

use medsynth_core::{SchemaRegistry, TableSchema};
use medsynth_generate::{Dataset, GeneratedValue, Row, TableRows};

use crate::errors::EvalError;

/// Read `<dir>/<domain dir>/<table>.csv` for every schema table.
///
/// Tables without a file are left out so the validator reports them. Columns
/// follow the file header; cells that do not parse as their declared type are
/// kept as text and surface as domain violations.
pub fn load_dataset_csv(dir: &Path, registry: &SchemaRegistry) -> Result<Dataset, EvalError> {
    if !dir.is_dir() {
        return Err(EvalError::InvalidDataset(format!(
            "dataset directory not found: {}",
            dir.display()
        )));
    }

    let mut tables = Vec::new();
    for name in registry.graph().topological_order() {
        let table = registry.lookup(name)?;
        let path = dir
            .join(table.domain.directory())
            .join(format!("{}.csv", table.name));
        if !path.exists() {
            continue;
        }
        tables.push(load_table_csv(table, &path)?);
    }
    Ok(Dataset::new(tables))
}

fn load_table_csv(table: &TableSchema, path: &Path) -> Result<TableRows, EvalError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.to_string())
        .collect();
    let specs: Vec<_> = headers.iter().map(|header| table.field(header)).collect();
    let fields = Arc::new(headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let values = specs
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                let raw = record.get(idx).unwrap_or_default();
                match spec {
                    Some(spec) => GeneratedValue::from_csv(raw, spec)
                        .unwrap_or_else(|_| GeneratedValue::Text(raw.to_string())),
                    None if raw.is_empty() => GeneratedValue::Null,
                    None => GeneratedValue::Text(raw.to_string()),
                }
            })
            .collect();
        rows.push(Row::new(Arc::clone(&fields), values));
    }

    Ok(TableRows::new(&table.name, fields, rows))
}
