use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use medsynth_core::TableSchema;

use crate::errors::GenerationError;
use crate::output::{CountingWriter, RowSink, table_path};
use crate::row::Row;

/// Writes each table to `<root>/<domain dir>/<table>.csv`.
#[derive(Debug, Clone)]
pub struct CsvSink {
    root: PathBuf,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RowSink for CsvSink {
    fn write_table(&mut self, table: &TableSchema, rows: &[Row]) -> Result<u64, GenerationError> {
        let path = table_path(&self.root, table, "csv")?;
        Ok(write_table_csv(&path, table, rows)?)
    }
}

/// Write a table as CSV with columns in declaration order.
pub fn write_table_csv(path: &Path, table: &TableSchema, rows: &[Row]) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    writer.write_record(table.fields.iter().map(|field| field.name.as_str()))?;

    for row in rows {
        let record: Vec<String> = table
            .fields
            .iter()
            .map(|field| {
                row.get(&field.name)
                    .map(|value| value.to_csv(field))
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}
