use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use medsynth_core::TableSchema;

use crate::errors::GenerationError;
use crate::output::{CountingWriter, RowSink, table_path};
use crate::row::Row;

/// Writes each table to `<root>/<domain dir>/<table>.jsonl`, one object per row.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    root: PathBuf,
}

impl JsonLinesSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RowSink for JsonLinesSink {
    fn write_table(&mut self, table: &TableSchema, rows: &[Row]) -> Result<u64, GenerationError> {
        let path = table_path(&self.root, table, "jsonl")?;
        let mut writer = CountingWriter::new(BufWriter::new(File::create(&path)?));
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(writer.bytes_written())
    }
}
