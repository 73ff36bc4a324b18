pub mod csv;
pub mod jsonl;

use std::io::Write;
use std::path::{Path, PathBuf};

use medsynth_core::TableSchema;

use crate::errors::GenerationError;
use crate::row::Row;

pub use self::csv::CsvSink;
pub use self::jsonl::JsonLinesSink;

/// Destination for generated tables.
pub trait RowSink {
    /// Write one table; returns the number of bytes written.
    fn write_table(&mut self, table: &TableSchema, rows: &[Row]) -> Result<u64, GenerationError>;
}

/// `<root>/<domain dir>/<table>.<extension>`, creating the domain directory.
pub(crate) fn table_path(
    root: &Path,
    table: &TableSchema,
    extension: &str,
) -> Result<PathBuf, GenerationError> {
    let dir = root.join(table.domain.directory());
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join(format!("{}.{extension}", table.name)))
}

pub(crate) struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
