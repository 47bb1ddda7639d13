// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON-lines row sink: one `<table>.jsonl` file per logical table.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use k600_core::error::SinkError;
use k600_core::{OutputSink, Row, TableId};

/// Writes each committed row as one JSON object per line.
///
/// Files are created on the first row of their table, so tables that never
/// fire leave no file behind.
#[derive(Debug)]
pub struct JsonlSink {
    dir: PathBuf,
    writers: BTreeMap<TableId, BufWriter<File>>,
}

impl JsonlSink {
    /// Creates `dir` if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writers: BTreeMap::new(),
        })
    }

    /// File backing `table`.
    pub fn path_for(&self, table: TableId) -> PathBuf {
        self.dir.join(format!("{}.jsonl", table.name()))
    }

    /// Flushes every open file.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl OutputSink for JsonlSink {
    fn emit(&mut self, row: Row) -> Result<(), SinkError> {
        let table = row.table();
        if !self.writers.contains_key(&table) {
            let file = File::create(self.path_for(table))?;
            self.writers.insert(table, BufWriter::new(file));
        }
        if let Some(writer) = self.writers.get_mut(&table) {
            serde_json::to_writer(&mut *writer, &row)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_land_in_their_table_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = JsonlSink::create(dir.path().join("out")).expect("sink");
        sink.emit(Row::new(TableId::Nai).with_int(0, 1).with_double(5, 30.0))
            .expect("emit");
        sink.emit(Row::new(TableId::Nai).with_int(2, 1)).expect("emit");
        sink.flush().expect("flush");

        let text = fs::read_to_string(sink.path_for(TableId::Nai)).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"table":"nai","columns":[[0,1],[5,30.0]]}"#);
        assert!(!sink.path_for(TableId::Tiara).exists());
    }
}
