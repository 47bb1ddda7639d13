// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Output-sink port: rows keyed by logical table and column index.
//!
//! A [`Row`] is one commit of every column written since the previous commit
//! for that table. Columns never written are absent; consumers treat them as
//! their table default.

use serde::Serialize;

use crate::error::SinkError;

/// Logical output table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableId {
    /// Silicon ring array hits, one row per qualifying pad sample.
    Tiara,
    /// Clover array plus the paraffin and iron boxes, one row per event.
    Gamma,
    /// LEPS array, one row per triggered event.
    Leps,
    /// NaI array, one row per triggered event.
    Nai,
    /// Scintillator paddles (only when enabled).
    Paddle,
    /// Calibration: per-event latched channel angles.
    GeometryAnalysis,
    /// Calibration: per-event source direction.
    InputDistribution,
}

impl TableId {
    /// Every table, in a stable order.
    pub const ALL: [Self; 7] = [
        Self::Tiara,
        Self::Gamma,
        Self::Leps,
        Self::Nai,
        Self::Paddle,
        Self::GeometryAnalysis,
        Self::InputDistribution,
    ];

    /// Stable lowercase name, used for file names and summaries.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tiara => "tiara",
            Self::Gamma => "gamma",
            Self::Leps => "leps",
            Self::Nai => "nai",
            Self::Paddle => "paddle",
            Self::GeometryAnalysis => "geometry_analysis",
            Self::InputDistribution => "input_distribution",
        }
    }
}

/// Value stored in one column.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Integer column (indices, flags, channel ids).
    Int(i64),
    /// Floating-point column (energies, angles, positions).
    Double(f64),
}

impl Cell {
    /// Numeric value as `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Double(v) => v,
        }
    }
}

/// Columns committed together to one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    table: TableId,
    columns: Vec<(usize, Cell)>,
}

impl Row {
    /// Empty row for `table`.
    pub const fn new(table: TableId) -> Self {
        Self {
            table,
            columns: Vec::new(),
        }
    }

    /// Target table.
    pub const fn table(&self) -> TableId {
        self.table
    }

    /// Writes `cell` at `column`; a second write to the same column wins.
    pub fn set(&mut self, column: usize, cell: Cell) -> &mut Self {
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = cell,
            None => self.columns.push((column, cell)),
        }
        self
    }

    /// Writes an integer column.
    pub fn set_int(&mut self, column: usize, value: i64) -> &mut Self {
        self.set(column, Cell::Int(value))
    }

    /// Writes an index (detector, row, channel number) as an integer column.
    pub fn set_index(&mut self, column: usize, value: usize) -> &mut Self {
        self.set_int(column, i64::try_from(value).unwrap_or(i64::MAX))
    }

    /// Writes a floating-point column.
    pub fn set_double(&mut self, column: usize, value: f64) -> &mut Self {
        self.set(column, Cell::Double(value))
    }

    /// Builder form of [`Row::set_int`].
    #[must_use]
    pub fn with_int(mut self, column: usize, value: i64) -> Self {
        self.set_int(column, value);
        self
    }

    /// Builder form of [`Row::set_double`].
    #[must_use]
    pub fn with_double(mut self, column: usize, value: f64) -> Self {
        self.set_double(column, value);
        self
    }

    /// Value at `column`, if written.
    pub fn get(&self, column: usize) -> Option<Cell> {
        self.columns
            .iter()
            .find_map(|(c, v)| (*c == column).then_some(*v))
    }

    /// Written columns in first-write order.
    pub fn columns(&self) -> &[(usize, Cell)] {
        &self.columns
    }

    /// `true` when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Destination for committed rows.
pub trait OutputSink {
    /// Commits one row.
    fn emit(&mut self, row: Row) -> Result<(), SinkError>;
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn emit(&mut self, row: Row) -> Result<(), SinkError> {
        (**self).emit(row)
    }
}

/// Sink that keeps every row in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    rows: Vec<Row>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows in emission order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows committed to `table`.
    pub fn table(&self, table: TableId) -> impl Iterator<Item = &Row> + '_ {
        self.rows.iter().filter(move |r| r.table == table)
    }

    /// Drops every stored row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

impl OutputSink for MemorySink {
    fn emit(&mut self, row: Row) -> Result<(), SinkError> {
        self.rows.push(row);
        Ok(())
    }
}
