//! Table types.

use serde::{Deserialize, Serialize};

/// A reconstructed table: ordered rows of cell strings.
///
/// Rows always have equal length; [`TableGrid::from_rows`] pads short rows
/// with empty cells. Row 0 is rendered as the header row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableGrid {
    /// Rows in the table
    pub rows: Vec<Vec<String>>,
}

impl TableGrid {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a rectangular grid, normalizing cell text and padding short rows.
    ///
    /// Rows that are entirely empty are dropped.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let mut rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.iter().map(|cell| normalize_cell(cell)).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }

        Self { rows }
    }

    /// Add a row, padding it (or the existing rows) to a common width.
    pub fn add_row(&mut self, mut row: Vec<String>) {
        let width = self.column_count().max(row.len());
        row.resize(width, String::new());
        for existing in &mut self.rows {
            existing.resize(width, String::new());
        }
        self.rows.push(row);
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.column_count() == 0
    }

    /// Get a cell by position.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn normalize_cell(cell: &str) -> String {
    cell.split_whitespace().collect::<Vec<_>>().join(" ")
}
