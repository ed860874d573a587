//! In-memory tables.
//!
//! A `Table` is an ordered list of named columns and an ordered list of rows.
//! Every row holds exactly one cell per column; absent cells are `Value::Null`.
//! Tables are never mutated once built: every transform produces a new one.

pub mod value;

pub use value::{parse_date, Value};

use crate::error::AggregateError;
use serde::Serialize;

/// Row-oriented table with named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates an empty table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Creates a table from rows, padding short rows with nulls.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Appends a row, normalizing it to the column count.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, or `ColumnNotFound`.
    pub fn column_index(&self, name: &str) -> Result<usize, AggregateError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AggregateError::ColumnNotFound(name.to_string()))
    }

    /// All cells of one column, in row order.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Value> + '_, AggregateError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Cell at a row and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Same columns, subset of rows.
    pub(crate) fn with_rows(&self, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Same rows, one extra column computed per row.
    pub(crate) fn with_appended_column(&self, name: &str, cells: Vec<Value>) -> Self {
        let mut columns = self.columns.clone();
        let mut rows = self.rows.clone();
        let existing = columns.iter().position(|c| c == name);

        match existing {
            Some(idx) => {
                for (row, cell) in rows.iter_mut().zip(cells) {
                    row[idx] = cell;
                }
            }
            None => {
                columns.push(name.to_string());
                for (row, cell) in rows.iter_mut().zip(cells) {
                    row.push(cell);
                }
            }
        }

        Self { columns, rows }
    }
}
