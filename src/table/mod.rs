//! Raw grids, typed values and the normalizer that turns one into the other.

mod column;
mod grid;
mod normalize;
mod value;

use serde::Serialize;

pub use column::Column;
pub use column::ColumnType;
pub use grid::RawGrid;
pub use normalize::normalize;
pub use normalize::normalize_with;
pub use normalize::NormalizeOptions;
pub use value::parse_boolean;
pub use value::parse_date;
pub use value::parse_number;
pub use value::RawCell;
pub use value::Value;

/// Identifies one sheet of one file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SheetHandle {
    pub file_path: String,
    pub sheet_name: String,
}

impl SheetHandle {
    pub fn new(file_path: &str, sheet_name: &str) -> Self {
        Self {
            file_path: file_path.to_owned(),
            sheet_name: sheet_name.to_owned(),
        }
    }
}

impl std::fmt::Display for SheetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.file_path, self.sheet_name)
    }
}

/// A typed table: named columns and rows of values in the same column order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    source: Option<SheetHandle>,
}

impl NormalizedTable {
    pub(crate) fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>, source: Option<SheetHandle>) -> Self {
        Self { columns, rows, source }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn source(&self) -> Option<&SheetHandle> {
        self.source.as_ref()
    }

    /// Position and definition of the column called `name`.
    pub fn column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns.iter().enumerate().find(|(_, column)| column.name == name)
    }

    /// Values of one column in row order.
    pub fn values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let (index, _) = self.column(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    /// One row as `(column name, value)` pairs.
    pub fn record(&self, index: usize) -> Option<Vec<(&str, &Value)>> {
        let row = self.rows.get(index)?;
        Some(self.columns.iter().map(|column| column.name.as_str()).zip(row).collect())
    }
}
