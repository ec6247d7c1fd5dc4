use crate::table::RawCell;
use crate::table::SheetHandle;

/// The cells of one sheet in row order, exactly as decoded. Rows may have
/// different lengths; missing trailing cells read as empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawGrid {
    rows: Vec<Vec<RawCell>>,
    source: Option<SheetHandle>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows, source: None }
    }

    /// Grid of text cells, with `""` read as empty.
    pub fn from_text<R: AsRef<[&'static str]>>(rows: &[R]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.as_ref().iter().map(|&text| RawCell::from(text)).collect())
                .collect(),
        )
    }

    pub fn with_source(mut self, source: SheetHandle) -> Self {
        self.source = Some(source);
        self
    }

    pub fn rows(&self) -> &[Vec<RawCell>] {
        &self.rows
    }

    pub fn source(&self) -> Option<&SheetHandle> {
        self.source.as_ref()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Length of the longest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell at `(row, col)`; positions past the end of a row are empty.
    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        static EMPTY: RawCell = RawCell::Empty;
        self.rows.get(row).and_then(|cells| cells.get(col)).unwrap_or(&EMPTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ragged_rows() {
        let grid = RawGrid::from_text(&[&["a", "b", "c"][..], &["d"][..]]);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.cell(1, 0), &RawCell::Text("d".into()));
        assert_eq!(grid.cell(1, 2), &RawCell::Empty);
        assert_eq!(grid.cell(5, 5), &RawCell::Empty);
        assert_eq!(grid.source(), None);
    }
}
