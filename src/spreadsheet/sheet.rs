use crate::spreadsheet::SpreadsheetError;
use crate::table::RawCell;
use crate::table::RawGrid;
use crate::table::SheetHandle;
use std::collections::BTreeSet;

/// Rows per sheet in the xlsx and ods formats.
const MAX_ROWS: usize = 1_048_576;
/// Columns per sheet in the xlsx and ods formats.
const MAX_COLS: usize = 16_384;
/// Largest grid a single sheet may be laid out into.
const MAX_GRID_CELLS: usize = 1 << 24;

/// Collects the non-empty cells of one sheet as they are decoded. Cells stay
/// sparse until [`SheetCells::into_grid`] lays out the occupied rows and
/// columns.
pub(crate) struct SheetCells {
    handle: SheetHandle,
    cells: Vec<(usize, usize, RawCell)>,
}

impl SheetCells {
    pub(crate) fn new(file_path: &str, sheet_name: &str) -> Self {
        Self {
            handle: SheetHandle::new(file_path, sheet_name),
            cells: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, row: usize, col: usize, cell: RawCell) {
        if cell == RawCell::Empty {
            return;
        }
        self.cells.push((row, col, cell));
    }

    /// Pushes `cell` over a `rows` x `cols` block, clipped to the sheet
    /// limits. Fails when the block would exceed the grid capacity.
    pub(crate) fn push_repeated(
        &mut self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
        cell: RawCell,
    ) -> Result<(), SpreadsheetError> {
        if cell == RawCell::Empty || row >= MAX_ROWS || col >= MAX_COLS {
            return Ok(());
        }
        let rows = rows.min(MAX_ROWS - row);
        let cols = cols.min(MAX_COLS - col);
        let total = rows
            .checked_mul(cols)
            .and_then(|block| block.checked_add(self.cells.len()))
            .filter(|&total| total <= MAX_GRID_CELLS);
        if total.is_none() {
            return Err(SpreadsheetError::SheetTooLarge(self.handle.sheet_name.clone()));
        }
        for row_offset in 0..rows {
            for col_offset in 0..cols {
                self.push(row + row_offset, col + col_offset, cell.clone());
            }
        }
        Ok(())
    }

    /// Dense grid over the occupied rows and columns, in sheet order. Rows
    /// and columns without any cell are left out. A later cell at the same
    /// position replaces an earlier one.
    pub(crate) fn into_grid(self) -> Result<RawGrid, SpreadsheetError> {
        let rows: Vec<usize> = self.cells.iter().map(|(row, _, _)| *row).collect::<BTreeSet<_>>().into_iter().collect();
        let cols: Vec<usize> = self.cells.iter().map(|(_, col, _)| *col).collect::<BTreeSet<_>>().into_iter().collect();
        if rows.len().checked_mul(cols.len()).map_or(true, |size| size > MAX_GRID_CELLS) {
            return Err(SpreadsheetError::SheetTooLarge(self.handle.sheet_name));
        }

        let mut grid = vec![vec![RawCell::Empty; cols.len()]; rows.len()];
        for (row, col, cell) in self.cells {
            if let (Ok(row), Ok(col)) = (rows.binary_search(&row), cols.binary_search(&col)) {
                grid[row][col] = cell;
            }
        }
        Ok(RawGrid::new(grid).with_source(self.handle))
    }
}
