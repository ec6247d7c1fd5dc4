use crate::error::Error;
use crate::error::Result;
use crate::table::Column;
use crate::table::ColumnType;
use crate::table::NormalizedTable;
use crate::table::RawCell;
use crate::table::RawGrid;
use crate::table::Value;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;

/// Knobs of the normalizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Text treated as an empty cell, in addition to blank text.
    pub null_literals: Vec<String>,
    /// Whether the first non-empty row holds column names.
    pub header: bool,
    /// Minimum share of non-empty cells that must parse as the majority type
    /// for a mixed column to take that type.
    pub type_threshold: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            null_literals: Vec::new(),
            header: true,
            type_threshold: 0.5,
        }
    }
}

/// Normalizes a grid with default options.
pub fn normalize(grid: &RawGrid) -> Result<NormalizedTable> {
    normalize_with(grid, &NormalizeOptions::default())
}

/// Prunes empty rows and columns, names the columns, infers a type per
/// column and coerces every cell to it. Cells that do not coerce become
/// [`Value::Missing`] and are counted on their column.
pub fn normalize_with(grid: &RawGrid, options: &NormalizeOptions) -> Result<NormalizedTable> {
    let is_blank = |cell: &RawCell| cell.is_blank(&options.null_literals);

    let rows: Vec<usize> = (0..grid.height())
        .filter(|&row| grid.rows()[row].iter().any(|cell| !is_blank(cell)))
        .collect();
    if rows.is_empty() {
        return Err(Error::MalformedSheet {
            sheet: grid
                .source()
                .map(|source| source.sheet_name.clone())
                .unwrap_or_default(),
        });
    }
    let cols: Vec<usize> = (0..grid.width())
        .filter(|&col| rows.iter().any(|&row| !is_blank(grid.cell(row, col))))
        .collect();

    let (names, data_rows) = if options.header {
        let header = cols.iter().map(|&col| grid.cell(rows[0], col)).collect::<Vec<_>>();
        (column_names(&header, &options.null_literals), &rows[1..])
    } else {
        let empty = RawCell::Empty;
        let blanks = vec![&empty; cols.len()];
        (column_names(&blanks, &[]), &rows[..])
    };

    let mut columns = Vec::with_capacity(cols.len());
    for (name, &col) in names.into_iter().zip(&cols) {
        let present = data_rows.iter().map(|&row| grid.cell(row, col)).filter(|cell| !is_blank(cell));
        columns.push(Column {
            name,
            kind: ColumnType::detect(present, options.type_threshold),
            coercion_failures: 0,
        });
    }

    let mut table_rows = Vec::with_capacity(data_rows.len());
    for &row in data_rows {
        let mut values = Vec::with_capacity(columns.len());
        for (column, &col) in columns.iter_mut().zip(&cols) {
            let cell = grid.cell(row, col);
            let value = if is_blank(cell) {
                Value::Missing
            } else {
                column.kind.coerce(cell).unwrap_or_else(|| {
                    column.coercion_failures += 1;
                    Value::Missing
                })
            };
            values.push(value);
        }
        table_rows.push(values);
    }

    Ok(NormalizedTable::new(columns, table_rows, grid.source().cloned()))
}

/// Trimmed header text; blanks become `Column_N` (1-based position) and
/// repeats get the first free `_2`, `_3`, ... suffix.
fn column_names(header: &[&RawCell], null_literals: &[String]) -> Vec<String> {
    let mut used = HashSet::new();
    let mut names = Vec::with_capacity(header.len());
    for (index, cell) in header.iter().enumerate() {
        let base = if cell.is_blank(null_literals) {
            format!("Column_{}", index + 1)
        } else {
            cell.display_text().trim().to_owned()
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while used.contains(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        used.insert(name.clone());
        names.push(name);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SheetHandle;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
    }

    fn names(table: &NormalizedTable) -> Vec<&str> {
        table.columns().iter().map(|column| column.name.as_str()).collect()
    }

    fn construction_costs() -> RawGrid {
        RawGrid::from_text(&[
            ["Date", "Cost"],
            ["2024-01-01", "100"],
            ["", ""],
            ["2024-02-01", "bad"],
        ])
    }

    #[test]
    fn test_date_cost_scenario() {
        let table = normalize(&construction_costs()).unwrap();
        assert_eq!(names(&table), vec!["Date", "Cost"]);
        assert_eq!(table.columns()[0].kind, ColumnType::Date);
        assert_eq!(table.columns()[1].kind, ColumnType::Number);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0], vec![date(2024, 1, 1), Value::Number(100.0)]);
        assert_eq!(table.rows()[1], vec![date(2024, 2, 1), Value::Missing]);
        assert_eq!(table.columns()[1].coercion_failures, 1);
        assert_eq!(table.columns()[0].coercion_failures, 0);
    }

    #[test]
    fn test_prunes_empty_rows_and_columns() {
        let grid = RawGrid::from_text(&[
            ["", "", "", ""],
            ["", "Item", "  ", "Qty"],
            ["", "Rebar", "", "4"],
            ["", " ", "", ""],
            ["", "Mesh", "", "2"],
        ]);
        let table = normalize(&grid).unwrap();
        assert_eq!(names(&table), vec!["Item", "Qty"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[1], vec![Value::Text("Mesh".into()), Value::Number(2.0)]);
    }

    #[test]
    fn test_pruning_uses_null_literals() {
        let grid = RawGrid::from_text(&[["Item", "Note"], ["Rebar", "N/A"], ["N/A", "n/a"]]);
        let options = NormalizeOptions {
            null_literals: vec!["N/A".to_owned()],
            ..Default::default()
        };
        let table = normalize_with(&grid, &options).unwrap();
        assert_eq!(names(&table), vec!["Item", "Note"]);
        assert_eq!(table.rows(), &[vec![Value::Text("Rebar".into()), Value::Missing]]);
    }

    #[test]
    fn test_empty_grid_is_malformed() {
        let grid = RawGrid::from_text(&[["", " "], ["", ""]])
            .with_source(SheetHandle::new("a.xlsx", "Blank"));
        match normalize(&grid) {
            Err(Error::MalformedSheet { sheet }) => assert_eq!(sheet, "Blank"),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(normalize(&RawGrid::default()), Err(Error::MalformedSheet { .. })));
    }

    #[test]
    fn test_header_only_sheet() {
        let table = normalize(&RawGrid::from_text(&[["Date", "Cost"]])).unwrap();
        assert_eq!(names(&table), vec!["Date", "Cost"]);
        assert_eq!(table.row_count(), 0);
        assert!(table.columns().iter().all(|column| column.kind == ColumnType::Text));
    }

    #[test]
    fn test_header_names() {
        let grid = RawGrid::from_text(&[
            [" Cost ", "", "Cost", "Cost_2", "Cost", "Column_2"],
            ["1", "2", "3", "4", "5", "6"],
        ]);
        let table = normalize(&grid).unwrap();
        assert_eq!(names(&table), vec!["Cost", "Column_2", "Cost_2", "Cost_2_2", "Cost_3", "Column_2_2"]);
    }

    #[test]
    fn test_numeric_header_cells() {
        let grid = RawGrid::new(vec![
            vec![RawCell::Number(2023.0), RawCell::Number(2024.0)],
            vec![RawCell::Number(1.0), RawCell::Number(2.0)],
        ]);
        assert_eq!(names(&normalize(&grid).unwrap()), vec!["2023", "2024"]);
    }

    #[test]
    fn test_without_header() {
        let grid = RawGrid::from_text(&[["Rebar", "4"], ["Mesh", "2"]]);
        let options = NormalizeOptions {
            header: false,
            ..Default::default()
        };
        let table = normalize_with(&grid, &options).unwrap();
        assert_eq!(names(&table), vec!["Column_1", "Column_2"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[1].kind, ColumnType::Number);
    }

    #[test]
    fn test_text_column_renders_typed_cells() {
        let grid = RawGrid::new(vec![
            vec![RawCell::from("Code")],
            vec![RawCell::from("A-1")],
            vec![RawCell::Number(12.0)],
            vec![RawCell::from("B-7")],
        ]);
        let table = normalize(&grid).unwrap();
        assert_eq!(table.columns()[0].kind, ColumnType::Text);
        assert_eq!(table.rows()[1], vec![Value::Text("12".into())]);
        assert_eq!(table.columns()[0].coercion_failures, 0);
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let grid = RawGrid::new(vec![
            vec![RawCell::from("A"), RawCell::from("B")],
            vec![RawCell::from("x")],
        ]);
        let table = normalize(&grid).unwrap();
        assert_eq!(table.rows(), &[vec![Value::Text("x".into()), Value::Missing]]);
    }

    #[test]
    fn test_provenance_is_kept() {
        let handle = SheetHandle::new("Tower/costs.xlsx", "Q1");
        let table = normalize(&construction_costs().with_source(handle.clone())).unwrap();
        assert_eq!(table.source(), Some(&handle));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let grid = construction_costs();
        assert_eq!(normalize(&grid).unwrap(), normalize(&grid).unwrap());
    }

    /// Re-normalizing the rendered output yields the same table.
    #[test]
    fn test_normalize_is_idempotent() {
        let grids = [
            construction_costs(),
            RawGrid::from_text(&[
                ["Site", "Open", "Budget", "Done"],
                ["North", "2024-03-01", "$1,200", "yes"],
                ["", "", "", ""],
                ["South", "03/15/2024", "(300)", "no"],
                ["East", "", "12%", ""],
            ]),
        ];
        for grid in grids {
            let table = normalize(&grid).unwrap();
            let again = normalize(&render(&table)).unwrap();
            assert_eq!(schema(&again), schema(&table));
            assert_eq!(again.rows(), table.rows());
        }
    }

    fn schema(table: &NormalizedTable) -> Vec<(String, ColumnType)> {
        table.columns().iter().map(|column| (column.name.clone(), column.kind)).collect()
    }

    fn render(table: &NormalizedTable) -> RawGrid {
        let mut rows = vec![table.columns().iter().map(|column| RawCell::Text(column.name.clone())).collect()];
        for row in table.rows() {
            rows.push(
                row.iter()
                    .map(|value| match value {
                        Value::Missing => RawCell::Empty,
                        Value::Text(text) => RawCell::Text(text.clone()),
                        Value::Number(number) => RawCell::Number(*number),
                        Value::Date(datetime) => RawCell::Date(*datetime),
                        Value::Boolean(flag) => RawCell::Boolean(*flag),
                    })
                    .collect(),
            );
        }
        RawGrid::new(rows)
    }

    /// No output row or column was entirely empty in the input.
    #[test]
    fn test_pruning_invariant() {
        let grid = RawGrid::from_text(&[
            ["", "Name", "", "Hours"],
            ["", "", "", ""],
            ["", "Ana", "", "8"],
            ["", "", "", ""],
            ["", "Ben", "", ""],
        ]);
        let table = normalize(&grid).unwrap();
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.row_count(), 2);
        for row in table.rows() {
            assert!(row.iter().any(|value| !value.is_missing()));
        }
    }

    /// Coercion never fails the call and every cell lands somewhere.
    #[test]
    fn test_missing_counts_add_up() {
        let grid = RawGrid::from_text(&[
            ["Qty", "When"],
            ["1", "2024-01-01"],
            ["two", ""],
            ["3", "later"],
            ["", "2024-01-03"],
            ["5", "2024-01-04"],
        ]);
        let table = normalize(&grid).unwrap();
        assert_eq!(table.columns()[0].kind, ColumnType::Number);
        assert_eq!(table.columns()[1].kind, ColumnType::Date);
        let missing = |index: usize| table.rows().iter().filter(|row| row[index].is_missing()).count();
        assert_eq!(missing(0), 2);
        assert_eq!(table.columns()[0].coercion_failures, 1);
        assert_eq!(missing(1), 2);
        assert_eq!(table.columns()[1].coercion_failures, 1);
    }
}
