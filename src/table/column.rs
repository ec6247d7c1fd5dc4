use crate::table::RawCell;
use crate::table::Value;
use serde::Deserialize;
use serde::Serialize;

/// Inferred type of a normalized column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Date,
    Boolean,
}

/// A column definition of a normalized table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
    /// Non-empty cells that became missing because they did not parse as `kind`.
    pub coercion_failures: usize,
}

impl ColumnType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
        }
    }

    /// Text and boolean columns are summarized by value counts.
    pub const fn is_categorical(&self) -> bool {
        matches!(self, ColumnType::Text | ColumnType::Boolean)
    }

    /// Picks the column type for a set of non-empty cells.
    ///
    /// A type every cell parses as wins outright, checked in the order number,
    /// date, boolean. Otherwise the type parsed by the most cells wins (ties in
    /// the same order) when it covers at least `threshold` of the cells, and the
    /// column falls back to text when none does.
    pub(crate) fn detect<'a>(cells: impl IntoIterator<Item = &'a RawCell>, threshold: f64) -> ColumnType {
        let mut total = 0usize;
        let mut counts = [(ColumnType::Number, 0usize), (ColumnType::Date, 0), (ColumnType::Boolean, 0)];
        for cell in cells {
            total += 1;
            for (kind, count) in counts.iter_mut() {
                if kind.accepts(cell) {
                    *count += 1;
                }
            }
        }
        if total == 0 {
            return ColumnType::Text;
        }
        if let Some((kind, _)) = counts.iter().find(|(_, count)| *count == total) {
            return *kind;
        }

        let (kind, count) = counts
            .into_iter()
            .fold((ColumnType::Text, 0), |best, candidate| if candidate.1 > best.1 { candidate } else { best });
        if count > 0 && count as f64 >= threshold * total as f64 {
            kind
        } else {
            ColumnType::Text
        }
    }

    fn accepts(&self, cell: &RawCell) -> bool {
        self.coerce(cell).is_some()
    }

    /// Re-parses a non-empty cell under this type.
    pub(crate) fn coerce(&self, cell: &RawCell) -> Option<Value> {
        match self {
            ColumnType::Text => Some(Value::Text(cell.display_text().trim().to_owned())),
            ColumnType::Number => cell.as_number().map(Value::Number),
            ColumnType::Date => cell.as_date().map(Value::Date),
            ColumnType::Boolean => cell.as_boolean().map(Value::Boolean),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<RawCell> {
        values.iter().map(|&value| RawCell::from(value)).collect()
    }

    #[test]
    fn test_detect_unanimous() {
        assert_eq!(ColumnType::detect(&cells(&["1", "2.5", "$3"]), 0.5), ColumnType::Number);
        assert_eq!(ColumnType::detect(&cells(&["2024-01-01", "Jan 2, 2024"]), 0.5), ColumnType::Date);
        assert_eq!(ColumnType::detect(&cells(&["yes", "No"]), 0.5), ColumnType::Boolean);
        assert_eq!(ColumnType::detect(&cells(&["North", "South"]), 0.5), ColumnType::Text);
        assert_eq!(ColumnType::detect(&[], 0.5), ColumnType::Text);
    }

    #[test]
    fn test_detect_majority() {
        assert_eq!(ColumnType::detect(&cells(&["100", "bad"]), 0.5), ColumnType::Number);
        assert_eq!(ColumnType::detect(&cells(&["100", "bad", "worse"]), 0.5), ColumnType::Text);
        assert_eq!(ColumnType::detect(&cells(&["100", "bad"]), 0.75), ColumnType::Text);
        assert_eq!(ColumnType::detect(&cells(&["2024-01-01", "TBD", "5"]), 0.3), ColumnType::Number);
    }

    #[test]
    fn test_detect_typed_cells() {
        let typed = vec![RawCell::Number(1.0), RawCell::Boolean(true), RawCell::Boolean(false)];
        assert_eq!(ColumnType::detect(&typed, 0.5), ColumnType::Boolean);
        let dates = vec![RawCell::Date(Default::default()), RawCell::Text("2024-05-01".into())];
        assert_eq!(ColumnType::detect(&dates, 0.5), ColumnType::Date);
    }

    #[test]
    fn test_zero_threshold_never_picks_unparsed_type() {
        assert_eq!(ColumnType::detect(&cells(&["a", "b"]), 0.0), ColumnType::Text);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(ColumnType::Number.coerce(&RawCell::from("1,250")), Some(Value::Number(1250.0)));
        assert_eq!(ColumnType::Number.coerce(&RawCell::from("bad")), None);
        assert_eq!(ColumnType::Text.coerce(&RawCell::Number(7.0)), Some(Value::Text("7".into())));
        assert_eq!(ColumnType::Text.coerce(&RawCell::from("  padded ")), Some(Value::Text("padded".into())));
        assert_eq!(ColumnType::Boolean.coerce(&RawCell::from("n")), Some(Value::Boolean(false)));
    }
}
