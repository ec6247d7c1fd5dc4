//! Per-column statistics of normalized tables and their cross-sheet rollup.

mod combine;
mod frequency;

use crate::table::ColumnType;
use crate::table::NormalizedTable;
use crate::table::SheetHandle;
use crate::table::Value;
use chrono::NaiveDateTime;
use serde::Serialize;

pub use combine::combine;
pub use frequency::Frequencies;

/// Statistics of every column of one table, or of a rollup of several.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateResult {
    pub sources: Vec<SheetHandle>,
    pub row_count: usize,
    pub columns: Vec<ColumnSummary>,
}

/// Counts shared by all column types plus the type-specific statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
    /// Present values.
    pub count: usize,
    pub missing_count: usize,
    #[serde(flatten)]
    pub statistics: Statistics,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Statistics {
    Number {
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
        sum: f64,
    },
    Date {
        min: Option<NaiveDateTime>,
        max: Option<NaiveDateTime>,
    },
    /// Text and boolean columns.
    Categorical {
        distinct_count: usize,
        mode: Option<Value>,
        frequencies: Frequencies,
    },
}

impl Statistics {
    /// Statistics over no values.
    fn empty(kind: ColumnType) -> Self {
        match kind {
            ColumnType::Number => Statistics::Number {
                min: None,
                max: None,
                mean: None,
                sum: 0.0,
            },
            ColumnType::Date => Statistics::Date { min: None, max: None },
            ColumnType::Text | ColumnType::Boolean => Statistics::categorical(Frequencies::new()),
        }
    }

    fn categorical(frequencies: Frequencies) -> Self {
        Statistics::Categorical {
            distinct_count: frequencies.distinct_count(),
            mode: frequencies.mode().cloned(),
            frequencies,
        }
    }
}

impl AggregateResult {
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|column| column.name == name)
    }
}

impl ColumnSummary {
    fn empty(name: &str, kind: ColumnType) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            count: 0,
            missing_count: 0,
            statistics: Statistics::empty(kind),
        }
    }

    /// Value counts of a text or boolean column.
    pub fn frequencies(&self) -> Option<&Frequencies> {
        match &self.statistics {
            Statistics::Categorical { frequencies, .. } => Some(frequencies),
            _ => None,
        }
    }

    /// Folds one present value into the statistics. Values of another type
    /// than the column's are ignored.
    fn add(&mut self, value: &Value) {
        match (&mut self.statistics, value) {
            (Statistics::Number { min, max, sum, .. }, Value::Number(number)) => {
                *min = Some(min.map_or(*number, |current| current.min(*number)));
                *max = Some(max.map_or(*number, |current| current.max(*number)));
                *sum += number;
            }
            (Statistics::Date { min, max }, Value::Date(datetime)) => {
                *min = Some(min.map_or(*datetime, |current| current.min(*datetime)));
                *max = Some(max.map_or(*datetime, |current| current.max(*datetime)));
            }
            (Statistics::Categorical { frequencies, .. }, Value::Text(_) | Value::Boolean(_)) => {
                frequencies.add(value);
            }
            _ => return,
        }
        self.count += 1;
    }

    /// Folds another summary of a same-named, same-typed column into this one.
    fn merge(&mut self, other: &ColumnSummary) {
        self.count += other.count;
        self.missing_count += other.missing_count;
        match (&mut self.statistics, &other.statistics) {
            (
                Statistics::Number { min, max, sum, .. },
                Statistics::Number {
                    min: other_min,
                    max: other_max,
                    sum: other_sum,
                    ..
                },
            ) => {
                *min = pick(*min, *other_min, f64::min);
                *max = pick(*max, *other_max, f64::max);
                *sum += other_sum;
            }
            (
                Statistics::Date { min, max },
                Statistics::Date {
                    min: other_min,
                    max: other_max,
                },
            ) => {
                *min = pick(*min, *other_min, NaiveDateTime::min);
                *max = pick(*max, *other_max, NaiveDateTime::max);
            }
            (
                Statistics::Categorical { frequencies, .. },
                Statistics::Categorical {
                    frequencies: other_frequencies,
                    ..
                },
            ) => frequencies.merge(other_frequencies),
            _ => (),
        }
    }

    /// Recomputes the statistics derived from the accumulated ones.
    fn finish(&mut self) {
        let count = self.count;
        match &mut self.statistics {
            Statistics::Number { mean, sum, .. } => {
                *mean = (count > 0).then(|| *sum / count as f64);
            }
            Statistics::Categorical {
                distinct_count,
                mode,
                frequencies,
            } => {
                *distinct_count = frequencies.distinct_count();
                *mode = frequencies.mode().cloned();
            }
            Statistics::Date { .. } => (),
        }
    }
}

fn pick<T: Copy>(left: Option<T>, right: Option<T>, choose: fn(T, T) -> T) -> Option<T> {
    match (left, right) {
        (Some(left), Some(right)) => Some(choose(left, right)),
        (left, right) => left.or(right),
    }
}

/// Computes count, missing count and the type-specific statistics of every
/// column of `table`.
pub fn aggregate(table: &NormalizedTable) -> AggregateResult {
    let columns = table
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let mut summary = ColumnSummary::empty(&column.name, column.kind);
            for row in table.rows() {
                match &row[index] {
                    Value::Missing => summary.missing_count += 1,
                    value => summary.add(value),
                }
            }
            summary.finish();
            summary
        })
        .collect();

    AggregateResult {
        sources: table.source().cloned().into_iter().collect(),
        row_count: table.row_count(),
        columns,
    }
}
