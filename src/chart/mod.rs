//! Declarative chart descriptions built from tables and aggregates.
//!
//! A [`ChartSpec`] carries everything a renderer needs (titles, axis labels
//! and the series values) and nothing about how it is drawn.

use crate::aggregate::AggregateResult;
use crate::error::Error;
use crate::error::Result;
use crate::table::Column;
use crate::table::ColumnType;
use crate::table::NormalizedTable;
use crate::table::SheetHandle;
use crate::table::Value;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

/// Number of histogram bins when the request does not set one.
pub const DEFAULT_BINS: usize = 20;
/// Largest histogram bin count a request may ask for.
pub const MAX_BINS: usize = 1_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    Histogram,
}

impl ChartKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "pie" => Ok(ChartKind::Pie),
            "scatter" => Ok(ChartKind::Scatter),
            "histogram" | "hist" => Ok(ChartKind::Histogram),
            _ => Err(format!("Unknown chart kind '{name}'")),
        }
    }
}

/// What to plot.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub x_column: String,
    pub y_columns: Vec<String>,
    /// Replaces the default title.
    pub title: Option<String>,
    /// Histogram bin count, [`DEFAULT_BINS`] when unset.
    pub bins: Option<usize>,
}

impl ChartRequest {
    pub fn new(kind: ChartKind, x_column: &str) -> Self {
        Self {
            kind,
            x_column: x_column.to_owned(),
            y_columns: Vec::new(),
            title: None,
            bins: None,
        }
    }

    pub fn with_y(mut self, column: &str) -> Self {
        self.y_columns.push(column.to_owned());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = Some(bins);
        self
    }
}

/// Data a chart can be built from.
#[derive(Copy, Clone, Debug)]
pub enum ChartSource<'a> {
    Table(&'a NormalizedTable),
    Aggregate(&'a AggregateResult),
}

impl<'a> From<&'a NormalizedTable> for ChartSource<'a> {
    fn from(table: &'a NormalizedTable) -> Self {
        ChartSource::Table(table)
    }
}

impl<'a> From<&'a AggregateResult> for ChartSource<'a> {
    fn from(aggregate: &'a AggregateResult) -> Self {
        ChartSource::Aggregate(aggregate)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub x_values: Vec<Value>,
    pub y_values: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
    pub series: Vec<Series>,
    pub sources: Vec<SheetHandle>,
}

const COUNT_LABEL: &str = "Count";
const FREQUENCY_LABEL: &str = "Frequency";

/// Builds the chart described by `request` from a table or an aggregate.
///
/// Fails with [`Error::InvalidColumn`] when a requested column does not
/// exist or its type does not fit the chart kind.
pub fn build_chart<'a>(source: impl Into<ChartSource<'a>>, request: &ChartRequest) -> Result<ChartSpec> {
    let (series, y_axis_label, sources) = match source.into() {
        ChartSource::Table(table) => {
            let (series, y_axis_label) = table_series(table, request)?;
            (series, y_axis_label, table.source().cloned().into_iter().collect())
        }
        ChartSource::Aggregate(aggregate) => (aggregate_series(aggregate, request)?, COUNT_LABEL.to_owned(), aggregate.sources.clone()),
    };

    let title = match &request.title {
        Some(title) => title.clone(),
        None => default_title(request.kind, &request.x_column, &y_axis_label, request.y_columns.is_empty()),
    };
    Ok(ChartSpec {
        kind: request.kind,
        title,
        x_axis_label: request.x_column.clone(),
        y_axis_label,
        series,
        sources,
    })
}

fn default_title(kind: ChartKind, x: &str, y: &str, counts_only: bool) -> String {
    match kind {
        ChartKind::Bar => format!("{y} by {x}"),
        ChartKind::Line => format!("{y} over {x}"),
        ChartKind::Scatter => format!("{y} vs {x}"),
        ChartKind::Pie | ChartKind::Histogram if counts_only => format!("Distribution of {x}"),
        ChartKind::Pie | ChartKind::Histogram => format!("Distribution of {y}"),
    }
}

fn table_series(table: &NormalizedTable, request: &ChartRequest) -> Result<(Vec<Series>, String)> {
    let x = lookup(table, &request.x_column)?;
    let ys = request
        .y_columns
        .iter()
        .map(|name| lookup(table, name))
        .collect::<Result<Vec<_>>>()?;
    let y_label = request.y_columns.join(", ");

    match request.kind {
        ChartKind::Bar | ChartKind::Line => {
            if ys.is_empty() {
                return Err(Error::invalid_column(
                    &request.x_column,
                    format!("a {} chart needs at least one numeric y column", request.kind),
                ));
            }
            for (_, column) in &ys {
                require(column, request.kind, &[ColumnType::Number])?;
            }
            let rows: Vec<_> = table.rows().iter().filter(|row| !row[x.0].is_missing()).collect();
            let x_values: Vec<Value> = rows.iter().map(|row| row[x.0].clone()).collect();
            let series = ys
                .iter()
                .map(|(index, column)| Series {
                    label: column.name.clone(),
                    x_values: x_values.clone(),
                    y_values: rows.iter().map(|row| row[*index].clone()).collect(),
                })
                .collect();
            Ok((series, y_label))
        }
        ChartKind::Pie => {
            if !x.1.kind.is_categorical() {
                return Err(Error::invalid_column(
                    &x.1.name,
                    format!("a pie chart needs a text or boolean category, not {}", x.1.kind),
                ));
            }
            match ys.as_slice() {
                [] => {
                    let mut groups = Groups::default();
                    for row in table.rows() {
                        if !row[x.0].is_missing() {
                            groups.add(&row[x.0], 1.0);
                        }
                    }
                    Ok((vec![groups.into_series(COUNT_LABEL)], COUNT_LABEL.to_owned()))
                }
                [(index, column)] => {
                    require(column, request.kind, &[ColumnType::Number])?;
                    let mut groups = Groups::default();
                    for row in table.rows() {
                        if let (false, Some(number)) = (row[x.0].is_missing(), row[*index].as_number()) {
                            groups.add(&row[x.0], number);
                        }
                    }
                    Ok((vec![groups.into_series(&column.name)], y_label))
                }
                _ => Err(Error::invalid_column(
                    &request.y_columns[1],
                    "a pie chart takes at most one y column",
                )),
            }
        }
        ChartKind::Scatter => {
            let [(y_index, y_column)] = ys.as_slice() else {
                return Err(Error::invalid_column(
                    &request.x_column,
                    "a scatter chart needs exactly one y column",
                ));
            };
            let axis_types = [ColumnType::Number, ColumnType::Date];
            require(x.1, request.kind, &axis_types)?;
            require(y_column, request.kind, &axis_types)?;
            let (x_values, y_values) = table
                .rows()
                .iter()
                .filter(|row| !row[x.0].is_missing() && !row[*y_index].is_missing())
                .map(|row| (row[x.0].clone(), row[*y_index].clone()))
                .unzip();
            let series = Series {
                label: y_column.name.clone(),
                x_values,
                y_values,
            };
            Ok((vec![series], y_label))
        }
        ChartKind::Histogram => {
            if let Some(name) = request.y_columns.first() {
                return Err(Error::invalid_column(name, "a histogram takes no y column"));
            }
            require(x.1, request.kind, &[ColumnType::Number])?;
            let bins = request.bins.unwrap_or(DEFAULT_BINS);
            if bins == 0 {
                return Err(Error::invalid_column(&x.1.name, "a histogram needs at least one bin"));
            }
            if bins > MAX_BINS {
                return Err(Error::invalid_column(
                    &x.1.name,
                    format!("a histogram takes at most {MAX_BINS} bins, {bins} requested"),
                ));
            }
            let values: Vec<f64> = table.rows().iter().filter_map(|row| row[x.0].as_number()).collect();
            Ok((vec![histogram(&values, bins, FREQUENCY_LABEL)], FREQUENCY_LABEL.to_owned()))
        }
    }
}

fn aggregate_series(aggregate: &AggregateResult, request: &ChartRequest) -> Result<Vec<Series>> {
    let column = aggregate
        .column(&request.x_column)
        .ok_or_else(|| Error::invalid_column(&request.x_column, "no such column"))?;
    if let Some(name) = request.y_columns.first() {
        return Err(Error::invalid_column(name, "aggregates only chart value counts"));
    }
    let frequencies = column.frequencies().ok_or_else(|| {
        Error::invalid_column(
            &column.name,
            format!("value counts need a text or boolean column, not {}", column.kind),
        )
    })?;

    let mut entries: Vec<_> = frequencies.entries().iter().collect();
    match request.kind {
        ChartKind::Bar | ChartKind::Line => (),
        ChartKind::Pie => entries.sort_by(|left, right| right.1.cmp(&left.1)),
        ChartKind::Scatter | ChartKind::Histogram => {
            return Err(Error::invalid_column(
                &column.name,
                format!("a {} chart needs row-level data", request.kind),
            ));
        }
    }
    Ok(vec![Series {
        label: COUNT_LABEL.to_owned(),
        x_values: entries.iter().map(|(value, _)| value.clone()).collect(),
        y_values: entries.iter().map(|(_, count)| Value::Number(*count as f64)).collect(),
    }])
}

fn lookup<'a>(table: &'a NormalizedTable, name: &str) -> Result<(usize, &'a Column)> {
    table
        .column(name)
        .ok_or_else(|| Error::invalid_column(name, "no such column"))
}

fn require(column: &Column, kind: ChartKind, accepted: &[ColumnType]) -> Result<()> {
    if accepted.contains(&column.kind) {
        Ok(())
    } else {
        let accepted: Vec<_> = accepted.iter().map(ColumnType::as_str).collect();
        Err(Error::invalid_column(
            &column.name,
            format!("a {kind} chart needs {} values, not {}", accepted.join(" or "), column.kind),
        ))
    }
}

/// Per-category totals in first-encountered order.
#[derive(Default)]
struct Groups {
    totals: Vec<(Value, f64)>,
    index: HashMap<String, usize>,
}

impl Groups {
    fn add(&mut self, key: &Value, amount: f64) {
        let position = *self.index.entry(key.to_string()).or_insert_with(|| {
            self.totals.push((key.clone(), 0.0));
            self.totals.len() - 1
        });
        self.totals[position].1 += amount;
    }

    /// Descending by total; the sort is stable so ties keep encounter order.
    fn into_series(mut self, label: &str) -> Series {
        self.totals.sort_by(|left, right| right.1.total_cmp(&left.1));
        let (x_values, y_values) = self
            .totals
            .into_iter()
            .map(|(key, total)| (key, Value::Number(total)))
            .unzip();
        Series {
            label: label.to_owned(),
            x_values,
            y_values,
        }
    }
}

/// Equal-width bins over `[min, max]`; the last bin also holds `max`.
fn histogram(values: &[f64], bins: usize, label: &str) -> Series {
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Series {
            label: label.to_owned(),
            x_values: Vec::new(),
            y_values: Vec::new(),
        };
    };

    let bins = if min == max { 1 } else { bins };
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &value in values {
        let bin = if width > 0.0 {
            (((value - min) / width).floor() as usize).min(bins - 1)
        } else {
            0
        };
        counts[bin] += 1;
    }
    Series {
        label: label.to_owned(),
        x_values: (0..bins).map(|bin| Value::Number(min + bin as f64 * width)).collect(),
        y_values: counts.into_iter().map(|count| Value::Number(count as f64)).collect(),
    }
}
