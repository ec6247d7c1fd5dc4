use crate::aggregate::AggregateResult;
use crate::aggregate::ColumnSummary;
use crate::error::Error;
use crate::error::Result;
use crate::table::ColumnType;
use crate::table::SheetHandle;
use std::collections::HashMap;
use std::collections::HashSet;

/// Rolls several aggregates up into one.
///
/// Columns are matched by name and merged when every input that has them
/// agrees on the type; names seen with different types are left out. An input
/// lacking a column counts all of its rows as missing for it. The result is
/// tagged with `sources`, or with the inputs' sources when `sources` is empty.
pub fn combine(inputs: &[AggregateResult], sources: &[SheetHandle]) -> Result<AggregateResult> {
    let sources = if sources.is_empty() {
        inputs.iter().flat_map(|input| input.sources.iter().cloned()).collect()
    } else {
        sources.to_vec()
    };

    match inputs {
        [] => Err(Error::IncompatibleSchema("nothing to combine".to_owned())),
        [single] => Ok(AggregateResult {
            sources,
            ..single.clone()
        }),
        _ => {
            let names = column_kinds(inputs)?;
            let row_count = inputs.iter().map(|input| input.row_count).sum();
            let columns = names
                .into_iter()
                .filter_map(|(name, kind)| Some(merge_column(inputs, &name, kind?)))
                .collect();
            Ok(AggregateResult {
                sources,
                row_count,
                columns,
            })
        }
    }
}

/// Column names in first-seen order, each with its type or `None` when the
/// inputs disagree on it. Fails when no name is shared by two inputs.
fn column_kinds(inputs: &[AggregateResult]) -> Result<Vec<(String, Option<ColumnType>)>> {
    let mut names: Vec<(String, Option<ColumnType>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut occurrences: HashMap<&str, usize> = HashMap::new();

    for input in inputs {
        let mut seen = HashSet::new();
        for column in &input.columns {
            if !seen.insert(column.name.as_str()) {
                continue;
            }
            *occurrences.entry(column.name.as_str()).or_default() += 1;
            match positions.get(column.name.as_str()) {
                Some(&position) => {
                    if names[position].1 != Some(column.kind) {
                        names[position].1 = None;
                    }
                }
                None => {
                    positions.insert(column.name.as_str(), names.len());
                    names.push((column.name.clone(), Some(column.kind)));
                }
            }
        }
    }

    if occurrences.values().all(|&count| count < 2) {
        return Err(Error::IncompatibleSchema(format!(
            "the {} inputs share no column name",
            inputs.len()
        )));
    }
    Ok(names)
}

fn merge_column(inputs: &[AggregateResult], name: &str, kind: ColumnType) -> ColumnSummary {
    let mut merged = ColumnSummary::empty(name, kind);
    for input in inputs {
        match input.column(name) {
            Some(column) => merged.merge(column),
            None => merged.missing_count += input.row_count,
        }
    }
    merged.finish();
    merged
}
