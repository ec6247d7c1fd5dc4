//! Glue between the loader and the engine: loads sheets from disk, runs them
//! through normalization and aggregation, and rolls folders up into counts.
//!
//! Failures here never abort a batch. A sheet that cannot be read or
//! normalized becomes a failed [`SheetOutcome`], and a file that cannot be
//! opened becomes a warning of the folder summary.

use crate::aggregate::aggregate;
use crate::aggregate::combine;
use crate::aggregate::AggregateResult;
use crate::browser::project_folders;
use crate::browser::spreadsheet_files;
use crate::chart::build_chart;
use crate::chart::ChartKind;
use crate::chart::ChartRequest;
use crate::chart::ChartSpec;
use crate::error::Result;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::Spreadsheet;
use crate::table::normalize_with;
use crate::table::Column;
use crate::table::ColumnType;
use crate::table::NormalizeOptions;
use crate::table::NormalizedTable;
use crate::table::SheetHandle;
use crate::table::Value;
use serde::Serialize;
use std::path::Path;

/// A sheet that made it through normalization and aggregation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessedSheet {
    pub table: NormalizedTable,
    pub summary: AggregateResult,
}

/// Result of processing one sheet of a file.
#[derive(Debug)]
pub struct SheetOutcome {
    pub handle: SheetHandle,
    pub result: Result<ProcessedSheet>,
}

/// Reads and normalizes one sheet.
pub fn load_table(path: impl AsRef<Path>, sheet: &str, options: &NormalizeOptions) -> Result<NormalizedTable> {
    let mut spreadsheet = open_spreadsheet(path)?;
    let grid = spreadsheet.read_sheet(sheet)?;
    normalize_with(&grid, options)
}

/// Normalizes and aggregates every sheet of a file. Only a file that cannot
/// be opened is an error; failing sheets are reported in their outcome.
pub fn process_file(path: impl AsRef<Path>, options: &NormalizeOptions) -> Result<Vec<SheetOutcome>> {
    let mut spreadsheet = open_spreadsheet(path)?;
    let outcomes = spreadsheet
        .sheet_names()
        .into_iter()
        .map(|sheet_name| {
            let handle = SheetHandle::new(spreadsheet.name(), &sheet_name);
            let result = process_sheet(spreadsheet.as_mut(), &sheet_name, options);
            if let Err(error) = &result {
                log::warn!("Skipping {handle}: {error}");
            }
            SheetOutcome { handle, result }
        })
        .collect();
    Ok(outcomes)
}

fn process_sheet(spreadsheet: &mut dyn Spreadsheet, sheet_name: &str, options: &NormalizeOptions) -> Result<ProcessedSheet> {
    let grid = spreadsheet.read_sheet(sheet_name)?;
    let table = normalize_with(&grid, options)?;
    let summary = aggregate(&table);
    Ok(ProcessedSheet { table, summary })
}

/// Combines the summaries of the successful outcomes, tagged with their
/// sheet handles.
pub fn rollup(outcomes: &[SheetOutcome]) -> Result<AggregateResult> {
    let (summaries, handles): (Vec<_>, Vec<_>) = outcomes
        .iter()
        .filter_map(|outcome| {
            let processed = outcome.result.as_ref().ok()?;
            Some((processed.summary.clone(), outcome.handle.clone()))
        })
        .unzip();
    combine(&summaries, &handles)
}

/// Sheet and record counts of one spreadsheet file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub sheets: usize,
    /// Rows of all sheets after normalization.
    pub records: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub files: Vec<FileSummary>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FolderSummary {
    pub projects: Vec<ProjectSummary>,
}

impl ProjectSummary {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn sheet_count(&self) -> usize {
        self.files.iter().map(|file| file.sheets).sum()
    }

    pub fn record_count(&self) -> usize {
        self.files.iter().map(|file| file.records).sum()
    }

    /// One row per file: `File`, `Sheets`, `Records`.
    pub fn to_table(&self) -> NormalizedTable {
        let rows = self
            .files
            .iter()
            .map(|file| vec![Value::Text(file.file.clone()), count(file.sheets), count(file.records)])
            .collect();
        counts_table(&["File", "Sheets", "Records"], rows)
    }

    /// Sheets per file and records per file.
    pub fn charts(&self) -> Result<Vec<ChartSpec>> {
        let table = self.to_table();
        Ok(vec![
            build_chart(&table, &ChartRequest::new(ChartKind::Bar, "File").with_y("Sheets").with_title("Sheets per File"))?,
            build_chart(&table, &ChartRequest::new(ChartKind::Bar, "File").with_y("Records").with_title("Records per File"))?,
        ])
    }
}

impl FolderSummary {
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().flat_map(|project| project.warnings.iter().map(String::as_str))
    }

    /// One row per project: `Project`, `Files`, `Sheets`, `Records`.
    pub fn to_table(&self) -> NormalizedTable {
        let rows = self
            .projects
            .iter()
            .map(|project| {
                vec![
                    Value::Text(project.name.clone()),
                    count(project.file_count()),
                    count(project.sheet_count()),
                    count(project.record_count()),
                ]
            })
            .collect();
        counts_table(&["Project", "Files", "Sheets", "Records"], rows)
    }

    /// Files per project and the share of sheets held by each project.
    pub fn charts(&self) -> Result<Vec<ChartSpec>> {
        let table = self.to_table();
        Ok(vec![
            build_chart(&table, &ChartRequest::new(ChartKind::Bar, "Project").with_y("Files").with_title("Files per Project"))?,
            build_chart(
                &table,
                &ChartRequest::new(ChartKind::Pie, "Project").with_y("Sheets").with_title("Sheet Distribution by Project"),
            )?,
        ])
    }
}

fn count(value: usize) -> Value {
    Value::Number(value as f64)
}

/// Table whose first column is a text label and the rest are counts.
fn counts_table(names: &[&str], rows: Vec<Vec<Value>>) -> NormalizedTable {
    let columns = names
        .iter()
        .enumerate()
        .map(|(index, name)| Column {
            name: (*name).to_owned(),
            kind: if index == 0 { ColumnType::Text } else { ColumnType::Number },
            coercion_failures: 0,
        })
        .collect();
    NormalizedTable::new(columns, rows, None)
}

/// File, sheet and record counts of one project folder.
pub fn summarize_project(project: impl AsRef<Path>, options: &NormalizeOptions) -> ProjectSummary {
    let project = project.as_ref();
    let mut summary = ProjectSummary {
        name: project
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        files: Vec::new(),
        warnings: Vec::new(),
    };

    for file in spreadsheet_files(project) {
        let path = project.join(&file);
        let mut file_summary = FileSummary {
            file,
            sheets: 0,
            records: 0,
        };
        match process_file(&path, options) {
            Ok(outcomes) => {
                file_summary.sheets = outcomes.len();
                for outcome in outcomes {
                    match outcome.result {
                        Ok(processed) => file_summary.records += processed.table.row_count(),
                        Err(error) => summary.warnings.push(format!("{}: {error}", outcome.handle)),
                    }
                }
            }
            Err(error) => {
                log::warn!("Skipping '{}': {error}", path.display());
                summary.warnings.push(error.to_string());
            }
        }
        summary.files.push(file_summary);
    }
    log::debug!(
        "Project '{}': {} files, {} sheets, {} records",
        summary.name,
        summary.file_count(),
        summary.sheet_count(),
        summary.record_count()
    );
    summary
}

/// Summarizes every project folder under `root`.
pub fn summarize_folder(root: impl AsRef<Path>, options: &NormalizeOptions) -> FolderSummary {
    let root = root.as_ref();
    FolderSummary {
        projects: project_folders(root)
            .into_iter()
            .map(|project| summarize_project(root.join(project), options))
            .collect(),
    }
}
