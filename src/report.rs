//! Reports assembled from engine outputs, and the renderers that write them.
//!
//! A report is laid out like a slide deck: a title slide, one slide per chart
//! and a closing summary slide. Renderers only lay out what the report holds.

use crate::aggregate::AggregateResult;
use crate::chart::ChartSpec;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_TITLE: &str = "Construction Project Report";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    SerializeError(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub generated_on: NaiveDateTime,
    pub charts: Vec<ChartSpec>,
    pub summaries: Vec<AggregateResult>,
}

impl Report {
    pub fn new(title: &str, generated_on: NaiveDateTime) -> Self {
        Self {
            title: title.to_owned(),
            generated_on,
            charts: Vec::new(),
            summaries: Vec::new(),
        }
    }

    pub fn with_chart(mut self, chart: ChartSpec) -> Self {
        self.charts.push(chart);
        self
    }

    pub fn with_summary(mut self, summary: AggregateResult) -> Self {
        self.summaries.push(summary);
        self
    }

    /// Title slide, one slide per chart and the summary slide.
    pub fn slide_count(&self) -> usize {
        self.charts.len() + 2
    }

    /// `{title}_{YYYYmmdd_HHMMSS}` with characters unsafe in file names
    /// replaced by underscores.
    pub fn file_stem(&self) -> String {
        let title: String = self
            .title
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{title}_{}", self.generated_on.format("%Y%m%d_%H%M%S"))
    }
}

/// Writes a report into an output folder.
pub trait PresentationRenderer {
    /// Extension of the files this renderer produces.
    fn extension(&self) -> &str;

    fn write(&self, report: &Report, writer: &mut dyn Write) -> Result<(), ReportError>;

    /// Writes `report` into `directory`, creating it if needed, and returns
    /// the path of the written file.
    fn render(&self, report: &Report, directory: &Path) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(format!("{}.{}", report.file_stem(), self.extension()));
        let mut writer = BufWriter::new(File::create(&path)?);
        self.write(report, &mut writer)?;
        writer.flush()?;
        log::debug!("Wrote {} slides to '{}'", report.slide_count(), path.display());
        Ok(path)
    }
}

/// Renders the report as a JSON document.
#[derive(Clone, Debug, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

impl PresentationRenderer for JsonRenderer {
    fn extension(&self) -> &str {
        "json"
    }

    fn write(&self, report: &Report, writer: &mut dyn Write) -> Result<(), ReportError> {
        if self.pretty {
            serde_json::to_writer_pretty(writer, report)?;
        } else {
            serde_json::to_writer(writer, report)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::chart::build_chart;
    use crate::chart::ChartKind;
    use crate::chart::ChartRequest;
    use crate::table::normalize;
    use crate::table::RawGrid;
    use chrono::NaiveDate;

    fn generated_on() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(14, 7, 9).unwrap()
    }

    fn report() -> Report {
        let grid = RawGrid::from_text(&[["Trade", "Cost"], ["Steel", "10"], ["Glass", "4"]]);
        let table = normalize(&grid).unwrap();
        let chart = build_chart(&table, &ChartRequest::new(ChartKind::Bar, "Trade").with_y("Cost")).unwrap();
        Report::new("Tower / Q1 costs", generated_on())
            .with_chart(chart)
            .with_summary(aggregate(&table))
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(report().file_stem(), "Tower___Q1_costs_20240305_140709");
        assert_eq!(
            Report::new(DEFAULT_TITLE, generated_on()).file_stem(),
            "Construction_Project_Report_20240305_140709"
        );
    }

    #[test]
    fn test_slide_count() {
        assert_eq!(report().slide_count(), 3);
        assert_eq!(Report::new(DEFAULT_TITLE, generated_on()).slide_count(), 2);
    }

    #[test]
    fn test_json_renderer() {
        let directory = tempfile::tempdir().unwrap();
        let output = directory.path().join("reports");
        let path = JsonRenderer { pretty: true }.render(&report(), &output).unwrap();
        assert_eq!(path, output.join("Tower___Q1_costs_20240305_140709.json"));

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["title"], "Tower / Q1 costs");
        assert_eq!(json["generated_on"], "2024-03-05T14:07:09");
        assert_eq!(json["charts"][0]["kind"], "bar");
        assert_eq!(json["charts"][0]["title"], "Cost by Trade");
        assert_eq!(json["charts"][0]["series"][0]["x_values"], serde_json::json!(["Steel", "Glass"]));
        assert_eq!(json["summaries"][0]["columns"][1]["sum"], 14.0);
    }
}
