//! # sitesheet
//!
//! Normalization, statistics and chart descriptions for the spreadsheets of
//! construction projects.
//!
//! Data flows through four stages, each consuming only the typed output of
//! the previous one:
//!
//! - **Loader** ([`spreadsheet`]): reads `.xlsx`/`.xlsm`/`.xlam`, `.ods` and
//!   `.csv` files into [`RawGrid`]s.
//! - **Normalizer** ([`table`]): prunes empty rows and columns, names the
//!   columns from the header row, infers a type per column and coerces every
//!   cell into a [`NormalizedTable`].
//! - **Aggregator** ([`aggregate`]): per-column statistics and their
//!   cross-sheet rollup.
//! - **Chart builder** ([`chart`]): declarative [`ChartSpec`]s for bar, line,
//!   pie, scatter and histogram charts.
//!
//! The [`browser`], [`pipeline`] and [`report`] modules wire the stages to a
//! folder of project directories, and the `sitesheet` binary exposes them on
//! the command line.
//!
//! ```no_run
//! use sitesheet::{aggregate, build_chart, ChartKind, ChartRequest};
//!
//! let table = sitesheet::pipeline::load_table("Construction/Tower/costs.xlsx", "Q1", &Default::default())?;
//! let summary = aggregate(&table);
//! let chart = build_chart(&table, &ChartRequest::new(ChartKind::Pie, "Trade").with_y("Cost"))?;
//! # Ok::<(), sitesheet::Error>(())
//! ```

pub mod aggregate;
pub mod browser;
pub mod chart;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod spreadsheet;
pub mod table;

mod helpers;

pub use aggregate::aggregate;
pub use aggregate::combine;
pub use aggregate::AggregateResult;
pub use chart::build_chart;
pub use chart::ChartKind;
pub use chart::ChartRequest;
pub use chart::ChartSpec;
pub use error::Error;
pub use error::Result;
pub use spreadsheet::open_spreadsheet;
pub use spreadsheet::open_spreadsheet_bytes;
pub use table::normalize;
pub use table::normalize_with;
pub use table::NormalizedTable;
pub use table::RawGrid;
