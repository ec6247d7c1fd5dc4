//! Command line shell over the sitesheet engine.

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use sitesheet::aggregate::aggregate;
use sitesheet::browser::project_folders;
use sitesheet::browser::spreadsheet_files;
use sitesheet::chart::build_chart;
use sitesheet::chart::ChartKind;
use sitesheet::chart::ChartRequest;
use sitesheet::config::Config;
use sitesheet::pipeline::load_table;
use sitesheet::pipeline::process_file;
use sitesheet::pipeline::rollup;
use sitesheet::pipeline::summarize_folder;
use sitesheet::pipeline::summarize_project;
use sitesheet::pipeline::SheetOutcome;
use sitesheet::report::JsonRenderer;
use sitesheet::report::PresentationRenderer;
use sitesheet::report::Report;
use sitesheet::report::DEFAULT_TITLE;
use sitesheet::spreadsheet::open_spreadsheet;
use sitesheet::spreadsheet::Spreadsheet;
use sitesheet::table::NormalizeOptions;
use sitesheet::table::NormalizedTable;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

/// Normalize, summarize and chart construction-project spreadsheets.
#[derive(Parser, Debug)]
#[command(name = "sitesheet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder holding one sub-folder per project [default: $CONSTRUCTION_FOLDER_PATH or ./Construction]
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Text treated as an empty cell (repeatable)
    #[arg(long = "null", value_name = "TEXT")]
    nulls: Vec<String>,

    /// Treat the first row as data and name columns Column_N
    #[arg(long)]
    no_header: bool,

    /// Share of values a mixed column's majority type must reach
    #[arg(long, default_value_t = 0.5)]
    type_threshold: f64,
}

impl NormalizeArgs {
    fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            null_literals: self.nulls.clone(),
            header: !self.no_header,
            type_threshold: self.type_threshold,
        }
    }
}

#[derive(Args, Debug)]
struct SheetArgs {
    /// Spreadsheet file, absolute or relative to the root folder
    file: PathBuf,

    /// Sheet name (default: first sheet)
    #[arg(short, long)]
    sheet: Option<String>,

    #[command(flatten)]
    normalize: NormalizeArgs,
}

#[derive(Args, Debug)]
struct ChartArgs {
    /// Chart kind: bar, line, pie, scatter or histogram
    #[arg(short, long)]
    kind: ChartKind,

    /// Column for the x axis or the pie categories
    #[arg(short)]
    x: String,

    /// Value column (repeatable)
    #[arg(short)]
    y: Vec<String>,

    /// Chart title (default: derived from the columns)
    #[arg(long)]
    title: Option<String>,

    /// Histogram bin count
    #[arg(long)]
    bins: Option<usize>,
}

impl ChartArgs {
    fn request(&self) -> ChartRequest {
        ChartRequest {
            kind: self.kind,
            x_column: self.x.clone(),
            y_columns: self.y.clone(),
            title: self.title.clone(),
            bins: self.bins,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List project folders
    Projects,

    /// List the spreadsheets of a project
    Files {
        project: String,
    },

    /// List the sheets of a spreadsheet
    Sheets {
        /// Spreadsheet file, absolute or relative to the root folder
        file: PathBuf,
    },

    /// Print a normalized sheet
    Show {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Print at most this many rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Print column statistics of a sheet as JSON
    Stats {
        #[command(flatten)]
        sheet: SheetArgs,
    },

    /// Print a chart description of a sheet as JSON
    Chart {
        #[command(flatten)]
        sheet: SheetArgs,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Combine the statistics of every sheet of several files
    Rollup {
        /// Spreadsheet files, absolute or relative to the root folder
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        normalize: NormalizeArgs,
    },

    /// File, sheet and record counts per project
    Summary {
        /// Summarize a single project, per file
        #[arg(short, long)]
        project: Option<String>,

        /// Include chart descriptions
        #[arg(long)]
        charts: bool,

        #[command(flatten)]
        normalize: NormalizeArgs,
    },

    /// Write a JSON report with per-sheet statistics and charts
    Report {
        /// Spreadsheet files, absolute or relative to the root folder
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output folder
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Report title
        #[arg(long, default_value = DEFAULT_TITLE)]
        report_title: String,

        /// Chart every sheet the same way
        #[arg(long, requires = "x")]
        kind: Option<ChartKind>,

        /// Column for the x axis or the pie categories
        #[arg(short, requires = "kind")]
        x: Option<String>,

        /// Value column (repeatable)
        #[arg(short)]
        y: Vec<String>,

        #[command(flatten)]
        normalize: NormalizeArgs,
    },
}

impl Command {
    fn normalize_args(&self) -> Option<&NormalizeArgs> {
        match self {
            Command::Projects | Command::Files { .. } | Command::Sheets { .. } => None,
            Command::Show { sheet, .. } | Command::Stats { sheet } | Command::Chart { sheet, .. } => {
                Some(&sheet.normalize)
            }
            Command::Rollup { normalize, .. }
            | Command::Summary { normalize, .. }
            | Command::Report { normalize, .. } => Some(normalize),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let mut config = Config::from_env().with_root(cli.root.clone());
    if let Some(normalize) = cli.command.normalize_args() {
        config = config.with_normalize(normalize.options());
    }
    log::debug!("Using root folder '{}'", config.root.display());

    match &cli.command {
        Command::Projects => {
            for project in project_folders(&config.root) {
                print_line(&project)?;
            }
        }
        Command::Files { project } => {
            for file in spreadsheet_files(config.root.join(project)) {
                print_line(&file)?;
            }
        }
        Command::Sheets { file } => {
            let path = resolve(&config, file);
            match open_spreadsheet(&path) {
                Ok(spreadsheet) => {
                    for sheet in spreadsheet.sheet_names() {
                        print_line(&sheet)?;
                    }
                }
                Err(error) => log::warn!("{error}"),
            }
        }
        Command::Show { sheet, limit } => {
            if let Some(table) = load(&config, sheet) {
                print_table(&table, limit.unwrap_or(usize::MAX))?;
            }
        }
        Command::Stats { sheet } => {
            if let Some(table) = load(&config, sheet) {
                print_json(&aggregate(&table))?;
            }
        }
        Command::Chart { sheet, chart } => {
            if let Some(table) = load(&config, sheet) {
                match build_chart(&table, &chart.request()) {
                    Ok(spec) => print_json(&spec)?,
                    Err(error) => log::warn!("{error}"),
                }
            }
        }
        Command::Rollup { files, .. } => {
            let outcomes = process_all(&config, files);
            match rollup(&outcomes) {
                Ok(result) => print_json(&result)?,
                Err(error) => log::warn!("{error}"),
            }
        }
        Command::Summary { project, charts, .. } => {
            match project {
                Some(project) => {
                    let summary = summarize_project(config.root.join(project), &config.normalize);
                    summary.warnings.iter().for_each(|warning| log::warn!("{warning}"));
                    let chart_specs = if *charts { summary.charts()? } else { Vec::new() };
                    print_json(&serde_json::json!({ "summary": summary, "charts": chart_specs }))?;
                }
                None => {
                    let summary = summarize_folder(&config.root, &config.normalize);
                    summary.warnings().for_each(|warning| log::warn!("{warning}"));
                    let chart_specs = if *charts { summary.charts()? } else { Vec::new() };
                    print_json(&serde_json::json!({ "summary": summary, "charts": chart_specs }))?;
                }
            }
        }
        Command::Report {
            files,
            output,
            report_title,
            kind,
            x,
            y,
            ..
        } => {
            let outcomes = process_all(&config, files);
            let mut report = Report::new(report_title, chrono::Local::now().naive_local());
            for outcome in &outcomes {
                let Ok(processed) = &outcome.result else {
                    continue;
                };
                if let (Some(kind), Some(x)) = (kind, x) {
                    let mut request = ChartRequest::new(*kind, x);
                    request.y_columns = y.clone();
                    match build_chart(&processed.table, &request) {
                        Ok(spec) => report = report.with_chart(spec),
                        Err(error) => log::warn!("{}: {error}", outcome.handle),
                    }
                }
                report = report.with_summary(processed.summary.clone());
            }
            if outcomes.len() > 1 {
                match rollup(&outcomes) {
                    Ok(result) => report = report.with_summary(result),
                    Err(error) => log::warn!("{error}"),
                }
            }
            let path = JsonRenderer { pretty: true }
                .render(&report, output)
                .with_context(|| format!("Failed to write report to {}", output.display()))?;
            print_line(&path.display().to_string())?;
        }
    }
    Ok(())
}

/// Paths that do not exist as given are looked up under the root folder.
fn resolve(config: &Config, file: &Path) -> PathBuf {
    if file.exists() {
        file.to_path_buf()
    } else {
        config.root.join(file)
    }
}

/// Loads the requested sheet, or the first one. Failures are reported as
/// warnings.
fn load(config: &Config, args: &SheetArgs) -> Option<NormalizedTable> {
    let path = resolve(config, &args.file);
    let sheet = match &args.sheet {
        Some(sheet) => sheet.clone(),
        None => {
            let first = open_spreadsheet(&path).map(|spreadsheet| spreadsheet.sheet_names().into_iter().next());
            match first {
                Ok(Some(sheet)) => sheet,
                Ok(None) => {
                    log::warn!("'{}' has no sheets", path.display());
                    return None;
                }
                Err(error) => {
                    log::warn!("{error}");
                    return None;
                }
            }
        }
    };
    load_table(&path, &sheet, &config.normalize)
        .inspect_err(|error| log::warn!("{error}"))
        .ok()
}

fn process_all(config: &Config, files: &[PathBuf]) -> Vec<SheetOutcome> {
    let mut outcomes = Vec::new();
    for file in files {
        match process_file(resolve(config, file), &config.normalize) {
            Ok(file_outcomes) => outcomes.extend(file_outcomes),
            Err(error) => log::warn!("{error}"),
        }
    }
    outcomes
}

fn print_line(line: &str) -> Result<()> {
    writeln!(std::io::stdout().lock(), "{line}").context("Failed to write output")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to write output")?;
    writeln!(stdout).context("Failed to write output")
}

/// Tab separated, header first, missing values as empty fields.
fn print_table(table: &NormalizedTable, limit: usize) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    let header: Vec<String> = table
        .columns()
        .iter()
        .map(|column| format!("{} ({})", column.name, column.kind))
        .collect();
    writeln!(stdout, "{}", header.join("\t")).context("Failed to write output")?;
    for row in table.rows().iter().take(limit) {
        let fields: Vec<String> = row.iter().map(ToString::to_string).collect();
        writeln!(stdout, "{}", fields.join("\t")).context("Failed to write output")?;
    }
    for column in table.columns().iter().filter(|column| column.coercion_failures > 0) {
        log::warn!(
            "{} value(s) of column '{}' are not {} and were left empty",
            column.coercion_failures,
            column.name,
            column.kind
        );
    }
    Ok(())
}
