use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{ArgAction, Parser, Subcommand};
use impactor_common::{CellValue, DEFAULT_TIMESTAMP_FORMATS, parse_timestamp};
use impactor_engine::{
    CommandFetcher, CsvSink, DirectoryFetcher, EngineConfig, EngineError, Incident,
    MetricsExtractor, Pipeline, Reconciler, ReportFetcher, RunMode, RunSummary,
    split_incident_into_windows, window_for_date,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Exit status when the workbook is held open by another program.
const EXIT_STORAGE_BUSY: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "impactor",
    version,
    about = "Measure incident impact from call reports and record it in the incident workbook"
)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Measure every pending incident and write results back.
    Run(RunArgs),
    /// Clear duplicate and contradicted measurements in place.
    Reconcile(ReconcileArgs),
    /// Print the metrics of a single report artifact.
    Metrics(MetricsArgs),
    /// Print the day windows of an interval.
    Windows(WindowsArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Incident workbook (.xlsx).
    source: PathBuf,

    /// YAML run configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding pre-downloaded artifacts named `<id>_<YYYY-MM-DD>.xlsx`.
    #[arg(
        long = "artifacts-dir",
        required_unless_present = "fetch_command",
        conflicts_with = "fetch_command"
    )]
    artifacts_dir: Option<PathBuf>,

    /// Command that downloads one artifact and prints its path.
    /// Placeholders: {incident}, {region}, {selectors}, {date}, {start}, {end}.
    #[arg(long = "fetch-command")]
    fetch_command: Option<String>,

    /// Measure only this day (YYYY-MM-DD).
    #[arg(long, conflicts_with = "auto_date")]
    date: Option<NaiveDate>,

    /// Measure only the day found in the workbook's day-only column.
    #[arg(long = "auto-date")]
    auto_date: bool,

    /// Also write this run's results as CSV.
    #[arg(long = "out-csv")]
    out_csv: Option<PathBuf>,

    /// Skip the reconciliation pass after saving.
    #[arg(long = "no-reconcile")]
    no_reconcile: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct ReconcileArgs {
    source: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct MetricsArgs {
    artifact: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct WindowsArgs {
    #[arg(long, value_parser = parse_moment)]
    start: NaiveDateTime,

    /// Omit for an incident that is still open.
    #[arg(long, value_parser = parse_moment)]
    end: Option<NaiveDateTime>,

    /// Print only the window for this day.
    #[arg(long)]
    date: Option<NaiveDate>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<EngineError>() {
            Some(EngineError::StorageBusy { path, .. }) => {
                eprintln!(
                    "error: {} is open in another program; close it and run again",
                    path.display()
                );
                ExitCode::from(EXIT_STORAGE_BUSY)
            }
            _ => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run(args),
        Command::Reconcile(args) => reconcile(args),
        Command::Metrics(args) => metrics(args),
        Command::Windows(args) => windows(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mode = match (args.date, args.auto_date) {
        (Some(date), _) => RunMode::SingleDate(date),
        (None, true) => RunMode::AutoDate,
        (None, false) => RunMode::AllWindows,
    };
    let reconcile = !args.no_reconcile;

    let summary = match (&args.artifacts_dir, &args.fetch_command) {
        (Some(dir), _) => execute(config, DirectoryFetcher::new(dir), mode, reconcile, &args.source)?,
        (None, Some(line)) => {
            let fetcher = CommandFetcher::parse(line).context("invalid --fetch-command")?;
            execute(config, fetcher, mode, reconcile, &args.source)?
        }
        (None, None) => bail!("one of --artifacts-dir or --fetch-command is required"),
    };

    if let Some(path) = &args.out_csv {
        let mut sink = CsvSink::create(path)?;
        sink.write_all(&summary.results)?;
        let written = sink.written();
        sink.finish()?;
        tracing::info!(rows = written, path = %path.display(), "csv written");
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn execute<F: ReportFetcher>(
    config: EngineConfig,
    fetcher: F,
    mode: RunMode,
    reconcile: bool,
    source: &Path,
) -> Result<RunSummary, EngineError> {
    Pipeline::new(config, fetcher)
        .with_mode(mode)
        .with_reconcile(reconcile)
        .run(source)
}

fn print_summary(summary: &RunSummary) {
    if let Some(date) = summary.target_date {
        println!("target date: {date}");
    }
    println!(
        "incidents: {} seen, {} window(s) measured, {} failed, {} row(s) written, {} already processed",
        summary.incidents_seen,
        summary.windows_measured,
        summary.windows_failed,
        summary.rows_written,
        summary.already_processed
    );
    println!(
        "skipped: {} region, {} open, {} off-date, {} unparseable, {} below materiality",
        summary.skipped_region,
        summary.skipped_open,
        summary.skipped_date,
        summary.skipped_unparseable,
        summary.below_materiality
    );
    if let Some(report) = &summary.reconciliation {
        println!("reconciled: {} row(s) changed", report.mutated());
    }
}

fn reconcile(args: ReconcileArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let report = Reconciler::new(config.source).reconcile(&args.source)?;
    println!(
        "scanned {} row(s): {} duplicate group(s), {} duplicate(s) zeroed, {} negative excess zeroed",
        report.rows_scanned,
        report.duplicate_groups,
        report.duplicates_zeroed,
        report.negative_excess_zeroed
    );
    Ok(())
}

fn metrics(args: MetricsArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let (lost, excess) = MetricsExtractor::new(config.report)
        .extract_metrics(&args.artifact)
        .with_context(|| format!("failed to read {}", args.artifact.display()))?;
    println!("lost_calls\t{lost}");
    println!("excess_ratio\t{excess:.4}");
    Ok(())
}

fn windows(args: WindowsArgs) -> Result<()> {
    let windows = match (args.date, args.end) {
        (Some(date), end) => {
            let incident = Incident::new("", "", args.start, end);
            vec![window_for_date(&incident, date)]
        }
        (None, Some(end)) => split_incident_into_windows(args.start, end),
        (None, None) => bail!("--end is required unless --date is given"),
    };
    for w in &windows {
        println!("{}\t{}\t{}", w.date, w.start, w.end);
    }
    Ok(())
}

fn parse_moment(raw: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(&CellValue::Text(raw.to_string()), DEFAULT_TIMESTAMP_FORMATS)
        .ok_or_else(|| format!("unrecognized timestamp '{raw}'"))
}
