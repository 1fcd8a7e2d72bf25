use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use crossborder_config::{IndicatorCatalog, PipelineConfig};
use crossborder_sqlite::{OutcomeStatus, Pipeline, RunReport, TableOutcome, table_fingerprint};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

/// Configuration file used when `--config` is not given, if it exists.
const DEFAULT_CONFIG_PATH: &str = "conf/pipeline.yaml";

#[derive(Debug, Parser)]
#[command(name = "crossborder")]
#[command(about = "Pivot World Bank indicator tables to long form and partition them by country")]
#[command(version)]
struct Cli {
    /// Pipeline configuration YAML (default: conf/pipeline.yaml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database, overriding the configured one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the wide indicator tables in the store.
    Tables,
    /// Read country keys and report tables excluded by the consistency check.
    Check(OutputArgs),
    /// Pivot one table, or every table that passes the consistency check.
    Pivot(PivotArgs),
    /// Build one table per country from the consistent indicator tables.
    Partition(OutputArgs),
    /// Discover, check, pivot and partition in one pass.
    Run(OutputArgs),
    /// Compare the indicator catalog with the tables in the store.
    Coverage(OutputArgs),
    /// Print the SHA-256 content fingerprint of a table.
    Fingerprint(FingerprintArgs),
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Print machine-readable JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct PivotArgs {
    /// Wide table to pivot; all consistent tables when omitted.
    #[arg(long)]
    table: Option<String>,
    /// Print machine-readable JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct FingerprintArgs {
    /// Table to hash.
    #[arg(long)]
    table: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = load_config(cli.config.as_deref(), cli.db).and_then(|config| match cli.command {
        Command::Tables => run_tables(&config),
        Command::Check(args) => run_check(&config, args),
        Command::Pivot(args) => run_pivot(&config, args),
        Command::Partition(args) => run_partition(&config, args),
        Command::Run(args) => run_run(&config, args),
        Command::Coverage(args) => run_coverage(&config, args),
        Command::Fingerprint(args) => run_fingerprint(&config, args),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, db: Option<PathBuf>) -> Result<PipelineConfig, String> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_PATH).is_file() => PipelineConfig::load(DEFAULT_CONFIG_PATH)
            .map_err(|e| format!("Failed to load config '{DEFAULT_CONFIG_PATH}': {e}"))?,
        None => PipelineConfig::default(),
    };
    if let Some(db) = db {
        config.database = db;
    }
    debug!(database = %config.database.display(), years = %config.years, "Configuration loaded");
    Ok(config)
}

/// Opens an existing database; a missing file is an error rather than a
/// new empty store.
fn open_store(config: &PipelineConfig) -> Result<Connection, String> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Connection::open_with_flags(&config.database, flags)
        .map_err(|e| format!("Failed to open database '{}': {e}", config.database.display()))
}

fn build_pipeline<'a>(conn: &'a Connection, config: &PipelineConfig) -> Result<Pipeline<'a>, String> {
    Pipeline::new(conn, config).map_err(|e| format!("Failed to load templates: {e}"))
}

fn run_tables(config: &PipelineConfig) -> Result<(), String> {
    let conn = open_store(config)?;
    let pipeline = build_pipeline(&conn, config)?;
    let tables = pipeline.discover().map_err(|e| format!("Discovery failed: {e}"))?;
    for table in &tables {
        println!("{table}");
    }
    info!(count = tables.len(), "Listed wide tables");
    Ok(())
}

fn run_check(config: &PipelineConfig, args: OutputArgs) -> Result<(), String> {
    let conn = open_store(config)?;
    let pipeline = build_pipeline(&conn, config)?;
    let tables = pipeline.discover().map_err(|e| format!("Discovery failed: {e}"))?;
    let check = pipeline
        .check(&tables)
        .map_err(|e| format!("Consistency check failed: {e}"))?;

    if args.json {
        return print_json(&check);
    }

    println!("Consistency check:");
    for (table, count) in &check.report.cardinalities {
        let marker = if check.report.excluded.contains(table) {
            "excluded"
        } else {
            "retained"
        };
        println!("  {table}: {count} countries ({marker})");
    }
    println!(
        "Retained: {}  Excluded: {}  Unreadable: {}",
        check.report.retained.len(),
        check.report.excluded.len(),
        check.key_failures.len()
    );
    print_failures(&check.key_failures);
    fail_if_any(&check.key_failures)
}

fn run_pivot(config: &PipelineConfig, args: PivotArgs) -> Result<(), String> {
    let conn = open_store(config)?;
    let pipeline = build_pipeline(&conn, config)?;

    let outcomes = match args.table {
        Some(table) => match pipeline.pivot_one(&table) {
            Ok(outcome) => vec![TableOutcome::from(outcome)],
            Err(err) if err.aborts_run() => return Err(format!("Pivot aborted: {err}")),
            Err(err) => vec![TableOutcome::failed(table, None, &err)],
        },
        None => {
            let tables = pipeline.discover().map_err(|e| format!("Discovery failed: {e}"))?;
            let check = pipeline
                .check(&tables)
                .map_err(|e| format!("Consistency check failed: {e}"))?;
            let retained: Vec<String> = check.report.retained.keys().cloned().collect();
            pipeline
                .pivot_all(&retained)
                .map_err(|e| format!("Pivot aborted: {e}"))?
        }
    };

    if args.json {
        print_json(&outcomes)?;
    } else {
        println!("Pivot:");
        print_outcomes(&outcomes);
        print_failures(&outcomes);
    }
    fail_if_any(&outcomes)
}

fn run_partition(config: &PipelineConfig, args: OutputArgs) -> Result<(), String> {
    let conn = open_store(config)?;
    let pipeline = build_pipeline(&conn, config)?;
    let tables = pipeline.discover().map_err(|e| format!("Discovery failed: {e}"))?;
    let check = pipeline
        .check(&tables)
        .map_err(|e| format!("Consistency check failed: {e}"))?;
    let outcomes = pipeline
        .partition(&check.report)
        .map_err(|e| format!("Partition aborted: {e}"))?;

    if args.json {
        print_json(&outcomes)?;
    } else {
        println!("Partition:");
        print_outcomes(&outcomes);
        print_failures(&outcomes);
    }
    fail_if_any(&outcomes)
}

fn run_run(config: &PipelineConfig, args: OutputArgs) -> Result<(), String> {
    let conn = open_store(config)?;
    let pipeline = build_pipeline(&conn, config)?;
    let report = pipeline.run().map_err(|e| format!("Run aborted: {e}"))?;

    if args.json {
        print_json(&report)?;
    } else {
        print_run_report(&report);
    }
    if report.has_failures() {
        return Err(format!("{} table operation(s) failed", report.failed()));
    }
    Ok(())
}

fn run_coverage(config: &PipelineConfig, args: OutputArgs) -> Result<(), String> {
    let catalog = IndicatorCatalog::load(&config.indicators).map_err(|e| {
        format!(
            "Failed to load indicator catalog '{}': {e}",
            config.indicators.display()
        )
    })?;
    let conn = open_store(config)?;
    let pipeline = build_pipeline(&conn, config)?;
    let tables = pipeline.discover().map_err(|e| format!("Discovery failed: {e}"))?;
    let coverage = catalog.coverage(&config.naming, &tables);

    if args.json {
        return print_json(&coverage);
    }

    println!(
        "Coverage: {}/{} indicators present",
        coverage.present.len(),
        catalog.len()
    );
    if !coverage.missing.is_empty() {
        println!("\nMissing:");
        for (name, code) in &coverage.missing {
            println!("  {code}  {name}");
        }
    }
    if !coverage.unexpected.is_empty() {
        println!("\nUnexpected tables:");
        for table in &coverage.unexpected {
            println!("  {table}");
        }
    }
    Ok(())
}

fn run_fingerprint(config: &PipelineConfig, args: FingerprintArgs) -> Result<(), String> {
    let conn = open_store(config)?;
    let digest = table_fingerprint(&conn, &args.table)
        .map_err(|e| format!("Failed to fingerprint '{}': {e}", args.table))?;
    println!("{digest}  {}", args.table);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{json}");
    Ok(())
}

fn print_outcomes(outcomes: &[TableOutcome]) {
    for outcome in outcomes {
        let target = outcome.target.as_deref().unwrap_or("-");
        match &outcome.status {
            OutcomeStatus::Succeeded { rows } => {
                println!("  ok    {} -> {target} ({rows} rows)", outcome.source);
            }
            OutcomeStatus::Failed { .. } => {
                println!("  FAIL  {} -> {target}", outcome.source);
            }
        }
    }
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    println!(
        "Succeeded: {succeeded}  Failed: {}",
        outcomes.len() - succeeded
    );
}

fn print_failures(outcomes: &[TableOutcome]) {
    let failures: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match &o.status {
            OutcomeStatus::Failed { error } => Some((o.source.as_str(), error.as_str())),
            OutcomeStatus::Succeeded { .. } => None,
        })
        .collect();
    if failures.is_empty() {
        return;
    }
    eprintln!("\nFailures:");
    for (source, error) in failures {
        eprintln!("  {source}: {error}");
    }
}

fn print_run_report(report: &RunReport) {
    println!(
        "Run started {} ({} ms)",
        report.started_at.to_rfc3339(),
        report.elapsed().num_milliseconds()
    );
    println!("Discovered: {} tables", report.discovered.len());
    if !report.excluded.is_empty() {
        println!("Excluded by consistency check:");
        for table in &report.excluded {
            println!("  {table}");
        }
    }
    if !report.key_failures.is_empty() {
        println!("\nUnreadable:");
        print_outcomes(&report.key_failures);
    }
    println!("\nPivot:");
    print_outcomes(&report.pivots);
    println!("\nPartition:");
    print_outcomes(&report.partitions);
    println!(
        "\nTotal succeeded: {}  Total failed: {}",
        report.succeeded(),
        report.failed()
    );

    let all: Vec<TableOutcome> = report
        .key_failures
        .iter()
        .chain(&report.pivots)
        .chain(&report.partitions)
        .cloned()
        .collect();
    print_failures(&all);
}

fn fail_if_any(outcomes: &[TableOutcome]) -> Result<(), String> {
    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        return Err(format!("{failed} table operation(s) failed"));
    }
    Ok(())
}
