//! sqlbundle CLI: build backtest data bundles from a SQLite price database.
//!
//! Commands:
//! - `ingest`: run an ingestion from a TOML config (or just a database path)
//! - `symbols`: list the symbols a source database holds
//! - `sessions`: print calendar sessions in a date range
//! - `verify`: re-hash a committed bundle against its manifest

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use sqlbundle_core::data::{RawDataSource, SqliteSource};
use sqlbundle_ingest::bundle::BundleManifest;
use sqlbundle_ingest::config::CalendarSection;
use sqlbundle_ingest::pipeline::build_calendar_registry;
use sqlbundle_ingest::{run_ingest, IngestConfig};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sqlbundle",
    about = "sqlbundle: SQLite prices and corporate actions to a backtest data bundle"
)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a source database into a new bundle directory.
    Ingest {
        /// TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Source database; overrides the config.
        #[arg(long)]
        database: Option<PathBuf>,

        /// Symbols to ingest; overrides the config. Defaults to every symbol.
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,

        /// Bundle output directory; overrides the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Normalize symbols in parallel.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Print the bundle manifest as JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List symbols in a source database.
    Symbols {
        /// TOML config file; its source schema names the tables to read.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Source database; overrides the config.
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Print trading sessions between two dates (inclusive).
    Sessions {
        /// TOML config file; its calendar section supplies holidays and alias.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Calendar name or alias. Defaults to the bundle calendar (SQLITEDB).
        #[arg(long)]
        calendar: Option<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Extra closed dates (YYYY-MM-DD), repeatable.
        #[arg(long = "holiday")]
        holidays: Vec<String>,
    },
    /// Check a committed bundle's files against its manifest.
    Verify {
        /// Bundle directory containing manifest.json.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ingest {
            config,
            database,
            symbols,
            output_dir,
            parallel,
            json,
        } => run_ingest_cmd(config, database, symbols, output_dir, parallel, json),
        Commands::Symbols { config, database } => run_symbols(config, database),
        Commands::Sessions {
            config,
            calendar,
            start,
            end,
            holidays,
        } => run_sessions(config, calendar, &start, &end, &holidays),
        Commands::Verify { path } => run_verify(path),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

/// Config from `--config`, or defaults around `--database`; `--database`
/// always wins over the file.
fn load_config(config_path: Option<PathBuf>, database: Option<PathBuf>) -> Result<IngestConfig> {
    let mut config = match (config_path, &database) {
        (Some(path), _) => IngestConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(db)) => IngestConfig::for_database(db),
        (None, None) => bail!("either --config or --database is required"),
    };
    if let Some(db) = database {
        config.source.database = db;
    }
    Ok(config)
}

fn run_ingest_cmd(
    config_path: Option<PathBuf>,
    database: Option<PathBuf>,
    symbols: Vec<String>,
    output_dir: Option<PathBuf>,
    parallel: bool,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path, database)?;
    if !symbols.is_empty() {
        config.symbols = symbols;
    }
    if let Some(dir) = output_dir {
        config.bundle.output_dir = dir;
    }
    config.parallel |= parallel;
    debug!(?config, "resolved ingest config");

    let report = run_ingest(&config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report.manifest)?);
        return Ok(());
    }
    let summary = &report.summary;
    println!("Bundle:     {}", report.path.display());
    println!("Assets:     {}", summary.assets.len());
    println!(
        "Sessions:   {} ({} zero-filled)",
        summary.sessions, summary.zero_filled
    );
    println!("Splits:     {}", summary.splits);
    println!("Dividends:  {}", summary.dividends);
    Ok(())
}

fn list_symbols(config: &IngestConfig) -> Result<Vec<String>> {
    config.validate()?;
    let source = SqliteSource::open(&config.source.database, config.source.schema.clone())?;
    Ok(source.list_symbols()?)
}

fn run_symbols(config_path: Option<PathBuf>, database: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path, database)?;
    for symbol in list_symbols(&config)? {
        println!("{symbol}");
    }
    Ok(())
}

/// Sessions of `calendar` (default: the section's bundle calendar) with
/// `extra` holidays added to the section's own.
fn sessions_between(
    mut section: CalendarSection,
    calendar: Option<&str>,
    extra: &[NaiveDate],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>> {
    if start > end {
        bail!("--start {start} is after --end {end}");
    }
    section.holidays.extend_from_slice(extra);
    let registry = build_calendar_registry(&section)?;
    let name = calendar.unwrap_or(section.bundle_calendar());
    Ok(registry.get(name)?.sessions_in_range(start, end))
}

fn run_sessions(
    config_path: Option<PathBuf>,
    calendar: Option<String>,
    start: &str,
    end: &str,
    holidays: &[String],
) -> Result<()> {
    let section = match config_path {
        Some(path) => {
            IngestConfig::from_file(&path)
                .with_context(|| format!("loading {}", path.display()))?
                .calendar
        }
        None => CalendarSection::default(),
    };
    let extra = holidays.iter().map(|h| parse_date(h)).collect::<Result<Vec<_>>>()?;
    let sessions = sessions_between(
        section,
        calendar.as_deref(),
        &extra,
        parse_date(start)?,
        parse_date(end)?,
    )?;
    for session in sessions {
        println!("{session}");
    }
    Ok(())
}

fn run_verify(path: PathBuf) -> Result<()> {
    let manifest = BundleManifest::load(&path)
        .with_context(|| format!("reading manifest in {}", path.display()))?;
    let mismatched = manifest.verify(&path)?;
    if !mismatched.is_empty() {
        for file in &mismatched {
            eprintln!("MISMATCH {file}");
        }
        bail!("{} of {} files do not match the manifest", mismatched.len(), manifest.files.len());
    }
    println!(
        "{}: {} files OK ({} assets, created {})",
        manifest.bundle,
        manifest.files.len(),
        manifest.symbols,
        manifest.created_at
    );
    Ok(())
}
