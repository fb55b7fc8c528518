//! dispatch - command line front end for pickup/dropoff pairing imports.
//!
//! Reads pairing sheets exported as CSV, reconciles them against the roster in
//! the local record store, and writes or verifies the day's routes.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dispatch_core::config::{parse_date, Config, ENV_TARGET_DATE};
use dispatch_core::import::{read_csv_path, LegStatus, Reconciler};
use dispatch_core::models::{Child, Driver, Period};
use dispatch_core::{
    copy_routes, list_assignments, unassigned_children, unassigned_drivers, verify_pairings,
    CopyReport, FileStore, ImportOptions, ImportReport, VerificationReport,
};

#[derive(Parser)]
#[command(name = "dispatch")]
#[command(about = "Import and verify pickup/dropoff pairings")]
#[command(version)]
struct Cli {
    /// Record store directory (overrides config and DISPATCH_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a pairing sheet into routes (dry run unless --commit)
    #[command(after_help = "\
Examples:
  dispatch import pairings.csv --date 2025-12-08
  dispatch import pairings.csv --date 2025-12-08 --commit
  dispatch import pairings.csv --json")]
    Import {
        /// CSV export of the pairing sheet
        sheet: PathBuf,

        /// Run date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// Write routes to the store
        #[arg(long)]
        commit: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare a pairing sheet with the routes already stored
    Verify {
        /// CSV export of the pairing sheet
        sheet: PathBuf,

        /// Run date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the routes of one date and period
    Routes {
        /// Run date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// AM or PM
        #[arg(long)]
        period: Period,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show active children and drivers without a route
    Unassigned {
        /// Run date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// AM or PM
        #[arg(long)]
        period: Period,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy routes from another date onto the run date
    #[command(after_help = "\
Examples:
  dispatch copy --to 2025-12-09
  dispatch copy --from 2025-12-05 --to 2025-12-08 --period am")]
    Copy {
        /// Run date receiving the routes, YYYY-MM-DD
        #[arg(long, value_parser = parse_date_arg)]
        to: Option<NaiveDate>,

        /// Source date, defaults to the day before
        #[arg(long, value_parser = parse_date_arg)]
        from: Option<NaiveDate>,

        /// Copy only AM or PM
        #[arg(long)]
        period: Option<Period>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace the stored roster from JSON exports
    Roster {
        /// JSON array of child records
        #[arg(long)]
        children: Option<PathBuf>,

        /// JSON array of driver records
        #[arg(long)]
        drivers: Option<PathBuf>,
    },

    /// Show counts and ages of stored collections
    Status,
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=debug). The returned guard
/// flushes the log file on drop.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let config = Config::load().context("Failed to load configuration")?;
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config.data_dir()?,
    };
    info!(data_dir = %data_dir.display(), "dispatch starting");
    let store = FileStore::new(data_dir.clone())
        .with_context(|| format!("Failed to open record store at {}", data_dir.display()))?;

    match cli.command {
        Commands::Import {
            sheet,
            date,
            commit,
            json,
        } => {
            let date = resolve_date(date, &config)?;
            let rows = read_csv_path(&sheet, &config.columns)
                .with_context(|| format!("Failed to load pairing sheet {}", sheet.display()))?;

            let options = ImportOptions {
                target_date: date,
                commit,
            };
            let reconciler = Reconciler::from_store(&store, options).await?;
            let collisions = reconciler.matcher().index().children.collisions().to_vec();
            let report = reconciler.run(&store, &rows).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_import_report(&report, date, commit, &collisions);
            }
        }
        Commands::Verify { sheet, date, json } => {
            let date = resolve_date(date, &config)?;
            let rows = read_csv_path(&sheet, &config.columns)
                .with_context(|| format!("Failed to load pairing sheet {}", sheet.display()))?;
            let report = verify_pairings(&rows, &store, date).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_verification_report(&report, date);
            }
        }
        Commands::Routes { date, period, json } => {
            let date = resolve_date(date, &config)?;
            let assignments = list_assignments(&store, date, period).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&assignments)?);
            } else {
                println!("{} {} routes: {}", date, period, assignments.len());
                for a in &assignments {
                    println!(
                        "  {:<30} {:<30} {}",
                        a.child_name, a.driver_name, a.route.status
                    );
                }
            }
        }
        Commands::Unassigned { date, period, json } => {
            let date = resolve_date(date, &config)?;
            let (children, drivers) = futures::try_join!(
                unassigned_children(&store, date, period),
                unassigned_drivers(&store, date, period)
            )?;

            if json {
                let out = serde_json::json!({ "children": children, "drivers": drivers });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{} {} without a route", date, period);
                println!("\nChildren ({}):", children.len());
                for child in &children {
                    println!("  {}", child.full_name());
                }
                println!("\nDrivers ({}):", drivers.len());
                for driver in &drivers {
                    println!("  {}", driver.full_name());
                }
            }
        }
        Commands::Copy {
            to,
            from,
            period,
            json,
        } => {
            let to = resolve_date(to, &config)?;
            let from = match from {
                Some(from) => from,
                None => to.pred_opt().context("No day before the run date")?,
            };
            let report = copy_routes(&store, from, to, period).await?;
            if report.source_routes == 0 {
                anyhow::bail!("No routes found for {}", from);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_copy_report(&report);
            }
        }
        Commands::Roster { children, drivers } => {
            if children.is_none() && drivers.is_none() {
                anyhow::bail!("Nothing to load: pass --children and/or --drivers");
            }
            if let Some(path) = children {
                let records: Vec<Child> = read_json(&path)?;
                store.save_children(&records).await?;
                println!("Loaded {} children", records.len());
            }
            if let Some(path) = drivers {
                let records: Vec<Driver> = read_json(&path)?;
                store.save_drivers(&records).await?;
                println!("Loaded {} drivers", records.len());
            }
        }
        Commands::Status => {
            println!("Record store: {}", store.data_dir().display());
            for status in store.status() {
                let age = status.age.as_deref().unwrap_or("never saved");
                println!("  {:<10} {:>6}  ({})", status.name, status.count, age);
            }
        }
    }

    Ok(())
}

/// Run date from the flag, then config and environment. No date is fatal.
fn resolve_date(flag: Option<NaiveDate>, config: &Config) -> Result<NaiveDate> {
    flag.or(config.target_date).ok_or_else(|| {
        anyhow::anyhow!(
            "No run date: pass --date, set {} or target_date in {}",
            ENV_TARGET_DATE,
            Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "the config file".to_string())
        )
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

// ============================================================================
// Output
// ============================================================================

fn print_import_report(report: &ImportReport, date: NaiveDate, commit: bool, collisions: &[String]) {
    let mode = if commit { "committed" } else { "dry run" };
    println!("Pairing import for {} ({})", date, mode);
    println!("  Rows:              {}", report.total_rows);
    println!("  Matched children:  {}", report.matched_children);
    println!("  Matched drivers:   {}", report.matched_drivers);
    println!("  Routes created:    {}", report.routes_created);

    if !report.unmatched_children.is_empty() {
        println!("\nUnmatched children ({}):", report.unmatched_children.len());
        for name in &report.unmatched_children {
            println!("  {}", name);
        }
    }
    if !report.unmatched_drivers.is_empty() {
        println!("\nUnmatched drivers ({}):", report.unmatched_drivers.len());
        for label in &report.unmatched_drivers {
            println!("  {}", label);
        }
    }
    if !collisions.is_empty() {
        println!("\nRoster children sharing a name (only one record receives routes):");
        for name in collisions {
            println!("  {}", name);
        }
    }
    if !commit {
        println!("\nNothing written. Re-run with --commit to save routes.");
    }
}

fn print_copy_report(report: &CopyReport) {
    println!("Copied routes {} -> {}", report.from, report.to);
    println!("  Source routes:  {}", report.source_routes);
    println!("  Created:        {}", report.created);
    println!("  Reassigned:     {}", report.reassigned);
}

fn print_verification_report(report: &VerificationReport, date: NaiveDate) {
    println!("Pairing verification for {}", date);
    println!("  Rows:        {}", report.total_rows);
    println!("  Confirmed:   {}", report.confirmed);
    println!("  Mismatched:  {}", report.mismatched);
    println!("  Missing:     {}", report.missing);
    println!("  Unexpected:  {}", report.unexpected);
    println!("  No ride:     {}", report.unassigned);
    println!("  Unresolved:  {}", report.unresolved);

    let problems: Vec<_> = report
        .entries
        .iter()
        .filter(|e| !matches!(e.status, LegStatus::Confirmed { .. } | LegStatus::Unassigned))
        .collect();
    if !problems.is_empty() {
        println!();
        for entry in problems {
            let detail = match &entry.status {
                LegStatus::DriverMismatch { expected, actual } => {
                    format!("sheet says {}, store has {}", expected, actual)
                }
                LegStatus::MissingRoute { expected } => format!("no route, sheet says {}", expected),
                LegStatus::UnexpectedRoute { actual } => {
                    format!("sheet says no ride, store has {}", actual)
                }
                LegStatus::Unresolved { detail } => detail.clone(),
                LegStatus::Confirmed { .. } | LegStatus::Unassigned => continue,
            };
            let via = entry
                .tier
                .map(|tier| format!(" (matched by {})", tier))
                .unwrap_or_default();
            println!(
                "  row {:>4} {} {:<28} {}{}",
                entry.row + 1,
                entry.period,
                entry.rider,
                detail,
                via
            );
        }
    }

    if !report.duplicate_riders.is_empty() {
        println!("\nRiders listed more than once:");
        for name in &report.duplicate_riders {
            println!("  {}", name);
        }
    }
}
