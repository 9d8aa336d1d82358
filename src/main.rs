mod cli;
mod logging;
mod reporter;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use colored::*;
use dotenv::dotenv;
use reporter::CliReporter;
use reposeer::catalog::{CatalogError, CatalogIndex, CatalogLoader, CsvLoader, SqliteLoader};
use reposeer::{AppConfig, Error, HashAlgorithm, RunFailure, RunOptions, RunReport, ScanEngine};
use signal_hook::consts::SIGINT;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() {
    let code = {
        dotenv().ok();
        let cli = Cli::parse();
        let _guard = logging::init_logger(logging::console_level(cli.verbose, cli.quiet));

        match run(&cli) {
            Ok(()) => 0,
            Err(err) => {
                report_error(&err);
                exit_code(&err)
            }
        }
    };
    process::exit(code);
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.config).context("Error loading configuration")?;
    let options = RunOptions::resolve(&cli.source, &cli.dest, &config, &cli.overrides())?;
    let engine = ScanEngine::new(options)?;

    // A second Ctrl-C while the first is pending exits immediately.
    let cancel = engine.cancel_token();
    signal_hook::flag::register_conditional_shutdown(SIGINT, 130, Arc::clone(&cancel))
        .context("Error installing interrupt handler")?;
    signal_hook::flag::register(SIGINT, cancel).context("Error installing interrupt handler")?;

    let reporter = CliReporter::new();
    let catalog = load_catalog(cli, &config, engine.options().hash_algorithm, &reporter)?;
    info!(
        "Catalog: {} entries, {} distinct sizes",
        catalog.len(),
        catalog.distinct_sizes()
    );
    if catalog.is_empty() {
        warn!("Catalog is empty; every file will be unmatched");
    }

    let outcome = engine.run(&catalog, &reporter);
    let report = match &outcome {
        Ok(report) => report,
        Err(failure) => &failure.report,
    };
    print_summary(report);

    let report_path = cli
        .report
        .clone()
        .or_else(|| config.report_path.as_ref().map(PathBuf::from));
    if let Some(path) = report_path {
        match report.write_csv(&path) {
            Ok(()) => info!("Run report appended to {}", path.display()),
            Err(e) => error!("Error writing run report {}: {}", path.display(), e),
        }
    }

    outcome.map(drop).map_err(anyhow::Error::from)
}

/// Command-line catalogs win over configured ones; a database wins over a CSV.
fn load_catalog(
    cli: &Cli,
    config: &AppConfig,
    algorithm: HashAlgorithm,
    reporter: &CliReporter,
) -> Result<CatalogIndex, CatalogError> {
    let db = match (&cli.db, &cli.csv) {
        (Some(db), _) => Some(db.clone()),
        (None, Some(_)) => None,
        (None, None) => config.catalog_db.as_ref().map(PathBuf::from),
    };
    if let Some(db) = db {
        let query = cli.db_query.as_deref().unwrap_or(&config.catalog_query);
        info!("Loading catalog from database {}", db.display());
        return SqliteLoader::new(db, algorithm)
            .with_query(query)
            .load(reporter);
    }

    let csv = cli
        .csv
        .clone()
        .or_else(|| config.catalog_csv.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("libgen.csv"));
    info!("Loading catalog from {}", csv.display());
    CsvLoader::new(csv, algorithm).load(reporter)
}

fn print_summary(report: &RunReport) {
    let stats = &report.stats;
    println!();
    if report.dry_run {
        info!("{}", "Dry run: nothing was changed".yellow());
    }
    info!(
        "Processed {} in {}",
        stats.processed.human().cyan(),
        format!("{:.2}s", report.duration.as_secs_f64()).green(),
    );
    info!(
        "Duplicates {}, added {}, unmatched {}",
        stats.duplicate.human().red(),
        stats.added.human().green(),
        stats.unmatched().human().yellow(),
    );
    if stats.removed_sources > 0 || report.reaped_dirs > 0 {
        info!(
            "{} duplicate sources removed, {} empty directories removed",
            stats.removed_sources, report.reaped_dirs
        );
    }
}

fn report_error(err: &anyhow::Error) {
    error!("Error: {:#}", err);
    if let Some(hint) = library_error(err).and_then(cli::hint) {
        error!("{}", hint);
    }
}

fn library_error(err: &anyhow::Error) -> Option<&Error> {
    err.downcast_ref::<RunFailure>()
        .map(|failure| &failure.error)
        .or_else(|| err.downcast_ref::<Error>())
}

fn exit_code(err: &anyhow::Error) -> i32 {
    library_error(err).map(Error::exit_code).unwrap_or(1)
}
