use std::env;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/reposeer.log";

/// Console level picked from `-q` / `-v` counts. `TRACING_LEVEL` wins when set.
pub fn console_level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::WARN,
        (false, 0) => LevelFilter::INFO,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    }
}

/// Pretty console output plus a plain log file at `LOG_FILE_PATH`.
///
/// The file always records debug and above so a run can be audited after
/// the fact, whatever the console shows. Keep the returned guard alive until
/// exit or buffered file output is lost.
pub fn init_logger(console: LevelFilter) -> WorkerGuard {
    let console_filter = match env::var("TRACING_LEVEL") {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => EnvFilter::default().add_directive(console.into()),
    };

    let log_file_path =
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let log_file_path = Path::new(&log_file_path);
    let directory = log_file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file_path
        .file_name()
        .unwrap_or_else(|| OsStr::new("reposeer.log"));
    let created = std::fs::create_dir_all(directory);

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_filter(LevelFilter::DEBUG),
        )
        .init();

    if let Err(e) = created {
        warn!("Cannot create log directory {}: {}", directory.display(), e);
    }
    info!("Logging to {}", log_file_path.display());

    guard
}
