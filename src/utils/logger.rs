use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::toml_config::{LogFormat, LoggingConfig};

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tubegrab=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tubegrab=info,warn"))
    }
}

/// Console logging plus an optional append-only log file.
///
/// A log file that cannot be opened is reported on stderr and skipped, the bot
/// keeps running with console output only.
pub fn init_bot_logger(verbose: bool, logging: &LoggingConfig) {
    let console = match logging.format {
        LogFormat::Compact => fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json()
            .boxed(),
    };

    let file = logging
        .file
        .as_deref()
        .filter(|path| !path.trim().is_empty())
        .and_then(|path| {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(handle) => Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(true)
                        .with_writer(Mutex::new(handle))
                        .boxed(),
                ),
                Err(e) => {
                    eprintln!("⚠️ Cannot open log file '{}': {}", path, e);
                    None
                }
            }
        });

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(console)
        .with(file)
        .init();
}

/// Minimal console logger for the `--check` mode, before any config is loaded.
pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
