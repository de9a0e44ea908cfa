//! Logging setup for wabot using tracing.
//!
//! The log file gets everything `RUST_LOG` allows (default `info,wabot=debug`).
//! The terminal is quieter by default because `wabot console` shares it with
//! chat replies; `WABOT_CONSOLE_LOG` takes the same directive syntax.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const FILE_DIRECTIVES: &str = "info,wabot=debug";
const CONSOLE_DIRECTIVES: &str = "warn,wabot=info";
const CONSOLE_ENV: &str = "WABOT_CONSOLE_LOG";

/// Initialize logging with a rolling file appender and console output.
///
/// The returned guard flushes the file writer on drop, so callers keep it
/// alive for the lifetime of the process.
pub fn init() -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = get_log_dir()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "wabot.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FILE_DIRECTIVES));
    let console_filter = console_filter(std::env::var(CONSOLE_ENV).ok().as_deref());

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_filter(file_filter);

    // stderr, so log lines never land in the stdout reply stream.
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), "wabot logging initialized");

    Ok((guard, log_dir))
}

/// Console filter from `WABOT_CONSOLE_LOG`, falling back to the default when
/// it is unset or does not parse.
fn console_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(CONSOLE_DIRECTIVES))
}

fn get_log_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "wabot", "wabot")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    Ok(dirs.data_dir().join("logs"))
}
