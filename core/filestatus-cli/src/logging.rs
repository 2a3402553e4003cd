//! Subscriber setup for the CLI.
//!
//! - `FILESTATUS_LOG`: `EnvFilter` directives (default `warn`)
//! - `FILESTATUS_DEBUG_LOG=1`: force `debug`
//! - `FILESTATUS_LOG_DIR`: also write a daily-rolling `filestatus.log` there

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "FILESTATUS_LOG";
const DEBUG_ENV: &str = "FILESTATUS_DEBUG_LOG";
const LOG_DIR_ENV: &str = "FILESTATUS_LOG_DIR";
const LOG_FILE_NAME: &str = "filestatus.log";

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init() -> Option<WorkerGuard> {
    let filter = build_filter(
        std::env::var(DEBUG_ENV).ok().as_deref(),
        std::env::var(LOG_ENV).ok().as_deref(),
    );
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(dir) = std::env::var_os(LOG_DIR_ENV).map(|raw| expand_home(PathBuf::from(raw)))
    else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init();
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init();
        tracing::warn!(dir = %dir.display(), error = %e, "Log directory unavailable, logging to stderr only");
        return None;
    }

    let appender = RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init();
    Some(guard)
}

fn debug_forced(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

fn build_filter(debug: Option<&str>, directives: Option<&str>) -> EnvFilter {
    if debug_forced(debug) {
        return EnvFilter::new("debug");
    }
    directives
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path,
    }
}
