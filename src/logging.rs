//! Tracing setup
//!
//! Logs go to stdout and to `~/.sprout/logs/sprout.log` (no ANSI colours),
//! with timestamps in local time. `RUST_LOG` overrides the default `info`
//! filter.

use std::path::PathBuf;
use tracing_subscriber::prelude::*;

/// Name of the log file inside the log directory
pub const LOG_FILE_NAME: &str = "sprout.log";

/// Format timestamps using the system's local time via chrono
struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Default log directory (~/.sprout/logs)
pub fn default_log_dir() -> PathBuf {
    crate::config::get_config_dir().join("logs")
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// Falls back to stdout only when the log file cannot be opened. Returns
/// `false` if a subscriber was already installed.
pub fn init_logging(log_dir: Option<PathBuf>) -> bool {
    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))
        .ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_timer(LocalTimer);
    let installed = match log_file {
        Some(file) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_timer(LocalTimer)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(env_filter())
                .with(stdout_layer)
                .with(file_layer)
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::registry()
            .with(env_filter())
            .with(stdout_layer)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!("Logging initialised ({})", log_dir.display());
    }
    installed
}
