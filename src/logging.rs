//! Logging initialization utilities.
//!
//! `init_subscriber` configures tracing for either stderr (default) or a rolling daily
//! log file under the user's cache dir. Verbose mode enables debug level, which also
//! surfaces the forwarded output of the server under test. Repeated calls are no-ops.
//! Write failures, such as a reader that closed our stderr pipe, are dropped silently.

use directories::ProjectDirs;
use std::{fs, path::PathBuf, sync::Once};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Directory the rolling log file is written to, if the platform has a cache dir
pub fn log_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "mcp_harness", "mcp_harness")
        .map(|proj| proj.cache_dir().join("logs"))
}

/// Initialize the global tracing subscriber.
///
/// * `log_to_file` - if true, write logs to a rolling daily file under the user's cache dir
/// * `verbose` - if true, set global log level to `debug`, otherwise `info`
pub fn init_subscriber(log_to_file: bool, verbose: bool) {
    INIT.call_once(|| {
        let level = if verbose { "debug" } else { "info" };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        if log_to_file && let Some(dir) = log_dir() {
            if let Err(e) = fs::create_dir_all(&dir) {
                eprintln!("Failed to create log dir {:?}: {e}", dir);
            }
            let file_appender = tracing_appender::rolling::daily(&dir, "harness.log");
            let (nb, guard) = tracing_appender::non_blocking(file_appender);
            // Flushes on drop, so it has to live as long as the process
            Box::leak(Box::new(guard));
            fmt()
                .with_env_filter(env_filter)
                .with_writer(nb)
                .with_ansi(false)
                .log_internal_errors(false)
                .init();
            tracing::debug!("Logging to {:?} verbose={}", dir, verbose);
            return;
        }

        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            // A closed stderr drops events instead of panicking in the fallback report
            .log_internal_errors(false)
            .init();
        tracing::debug!("Logging to stderr verbose={}", verbose);
    });
}
