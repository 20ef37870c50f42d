//! Error types for the process harness.

use crate::harness::HarnessState;
use std::time::Duration;

/// Errors raised while bringing a server under test up.
///
/// Teardown never produces one of these: shutdown problems are logged and
/// swallowed so they cannot mask the outcome of the session itself.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Failed to spawn server process `{program}`: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", readiness_message(.url, .timeout, .last_error.as_deref()))]
    ReadinessTimeout {
        url: String,
        timeout: Duration,
        /// Last connection error observed while polling, kept for diagnostics
        last_error: Option<String>,
    },

    #[error("Failed to allocate a free port: {0}")]
    PortAllocation(#[source] std::io::Error),

    #[error("Server command is empty")]
    EmptyCommand,

    #[error("Server command could not be parsed: {0}")]
    InvalidCommand(String),

    #[error("Invalid harness state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: HarnessState, to: HarnessState },

    #[error("Failed to build readiness probe client: {0}")]
    ProbeClient(#[from] reqwest::Error),
}

fn readiness_message(url: &str, timeout: &Duration, last_error: Option<&str>) -> String {
    match last_error {
        Some(err) => format!(
            "Server at {url} did not become ready in {} seconds (last error: {err})",
            timeout.as_secs_f64()
        ),
        None => format!(
            "Server at {url} did not respond in {} seconds",
            timeout.as_secs_f64()
        ),
    }
}

impl HarnessError {
    /// True when the session cannot continue and no retry is attempted by the harness
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            HarnessError::SpawnFailure { .. } | HarnessError::ReadinessTimeout { .. }
        )
    }

    /// Get error category for programmatic handling
    pub fn error_category(&self) -> &'static str {
        match self {
            HarnessError::SpawnFailure { .. } => "SPAWN",
            HarnessError::ReadinessTimeout { .. } => "TIMEOUT",
            HarnessError::PortAllocation(_) => "IO",
            HarnessError::EmptyCommand
            | HarnessError::InvalidCommand(_)
            | HarnessError::ProbeClient(_) => "CONFIG",
            HarnessError::InvalidTransition { .. } => "STATE",
        }
    }
}
