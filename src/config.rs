//! Harness configuration
//!
//! Defaults match the lifecycle contract of the harness: 10s readiness window
//! polled every 100ms with 1s per-attempt requests, 10s graceful shutdown and a
//! 5s final reap. Environment overrides are applied on top of the defaults and
//! CLI flags are applied by the binaries on top of that.

use crate::error::HarnessError;
use std::time::Duration;

/// Environment variable holding the full server command line
pub const SERVER_CMD_ENV: &str = "MCP_HARNESS_SERVER_CMD";

/// Environment variable overriding the readiness timeout, in seconds
pub const READY_TIMEOUT_ENV: &str = "MCP_HARNESS_READY_TIMEOUT_SECS";

/// Server command used when nothing else is configured
pub const DEFAULT_SERVER_CMD: &str = "uv run custom-mcp-server";

/// Executable plus leading arguments; the port flag is appended at spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Split a shell-style command line into program and args
    pub fn parse(line: &str) -> Result<Self, HarnessError> {
        let mut words = shlex::split(line)
            .ok_or_else(|| HarnessError::InvalidCommand(line.to_string()))?
            .into_iter();
        let program = words.next().ok_or(HarnessError::EmptyCommand)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    /// Build from already-split words, e.g. trailing CLI arguments
    pub fn from_words(words: &[String]) -> Result<Self, HarnessError> {
        let (program, args) = words.split_first().ok_or(HarnessError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl std::fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Readiness polling behavior
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Path probed with GET, relative to the base URL
    pub path: String,
    /// Overall deadline for the server to answer with 2xx/3xx
    pub timeout: Duration,
    /// Sleep between attempts
    pub poll_interval: Duration,
    /// Bound on a single attempt
    pub request_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            request_timeout: Duration::from_secs(1),
        }
    }
}

/// Teardown windows
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// How long the group gets to exit after the graceful signal
    pub graceful_timeout: Duration,
    /// Final wait for the leader after the forceful signal
    pub reap_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(10),
            reap_timeout: Duration::from_secs(5),
        }
    }
}

/// Full configuration of one harness instance
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub command: ServerCommand,
    /// Loopback host the server binds to
    pub host: String,
    /// Flag passed before the port number
    pub port_flag: String,
    /// Fixed port; `None` allocates an ephemeral one per start
    pub port: Option<u16>,
    /// Suffix of the remote-procedure endpoint
    pub mcp_path: String,
    pub readiness: ReadinessConfig,
    pub shutdown: ShutdownConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            command: ServerCommand::new("uv").arg("run").arg("custom-mcp-server"),
            host: "127.0.0.1".to_string(),
            port_flag: "--port".to_string(),
            port: None,
            mcp_path: "/mcp".to_string(),
            readiness: ReadinessConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn for_command(command: ServerCommand) -> Self {
        Self {
            command,
            ..Default::default()
        }
    }

    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness.timeout = timeout;
        self
    }

    /// Defaults with overrides from the process environment
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::default().apply_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up through `lookup`. Unparseable timeouts are ignored.
    pub fn apply_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, HarnessError> {
        if let Some(line) = lookup(SERVER_CMD_ENV) {
            self.command = ServerCommand::parse(&line)?;
            tracing::info!("Server command from {}: {}", SERVER_CMD_ENV, self.command);
        }
        if let Some(raw) = lookup(READY_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.readiness.timeout = Duration::from_secs(secs),
                Err(e) => tracing::warn!("Ignoring {}={:?}: {}", READY_TIMEOUT_ENV, raw, e),
            }
        }
        Ok(self)
    }

    pub fn base_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_lifecycle_contract() {
        let config = HarnessConfig::default();
        assert_eq!(config.readiness.timeout, Duration::from_secs(10));
        assert_eq!(config.readiness.poll_interval, Duration::from_millis(100));
        assert_eq!(config.readiness.request_timeout, Duration::from_secs(1));
        assert_eq!(config.shutdown.graceful_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown.reap_timeout, Duration::from_secs(5));
        assert_eq!(config.command.to_string(), DEFAULT_SERVER_CMD);
        assert_eq!(config.base_url(8123), "http://127.0.0.1:8123");
    }

    #[test]
    fn parse_splits_quoted_arguments() {
        let cmd = ServerCommand::parse(r#"python -m "my server" --flag"#).unwrap();
        assert_eq!(cmd.program, "python");
        assert_eq!(cmd.args, vec!["-m", "my server", "--flag"]);
    }

    #[test]
    fn parse_rejects_empty_and_unbalanced_lines() {
        assert!(matches!(
            ServerCommand::parse("   "),
            Err(HarnessError::EmptyCommand)
        ));
        assert!(matches!(
            ServerCommand::parse("server \"unterminated"),
            Err(HarnessError::InvalidCommand(_))
        ));
        assert!(ServerCommand::from_words(&[]).is_err());
    }

    #[test]
    fn env_overrides_replace_command_and_timeout() {
        let env: HashMap<&str, &str> = HashMap::from([
            (SERVER_CMD_ENV, "./target/debug/server --verbose"),
            (READY_TIMEOUT_ENV, "3"),
        ]);
        let config = HarnessConfig::default()
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.command.program, "./target/debug/server");
        assert_eq!(config.command.args, vec!["--verbose"]);
        assert_eq!(config.readiness.timeout, Duration::from_secs(3));
    }

    #[test]
    fn bad_timeout_override_is_ignored() {
        let config = HarnessConfig::default()
            .apply_env_overrides(|k| (k == READY_TIMEOUT_ENV).then(|| "soon".to_string()))
            .unwrap();
        assert_eq!(config.readiness.timeout, Duration::from_secs(10));
    }
}
