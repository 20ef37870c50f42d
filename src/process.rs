//! Server process handle
//!
//! Spawns the server under test in its own process group so that anything it forks
//! can be reached at teardown. Shutdown signals the whole group: SIGTERM first,
//! SIGKILL once the graceful window runs out, then a bounded wait to reap the
//! leader. Nothing in teardown returns an error; problems are logged and swallowed.
//!
//! On platforms without process groups the handle only tracks the direct child
//! and kills it, so descendants the server spawned on its own are not covered.

use crate::config::{ServerCommand, ShutdownConfig};
use crate::error::HarnessError;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[cfg(unix)]
use nix::{
    errno::Errno,
    sys::signal::{Signal, killpg},
    unistd::Pid,
};

/// How a shutdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The process had exited on its own before shutdown began
    AlreadyExited,
    /// The leader exited within the graceful window
    Graceful,
    /// The group had to be killed and the leader was reaped afterwards
    Forced,
    /// The leader could not be confirmed dead after the forceful signal
    Unreaped,
}

/// Owned handle to a spawned server and its process group
#[derive(Debug)]
pub struct ServerProcess {
    pid: u32,
    child: Child,
    finished: bool,
}

/// Assemble the command line: configured program and args followed by `<port_flag> <port>`
pub fn build_command(command: &ServerCommand, port_flag: &str, port: u16) -> Command {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .arg(port_flag)
        .arg(port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

impl ServerProcess {
    /// Spawn the server bound to `port`. Returns as soon as the process exists;
    /// readiness is the caller's concern. Must be called inside a tokio runtime.
    pub fn start(
        command: &ServerCommand,
        port_flag: &str,
        port: u16,
    ) -> Result<Self, HarnessError> {
        let spawn_failure = |source| HarnessError::SpawnFailure {
            program: command.program.clone(),
            source,
        };

        let mut child = build_command(command, port_flag, port)
            .spawn()
            .map_err(spawn_failure)?;
        let pid = child.id().ok_or_else(|| {
            spawn_failure(std::io::Error::other("process exited before its pid was read"))
        })?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, pid, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, pid, "stderr");
        }

        info!(
            "Spawned server `{} {} {}` as pid {} (port {})",
            command, port_flag, port, pid, port
        );
        Ok(Self {
            pid,
            child,
            finished: false,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status if the leader has already exited, without blocking
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Terminate the whole process group. Best effort, never fails.
    pub async fn shutdown(mut self, config: &ShutdownConfig) -> ShutdownOutcome {
        let outcome = self.terminate(config).await;
        self.finished = true;
        outcome
    }

    async fn terminate(&mut self, config: &ShutdownConfig) -> ShutdownOutcome {
        if let Some(status) = self.try_exit_status() {
            info!("Server pid {} had already exited: {}", self.pid, status);
            // Descendants may outlive the leader
            self.force_kill();
            return ShutdownOutcome::AlreadyExited;
        }

        debug!("Sending graceful termination to process group {}", self.pid);
        self.graceful_signal();

        match timeout(config.graceful_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!("Server pid {} exited gracefully: {}", self.pid, status);
                self.force_kill();
                return ShutdownOutcome::Graceful;
            }
            Ok(Err(e)) => warn!("Error waiting for server pid {}: {}", self.pid, e),
            Err(_) => warn!(
                "Server pid {} still running after {:?}, escalating to kill",
                self.pid, config.graceful_timeout
            ),
        }

        self.force_kill();
        match timeout(config.reap_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!("Server pid {} killed: {}", self.pid, status);
                ShutdownOutcome::Forced
            }
            Ok(Err(e)) => {
                warn!("Failed to reap server pid {}: {}", self.pid, e);
                ShutdownOutcome::Unreaped
            }
            Err(_) => {
                warn!(
                    "Server pid {} not reaped within {:?}",
                    self.pid, config.reap_timeout
                );
                ShutdownOutcome::Unreaped
            }
        }
    }

    #[cfg(unix)]
    fn graceful_signal(&mut self) {
        self.signal_group(Signal::SIGTERM);
    }

    #[cfg(not(unix))]
    fn graceful_signal(&mut self) {
        // No graceful group signal available; the kill below is the only lever
        debug!("No process groups on this platform, waiting for pid {}", self.pid);
    }

    #[cfg(unix)]
    fn force_kill(&mut self) {
        self.signal_group(Signal::SIGKILL);
    }

    #[cfg(not(unix))]
    fn force_kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Kill of pid {} failed: {}", self.pid, e);
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: Signal) {
        match killpg(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) => debug!("Sent {} to process group {}", signal, self.pid),
            // Group already gone
            Err(Errno::ESRCH) => debug!("Process group {} already gone", self.pid),
            Err(e) => warn!(
                "Failed to send {} to process group {}: {}",
                signal, self.pid, e
            ),
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            "Server pid {} dropped without shutdown, killing its process group",
            self.pid
        );
        #[cfg(unix)]
        self.signal_group(Signal::SIGKILL);
        let _ = self.child.start_kill();
    }
}

/// Forward a child pipe to tracing line by line so a full pipe never stalls the server
fn forward_lines<R>(pipe: R, pid: u32, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        debug!(target: "server_output", "[pid {} {}] {}", pid, stream, line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(target: "server_output", "error reading server {}: {}", stream, e);
                    break;
                }
            }
        }
    });
}
