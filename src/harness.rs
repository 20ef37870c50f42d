//! Scoped lifecycle for an out-of-process server under test
//!
//! `NotStarted -> Starting -> Ready -> Terminating -> Terminated`, with
//! `Starting -> Terminated` taken when the server cannot be spawned, never
//! becomes ready, or its start is abandoned. Nothing leaves `Terminated`.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::port::acquire_free_port;
use crate::process::{ServerProcess, ShutdownOutcome};
use crate::readiness::{probe_client, wait_until_ready};
use std::future::Future;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle state of a harness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    NotStarted,
    Starting,
    Ready,
    Terminating,
    Terminated,
}

impl HarnessState {
    pub fn can_transition_to(self, next: HarnessState) -> bool {
        use HarnessState::*;
        matches!(
            (self, next),
            (NotStarted, Starting)
                | (Starting, Ready)
                | (Starting, Terminated)
                | (Ready, Terminating)
                | (Terminating, Terminated)
        )
    }

    /// Whether a server process may be alive in this state
    pub fn is_active(self) -> bool {
        matches!(
            self,
            HarnessState::Starting | HarnessState::Ready | HarnessState::Terminating
        )
    }
}

/// Brings one server up, hands out its URL, and tears its process group down.
#[derive(Debug)]
pub struct ServerHarness {
    id: Uuid,
    config: HarnessConfig,
    state: HarnessState,
    port: Option<u16>,
    process: Option<ServerProcess>,
}

impl ServerHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: HarnessState::NotStarted,
            port: None,
            process: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Pid of the live server, if one is held
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(ServerProcess::pid)
    }

    /// Base URL once the server is ready
    pub fn base_url(&self) -> Option<String> {
        match (self.state, self.port) {
            (HarnessState::Ready, Some(port)) => Some(self.config.base_url(port)),
            _ => None,
        }
    }

    /// Remote-procedure endpoint once the server is ready
    pub fn mcp_url(&self) -> Option<String> {
        self.base_url()
            .map(|base| format!("{base}{}", self.config.mcp_path))
    }

    fn transition(&mut self, next: HarnessState) -> Result<(), HarnessError> {
        if !self.state.can_transition_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        info!("Harness {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Allocate a port, spawn the server and wait for it to answer.
    ///
    /// Returns the ready base URL. If the server never becomes ready its process
    /// group is torn down before the error is returned.
    pub async fn start(&mut self) -> Result<String, HarnessError> {
        if self.state != HarnessState::NotStarted {
            return Err(HarnessError::InvalidTransition {
                from: self.state,
                to: HarnessState::Starting,
            });
        }
        let probe = probe_client(&self.config.readiness)?;
        let port = match self.config.port {
            Some(port) => port,
            None => acquire_free_port()?,
        };
        self.port = Some(port);
        self.transition(HarnessState::Starting)?;

        match ServerProcess::start(&self.config.command, &self.config.port_flag, port) {
            Ok(process) => self.process = Some(process),
            Err(e) => {
                warn!("Harness {}: {}", self.id, e);
                self.transition(HarnessState::Terminated)?;
                return Err(e);
            }
        }

        let base_url = self.config.base_url(port);
        let probe_url = format!("{base_url}{}", self.config.readiness.path);
        match wait_until_ready(&probe, &probe_url, &self.config.readiness).await {
            Ok(_) => {
                self.transition(HarnessState::Ready)?;
                Ok(base_url)
            }
            Err(e) => {
                if let Some(mut process) = self.process.take() {
                    if let Some(status) = process.try_exit_status() {
                        warn!(
                            "Harness {}: server exited before becoming ready: {}",
                            self.id, status
                        );
                    }
                    warn!("Harness {}: {}, cleaning up", self.id, e);
                    process.shutdown(&self.config.shutdown).await;
                }
                self.transition(HarnessState::Terminated)?;
                Err(e)
            }
        }
    }

    /// Tear the server down. Safe to call in any state; a no-op unless a server is held.
    ///
    /// A start that was abandoned mid-readiness (its future dropped, e.g. on a
    /// signal) leaves the harness in `Starting` with the process held; that
    /// process is shut down too and the harness goes straight to `Terminated`.
    pub async fn shutdown(&mut self) -> Option<ShutdownOutcome> {
        if self.state != HarnessState::Starting {
            self.transition(HarnessState::Terminating).ok()?;
        }
        let outcome = match self.process.take() {
            Some(process) => process.shutdown(&self.config.shutdown).await,
            None => ShutdownOutcome::AlreadyExited,
        };
        // Both Starting and Terminating may move to Terminated
        let _ = self.transition(HarnessState::Terminated);
        info!("Harness {}: shutdown finished ({:?})", self.id, outcome);
        Some(outcome)
    }
}

/// Run `session` against a freshly started server and always tear it down.
///
/// The server is shut down whether the session returns `Ok` or `Err`; a panic
/// inside the session drops the process handle, which kills the group.
pub async fn run_session<F, Fut, T>(config: HarnessConfig, session: F) -> anyhow::Result<T>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut harness = ServerHarness::new(config);
    let base_url = harness.start().await?;
    let result = session(base_url).await;
    harness.shutdown().await;
    result
}
