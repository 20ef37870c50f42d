//! Process harness and smoke checks for MCP servers
//!
//! Brings a server under test up in its own process group, waits until it answers
//! over HTTP, runs tool checks through the rmcp client, and tears the whole group
//! down again on every exit path.

pub mod config;
pub mod error;
pub mod fixture;
pub mod harness;
pub mod logging;
pub mod mcp_client;
pub mod port;
pub mod process;
pub mod readiness;
pub mod smoke;

pub use config::{HarnessConfig, ServerCommand};
pub use error::HarnessError;
pub use harness::{HarnessState, ServerHarness, run_session};
pub use port::acquire_free_port;
pub use process::{ServerProcess, ShutdownOutcome};
pub use readiness::wait_until_ready;
pub use smoke::{JobCheck, SmokeReport, SmokeSuite};
