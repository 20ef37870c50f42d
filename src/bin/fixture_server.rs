//! Fixture MCP server used by the harness integration tests

use anyhow::Result;
use clap::Parser;
use mcp_harness::fixture::{FixtureOptions, serve};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "fixture_server", version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Port to bind on 127.0.0.1
    #[arg(long)]
    port: u16,

    /// Delay before binding the port, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    startup_delay_ms: u64,

    /// Keep running when SIGTERM arrives
    #[arg(long)]
    ignore_sigterm: bool,

    /// Spawn a descendant that ignores SIGTERM and write its pid to this file
    #[arg(long, value_name = "PATH")]
    child_pid_file: Option<PathBuf>,

    /// Job ids that trigger_job_run accepts (repeatable or comma-separated)
    #[arg(long, value_name = "ID", value_delimiter = ',')]
    known_job: Vec<i64>,

    /// Enable verbose debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    mcp_harness::logging::init_subscriber(false, args.verbose);

    serve(FixtureOptions {
        port: args.port,
        startup_delay: Duration::from_millis(args.startup_delay_ms),
        ignore_sigterm: args.ignore_sigterm,
        child_pid_file: args.child_pid_file,
        known_jobs: args.known_job,
    })
    .await
    .inspect_err(|e| tracing::error!("fixture error: {e:#}"))
}
