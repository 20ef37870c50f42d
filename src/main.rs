//! Run the MCP smoke suite against a locally spawned server and tear it down afterwards.

use anyhow::{Result, anyhow};
use clap::Parser;
use mcp_harness::{
    HarnessConfig, JobCheck, ServerCommand, ServerHarness, SmokeReport, SmokeSuite,
    smoke::MISSING_JOB_ID,
};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

/// Spawn an MCP server, wait for readiness, exercise its tools, shut it down
#[derive(Parser, Debug)]
#[command(
    name = "mcp_harness",
    version = env!("CARGO_PKG_VERSION"),
    about = "Integration smoke test for an MCP server started as a subprocess",
    long_about = "Starts the server command with `--port <N>` on a free loopback port, \
                  waits until `GET /` answers with 2xx/3xx, then lists and calls its tools \
                  through the MCP client at `/mcp`. The server's whole process group is \
                  terminated afterwards, even when a check fails or the harness is \
                  interrupted with SIGINT/SIGTERM.\n\n\
                  The server command defaults to $MCP_HARNESS_SERVER_CMD, then to \
                  `uv run custom-mcp-server`."
)]
struct Args {
    /// Readiness timeout in seconds (default: 10)
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Job id used to check that trigger_job_run reports errors in its payload
    #[arg(long, value_name = "ID", default_value_t = MISSING_JOB_ID)]
    job_id: i64,

    /// Skip the trigger_job_run check
    #[arg(long, conflicts_with = "job_id")]
    skip_job_check: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Write logs to a rolling daily file instead of stderr
    #[arg(long)]
    log_to_file: bool,

    /// Enable verbose debug logging, including server output
    #[arg(long)]
    verbose: bool,

    /// Server command, e.g. `-- uv run custom-mcp-server`
    #[arg(last = true, value_name = "SERVER_CMD")]
    server_cmd: Vec<String>,
}

impl Args {
    fn harness_config(&self) -> Result<HarnessConfig> {
        let mut config = HarnessConfig::from_env()?;
        if !self.server_cmd.is_empty() {
            config.command = ServerCommand::from_words(&self.server_cmd)?;
        }
        if let Some(secs) = self.timeout {
            config = config.with_readiness_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    fn suite(&self) -> SmokeSuite {
        let job_check = if self.skip_job_check {
            JobCheck::Skip
        } else {
            JobCheck::ExpectFailure(self.job_id)
        };
        SmokeSuite::default().with_job_check(job_check)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    mcp_harness::logging::init_subscriber(args.log_to_file, args.verbose);

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<bool> {
    let config = args.harness_config()?;
    info!("Server command: {}", config.command);
    // Installed before the spawn so an early interrupt still reaches the teardown below
    let interrupted = termination_signal()?;

    let mut harness = ServerHarness::new(config);
    let outcome = tokio::select! {
        outcome = session(args, &mut harness) => outcome,
        signal = interrupted => {
            warn!("{} received, shutting down the server", signal);
            Err(anyhow!("interrupted by {signal}"))
        }
    };
    if harness.state().is_active() {
        harness.shutdown().await;
    }
    let report = outcome?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for tool in &report.tools {
            println!("name: {}", tool.name);
            println!(
                "description: {}",
                tool.description.as_deref().unwrap_or("")
            );
        }
        for check in &report.checks {
            let mark = if check.passed { "✓" } else { "✗" };
            println!("{mark} {}: {}", check.name, check.detail);
        }
    }

    if report.all_passed() {
        info!("All {} checks passed", report.checks.len());
    } else {
        error!("{} checks failed", report.failures().count());
    }
    Ok(report.all_passed())
}

async fn session(args: &Args, harness: &mut ServerHarness) -> Result<SmokeReport> {
    let base_url = harness.start().await?;
    info!("Server ready at {}", base_url);
    let mcp_url = harness
        .mcp_url()
        .ok_or_else(|| anyhow!("server at {base_url} is no longer ready"))?;
    Ok(args.suite().run(&mcp_url, None).await?)
}

/// Resolves with the name of the first SIGINT or SIGTERM.
///
/// The server runs in its own process group, so a terminal interrupt only
/// reaches this process and the server has to be torn down from here.
#[cfg(unix)]
fn termination_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        }
    })
}

#[cfg(not(unix))]
fn termination_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    })
}
