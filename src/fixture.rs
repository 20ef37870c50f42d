//! Minimal MCP server used as a stand-in for the real server in tests
//!
//! Serves `GET /` for readiness and MCP over streamable HTTP at `/mcp` with three
//! tools: `health`, `add_numbers` and `trigger_job_run`. Startup delay, SIGTERM
//! handling and a stubborn descendant process are configurable so every harness
//! lifecycle path can be driven against a real process.

use axum::{Json, Router, routing::get};
use rmcp::{
    ErrorData, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        StreamableHttpService, session::local::LocalSessionManager,
    },
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct AddNumbersRequest {
    /// First addend
    pub a: f64,
    /// Second addend
    pub b: f64,
}

#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct TriggerJobRequest {
    /// Id of the job to run
    pub job_id: i64,
}

#[derive(Clone, Debug)]
pub struct FixtureServer {
    tool_router: ToolRouter<FixtureServer>,
    port: u16,
    known_jobs: Arc<HashSet<i64>>,
    next_run_id: Arc<AtomicU64>,
}

fn json_result(value: Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(value.to_string())])
}

#[tool_router]
impl FixtureServer {
    pub fn new(port: u16, known_jobs: Arc<HashSet<i64>>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            port,
            known_jobs,
            next_run_id: Arc::new(AtomicU64::new(1)),
        }
    }

    #[tool(description = "Report whether the server is healthy")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(json_result(json!({ "status": "healthy" })))
    }

    #[tool(description = "Add two numbers and return the operands with their sum")]
    async fn add_numbers(
        &self,
        Parameters(req): Parameters<AddNumbersRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(json_result(json!({
            "a": req.a,
            "b": req.b,
            "result": req.a + req.b,
        })))
    }

    #[tool(description = "Trigger a run of the given job. Unknown jobs are reported in the payload")]
    async fn trigger_job_run(
        &self,
        Parameters(req): Parameters<TriggerJobRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(json_result(self.job_run_payload(req.job_id)))
    }

    fn job_run_payload(&self, job_id: i64) -> Value {
        if !self.known_jobs.contains(&job_id) {
            return json!({
                "success": false,
                "job_id": job_id,
                "error": format!("Job {job_id} does not exist"),
            });
        }
        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        json!({
            "success": true,
            "job_id": job_id,
            "run_id": run_id,
            "run_page_url": format!("http://127.0.0.1:{}/jobs/{job_id}/runs/{run_id}", self.port),
        })
    }
}

#[tool_handler]
impl ServerHandler for FixtureServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("Fixture MCP server for harness tests.".to_string()),
        }
    }
}

/// Runtime knobs of the fixture process
#[derive(Debug, Clone, Default)]
pub struct FixtureOptions {
    pub port: u16,
    /// Wait this long before binding the port
    pub startup_delay: Duration,
    /// Keep running when SIGTERM arrives
    pub ignore_sigterm: bool,
    /// Spawn a descendant that ignores SIGTERM and write its pid here
    pub child_pid_file: Option<PathBuf>,
    pub known_jobs: Vec<i64>,
}

async fn root() -> Json<Value> {
    Json(json!({ "status": "ok", "server": "fixture" }))
}

/// Router serving readiness at `/` and MCP at `/mcp`
pub fn router(port: u16, known_jobs: Vec<i64>) -> Router {
    let known_jobs: Arc<HashSet<i64>> = Arc::new(known_jobs.into_iter().collect());
    let service = StreamableHttpService::new(
        move || Ok(FixtureServer::new(port, known_jobs.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    Router::new()
        .route("/", get(root))
        .nest_service("/mcp", service)
}

/// Run the fixture until it is told to stop
pub async fn serve(options: FixtureOptions) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    watch_termination(shutdown.clone(), options.ignore_sigterm)?;

    if let Some(path) = &options.child_pid_file {
        let pid = spawn_stubborn_descendant()?;
        std::fs::write(path, pid.to_string())?;
        info!("Spawned descendant pid {} (recorded in {:?})", pid, path);
    }

    if !options.startup_delay.is_zero() {
        info!("Delaying startup by {:?}", options.startup_delay);
        tokio::time::sleep(options.startup_delay).await;
    }

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, options.port)).await?;
    info!("Fixture server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(options.port, options.known_jobs))
        .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
        .await?;
    info!("Fixture server stopped");
    Ok(())
}

#[cfg(unix)]
fn spawn_stubborn_descendant() -> std::io::Result<u32> {
    let child = std::process::Command::new("sh")
        .arg("-c")
        .arg("trap '' TERM; sleep 600")
        .stdin(std::process::Stdio::null())
        .spawn()?;
    Ok(child.id())
}

#[cfg(not(unix))]
fn spawn_stubborn_descendant() -> std::io::Result<u32> {
    Err(std::io::Error::other(
        "descendant processes are only supported on unix",
    ))
}

/// Install termination handling before anything else so early signals are not lost
#[cfg(unix)]
fn watch_termination(shutdown: CancellationToken, ignore_sigterm: bool) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        while term.recv().await.is_some() {
            if ignore_sigterm {
                warn!("SIGTERM received, ignoring");
                continue;
            }
            info!("SIGTERM received, shutting down");
            shutdown.cancel();
            break;
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn watch_termination(shutdown: CancellationToken, _ignore_sigterm: bool) -> std::io::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });
    Ok(())
}
