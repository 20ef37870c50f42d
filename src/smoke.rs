//! Smoke checks run against a ready MCP server
//!
//! Lists tools, calls every parameter-free tool, checks `add_numbers` against known
//! sums, and exercises `trigger_job_run`. Check failures are collected in the report;
//! transport failures abort the run.

use crate::mcp_client::{self, McpClient, ToolSummary};
use chrono::{DateTime, Utc};
use rmcp::object;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Tools that need arguments and are exercised by dedicated checks
pub const PARAMETERIZED_TOOLS: &[&str] = &["add_numbers", "trigger_job_run"];

/// Job id that should not exist on any workspace
pub const MISSING_JOB_ID: i64 = 999_999_999;

const FLOAT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, thiserror::Error)]
pub enum SmokeError {
    #[error("Failed to connect to MCP server at {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Tool call `{tool}` failed: {message}")]
    Call { tool: String, message: String },

    #[error("Unexpected payload from `{tool}`: {message}")]
    Payload { tool: String, message: String },
}

impl SmokeError {
    /// Get error category for programmatic handling
    pub fn error_category(&self) -> &'static str {
        match self {
            SmokeError::Connect { .. } => "CONNECT",
            SmokeError::Call { .. } => "CALL",
            SmokeError::Payload { .. } => "PAYLOAD",
        }
    }
}

/// One `add_numbers` case
#[derive(Debug, Clone, Copy)]
pub struct AdditionCase {
    pub a: f64,
    pub b: f64,
    pub expected: f64,
    /// Whether the echoed operands are checked too
    pub check_operands: bool,
}

pub const ADDITION_CASES: &[AdditionCase] = &[
    AdditionCase {
        a: 5.0,
        b: 3.0,
        expected: 8.0,
        check_operands: true,
    },
    AdditionCase {
        a: 10.5,
        b: 2.3,
        expected: 12.8,
        check_operands: true,
    },
    AdditionCase {
        a: -5.0,
        b: 10.0,
        expected: 5.0,
        check_operands: false,
    },
];

/// What to do with `trigger_job_run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCheck {
    Skip,
    /// Trigger a job that must not exist; the tool must report the failure in its payload
    ExpectFailure(i64),
    /// Trigger a real job and record whatever comes back without failing
    Report(i64),
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tools: Vec<ToolSummary>,
    pub checks: Vec<CheckOutcome>,
}

impl SmokeReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            started_at: Utc::now(),
            finished_at: None,
            tools: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn record(&mut self, outcome: CheckOutcome) {
        if outcome.passed {
            info!("✓ {}: {}", outcome.name, outcome.detail);
        } else {
            warn!("✗ {}: {}", outcome.name, outcome.detail);
        }
        self.checks.push(outcome);
    }
}

/// Configuration of a smoke run
#[derive(Debug, Clone)]
pub struct SmokeSuite {
    pub job_check: JobCheck,
    pub addition_cases: Vec<AdditionCase>,
}

impl Default for SmokeSuite {
    fn default() -> Self {
        Self {
            job_check: JobCheck::ExpectFailure(MISSING_JOB_ID),
            addition_cases: ADDITION_CASES.to_vec(),
        }
    }
}

impl SmokeSuite {
    pub fn with_job_check(mut self, job_check: JobCheck) -> Self {
        self.job_check = job_check;
        self
    }

    /// Connect to `mcp_url`, run every check, and disconnect
    pub async fn run(
        &self,
        mcp_url: &str,
        bearer_token: Option<&str>,
    ) -> Result<SmokeReport, SmokeError> {
        let client = mcp_client::connect(mcp_url, bearer_token).await?;
        let result = self.run_with_client(&client, mcp_url).await;
        // Transport may already be closed
        let _ = client.cancel().await;
        result
    }

    pub async fn run_with_client(
        &self,
        client: &McpClient,
        target: &str,
    ) -> Result<SmokeReport, SmokeError> {
        let mut report = SmokeReport::new(target);

        report.tools = mcp_client::list_tools(client).await?;
        for tool in &report.tools {
            info!(
                "tool {}: {}",
                tool.name,
                tool.description.as_deref().unwrap_or("<no description>")
            );
        }
        let listed = format!("{} tools", report.tools.len());
        report.record(CheckOutcome::pass("list_tools", listed));

        for name in parameter_free_tools(&report.tools) {
            let outcome = self.check_tool_call(client, &name).await?;
            report.record(outcome);
        }

        for case in &self.addition_cases {
            let outcome = self.check_addition(client, case).await?;
            report.record(outcome);
        }

        if let Some(outcome) = self.check_job(client).await? {
            report.record(outcome);
        }

        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    /// Call a tool without arguments; it must not report an error
    pub async fn check_tool_call(
        &self,
        client: &McpClient,
        name: &str,
    ) -> Result<CheckOutcome, SmokeError> {
        let result = mcp_client::call_tool(client, name, None).await?;
        Ok(if result.is_error == Some(true) {
            CheckOutcome::fail(
                format!("call {name}"),
                format!("tool reported an error: {:?}", result.content),
            )
        } else {
            CheckOutcome::pass(format!("call {name}"), "returned a result")
        })
    }

    pub async fn check_addition(
        &self,
        client: &McpClient,
        case: &AdditionCase,
    ) -> Result<CheckOutcome, SmokeError> {
        let name = format!("add_numbers({}, {})", case.a, case.b);
        let result = mcp_client::call_tool(
            client,
            "add_numbers",
            Some(object!({ "a": case.a, "b": case.b })),
        )
        .await?;
        let payload = mcp_client::first_text_json("add_numbers", &result)?;
        Ok(evaluate_addition(&name, case, &payload))
    }

    /// Run the configured `trigger_job_run` check; `None` when it is skipped
    pub async fn check_job(&self, client: &McpClient) -> Result<Option<CheckOutcome>, SmokeError> {
        let job_id = match self.job_check {
            JobCheck::Skip => return Ok(None),
            JobCheck::ExpectFailure(id) | JobCheck::Report(id) => id,
        };
        let result = mcp_client::call_tool(
            client,
            "trigger_job_run",
            Some(object!({ "job_id": job_id })),
        )
        .await?;
        let payload = mcp_client::first_text_json("trigger_job_run", &result)?;
        let name = format!("trigger_job_run({job_id})");
        Ok(Some(match self.job_check {
            JobCheck::ExpectFailure(_) => evaluate_expected_job_failure(&name, job_id, &payload),
            _ => describe_job_run(&name, &payload),
        }))
    }
}

/// Names of listed tools that are safe to call without arguments
pub fn parameter_free_tools(tools: &[ToolSummary]) -> Vec<String> {
    tools
        .iter()
        .map(|t| t.name.clone())
        .filter(|name| !PARAMETERIZED_TOOLS.contains(&name.as_str()))
        .collect()
}

fn approx_eq(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < FLOAT_TOLERANCE
}

/// Compare an `add_numbers` payload against the expected sum and operands
pub fn evaluate_addition(name: &str, case: &AdditionCase, payload: &Value) -> CheckOutcome {
    let Some(actual) = payload.get("result").and_then(Value::as_f64) else {
        return CheckOutcome::fail(name, format!("missing numeric `result` in {payload}"));
    };
    if !approx_eq(actual, case.expected) {
        return CheckOutcome::fail(
            name,
            format!("expected {} but got {}", case.expected, actual),
        );
    }
    if case.check_operands {
        for (key, want) in [("a", case.a), ("b", case.b)] {
            match payload.get(key).and_then(Value::as_f64) {
                Some(got) if approx_eq(got, want) => {}
                other => {
                    return CheckOutcome::fail(
                        name,
                        format!("expected `{key}` = {want}, got {other:?}"),
                    );
                }
            }
        }
    }
    CheckOutcome::pass(name, format!("= {actual}"))
}

/// A missing job must come back as `success: false` with an error and the echoed id
pub fn evaluate_expected_job_failure(name: &str, job_id: i64, payload: &Value) -> CheckOutcome {
    if payload.get("success").and_then(Value::as_bool) != Some(false) {
        return CheckOutcome::fail(name, format!("expected success=false in {payload}"));
    }
    let Some(error) = payload.get("error") else {
        return CheckOutcome::fail(name, format!("missing `error` in {payload}"));
    };
    if payload.get("job_id").and_then(Value::as_i64) != Some(job_id) {
        return CheckOutcome::fail(name, format!("expected job_id {job_id} in {payload}"));
    }
    CheckOutcome::pass(name, format!("error reported as expected: {error}"))
}

/// Summarize a real job trigger; never fails the run
pub fn describe_job_run(name: &str, payload: &Value) -> CheckOutcome {
    let field = |key: &str| {
        payload
            .get(key)
            .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_owned))
    };
    if payload.get("success").and_then(Value::as_bool) == Some(true) {
        let mut detail = format!(
            "triggered, run id {}",
            field("run_id").unwrap_or_else(|| "unknown".to_string())
        );
        if let Some(url) = field("run_page_url") {
            detail.push_str(&format!(", run url {url}"));
        }
        CheckOutcome::pass(name, detail)
    } else {
        let error = field("error").unwrap_or_else(|| "unknown error".to_string());
        CheckOutcome::pass(name, format!("failed to trigger job: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn addition_matches_sum_and_operands() {
        let case = ADDITION_CASES[1];
        let payload = json!({ "a": 10.5, "b": 2.3, "result": 10.5 + 2.3 });
        assert!(evaluate_addition("add", &case, &payload).passed);
    }

    #[test]
    fn addition_reports_wrong_sum() {
        let case = ADDITION_CASES[0];
        let outcome = evaluate_addition("add", &case, &json!({ "a": 5.0, "b": 3.0, "result": 9.0 }));
        assert!(!outcome.passed);
        assert!(outcome.detail.contains("expected 8 but got 9"), "{}", outcome.detail);
    }

    #[test]
    fn addition_checks_operands_only_when_asked() {
        let payload = json!({ "result": 5.0 });
        assert!(evaluate_addition("add", &ADDITION_CASES[2], &payload).passed);
        assert!(!evaluate_addition("add", &ADDITION_CASES[0], &json!({ "result": 8.0 })).passed);
    }

    #[test]
    fn addition_accepts_integer_encoded_numbers() {
        let payload = json!({ "a": 5, "b": 3, "result": 8 });
        assert!(evaluate_addition("add", &ADDITION_CASES[0], &payload).passed);
    }

    #[test]
    fn expected_job_failure_requires_all_fields() {
        let good = json!({ "success": false, "error": "Job not found", "job_id": MISSING_JOB_ID });
        assert!(evaluate_expected_job_failure("job", MISSING_JOB_ID, &good).passed);

        let succeeded = json!({ "success": true, "run_id": 1, "job_id": MISSING_JOB_ID });
        assert!(!evaluate_expected_job_failure("job", MISSING_JOB_ID, &succeeded).passed);

        let no_error = json!({ "success": false, "job_id": MISSING_JOB_ID });
        assert!(!evaluate_expected_job_failure("job", MISSING_JOB_ID, &no_error).passed);

        let wrong_id = json!({ "success": false, "error": "x", "job_id": 1 });
        assert!(!evaluate_expected_job_failure("job", MISSING_JOB_ID, &wrong_id).passed);
    }

    #[test]
    fn job_report_never_fails() {
        let ok = describe_job_run(
            "job",
            &json!({ "success": true, "run_id": 42, "run_page_url": "https://example.com/run/42" }),
        );
        assert!(ok.passed);
        assert!(ok.detail.contains("42"));
        assert!(ok.detail.contains("https://example.com/run/42"));

        let failed = describe_job_run("job", &json!({ "success": false, "error": "denied" }));
        assert!(failed.passed);
        assert!(failed.detail.contains("denied"));
    }

    #[test]
    fn parameterized_tools_are_not_called_bare() {
        let tools: Vec<ToolSummary> = ["health", "add_numbers", "whoami", "trigger_job_run"]
            .into_iter()
            .map(|name| ToolSummary {
                name: name.into(),
                description: None,
            })
            .collect();
        assert_eq!(parameter_free_tools(&tools), vec!["health", "whoami"]);
    }

    #[test]
    fn report_tracks_failures() {
        let mut report = SmokeReport::new("http://127.0.0.1:1/mcp");
        report.record(CheckOutcome::pass("a", "ok"));
        assert!(report.all_passed());
        report.record(CheckOutcome::fail("b", "bad"));
        assert!(!report.all_passed());
        assert_eq!(report.failures().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = SmokeReport::new("http://127.0.0.1:1/mcp");
        report.tools.push(ToolSummary {
            name: "health".into(),
            description: Some("Health check".into()),
        });
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["target"], "http://127.0.0.1:1/mcp");
        assert_eq!(value["tools"][0]["name"], "health");
        assert!(value["started_at"].is_string());
    }
}
