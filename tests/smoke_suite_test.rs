//! End-to-end smoke runs against the fixture server through the rmcp client.

use anyhow::Result;
mod common;
use common::harness::fixture_config;
use mcp_harness::{
    JobCheck, SmokeSuite, mcp_client, run_session,
    smoke::{MISSING_JOB_ID, SmokeError},
};
use rmcp::object;
use std::sync::Mutex;

#[tokio::test]
async fn test_default_suite_passes_against_fixture() -> Result<()> {
    let report = run_session(fixture_config(&[]), |base_url| async move {
        let mcp_url = mcp_client::mcp_endpoint(&base_url);
        Ok(SmokeSuite::default().run(&mcp_url, None).await?)
    })
    .await?;

    let failures: Vec<_> = report.failures().collect();
    assert!(report.all_passed(), "failed checks: {failures:?}");

    let names: Vec<&str> = report.tools.iter().map(|t| t.name.as_str()).collect();
    for expected in ["health", "add_numbers", "trigger_job_run"] {
        assert!(names.contains(&expected), "{expected} missing from {names:?}");
    }
    assert!(report.tools.iter().all(|t| t.description.is_some()));

    let check_names: Vec<&str> = report.checks.iter().map(|c| c.name.as_str()).collect();
    assert!(check_names.contains(&"call health"));
    assert!(!check_names.iter().any(|n| *n == "call add_numbers"));
    assert!(check_names.contains(&"add_numbers(10.5, 2.3)"));
    let job_check = format!("trigger_job_run({MISSING_JOB_ID})");
    assert!(check_names.contains(&job_check.as_str()), "{check_names:?}");
    assert!(report.finished_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_add_numbers_payloads() -> Result<()> {
    run_session(fixture_config(&[]), |base_url| async move {
        let client = mcp_client::connect(&mcp_client::mcp_endpoint(&base_url), None).await?;

        let result =
            mcp_client::call_tool(&client, "add_numbers", Some(object!({ "a": 5, "b": 3 }))).await?;
        let data = mcp_client::first_text_json("add_numbers", &result)?;
        assert_eq!(data["result"], 8.0);
        assert_eq!(data["a"], 5.0);
        assert_eq!(data["b"], 3.0);

        let result =
            mcp_client::call_tool(&client, "add_numbers", Some(object!({ "a": -5, "b": 10 })))
                .await?;
        let data = mcp_client::first_text_json("add_numbers", &result)?;
        assert_eq!(data["result"], 5.0);

        let _ = client.cancel().await;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_trigger_job_run_reports_missing_job() -> Result<()> {
    run_session(fixture_config(&[]), |base_url| async move {
        let client = mcp_client::connect(&mcp_client::mcp_endpoint(&base_url), None).await?;
        let result = mcp_client::call_tool(
            &client,
            "trigger_job_run",
            Some(object!({ "job_id": MISSING_JOB_ID })),
        )
        .await?;
        let data = mcp_client::first_text_json("trigger_job_run", &result)?;
        assert_eq!(data["success"], false);
        assert!(data.get("error").is_some());
        assert_eq!(data["job_id"], MISSING_JOB_ID);
        let _ = client.cancel().await;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_report_mode_records_known_job_run() -> Result<()> {
    let report = run_session(fixture_config(&["--known-job", "42"]), |base_url| async move {
        let suite = SmokeSuite::default().with_job_check(JobCheck::Report(42));
        Ok(suite
            .run(&mcp_client::mcp_endpoint(&base_url), Some("test-token"))
            .await?)
    })
    .await?;

    let job = report
        .checks
        .iter()
        .find(|c| c.name == "trigger_job_run(42)")
        .expect("job check recorded");
    assert!(job.passed);
    assert!(job.detail.contains("run id 1"), "{}", job.detail);
    assert!(job.detail.contains("/jobs/42/runs/1"), "{}", job.detail);
    Ok(())
}

#[tokio::test]
async fn test_connect_to_closed_port_is_connect_error() -> Result<()> {
    let port = mcp_harness::acquire_free_port()?;
    let url = format!("http://127.0.0.1:{port}/mcp");
    let err = SmokeSuite::default().run(&url, None).await.unwrap_err();
    assert!(matches!(err, SmokeError::Connect { .. }), "{err:?}");
    assert_eq!(err.error_category(), "CONNECT");
    Ok(())
}

#[tokio::test]
async fn test_failed_session_still_shuts_server_down() -> Result<()> {
    let seen = Mutex::new(None);
    let result: Result<()> = run_session(fixture_config(&[]), |base_url| {
        *seen.lock().unwrap() = Some(base_url);
        async { Err::<(), _>(anyhow::anyhow!("assertion failed inside session")) }
    })
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("assertion failed inside session"));

    let base_url = seen.lock().unwrap().take().expect("session saw a url");
    assert!(
        reqwest::get(&base_url).await.is_err(),
        "server at {base_url} still running after failed session"
    );
    Ok(())
}
