//! Spawning a server that does not exist must fail fast without leaving a handle behind.

use anyhow::Result;
use mcp_harness::{
    HarnessConfig, HarnessError, HarnessState, ServerCommand, ServerHarness, run_session,
};
use std::sync::atomic::{AtomicBool, Ordering};

fn missing_server(dir: &tempfile::TempDir) -> ServerCommand {
    ServerCommand::new(dir.path().join("no-such-mcp-server").to_string_lossy())
}

#[tokio::test]
async fn test_nonexistent_executable_is_spawn_failure() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut harness = ServerHarness::new(HarnessConfig::for_command(missing_server(&dir)));

    let err = harness.start().await.unwrap_err();
    match &err {
        HarnessError::SpawnFailure { program, source } => {
            assert!(program.ends_with("no-such-mcp-server"), "{program}");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected SpawnFailure, got {other:?}"),
    }
    assert_eq!(err.error_category(), "SPAWN");
    assert_eq!(harness.state(), HarnessState::Terminated);
    assert!(harness.pid().is_none());
    assert!(harness.mcp_url().is_none());
    assert_eq!(harness.shutdown().await, None);
    Ok(())
}

#[tokio::test]
async fn test_session_is_never_entered_when_spawn_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let entered = AtomicBool::new(false);

    let result = run_session(HarnessConfig::for_command(missing_server(&dir)), |_url| {
        entered.store(true, Ordering::SeqCst);
        async { Ok(()) }
    })
    .await;

    let err = result.unwrap_err();
    assert!(
        matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::SpawnFailure { .. })
        ),
        "unexpected error: {err:#}"
    );
    assert!(!entered.load(Ordering::SeqCst));
    Ok(())
}
