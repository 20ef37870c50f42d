#![allow(dead_code)]

use mcp_harness::{HarnessConfig, ServerCommand};
use std::time::{Duration, Instant};

/// Command running the fixture server with extra flags; the harness appends `--port N`
pub fn fixture_command(extra: &[&str]) -> ServerCommand {
    extra
        .iter()
        .fold(ServerCommand::new(env!("CARGO_BIN_EXE_fixture_server")), |cmd, arg| {
            cmd.arg(*arg)
        })
}

pub fn fixture_config(extra: &[&str]) -> HarnessConfig {
    HarnessConfig::for_command(fixture_command(extra))
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// `(state, pgrp)` from /proc/<pid>/stat
#[cfg(target_os = "linux")]
fn proc_stat(pid: u32) -> Option<(char, u32)> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // comm may contain spaces, fields resume after the last ')'
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let _ppid = fields.next()?;
    let pgrp = fields.next()?.parse().ok()?;
    Some((state, pgrp))
}

/// Alive means present and not a zombie waiting to be reaped by someone else
#[cfg(target_os = "linux")]
pub fn is_alive(pid: u32) -> bool {
    matches!(proc_stat(pid), Some((state, _)) if state != 'Z')
}

/// Process group of `pid`, if it is still present
#[cfg(target_os = "linux")]
pub fn process_group_of(pid: u32) -> Option<u32> {
    proc_stat(pid).map(|(_, pgrp)| pgrp)
}

/// Live processes whose process group is `pgid`
#[cfg(target_os = "linux")]
pub fn live_group_members(pgid: u32) -> Vec<u32> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse::<u32>().ok())
        .filter(|pid| matches!(proc_stat(*pid), Some((state, pgrp)) if pgrp == pgid && state != 'Z'))
        .collect()
}
