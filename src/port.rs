//! Ephemeral port allocation

use crate::error::HarnessError;
use std::net::{Ipv4Addr, TcpListener};

/// Find a free TCP port by binding to port 0 on loopback and reading the assigned port.
///
/// The listener is dropped before returning, so the port is only known to be free
/// at the instant of the check. Another process may grab it before the server binds;
/// that race is accepted for test tooling.
pub fn acquire_free_port() -> Result<u16, HarnessError> {
    let listener =
        TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(HarnessError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(HarnessError::PortAllocation)?
        .port();
    drop(listener);
    tracing::debug!("Allocated ephemeral port {}", port);
    Ok(port)
}
