//! Readiness polling for a freshly spawned server
//!
//! A plain sleep-and-retry loop: `GET` the probe URL every `poll_interval` until a
//! 2xx/3xx status comes back or the overall deadline passes. Redirects are not
//! followed, a 3xx answer already proves the server is serving.

use crate::config::ReadinessConfig;
use crate::error::HarnessError;
use reqwest::{Client, Response, redirect};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Build the HTTP client used for readiness probes
pub fn probe_client(config: &ReadinessConfig) -> Result<Client, HarnessError> {
    Ok(Client::builder()
        .timeout(config.request_timeout)
        .redirect(redirect::Policy::none())
        .build()?)
}

/// True for the 200–399 range
pub fn is_ready_status(status: reqwest::StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// Poll `url` until it answers with a success-range status or `config.timeout` elapses.
///
/// On timeout the error carries the last connection error seen, if any attempt
/// failed at the transport level.
pub async fn wait_until_ready(
    client: &Client,
    url: &str,
    config: &ReadinessConfig,
) -> Result<Response, HarnessError> {
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut last_error: Option<String> = None;
    let mut attempts = 0u32;

    while Instant::now() < deadline {
        attempts = attempts.saturating_add(1);
        match client.get(url).send().await {
            Ok(response) if is_ready_status(response.status()) => {
                info!(
                    "Server at {} ready after {} attempts ({:?})",
                    url,
                    attempts,
                    started.elapsed()
                );
                return Ok(response);
            }
            Ok(response) => {
                debug!(
                    "Readiness probe {} got status {} (attempt {})",
                    url,
                    response.status(),
                    attempts
                );
            }
            Err(e) => {
                debug!("Readiness probe {} failed (attempt {}): {}", url, attempts, e);
                last_error = Some(e.to_string());
            }
        }
        sleep(config.poll_interval).await;
    }

    Err(HarnessError::ReadinessTimeout {
        url: url.to_string(),
        timeout: config.timeout,
        last_error,
    })
}
