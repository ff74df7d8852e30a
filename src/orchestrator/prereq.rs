//! Gates that must pass before any load is sent.

use crate::error::HarnessError;
use crate::monitor::health::{poll_services, HealthStatus, ServiceTarget};
use crate::probes::Probe;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

/// Run `<tool> --version` and return the first line it prints.
pub async fn check_tool(tool: &str, limit: Duration) -> Result<String, HarnessError> {
    let missing = |reason: String| HarnessError::PrerequisiteMissing {
        tool: tool.to_string(),
        reason,
    };

    let output = timeout(
        limit,
        Command::new(tool).arg("--version").kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| missing(format!("no answer within {:?}", limit)))?
    .map_err(|e| missing(e.to_string()))?;

    if !output.status.success() {
        return Err(missing(format!("exited with {}", output.status)));
    }

    // Some tools print their version on stderr.
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    Ok(text.lines().next().unwrap_or_default().trim().to_string())
}

/// Check every tool; all are tried before reporting so the log lists every gap.
pub async fn check_prerequisites(tools: &[String], limit: Duration) -> Result<(), HarnessError> {
    info!(tools = tools.len(), "Checking prerequisites");
    let mut missing = Vec::new();
    for tool in tools {
        match check_tool(tool, limit).await {
            Ok(version) => info!(%tool, %version, "Prerequisite available"),
            Err(e) => {
                error!("{}", e);
                missing.push(e);
            }
        }
    }

    match missing.len() {
        0 => Ok(()),
        1 => Err(missing.remove(0)),
        _ => {
            let names: Vec<String> = missing
                .iter()
                .filter_map(|e| match e {
                    HarnessError::PrerequisiteMissing { tool, .. } => Some(tool.clone()),
                    _ => None,
                })
                .collect();
            Err(HarnessError::PrerequisiteMissing {
                tool: names.join(", "),
                reason: "not available".to_string(),
            })
        }
    }
}

/// Poll `targets` until every one reports the expected status, or give up at `limit`.
pub async fn wait_for_services(
    probe: &dyn Probe,
    targets: &[ServiceTarget],
    expected_status: u16,
    probe_timeout: Duration,
    limit: Duration,
    poll: Duration,
) -> Result<(), HarnessError> {
    if targets.is_empty() {
        return Ok(());
    }
    info!(services = targets.len(), timeout_ms = limit.as_millis() as u64, "Waiting for services");

    let deadline = Instant::now() + limit;
    loop {
        let snapshots = poll_services(probe, targets, expected_status, probe_timeout).await;
        let pending: Vec<_> = snapshots
            .iter()
            .filter(|s| s.status != HealthStatus::Healthy)
            .collect();

        if pending.is_empty() {
            info!("All required services ready");
            return Ok(());
        }
        if Instant::now() >= deadline {
            let service = pending
                .iter()
                .map(|s| s.service.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let detail = pending
                .iter()
                .map(|s| match (&s.error, s.status_code) {
                    (Some(e), _) => format!("{}: {}", s.service, e),
                    (None, Some(code)) => format!("{}: HTTP {}", s.service, code),
                    (None, None) => format!("{}: {}", s.service, s.status),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(HarnessError::ServiceUnavailable { service, detail });
        }

        for s in &pending {
            warn!(service = %s.service, status = %s.status, "Service not ready yet");
        }
        sleep(poll).await;
    }
}
