//! Omniprobe -- load testing and health monitoring for HTTP service stacks.
//!
//! This crate provides the request prober, concurrent/sustained/workflow load
//! drivers, background health and resource monitors, and the aggregator that
//! turns a run into a single JSON report.

pub mod analysis;
pub mod config;
pub mod error;
pub mod load;
pub mod monitor;
pub mod orchestrator;
pub mod probes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::analysis::{EndpointReport, EndpointStats, HealthReport, RunReport};
use crate::config::HarnessConfig;
use crate::load::{run_batch, BatchSpec};
use crate::monitor::health::{spawn_health_monitor, HealthPollSettings};
use crate::monitor::resources::{spawn_resource_monitor, ResourceAverages, SystemSource};
use crate::orchestrator::Orchestrator;
use crate::probes::{duration_ms, HttpProber, Probe, ProbeRequest};

/// Run the full orchestrated test: gate, phases, report.
pub async fn run(config: HarnessConfig) -> Result<RunReport> {
    let probe: Arc<dyn Probe> = Arc::new(HttpProber::new()?);
    let mut orchestrator = Orchestrator::new(config, probe);
    tracing::info!(run_id = %orchestrator.run_id(), "Starting orchestrated run");
    Ok(orchestrator.run().await?)
}

/// Availability and resource usage observed by [`watch`].
#[derive(Debug, Clone, Serialize)]
pub struct WatchReport {
    pub duration_secs: f64,
    pub health: HealthReport,
    pub resources: Option<ResourceAverages>,
}

/// Run only the health and resource monitors for `duration`, or until Ctrl-C.
pub async fn watch(config: &HarnessConfig, duration: Duration) -> Result<WatchReport> {
    config.validate()?;
    let probe: Arc<dyn Probe> = Arc::new(HttpProber::new()?);
    let health = spawn_health_monitor(
        probe,
        config.service_targets(),
        HealthPollSettings {
            interval: config.health_poll_interval(),
            timeout: config.monitor.health_timeout(),
            expected_status: config.probe.expected_status,
            history_capacity: config.monitor.history_capacity,
        },
    );
    let resources = spawn_resource_monitor(
        SystemSource::new(),
        config.monitor.resource_interval(),
        config.monitor.sample_capacity,
    );

    let started = tokio::time::Instant::now();
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, stopping monitors"),
    }

    let history = health.join().await?;
    let ring = resources.join().await?;
    let window = config.monitor.report_window;
    Ok(WatchReport {
        duration_secs: started.elapsed().as_secs_f64(),
        health: HealthReport::from_history(&history, window),
        resources: ResourceAverages::over_recent(&ring.snapshot(), window),
    })
}

/// One row of the quick check table.
#[derive(Debug, Clone, Serialize)]
pub struct QuickCheck {
    pub name: String,
    pub url: String,
    pub status_code: u16,
    pub latency_ms: f64,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickReport {
    pub checks: Vec<QuickCheck>,
    pub batch: EndpointReport,
}

impl QuickReport {
    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|c| c.success).count()
    }
}

/// Sequential smoke probes of every configured URL, then a 10-request
/// concurrent sample against the backend's first endpoint.
pub async fn quick(config: &HarnessConfig, probe: &dyn Probe) -> QuickReport {
    let timeout = config.probe.timeout();
    let mut targets: Vec<(String, ProbeRequest)> = config
        .services
        .iter()
        .map(|(name, svc)| (format!("{} health", name), ProbeRequest::get(&svc.url, "", timeout)))
        .collect();
    targets.extend(config.load.backend_endpoints.iter().map(|e| {
        (format!("backend {}", e), ProbeRequest::get(&config.backend_url, e, timeout))
    }));
    targets.extend(config.load.endpoints.iter().map(|e| {
        (e.clone(), ProbeRequest::get(&config.base_url, e, timeout))
    }));

    let mut checks = Vec::with_capacity(targets.len());
    for (name, request) in targets {
        let r = probe.probe(&request).await.result;
        checks.push(QuickCheck {
            name,
            url: request.url(),
            status_code: r.status_code(),
            latency_ms: duration_ms(r.latency()),
            success: r.success(),
            error: r.failure_reason(),
        });
    }

    let endpoint = config
        .load
        .backend_endpoints
        .first()
        .map(String::as_str)
        .unwrap_or("/health");
    let results = run_batch(probe, &config.backend_url, endpoint, BatchSpec::new(10, 1), timeout).await;
    let batch = EndpointReport::from(&EndpointStats::from_results(endpoint, &results));

    QuickReport { checks, batch }
}
