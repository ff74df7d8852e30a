use crate::analysis::stats::EndpointStats;
use crate::probes::{duration_ms, Probe, ProbeRequest, ProbeResult};
use futures::future::join_all;
use std::time::Duration;
use tracing::{info, warn};

/// Shape of one concurrent batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSpec {
    pub concurrent_users: usize,
    pub requests_per_user: usize,
}

impl BatchSpec {
    pub fn new(concurrent_users: usize, requests_per_user: usize) -> Self {
        Self {
            concurrent_users,
            requests_per_user,
        }
    }

    pub fn total_requests(&self) -> usize {
        self.concurrent_users * self.requests_per_user
    }
}

/// Fire `users x requests` GETs at one endpoint, all at once, and wait for every one.
///
/// There is no throttle beyond the HTTP client's own connection pool. Results
/// come back in launch order but carry no ordering meaning.
pub async fn run_batch(
    probe: &dyn Probe,
    base_url: &str,
    endpoint: &str,
    spec: BatchSpec,
    timeout: Duration,
) -> Vec<ProbeResult> {
    info!(
        %endpoint,
        users = spec.concurrent_users,
        requests_per_user = spec.requests_per_user,
        "Load testing endpoint"
    );

    let request = ProbeRequest::get(base_url, endpoint, timeout);
    let probes = (0..spec.total_requests()).map(|_| probe.probe(&request));
    let results: Vec<ProbeResult> = join_all(probes).await.into_iter().map(|r| r.result).collect();

    log_summary(&EndpointStats::from_results(endpoint, &results));
    results
}

/// Quick-feedback line for a finished batch.
pub(crate) fn log_summary(stats: &EndpointStats) {
    let ms = |d: Option<Duration>| d.map(duration_ms).unwrap_or(0.0);
    if stats.successes() > 0 {
        info!(
            endpoint = %stats.endpoint(),
            ok = stats.successes(),
            total = stats.total(),
            avg_ms = %format!("{:.1}", ms(stats.avg_latency())),
            min_ms = %format!("{:.1}", ms(stats.min_latency())),
            max_ms = %format!("{:.1}", ms(stats.max_latency())),
            "Batch succeeded"
        );
    }
    if stats.failures() > 0 {
        warn!(
            endpoint = %stats.endpoint(),
            failed = stats.failures(),
            total = stats.total(),
            "Batch had failures"
        );
        for err in stats.sample_errors() {
            warn!(endpoint = %stats.endpoint(), "  error: {}", err);
        }
    }
}
