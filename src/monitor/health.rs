//! Service health polling and availability history.

use super::{spawn_monitor, MonitorHandle};
use crate::probes::{Probe, ProbeRequest, ProbeResult};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A dependent service and the URL that reports its health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub name: String,
    pub url: String,
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Error,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Error => write!(f, "error"),
        }
    }
}

/// One service's state as seen by one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub service: String,
    pub status: HealthStatus,
    pub latency_ms: f64,
    /// Absent when the request never got a response.
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn from_probe(service: &str, result: &ProbeResult, expected_status: u16) -> Self {
        let status = classify(result, expected_status);
        let (status_code, error) = match result.error() {
            Some(e) => (None, Some(e.to_string())),
            None => (Some(result.status_code()), None),
        };
        Self {
            service: service.to_string(),
            status,
            latency_ms: crate::probes::duration_ms(result.latency()),
            status_code,
            error,
            checked_at: result.started_at(),
        }
    }
}

/// Exactly the expected code is healthy; any other code is unhealthy; no
/// response at all is an error.
pub fn classify(result: &ProbeResult, expected_status: u16) -> HealthStatus {
    if result.error().is_some() || result.status_code() == 0 {
        HealthStatus::Error
    } else if result.status_code() == expected_status {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    }
}

/// Probe every service once, in parallel.
pub async fn poll_services(
    probe: &dyn Probe,
    targets: &[ServiceTarget],
    expected_status: u16,
    timeout: Duration,
) -> Vec<HealthSnapshot> {
    let checks = targets.iter().map(|t| async move {
        let request = ProbeRequest::get(&t.url, "", timeout);
        let response = probe.probe(&request).await;
        HealthSnapshot::from_probe(&t.name, &response.result, expected_status)
    });
    join_all(checks).await
}

/// The most recent poll cycles, oldest first.
#[derive(Debug, Clone)]
pub struct HealthHistory {
    capacity: usize,
    cycles: VecDeque<Vec<HealthSnapshot>>,
}

impl HealthHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            cycles: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, cycle: Vec<HealthSnapshot>) {
        if self.cycles.len() == self.capacity {
            self.cycles.pop_front();
        }
        self.cycles.push_back(cycle);
    }

    pub fn cycles(&self) -> usize {
        self.cycles.len()
    }

    pub fn latest(&self) -> &[HealthSnapshot] {
        self.cycles.back().map(Vec::as_slice).unwrap_or(&[])
    }

    fn recent(&self, window: usize) -> impl Iterator<Item = &HealthSnapshot> {
        let skip = self.cycles.len().saturating_sub(window);
        self.cycles.iter().skip(skip).flatten()
    }

    /// Percent of snapshots per service classified healthy over the last `window` cycles.
    pub fn availability(&self, window: usize) -> BTreeMap<String, f64> {
        let mut tally: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        for snap in self.recent(window) {
            let entry = tally.entry(snap.service.clone()).or_default();
            entry.1 += 1;
            if snap.status == HealthStatus::Healthy {
                entry.0 += 1;
            }
        }
        tally
            .into_iter()
            .map(|(svc, (healthy, total))| (svc, crate::analysis::stats::success_rate(healthy, total)))
            .collect()
    }

    /// Percent of all snapshots (every service) classified healthy; `None` before the first cycle.
    pub fn overall_availability(&self, window: usize) -> Option<f64> {
        let (healthy, total) = self.recent(window).fold((0u64, 0u64), |(h, t), s| {
            (h + u64::from(s.status == HealthStatus::Healthy), t + 1)
        });
        if total == 0 {
            return None;
        }
        Some(crate::analysis::stats::success_rate(healthy, total))
    }
}

/// Knobs for the background health loop.
#[derive(Debug, Clone)]
pub struct HealthPollSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub expected_status: u16,
    pub history_capacity: usize,
}

pub type HealthMonitor = MonitorHandle<Vec<HealthSnapshot>, HealthHistory>;

/// Start polling `targets` every `settings.interval` until stopped.
///
/// The first cycle runs immediately. Stop is checked between cycles only, so
/// an in-flight cycle always completes and lands in the returned history.
pub fn spawn_health_monitor(
    probe: Arc<dyn Probe>,
    targets: Vec<ServiceTarget>,
    settings: HealthPollSettings,
) -> HealthMonitor {
    spawn_monitor(Vec::new(), move |mut ctx| async move {
        info!(services = targets.len(), interval_ms = settings.interval.as_millis() as u64, "Health monitor started");
        let mut history = HealthHistory::new(settings.history_capacity);
        loop {
            let cycle = poll_services(probe.as_ref(), &targets, settings.expected_status, settings.timeout).await;
            log_cycle(&cycle);
            history.record(cycle.clone());
            ctx.publish(cycle);

            if ctx.wait_or_stop(settings.interval).await {
                break;
            }
        }
        info!(cycles = history.cycles(), "Health monitor stopped");
        history
    })
}

fn log_cycle(cycle: &[HealthSnapshot]) {
    for snap in cycle {
        match snap.status {
            HealthStatus::Healthy => {
                info!(service = %snap.service, status = %snap.status, latency_ms = snap.latency_ms, "Health check")
            }
            _ => warn!(
                service = %snap.service,
                status = %snap.status,
                status_code = ?snap.status_code,
                error = ?snap.error,
                "Health check"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::{Method, ProbeError, ProbeErrorKind};

    fn snap(service: &str, status: HealthStatus) -> HealthSnapshot {
        HealthSnapshot {
            service: service.to_string(),
            status,
            latency_ms: 1.0,
            status_code: Some(200),
            error: None,
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn test_classify() {
        let now = Utc::now();
        let ok = ProbeResult::completed("", Method::Get, 200, Duration::from_millis(3), now);
        let created = ProbeResult::completed("", Method::Get, 201, Duration::from_millis(3), now);
        let down = ProbeResult::failed(
            "",
            Method::Get,
            ProbeError::new(ProbeErrorKind::Timeout, "timed out"),
            Duration::from_secs(5),
            now,
        );
        assert_eq!(classify(&ok, 200), HealthStatus::Healthy);
        // Success range is not enough: health wants the exact code.
        assert_eq!(classify(&created, 200), HealthStatus::Unhealthy);
        assert_eq!(classify(&down, 200), HealthStatus::Error);

        let s = HealthSnapshot::from_probe("backend", &down, 200);
        assert!(s.status_code.is_none());
        assert!(s.error.is_some());
    }

    #[test]
    fn test_history_window_and_eviction() {
        let mut history = HealthHistory::new(3);
        history.record(vec![snap("a", HealthStatus::Error)]);
        for _ in 0..3 {
            history.record(vec![snap("a", HealthStatus::Healthy)]);
        }
        // Oldest (error) cycle was evicted.
        assert_eq!(history.cycles(), 3);
        assert_eq!(history.availability(10)["a"], 100.0);

        history.record(vec![snap("a", HealthStatus::Unhealthy)]);
        assert_eq!(history.availability(1)["a"], 0.0);
        assert_eq!(history.latest()[0].status, HealthStatus::Unhealthy);
    }

    /// Every service answers 200 after `delay` on the tokio clock.
    struct Sluggish {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Probe for Sluggish {
        async fn probe(&self, request: &ProbeRequest) -> crate::probes::ProbeResponse {
            tokio::time::sleep(self.delay).await;
            crate::probes::ProbeResponse {
                result: ProbeResult::completed(&request.endpoint, Method::Get, 200, self.delay, Utc::now()),
                body: None,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_are_polled_concurrently() {
        let probe = Sluggish {
            delay: Duration::from_millis(200),
        };
        let targets = vec![
            ServiceTarget::new("backend", "http://b/health"),
            ServiceTarget::new("middleware", "http://m/health"),
            ServiceTarget::new("vercel", "http://v/health"),
        ];

        let start = tokio::time::Instant::now();
        let cycle = poll_services(&probe, &targets, 200, Duration::from_secs(1)).await;
        let elapsed = start.elapsed();

        assert_eq!(cycle.len(), 3);
        assert!(cycle.iter().all(|s| s.status == HealthStatus::Healthy));
        // One after another would take 600ms.
        assert!(elapsed >= Duration::from_millis(200), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(300), "{:?}", elapsed);
    }

    #[test]
    fn test_empty_history() {
        let history = HealthHistory::new(10);
        assert!(history.availability(10).is_empty());
        assert!(history.overall_availability(10).is_none());
        assert!(history.latest().is_empty());
    }
}
