use crate::probes::ProbeResult;
use std::collections::BTreeMap;
use std::time::Duration;

/// How many failure messages an endpoint keeps for the report.
pub const MAX_SAMPLE_ERRORS: usize = 3;

/// Running counts for one endpoint.
///
/// Latencies are kept for successful probes only: a failed request that timed
/// out after 5s (or was refused after 1ms) says nothing about response time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointStats {
    endpoint: String,
    successes: u64,
    failures: u64,
    latencies: Vec<Duration>,
    sample_errors: Vec<String>,
}

impl EndpointStats {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Build stats from every result, regardless of which endpoint it hit.
    pub fn from_results<'a>(
        endpoint: impl Into<String>,
        results: impl IntoIterator<Item = &'a ProbeResult>,
    ) -> Self {
        let mut stats = Self::new(endpoint);
        for r in results {
            stats.record(r);
        }
        stats
    }

    pub fn record(&mut self, result: &ProbeResult) {
        if result.success() {
            self.successes += 1;
            self.latencies.push(result.latency());
        } else {
            self.failures += 1;
            if self.sample_errors.len() < MAX_SAMPLE_ERRORS {
                if let Some(reason) = result.failure_reason() {
                    self.sample_errors.push(reason);
                }
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Successful latencies in the order they were recorded.
    pub fn latencies(&self) -> &[Duration] {
        &self.latencies
    }

    pub fn sample_errors(&self) -> &[String] {
        &self.sample_errors
    }

    /// Percentage in [0, 100]; 0 when nothing was recorded.
    pub fn success_rate(&self) -> f64 {
        success_rate(self.successes, self.total())
    }

    pub fn avg_latency(&self) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let sum: Duration = self.latencies.iter().sum();
        Some(sum / self.latencies.len() as u32)
    }

    pub fn min_latency(&self) -> Option<Duration> {
        self.latencies.iter().min().copied()
    }

    pub fn max_latency(&self) -> Option<Duration> {
        self.latencies.iter().max().copied()
    }

    /// Nearest-rank percentile over successful latencies, `p` in (0, 100].
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let idx = rank.clamp(1, sorted.len()) - 1;
        Some(sorted[idx])
    }
}

/// `successes / total` as a percentage, with an empty set defined as 0%.
pub fn success_rate(successes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    successes as f64 / total as f64 * 100.0
}

/// Group results by endpoint. BTreeMap keeps report ordering stable.
pub fn group_by_endpoint(results: &[ProbeResult]) -> BTreeMap<String, EndpointStats> {
    let mut map: BTreeMap<String, EndpointStats> = BTreeMap::new();
    for r in results {
        map.entry(r.endpoint().to_string())
            .or_insert_with(|| EndpointStats::new(r.endpoint()))
            .record(r);
    }
    map
}
