use crate::analysis::stats::{group_by_endpoint, EndpointStats};
use crate::error::HarnessError;
use crate::load::{AssetCheck, StepOutcome, WorkflowOutcome, WorkflowStatus};
use crate::monitor::health::{HealthHistory, HealthSnapshot};
use crate::monitor::resources::{ResourceAverages, ResourceSample};
use crate::orchestrator::RunState;
use crate::probes::{duration_ms, ProbeResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Failed,
    /// Not run: the run failed before phases began, or the phase has nothing configured to target.
    Skipped,
}

/// What one phase of the run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRecord {
    pub name: String,
    pub status: PhaseStatus,
    pub requests: usize,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseRecord {
    pub fn completed(name: &str, requests: usize, elapsed: Duration) -> Self {
        Self {
            name: name.to_string(),
            status: PhaseStatus::Completed,
            requests,
            duration_ms: duration_ms(elapsed),
            error: None,
        }
    }

    pub fn failed(name: &str, requests: usize, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: PhaseStatus::Failed,
            requests,
            duration_ms: duration_ms(elapsed),
            error: Some(error.into()),
        }
    }

    pub fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: PhaseStatus::Skipped,
            requests: 0,
            duration_ms: 0.0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInfo {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub phases: Vec<PhaseRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Percent, 0 when nothing was sent.
    pub success_rate: f64,
    /// Over successful requests only; absent when there were none.
    pub avg_latency_ms: Option<f64>,
    pub p95_latency_ms: Option<f64>,
    pub test_duration_secs: f64,
    pub requests_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointReport {
    pub endpoint: String,
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub avg_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub p95_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_errors: Vec<String>,
}

impl From<&EndpointStats> for EndpointReport {
    fn from(stats: &EndpointStats) -> Self {
        Self {
            endpoint: stats.endpoint().to_string(),
            total: stats.total(),
            successes: stats.successes(),
            failures: stats.failures(),
            success_rate: stats.success_rate(),
            avg_latency_ms: stats.avg_latency().map(duration_ms),
            min_latency_ms: stats.min_latency().map(duration_ms),
            max_latency_ms: stats.max_latency().map(duration_ms),
            p95_latency_ms: stats.percentile(95.0).map(duration_ms),
            sample_errors: stats.sample_errors().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowReport {
    pub name: String,
    pub user: usize,
    pub status: WorkflowStatus,
    pub executed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub steps: Vec<StepOutcome>,
}

impl From<&WorkflowOutcome> for WorkflowReport {
    fn from(outcome: &WorkflowOutcome) -> Self {
        Self {
            name: outcome.name.clone(),
            user: outcome.user,
            status: outcome.status,
            executed: outcome.results().count(),
            succeeded: outcome.results().filter(|r| r.success()).count(),
            skipped: outcome.skipped(),
            steps: outcome.steps.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Cycles the availability figures are computed over.
    pub window_cycles: usize,
    pub overall_availability: Option<f64>,
    pub services: BTreeMap<String, f64>,
    pub latest: Vec<HealthSnapshot>,
}

impl HealthReport {
    pub fn from_history(history: &HealthHistory, window: usize) -> Self {
        Self {
            window_cycles: history.cycles().min(window),
            overall_availability: history.overall_availability(window),
            services: history.availability(window),
            latest: history.latest().to_vec(),
        }
    }
}

/// The run's output artifact. Built once and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run: RunInfo,
    pub summary: Summary,
    pub endpoints: Vec<EndpointReport>,
    pub workflows: Vec<WorkflowReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetCheck>,
    pub health: Option<HealthReport>,
    pub resources: Option<ResourceAverages>,
}

/// Everything the aggregator reduces. `results` is the complete set of
/// probe results for the run, including the ones issued by workflows.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    pub failure: Option<String>,
    pub phases: Vec<PhaseRecord>,
    pub results: Vec<ProbeResult>,
    pub workflows: Vec<WorkflowOutcome>,
    pub assets: Vec<AssetCheck>,
    pub health: Option<HealthHistory>,
    pub resources: Vec<ResourceSample>,
    /// Most recent cycles/samples used for availability and resource averages.
    pub window: usize,
}

pub struct ReportAggregator;

impl ReportAggregator {
    /// Pure reduction; an empty input yields a valid report full of zeros and `None`s.
    pub fn build(input: ReportInput) -> RunReport {
        let per_endpoint = group_by_endpoint(&input.results);
        let overall = EndpointStats::from_results("*", &input.results);

        let elapsed = (input.finished_at - input.started_at)
            .to_std()
            .unwrap_or_default()
            .as_secs_f64();
        let requests_per_second = if elapsed > 0.0 {
            overall.total() as f64 / elapsed
        } else {
            0.0
        };

        let summary = Summary {
            total_requests: overall.total(),
            successful_requests: overall.successes(),
            failed_requests: overall.failures(),
            success_rate: overall.success_rate(),
            avg_latency_ms: overall.avg_latency().map(duration_ms),
            p95_latency_ms: overall.percentile(95.0).map(duration_ms),
            test_duration_secs: elapsed,
            requests_per_second,
        };

        RunReport {
            run: RunInfo {
                run_id: input.run_id,
                started_at: input.started_at,
                finished_at: input.finished_at,
                state: input.state,
                failure: input.failure,
                phases: input.phases,
            },
            summary,
            endpoints: per_endpoint.values().map(EndpointReport::from).collect(),
            workflows: input.workflows.iter().map(WorkflowReport::from).collect(),
            assets: input.assets,
            health: input
                .health
                .as_ref()
                .map(|h| HealthReport::from_history(h, input.window)),
            resources: ResourceAverages::over_recent(&input.resources, input.window),
        }
    }
}

impl RunReport {
    /// Write the report as pretty JSON.
    pub fn persist(&self, path: &Path) -> Result<(), HarnessError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| HarnessError::ReportWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Report written");
        Ok(())
    }

    /// Human-readable block for the end-of-run log.
    pub fn format_summary(&self) -> String {
        let ms = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}ms", v));
        let s = &self.summary;
        let mut out = String::new();

        let _ = writeln!(out, "Run {} finished: {}", self.run.run_id, self.run.state);
        if let Some(failure) = &self.run.failure {
            let _ = writeln!(out, "  Failure: {}", failure);
        }
        let _ = writeln!(out, "  Total requests: {}", s.total_requests);
        let _ = writeln!(out, "  Success rate:   {:.2}%", s.success_rate);
        let _ = writeln!(out, "  Avg latency:    {}", ms(s.avg_latency_ms));
        let _ = writeln!(out, "  P95 latency:    {}", ms(s.p95_latency_ms));
        let _ = writeln!(out, "  Duration:       {:.2}s ({:.1} req/s)", s.test_duration_secs, s.requests_per_second);

        for e in &self.endpoints {
            let _ = writeln!(
                out,
                "  {:<32} {:>5}/{:<5} {:>6.1}%  avg {}",
                e.endpoint,
                e.successes,
                e.total,
                e.success_rate,
                ms(e.avg_latency_ms)
            );
        }
        for w in &self.workflows {
            let _ = writeln!(
                out,
                "  workflow {:<32} #{:<3} {} ({} skipped)",
                w.name, w.user, w.status, w.skipped
            );
        }
        for a in &self.assets {
            let bytes = a.bytes.map_or_else(|| "-".to_string(), |b| format!("{} bytes", b));
            let _ = writeln!(
                out,
                "  asset {:<35} {:>3}  {}",
                a.result.endpoint(),
                a.result.status_code(),
                bytes
            );
        }
        if let Some(health) = &self.health {
            let overall = health
                .overall_availability
                .map_or_else(|| "n/a".to_string(), |a| format!("{:.1}%", a));
            let _ = writeln!(out, "  Service availability: {}", overall);
            for (service, availability) in &health.services {
                let _ = writeln!(out, "    {:<16} {:.1}%", service, availability);
            }
        }
        if let Some(r) = &self.resources {
            let _ = writeln!(
                out,
                "  Resources: cpu avg {:.1}% (peak {:.1}%), memory avg {:.1}%, disk {:.1}%",
                r.avg_cpu_percent, r.peak_cpu_percent, r.avg_memory_percent, r.avg_disk_percent
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{Workflow, WorkflowStep};
    use crate::monitor::health::HealthStatus;
    use crate::probes::{Method, ProbeError, ProbeErrorKind};

    fn input(results: Vec<ProbeResult>) -> ReportInput {
        let started_at = Utc::now();
        ReportInput {
            run_id: "run-1".into(),
            started_at,
            finished_at: started_at + chrono::Duration::seconds(2),
            state: RunState::Reported,
            failure: None,
            phases: vec![],
            results,
            workflows: vec![],
            assets: vec![],
            health: None,
            resources: vec![],
            window: 10,
        }
    }

    fn ok(endpoint: &str, ms: u64) -> ProbeResult {
        ProbeResult::completed(endpoint, Method::Get, 200, Duration::from_millis(ms), Utc::now())
    }

    #[test]
    fn test_empty_input_is_a_valid_report() {
        let report = ReportAggregator::build(input(vec![]));
        assert_eq!(report.summary.total_requests, 0);
        assert_eq!(report.summary.success_rate, 0.0);
        assert!(report.summary.avg_latency_ms.is_none());
        assert!(report.endpoints.is_empty());
        assert!(report.health.is_none());
        assert!(report.resources.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["summary"]["avg_latency_ms"].is_null());
        assert_eq!(json["run"]["state"], "reported");
    }

    #[test]
    fn test_summary_and_endpoints() {
        let timeout = ProbeResult::failed(
            "/slow",
            Method::Get,
            ProbeError::new(ProbeErrorKind::Timeout, "timed out"),
            Duration::from_secs(5),
            Utc::now(),
        );
        let report = ReportAggregator::build(input(vec![ok("/a", 10), ok("/a", 30), ok("/b", 20), timeout]));

        assert_eq!(report.summary.total_requests, 4);
        assert_eq!(report.summary.success_rate, 75.0);
        assert_eq!(report.summary.avg_latency_ms, Some(20.0));
        assert_eq!(report.summary.requests_per_second, 2.0);

        let names: Vec<_> = report.endpoints.iter().map(|e| e.endpoint.as_str()).collect();
        assert_eq!(names, vec!["/a", "/b", "/slow"]);
        let slow = &report.endpoints[2];
        assert_eq!(slow.success_rate, 0.0);
        assert!(slow.avg_latency_ms.is_none());
        assert_eq!(slow.sample_errors.len(), 1);
    }

    #[test]
    fn test_health_and_workflows_carried_over() {
        let mut history = HealthHistory::new(100);
        for _ in 0..3 {
            let snap = |name: &str, status| HealthSnapshot {
                service: name.into(),
                status,
                latency_ms: 1.0,
                status_code: Some(200),
                error: None,
                checked_at: Utc::now(),
            };
            history.record(vec![snap("backend", HealthStatus::Healthy), snap("middleware", HealthStatus::Error)]);
        }
        let workflow = Workflow::new("w", vec![WorkflowStep::get("/a")]);
        let outcome = WorkflowOutcome::new(&workflow.name, 1, vec![StepOutcome::Executed(ok("/a", 5))]);
        let asset = AssetCheck {
            result: ok("/", 2),
            bytes: Some(512),
        };

        let mut inp = input(vec![ok("/a", 5)]);
        inp.health = Some(history);
        inp.workflows = vec![outcome];
        inp.assets = vec![asset];
        let report = ReportAggregator::build(inp);

        let health = report.health.as_ref().unwrap();
        assert_eq!(health.window_cycles, 3);
        assert_eq!(health.overall_availability, Some(50.0));
        assert_eq!(health.services["middleware"], 0.0);
        assert_eq!(report.workflows[0].succeeded, 1);
        assert_eq!(report.workflows[0].status, WorkflowStatus::Completed);
        assert_eq!(report.workflows[0].user, 1);
        assert_eq!(report.assets[0].bytes, Some(512));

        let text = report.format_summary();
        assert!(text.contains("Total requests: 1"));
        assert!(text.contains("backend"));
        assert!(text.contains("512 bytes"));
    }

    #[test]
    fn test_persist_writes_json_and_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = ReportAggregator::build(input(vec![ok("/a", 5)]));
        report.persist(&path).unwrap();

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["summary"]["total_requests"], 1);
        assert_eq!(written["endpoints"][0]["endpoint"], "/a");

        let err = report.persist(&dir.path().join("missing/dir/report.json")).unwrap_err();
        assert!(matches!(err, HarnessError::ReportWrite { .. }));
    }
}
