//! Run lifecycle: gate, monitor, load, report.

pub mod phases;
pub mod prereq;

use crate::analysis::{PhaseRecord, ReportAggregator, ReportInput, RunReport};
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::load::{AssetCheck, Variables, WorkflowOutcome};
use crate::monitor::health::{spawn_health_monitor, HealthPollSettings};
use crate::monitor::resources::{spawn_resource_monitor, SystemSource};
use crate::probes::{Probe, ProbeResult};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Where a run is in its lifecycle.
///
/// ```text
/// Init -> PrerequisitesChecked -> ServicesReady -> RunningPhases -> Reported -> Done
///   \______________________________________________________________/
///                                  |
///                               Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    PrerequisitesChecked,
    ServicesReady,
    RunningPhases,
    Reported,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Init, PrerequisitesChecked)
            | (PrerequisitesChecked, ServicesReady)
            | (ServicesReady, RunningPhases)
            | (RunningPhases, Reported)
            | (Reported, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Init => "init",
            RunState::PrerequisitesChecked => "prerequisites_checked",
            RunState::ServicesReady => "services_ready",
            RunState::RunningPhases => "running_phases",
            RunState::Reported => "reported",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Drives one orchestrated run.
pub struct Orchestrator {
    config: Arc<HarnessConfig>,
    probe: Arc<dyn Probe>,
    run_id: String,
    state: RunState,
}

impl Orchestrator {
    pub fn new(config: HarnessConfig, probe: Arc<dyn Probe>) -> Self {
        Self {
            config: Arc::new(config),
            probe,
            run_id: Uuid::new_v4().to_string(),
            state: RunState::Init,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute the run and persist its report.
    ///
    /// A failed precondition does not make this return `Err`: the report is
    /// still built and written with state `failed`. `Err` means the report
    /// itself could not be persisted.
    pub async fn run(&mut self) -> Result<RunReport, HarnessError> {
        let started_at = Utc::now();
        info!(run_id = %self.run_id, "Run started");

        let mut records = Vec::with_capacity(phases::ALL.len());
        let mut results: Vec<ProbeResult> = Vec::new();
        let mut workflows: Vec<WorkflowOutcome> = Vec::new();
        let mut assets: Vec<AssetCheck> = Vec::new();
        let mut health = None;
        let mut samples = Vec::new();

        let failure = match self.preflight().await {
            Ok(()) => {
                let settings = HealthPollSettings {
                    interval: self.config.health_poll_interval(),
                    timeout: self.config.monitor.health_timeout(),
                    expected_status: self.config.probe.expected_status,
                    history_capacity: self.config.monitor.history_capacity,
                };
                let health_monitor =
                    spawn_health_monitor(self.probe.clone(), self.config.service_targets(), settings);
                let resource_monitor = spawn_resource_monitor(
                    SystemSource::new(),
                    self.config.monitor.resource_interval(),
                    self.config.monitor.sample_capacity,
                );
                self.advance(RunState::RunningPhases);

                let (record, out) = self
                    .run_phase(phases::BACKEND_DIRECT, Vec::len, |probe, config| async move {
                        phases::backend_direct(probe.as_ref(), &config).await
                    })
                    .await;
                records.push(record);
                results.extend(out.unwrap_or_default());

                let (record, out) = self
                    .run_phase(phases::ENDPOINT_BATCHES, Vec::len, |probe, config| async move {
                        phases::endpoint_batches(probe.as_ref(), &config).await
                    })
                    .await;
                records.push(record);
                results.extend(out.unwrap_or_default());

                let (record, out) = self
                    .run_phase(phases::STRESS_BATCH, Vec::len, |probe, config| async move {
                        phases::stress_batch(probe.as_ref(), &config).await
                    })
                    .await;
                records.push(record);
                results.extend(out.unwrap_or_default());

                let (record, out) = self
                    .run_phase(phases::SUSTAINED_LOAD, Vec::len, |probe, config| async move {
                        phases::sustained_load(probe.as_ref(), &config).await
                    })
                    .await;
                records.push(record);
                results.extend(out.unwrap_or_default());

                let mut seed = Variables::new();
                seed.insert("run_id".to_string(), self.run_id.clone());
                let count = |w: &Vec<WorkflowOutcome>| -> usize { w.iter().map(|o| o.results().count()).sum() };
                let workflow_seed = seed.clone();
                let (record, out) = self
                    .run_phase(phases::WORKFLOWS, count, move |probe, config| async move {
                        phases::workflows(probe.as_ref(), &config, &workflow_seed).await
                    })
                    .await;
                records.push(record);
                workflows = out.unwrap_or_default();
                results.extend(workflows.iter().flat_map(|w| w.results().cloned()));

                if self.config.frontend.url.is_some() {
                    let (record, out) = self
                        .run_phase(phases::FRONTEND, phases::FrontendOutcome::requests, move |probe, config| async move {
                            phases::frontend(probe.as_ref(), &config, &seed).await
                        })
                        .await;
                    records.push(record);
                    let frontend = out.unwrap_or_default();
                    results.extend(frontend.assets.iter().map(|a| a.result.clone()));
                    results.extend(frontend.journeys.iter().flat_map(|w| w.results().cloned()));
                    assets = frontend.assets;
                    workflows.extend(frontend.journeys);
                } else {
                    info!(phase = phases::FRONTEND, "No frontend url configured, skipping");
                    records.push(PhaseRecord::skipped(phases::FRONTEND));
                }

                match health_monitor.join().await {
                    Ok(history) => health = Some(history),
                    Err(e) => warn!("Health monitor ended abnormally: {}", e),
                }
                match resource_monitor.join().await {
                    Ok(ring) => samples = ring.snapshot(),
                    Err(e) => warn!("Resource monitor ended abnormally: {}", e),
                }
                self.advance(RunState::Reported);
                None
            }
            Err(e) => {
                error!(error = %e, "Run aborted before any phase");
                records.extend(phases::ALL.iter().map(|name| PhaseRecord::skipped(name)));
                self.advance(RunState::Failed);
                Some(e.to_string())
            }
        };

        let report = ReportAggregator::build(ReportInput {
            run_id: self.run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            state: self.state,
            failure,
            phases: records,
            results,
            workflows,
            assets,
            health,
            resources: samples,
            window: self.config.monitor.report_window,
        });
        info!("{}", report.format_summary());

        if let Err(e) = report.persist(&self.config.report_path) {
            error!(error = %e, "Could not persist report");
            self.advance(RunState::Failed);
            return Err(e);
        }
        if self.state == RunState::Reported {
            self.advance(RunState::Done);
        }
        Ok(report)
    }

    async fn preflight(&mut self) -> Result<(), HarnessError> {
        let config = self.config.clone();
        config.validate()?;

        let startup = &config.startup;
        prereq::check_prerequisites(&startup.prerequisites, startup.prerequisite_timeout()).await?;
        self.advance(RunState::PrerequisitesChecked);

        prereq::wait_for_services(
            self.probe.as_ref(),
            &config.required_services(),
            config.probe.expected_status,
            config.monitor.health_timeout(),
            startup.readiness_timeout(),
            startup.readiness_poll(),
        )
        .await?;
        self.advance(RunState::ServicesReady);
        Ok(())
    }

    /// Run one phase on its own task so a panic is contained and recorded.
    async fn run_phase<T, F, Fut>(
        &self,
        name: &str,
        count: impl Fn(&T) -> usize,
        phase: F,
    ) -> (PhaseRecord, Option<T>)
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn Probe>, Arc<HarnessConfig>) -> Fut,
        Fut: Future<Output = Result<T, String>> + Send + 'static,
    {
        info!(phase = name, "Phase started");
        let started = Instant::now();
        let outcome = tokio::spawn(phase(self.probe.clone(), self.config.clone())).await;
        let elapsed = started.elapsed();

        let (record, output) = match outcome {
            Ok(Ok(out)) => (PhaseRecord::completed(name, count(&out), elapsed), Some(out)),
            Ok(Err(reason)) => (PhaseRecord::failed(name, 0, elapsed, reason), None),
            Err(e) => (PhaseRecord::failed(name, 0, elapsed, format!("phase task aborted: {}", e)), None),
        };
        match &record.error {
            None => info!(phase = name, requests = record.requests, duration_ms = record.duration_ms, "Phase completed"),
            Some(reason) => warn!(phase = name, %reason, "Phase failed"),
        }
        (record, output)
    }

    fn advance(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Ignoring invalid state transition");
            return;
        }
        info!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
    }
}
