//! The load phases, run strictly one after another.
//!
//! Each phase returns its own results; nothing is appended to shared state.
//! `Err` means the phase could not run at all, not that requests failed.

use crate::config::HarnessConfig;
use crate::load::{
    check_assets, run_batch, run_sustained, run_workflows, AssetCheck, BatchSpec, SustainedSpec, Variables,
    WorkflowOutcome,
};
use crate::probes::{duration_ms, Probe, ProbeRequest, ProbeResult};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::sleep;
use tracing::{error, info};

pub const BACKEND_DIRECT: &str = "backend_direct";
pub const ENDPOINT_BATCHES: &str = "endpoint_batches";
pub const STRESS_BATCH: &str = "stress_batch";
pub const SUSTAINED_LOAD: &str = "sustained_load";
pub const WORKFLOWS: &str = "workflows";
pub const FRONTEND: &str = "frontend";

/// Phase names in execution order.
pub const ALL: [&str; 6] = [BACKEND_DIRECT, ENDPOINT_BATCHES, STRESS_BATCH, SUSTAINED_LOAD, WORKFLOWS, FRONTEND];

/// One request per backend endpoint, bypassing the middleware.
pub async fn backend_direct(probe: &dyn Probe, config: &HarnessConfig) -> Result<Vec<ProbeResult>, String> {
    if config.load.backend_endpoints.is_empty() {
        return Err("no backend endpoints configured".to_string());
    }
    info!(backend = %config.backend_url, "Probing backend directly");

    let requests: Vec<ProbeRequest> = config
        .load
        .backend_endpoints
        .iter()
        .map(|e| ProbeRequest::get(&config.backend_url, e, config.probe.timeout()))
        .collect();
    let results: Vec<ProbeResult> = join_all(requests.iter().map(|r| probe.probe(r)))
        .await
        .into_iter()
        .map(|r| r.result)
        .collect();

    for r in &results {
        match r.failure_reason() {
            None => info!(
                endpoint = %r.endpoint(),
                status = r.status_code(),
                latency_ms = %format!("{:.1}", duration_ms(r.latency())),
                "Backend endpoint ok"
            ),
            Some(reason) => error!(endpoint = %r.endpoint(), %reason, "Backend endpoint failed"),
        }
    }
    Ok(results)
}

/// One concurrent batch per endpoint, with a pause between endpoints.
pub async fn endpoint_batches(probe: &dyn Probe, config: &HarnessConfig) -> Result<Vec<ProbeResult>, String> {
    if config.load.endpoints.is_empty() {
        return Err("no batch endpoints configured".to_string());
    }
    let spec = BatchSpec::new(config.concurrent_users, config.requests_per_user);
    let mut results = Vec::with_capacity(spec.total_requests() * config.load.endpoints.len());

    for (i, endpoint) in config.load.endpoints.iter().enumerate() {
        if i > 0 {
            sleep(config.load.pause_between_endpoints()).await;
        }
        results.extend(run_batch(probe, &config.base_url, endpoint, spec, config.probe.timeout()).await);
    }
    Ok(results)
}

/// One oversized batch against a single endpoint.
pub async fn stress_batch(probe: &dyn Probe, config: &HarnessConfig) -> Result<Vec<ProbeResult>, String> {
    let stress = &config.load.stress;
    if stress.endpoint.is_empty() {
        return Err("no stress endpoint configured".to_string());
    }
    let spec = BatchSpec::new(stress.concurrent_users, stress.requests_per_user);
    info!(endpoint = %stress.endpoint, total = spec.total_requests(), "Stress batch");
    Ok(run_batch(probe, &config.base_url, &stress.endpoint, spec, config.probe.timeout()).await)
}

/// Random endpoint picks until the configured duration elapses.
pub async fn sustained_load(probe: &dyn Probe, config: &HarnessConfig) -> Result<Vec<ProbeResult>, String> {
    if config.sustained.endpoints.is_empty() {
        return Err("no sustained endpoints configured".to_string());
    }
    let spec = SustainedSpec {
        duration: config.sustained_duration(),
        batch_size: config.sustained.batch_size,
        inter_batch_delay: config.sustained.inter_batch_delay(),
        endpoints: config.sustained.endpoints.clone(),
    };
    let mut rng = StdRng::from_entropy();
    let outcome = run_sustained(probe, &config.base_url, &spec, config.probe.timeout(), &mut rng).await;
    Ok(outcome.results)
}

/// All configured workflows, concurrently.
pub async fn workflows(
    probe: &dyn Probe,
    config: &HarnessConfig,
    seed: &Variables,
) -> Result<Vec<WorkflowOutcome>, String> {
    if config.workflows.is_empty() {
        return Err("no workflows configured".to_string());
    }
    info!(count = config.workflows.len(), "Simulating workflows");
    let mut rng = StdRng::from_entropy();
    Ok(run_workflows(probe, &config.base_url, &config.workflows, seed, config.probe.timeout(), &mut rng).await)
}

/// What the frontend phase produced.
#[derive(Debug, Clone, Default)]
pub struct FrontendOutcome {
    pub assets: Vec<AssetCheck>,
    pub journeys: Vec<WorkflowOutcome>,
}

impl FrontendOutcome {
    pub fn requests(&self) -> usize {
        self.assets.len() + self.journeys.iter().map(|j| j.results().count()).sum::<usize>()
    }
}

/// Asset fetches, then concurrent copies of the browsing journey.
pub async fn frontend(probe: &dyn Probe, config: &HarnessConfig, seed: &Variables) -> Result<FrontendOutcome, String> {
    let frontend = &config.frontend;
    let Some(url) = &frontend.url else {
        return Err("no frontend url configured".to_string());
    };
    let journey = frontend.journey_workflow();
    if frontend.assets.is_empty() && journey.is_none() {
        return Err("no frontend assets or journey configured".to_string());
    }

    info!(frontend = %url, assets = frontend.assets.len(), "Checking frontend assets");
    let assets = check_assets(probe, url, &frontend.assets, config.probe.timeout()).await;

    let journeys = match journey {
        Some(workflow) => {
            info!(users = workflow.users, "Simulating frontend users");
            let mut rng = StdRng::from_entropy();
            run_workflows(probe, url, &[workflow], seed, config.probe.timeout(), &mut rng).await
        }
        None => Vec::new(),
    };
    Ok(FrontendOutcome { assets, journeys })
}
