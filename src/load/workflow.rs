//! Ordered, dependent request sequences modelling one user journey.

use crate::probes::{Method, Probe, ProbeRequest, ProbeResult};
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Values available to `{name}` placeholders.
pub type Variables = BTreeMap<String, String>;

/// Pull a value out of a step's JSON response into a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub var: String,
    /// RFC 6901 pointer, e.g. `/project/id`.
    pub pointer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub endpoint: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub capture: Option<Capture>,
    /// When this step fails the rest of the workflow is skipped.
    #[serde(default)]
    pub hard_dependency: bool,
}

impl WorkflowStep {
    pub fn get(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            method: Method::Get,
            body: None,
            capture: None,
            hard_dependency: false,
        }
    }

    pub fn post(endpoint: &str, body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(endpoint)
        }
    }

    pub fn capture(mut self, var: &str, pointer: &str) -> Self {
        self.capture = Some(Capture {
            var: var.to_string(),
            pointer: pointer.to_string(),
        });
        self
    }

    pub fn hard(mut self) -> Self {
        self.hard_dependency = true;
        self
    }
}

/// Pause drawn uniformly from `min_ms..=max_ms` before each step after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkTime {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl ThinkTime {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        let (lo, hi) = (self.min_ms.min(self.max_ms), self.min_ms.max(self.max_ms));
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub steps: Vec<WorkflowStep>,
    /// Concurrent copies of the journey.
    #[serde(default = "default_users")]
    pub users: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think_time: Option<ThinkTime>,
    /// Replaces the harness base URL for every step of this workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_users() -> usize {
    1
}

impl Workflow {
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            name: name.into(),
            steps,
            users: 1,
            think_time: None,
            base_url: None,
        }
    }

    pub fn users(mut self, users: usize) -> Self {
        self.users = users;
        self
    }

    pub fn think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = Some(think_time);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// One pause per gap between steps; empty without think time.
    fn draw_pauses<R: Rng>(&self, rng: &mut R) -> Vec<Duration> {
        match &self.think_time {
            Some(t) => (1..self.steps.len()).map(|_| t.sample(rng)).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Executed(ProbeResult),
    Skipped { endpoint: String, reason: String },
}

impl StepOutcome {
    pub fn result(&self) -> Option<&ProbeResult> {
        match self {
            StepOutcome::Executed(r) => Some(r),
            StepOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every step ran and succeeded.
    Completed,
    /// At least one step succeeded, but some failed or were skipped.
    Partial,
    Failed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Partial => write!(f, "partial"),
            WorkflowStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutcome {
    pub name: String,
    /// Which concurrent copy of the workflow this was, from 0.
    pub user: usize,
    pub steps: Vec<StepOutcome>,
    pub status: WorkflowStatus,
}

impl WorkflowOutcome {
    pub fn new(name: &str, user: usize, steps: Vec<StepOutcome>) -> Self {
        let status = status_of(&steps);
        Self {
            name: name.to_string(),
            user,
            steps,
            status,
        }
    }

    /// Probe results of the steps that actually ran.
    pub fn results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.steps.iter().filter_map(StepOutcome::result)
    }

    pub fn skipped(&self) -> usize {
        self.steps.iter().filter(|s| s.is_skipped()).count()
    }
}

fn status_of(steps: &[StepOutcome]) -> WorkflowStatus {
    let succeeded = steps
        .iter()
        .filter(|s| s.result().is_some_and(ProbeResult::success))
        .count();
    if succeeded == steps.len() {
        WorkflowStatus::Completed
    } else if succeeded > 0 {
        WorkflowStatus::Partial
    } else {
        WorkflowStatus::Failed
    }
}

/// Run one copy of `workflow`, its steps in order, against `base_url`
/// (or the workflow's own base URL).
///
/// `seed` provides the initial placeholder values; captured values are added
/// as the workflow proceeds and never leak out to other workflows. Think
/// times are drawn from `rng` up front.
pub async fn run_workflow<R: Rng>(
    probe: &dyn Probe,
    base_url: &str,
    workflow: &Workflow,
    seed: &Variables,
    timeout: Duration,
    rng: &mut R,
) -> WorkflowOutcome {
    let pauses = workflow.draw_pauses(rng);
    run_copy(probe, base_url, workflow, 0, seed, timeout, &pauses).await
}

/// Run every workflow's `users` copies concurrently; each copy stays
/// sequential internally and keeps its own variables.
pub async fn run_workflows<R: Rng>(
    probe: &dyn Probe,
    base_url: &str,
    workflows: &[Workflow],
    seed: &Variables,
    timeout: Duration,
    rng: &mut R,
) -> Vec<WorkflowOutcome> {
    let copies: Vec<(&Workflow, usize, Vec<Duration>)> = workflows
        .iter()
        .flat_map(|w| (0..w.users).map(move |user| (w, user)))
        .map(|(w, user)| (w, user, w.draw_pauses(rng)))
        .collect();
    join_all(
        copies
            .iter()
            .map(|(w, user, pauses)| run_copy(probe, base_url, w, *user, seed, timeout, pauses)),
    )
    .await
}

async fn run_copy(
    probe: &dyn Probe,
    base_url: &str,
    workflow: &Workflow,
    user: usize,
    seed: &Variables,
    timeout: Duration,
    pauses: &[Duration],
) -> WorkflowOutcome {
    let base_url = workflow.base_url.as_deref().unwrap_or(base_url);
    info!(workflow = %workflow.name, user, steps = workflow.steps.len(), "Workflow started");
    let mut vars = seed.clone();
    let mut outcomes = Vec::with_capacity(workflow.steps.len());
    let mut abandon: Option<String> = None;

    for (i, step) in workflow.steps.iter().enumerate() {
        if let Some(reason) = &abandon {
            debug!(workflow = %workflow.name, user, endpoint = %step.endpoint, "Step skipped");
            outcomes.push(StepOutcome::Skipped {
                endpoint: step.endpoint.clone(),
                reason: reason.clone(),
            });
            continue;
        }

        let request = match render_request(base_url, step, &vars, timeout) {
            Ok(r) => r,
            Err(missing) => {
                let reason = format!("missing value for {{{}}}", missing);
                warn!(workflow = %workflow.name, endpoint = %step.endpoint, %reason, "Skipping rest of workflow");
                outcomes.push(StepOutcome::Skipped {
                    endpoint: step.endpoint.clone(),
                    reason: reason.clone(),
                });
                abandon = Some(reason);
                continue;
            }
        };

        if let Some(pause) = i.checked_sub(1).and_then(|gap| pauses.get(gap)) {
            sleep(*pause).await;
        }
        let response = probe.probe(&request).await;
        let result = response.result.with_context(&workflow.name);

        if result.success() {
            if let Some(capture) = &step.capture {
                match response.body.as_deref().and_then(|b| extract(b, &capture.pointer)) {
                    Some(value) => {
                        debug!(workflow = %workflow.name, var = %capture.var, "Captured value");
                        vars.insert(capture.var.clone(), value);
                    }
                    None => warn!(
                        workflow = %workflow.name,
                        pointer = %capture.pointer,
                        "Capture found nothing in response"
                    ),
                }
            }
        } else if step.hard_dependency {
            let reason = format!(
                "hard dependency {} {} failed ({})",
                step.method,
                request.endpoint,
                result.failure_reason().unwrap_or_default()
            );
            warn!(workflow = %workflow.name, %reason, "Skipping rest of workflow");
            abandon = Some(reason);
        }

        outcomes.push(StepOutcome::Executed(result));
    }

    let outcome = WorkflowOutcome::new(&workflow.name, user, outcomes);
    info!(
        workflow = %outcome.name,
        user,
        status = %outcome.status,
        skipped = outcome.skipped(),
        "Workflow finished"
    );
    outcome
}

fn render_request(
    base_url: &str,
    step: &WorkflowStep,
    vars: &Variables,
    timeout: Duration,
) -> Result<ProbeRequest, String> {
    Ok(ProbeRequest {
        base_url: base_url.to_string(),
        endpoint: render(&step.endpoint, vars)?,
        method: step.method,
        body: step.body.as_ref().map(|b| render_value(b, vars)).transpose()?,
        timeout,
    })
}

/// Substitute `{name}` placeholders. Braces around anything that is not a
/// plain identifier are left alone. Returns the first unresolved name.
pub(crate) fn render(template: &str, vars: &Variables) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if name_len > 0 && after[name_len..].starts_with('}') {
            let name = &after[..name_len];
            let value = vars.get(name).ok_or_else(|| name.to_string())?;
            out.push_str(value);
            rest = &after[name_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn render_value(value: &Value, vars: &Variables) -> Result<Value, String> {
    Ok(match value {
        Value::String(s) => Value::String(render(s, vars)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| render_value(v, vars))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), render_value(v, vars)?)))
                .collect::<Result<_, String>>()?,
        ),
        other => other.clone(),
    })
}

fn extract(body: &str, pointer: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    match json.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// The journeys exercised when no workflows are configured.
pub fn default_workflows() -> Vec<Workflow> {
    vec![
        Workflow::new(
            "GitHub Repository Creation",
            vec![
                WorkflowStep::get("/api/github/status"),
                WorkflowStep::get("/api/github/repositories"),
                WorkflowStep::post(
                    "/api/github/repositories",
                    serde_json::json!({
                        "name": "test-repo-{run_id}",
                        "description": "Test repository",
                        "private": false,
                        "framework": "nextjs"
                    }),
                ),
            ],
        ),
        Workflow::new(
            "NVIDIA Integration Check",
            vec![
                WorkflowStep::get("/api/nvidia/status"),
                WorkflowStep::get("/api/nvidia/geforce-now/status"),
                WorkflowStep::get("/api/nvidia/dlss/status"),
            ],
        ),
        Workflow::new(
            "Vercel Deployment",
            vec![
                WorkflowStep::get("/api/vercel/status"),
                WorkflowStep::get("/api/vercel/projects"),
                WorkflowStep::post(
                    "/api/vercel/projects",
                    serde_json::json!({ "name": "load-test-{run_id}", "framework": "nextjs" }),
                )
                .capture("project_id", "/project/id")
                .hard(),
                WorkflowStep {
                    method: Method::Post,
                    ..WorkflowStep::get("/api/vercel/projects/{project_id}/deploy")
                },
            ],
        ),
    ]
}
