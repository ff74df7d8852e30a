//! TOML configuration for a harness run.
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes. Durations are plain numbers (seconds or milliseconds, as named).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::HarnessError;
use crate::load::workflow::{default_workflows, ThinkTime, Workflow, WorkflowStep};
use crate::monitor::health::ServiceTarget;

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "OMNIPROBE_CONFIG";
/// Looked up in the working directory when the env var is unset.
pub const DEFAULT_CONFIG_FILE: &str = "omniprobe.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Front door for load traffic (the middleware).
    pub base_url: String,
    /// Backend probed directly, bypassing the middleware.
    pub backend_url: String,
    pub concurrent_users: usize,
    pub requests_per_user: usize,
    /// Seconds.
    pub sustained_duration: f64,
    /// Seconds between health poll cycles.
    pub health_poll_interval: f64,
    pub report_path: PathBuf,
    pub probe: ProbeConfig,
    pub load: LoadConfig,
    pub sustained: SustainedConfig,
    pub monitor: MonitorConfig,
    pub startup: StartupConfig,
    pub services: BTreeMap<String, ServiceConfig>,
    pub workflows: Vec<Workflow>,
    pub frontend: FrontendConfig,
    pub logging: LoggingConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mut services = BTreeMap::new();
        services.insert(
            "backend".to_string(),
            ServiceConfig {
                url: "http://127.0.0.1:5000/health".to_string(),
                required: true,
            },
        );
        services.insert(
            "middleware".to_string(),
            ServiceConfig {
                url: "http://127.0.0.1:8080/health".to_string(),
                required: true,
            },
        );
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            backend_url: "http://127.0.0.1:5000".to_string(),
            concurrent_users: 20,
            requests_per_user: 10,
            sustained_duration: 120.0,
            health_poll_interval: 5.0,
            report_path: PathBuf::from("stress_test_report.json"),
            probe: ProbeConfig::default(),
            load: LoadConfig::default(),
            sustained: SustainedConfig::default(),
            monitor: MonitorConfig::default(),
            startup: StartupConfig::default(),
            services,
            workflows: default_workflows(),
            frontend: FrontendConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "Loaded harness configuration");
        Ok(config)
    }

    /// Try, in order: `$OMNIPROBE_CONFIG`, `./omniprobe.toml`, compiled-in defaults.
    ///
    /// Defaults are only used when no file is named or present. A file that
    /// exists but does not parse is an error, never silently replaced.
    pub fn load_or_default() -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::resolve(env_path.as_deref(), Path::new(DEFAULT_CONFIG_FILE))
    }

    fn resolve(env_path: Option<&Path>, local: &Path) -> Result<Self> {
        if let Some(path) = env_path {
            return Self::load(path).with_context(|| format!("{} points at an unusable file", CONFIG_ENV));
        }
        if local.exists() {
            return Self::load(local);
        }
        debug!("No config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let invalid = |msg: String| Err(HarnessError::InvalidConfig(msg));

        for (name, url) in [("base_url", &self.base_url), ("backend_url", &self.backend_url)] {
            if !is_http_url(url) {
                return invalid(format!("{} must be an http(s) URL, got '{}'", name, url));
            }
        }
        for (name, svc) in &self.services {
            if !is_http_url(&svc.url) {
                return invalid(format!("service '{}' has non-http(s) URL '{}'", name, svc.url));
            }
        }
        if self.concurrent_users == 0 || self.requests_per_user == 0 {
            return invalid("concurrent_users and requests_per_user must be at least 1".into());
        }
        if self.load.stress.concurrent_users == 0 || self.load.stress.requests_per_user == 0 {
            return invalid("load.stress users and requests_per_user must be at least 1".into());
        }
        for (name, value) in [
            ("sustained.batch_size", self.sustained.batch_size as u64),
            ("monitor.resource_interval_ms", self.monitor.resource_interval_ms),
            ("monitor.sample_capacity", self.monitor.sample_capacity as u64),
            ("monitor.report_window", self.monitor.report_window as u64),
            ("monitor.history_capacity", self.monitor.history_capacity as u64),
            ("startup.readiness_poll_ms", self.startup.readiness_poll_ms),
        ] {
            if value == 0 {
                return invalid(format!("{} must be at least 1", name));
            }
        }
        for w in &self.workflows {
            if w.users == 0 {
                return invalid(format!("workflow '{}' must have at least 1 user", w.name));
            }
            if w.think_time.is_some_and(|t| t.min_ms > t.max_ms) {
                return invalid(format!("workflow '{}' think_time min_ms exceeds max_ms", w.name));
            }
        }
        if let Some(url) = &self.frontend.url {
            if !is_http_url(url) {
                return invalid(format!("frontend.url must be an http(s) URL, got '{}'", url));
            }
        }
        if self.frontend.think_time.min_ms > self.frontend.think_time.max_ms {
            return invalid("frontend.think_time min_ms exceeds max_ms".into());
        }
        for (name, secs) in [
            ("sustained_duration", self.sustained_duration),
            ("health_poll_interval", self.health_poll_interval),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return invalid(format!("{} must be a non-negative number of seconds", name));
            }
        }
        if self.health_poll_interval == 0.0 {
            return invalid("health_poll_interval must be greater than zero".into());
        }
        Ok(())
    }

    pub fn sustained_duration(&self) -> Duration {
        secs_f64(self.sustained_duration)
    }

    pub fn health_poll_interval(&self) -> Duration {
        secs_f64(self.health_poll_interval)
    }

    /// Every configured service as a health target.
    pub fn service_targets(&self) -> Vec<ServiceTarget> {
        self.services
            .iter()
            .map(|(name, svc)| ServiceTarget::new(name, &svc.url))
            .collect()
    }

    /// Services that must answer before any phase runs.
    pub fn required_services(&self) -> Vec<ServiceTarget> {
        self.services
            .iter()
            .filter(|(_, svc)| svc.required)
            .map(|(name, svc)| ServiceTarget::new(name, &svc.url))
            .collect()
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Hard per-request timeout (milliseconds).
    pub timeout_ms: u64,
    /// The only status a health endpoint may return to count as healthy.
    pub expected_status: u16,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            expected_status: 200,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Load phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Probed once each against `backend_url`.
    pub backend_endpoints: Vec<String>,
    /// Each gets one concurrent batch against `base_url`.
    pub endpoints: Vec<String>,
    /// Pause between endpoint batches (milliseconds).
    pub pause_between_endpoints_ms: u64,
    pub stress: StressConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            stress: StressConfig::default(),
            backend_endpoints: vec!["/health".into(), "/api/status".into()],
            endpoints: vec![
                "/health".into(),
                "/api/status".into(),
                "/api/github/status".into(),
                "/api/nvidia/status".into(),
                "/api/vercel/status".into(),
            ],
            pause_between_endpoints_ms: 1_000,
        }
    }
}

impl LoadConfig {
    pub fn pause_between_endpoints(&self) -> Duration {
        Duration::from_millis(self.pause_between_endpoints_ms)
    }
}

/// One high-concurrency batch, well above the per-endpoint batches, to push
/// memory and connection handling on a single endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub endpoint: String,
    pub concurrent_users: usize,
    pub requests_per_user: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            endpoint: "/api/status".into(),
            concurrent_users: 50,
            requests_per_user: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SustainedConfig {
    pub batch_size: usize,
    /// Milliseconds slept after each batch.
    pub inter_batch_delay_ms: u64,
    /// Candidates picked from uniformly, with replacement.
    pub endpoints: Vec<String>,
}

impl Default for SustainedConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay_ms: 100,
            endpoints: vec![
                "/health".into(),
                "/api/status".into(),
                "/api/github/status".into(),
            ],
        }
    }
}

impl SustainedConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Monitors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Resource sampling period (milliseconds).
    pub resource_interval_ms: u64,
    /// Resource samples retained (oldest evicted).
    pub sample_capacity: usize,
    /// Most recent cycles/samples the report's averages cover.
    pub report_window: usize,
    /// Per-call timeout for health checks (milliseconds).
    pub health_timeout_ms: u64,
    /// Health poll cycles retained.
    pub history_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            resource_interval_ms: 5_000,
            sample_capacity: 100,
            report_window: 10,
            health_timeout_ms: 5_000,
            history_capacity: 100,
        }
    }
}

impl MonitorConfig {
    pub fn resource_interval(&self) -> Duration {
        Duration::from_millis(self.resource_interval_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Startup gate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Commands that must answer `<tool> --version` before the run starts.
    pub prerequisites: Vec<String>,
    /// Per-tool check timeout (milliseconds).
    pub prerequisite_timeout_ms: u64,
    /// How long required services get to become healthy (milliseconds).
    pub readiness_timeout_ms: u64,
    pub readiness_poll_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            prerequisites: Vec::new(),
            prerequisite_timeout_ms: 10_000,
            readiness_timeout_ms: 30_000,
            readiness_poll_ms: 1_000,
        }
    }
}

impl StartupConfig {
    pub fn prerequisite_timeout(&self) -> Duration {
        Duration::from_millis(self.prerequisite_timeout_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }
}

/// A dependent service and its health URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub url: String,
    /// Gate the run on this service answering before phases start.
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Frontend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Static frontend origin. The frontend phase is skipped when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Fetched one by one; sizes land in the report.
    pub assets: Vec<String>,
    /// Steps of the simulated browsing journey.
    pub journey: Vec<String>,
    /// Concurrent copies of the journey; 0 runs the asset checks only.
    pub journey_users: usize,
    pub think_time: ThinkTime,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            url: None,
            assets: vec![
                "/".into(),
                "/assets/index.css".into(),
                "/assets/index.js".into(),
                "/favicon.ico".into(),
            ],
            journey: vec![
                "/".into(),
                "/api/status".into(),
                "/api/github/status".into(),
                "/api/nvidia/status".into(),
            ],
            journey_users: 3,
            think_time: ThinkTime::new(500, 2_000),
        }
    }
}

impl FrontendConfig {
    /// The browsing journey as a workflow against the frontend origin.
    pub fn journey_workflow(&self) -> Option<Workflow> {
        let url = self.url.as_ref()?;
        if self.journey.is_empty() || self.journey_users == 0 {
            return None;
        }
        let steps = self.journey.iter().map(|e| WorkflowStep::get(e)).collect();
        Some(
            Workflow::new("Frontend User Journey", steps)
                .users(self.journey_users)
                .think_time(self.think_time)
                .base_url(url.as_str()),
        )
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = HarnessConfig::default();

        assert_eq!(cfg.concurrent_users, 20);
        assert_eq!(cfg.requests_per_user, 10);
        assert_eq!(cfg.sustained_duration(), Duration::from_secs(120));
        assert_eq!(cfg.health_poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.report_path, PathBuf::from("stress_test_report.json"));

        assert_eq!(cfg.probe.expected_status, 200);
        assert_eq!(cfg.sustained.batch_size, 10);
        assert_eq!(cfg.sustained.inter_batch_delay(), Duration::from_millis(100));
        assert_eq!(cfg.monitor.sample_capacity, 100);
        assert_eq!(cfg.monitor.report_window, 10);
        assert_eq!(cfg.monitor.health_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.load.endpoints.len(), 5);
        assert_eq!(cfg.workflows.len(), 3);
        assert_eq!(cfg.load.stress.endpoint, "/api/status");
        assert_eq!(cfg.load.stress.concurrent_users * cfg.load.stress.requests_per_user, 250);
        assert!(cfg.frontend.url.is_none());
        assert_eq!(cfg.frontend.assets.len(), 4);
        assert_eq!(cfg.required_services().len(), 2);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);

        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_example_toml() {
        let toml_str = r#"
base_url = "http://10.0.0.5:8080"
backend_url = "http://10.0.0.5:5000"
concurrent_users = 5
requests_per_user = 2
sustained_duration = 0.5
health_poll_interval = 0.25
report_path = "/tmp/out.json"

[probe]
timeout_ms = 2000

[load.stress]
endpoint = "/health"
concurrent_users = 8

[sustained]
batch_size = 4
endpoints = ["/ok"]

[frontend]
url = "http://10.0.0.5:3000"
assets = ["/"]
think_time = { min_ms = 100, max_ms = 200 }

[startup]
prerequisites = ["curl"]

[services.backend]
url = "http://10.0.0.5:5000/health"

[services.cache]
url = "http://10.0.0.5:6379/health"
required = false

[[workflows]]
name = "smoke"
[[workflows.steps]]
endpoint = "/ok"

[logging]
level = "debug"
json = true
"#;

        let cfg: HarnessConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.base_url, "http://10.0.0.5:8080");
        assert_eq!(cfg.concurrent_users, 5);
        assert_eq!(cfg.sustained_duration(), Duration::from_millis(500));
        assert_eq!(cfg.health_poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.probe.timeout(), Duration::from_secs(2));
        assert_eq!(cfg.probe.expected_status, 200);
        assert_eq!(cfg.sustained.batch_size, 4);
        assert_eq!(cfg.sustained.inter_batch_delay_ms, 100);
        assert_eq!(cfg.startup.prerequisites, vec!["curl".to_string()]);
        assert_eq!(cfg.load.stress.endpoint, "/health");
        assert_eq!(cfg.load.stress.concurrent_users, 8);
        assert_eq!(cfg.load.stress.requests_per_user, 5);
        assert_eq!(cfg.frontend.url.as_deref(), Some("http://10.0.0.5:3000"));
        assert_eq!(cfg.frontend.assets, vec!["/".to_string()]);
        assert_eq!(cfg.frontend.journey_users, 3);
        assert_eq!(cfg.frontend.think_time, ThinkTime::new(100, 200));

        // A [services] table replaces the default map entirely.
        assert_eq!(cfg.services.len(), 2);
        assert!(cfg.services["backend"].required);
        assert!(!cfg.services["cache"].required);
        assert_eq!(cfg.required_services().len(), 1);
        assert_eq!(cfg.service_targets().len(), 2);

        assert_eq!(cfg.workflows.len(), 1);
        assert_eq!(cfg.workflows[0].steps[0].endpoint, "/ok");
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let cfg: HarnessConfig = toml::from_str("").unwrap();
        let defaults = HarnessConfig::default();

        assert_eq!(cfg.base_url, defaults.base_url);
        assert_eq!(cfg.monitor.history_capacity, defaults.monitor.history_capacity);
        assert_eq!(cfg.services, defaults.services);
        assert_eq!(cfg.workflows, defaults.workflows);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = HarnessConfig::default();
        cfg.base_url = "ftp://example".into();
        assert!(matches!(cfg.validate(), Err(HarnessError::InvalidConfig(_))));

        let mut cfg = HarnessConfig::default();
        cfg.concurrent_users = 0;
        assert!(cfg.validate().is_err());

        // Empty lists are left to the phases, which fail on their own.
        let mut cfg = HarnessConfig::default();
        cfg.sustained.endpoints.clear();
        cfg.load.backend_endpoints.clear();
        assert!(cfg.validate().is_ok());

        let mut cfg = HarnessConfig::default();
        cfg.sustained_duration = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = HarnessConfig::default();
        cfg.sustained_duration = 0.0;
        assert!(cfg.validate().is_ok());

        let mut cfg = HarnessConfig::default();
        cfg.workflows[0].users = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = HarnessConfig::default();
        cfg.frontend.url = Some("localhost:3000".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_intervals_and_windows() {
        let zeroed: [(&str, fn(&mut HarnessConfig)); 7] = [
            ("resource_interval_ms", |c| c.monitor.resource_interval_ms = 0),
            ("readiness_poll_ms", |c| c.startup.readiness_poll_ms = 0),
            ("report_window", |c| c.monitor.report_window = 0),
            ("history_capacity", |c| c.monitor.history_capacity = 0),
            ("sample_capacity", |c| c.monitor.sample_capacity = 0),
            ("health_poll_interval", |c| c.health_poll_interval = 0.0),
            ("stress", |c| c.load.stress.concurrent_users = 0),
        ];
        for (field, zero) in zeroed {
            let mut cfg = HarnessConfig::default();
            zero(&mut cfg);
            match cfg.validate() {
                Err(HarnessError::InvalidConfig(msg)) => assert!(msg.contains(field), "{}: {}", field, msg),
                other => panic!("{} = 0 accepted: {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_resolve_rejects_unparsable_local_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let local = dir.path().join("omniprobe.toml");
        std::fs::write(&local, "concurrent_users = \"not a number\"\n").unwrap();

        let err = HarnessConfig::resolve(None, &local).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to parse config file"));

        let missing = dir.path().join("absent.toml");
        let cfg = HarnessConfig::resolve(None, &missing).unwrap();
        assert_eq!(cfg.concurrent_users, 20);

        // An explicit path is never skipped in favour of the local file.
        std::fs::write(&local, "concurrent_users = 7\n").unwrap();
        assert!(HarnessConfig::resolve(Some(&missing), &local).is_err());
        assert_eq!(HarnessConfig::resolve(None, &local).unwrap().concurrent_users, 7);
    }

    #[test]
    fn test_frontend_journey_workflow() {
        let mut frontend = FrontendConfig::default();
        assert!(frontend.journey_workflow().is_none());

        frontend.url = Some("http://127.0.0.1:3000".into());
        let journey = frontend.journey_workflow().unwrap();
        assert_eq!(journey.users, 3);
        assert_eq!(journey.steps.len(), 4);
        assert_eq!(journey.think_time, Some(ThinkTime::new(500, 2_000)));
        assert_eq!(journey.base_url.as_deref(), Some("http://127.0.0.1:3000"));

        frontend.journey_users = 0;
        assert!(frontend.journey_workflow().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("omniprobe.toml");
        std::fs::write(&path, "concurrent_users = 3\n[monitor]\nreport_window = 4\n").unwrap();

        let cfg = HarnessConfig::load(&path).unwrap();
        assert_eq!(cfg.concurrent_users, 3);
        assert_eq!(cfg.monitor.report_window, 4);
        assert_eq!(cfg.monitor.sample_capacity, 100);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = HarnessConfig::load(Path::new("/nonexistent/path/omniprobe.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = HarnessConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let roundtripped: HarnessConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(cfg.base_url, roundtripped.base_url);
        assert_eq!(cfg.services, roundtripped.services);
        assert_eq!(cfg.workflows.len(), roundtripped.workflows.len());
    }
}
