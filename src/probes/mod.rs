//! Single-request measurement: the leaf every load pattern is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

pub mod http;

pub use self::http::HttpProber;

/// HTTP verbs a probe may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request to measure.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub base_url: String,
    pub endpoint: String,
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl ProbeRequest {
    pub fn get(base_url: &str, endpoint: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.to_string(),
            endpoint: endpoint.to_string(),
            method: Method::Get,
            body: None,
            timeout,
        }
    }

    /// Full URL: `base_url` joined with `endpoint` (an absolute endpoint URL wins).
    pub fn url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            return self.endpoint.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        if self.endpoint.is_empty() {
            base.to_string()
        } else if self.endpoint.starts_with('/') {
            format!("{}{}", base, self.endpoint)
        } else {
            format!("{}/{}", base, self.endpoint)
        }
    }
}

/// Why a request never produced a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    Timeout,
    Connect,
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Outcome of a single probe. Fields are private so the success flag can only
/// be derived, never set independently of the status code and error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    endpoint: String,
    method: Method,
    status_code: u16,
    #[serde(rename = "latency_ms", serialize_with = "serialize_ms")]
    latency: Duration,
    success: bool,
    error: Option<ProbeError>,
    started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl ProbeResult {
    /// A request that got a status code back.
    pub fn completed(
        endpoint: impl Into<String>,
        method: Method,
        status_code: u16,
        latency: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            status_code,
            latency,
            success: is_success_status(status_code),
            error: None,
            started_at,
            context: None,
        }
    }

    /// A request that failed below HTTP (refused, DNS, timeout, broken body).
    pub fn failed(
        endpoint: impl Into<String>,
        method: Method,
        error: ProbeError,
        latency: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            status_code: 0,
            latency,
            success: false,
            error: Some(error),
            started_at,
            context: None,
        }
    }

    /// Attach the name of the workflow (or other grouping) that issued this probe.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// `0` means no response was received.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&ProbeError> {
        self.error.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Short description of why this probe did not succeed.
    pub fn failure_reason(&self) -> Option<String> {
        if self.success {
            return None;
        }
        Some(match &self.error {
            Some(e) => e.to_string(),
            None => format!("HTTP {}", self.status_code),
        })
    }
}

/// Status codes 1..=399 count as success; 0 is reserved for "no response".
pub fn is_success_status(status_code: u16) -> bool {
    (1..=399).contains(&status_code)
}

pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn serialize_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(duration_ms(*d))
}

/// What a probe hands back: the measurement plus the body for callers that
/// need to read values out of it.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub result: ProbeResult,
    pub body: Option<String>,
}

/// Trait for anything that can measure one request.
///
/// Implementations never return an error: every failure mode is folded into
/// the [`ProbeResult`].
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, request: &ProbeRequest) -> ProbeResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        assert!(!is_success_status(0));
        assert!(is_success_status(200));
        assert!(is_success_status(301));
        assert!(is_success_status(399));
        assert!(!is_success_status(400));
        assert!(!is_success_status(503));
    }

    #[test]
    fn test_completed_result_derives_success() {
        let ok = ProbeResult::completed("/health", Method::Get, 200, Duration::from_millis(5), Utc::now());
        assert!(ok.success());
        assert!(ok.error().is_none());
        assert!(ok.failure_reason().is_none());

        let bad = ProbeResult::completed("/health", Method::Get, 502, Duration::from_millis(5), Utc::now());
        assert!(!bad.success());
        assert!(bad.error().is_none());
        assert_eq!(bad.failure_reason().as_deref(), Some("HTTP 502"));
    }

    #[test]
    fn test_failed_result_has_zero_status() {
        let r = ProbeResult::failed(
            "/health",
            Method::Post,
            ProbeError::new(ProbeErrorKind::Timeout, "deadline elapsed"),
            Duration::from_secs(5),
            Utc::now(),
        );
        assert_eq!(r.status_code(), 0);
        assert!(!r.success());
        assert_eq!(r.error().map(|e| e.kind), Some(ProbeErrorKind::Timeout));
    }

    #[test]
    fn test_url_join() {
        let t = Duration::from_secs(1);
        assert_eq!(ProbeRequest::get("http://h:80/", "/health", t).url(), "http://h:80/health");
        assert_eq!(ProbeRequest::get("http://h:80", "api/status", t).url(), "http://h:80/api/status");
        assert_eq!(ProbeRequest::get("http://h:80", "", t).url(), "http://h:80");
        assert_eq!(
            ProbeRequest::get("http://h:80", "http://other:5000/health", t).url(),
            "http://other:5000/health"
        );
    }

    #[test]
    fn test_serializes_latency_as_ms() {
        let r = ProbeResult::completed("/x", Method::Get, 200, Duration::from_millis(250), Utc::now())
            .with_context("journey");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["latency_ms"], 250.0);
        assert_eq!(json["method"], "GET");
        assert_eq!(json["context"], "journey");
    }
}
