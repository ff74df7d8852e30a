//! Orchestration-level failures.
//!
//! Per-request failures never show up here: they are recorded as data on the
//! [`ProbeResult`](crate::probes::ProbeResult) and surface only in the report.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("required tool '{tool}' is not available: {reason}")]
    PrerequisiteMissing { tool: String, reason: String },

    #[error("service '{service}' did not become ready: {detail}")]
    ServiceUnavailable { service: String, detail: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write report to {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode report: {0}")]
    ReportEncode(#[from] serde_json::Error),
}
