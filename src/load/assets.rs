//! Static asset checks: one GET per asset, recording the payload size.

use crate::probes::{duration_ms, Probe, ProbeRequest, ProbeResult};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetCheck {
    #[serde(flatten)]
    pub result: ProbeResult,
    /// Body size in bytes; absent when nothing came back.
    pub bytes: Option<usize>,
}

/// Fetch each asset in turn from `base_url`.
pub async fn check_assets(probe: &dyn Probe, base_url: &str, assets: &[String], timeout: Duration) -> Vec<AssetCheck> {
    let mut checks = Vec::with_capacity(assets.len());
    for asset in assets {
        let response = probe.probe(&ProbeRequest::get(base_url, asset, timeout)).await;
        let check = AssetCheck {
            bytes: response.body.as_ref().map(String::len),
            result: response.result.with_context("assets"),
        };
        match check.result.failure_reason() {
            None => info!(
                asset = %asset,
                status = check.result.status_code(),
                bytes = check.bytes.unwrap_or_default(),
                latency_ms = %format!("{:.1}", duration_ms(check.result.latency())),
                "Asset loaded"
            ),
            Some(reason) => warn!(asset = %asset, %reason, "Asset failed"),
        }
        checks.push(check);
    }
    checks
}
