use super::{Method, Probe, ProbeError, ProbeErrorKind, ProbeRequest, ProbeResponse, ProbeResult};
use chrono::Utc;
use reqwest::Client;
use std::time::Instant;
use tracing::trace;

/// HTTP probe: one request, wall-clock latency including the body read.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("omniprobe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Probe for HttpProber {
    async fn probe(&self, request: &ProbeRequest) -> ProbeResponse {
        let url = request.url();
        let method = request.method;

        let mut builder = self
            .client
            .request(to_reqwest(method), &url)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let outcome = match builder.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                // Drain the body so latency covers the full response.
                resp.text().await.map(|text| (status, text))
            }
            Err(e) => Err(e),
        };
        let latency = start.elapsed();

        match outcome {
            Ok((status, text)) => {
                trace!(%url, %method, status, latency_ms = latency.as_millis() as u64, "probe finished");
                ProbeResponse {
                    result: ProbeResult::completed(&request.endpoint, method, status, latency, started_at),
                    body: Some(text),
                }
            }
            Err(e) => {
                let error = classify(&e);
                trace!(%url, %method, error = %error, "probe failed");
                ProbeResponse {
                    result: ProbeResult::failed(&request.endpoint, method, error, latency, started_at),
                    body: None,
                }
            }
        }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

fn classify(e: &reqwest::Error) -> ProbeError {
    let kind = if e.is_timeout() {
        ProbeErrorKind::Timeout
    } else if e.is_connect() {
        ProbeErrorKind::Connect
    } else {
        ProbeErrorKind::Transport
    };
    ProbeError::new(kind, e.to_string())
}
