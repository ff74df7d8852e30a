use crate::probes::{Probe, ProbeRequest, ProbeResult};
use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// Parameters for a fixed-duration load window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SustainedSpec {
    pub duration: Duration,
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SustainedOutcome {
    pub results: Vec<ProbeResult>,
    pub batches: u64,
    pub elapsed: Duration,
}

impl SustainedOutcome {
    pub fn requests(&self) -> usize {
        self.results.len()
    }
}

/// Keep dispatching batches of randomly chosen endpoints until `spec.duration` has passed.
///
/// The deadline is checked at batch boundaries only: a batch that starts before
/// the deadline runs to completion. A zero duration issues no batches.
/// Endpoint picks are uniform with replacement, drawn from `rng`.
pub async fn run_sustained<R: Rng>(
    probe: &dyn Probe,
    base_url: &str,
    spec: &SustainedSpec,
    timeout: Duration,
    rng: &mut R,
) -> SustainedOutcome {
    info!(
        duration_secs = spec.duration.as_secs_f64(),
        batch_size = spec.batch_size,
        "Sustained load started"
    );

    let start = Instant::now();
    let deadline = start + spec.duration;
    let mut results = Vec::new();
    let mut batches = 0u64;

    if spec.endpoints.is_empty() || spec.batch_size == 0 {
        warn!("Sustained load has nothing to send");
    } else {
        while Instant::now() < deadline {
            let requests: Vec<ProbeRequest> = (0..spec.batch_size)
                .filter_map(|_| spec.endpoints.choose(rng))
                .map(|endpoint| ProbeRequest::get(base_url, endpoint, timeout))
                .collect();

            let batch = join_all(requests.iter().map(|r| probe.probe(r))).await;
            results.extend(batch.into_iter().map(|r| r.result));
            batches += 1;

            if Instant::now() >= deadline {
                break;
            }
            sleep(spec.inter_batch_delay).await;
        }
    }

    let elapsed = start.elapsed();
    info!(
        requests = results.len(),
        batches,
        elapsed_secs = %format!("{:.2}", elapsed.as_secs_f64()),
        "Sustained load completed"
    );

    SustainedOutcome {
        results,
        batches,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::{Method, ProbeResponse};
    use chrono::Utc;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    struct Fixed(Duration);

    #[async_trait::async_trait]
    impl Probe for Fixed {
        async fn probe(&self, request: &ProbeRequest) -> ProbeResponse {
            sleep(self.0).await;
            ProbeResponse {
                result: ProbeResult::completed(&request.endpoint, Method::Get, 200, self.0, Utc::now()),
                body: None,
            }
        }
    }

    fn spec(duration: Duration) -> SustainedSpec {
        SustainedSpec {
            duration,
            batch_size: 10,
            inter_batch_delay: Duration::from_millis(100),
            endpoints: vec!["/health".into(), "/api/status".into(), "/api/github/status".into()],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_returns_immediately() {
        let probe = Fixed(Duration::from_millis(10));
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = run_sustained(&probe, "http://stub", &spec(Duration::ZERO), Duration::from_secs(1), &mut rng).await;

        assert!(outcome.batches <= 1);
        assert_eq!(outcome.requests() as u64, outcome.batches * 10);
        assert!(outcome.elapsed < Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_deadline() {
        // Each cycle is 50ms of probing plus 100ms delay: 150ms.
        let probe = Fixed(Duration::from_millis(50));
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = run_sustained(&probe, "http://stub", &spec(Duration::from_secs(1)), Duration::from_secs(1), &mut rng).await;

        // Batches start at 0, 150, ..., 900ms -> 7 batches, the last ending at 950ms.
        assert_eq!(outcome.batches, 7);
        assert_eq!(outcome.requests(), 70);
        assert!(outcome.elapsed >= Duration::from_secs(1));
        assert!(outcome.elapsed < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_batch_finishes_past_deadline() {
        let probe = Fixed(Duration::from_millis(400));
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = run_sustained(&probe, "http://stub", &spec(Duration::from_millis(100)), Duration::from_secs(1), &mut rng).await;

        assert_eq!(outcome.batches, 1);
        assert_eq!(outcome.requests(), 10);
        assert!(outcome.elapsed >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_rng_controls_selection() {
        let probe = Fixed(Duration::from_millis(10));
        let mut always_first = StepRng::new(0, 0);
        let outcome = run_sustained(&probe, "http://stub", &spec(Duration::from_millis(50)), Duration::from_secs(1), &mut always_first).await;
        assert!(outcome.results.iter().all(|r| r.endpoint() == "/health"));

        let mut seeded = StdRng::seed_from_u64(42);
        let outcome = run_sustained(&probe, "http://stub", &spec(Duration::from_secs(1)), Duration::from_secs(1), &mut seeded).await;
        let seen: HashSet<_> = outcome.results.iter().map(|r| r.endpoint().to_string()).collect();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_candidates() {
        let probe = Fixed(Duration::from_millis(10));
        let mut s = spec(Duration::from_secs(1));
        s.endpoints.clear();
        let mut rng = StdRng::seed_from_u64(0);
        let outcome = run_sustained(&probe, "http://stub", &s, Duration::from_secs(1), &mut rng).await;
        assert_eq!(outcome.batches, 0);
        assert!(outcome.results.is_empty());
    }
}
