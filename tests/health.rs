//! Health poller and monitor loop against a real HTTP stub.

mod common;

use std::sync::Arc;
use std::time::Duration;

use omniprobe::monitor::health::{
    poll_services, spawn_health_monitor, HealthHistory, HealthPollSettings, HealthStatus,
    ServiceTarget,
};
use omniprobe::probes::{HttpProber, Probe};

fn targets(base: &str) -> Vec<ServiceTarget> {
    vec![
        ServiceTarget::new("backend", format!("{}/ok", base)),
        ServiceTarget::new("middleware", format!("{}/health", base)),
        ServiceTarget::new("vercel", format!("{}/slow", base)),
    ]
}

#[tokio::test]
async fn test_two_healthy_one_timeout_over_three_cycles() {
    let base = common::spawn_stub().await;
    let prober = HttpProber::new().unwrap();
    let targets = targets(&base);
    let mut history = HealthHistory::new(100);

    for _ in 0..3 {
        let cycle = poll_services(&prober, &targets, 200, Duration::from_millis(200)).await;
        let healthy = cycle.iter().filter(|s| s.status == HealthStatus::Healthy).count();
        let errors: Vec<_> = cycle.iter().filter(|s| s.status == HealthStatus::Error).collect();
        assert_eq!(healthy, 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].service, "vercel");
        assert!(errors[0].status_code.is_none());
        history.record(cycle);
    }

    let overall = history.overall_availability(10).unwrap();
    assert!((overall - 66.7).abs() < 0.1, "overall {}", overall);
    let per_service = history.availability(10);
    assert_eq!(per_service["backend"], 100.0);
    assert_eq!(per_service["vercel"], 0.0);
}

#[tokio::test]
async fn test_non_expected_status_is_unhealthy() {
    let base = common::spawn_stub().await;
    let prober = HttpProber::new().unwrap();
    let targets = vec![ServiceTarget::new("broken", format!("{}/fail", base))];

    let cycle = poll_services(&prober, &targets, 200, Duration::from_secs(1)).await;

    assert_eq!(cycle[0].status, HealthStatus::Unhealthy);
    assert_eq!(cycle[0].status_code, Some(500));
}

#[tokio::test]
async fn test_unreachable_service_is_error() {
    let base = common::closed_port_url().await;
    let prober = HttpProber::new().unwrap();
    let targets = vec![ServiceTarget::new("gone", base)];

    let cycle = poll_services(&prober, &targets, 200, Duration::from_secs(1)).await;

    assert_eq!(cycle[0].status, HealthStatus::Error);
    assert!(cycle[0].error.is_some());
}

#[tokio::test]
async fn test_monitor_keeps_polling_until_stopped() {
    let base = common::spawn_stub().await;
    let probe: Arc<dyn Probe> = Arc::new(HttpProber::new().unwrap());
    let monitor = spawn_health_monitor(
        probe,
        vec![ServiceTarget::new("backend", format!("{}/ok", base))],
        HealthPollSettings {
            interval: Duration::from_millis(50),
            timeout: Duration::from_secs(1),
            expected_status: 200,
            history_capacity: 100,
        },
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    monitor.stop();
    monitor.stop();
    let latest = monitor.latest();
    let history = monitor.join().await.unwrap();

    assert!(history.cycles() >= 2, "cycles {}", history.cycles());
    assert_eq!(latest.len(), 1);
    assert_eq!(history.latest()[0].status, HealthStatus::Healthy);
    assert_eq!(history.overall_availability(100), Some(100.0));
}
