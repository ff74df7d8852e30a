//! Host resource sampling (CPU, memory, disk, network, processes).

use super::{spawn_monitor, MonitorHandle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// Default ring size.
pub const DEFAULT_SAMPLE_CAPACITY: usize = 100;

/// Cumulative interface counters, summed over every interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub network: NetworkCounters,
    pub process_count: usize,
}

/// Where samples come from. The host implementation is [`SystemSource`].
pub trait ResourceSource: Send + 'static {
    fn sample(&mut self) -> ResourceSample;
}

/// Samples the local host through `sysinfo`.
pub struct SystemSource {
    sys: System,
}

impl SystemSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is a delta between two refreshes; prime the first one.
        sys.refresh_cpu_usage();
        Self { sys }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSource for SystemSource {
    fn sample(&mut self) -> ResourceSample {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.sys.refresh_processes(ProcessesToUpdate::All, true);

        let memory_percent = percent(self.sys.used_memory(), self.sys.total_memory());

        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"));
        let disk_percent = match root {
            Some(d) => percent(d.total_space().saturating_sub(d.available_space()), d.total_space()),
            None => {
                // No "/" mount (e.g. Windows): fall back to all disks combined.
                let (total, avail) = disks
                    .list()
                    .iter()
                    .fold((0u64, 0u64), |(t, a), d| (t + d.total_space(), a + d.available_space()));
                percent(total.saturating_sub(avail), total)
            }
        };

        let networks = Networks::new_with_refreshed_list();
        let network = networks
            .list()
            .values()
            .fold(NetworkCounters::default(), |mut acc, data| {
                acc.bytes_sent += data.total_transmitted();
                acc.bytes_recv += data.total_received();
                acc.packets_sent += data.total_packets_transmitted();
                acc.packets_recv += data.total_packets_received();
                acc.errors_in += data.total_errors_on_received();
                acc.errors_out += data.total_errors_on_transmitted();
                acc
            });

        ResourceSample {
            timestamp: Utc::now(),
            cpu_percent: f64::from(self.sys.global_cpu_usage()),
            memory_percent,
            disk_percent,
            network,
            process_count: self.sys.processes().len(),
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Bounded buffer of the most recent samples; the oldest is evicted on insert once full.
#[derive(Debug, Clone)]
pub struct SampleRing {
    capacity: usize,
    samples: VecDeque<ResourceSample>,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: ResourceSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&ResourceSample> {
        self.samples.back()
    }

    /// Owned copy, oldest first.
    pub fn snapshot(&self) -> Vec<ResourceSample> {
        self.samples.iter().cloned().collect()
    }
}

/// Averages over the most recent samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceAverages {
    pub avg_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub avg_disk_percent: f64,
    pub peak_cpu_percent: f64,
    pub peak_memory_percent: f64,
    pub sample_count: usize,
}

impl ResourceAverages {
    /// `None` when there are no samples to average.
    pub fn over_recent(samples: &[ResourceSample], window: usize) -> Option<Self> {
        let recent = &samples[samples.len().saturating_sub(window)..];
        if recent.is_empty() {
            return None;
        }
        let n = recent.len() as f64;
        let avg = |f: fn(&ResourceSample) -> f64| recent.iter().map(f).sum::<f64>() / n;
        let peak = |f: fn(&ResourceSample) -> f64| recent.iter().map(f).fold(0.0, f64::max);
        Some(Self {
            avg_cpu_percent: avg(|s| s.cpu_percent),
            avg_memory_percent: avg(|s| s.memory_percent),
            avg_disk_percent: avg(|s| s.disk_percent),
            peak_cpu_percent: peak(|s| s.cpu_percent),
            peak_memory_percent: peak(|s| s.memory_percent),
            sample_count: recent.len(),
        })
    }
}

pub type ResourceMonitor = MonitorHandle<Option<ResourceSample>, SampleRing>;

/// Sample `source` every `interval` into a ring of `capacity` until stopped.
///
/// Sampling reads `/proc` and friends, so it runs on the blocking pool.
pub fn spawn_resource_monitor<R: ResourceSource>(
    source: R,
    interval: Duration,
    capacity: usize,
) -> ResourceMonitor {
    spawn_monitor(None, move |mut ctx| async move {
        info!(interval_ms = interval.as_millis() as u64, capacity, "Resource sampler started");
        let mut ring = SampleRing::new(capacity);
        let mut source = Some(source);
        loop {
            let Some(mut src) = source.take() else { break };
            match tokio::task::spawn_blocking(move || {
                let sample = src.sample();
                (src, sample)
            })
            .await
            {
                Ok((src, sample)) => {
                    debug!(
                        cpu = sample.cpu_percent,
                        memory = sample.memory_percent,
                        disk = sample.disk_percent,
                        processes = sample.process_count,
                        "Resource sample"
                    );
                    ring.push(sample.clone());
                    ctx.publish(Some(sample));
                    source = Some(src);
                }
                Err(e) => {
                    warn!("Resource sampling task failed: {}", e);
                    break;
                }
            }

            if ctx.wait_or_stop(interval).await {
                break;
            }
        }
        info!(samples = ring.len(), "Resource sampler stopped");
        ring
    })
}
