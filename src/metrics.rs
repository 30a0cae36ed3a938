use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed-size ring of the most recent latency samples, in nanoseconds
#[derive(Debug)]
struct Ring {
    samples: Vec<u64>,
    next: usize,
}

/// Latency percentiles over the last `capacity` recorded items.
///
/// Clones observe the same window.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    ring: Arc<Mutex<Ring>>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Arc::new(Mutex::new(Ring {
                samples: Vec::with_capacity(capacity),
                next: 0,
            })),
            capacity,
        }
    }

    /// Record one item's latency, overwriting the oldest sample once full
    pub fn record(&self, nanos: u64) {
        let mut ring = self.ring.lock();
        if ring.samples.len() < self.capacity {
            ring.samples.push(nanos);
        } else {
            let slot = ring.next;
            ring.samples[slot] = nanos;
        }
        ring.next = (ring.next + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.ring.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nearest-rank percentile in microseconds, `quantile` in `0.0..=1.0`.
    /// An empty window reports zero.
    pub fn percentile_us(&self, quantile: f64) -> f64 {
        self.percentiles_us([quantile])[0]
    }

    /// Several percentiles from a single sort of the window
    pub fn percentiles_us<const N: usize>(&self, quantiles: [f64; N]) -> [f64; N] {
        let mut sorted = self.ring.lock().samples.clone();
        if sorted.is_empty() {
            return [0.0; N];
        }
        sorted.sort_unstable();
        quantiles.map(|q| {
            let rank = (sorted.len() as f64 * q.clamp(0.0, 1.0)).ceil() as usize;
            sorted[rank.saturating_sub(1)] as f64 / 1_000.0
        })
    }
}

/// Counters shared between a stage (or router) and whoever observes it.
///
/// Cloning yields another handle onto the same counters, so a caller can keep
/// one before the owning stage is moved into its thread.
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Items forwarded downstream
    processed: Arc<AtomicU64>,
    /// Items the stage declined to forward, or a router could not deliver
    dropped: Arc<AtomicU64>,
    latency: LatencyWindow,
    start_time: Instant,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            processed: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            latency: LatencyWindow::new(1000),
            start_time: Instant::now(),
        }
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long one item took, in nanoseconds
    pub fn record_latency(&self, nanos: u64) {
        self.latency.record(nanos);
    }

    pub fn total_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Forwarded items per second since creation
    pub fn throughput_per_sec(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_processed() as f64 / elapsed
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let [p50, p95, p99] = self.latency.percentiles_us([0.50, 0.95, 0.99]);
        MetricsSnapshot {
            total_processed: self.total_processed(),
            total_dropped: self.total_dropped(),
            throughput_per_sec: self.throughput_per_sec(),
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`StageMetrics`]
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_processed: u64,
    pub total_dropped: u64,
    pub throughput_per_sec: f64,
    pub latency_p50_us: f64,
    pub latency_p95_us: f64,
    pub latency_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format as a single human-readable line
    pub fn format(&self) -> String {
        format!(
            "Processed: {}, Dropped: {}, Throughput: {:.2} items/s, \
             Latency P50: {:.2}µs, P95: {:.2}µs, P99: {:.2}µs, Elapsed: {:.2}s",
            self.total_processed,
            self.total_dropped,
            self.throughput_per_sec,
            self.latency_p50_us,
            self.latency_p95_us,
            self.latency_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}
