//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Hand out named meters and timers, created on first use
//! - Keep process-lifetime totals readable in-process (health, tests)
//! - Forward every update to the `metrics` facade for Prometheus scraping
//!
//! # Metrics
//! - `<receiver>.<exchange>.success-response` (meter)
//! - `<receiver>.<exchange>.interceptor-abort-exceptions` (meter)
//! - `<receiver>.<exchange>.interceptor-exceptions` (meter)
//! - `<receiver>.<exchange>.request-timer` (timer)
//! - `<interceptor>.execute` (timer, inclusive of everything the interceptor proceeds into)
//! - `router.bad-request`, `router.not-found`, `router.method-not-allowed` (meters)
//!
//! # Design Decisions
//! - Updates are lock-free atomics; only first registration touches the map
//! - Names are hierarchical and dot-separated

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Monotonic event counter.
pub struct Meter {
    name: String,
    count: AtomicU64,
    counter: metrics::Counter,
}

impl Meter {
    fn new(name: String) -> Self {
        let counter = metrics::counter!(name.clone());
        Self {
            name,
            count: AtomicU64::new(0),
            counter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
        self.counter.increment(n);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Latency recorder.
pub struct Timer {
    name: String,
    count: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
    histogram: metrics::Histogram,
}

impl Timer {
    fn new(name: String) -> Self {
        let histogram = metrics::histogram!(name.clone());
        Self {
            name,
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            max_nanos: AtomicU64::new(0),
            histogram,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start timing; the elapsed time is recorded when the guard drops.
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            started: Instant::now(),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
        self.histogram.record(elapsed.as_secs_f64());
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }

    pub fn max(&self) -> Duration {
        Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed))
    }

    pub fn mean(&self) -> Duration {
        match self.count() {
            0 => Duration::ZERO,
            n => self.total() / u32::try_from(n).unwrap_or(u32::MAX),
        }
    }
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter")
            .field("name", &self.name)
            .field("count", &self.count())
            .finish()
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("count", &self.count())
            .field("mean", &self.mean())
            .field("max", &self.max())
            .finish()
    }
}

/// RAII guard returned by [`Timer::time`].
#[must_use = "the timing is recorded when the guard is dropped"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    started: Instant,
}

impl TimerContext<'_> {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        self.timer.record(self.started.elapsed());
    }
}

/// Process-wide registry of named meters and timers.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    meters: DashMap<String, Arc<Meter>>,
    timers: DashMap<String, Arc<Timer>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join name parts with dots, skipping empty parts.
    pub fn name(parts: &[&str]) -> String {
        parts
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn meter(&self, name: &str) -> Arc<Meter> {
        if let Some(meter) = self.meters.get(name) {
            return Arc::clone(&meter);
        }
        Arc::clone(
            &self
                .meters
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Meter::new(name.to_string()))),
        )
    }

    pub fn timer(&self, name: &str) -> Arc<Timer> {
        if let Some(timer) = self.timers.get(name) {
            return Arc::clone(&timer);
        }
        Arc::clone(
            &self
                .timers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Timer::new(name.to_string()))),
        )
    }

    /// Current meter counts, sorted by name.
    pub fn meter_counts(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<_> = self
            .meters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().count()))
            .collect();
        counts.sort();
        counts
    }

    pub fn timer_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.timers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(MetricRegistry::name(&["bid", "", "success-response"]), "bid.success-response");
    }

    #[test]
    fn test_meters_are_shared_by_name() {
        let registry = MetricRegistry::new();
        registry.meter("a").mark();
        registry.meter("a").mark_n(2);
        registry.meter("b").mark();
        assert_eq!(registry.meter("a").count(), 3);
        assert_eq!(
            registry.meter_counts(),
            vec![("a".to_string(), 3), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn test_timer_guard_records() {
        let registry = MetricRegistry::new();
        let timer = registry.timer("t");
        {
            let _timing = timer.time();
            std::thread::sleep(Duration::from_millis(2));
        }
        timer.record(Duration::from_millis(10));
        assert_eq!(timer.count(), 2);
        assert!(timer.max() >= Duration::from_millis(10));
        assert!(timer.total() >= Duration::from_millis(12));
        assert!(timer.mean() >= Duration::from_millis(6));
        assert_eq!(registry.timer_names(), vec!["t".to_string()]);
    }
}
