//! Session metrics: per-attempt ids, rolling histograms keyed by metric name,
//! and a stopwatch for short timings. The sample count of a histogram doubles
//! as its event counter.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Identifiers attached to every log line of an attempt.
#[derive(Debug, Clone)]
pub struct AttemptIds {
    pub attempt_id: String,
    pub generation: u64,
}

impl AttemptIds {
    pub fn new(generation: u64) -> Self {
        let attempt_id = uuid::Uuid::new_v4().to_string();
        Self {
            attempt_id,
            generation,
        }
    }
}

/// Stopwatch for one metric; records microseconds when finished. Dropping it
/// unfinished records nothing.
pub struct TimingSpan {
    metric: &'static str,
    started: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn finish(self) -> f64 {
        let micros = self.started.elapsed().as_secs_f64() * 1_000_000.0;
        self.registry.record(self.metric, micros);
        micros
    }
}

/// Most recent `limit` samples of one metric plus a lifetime count.
struct Window {
    recent: VecDeque<f64>,
    limit: usize,
    seen: u64,
}

impl Window {
    fn with_limit(limit: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(limit),
            limit,
            seen: 0,
        }
    }

    fn add(&mut self, value: f64) {
        if self.recent.len() == self.limit {
            self.recent.pop_front();
        }
        self.recent.push_back(value);
        self.seen += 1;
    }

    /// Nearest-rank percentile over the retained samples; 0 when empty.
    fn quantile(&self, pct: f64) -> f64 {
        let n = self.recent.len();
        if n == 0 {
            return 0.0;
        }
        let mut values: Vec<f64> = self.recent.iter().copied().collect();
        let rank = ((pct.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64).round() as usize;
        let (_, nth, _) = values.select_nth_unstable_by(rank, f64::total_cmp);
        *nth
    }

    fn summarize(&self) -> MetricSummary {
        MetricSummary {
            p50: self.quantile(50.0),
            p95: self.quantile(95.0),
            p99: self.quantile(99.0),
            count: self.seen,
        }
    }
}

/// Named rolling histograms, shared by the controller and whoever reports.
pub struct MetricsRegistry {
    windows: Mutex<HashMap<&'static str, Window>>,
    window_limit: usize,
}

impl MetricsRegistry {
    pub const DEFAULT_WINDOW: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_WINDOW)
    }

    /// Keep at most `window_limit` samples per metric for percentiles.
    pub fn with_capacity(window_limit: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_limit: window_limit.max(1),
        }
    }

    pub fn record(&self, metric: &'static str, value: f64) {
        self.windows
            .lock()
            .entry(metric)
            .or_insert_with(|| Window::with_limit(self.window_limit))
            .add(value);
        tracing::trace!(metric, value, "metric_recorded");
    }

    pub fn span(self: &Arc<Self>, metric: &'static str) -> TimingSpan {
        TimingSpan {
            metric,
            started: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Percentile (0-100) over the retained samples of `metric`.
    pub fn percentile(&self, metric: &str, pct: f64) -> f64 {
        self.windows
            .lock()
            .get(metric)
            .map_or(0.0, |w| w.quantile(pct))
    }

    /// Samples ever recorded under `metric`.
    pub fn count(&self, metric: &str) -> u64 {
        self.windows.lock().get(metric).map_or(0, |w| w.seen)
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.windows
            .lock()
            .iter()
            .map(|(&metric, w)| (metric.to_string(), w.summarize()))
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: u64,
}

/// Metric names. Timings in microseconds unless suffixed `_ms`.
pub mod metric_names {
    pub const SOURCE_START: &str = "t_source_start";
    pub const MATCH_EVAL: &str = "t_match_eval";
    pub const ATTEMPT_SUCCESS_MS: &str = "t_attempt_success_ms";
    pub const ATTEMPT_TIMED_OUT_MS: &str = "t_attempt_timed_out_ms";
    pub const SOFT_FAILURE_MS: &str = "t_soft_failure_ms";
    pub const SOURCE_UNAVAILABLE: &str = "source_unavailable";
}
