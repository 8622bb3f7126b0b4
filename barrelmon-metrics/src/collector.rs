use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::{epoch_seconds, Clock, SystemClock};
use crate::metric::{Observation, RequestMetric};
use crate::report::PerformanceReport;

/// Size of the tail used for live statistics.
pub const REAL_TIME_WINDOW: usize = 100;
/// Size of the tail used for the live throughput estimate.
pub const RPS_ESTIMATE_WINDOW: usize = 10;

/// Progress snapshot over the most recent observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealTimeStats {
    /// Observations recorded since `start_test`, not just the recent window.
    pub total_requests: u64,
    pub recent_avg_response_time: f64,
    pub recent_error_rate: f64,
    pub requests_per_second_estimate: f64,
}

struct CollectorState {
    /// Append-only log in insertion order.
    metrics: Vec<RequestMetric>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

/// Thread-safe accumulator of request observations for one named scenario.
///
/// Share it between workers with `Arc<MetricsCollector>`; every method takes `&self`.
/// All state sits behind a single lock that is held only to append one record
/// or to copy the log out.
pub struct MetricsCollector {
    test_name: String,
    clock: Arc<dyn Clock>,
    created_at: DateTime<Utc>,
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self::with_clock(test_name, Arc::new(SystemClock))
    }

    pub fn with_clock(test_name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let created_at = clock.now();
        Self {
            test_name: test_name.into(),
            clock,
            created_at,
            state: Mutex::new(CollectorState { metrics: Vec::new(), start_time: None, end_time: None }),
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Open the window and drop anything recorded before.
    pub fn start_test(&self) {
        let now = self.clock.now();
        {
            let mut state = self.state.lock();
            state.start_time = Some(now);
            state.end_time = None;
            state.metrics.clear();
        }
        tracing::info!(test = %self.test_name, "started performance monitoring");
    }

    /// Close the window. Records still arriving afterwards are kept.
    pub fn end_test(&self) {
        let now = self.clock.now();
        self.state.lock().end_time = Some(now);
        tracing::info!(test = %self.test_name, "ended performance monitoring");
    }

    /// Append one observation stamped with the current time.
    pub fn record(&self, observation: Observation) {
        let metric = observation.at(epoch_seconds(self.clock.now()));
        self.state.lock().metrics.push(metric);
    }

    /// Append an observation that already carries its own timestamp.
    pub fn record_metric(&self, metric: RequestMetric) {
        self.state.lock().metrics.push(metric);
    }

    /// Aggregate everything recorded so far.
    ///
    /// Returns a zero-valued report when nothing was recorded or the window was
    /// never both started and ended.
    pub fn generate_report(&self) -> PerformanceReport {
        let (metrics, start_time, end_time) = {
            let state = self.state.lock();
            (state.metrics.clone(), state.start_time, state.end_time)
        };

        match (start_time, end_time) {
            (Some(start), Some(end)) if !metrics.is_empty() => {
                PerformanceReport::summarize(&self.test_name, start, end, &metrics)
            }
            _ => {
                tracing::warn!(
                    test = %self.test_name,
                    observations = metrics.len(),
                    started = start_time.is_some(),
                    ended = end_time.is_some(),
                    "insufficient data for performance report"
                );
                let start = start_time.or(end_time).unwrap_or(self.created_at);
                let end = end_time.or(start_time).unwrap_or(self.created_at);
                PerformanceReport::empty(&self.test_name, start, end)
            }
        }
    }

    /// Cheap progress snapshot computed over the last [`REAL_TIME_WINDOW`] observations.
    ///
    /// The tail follows global insertion order, so with several workers it
    /// interleaves their requests arbitrarily.
    pub fn real_time_stats(&self) -> RealTimeStats {
        let state = self.state.lock();
        let metrics = &state.metrics;
        if metrics.is_empty() {
            return RealTimeStats::default();
        }

        let recent = &metrics[metrics.len().saturating_sub(REAL_TIME_WINDOW)..];
        let sum: f64 = recent.iter().map(|m| m.response_time).sum();
        let failed = recent.iter().filter(|m| !m.is_success()).count();

        RealTimeStats {
            total_requests: metrics.len() as u64,
            recent_avg_response_time: sum / recent.len() as f64,
            recent_error_rate: failed as f64 / recent.len() as f64 * 100.0,
            requests_per_second_estimate: current_rps(metrics),
        }
    }
}

/// Throughput over the last [`RPS_ESTIMATE_WINDOW`] observations: intervals / span.
fn current_rps(metrics: &[RequestMetric]) -> f64 {
    let recent = &metrics[metrics.len().saturating_sub(RPS_ESTIMATE_WINDOW)..];
    if recent.len() < 2 {
        return 0.0;
    }
    let span = recent[recent.len() - 1].timestamp - recent[0].timestamp;
    if span <= 0.0 {
        return 0.0;
    }
    (recent.len() - 1) as f64 / span
}
