use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::seconds_between;
use crate::metric::RequestMetric;

/// Percentile ranks tracked in every report.
pub const PERCENTILE_RANKS: [u8; 4] = [50, 90, 95, 99];

/// Aggregated view of one test window. Owned and detached from the collector
/// that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub test_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Seconds, over every observation including failures.
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    /// Rank → response time (seconds). Empty when there were no observations.
    pub percentiles: BTreeMap<u8, f64>,
    pub requests_per_second: f64,
    /// Percentage of failed requests, 0–100.
    pub error_rate: f64,
    /// Error category → occurrences.
    pub errors: BTreeMap<String, u64>,
}

impl PerformanceReport {
    /// A report with no observations: every count and statistic is zero.
    pub fn empty(test_name: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            test_name: test_name.to_string(),
            start_time,
            end_time,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            avg_response_time: 0.0,
            min_response_time: 0.0,
            max_response_time: 0.0,
            percentiles: BTreeMap::new(),
            requests_per_second: 0.0,
            error_rate: 0.0,
            errors: BTreeMap::new(),
        }
    }

    /// Aggregate `metrics` over the window `[start_time, end_time]`.
    pub fn summarize(
        test_name: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        metrics: &[RequestMetric],
    ) -> Self {
        if metrics.is_empty() {
            return Self::empty(test_name, start_time, end_time);
        }

        let total = metrics.len() as u64;
        let successful = metrics.iter().filter(|m| m.is_success()).count() as u64;
        let failed = total - successful;

        let mut response_times: Vec<f64> = metrics.iter().map(|m| m.response_time).collect();
        response_times.sort_unstable_by(f64::total_cmp);

        let sum: f64 = response_times.iter().sum();
        let percentiles = PERCENTILE_RANKS
            .iter()
            .filter_map(|&rank| percentile(&response_times, rank as f64).map(|v| (rank, v)))
            .collect();

        let duration = seconds_between(start_time, end_time);
        let requests_per_second = if duration > 0.0 { total as f64 / duration } else { 0.0 };

        let mut errors = BTreeMap::new();
        for category in metrics.iter().filter_map(RequestMetric::error_category) {
            *errors.entry(category).or_insert(0) += 1;
        }

        Self {
            test_name: test_name.to_string(),
            start_time,
            end_time,
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            avg_response_time: sum / total as f64,
            min_response_time: response_times[0],
            max_response_time: response_times[response_times.len() - 1],
            percentiles,
            requests_per_second,
            error_rate: failed as f64 / total as f64 * 100.0,
            errors,
        }
    }

    /// `end_time - start_time` in seconds (negative if the window is inverted).
    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.start_time, self.end_time)
    }

    /// Percentage of successful requests; 0 when nothing was recorded.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }

    pub fn percentile(&self, rank: u8) -> Option<f64> {
        self.percentiles.get(&rank).copied()
    }
}

/// Percentile of an ascending-sorted slice, `rank` in 0–100.
///
/// Uses the `(n + 1) * p` position with linear interpolation between the
/// neighbouring order statistics. The position is clamped to `[1, n]`, so the
/// result never leaves the observed range. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], rank: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let position = ((n as f64 + 1.0) * rank / 100.0).clamp(1.0, n as f64);
    let lower = position.floor() as usize;
    let fraction = position - position.floor();
    let lo = sorted[lower - 1];
    if fraction == 0.0 || lower >= n {
        return Some(lo);
    }
    let hi = sorted[lower];
    Some(lo + fraction * (hi - lo))
}
