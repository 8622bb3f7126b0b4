use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::metric::RequestMetric;

/// Identity of a load-generating worker.
pub type WorkerId = usize;

/// Statistics for a single worker's bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadStats {
    pub requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub avg_response_time: f64,
    pub max_response_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyReport {
    /// Distinct workers that recorded at least one observation.
    pub concurrent_threads: usize,
    pub total_requests: u64,
    pub per_thread_stats: BTreeMap<WorkerId, ThreadStats>,
    /// Workers whose bucket holds at least one failed observation.
    pub threads_with_errors: usize,
}

/// Collector that keeps each worker's observations in its own bucket, so
/// per-worker attribution can be checked after a concurrent run.
#[derive(Default)]
pub struct ConcurrentMetricsCollector {
    buckets: Mutex<HashMap<WorkerId, Vec<RequestMetric>>>,
}

impl ConcurrentMetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_thread_metric(&self, worker_id: WorkerId, metric: RequestMetric) {
        self.buckets.lock().entry(worker_id).or_default().push(metric);
    }

    pub fn concurrency_report(&self) -> ConcurrencyReport {
        let buckets = self.buckets.lock().clone();

        let per_thread_stats: BTreeMap<WorkerId, ThreadStats> = buckets
            .iter()
            .filter(|(_, metrics)| !metrics.is_empty())
            .map(|(&id, metrics)| (id, thread_stats(metrics)))
            .collect();

        ConcurrencyReport {
            concurrent_threads: buckets.len(),
            total_requests: buckets.values().map(|m| m.len() as u64).sum(),
            threads_with_errors: per_thread_stats.values().filter(|s| s.failed > 0).count(),
            per_thread_stats,
        }
    }
}

fn thread_stats(metrics: &[RequestMetric]) -> ThreadStats {
    let requests = metrics.len() as u64;
    let successful = metrics.iter().filter(|m| m.is_success()).count() as u64;
    let sum: f64 = metrics.iter().map(|m| m.response_time).sum();
    let max = metrics.iter().map(|m| m.response_time).fold(f64::NEG_INFINITY, f64::max);
    ThreadStats {
        requests,
        successful,
        failed: requests - successful,
        avg_response_time: sum / requests as f64,
        max_response_time: max,
    }
}
