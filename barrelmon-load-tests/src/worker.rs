use barrelmon_client::{ApiClient, Exchange};
use barrelmon_common::{Barrel, HarnessError, Result};
use barrelmon_metrics::clock::epoch_seconds;
use barrelmon_metrics::{
    ConcurrencyReport, ConcurrentMetricsCollector, MetricsCollector, Observation, PerformanceReport, WorkerId,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::data::TestDataFactory;
use crate::workload::{Op, WorkloadProfile};

/// Shortest progress period; `tokio::time::interval` rejects zero.
const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Longest delay between one worker's requests; lower target rates are rejected.
pub const MAX_PACE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub workers: usize,
    pub duration: Duration,
    pub profile: WorkloadProfile,
    /// Aggregate request rate across all workers; `None` runs unpaced.
    pub target_rps: Option<f64>,
    pub progress_interval: Duration,
}

pub struct LoadOutcome {
    pub report: PerformanceReport,
    pub concurrency: ConcurrencyReport,
}

/// Drive the API with `settings.workers` concurrent workers until `settings.duration`
/// elapses. Every request lands in the shared collector and in its worker's bucket.
/// Barrels still alive at the end are deleted without being recorded.
///
/// Fails before issuing any request when `settings.target_rps` cannot be paced.
pub async fn run(
    client: ApiClient,
    data: TestDataFactory,
    test_name: &str,
    settings: &LoadSettings,
) -> Result<LoadOutcome> {
    let pace = pace_per_worker(settings.workers, settings.target_rps)?;
    let client = Arc::new(client);
    let collector = Arc::new(MetricsCollector::new(test_name));
    let per_worker = Arc::new(ConcurrentMetricsCollector::new());

    collector.start_test();
    let progress = spawn_progress(collector.clone(), settings.progress_interval);
    let deadline = Instant::now() + settings.duration;

    let mut tasks = JoinSet::new();
    for id in 0..settings.workers {
        let worker = Worker {
            id,
            client: client.clone(),
            collector: collector.clone(),
            per_worker: per_worker.clone(),
            data: data.clone(),
            profile: settings.profile,
        };
        tasks.spawn(worker.run_until(deadline, pace));
    }

    let mut leftovers = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(ids) => leftovers.extend(ids),
            Err(e) => tracing::error!(error = %e, "load worker panicked"),
        }
    }

    collector.end_test();
    progress.abort();
    cleanup(&client, leftovers).await;

    Ok(LoadOutcome { report: collector.generate_report(), concurrency: per_worker.concurrency_report() })
}

/// Delay between one worker's requests so that all workers together hit `target_rps`.
///
/// `Ok(None)` means unpaced: no target, or a rate too high to express as a
/// non-zero delay. A rate that is not positive, or low enough to push the
/// delay past [`MAX_PACE`], is a configuration error.
pub fn pace_per_worker(workers: usize, target_rps: Option<f64>) -> Result<Option<Duration>> {
    let Some(rps) = target_rps else {
        return Ok(None);
    };
    let out_of_range = || HarnessError::Config(format!("target rate {rps} rps is out of range"));
    if !(rps.is_finite() && rps > 0.0) {
        return Err(out_of_range());
    }
    let pace = Duration::try_from_secs_f64(workers.max(1) as f64 / rps).map_err(|_| out_of_range())?;
    if pace > MAX_PACE {
        return Err(out_of_range());
    }
    Ok(Some(pace).filter(|p| !p.is_zero()))
}

/// Turn the outcome of one call into an unstamped observation.
///
/// Any received response, whatever its status, is recorded with its status and
/// timing; a transport failure becomes a status-0 record carrying the error text.
pub fn observe(op: Op, outcome: &Result<Exchange>) -> Observation {
    match outcome {
        Ok(exchange) => Observation::new(
            op.method(),
            op.endpoint(),
            exchange.status,
            exchange.response_time.as_secs_f64(),
        )
        .with_sizes(exchange.request_size, exchange.response_size),
        Err(e) => Observation::transport_failure(op.method(), op.endpoint(), e.to_string()),
    }
}

/// Ops that target an existing barrel fall back to creating one when none is known.
pub fn resolve(op: Op, known_barrels: usize) -> Op {
    if op.needs_barrel() && known_barrels == 0 {
        Op::CreateBarrel
    } else {
        op
    }
}

/// Id of the barrel in a successful create response, if it parses.
pub fn created_barrel_id(exchange: &Exchange) -> Option<String> {
    if !exchange.is_success() {
        return None;
    }
    serde_json::from_str::<Barrel>(&exchange.body).ok().map(|b| b.id)
}

struct Worker {
    id: WorkerId,
    client: Arc<ApiClient>,
    collector: Arc<MetricsCollector>,
    per_worker: Arc<ConcurrentMetricsCollector>,
    data: TestDataFactory,
    profile: WorkloadProfile,
}

impl Worker {
    /// Issue requests until `deadline`; returns the ids of barrels it created and did not delete.
    async fn run_until(self, deadline: Instant, pace: Option<Duration>) -> Vec<String> {
        let mut rng = StdRng::from_entropy();
        let mut barrels: Vec<String> = Vec::new();
        let mut ticker = pace.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        while Instant::now() < deadline {
            if let Some(ticker) = ticker.as_mut() {
                if tokio::time::timeout_at(deadline, ticker.tick()).await.is_err() {
                    break;
                }
            }
            let op = resolve(self.profile.sample(&mut rng), barrels.len());
            self.step(op, &mut barrels, &mut rng).await;
        }
        tracing::debug!(worker = self.id, remaining = barrels.len(), "load worker finished");
        barrels
    }

    async fn step(&self, op: Op, barrels: &mut Vec<String>, rng: &mut StdRng) {
        let target = if op.needs_barrel() { Some(rng.gen_range(0..barrels.len())) } else { None };
        let started_at = epoch_seconds(Utc::now());

        let outcome = match op {
            Op::CreateBarrel => self.client.create_barrel(&self.data.barrel()).await,
            Op::ListBarrels => self.client.list_barrels().await,
            Op::ListMeasurements => self.client.list_measurements().await,
            Op::GetBarrel | Op::DeleteBarrel | Op::CreateMeasurement => {
                let Some(index) = target else { return };
                let id = barrels[index].clone();
                match op {
                    Op::GetBarrel => self.client.get_barrel(&id).await,
                    Op::DeleteBarrel => {
                        barrels.swap_remove(index);
                        self.client.delete_barrel(&id).await
                    }
                    _ => self.client.create_measurement(&self.data.measurement(&id, rng)).await,
                }
            }
        };

        let metric = observe(op, &outcome).at(started_at);
        self.collector.record_metric(metric.clone());
        self.per_worker.record_thread_metric(self.id, metric);

        if op == Op::CreateBarrel {
            if let Some(id) = outcome.as_ref().ok().and_then(created_barrel_id) {
                barrels.push(id);
            }
        }
    }
}

/// Log live statistics every `every` until aborted.
pub fn spawn_progress(collector: Arc<MetricsCollector>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(MIN_PROGRESS_INTERVAL));
        interval.tick().await; // consume the immediate first tick
        loop {
            interval.tick().await;
            let stats = collector.real_time_stats();
            tracing::info!(
                test = %collector.test_name(),
                requests = stats.total_requests,
                avg_response_ms = stats.recent_avg_response_time * 1000.0,
                error_rate = stats.recent_error_rate,
                rps = stats.requests_per_second_estimate,
                "progress"
            );
        }
    })
}

/// Best-effort deletion of barrels created during a run. Not recorded.
pub async fn cleanup(client: &ApiClient, barrel_ids: Vec<String>) -> usize {
    let total = barrel_ids.len();
    let mut deleted = 0;
    for id in barrel_ids {
        match client.delete_barrel(&id).await {
            Ok(exchange) if exchange.is_success() => deleted += 1,
            Ok(exchange) => tracing::debug!(id = %id, status = exchange.status, "cleanup delete rejected"),
            Err(e) => tracing::debug!(id = %id, error = %e, "cleanup delete failed"),
        }
    }
    if total > 0 {
        tracing::info!(deleted, total, "cleaned up barrels");
    }
    deleted
}
