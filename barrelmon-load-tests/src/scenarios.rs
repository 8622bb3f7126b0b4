use barrelmon_client::{ApiClient, Exchange};
use barrelmon_common::config::RateLimitTest;
use barrelmon_common::{NewBarrel, NewMeasurement, Result};
use barrelmon_metrics::clock::epoch_seconds;
use barrelmon_metrics::{MetricsCollector, PerformanceReport};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::data::TestDataFactory;
use crate::worker::{cleanup, created_barrel_id, observe};
use crate::workload::Op;

/// Upper bound on in-flight creates during a batch.
pub const MAX_BATCH_CONCURRENCY: usize = 10;

/// Barrels a measurement batch rotates over.
pub const MEASUREMENT_BATCH_BARRELS: usize = 5;

/// Statuses that suggest the API is shedding or throttling load.
pub const RATE_LIMIT_STATUSES: [u16; 3] = [429, 502, 503];

pub struct BatchOutcome {
    pub report: PerformanceReport,
    pub requested: usize,
    pub created: usize,
}

impl BatchOutcome {
    /// Created barrels as a percentage of those requested.
    pub fn creation_rate(&self) -> f64 {
        if self.requested == 0 {
            return 0.0;
        }
        self.created as f64 / self.requested as f64 * 100.0
    }
}

/// A single producer creating barrels at a fixed rate; each created barrel is
/// deleted straight away without being recorded.
pub async fn run_burst(client: &ApiClient, data: &TestDataFactory, burst: &RateLimitTest) -> PerformanceReport {
    let collector = MetricsCollector::new(format!("burst_{}", burst.name));
    let total = u64::from(burst.requests_per_second) * burst.duration_secs;
    let mut ticker = (burst.requests_per_second > 0).then(|| {
        tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(burst.requests_per_second)))
    });

    collector.start_test();
    for _ in 0..total {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }
        let started_at = epoch_seconds(Utc::now());
        let outcome = client.create_barrel(&data.barrel()).await;
        collector.record_metric(observe(Op::CreateBarrel, &outcome).at(started_at));

        if let Some(id) = outcome.as_ref().ok().and_then(created_barrel_id) {
            cleanup(client, vec![id]).await;
        }
    }
    collector.end_test();

    let report = collector.generate_report();
    let signals = rate_limit_signals(&report);
    if signals > 0 {
        tracing::warn!(test = %report.test_name, responses = signals, "rate limiting observed");
    }
    report
}

/// Create `batch_size` barrels at once, at most [`MAX_BATCH_CONCURRENCY`] in flight,
/// then delete whatever was created.
pub async fn run_batch(client: Arc<ApiClient>, data: &TestDataFactory, batch_size: usize) -> BatchOutcome {
    let collector = Arc::new(MetricsCollector::new(format!("batch_create_{batch_size}")));
    let items = (0..batch_size).map(|_| BatchItem::Barrel(data.barrel())).collect();

    collector.start_test();
    let succeeded = send_batch(&client, &collector, items).await;
    collector.end_test();

    let created: Vec<String> = succeeded.iter().filter_map(created_barrel_id).collect();
    let outcome = BatchOutcome { report: collector.generate_report(), requested: batch_size, created: created.len() };
    cleanup(&client, created).await;
    outcome
}

/// Create `batch_size` measurements at once, rotating over
/// [`MEASUREMENT_BATCH_BARRELS`] barrels made for the purpose. Setting up the
/// barrels is not recorded; they are deleted afterwards.
pub async fn run_batch_measurements(
    client: Arc<ApiClient>,
    data: &TestDataFactory,
    batch_size: usize,
) -> Result<BatchOutcome> {
    let mut barrels = Vec::with_capacity(MEASUREMENT_BATCH_BARRELS);
    for _ in 0..MEASUREMENT_BATCH_BARRELS {
        match client.create_barrel_typed(&data.barrel()).await {
            Ok(barrel) => barrels.push(barrel.id),
            Err(e) => {
                cleanup(&client, barrels).await;
                return Err(e);
            }
        }
    }

    let mut rng = StdRng::from_entropy();
    let items = (0..batch_size)
        .map(|i| BatchItem::Measurement(data.measurement(&barrels[i % barrels.len()], &mut rng)))
        .collect();
    let collector = Arc::new(MetricsCollector::new(format!("batch_measurements_{batch_size}")));

    collector.start_test();
    let succeeded = send_batch(&client, &collector, items).await;
    collector.end_test();

    let outcome =
        BatchOutcome { report: collector.generate_report(), requested: batch_size, created: succeeded.len() };
    cleanup(&client, barrels).await;
    Ok(outcome)
}

enum BatchItem {
    Barrel(NewBarrel),
    Measurement(NewMeasurement),
}

/// Send every item with at most [`MAX_BATCH_CONCURRENCY`] in flight, recording
/// each exchange. Returns the successful ones.
async fn send_batch(client: &Arc<ApiClient>, collector: &Arc<MetricsCollector>, items: Vec<BatchItem>) -> Vec<Exchange> {
    let permits = Arc::new(Semaphore::new(items.len().clamp(1, MAX_BATCH_CONCURRENCY)));
    let mut tasks = JoinSet::new();
    for item in items {
        let client = client.clone();
        let collector = collector.clone();
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok()?;
            let started_at = epoch_seconds(Utc::now());
            let (op, outcome) = match &item {
                BatchItem::Barrel(barrel) => (Op::CreateBarrel, client.create_barrel(barrel).await),
                BatchItem::Measurement(measurement) => {
                    (Op::CreateMeasurement, client.create_measurement(measurement).await)
                }
            };
            collector.record_metric(observe(op, &outcome).at(started_at));
            outcome.ok().filter(Exchange::is_success)
        });
    }

    let mut succeeded = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(exchange)) => succeeded.push(exchange),
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "batch task panicked"),
        }
    }
    succeeded
}

/// Number of responses whose status is one of [`RATE_LIMIT_STATUSES`].
pub fn rate_limit_signals(report: &PerformanceReport) -> u64 {
    RATE_LIMIT_STATUSES
        .iter()
        .filter_map(|status| report.errors.get(&format!("HTTP_{status}")))
        .sum()
}
