use std::sync::Arc;
use std::thread;

use barrelmon_metrics::{ManualClock, MetricsCollector, Observation, RealTimeStats};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn collector_at(start: DateTime<Utc>) -> (MetricsCollector, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    (MetricsCollector::with_clock("scenario", clock.clone()), clock)
}

fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!((actual - expected).abs() < tolerance, "expected {expected}, got {actual}");
}

#[test]
fn test_report_over_one_second_window() {
    let (collector, clock) = collector_at(t0());
    collector.start_test();
    collector.record(Observation::new("POST", "/barrels", 201, 0.10));
    collector.record(Observation::new("POST", "/barrels", 201, 0.20));
    collector.record(Observation::new("POST", "/barrels", 500, 0.30));
    clock.advance(Duration::seconds(1));
    collector.end_test();

    let report = collector.generate_report();
    assert_eq!(report.test_name, "scenario");
    assert_eq!(report.start_time, t0());
    assert_eq!(report.end_time, t0() + Duration::seconds(1));
    assert_eq!(report.total_requests, 3);
    assert_eq!(report.successful_requests, 2);
    assert_eq!(report.failed_requests, 1);
    assert_close(report.error_rate, 33.333, 0.001);
    assert_close(report.avg_response_time, 0.20, 1e-9);
    assert_close(report.min_response_time, 0.10, 1e-9);
    assert_close(report.max_response_time, 0.30, 1e-9);
    assert_close(report.requests_per_second, 3.0, 1e-9);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors["HTTP_500"], 1);
}

#[test]
fn test_transport_failure_is_categorised_by_description() {
    let (collector, clock) = collector_at(t0());
    collector.start_test();
    collector.record(Observation::new("GET", "/x", 0, 0.0).with_error("ConnectionRefused"));
    clock.advance(Duration::seconds(1));
    collector.end_test();

    let report = collector.generate_report();
    assert_eq!(report.failed_requests, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors["ConnectionRefused"], 1);
}

#[test]
fn test_never_used_collector_reports_empty() {
    let (collector, _clock) = collector_at(t0());
    let report = collector.generate_report();
    assert_eq!(report.total_requests, 0);
    assert_eq!(report.requests_per_second, 0.0);
    assert!(report.percentiles.is_empty());
    assert_eq!(report.start_time, t0());
    assert_eq!(report.end_time, t0());
}

#[test]
fn test_report_without_end_is_empty() {
    let (collector, _clock) = collector_at(t0());
    collector.start_test();
    collector.record(Observation::new("GET", "/barrels", 200, 0.1));

    let report = collector.generate_report();
    assert_eq!(report.total_requests, 0);
    assert_eq!(report.start_time, t0());
}

#[test]
fn test_generate_report_is_idempotent() {
    let (collector, clock) = collector_at(t0());
    assert_eq!(collector.generate_report(), collector.generate_report());

    collector.start_test();
    for i in 0..20 {
        collector.record(Observation::new("GET", "/barrels", if i % 5 == 0 { 503 } else { 200 }, i as f64 / 100.0));
        clock.advance(Duration::milliseconds(50));
    }
    collector.end_test();
    assert_eq!(collector.generate_report(), collector.generate_report());
}

#[test]
fn test_report_is_detached_from_later_records() {
    let (collector, clock) = collector_at(t0());
    collector.start_test();
    collector.record(Observation::new("GET", "/barrels", 200, 0.1));
    clock.advance(Duration::seconds(1));
    collector.end_test();

    let report = collector.generate_report();
    let snapshot = report.clone();
    collector.record(Observation::new("GET", "/barrels", 500, 9.0));

    assert_eq!(report, snapshot);
    assert_eq!(collector.generate_report().total_requests, 2);
}

#[test]
fn test_start_test_clears_previous_observations() {
    let (collector, clock) = collector_at(t0());
    collector.start_test();
    collector.record(Observation::new("GET", "/barrels", 500, 1.0));
    collector.end_test();

    clock.advance(Duration::seconds(10));
    collector.start_test();
    collector.record(Observation::new("GET", "/barrels", 200, 0.5));
    clock.advance(Duration::seconds(2));
    collector.end_test();

    let report = collector.generate_report();
    assert_eq!(report.total_requests, 1);
    assert_eq!(report.failed_requests, 0);
    assert_eq!(report.start_time, t0() + Duration::seconds(10));
    assert_close(report.requests_per_second, 0.5, 1e-9);
}

#[test]
fn test_concurrent_records_are_never_lost() {
    const WORKERS: usize = 8;
    const PER_WORKER: usize = 500;

    let collector = MetricsCollector::new("contention");
    collector.start_test();
    thread::scope(|s| {
        for w in 0..WORKERS {
            let collector = &collector;
            s.spawn(move || {
                for i in 0..PER_WORKER {
                    let status = if (w + i) % 4 == 0 { 500 } else { 201 };
                    collector.record(Observation::new("POST", "/barrels", status, 0.01));
                }
            });
        }
    });
    collector.end_test();

    let report = collector.generate_report();
    let expected_failed = (0..WORKERS)
        .flat_map(|w| (0..PER_WORKER).map(move |i| (w + i) % 4 == 0))
        .filter(|&failed| failed)
        .count() as u64;

    assert_eq!(report.total_requests, (WORKERS * PER_WORKER) as u64);
    assert_eq!(report.failed_requests, expected_failed);
    assert_eq!(report.successful_requests + report.failed_requests, report.total_requests);
    assert_eq!(report.errors["HTTP_500"], expected_failed);
}

#[test]
fn test_concurrent_records_through_arc() {
    let collector = Arc::new(MetricsCollector::new("arc"));
    collector.start_test();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let collector = Arc::clone(&collector);
            thread::spawn(move || {
                for _ in 0..250 {
                    collector.record(Observation::transport_failure("GET", "/barrels", "timeout"));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    collector.end_test();

    let report = collector.generate_report();
    assert_eq!(report.total_requests, 1000);
    assert_eq!(report.error_rate, 100.0);
    assert_eq!(report.errors["timeout"], 1000);
}

// --- real_time_stats ---

#[test]
fn test_real_time_stats_empty() {
    let (collector, _clock) = collector_at(t0());
    assert_eq!(collector.real_time_stats(), RealTimeStats::default());
}

#[test]
fn test_real_time_stats_cover_last_hundred() {
    let (collector, clock) = collector_at(t0());
    collector.start_test();
    for _ in 0..50 {
        collector.record(Observation::new("GET", "/barrels", 500, 1.0));
        clock.advance(Duration::milliseconds(500));
    }
    for _ in 0..100 {
        collector.record(Observation::new("GET", "/barrels", 200, 0.2));
        clock.advance(Duration::milliseconds(500));
    }

    let stats = collector.real_time_stats();
    assert_eq!(stats.total_requests, 150);
    assert_close(stats.recent_avg_response_time, 0.2, 1e-9);
    assert_eq!(stats.recent_error_rate, 0.0);
    // Last 10 observations span 9 intervals of 0.5 s.
    assert_close(stats.requests_per_second_estimate, 2.0, 1e-4);
}

#[test]
fn test_real_time_stats_short_history() {
    let (collector, clock) = collector_at(t0());
    collector.start_test();
    collector.record(Observation::new("GET", "/barrels", 200, 0.1));

    let stats = collector.real_time_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.requests_per_second_estimate, 0.0);

    collector.record(Observation::new("GET", "/barrels", 404, 0.3));
    let stats = collector.real_time_stats();
    assert_close(stats.recent_avg_response_time, 0.2, 1e-9);
    assert_close(stats.recent_error_rate, 50.0, 1e-9);
    // Same timestamp: no span to divide by.
    assert_eq!(stats.requests_per_second_estimate, 0.0);

    clock.advance(Duration::seconds(2));
    collector.record(Observation::new("GET", "/barrels", 200, 0.2));
    assert_close(collector.real_time_stats().requests_per_second_estimate, 1.0, 1e-4);
}
