use barrelmon_metrics::report::{percentile, PERCENTILE_RANKS};
use barrelmon_metrics::{Observation, PerformanceReport, RequestMetric};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn metric(status: u16, response_time: f64) -> RequestMetric {
    Observation::new("POST", "/barrels", status, response_time).at(0.0)
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

// --- percentile ---

#[test]
fn test_percentile_empty_is_none() {
    assert_eq!(percentile(&[], 50.0), None);
}

#[test]
fn test_percentile_single_value_fills_every_rank() {
    for rank in PERCENTILE_RANKS {
        assert_eq!(percentile(&[0.7], rank as f64), Some(0.7));
    }
}

#[test]
fn test_percentile_interpolates_between_order_statistics() {
    // n=10, position = 11 * p
    // p50: 5.5  → 5 + 0.5 * (6 - 5) = 5.5
    // p90: 9.9  → 9 + 0.9 * (10 - 9) = 9.9
    // p95: 10.45 → clamped to 10 → 10
    let data: Vec<f64> = (1..=10).map(|v| v as f64).collect();
    assert_close(percentile(&data, 50.0).unwrap(), 5.5);
    assert_close(percentile(&data, 90.0).unwrap(), 9.9);
    assert_close(percentile(&data, 95.0).unwrap(), 10.0);
    assert_close(percentile(&data, 99.0).unwrap(), 10.0);
}

#[test]
fn test_percentile_never_leaves_observed_range() {
    let data = [0.1, 0.4];
    for rank in [0.0, 1.0, 50.0, 99.0, 100.0] {
        let v = percentile(&data, rank).unwrap();
        assert!((0.1..=0.4).contains(&v), "rank {rank} gave {v}");
    }
}

#[test]
fn test_percentile_large_sample() {
    let data: Vec<f64> = (1..=100).map(|v| v as f64).collect();
    assert_close(percentile(&data, 50.0).unwrap(), 50.5);
    assert_close(percentile(&data, 90.0).unwrap(), 90.9);
    assert_close(percentile(&data, 95.0).unwrap(), 95.95);
    assert_close(percentile(&data, 99.0).unwrap(), 99.99);
}

// --- summarize ---

#[test]
fn test_summarize_three_requests_over_one_second() {
    let metrics = vec![metric(201, 0.10), metric(201, 0.20), metric(500, 0.30)];
    let report = PerformanceReport::summarize("create", t0(), t0() + Duration::seconds(1), &metrics);

    assert_eq!(report.total_requests, 3);
    assert_eq!(report.successful_requests, 2);
    assert_eq!(report.failed_requests, 1);
    assert_close(report.error_rate, 100.0 / 3.0);
    assert_close(report.avg_response_time, 0.20);
    assert_close(report.min_response_time, 0.10);
    assert_close(report.max_response_time, 0.30);
    assert_close(report.requests_per_second, 3.0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors["HTTP_500"], 1);
    assert_close(report.percentile(50).unwrap(), 0.20);
}

#[test]
fn test_summarize_unsorted_response_times() {
    let metrics: Vec<RequestMetric> = [0.5, 0.1, 0.3, 0.2, 0.4].iter().map(|&rt| metric(200, rt)).collect();
    let report = PerformanceReport::summarize("t", t0(), t0() + Duration::seconds(5), &metrics);

    assert_close(report.min_response_time, 0.1);
    assert_close(report.max_response_time, 0.5);
    assert_close(report.percentile(50).unwrap(), 0.3);
}

#[test]
fn test_error_taxonomy() {
    let metrics = vec![
        metric(201, 0.1),
        metric(302, 0.1),
        metric(404, 0.1),
        metric(404, 0.1),
        Observation::transport_failure("GET", "/barrels", "Timeout").at(0.0),
        // An explicit error description wins over the status code.
        Observation::new("GET", "/barrels", 500, 0.1).with_error("boom").at(0.0),
        // Status 0 without a description is failed but uncategorised.
        metric(0, 0.0),
    ];
    let report = PerformanceReport::summarize("t", t0(), t0() + Duration::seconds(1), &metrics);

    assert_eq!(report.successful_requests, 1);
    assert_eq!(report.failed_requests, 6);
    assert_eq!(report.errors.len(), 3);
    assert_eq!(report.errors["HTTP_404"], 2);
    assert_eq!(report.errors["Timeout"], 1);
    assert_eq!(report.errors["boom"], 1);
}

#[test]
fn test_error_rate_extremes() {
    let all_ok: Vec<_> = (0..4).map(|_| metric(200, 0.1)).collect();
    let report = PerformanceReport::summarize("t", t0(), t0() + Duration::seconds(1), &all_ok);
    assert_eq!(report.error_rate, 0.0);
    assert_eq!(report.success_rate(), 100.0);

    let all_failed: Vec<_> = (0..4).map(|_| metric(503, 0.1)).collect();
    let report = PerformanceReport::summarize("t", t0(), t0() + Duration::seconds(1), &all_failed);
    assert_eq!(report.error_rate, 100.0);
    assert_eq!(report.success_rate(), 0.0);
}

#[test]
fn test_zero_or_inverted_window_has_zero_rps() {
    let metrics = vec![metric(200, 0.1)];
    let report = PerformanceReport::summarize("t", t0(), t0(), &metrics);
    assert_eq!(report.requests_per_second, 0.0);

    let report = PerformanceReport::summarize("t", t0(), t0() - Duration::seconds(1), &metrics);
    assert_eq!(report.requests_per_second, 0.0);
    assert_close(report.duration_secs(), -1.0);
}

#[test]
fn test_empty_report_is_zero_valued() {
    let report = PerformanceReport::summarize("t", t0(), t0() + Duration::seconds(1), &[]);
    assert_eq!(report, PerformanceReport::empty("t", t0(), t0() + Duration::seconds(1)));
    assert_eq!(report.total_requests, 0);
    assert_eq!(report.avg_response_time, 0.0);
    assert_eq!(report.success_rate(), 0.0);
    assert!(report.percentiles.is_empty());
    assert!(report.errors.is_empty());
}

#[test]
fn test_percentiles_are_monotonic() {
    let metrics: Vec<_> = [0.9, 0.05, 0.3, 0.3, 1.7, 0.2, 0.01, 0.6, 0.8, 2.5, 0.4]
        .iter()
        .map(|&rt| metric(200, rt))
        .collect();
    let report = PerformanceReport::summarize("t", t0(), t0() + Duration::seconds(1), &metrics);

    let p: Vec<f64> = PERCENTILE_RANKS.iter().map(|&r| report.percentile(r).unwrap()).collect();
    assert!(p.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {p:?}");
}
