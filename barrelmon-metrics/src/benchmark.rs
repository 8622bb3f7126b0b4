use barrelmon_common::{HarnessError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::store::{ReportRecord, COMPARISON_FILE_PREFIX, FILE_TIMESTAMP_FORMAT};
use crate::trend::{classify_trend, Trend};

/// Runs kept in each test's history, most recent last.
pub const HISTORY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub trend: Trend,
}

impl MetricSummary {
    pub fn from_values(values: &[f64], lower_is_better: bool) -> Self {
        if values.is_empty() {
            return Self { min: 0.0, max: 0.0, avg: 0.0, trend: Trend::Stable };
        }
        Self {
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            avg: values.iter().sum::<f64>() / values.len() as f64,
            trend: classify_trend(values, lower_is_better),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetrics {
    pub rps: MetricSummary,
    pub response_time: MetricSummary,
    pub error_rate: MetricSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub rps: f64,
    pub response_time: f64,
    pub error_rate: f64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestComparison {
    pub runs: usize,
    pub latest_run: Option<DateTime<Utc>>,
    pub metrics: TestMetrics,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performer {
    pub test: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPerformers {
    pub highest_rps: Performer,
    pub lowest_error_rate: Performer,
    pub fastest_response: Performer,
}

/// Cross-run comparison of persisted reports, grouped by test name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub generated_at: DateTime<Utc>,
    pub total_reports: usize,
    pub test_groups: usize,
    pub tests: BTreeMap<String, TestComparison>,
    pub best_performers: Option<BestPerformers>,
}

/// Build a comparison from `records`, keeping only test names containing `filter`.
pub fn compare(records: &[ReportRecord], filter: Option<&str>, generated_at: DateTime<Utc>) -> BenchmarkComparison {
    let selected: Vec<&ReportRecord> = records
        .iter()
        .filter(|r| filter.map_or(true, |f| r.test_name.contains(f)))
        .collect();

    let mut groups: BTreeMap<String, Vec<&ReportRecord>> = BTreeMap::new();
    for record in selected.iter().copied() {
        groups.entry(record.test_name.clone()).or_default().push(record);
    }

    let tests: BTreeMap<String, TestComparison> = groups
        .into_iter()
        .map(|(name, mut runs)| {
            // Stable sort keeps file order for runs without a start time.
            runs.sort_by_key(|r| r.start_time);
            (name, summarize_group(&runs))
        })
        .collect();

    BenchmarkComparison {
        generated_at,
        total_reports: selected.len(),
        test_groups: tests.len(),
        best_performers: best_performers(&tests),
        tests,
    }
}

fn summarize_group(runs: &[&ReportRecord]) -> TestComparison {
    let rps: Vec<f64> = runs.iter().map(|r| r.requests_per_second).collect();
    let response_times: Vec<f64> = runs.iter().map(|r| r.avg_response_time).collect();
    let error_rates: Vec<f64> = runs.iter().map(|r| r.error_rate).collect();

    TestComparison {
        runs: runs.len(),
        latest_run: runs.last().and_then(|r| r.start_time),
        metrics: TestMetrics {
            rps: MetricSummary::from_values(&rps, false),
            response_time: MetricSummary::from_values(&response_times, true),
            error_rate: MetricSummary::from_values(&error_rates, true),
        },
        history: runs[runs.len().saturating_sub(HISTORY_LEN)..]
            .iter()
            .map(|r| HistoryEntry {
                timestamp: r.start_time,
                rps: r.requests_per_second,
                response_time: r.avg_response_time,
                error_rate: r.error_rate,
                total_requests: r.total_requests,
            })
            .collect(),
    }
}

fn best_performers(tests: &BTreeMap<String, TestComparison>) -> Option<BestPerformers> {
    Some(BestPerformers {
        highest_rps: pick(tests, |t| t.metrics.rps.max, |candidate, best| candidate > best)?,
        lowest_error_rate: pick(tests, |t| t.metrics.error_rate.min, |candidate, best| candidate < best)?,
        fastest_response: pick(tests, |t| t.metrics.response_time.min, |candidate, best| candidate < best)?,
    })
}

/// First test (in name order) whose value beats every other under `better`.
fn pick(
    tests: &BTreeMap<String, TestComparison>,
    value: impl Fn(&TestComparison) -> f64,
    better: impl Fn(f64, f64) -> bool,
) -> Option<Performer> {
    let mut best: Option<Performer> = None;
    for (name, test) in tests {
        let v = value(test);
        if best.as_ref().map_or(true, |b| better(v, b.value)) {
            best = Some(Performer { test: name.clone(), value: v });
        }
    }
    best
}

/// Where comparisons of the reports in `report_dir` are written: a `benchmarks`
/// directory next to it.
pub fn benchmark_dir(report_dir: &Path) -> PathBuf {
    report_dir.parent().unwrap_or_else(|| Path::new("")).join("benchmarks")
}

/// Persist `comparison` as `benchmark_comparison_<timestamp>.json` under `dir`.
pub fn write_comparison(comparison: &BenchmarkComparison, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "{COMPARISON_FILE_PREFIX}{}.json",
        comparison.generated_at.format(FILE_TIMESTAMP_FORMAT)
    ));
    let json = serde_json::to_string_pretty(comparison).map_err(|e| HarnessError::Serialization(e.to_string()))?;
    std::fs::write(&path, json)?;
    tracing::info!(path = %path.display(), tests = comparison.test_groups, "wrote benchmark comparison");
    Ok(path)
}
