use barrelmon_common::{HarnessError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::report::PerformanceReport;

/// Timestamp layout used in generated file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// File-name prefix of persisted benchmark comparisons.
pub const COMPARISON_FILE_PREFIX: &str = "benchmark_comparison_";

/// Flat, persisted form of a [`PerformanceReport`] with two derived fields.
///
/// Every field defaults when absent, so partial or older files still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportRecord {
    pub test_name: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub end_time: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub percentiles: BTreeMap<u8, f64>,
    pub requests_per_second: f64,
    pub error_rate: f64,
    pub errors: BTreeMap<String, u64>,
    /// `end_time - start_time`, seconds.
    pub test_duration: f64,
    /// `successful / total * 100`, 0 when total is 0.
    pub success_rate: f64,
}

impl From<&PerformanceReport> for ReportRecord {
    fn from(report: &PerformanceReport) -> Self {
        Self {
            test_name: report.test_name.clone(),
            start_time: Some(report.start_time),
            end_time: Some(report.end_time),
            total_requests: report.total_requests,
            successful_requests: report.successful_requests,
            failed_requests: report.failed_requests,
            avg_response_time: report.avg_response_time,
            min_response_time: report.min_response_time,
            max_response_time: report.max_response_time,
            percentiles: report.percentiles.clone(),
            requests_per_second: report.requests_per_second,
            error_rate: report.error_rate,
            errors: report.errors.clone(),
            test_duration: report.duration_secs(),
            success_rate: report.success_rate(),
        }
    }
}

/// Accept RFC 3339 timestamps as well as offset-less ISO 8601 ones (read as UTC).
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

/// Default file name: `performance_report_<test>_<end time>.json`.
pub fn default_report_filename(report: &PerformanceReport) -> String {
    format!(
        "performance_report_{}_{}.json",
        sanitize(&report.test_name),
        report.end_time.format(FILE_TIMESTAMP_FORMAT)
    )
}

/// Persist `report` as pretty JSON under `dir`, creating it if needed.
pub fn write_json_report(report: &PerformanceReport, dir: &Path, filename: Option<&str>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = match filename {
        Some(name) => dir.join(name),
        None => dir.join(default_report_filename(report)),
    };
    let json = serde_json::to_string_pretty(&ReportRecord::from(report))
        .map_err(|e| HarnessError::Serialization(e.to_string()))?;
    std::fs::write(&path, json)?;
    tracing::info!(path = %path.display(), test = %report.test_name, "wrote performance report");
    Ok(path)
}

/// Load every `*.json` report in `dir`, in file-name order.
///
/// Benchmark comparisons are ignored. Files that cannot be read or parsed, or
/// that carry no `test_name`, are skipped with a warning. A missing directory
/// yields no reports.
pub fn load_reports(dir: &Path) -> Result<Vec<ReportRecord>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| !is_comparison_file(p))
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match read_record(&path) {
            Ok(record) if record.test_name.is_empty() => {
                tracing::warn!(path = %path.display(), "skipping file without test_name");
            }
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable report"),
        }
    }
    Ok(records)
}

fn is_comparison_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(COMPARISON_FILE_PREFIX))
}

fn read_record(path: &Path) -> Result<ReportRecord> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| HarnessError::Serialization(e.to_string()))
}

/// Replace anything but ASCII alphanumerics, `-` and `_` so a name is safe in a path.
pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
