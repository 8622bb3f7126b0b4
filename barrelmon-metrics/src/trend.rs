use serde::{Deserialize, Serialize};
use std::fmt;

/// Changes smaller than this (in percent) count as noise.
pub const STABLE_THRESHOLD_PERCENT: f64 = 5.0;

/// Direction a metric has moved across recent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Degrading => "degrading",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percent change of the latest quarter of `values` against the quarter before it.
///
/// The quarter size is `ceil(n / 4)`. When history is shorter than two quarters,
/// everything before the latest quarter is the baseline. Returns `None` when there
/// is no baseline, and `Some(0.0)` when the baseline mean is zero.
pub fn quarter_change_percent(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let quarter = n.div_ceil(4).max(1);
    let recent = &values[n - quarter..];
    let previous = &values[n.saturating_sub(2 * quarter)..n - quarter];
    if previous.is_empty() {
        return None;
    }

    let recent_avg = mean(recent);
    let previous_avg = mean(previous);
    if previous_avg == 0.0 {
        return Some(0.0);
    }
    Some((recent_avg - previous_avg) / previous_avg * 100.0)
}

/// Classify the recent trajectory of a metric across historical runs.
///
/// `lower_is_better` is `true` for response time and error rate, `false` for throughput.
pub fn classify_trend(values: &[f64], lower_is_better: bool) -> Trend {
    let Some(change) = quarter_change_percent(values) else {
        return Trend::Stable;
    };
    if change.abs() < STABLE_THRESHOLD_PERCENT {
        Trend::Stable
    } else if (change > 0.0) != lower_is_better {
        Trend::Improving
    } else {
        Trend::Degrading
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
