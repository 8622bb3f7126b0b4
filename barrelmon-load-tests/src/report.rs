use barrelmon_common::config::Thresholds;
use barrelmon_metrics::benchmark::BenchmarkComparison;
use barrelmon_metrics::report::PERCENTILE_RANKS;
use barrelmon_metrics::{ConcurrencyReport, PerformanceReport};
use std::fmt;

/// Pass/fail outcome of a report against the configured thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    pub error_rate_exceeded: bool,
    pub throughput_below: bool,
    pub success_rate_below: bool,
}

impl Verdict {
    pub fn evaluate(report: &PerformanceReport, thresholds: &Thresholds) -> Self {
        Self {
            error_rate_exceeded: report.total_requests > 0 && report.error_rate > thresholds.max_error_rate,
            throughput_below: report.requests_per_second < thresholds.min_requests_per_second,
            success_rate_below: report.success_rate() < thresholds.min_success_rate,
        }
    }

    /// Fold the verdicts of several scenarios into one.
    pub fn combine(self, other: Verdict) -> Verdict {
        Verdict {
            error_rate_exceeded: self.error_rate_exceeded || other.error_rate_exceeded,
            throughput_below: self.throughput_below || other.throughput_below,
            success_rate_below: self.success_rate_below || other.success_rate_below,
        }
    }

    pub fn passed(&self) -> bool {
        !self.error_rate_exceeded && !self.throughput_below && !self.success_rate_below
    }

    /// 0 pass, 1 error rate over threshold, 2 throughput or success rate under threshold.
    pub fn exit_code(&self) -> i32 {
        if self.error_rate_exceeded {
            1
        } else if self.throughput_below || self.success_rate_below {
            2
        } else {
            0
        }
    }
}

fn pass_fail(exceeded: bool) -> &'static str {
    if exceeded {
        "✗"
    } else {
        "✓"
    }
}

/// Plain-text summary of one scenario.
pub struct Summary<'a> {
    pub report: &'a PerformanceReport,
    pub concurrency: Option<&'a ConcurrencyReport>,
    pub thresholds: &'a Thresholds,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (report, thresholds) = (self.report, self.thresholds);
        let verdict = Verdict::evaluate(report, thresholds);
        let title = format!("Barrel Monitor Load Results: {}", report.test_name);

        writeln!(f, "{title}")?;
        writeln!(f, "{}", "=".repeat(title.chars().count()))?;
        writeln!(f, "Duration:              {:.1} s", report.duration_secs())?;
        writeln!(f, "Requests:              {}", format_thousands(report.total_requests))?;
        writeln!(f, "Successful:            {}", report.successful_requests)?;
        writeln!(f, "Failed:                {}", report.failed_requests)?;
        writeln!(
            f,
            "Throughput:            {:.1} rps    [threshold: {:.1} rps]  {}",
            report.requests_per_second,
            thresholds.min_requests_per_second,
            pass_fail(verdict.throughput_below),
        )?;
        writeln!(f)?;
        writeln!(f, "Avg response time:     {:.1} ms", secs_to_ms(report.avg_response_time))?;
        writeln!(f, "Min response time:     {:.1} ms", secs_to_ms(report.min_response_time))?;
        writeln!(f, "Max response time:     {:.1} ms", secs_to_ms(report.max_response_time))?;
        for rank in PERCENTILE_RANKS {
            if let Some(value) = report.percentile(rank) {
                writeln!(f, "P{rank:<2} latency:           {:.1} ms", secs_to_ms(value))?;
            }
        }
        writeln!(f)?;
        writeln!(
            f,
            "Error rate:            {:.2}%    [threshold: {:.2}%]  {}",
            report.error_rate,
            thresholds.max_error_rate,
            pass_fail(verdict.error_rate_exceeded),
        )?;
        writeln!(
            f,
            "Success rate:          {:.2}%    [threshold: {:.2}%]  {}",
            report.success_rate(),
            thresholds.min_success_rate,
            pass_fail(verdict.success_rate_below),
        )?;
        for (category, count) in &report.errors {
            writeln!(f, "  {category}: {count}")?;
        }

        if let Some(concurrency) = self.concurrency {
            writeln!(f)?;
            writeln!(
                f,
                "Workers:               {}  ({} with errors)",
                concurrency.concurrent_threads, concurrency.threads_with_errors
            )?;
            for (worker, stats) in &concurrency.per_thread_stats {
                writeln!(
                    f,
                    "  worker {worker:<3} {:>6} req  {:>5} failed  avg {:.1} ms  max {:.1} ms",
                    stats.requests,
                    stats.failed,
                    secs_to_ms(stats.avg_response_time),
                    secs_to_ms(stats.max_response_time),
                )?;
            }
        }

        writeln!(f)?;
        write!(f, "Result: {}", if verdict.passed() { "PASS" } else { "FAIL" })
    }
}

pub fn render(report: &PerformanceReport, concurrency: Option<&ConcurrencyReport>, thresholds: &Thresholds) -> String {
    Summary { report, concurrency, thresholds }.to_string()
}

pub fn print_report(report: &PerformanceReport, concurrency: Option<&ConcurrencyReport>, thresholds: &Thresholds) {
    println!("{}", Summary { report, concurrency, thresholds });
}

/// Plain-text summary of a cross-run comparison.
pub struct ComparisonSummary<'a>(pub &'a BenchmarkComparison);

impl fmt::Display for ComparisonSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let comparison = self.0;
        writeln!(f, "Benchmark Comparison")?;
        writeln!(f, "====================")?;
        writeln!(f, "Reports:               {}", comparison.total_reports)?;
        writeln!(f, "Test groups:           {}", comparison.test_groups)?;

        for (name, test) in &comparison.tests {
            let m = &test.metrics;
            writeln!(f)?;
            writeln!(f, "{name} ({} runs)", test.runs)?;
            writeln!(
                f,
                "  rps            avg {:>8.2}  min {:>8.2}  max {:>8.2}  {}",
                m.rps.avg, m.rps.min, m.rps.max, m.rps.trend
            )?;
            writeln!(
                f,
                "  response time  avg {:>8.1}  min {:>8.1}  max {:>8.1}  {}",
                secs_to_ms(m.response_time.avg),
                secs_to_ms(m.response_time.min),
                secs_to_ms(m.response_time.max),
                m.response_time.trend
            )?;
            writeln!(
                f,
                "  error rate     avg {:>7.2}%  min {:>7.2}%  max {:>7.2}%  {}",
                m.error_rate.avg, m.error_rate.min, m.error_rate.max, m.error_rate.trend
            )?;
        }

        if let Some(best) = &comparison.best_performers {
            writeln!(f)?;
            writeln!(f, "Highest RPS:           {} ({:.2})", best.highest_rps.test, best.highest_rps.value)?;
            writeln!(
                f,
                "Lowest error rate:     {} ({:.2}%)",
                best.lowest_error_rate.test, best.lowest_error_rate.value
            )?;
            writeln!(
                f,
                "Fastest response:      {} ({:.1} ms)",
                best.fastest_response.test,
                secs_to_ms(best.fastest_response.value)
            )?;
        }
        Ok(())
    }
}

pub fn render_comparison(comparison: &BenchmarkComparison) -> String {
    ComparisonSummary(comparison).to_string()
}

pub fn format_thousands(n: u64) -> String {
    if n >= 1_000_000 {
        format!("~{}M", n / 1_000_000)
    } else if n >= 1_000 {
        format!("~{}K", n / 1_000)
    } else {
        n.to_string()
    }
}

fn secs_to_ms(secs: f64) -> f64 {
    secs * 1000.0
}
