use std::fmt;

use hdrhistogram::Histogram;

use crate::config::Profile;
use crate::stats::{OutcomeKey, StatsSnapshot, UrlStats};

/// Summary figures for one URL, all latencies in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlReport {
    pub url: String,
    pub total_requests: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub error_rate_pct: f64,
    pub avg_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub p50_response_time_ms: f64,
    pub p99_response_time_ms: f64,
    /// Sorted by key: status codes ascending, then `timeout`, then `unknown_error`.
    pub response_codes: Vec<(OutcomeKey, u64)>,
}

impl UrlReport {
    pub fn from_stats(url: &str, stats: &UrlStats) -> Self {
        let times = &stats.response_times_ms;
        let min = times.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let max = times.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let avg = if stats.success_count > 0 {
            stats.total_elapsed_seconds * 1000.0 / stats.success_count as f64
        } else {
            0.0
        };

        let total = stats.total_requests();
        let error_rate_pct = if total > 0 {
            stats.error_count as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let (p50, p99) = percentiles(times);

        let mut response_codes: Vec<_> = stats
            .response_codes
            .iter()
            .map(|(key, count)| (*key, *count))
            .collect();
        response_codes.sort();

        UrlReport {
            url: url.to_string(),
            total_requests: total,
            success_count: stats.success_count,
            failed_count: stats.failed_count,
            error_rate_pct,
            avg_response_time_ms: avg,
            min_response_time_ms: min,
            max_response_time_ms: max,
            p50_response_time_ms: p50,
            p99_response_time_ms: p99,
            response_codes,
        }
    }
}

fn percentiles(times_ms: &[f64]) -> (f64, f64) {
    let mut histogram = match Histogram::<u64>::new(3) {
        Ok(h) => h,
        Err(_) => return (0.0, 0.0),
    };
    for ms in times_ms {
        let micros = (ms * 1000.0).round().max(0.0) as u64;
        histogram.record(micros).unwrap_or_default();
    }
    if histogram.is_empty() {
        return (0.0, 0.0);
    }
    (
        histogram.value_at_quantile(0.50) as f64 / 1000.0,
        histogram.value_at_quantile(0.99) as f64 / 1000.0,
    )
}

/// End-of-run summary across every URL touched during the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub profile: Profile,
    pub duration_secs: u64,
    pub urls: Vec<UrlReport>,
}

impl Report {
    pub fn new(profile: Profile, duration_secs: u64, snapshot: &StatsSnapshot) -> Self {
        let urls = snapshot
            .iter()
            .map(|(url, stats)| UrlReport::from_stats(url, stats))
            .collect();
        Report {
            profile,
            duration_secs,
            urls,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "  Test type: {} ({}s)", self.profile, self.duration_secs)?;

        if self.urls.is_empty() {
            return writeln!(f, "  No requests were issued.");
        }

        for url in &self.urls {
            writeln!(f)?;
            writeln!(f, "{}", url.url)?;
            writeln!(f, "  Total Requests: {}", url.total_requests)?;
            writeln!(f, "  Failed Requests: {}", url.failed_count)?;
            writeln!(f, "  Error Rate: {:.2}%", url.error_rate_pct)?;
            writeln!(f, "  Latency:")?;
            writeln!(f, "    Avg: {:.2}ms", url.avg_response_time_ms)?;
            writeln!(
                f,
                "    Min/Max: {:.2}ms / {:.2}ms",
                url.min_response_time_ms, url.max_response_time_ms
            )?;
            writeln!(f, "    P50: {:.2}ms", url.p50_response_time_ms)?;
            writeln!(f, "    P99: {:.2}ms", url.p99_response_time_ms)?;
            writeln!(f, "  Responses:")?;
            for (key, count) in &url.response_codes {
                writeln!(f, "    {}: {}", key, count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsStore;
    use std::time::Duration;

    fn sample_snapshot() -> StatsSnapshot {
        let store = StatsStore::new();
        store.record_success("http://a/", 200, Duration::from_millis(10));
        store.record_success("http://a/", 200, Duration::from_millis(30));
        store.record_success("http://a/", 404, Duration::from_millis(20));
        store.record_timeout("http://a/");
        store.record_error("http://b/");
        store.snapshot()
    }

    #[test]
    fn derives_min_max_avg() {
        let snapshot = sample_snapshot();
        let report = UrlReport::from_stats("http://a/", &snapshot["http://a/"]);

        assert_eq!(report.total_requests, 4);
        assert_eq!(report.success_count, 3);
        assert_eq!(report.failed_count, 1);
        assert!((report.min_response_time_ms - 10.0).abs() < 1e-6);
        assert!((report.max_response_time_ms - 30.0).abs() < 1e-6);
        assert!((report.avg_response_time_ms - 20.0).abs() < 1e-6);
        assert!((report.error_rate_pct - 25.0).abs() < 1e-9);
        assert!((report.p50_response_time_ms - 20.0).abs() < 0.1);
        assert!((report.p99_response_time_ms - 30.0).abs() < 0.1);
        assert_eq!(
            report.response_codes,
            vec![
                (OutcomeKey::Status(200), 2),
                (OutcomeKey::Status(404), 1),
                (OutcomeKey::Timeout, 1),
            ]
        );
    }

    #[test]
    fn all_failures_yield_zero_latencies() {
        let snapshot = sample_snapshot();
        let report = UrlReport::from_stats("http://b/", &snapshot["http://b/"]);

        assert_eq!(report.total_requests, 1);
        assert_eq!(report.avg_response_time_ms, 0.0);
        assert_eq!(report.min_response_time_ms, 0.0);
        assert_eq!(report.max_response_time_ms, 0.0);
        assert_eq!(report.p99_response_time_ms, 0.0);
        assert_eq!(report.error_rate_pct, 100.0);
    }

    #[test]
    fn derivation_is_repeatable() {
        let snapshot = sample_snapshot();
        let first = Report::new(Profile::RatePaced, 5, &snapshot);
        let second = Report::new(Profile::RatePaced, 5, &snapshot);
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn renders_tally_labels() {
        let report = Report::new(Profile::Saturation, 3, &sample_snapshot());
        let text = report.to_string();
        assert!(text.contains("Test type: distributed (3s)"));
        assert!(text.contains("timeout: 1"));
        assert!(text.contains("unknown_error: 1"));
        assert!(text.contains("404: 1"));
    }

    #[test]
    fn empty_snapshot_renders() {
        let report = Report::new(Profile::BudgetPaced, 1, &StatsSnapshot::new());
        assert!(report.urls.is_empty());
        assert!(report.to_string().contains("No requests were issued."));
    }
}
