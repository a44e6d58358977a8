use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use dashmap::DashMap;

/// Classification of one request's result, used as the response tally key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutcomeKey {
    Status(u16),
    Timeout,
    UnknownError,
}

impl fmt::Display for OutcomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKey::Status(code) => write!(f, "{}", code),
            OutcomeKey::Timeout => f.write_str("timeout"),
            OutcomeKey::UnknownError => f.write_str("unknown_error"),
        }
    }
}

/// Accumulated counters for a single target URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlStats {
    pub success_count: u64,
    pub error_count: u64,
    /// Always equal to `error_count`; kept for the report layout.
    pub failed_count: u64,
    /// Sum of elapsed seconds over successful requests only.
    pub total_elapsed_seconds: f64,
    pub response_times_ms: Vec<f64>,
    pub response_codes: HashMap<OutcomeKey, u64>,
}

impl UrlStats {
    pub fn total_requests(&self) -> u64 {
        self.success_count + self.error_count
    }

    fn record_success(&mut self, status: u16, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        self.success_count += 1;
        self.total_elapsed_seconds += secs;
        self.response_times_ms.push(secs * 1000.0);
        *self.response_codes.entry(OutcomeKey::Status(status)).or_insert(0) += 1;
    }

    fn record_failure(&mut self, key: OutcomeKey) {
        self.error_count += 1;
        self.failed_count += 1;
        *self.response_codes.entry(key).or_insert(0) += 1;
    }
}

/// Process-wide statistics for one run, keyed by URL.
///
/// Each update takes the entry lock for its URL, inserting a zeroed entry on
/// first touch, so concurrent updates against the same URL never interleave.
#[derive(Debug, Default)]
pub struct StatsStore {
    urls: DashMap<String, UrlStats>,
}

/// Immutable copy of the store taken at the end of a run.
pub type StatsSnapshot = BTreeMap<String, UrlStats>;

impl StatsStore {
    pub fn new() -> Self {
        StatsStore {
            urls: DashMap::new(),
        }
    }

    pub fn record_success(&self, url: &str, status: u16, elapsed: Duration) {
        self.entry(url, |stats| stats.record_success(status, elapsed));
    }

    pub fn record_timeout(&self, url: &str) {
        self.entry(url, |stats| stats.record_failure(OutcomeKey::Timeout));
    }

    pub fn record_error(&self, url: &str) {
        self.entry(url, |stats| stats.record_failure(OutcomeKey::UnknownError));
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.urls
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    fn entry(&self, url: &str, update: impl FnOnce(&mut UrlStats)) {
        // Avoid allocating the key on the hot path once the URL is known.
        if let Some(mut stats) = self.urls.get_mut(url) {
            update(&mut *stats);
            return;
        }
        let mut stats = self.urls.entry(url.to_string()).or_default();
        update(&mut *stats);
    }
}
