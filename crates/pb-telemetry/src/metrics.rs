use ahash::AHashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// A histogram that tracks the distribution of observed values across buckets.
#[derive(Debug)]
pub struct Histogram {
    pub buckets: Vec<f64>,
    pub counts: Vec<AtomicU64>,
    pub sum: AtomicU64,
    pub count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        // f64 sum stored as bits
        let mut current = self.sum.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .sum
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        for (i, boundary) in self.buckets.iter().enumerate() {
            if value <= *boundary {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn get_sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Relaxed))
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Fetch duration buckets, in seconds. Requests time out after tens of
/// seconds, so the top bucket sits there.
fn fetch_duration_buckets() -> Vec<f64> {
    vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What became of one scheduled fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    /// Fetched and decoded.
    Ok,
    /// Transport, status or decode failure.
    Error,
    /// Completed but dropped as stale or superseded.
    Discarded,
    /// Tick skipped because the previous fetch was still running.
    Skipped,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::Ok,
        Outcome::Error,
        Outcome::Discarded,
        Outcome::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Error => "error",
            Outcome::Discarded => "discarded",
            Outcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FetchMetrics
// ---------------------------------------------------------------------------

const FETCH_TOTAL: &str = "pulseboard_fetch_total";
const FETCH_DURATION: &str = "pulseboard_fetch_duration_seconds";
const RECORDS: &str = "pulseboard_records";

/// Per-feed fetch metrics.
///
/// Thread-safe via interior mutability (`RwLock` for registering a new feed,
/// `Atomic*` for values). Feeds are registered lazily on first use.
#[derive(Debug, Default)]
pub struct FetchMetrics {
    outcomes: RwLock<AHashMap<(String, Outcome), AtomicU64>>,
    records: RwLock<AHashMap<String, AtomicI64>>,
    durations: RwLock<AHashMap<String, Histogram>>,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Counters -----------------------------------------------------------

    pub fn record_outcome(&self, feed: &str, outcome: Outcome) {
        let key = (feed.to_string(), outcome);
        // Fast-path: read lock
        {
            let map = self.outcomes.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(c) = map.get(&key) {
                c.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let mut map = self.outcomes.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn outcome_count(&self, feed: &str, outcome: Outcome) -> u64 {
        let map = self.outcomes.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&(feed.to_string(), outcome))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // -- Gauges -------------------------------------------------------------

    /// Number of records the feed's last successful fetch returned.
    pub fn set_records(&self, feed: &str, count: usize) {
        let value = i64::try_from(count).unwrap_or(i64::MAX);
        {
            let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(g) = map.get(feed) {
                g.store(value, Ordering::Relaxed);
                return;
            }
        }
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(feed.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .store(value, Ordering::Relaxed);
    }

    pub fn records(&self, feed: &str) -> i64 {
        let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
        map.get(feed).map(|g| g.load(Ordering::Relaxed)).unwrap_or(0)
    }

    // -- Histograms ---------------------------------------------------------

    pub fn observe_duration(&self, feed: &str, seconds: f64) {
        {
            let map = self.durations.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(h) = map.get(feed) {
                h.observe(seconds);
                return;
            }
        }
        let mut map = self.durations.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(feed.to_string())
            .or_insert_with(|| Histogram::new(fetch_duration_buckets()))
            .observe(seconds);
    }

    pub fn duration_count(&self, feed: &str) -> u64 {
        let map = self.durations.read().unwrap_or_else(PoisonError::into_inner);
        map.get(feed).map(Histogram::get_count).unwrap_or(0)
    }

    // -- Export --------------------------------------------------------------

    /// Export all metrics in Prometheus text exposition format.
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        {
            let map = self.outcomes.read().unwrap_or_else(PoisonError::into_inner);
            let mut rows: Vec<(&str, Outcome, u64)> = map
                .iter()
                .map(|((feed, outcome), v)| (feed.as_str(), *outcome, v.load(Ordering::Relaxed)))
                .collect();
            rows.sort();
            if !rows.is_empty() {
                out.push_str(&format!("# TYPE {FETCH_TOTAL} counter\n"));
            }
            for (feed, outcome, value) in rows {
                out.push_str(&format!(
                    "{FETCH_TOTAL}{{feed=\"{feed}\",outcome=\"{outcome}\"}} {value}\n"
                ));
            }
        }

        {
            let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
            let mut feeds: Vec<&String> = map.keys().collect();
            feeds.sort();
            if !feeds.is_empty() {
                out.push_str(&format!("# TYPE {RECORDS} gauge\n"));
            }
            for feed in feeds {
                let val = map[feed].load(Ordering::Relaxed);
                out.push_str(&format!("{RECORDS}{{feed=\"{feed}\"}} {val}\n"));
            }
        }

        {
            let map = self.durations.read().unwrap_or_else(PoisonError::into_inner);
            let mut feeds: Vec<&String> = map.keys().collect();
            feeds.sort();
            if !feeds.is_empty() {
                out.push_str(&format!("# TYPE {FETCH_DURATION} histogram\n"));
            }
            for feed in feeds {
                let h = &map[feed];
                let mut cumulative = 0u64;
                for (i, boundary) in h.buckets.iter().enumerate() {
                    cumulative += h.counts[i].load(Ordering::Relaxed);
                    out.push_str(&format!(
                        "{FETCH_DURATION}_bucket{{feed=\"{feed}\",le=\"{boundary}\"}} {cumulative}\n"
                    ));
                }
                let count = h.get_count();
                out.push_str(&format!(
                    "{FETCH_DURATION}_bucket{{feed=\"{feed}\",le=\"+Inf\"}} {count}\n"
                ));
                out.push_str(&format!(
                    "{FETCH_DURATION}_sum{{feed=\"{feed}\"}} {}\n",
                    h.get_sum()
                ));
                out.push_str(&format!(
                    "{FETCH_DURATION}_count{{feed=\"{feed}\"}} {count}\n"
                ));
            }
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Global singleton
// ---------------------------------------------------------------------------

/// Process-wide metrics shared by every refresh worker.
pub fn global_metrics() -> &'static FetchMetrics {
    use std::sync::OnceLock;
    static INSTANCE: OnceLock<FetchMetrics> = OnceLock::new();
    INSTANCE.get_or_init(FetchMetrics::new)
}
