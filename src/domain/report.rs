use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classification of a failed request. Exactly one category applies to any
/// failure; successful 2xx/3xx responses carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Cors,
    Network,
    Aborted,
    Http4xx,
    Http5xx,
}

/// Fixed-shape counters, one per error category. Counts only ever grow and
/// their sum never exceeds the number of completed requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBreakdown {
    pub timeout: u64,
    pub cors: u64,
    pub network: u64,
    pub aborted: u64,
    pub http_4xx: u64,
    pub http_5xx: u64,
}

impl ErrorBreakdown {
    pub fn record(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Timeout => self.timeout += 1,
            ErrorKind::Cors => self.cors += 1,
            ErrorKind::Network => self.network += 1,
            ErrorKind::Aborted => self.aborted += 1,
            ErrorKind::Http4xx => self.http_4xx += 1,
            ErrorKind::Http5xx => self.http_5xx += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.timeout + self.cors + self.network + self.aborted + self.http_4xx + self.http_5xx
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub stddev_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// One equal-width latency bucket. All buckets are half-open `[lower, upper)`
/// except the last, which includes the maximum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBucket {
    pub lower_bound_ms: f64,
    pub upper_bound_ms: f64,
    pub count: u64,
}

/// Per-second trend point, offset from run start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesPoint {
    pub offset_ms: u64,
    pub completed: u64,
    pub latency_avg_ms: f64,
}

/// Emitted to the caller after each recorded outcome. `completed` reflects
/// the global counter and is monotonically non-decreasing across snapshots,
/// whichever worker emits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub completed: u64,
    #[serde(default)]
    pub target: Option<u64>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub throughput_rps: f64,
}

/// Final aggregate for one run. Constructed once at completion and immutable
/// thereafter. `success_requests + failed_requests == total_requests` holds,
/// on partial (cancelled) results too.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub total_requests: u64,
    pub success_requests: u64,
    pub failed_requests: u64,
    pub total_bytes: u64,
    pub elapsed_ms: u64,
    pub throughput_rps: f64,
    pub latency: LatencySummary,
    #[serde(default)]
    pub histogram: Vec<HistogramBucket>,
    #[serde(default)]
    pub status_counts: BTreeMap<u16, u64>,
    pub errors: ErrorBreakdown,
    #[serde(default)]
    pub timeseries: Vec<TimeseriesPoint>,
    pub cancelled: bool,
}
