mod config;
mod report;

pub use config::{
    BasicAuth, BodyConfig, BodyMode, HeaderRow, LoadPlan, QueryParamRow, RateLimit, RunConfig,
    TransportConfig, MAX_CONCURRENCY, MAX_DURATION_MS, MAX_QPS, MAX_TIMEOUT_MS,
    MAX_TOTAL_REQUESTS,
};
pub use report::{
    ErrorBreakdown, ErrorKind, HistogramBucket, LatencySummary, ProgressSnapshot, RunResult,
    TimeseriesPoint,
};
