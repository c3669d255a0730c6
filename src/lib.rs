//! Concurrent HTTP burst-load engine.
//!
//! Fires a configurable burst of HTTP requests at one target from a pool of
//! independent workers, with optional token-bucket rate limiting, and
//! aggregates the outcomes into latency percentiles, an equal-width
//! histogram, status-code counts, and a six-category error breakdown.
//! Latency memory is bounded by a fixed-capacity reservoir sample no matter
//! how many requests a run issues.
//!
//! The engine is an in-process library: the caller hands over a validated
//! [`RunConfig`], optionally a progress callback and a [`CancelHandle`], and
//! awaits the final [`RunResult`].
//!
//! ```no_run
//! use apiburst::{execute_run, CancelHandle, LoadPlan, RateLimit, RunConfig};
//!
//! # async fn demo() -> Result<(), String> {
//! let config = RunConfig {
//!     url: "https://example.com/health".to_string(),
//!     method: "GET".to_string(),
//!     headers: Vec::new(),
//!     query_params: Vec::new(),
//!     body: Default::default(),
//!     basic_auth: None,
//!     concurrency: 8,
//!     load: LoadPlan::Requests { total: 1_000 },
//!     rate_limit: RateLimit::Global { qps: 100.0 },
//!     timeout_ms: 5_000,
//!     transport: Default::default(),
//! };
//! let cancel = CancelHandle::new();
//! let result = execute_run(config, None, &cancel).await?;
//! println!("p95 = {} ms", result.latency.p95_ms);
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod engine;
pub mod export;

pub use domain::{
    BasicAuth, BodyConfig, BodyMode, ErrorBreakdown, ErrorKind, HeaderRow, HistogramBucket,
    LatencySummary, LoadPlan, ProgressSnapshot, QueryParamRow, RateLimit, RunConfig, RunResult,
    TimeseriesPoint, TransportConfig,
};
pub use engine::{execute_run, CancelHandle, ProgressFn};
pub use export::{export_csv, export_json, ExportPayload};
