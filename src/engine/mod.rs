mod cancel;
mod classify;
mod limiter;
mod metrics;
mod template;
mod runner;

pub use cancel::CancelHandle;
pub use classify::{classify_failure, classify_message, classify_status};
pub use limiter::TokenBucket;
pub use metrics::{
    histogram, percentile, throughput_rps, Reservoir, RunningStats, HISTOGRAM_BUCKETS,
    RESERVOIR_CAPACITY,
};
pub use runner::{execute_run, ProgressFn};
