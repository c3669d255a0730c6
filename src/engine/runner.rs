use crate::domain::{
    ErrorBreakdown, ErrorKind, LatencySummary, LoadPlan, ProgressSnapshot, RateLimit, RunConfig,
    RunResult, TimeseriesPoint, MAX_TOTAL_REQUESTS,
};
use crate::engine::cancel::{cancel_requested, CancelHandle};
use crate::engine::classify::{classify_failure, classify_status};
use crate::engine::limiter::TokenBucket;
use crate::engine::metrics::{
    histogram, percentile, throughput_rps, Reservoir, RunningStats, HISTOGRAM_BUCKETS,
    RESERVOIR_CAPACITY,
};
use crate::engine::template::{build_request_template, RequestTemplate};
use reqwest::{Client, Proxy};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

/// Caller-supplied progress sink, invoked after every recorded outcome.
pub type ProgressFn = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Workload {
    Requests(u64),
    Duration(Duration),
}

/// Per-request result, fed to the aggregators and then discarded.
struct RequestOutcome {
    latency_ms: f64,
    status: Option<u16>,
    error: Option<ErrorKind>,
    bytes_in: u64,
    aborted: bool,
}

#[derive(Default)]
struct SeriesBucket {
    completed: u64,
    latency_sum: f64,
}

/// Shared aggregate state. Workers run on real OS threads, so every field
/// lives behind the one mutex; critical sections are short increments.
struct RunTally {
    success: u64,
    failed: u64,
    total_bytes: u64,
    status_counts: BTreeMap<u16, u64>,
    errors: ErrorBreakdown,
    reservoir: Reservoir,
    stats: RunningStats,
    series: BTreeMap<u64, SeriesBucket>,
}

impl RunTally {
    fn new() -> Self {
        Self {
            success: 0,
            failed: 0,
            total_bytes: 0,
            status_counts: BTreeMap::new(),
            errors: ErrorBreakdown::default(),
            reservoir: Reservoir::new(RESERVOIR_CAPACITY),
            stats: RunningStats::default(),
            series: BTreeMap::new(),
        }
    }

    fn completed(&self) -> u64 {
        self.success + self.failed
    }

    fn record(&mut self, outcome: &RequestOutcome, elapsed: Duration) {
        if outcome.error.is_some() {
            self.failed += 1;
        } else {
            self.success += 1;
        }
        self.total_bytes += outcome.bytes_in;
        if let Some(status) = outcome.status {
            *self.status_counts.entry(status).or_insert(0) += 1;
        }
        if let Some(kind) = outcome.error {
            self.errors.record(kind);
        }
        self.reservoir.offer(outcome.latency_ms);
        self.stats.add(outcome.latency_ms);

        let bucket = self.series.entry(elapsed.as_secs()).or_default();
        bucket.completed += 1;
        bucket.latency_sum += outcome.latency_ms;
    }
}

/// Runs the configured burst to completion (or cancellation) and returns
/// the final aggregate. Per-request failures are classified and counted,
/// never fatal; only an invalid configuration or a crashed worker yields
/// `Err`. Cancellation yields `Ok` with partial results.
pub async fn execute_run(
    config: RunConfig,
    progress: Option<ProgressFn>,
    cancel: &CancelHandle,
) -> Result<RunResult, String> {
    config.validate()?;
    let client = Arc::new(build_client(&config)?);
    let template = Arc::new(build_request_template(&config)?);
    let concurrency = config.concurrency as usize;
    let workload = match config.load {
        LoadPlan::Requests { total } => Workload::Requests(total),
        LoadPlan::Duration { duration_ms } => {
            Workload::Duration(Duration::from_millis(duration_ms))
        }
    };

    info!(
        url = %template.url,
        method = %template.method,
        concurrency,
        "starting burst run"
    );

    let started = Instant::now();
    let deadline = match workload {
        Workload::Duration(window) => Some(started + window),
        Workload::Requests(_) => None,
    };
    // Duration mode still stops at the global request ceiling so a fast
    // target cannot push a run past its resource bounds.
    let request_ceiling = match workload {
        Workload::Requests(total) => total,
        Workload::Duration(_) => MAX_TOTAL_REQUESTS,
    };
    let target = match workload {
        Workload::Requests(total) => Some(total),
        Workload::Duration(_) => None,
    };
    let duration_ms = match workload {
        Workload::Duration(window) => Some(window.as_millis() as u64),
        Workload::Requests(_) => None,
    };

    let tally = Arc::new(Mutex::new(RunTally::new()));
    let cancelled = Arc::new(AtomicBool::new(false));
    let claimed = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::with_capacity(concurrency);
    for worker in 0..concurrency {
        let client = client.clone();
        let template = template.clone();
        let tally = tally.clone();
        let cancelled = cancelled.clone();
        let claimed = claimed.clone();
        let progress = progress.clone();
        let mut cancel_rx = cancel.subscribe();
        let mut limiter = worker_limiter(&config.rate_limit, config.concurrency);

        let handle = tokio::spawn(async move {
            loop {
                if cancelled.load(Ordering::Relaxed) || cancel_requested(&mut cancel_rx) {
                    cancelled.store(true, Ordering::Relaxed);
                    break;
                }
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        break;
                    }
                }
                let idx = claimed.fetch_add(1, Ordering::Relaxed);
                if idx >= request_ceiling {
                    break;
                }

                if let Some(limiter) = limiter.as_mut() {
                    let waited = limiter.acquire().await;
                    if !waited.is_zero() {
                        debug!(worker, wait_ms = waited.as_millis() as u64, "throttled");
                    }
                    // A cancel raised during the limiter wait must not
                    // issue a now-stale request.
                    if cancelled.load(Ordering::Relaxed) || cancel_requested(&mut cancel_rx) {
                        cancelled.store(true, Ordering::Relaxed);
                        break;
                    }
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            break;
                        }
                    }
                }

                let outcome = issue_request(&client, &template, &mut cancel_rx).await;
                let aborted = outcome.aborted;
                let elapsed = started.elapsed();

                let snapshot = {
                    let mut tally = tally.lock().unwrap();
                    tally.record(&outcome, elapsed);
                    let completed = tally.completed();
                    ProgressSnapshot {
                        completed,
                        target,
                        elapsed_ms: elapsed.as_millis() as u64,
                        duration_ms,
                        throughput_rps: throughput_rps(
                            completed,
                            elapsed.as_secs_f64() * 1000.0,
                        ),
                    }
                };
                if let Some(progress) = progress.as_deref() {
                    progress(snapshot);
                }

                if aborted {
                    cancelled.store(true, Ordering::Relaxed);
                    break;
                }
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle
            .await
            .map_err(|err| format!("Burst worker crashed: {err}"))?;
    }

    let elapsed = started.elapsed();
    let was_cancelled = cancelled.load(Ordering::Relaxed);
    let result = finalize(&tally, elapsed, was_cancelled);
    if result.cancelled {
        info!(total = result.total_requests, "burst run cancelled");
    } else {
        info!(
            total = result.total_requests,
            rps = result.throughput_rps,
            "burst run complete"
        );
    }
    Ok(result)
}

fn worker_limiter(rate_limit: &RateLimit, concurrency: u32) -> Option<TokenBucket> {
    match *rate_limit {
        RateLimit::None => None,
        RateLimit::Global { qps } => Some(TokenBucket::new(qps / concurrency.max(1) as f64)),
        RateLimit::PerWorker { qps } => Some(TokenBucket::new(qps)),
    }
}

fn build_client(config: &RunConfig) -> Result<Client, String> {
    let mut builder = Client::builder();
    builder = if config.transport.follow_redirects {
        builder.redirect(reqwest::redirect::Policy::limited(10))
    } else {
        builder.redirect(reqwest::redirect::Policy::none())
    };
    builder = builder.timeout(Duration::from_millis(config.timeout_ms));

    if let Some(proxy_url) = config
        .transport
        .proxy_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        let proxy = Proxy::all(proxy_url).map_err(|err| format!("Invalid proxy URL: {err}"))?;
        builder = builder.proxy(proxy);
    }

    if !config.transport.verify_ssl {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if !config.transport.keep_alive {
        builder = builder.pool_max_idle_per_host(0);
    }

    builder
        .build()
        .map_err(|err| format!("Failed to build HTTP client: {err}"))
}

async fn issue_request(
    client: &Client,
    template: &RequestTemplate,
    cancel_rx: &mut broadcast::Receiver<()>,
) -> RequestOutcome {
    let started = Instant::now();
    let mut request = client
        .request(template.method.clone(), &template.url)
        .headers(template.headers.clone());
    if let Some(body) = &template.body {
        request = request.body(body.clone());
    }

    let response = tokio::select! {
        response = request.send() => Some(response),
        _ = cancel_rx.recv() => None,
    };
    let Some(response) = response else {
        return RequestOutcome {
            latency_ms: elapsed_ms(started),
            status: None,
            error: Some(ErrorKind::Aborted),
            bytes_in: 0,
            aborted: true,
        };
    };

    match response {
        Ok(response) => {
            let status = response.status().as_u16();
            // The body read stays inside the measured interval: latency
            // covers the full download, not just time-to-first-byte.
            let body = tokio::select! {
                body = response.bytes() => Some(body),
                _ = cancel_rx.recv() => None,
            };
            let Some(body) = body else {
                return RequestOutcome {
                    latency_ms: elapsed_ms(started),
                    status: Some(status),
                    error: Some(ErrorKind::Aborted),
                    bytes_in: 0,
                    aborted: true,
                };
            };
            match body {
                Ok(bytes) => RequestOutcome {
                    latency_ms: elapsed_ms(started),
                    status: Some(status),
                    error: classify_status(status),
                    bytes_in: bytes.len() as u64,
                    aborted: false,
                },
                Err(err) => RequestOutcome {
                    latency_ms: elapsed_ms(started),
                    status: Some(status),
                    error: Some(classify_failure(&err, false)),
                    bytes_in: 0,
                    aborted: false,
                },
            }
        }
        Err(err) => RequestOutcome {
            latency_ms: elapsed_ms(started),
            status: None,
            error: Some(classify_failure(&err, false)),
            bytes_in: 0,
            aborted: false,
        },
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn round_to_3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn finalize(tally: &Mutex<RunTally>, elapsed: Duration, cancelled: bool) -> RunResult {
    let tally = tally.lock().unwrap();
    let sorted = tally.reservoir.sorted();
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let total = tally.completed();

    let latency = if sorted.is_empty() {
        LatencySummary::default()
    } else {
        LatencySummary {
            min_ms: round_to_3(tally.stats.min()),
            avg_ms: round_to_3(tally.stats.mean()),
            max_ms: round_to_3(tally.stats.max()),
            stddev_ms: round_to_3(tally.stats.stddev()),
            p50_ms: round_to_3(percentile(&sorted, 50.0)),
            p90_ms: round_to_3(percentile(&sorted, 90.0)),
            p95_ms: round_to_3(percentile(&sorted, 95.0)),
            p99_ms: round_to_3(percentile(&sorted, 99.0)),
        }
    };

    let timeseries = tally
        .series
        .iter()
        .map(|(&second, bucket)| TimeseriesPoint {
            offset_ms: second * 1000,
            completed: bucket.completed,
            latency_avg_ms: round_to_3(if bucket.completed == 0 {
                0.0
            } else {
                bucket.latency_sum / bucket.completed as f64
            }),
        })
        .collect();

    RunResult {
        total_requests: total,
        success_requests: tally.success,
        failed_requests: tally.failed,
        total_bytes: tally.total_bytes,
        elapsed_ms: elapsed_ms as u64,
        throughput_rps: round_to_3(throughput_rps(total, elapsed_ms)),
        latency,
        histogram: histogram(&sorted, HISTOGRAM_BUCKETS),
        status_counts: tally.status_counts.clone(),
        errors: tally.errors.clone(),
        timeseries,
        cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Debug, Clone, Copy, Default)]
    struct ResponderPlan {
        /// 1-based request number to stall, and for how long.
        stall_on: Option<(u64, Duration)>,
        /// 1-based request number to answer with this status instead of 200.
        status_on: Option<(u64, u16)>,
        /// Applied to every response.
        delay_each: Duration,
    }

    /// Minimal canned HTTP/1.1 responder on a loopback port. Every
    /// response carries a 10-byte body.
    async fn spawn_responder(plan: ResponderPlan) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind responder");
        let addr = listener.local_addr().expect("responder addr");
        let counter = Arc::new(AtomicU64::new(0));

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    loop {
                        let mut request = Vec::new();
                        loop {
                            match stream.read(&mut buf).await {
                                Ok(0) => return,
                                Ok(n) => {
                                    request.extend_from_slice(&buf[..n]);
                                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                                Err(_) => return,
                            }
                        }

                        let seq = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        if !plan.delay_each.is_zero() {
                            tokio::time::sleep(plan.delay_each).await;
                        }
                        if let Some((stall_seq, stall)) = plan.stall_on {
                            if seq == stall_seq {
                                tokio::time::sleep(stall).await;
                            }
                        }
                        let status = match plan.status_on {
                            Some((status_seq, status)) if seq == status_seq => status,
                            _ => 200,
                        };
                        let response = format!(
                            "HTTP/1.1 {status} STATUS\r\ncontent-length: 10\r\n\r\n0123456789"
                        );
                        if stream.write_all(response.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });
        addr
    }

    fn config_for(addr: SocketAddr, total: u64) -> RunConfig {
        RunConfig {
            url: format!("http://{addr}/"),
            method: "GET".to_string(),
            headers: Vec::new(),
            query_params: Vec::new(),
            body: Default::default(),
            basic_auth: None,
            concurrency: 1,
            load: LoadPlan::Requests { total },
            rate_limit: RateLimit::None,
            timeout_ms: 5_000,
            transport: Default::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn five_successes_tally_cleanly() {
        let addr = spawn_responder(ResponderPlan::default()).await;
        let snapshots: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = snapshots.clone();
        let progress: ProgressFn = Arc::new(move |snapshot| {
            sink.lock().unwrap().push(snapshot);
        });

        let cancel = CancelHandle::new();
        let result = execute_run(config_for(addr, 5), Some(progress), &cancel)
            .await
            .expect("run");

        assert_eq!(result.total_requests, 5);
        assert_eq!(result.success_requests, 5);
        assert_eq!(result.failed_requests, 0);
        assert_eq!(result.errors.total(), 0);
        assert_eq!(result.total_bytes, 50);
        assert_eq!(result.status_counts.get(&200), Some(&5));
        assert!(!result.cancelled);

        let histogram_total: u64 = result.histogram.iter().map(|b| b.count).sum();
        assert_eq!(histogram_total, 5);
        assert!(result.latency.p50_ms <= result.latency.p90_ms);
        assert!(result.latency.p90_ms <= result.latency.p95_ms);
        assert!(result.latency.p95_ms <= result.latency.p99_ms);
        assert!(result.latency.p99_ms <= result.latency.max_ms);
        assert!(result.latency.min_ms <= result.latency.p50_ms);

        let snapshots = snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 5);
        assert!(snapshots.windows(2).all(|w| w[0].completed <= w[1].completed));
        assert_eq!(snapshots.last().map(|s| s.completed), Some(5));
        assert_eq!(snapshots.last().and_then(|s| s.target), Some(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timeout_is_classified_not_fatal() {
        let addr = spawn_responder(ResponderPlan {
            stall_on: Some((3, Duration::from_secs(2))),
            ..Default::default()
        })
        .await;
        let mut config = config_for(addr, 5);
        config.timeout_ms = 200;

        let cancel = CancelHandle::new();
        let result = execute_run(config, None, &cancel).await.expect("run");

        assert_eq!(result.total_requests, 5);
        assert_eq!(result.success_requests, 4);
        assert_eq!(result.failed_requests, 1);
        assert_eq!(result.errors.timeout, 1);
        assert_eq!(result.errors.total(), 1);
        assert!(!result.cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn http_5xx_counts_as_failure() {
        let addr = spawn_responder(ResponderPlan {
            status_on: Some((2, 500)),
            ..Default::default()
        })
        .await;

        let cancel = CancelHandle::new();
        let result = execute_run(config_for(addr, 4), None, &cancel)
            .await
            .expect("run");

        assert_eq!(result.total_requests, 4);
        assert_eq!(result.success_requests, 3);
        assert_eq!(result.failed_requests, 1);
        assert_eq!(result.errors.http_5xx, 1);
        assert_eq!(result.status_counts.get(&500), Some(&1));
        assert_eq!(result.status_counts.get(&200), Some(&3));
        // The failed response body was still read and measured.
        assert_eq!(result.total_bytes, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancellation_between_requests_keeps_partial_result() {
        let addr = spawn_responder(ResponderPlan {
            delay_each: Duration::from_millis(20),
            ..Default::default()
        })
        .await;

        let cancel = CancelHandle::new();
        let trigger = cancel.clone();
        let progress: ProgressFn = Arc::new(move |snapshot: ProgressSnapshot| {
            if snapshot.completed == 2 {
                trigger.cancel();
            }
        });

        let result = execute_run(config_for(addr, 10), Some(progress), &cancel)
            .await
            .expect("run");

        assert!(result.cancelled);
        assert!(result.total_requests < 10);
        assert!(result.total_requests >= 2);
        assert_eq!(
            result.success_requests + result.failed_requests,
            result.total_requests
        );
        assert_eq!(result.errors.total(), result.failed_requests);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancellation_aborts_the_inflight_request() {
        let addr = spawn_responder(ResponderPlan {
            delay_each: Duration::from_millis(400),
            ..Default::default()
        })
        .await;

        let cancel = CancelHandle::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = execute_run(config_for(addr, 10), None, &cancel)
            .await
            .expect("run");

        assert!(result.cancelled);
        assert_eq!(result.total_requests, 1);
        assert_eq!(result.failed_requests, 1);
        assert_eq!(result.errors.aborted, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn global_rate_limit_paces_the_run() {
        let addr = spawn_responder(ResponderPlan::default()).await;
        let mut config = config_for(addr, 8);
        config.concurrency = 2;
        config.rate_limit = RateLimit::Global { qps: 4.0 };

        let started = std::time::Instant::now();
        let cancel = CancelHandle::new();
        let result = execute_run(config, None, &cancel).await.expect("run");
        let elapsed = started.elapsed();

        assert_eq!(result.total_requests, 8);
        // 4 qps split across 2 workers: a 2-token burst each, then four
        // more requests at the steady rate take at least ~1s.
        assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn duration_mode_stops_at_the_deadline() {
        let addr = spawn_responder(ResponderPlan {
            delay_each: Duration::from_millis(10),
            ..Default::default()
        })
        .await;
        let mut config = config_for(addr, 1);
        config.concurrency = 2;
        config.load = LoadPlan::Duration { duration_ms: 300 };

        let cancel = CancelHandle::new();
        let result = execute_run(config, None, &cancel).await.expect("run");

        assert!(!result.cancelled);
        assert!(result.total_requests >= 1);
        assert_eq!(
            result.success_requests + result.failed_requests,
            result.total_requests
        );
        assert!(result.elapsed_ms >= 300);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_request() {
        let cancel = CancelHandle::new();
        let mut config = config_for("127.0.0.1:80".parse().unwrap(), 5);
        config.url = String::new();
        assert!(execute_run(config, None, &cancel).await.is_err());

        let mut config = config_for("127.0.0.1:80".parse().unwrap(), 5);
        config.concurrency = 0;
        assert!(execute_run(config, None, &cancel).await.is_err());
    }
}
