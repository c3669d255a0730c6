use serde::{Deserialize, Serialize};

// Hard ceilings. These bound what a single run may ask of the host
// process and are not negotiable at runtime.
pub const MAX_CONCURRENCY: u32 = 256;
pub const MAX_TOTAL_REQUESTS: u64 = 100_000;
pub const MAX_DURATION_MS: u64 = 300_000;
pub const MAX_QPS: f64 = 1_000.0;
pub const MAX_TIMEOUT_MS: u64 = 120_000;

fn default_enabled() -> bool {
    true
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderRow {
    pub name: String,
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParamRow {
    pub name: String,
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyMode {
    #[default]
    None,
    Raw,
    Json,
    Form,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyConfig {
    #[serde(default)]
    pub mode: BodyMode,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Stop condition for a run: a fixed number of requests, or a fixed
/// wall-clock window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadPlan {
    Requests { total: u64 },
    #[serde(rename_all = "camelCase")]
    Duration { duration_ms: u64 },
}

/// Admission control for request issuance. `Global` splits the configured
/// rate evenly across workers; `PerWorker` gives each worker the full rate,
/// so aggregate throughput scales with concurrency.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateLimit {
    #[default]
    None,
    Global { qps: f64 },
    PerWorker { qps: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    #[serde(default = "default_true")]
    pub keep_alive: bool,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            follow_redirects: true,
            proxy_url: None,
            verify_ssl: true,
        }
    }
}

/// Fully-resolved configuration for one run. Immutable once handed to the
/// engine; validated once at the boundary rather than checked ad hoc.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Vec<HeaderRow>,
    #[serde(default)]
    pub query_params: Vec<QueryParamRow>,
    #[serde(default)]
    pub body: BodyConfig,
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,
    pub concurrency: u32,
    pub load: LoadPlan,
    #[serde(default)]
    pub rate_limit: RateLimit,
    pub timeout_ms: u64,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("Run target URL must not be empty".to_string());
        }
        if self.method.trim().is_empty() {
            return Err("Run HTTP method must not be empty".to_string());
        }
        if self.concurrency == 0 {
            return Err("Run concurrency must be greater than 0".to_string());
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "Run concurrency must not exceed {MAX_CONCURRENCY}"
            ));
        }
        match self.load {
            LoadPlan::Requests { total } => {
                if total == 0 {
                    return Err("Request-count mode requires total > 0".to_string());
                }
                if total > MAX_TOTAL_REQUESTS {
                    return Err(format!(
                        "Request-count mode must not exceed {MAX_TOTAL_REQUESTS} requests"
                    ));
                }
            }
            LoadPlan::Duration { duration_ms } => {
                if duration_ms == 0 {
                    return Err("Duration mode requires durationMs > 0".to_string());
                }
                if duration_ms > MAX_DURATION_MS {
                    return Err(format!(
                        "Duration mode must not exceed {MAX_DURATION_MS} ms"
                    ));
                }
            }
        }
        match self.rate_limit {
            RateLimit::None => {}
            RateLimit::Global { qps } | RateLimit::PerWorker { qps } => {
                if !(qps > 0.0) {
                    return Err("Rate limit QPS must be greater than 0".to_string());
                }
                if qps > MAX_QPS {
                    return Err(format!("Rate limit QPS must not exceed {MAX_QPS}"));
                }
            }
        }
        if self.timeout_ms == 0 {
            return Err("Run timeoutMs must be greater than 0".to_string());
        }
        if self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(format!("Run timeoutMs must not exceed {MAX_TIMEOUT_MS}"));
        }
        Ok(())
    }
}
