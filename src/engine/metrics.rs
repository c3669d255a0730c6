use crate::domain::HistogramBucket;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound on retained latency samples per run. The bound exists to
/// cap memory, not to be tuned per run.
pub const RESERVOIR_CAPACITY: usize = 10_000;

pub const HISTOGRAM_BUCKETS: usize = 10;

/// Uniform fixed-capacity sample of a stream of unknown length
/// (algorithm R). Every offered value has probability `capacity / seen`
/// of surviving in the final sample.
#[derive(Debug)]
pub struct Reservoir {
    capacity: usize,
    seen: u64,
    values: Vec<f64>,
    rng: StdRng,
}

impl Reservoir {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            capacity,
            seen: 0,
            values: Vec::with_capacity(capacity),
            rng,
        }
    }

    pub fn offer(&mut self, value: f64) {
        self.seen += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
            return;
        }
        let slot = self.rng.gen_range(0..self.seen);
        if (slot as usize) < self.capacity {
            self.values[slot as usize] = value;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Ascending snapshot of the current sample.
    pub fn sorted(&self) -> Vec<f64> {
        let mut values = self.values.clone();
        values.sort_by(|left, right| left.partial_cmp(right).unwrap_or(std::cmp::Ordering::Equal));
        values
    }
}

/// Linear-interpolation percentile over an ascending slice. Empty input
/// yields 0; a single sample yields itself.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (rank.ceil() as usize).min(sorted.len() - 1);
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Equal-width bucketing over `[min, max]`. The last bucket is closed so
/// the maximum lands inside it; all others are `[start, end)`. Degenerate
/// input (min == max) collapses to a single bucket holding everything.
pub fn histogram(sorted: &[f64], bucket_count: usize) -> Vec<HistogramBucket> {
    if sorted.is_empty() || bucket_count == 0 {
        return Vec::new();
    }
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    if max <= min {
        return vec![HistogramBucket {
            lower_bound_ms: min,
            upper_bound_ms: max,
            count: sorted.len() as u64,
        }];
    }

    let width = (max - min) / bucket_count as f64;
    let mut buckets: Vec<HistogramBucket> = (0..bucket_count)
        .map(|idx| HistogramBucket {
            lower_bound_ms: min + width * idx as f64,
            upper_bound_ms: if idx == bucket_count - 1 {
                max
            } else {
                min + width * (idx + 1) as f64
            },
            count: 0,
        })
        .collect();

    for &value in sorted {
        let mut idx = ((value - min) / width) as usize;
        if idx >= bucket_count {
            idx = bucket_count - 1;
        }
        buckets[idx].count += 1;
    }
    buckets
}

/// Welford's online mean/variance, plus min/max. Numerically stable and
/// O(1) memory regardless of how many samples flow through.
#[derive(Debug, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn stddev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count as f64 - 1.0)).sqrt()
    }
}

pub fn throughput_rps(completed: u64, elapsed_ms: f64) -> f64 {
    if elapsed_ms <= 0.0 {
        return 0.0;
    }
    completed as f64 / (elapsed_ms / 1000.0)
}
