//! Fixed-size uniform sample of numeric observations (Algorithm R)

use crate::{Result, ScanError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform random sample of at most `max_size` values, kept in ascending
/// order, plus exact running `count`, `sum`, `min` and `max`.
///
/// While fewer than `max_size` values have been added, the sample holds all
/// of them and the quartiles are exact. After that every value seen so far
/// has had the same `max_size / count` chance to be in the sample.
#[derive(Debug, Clone)]
pub struct NumericReservoir {
    samples: Vec<f64>,
    max_size: usize,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    rng: StdRng,
}

impl NumericReservoir {
    pub fn new(max_size: usize) -> Result<Self> {
        Self::with_rng(max_size, StdRng::from_os_rng())
    }

    /// Reservoir with a deterministic random source
    pub fn with_seed(max_size: usize, seed: u64) -> Result<Self> {
        Self::with_rng(max_size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_size: usize, rng: StdRng) -> Result<Self> {
        if max_size == 0 {
            return Err(ScanError::Configuration(
                "numeric stats reservoir size must be greater than zero".into(),
            ));
        }

        Ok(Self {
            samples: Vec::with_capacity(max_size.min(1 << 16)),
            max_size,
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            rng,
        })
    }

    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if self.samples.len() < self.max_size {
            let pos = self.samples.partition_point(|&s| s < value);
            self.samples.insert(pos, value);
            return;
        }

        let j = self.rng.random_range(0..self.count);
        if j < self.max_size as u64 {
            self.replace(j as usize, value);
        }
    }

    /// Replace the sample at rank `victim` with `value`, keeping the order
    /// with a single shift of the elements in between.
    fn replace(&mut self, victim: usize, value: f64) {
        let pos = self.samples.partition_point(|&s| s < value);
        if pos <= victim {
            self.samples.copy_within(pos..victim, pos + 1);
            self.samples[pos] = value;
        } else {
            self.samples.copy_within(victim + 1..pos, victim);
            self.samples[pos - 1] = value;
        }
    }

    /// 25th, 50th and 75th percentile of the sample
    pub fn quartiles(&self) -> (f64, f64, f64) {
        (
            self.quantile(0.25),
            self.quantile(0.5),
            self.quantile(0.75),
        )
    }

    fn quantile(&self, fraction: f64) -> f64 {
        let k = self.samples.len();
        match k {
            0 => f64::NAN,
            1 => self.samples[0],
            _ => {
                let pos = fraction * (k + 1) as f64;
                let lower = pos.floor();
                if lower < 1.0 {
                    return self.samples[0];
                }
                if lower >= k as f64 {
                    return self.samples[k - 1];
                }
                let idx = lower as usize;
                let below = self.samples[idx - 1];
                let above = self.samples[idx];
                below + (pos - lower) * (above - below)
            }
        }
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.sum / self.count as f64
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.min
        }
    }

    pub fn max(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.max
        }
    }

    /// Sample standard deviation over the retained values
    pub fn std_dev(&self) -> f64 {
        let k = self.samples.len();
        if k < 2 {
            return f64::NAN;
        }
        let mean = self.samples.iter().sum::<f64>() / k as f64;
        let variance = self
            .samples
            .iter()
            .map(|&x| (x - mean).powi(2))
            .sum::<f64>()
            / (k - 1) as f64;
        variance.sqrt()
    }

    /// Total number of values ever added
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of values currently retained
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// True when the sample no longer holds every value seen
    pub fn is_estimate(&self) -> bool {
        self.count > self.max_size as u64
    }
}
