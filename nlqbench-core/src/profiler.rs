//! Latency profiling: warmup, repeated measurement, trimmed statistics.
//!
//! Intentionally single-threaded within one invocation; interleaving other
//! load on the same resource would corrupt the measurements. Concurrent
//! profiling means independent [`Sampler`] instances, each in its own
//! execution context.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Tunable measurement protocol constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Runs executed and discarded before measurement starts
    pub warmup_runs: usize,
    /// Measurement runs attempted
    pub measurement_runs: usize,
    /// Minimum successful runs required to produce metrics
    pub min_samples: usize,
    /// Surviving-sample count at which the single highest and lowest
    /// samples are dropped from mean/std-dev
    pub trim_threshold: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            warmup_runs: 1,
            measurement_runs: 10,
            min_samples: 3,
            trim_threshold: 5,
        }
    }
}

/// Immutable latency statistics derived from one profiling invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Median over the full surviving sample set
    pub median_ms: f64,
    /// Trimmed mean (extremes dropped once enough samples survive)
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Sample standard deviation over the trimmed set
    pub std_dev_ms: f64,
    /// Retained samples, sorted ascending
    pub samples: Vec<f64>,
    /// Warmup runs that preceded measurement
    pub warmup_runs: usize,
    /// Measurement runs that failed and were excluded
    pub failed_runs: usize,
}

/// Executes a measurement callback repeatedly and derives latency metrics
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Run the full protocol against a callback: warmup runs with errors
    /// swallowed, then measurement runs timed on a monotonic clock with
    /// failures excluded but counted.
    ///
    /// Fails with [`Error::InsufficientSamples`] when fewer than the
    /// configured floor of runs succeed. The callback may block; timeouts,
    /// if wanted, wrap the callback before it gets here.
    pub fn measure<T, E: fmt::Display>(
        &self,
        mut invoke: impl FnMut() -> std::result::Result<T, E>,
    ) -> Result<PerformanceMetrics> {
        for run in 0..self.config.warmup_runs {
            if let Err(e) = invoke() {
                log::debug!("warmup run {} failed: {}", run, e);
            }
        }

        let mut samples = Vec::with_capacity(self.config.measurement_runs);
        let mut failed_runs = 0;
        for run in 0..self.config.measurement_runs {
            let start = Instant::now();
            match invoke() {
                Ok(_) => samples.push(start.elapsed().as_secs_f64() * 1000.0),
                Err(e) => {
                    failed_runs += 1;
                    log::warn!("measurement run {} failed, excluding: {}", run, e);
                }
            }
        }

        self.from_samples(samples, failed_runs)
    }

    /// Derive metrics from an externally collected sample set, applying the
    /// same floor and trimming policy as [`Sampler::measure`]. Used by
    /// drivers that time asynchronous round trips themselves.
    pub fn from_samples(
        &self,
        samples: Vec<f64>,
        failed_runs: usize,
    ) -> Result<PerformanceMetrics> {
        if samples.len() < self.config.min_samples {
            return Err(Error::InsufficientSamples {
                got: samples.len(),
                floor: self.config.min_samples,
            });
        }
        Ok(compute_metrics(
            samples,
            self.config.warmup_runs,
            failed_runs,
            self.config.trim_threshold,
        ))
    }
}

/// Compute the metric set over a non-empty sample list.
///
/// Median and percentiles always use the full set; mean and standard
/// deviation drop the single highest and lowest sample once at least
/// `trim_threshold` samples survive, which removes one-off spikes without
/// flattening the distribution the percentiles describe.
pub fn compute_metrics(
    mut samples: Vec<f64>,
    warmup_runs: usize,
    failed_runs: usize,
    trim_threshold: usize,
) -> PerformanceMetrics {
    debug_assert!(!samples.is_empty());
    samples.sort_by(f64::total_cmp);

    let trimmed: &[f64] = if samples.len() >= trim_threshold {
        &samples[1..samples.len() - 1]
    } else {
        &samples
    };

    let mean = trimmed.iter().sum::<f64>() / trimmed.len() as f64;
    let std_dev = if trimmed.len() > 1 {
        let var = trimmed
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / (trimmed.len() - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };

    PerformanceMetrics {
        median_ms: median(&samples),
        mean_ms: mean,
        p50_ms: percentile(&samples, 0.50),
        p95_ms: percentile(&samples, 0.95),
        p99_ms: percentile(&samples, 0.99),
        min_ms: samples[0],
        max_ms: samples[samples.len() - 1],
        std_dev_ms: std_dev,
        samples,
        warmup_runs,
        failed_runs,
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Percentile by rank: index `floor(len * p)`, clamped to the last sample
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn trims_extremes_but_keeps_median_untrimmed() {
        let metrics = compute_metrics(vec![100.0, 102.0, 99.0, 500.0, 101.0], 0, 0, 5);
        assert_eq!(metrics.median_ms, 101.0);
        // mean over [100, 101, 102], the 99 and 500 extremes dropped
        assert!((metrics.mean_ms - 101.0).abs() < 1e-9);
        assert_eq!(metrics.min_ms, 99.0);
        assert_eq!(metrics.max_ms, 500.0);
        assert_eq!(metrics.p95_ms, 500.0);
    }

    #[test]
    fn small_sets_are_not_trimmed() {
        let metrics = compute_metrics(vec![10.0, 20.0, 90.0], 0, 0, 5);
        assert!((metrics.mean_ms - 40.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_indexing_clamps_to_last() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.50), 3.0);
        assert_eq!(percentile(&sorted, 0.95), 5.0);
        assert_eq!(percentile(&sorted, 0.99), 5.0);
        assert_eq!(percentile(&sorted, 1.0), 5.0);
    }

    #[test]
    fn constant_samples_collapse_all_metrics() {
        let sampler = Sampler::new(SamplerConfig {
            warmup_runs: 0,
            measurement_runs: 8,
            ..Default::default()
        });
        let metrics = sampler.from_samples(vec![42.0; 8], 0).unwrap();
        assert_eq!(metrics.p50_ms, 42.0);
        assert_eq!(metrics.p95_ms, 42.0);
        assert_eq!(metrics.p99_ms, 42.0);
        assert_eq!(metrics.min_ms, 42.0);
        assert_eq!(metrics.max_ms, 42.0);
        assert_eq!(metrics.std_dev_ms, 0.0);
    }

    #[test]
    fn too_few_successes_is_a_hard_error() {
        let sampler = Sampler::new(SamplerConfig {
            warmup_runs: 0,
            measurement_runs: 5,
            min_samples: 3,
            trim_threshold: 5,
        });
        let mut calls = 0usize;
        let result = sampler.measure(|| {
            calls += 1;
            if calls <= 3 {
                Err("backend unavailable")
            } else {
                Ok(())
            }
        });
        match result {
            Err(Error::InsufficientSamples { got, floor }) => {
                assert_eq!(got, 2);
                assert_eq!(floor, 3);
            }
            other => panic!("expected InsufficientSamples, got {:?}", other),
        }
    }

    #[test]
    fn failed_runs_are_counted_not_fatal() {
        let sampler = Sampler::new(SamplerConfig {
            warmup_runs: 0,
            measurement_runs: 6,
            min_samples: 3,
            trim_threshold: 5,
        });
        let mut calls = 0usize;
        let metrics = sampler
            .measure(|| {
                calls += 1;
                if calls % 2 == 0 {
                    Err("flaky")
                } else {
                    Ok(())
                }
            })
            .unwrap();
        assert_eq!(metrics.failed_runs, 3);
        assert_eq!(metrics.samples.len(), 3);
    }

    #[test]
    fn warmup_errors_are_swallowed() {
        let sampler = Sampler::new(SamplerConfig {
            warmup_runs: 2,
            measurement_runs: 3,
            min_samples: 3,
            trim_threshold: 5,
        });
        let mut calls = 0usize;
        let metrics = sampler
            .measure(|| {
                calls += 1;
                // fail during warmup only
                if calls <= 2 {
                    Err("cold start")
                } else {
                    Ok(())
                }
            })
            .unwrap();
        assert_eq!(metrics.warmup_runs, 2);
        assert_eq!(metrics.failed_runs, 0);
        assert_eq!(metrics.samples.len(), 3);
    }

    proptest! {
        #[test]
        fn min_median_max_are_ordered(
            samples in prop::collection::vec(0.1f64..10_000.0, 1..50)
        ) {
            let metrics = compute_metrics(samples, 0, 0, 5);
            prop_assert!(metrics.min_ms <= metrics.median_ms);
            prop_assert!(metrics.median_ms <= metrics.max_ms);
            prop_assert!(metrics.p50_ms <= metrics.p95_ms);
            prop_assert!(metrics.p95_ms <= metrics.p99_ms);
        }

        #[test]
        fn trimmed_mean_lies_within_sample_range(
            samples in prop::collection::vec(0.1f64..10_000.0, 3..50)
        ) {
            let metrics = compute_metrics(samples, 0, 0, 5);
            prop_assert!(metrics.mean_ms >= metrics.min_ms);
            prop_assert!(metrics.mean_ms <= metrics.max_ms);
        }
    }
}
