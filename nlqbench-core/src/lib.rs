//! Result equivalence and measurement engine for NL-to-query benchmarking.
//!
//! The engine decides whether a generated query's tabular result is
//! equivalent to a precomputed golden result under configurable rules,
//! derives trustworthy latency statistics from noisy repeated
//! measurements, and cross-checks self-reported timing and token data for
//! internal consistency.
//!
//! Everything here is pure and synchronous: no I/O, no shared mutable
//! state. Comparators and validators may run concurrently on independent
//! inputs without coordination; the profiler is deliberately sequential
//! within one invocation.

pub mod comparator;
pub mod cost;
pub mod error;
pub mod profiler;
pub mod robustness;
pub mod rules;
pub mod types;
pub mod validator;

pub use comparator::{compare, MismatchLocation, Verdict};
pub use error::{Error, Result};
pub use profiler::{PerformanceMetrics, Sampler, SamplerConfig};
pub use robustness::{aggregate, RobustnessScore, TierAccuracy};
pub use rules::{ComparisonRules, FloatComparisonMode, NullHandling, RuleOverrides, StringNormalization};
pub use types::{
    Column, PhaseTime, QualityTier, ResultSet, SelfReport, SemanticType, TokenUsage, Value,
};
pub use validator::{ConsistencyValidator, RollingHistory, Severity, ValidationResult, ValidatorConfig};
