//! Cross-validation of self-reported timing and token data.
//!
//! Every check always emits a [`ValidationResult`], passed or not, so
//! callers can keep a full audit trail. Checks never block and never
//! mutate the measurement; the caller decides what a failed check means.

use crate::types::{SelfReport, TokenUsage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity of a validation finding
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One check's outcome over a single self-reported measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Stable check identifier, e.g. `timing.phase_sum`
    pub check: String,
    pub passed: bool,
    pub severity: Severity,
    pub reason: String,
    /// Named facts backing the verdict
    pub evidence: BTreeMap<String, String>,
}

impl ValidationResult {
    fn new(check: &str, passed: bool, severity: Severity, reason: String) -> Self {
        Self {
            check: check.to_string(),
            passed,
            severity,
            reason,
            evidence: BTreeMap::new(),
        }
    }

    fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.evidence.insert(key.to_string(), value.to_string());
        self
    }
}

/// Tunable plausibility thresholds. Heuristics, not physical law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Allowed absolute gap between the sub-phase sum and the reported total
    pub phase_sum_tolerance_ms: f64,
    /// Allowed absolute gap between the reported total and the
    /// client-measured total (which includes transport overhead)
    pub client_total_tolerance_ms: f64,
    /// Any individual sub-phase faster than this is implausible
    pub min_phase_ms: f64,
    /// Reported totals below this fraction of the rolling historical
    /// average are flagged as anomalously fast
    pub historical_fast_ratio: f64,
    /// Accepted band for reported tokens as a multiple of the estimate
    pub token_band_low: f64,
    pub token_band_high: f64,
    /// Rolling reported/estimated token ratio below this flags systematic
    /// under-reporting
    pub under_reporting_floor: f64,
    /// Observations required before the rolling-average checks engage
    pub min_history: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            phase_sum_tolerance_ms: 50.0,
            client_total_tolerance_ms: 200.0,
            min_phase_ms: 10.0,
            historical_fast_ratio: 0.3,
            token_band_low: 0.7,
            token_band_high: 1.3,
            under_reporting_floor: 0.6,
            min_history: 3,
        }
    }
}

/// Rolling per-run accumulator for the historical checks.
///
/// Explicitly injected, never global: reset per benchmark run, append-only
/// during measurement. Timing averages are grouped by a caller-supplied
/// cohort label (question id or complexity class) so only comparable
/// questions are averaged together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollingHistory {
    totals_ms: BTreeMap<String, Vec<f64>>,
    token_ratios: Vec<f64>,
}

impl RollingHistory {
    pub fn record_total(&mut self, cohort: &str, total_ms: f64) {
        self.totals_ms
            .entry(cohort.to_string())
            .or_default()
            .push(total_ms);
    }

    pub fn total_count(&self, cohort: &str) -> usize {
        self.totals_ms.get(cohort).map(Vec::len).unwrap_or(0)
    }

    pub fn average_total(&self, cohort: &str) -> Option<f64> {
        let totals = self.totals_ms.get(cohort)?;
        if totals.is_empty() {
            return None;
        }
        Some(totals.iter().sum::<f64>() / totals.len() as f64)
    }

    pub fn record_token_ratio(&mut self, ratio: f64) {
        self.token_ratios.push(ratio);
    }

    pub fn token_ratio_count(&self) -> usize {
        self.token_ratios.len()
    }

    pub fn average_token_ratio(&self) -> Option<f64> {
        if self.token_ratios.is_empty() {
            return None;
        }
        Some(self.token_ratios.iter().sum::<f64>() / self.token_ratios.len() as f64)
    }

    pub fn reset(&mut self) {
        self.totals_ms.clear();
        self.token_ratios.clear();
    }
}

/// Checks self-reported measurements for arithmetic consistency and
/// statistical plausibility against independent evidence.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyValidator {
    config: ValidatorConfig,
    history: RollingHistory,
}

impl ConsistencyValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            history: RollingHistory::default(),
        }
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    /// Drop all accumulated history, e.g. at the start of a new run
    pub fn reset_history(&mut self) {
        self.history.reset();
    }

    /// Run all timing checks against one measurement. `cohort` groups
    /// comparable questions for the historical baseline;
    /// `client_measured_total_ms` is the harness's own wall-clock
    /// measurement of the same round trip.
    pub fn validate_timing(
        &mut self,
        cohort: &str,
        report: &SelfReport,
        client_measured_total_ms: f64,
    ) -> Vec<ValidationResult> {
        let cfg = &self.config;
        let total = report.total_time_ms;
        let mut results = Vec::with_capacity(4);

        // phase sum vs reported total
        if report.phases.is_empty() {
            results.push(
                ValidationResult::new(
                    "timing.phase_sum",
                    true,
                    Severity::Medium,
                    "no sub-phase times reported".to_string(),
                )
                .with("total_time_ms", total),
            );
        } else {
            let phase_sum: f64 = report.phases.iter().map(|p| p.elapsed_ms).sum();
            let gap = (phase_sum - total).abs();
            let passed = gap <= cfg.phase_sum_tolerance_ms;
            let reason = if passed {
                format!("sub-phases sum to {:.1} ms, within tolerance", phase_sum)
            } else {
                format!(
                    "sub-phases sum to {:.1} ms but total is {:.1} ms (gap {:.1} ms)",
                    phase_sum, total, gap
                )
            };
            results.push(
                ValidationResult::new("timing.phase_sum", passed, Severity::Medium, reason)
                    .with("phase_sum_ms", phase_sum)
                    .with("total_time_ms", total)
                    .with("tolerance_ms", cfg.phase_sum_tolerance_ms),
            );
        }

        // reported total vs client-measured total
        let client_gap = (total - client_measured_total_ms).abs();
        let client_ok = client_gap <= cfg.client_total_tolerance_ms;
        let reason = if client_ok {
            format!(
                "reported total within {:.0} ms of client measurement",
                cfg.client_total_tolerance_ms
            )
        } else {
            format!(
                "reported total {:.1} ms disagrees with client-measured {:.1} ms (gap {:.1} ms)",
                total, client_measured_total_ms, client_gap
            )
        };
        results.push(
            ValidationResult::new("timing.client_total", client_ok, Severity::High, reason)
                .with("total_time_ms", total)
                .with("client_measured_total_ms", client_measured_total_ms)
                .with("tolerance_ms", cfg.client_total_tolerance_ms),
        );

        // per-phase implausibility floor
        let implausible: Vec<&str> = report
            .phases
            .iter()
            .filter(|p| p.elapsed_ms < cfg.min_phase_ms)
            .map(|p| p.name.as_str())
            .collect();
        let floor_ok = implausible.is_empty();
        let reason = if floor_ok {
            "all sub-phase times are plausible".to_string()
        } else {
            format!(
                "implausibly fast sub-phases (< {:.0} ms): {}",
                cfg.min_phase_ms,
                implausible.join(", ")
            )
        };
        results.push(
            ValidationResult::new("timing.phase_floor", floor_ok, Severity::High, reason)
                .with("min_phase_ms", cfg.min_phase_ms)
                .with("implausible_count", implausible.len()),
        );

        // reported total vs rolling historical average for the cohort
        let history_check = match self.history.average_total(cohort) {
            Some(avg) if self.history.total_count(cohort) >= cfg.min_history => {
                let threshold = avg * cfg.historical_fast_ratio;
                let passed = total >= threshold;
                let reason = if passed {
                    format!("total consistent with cohort average {:.1} ms", avg)
                } else {
                    format!(
                        "anomalously fast: {:.1} ms is below {:.0}% of the cohort average \
                         {:.1} ms, possible cached or precomputed response",
                        total,
                        cfg.historical_fast_ratio * 100.0,
                        avg
                    )
                };
                ValidationResult::new("timing.historical", passed, Severity::Medium, reason)
                    .with("cohort", cohort)
                    .with("rolling_average_ms", avg)
                    .with("threshold_ms", threshold)
            }
            _ => ValidationResult::new(
                "timing.historical",
                true,
                Severity::Medium,
                "insufficient history for this cohort".to_string(),
            )
            .with("cohort", cohort)
            .with("observations", self.history.total_count(cohort)),
        };
        results.push(history_check);

        // the independent client measurement feeds the baseline, so a
        // dishonest report cannot drag its own cohort average down
        self.history.record_total(cohort, client_measured_total_ms);

        results
    }

    /// Run all token checks against one reported usage. `estimated_tokens`
    /// comes from the deterministic estimator over question text + schema.
    pub fn validate_token_usage(
        &mut self,
        estimated_tokens: u64,
        usage: &TokenUsage,
    ) -> Vec<ValidationResult> {
        let cfg = &self.config;
        let mut results = Vec::with_capacity(3);

        // input + output must equal total exactly
        let sum = usage.input_tokens + usage.output_tokens;
        let sum_ok = sum == usage.total_tokens;
        let reason = if sum_ok {
            "input and output tokens sum to the reported total".to_string()
        } else {
            format!(
                "token sum mismatch: {} + {} = {} but total is {}",
                usage.input_tokens, usage.output_tokens, sum, usage.total_tokens
            )
        };
        results.push(
            ValidationResult::new("tokens.sum", sum_ok, Severity::Medium, reason)
                .with("input_tokens", usage.input_tokens)
                .with("output_tokens", usage.output_tokens)
                .with("total_tokens", usage.total_tokens),
        );

        // total vs independent estimate band
        if estimated_tokens == 0 {
            results.push(
                ValidationResult::new(
                    "tokens.estimate_band",
                    true,
                    Severity::Medium,
                    "no token estimate available".to_string(),
                )
                .with("total_tokens", usage.total_tokens),
            );
        } else {
            let low = estimated_tokens as f64 * cfg.token_band_low;
            let high = estimated_tokens as f64 * cfg.token_band_high;
            let total = usage.total_tokens as f64;
            let band_ok = total >= low && total <= high;
            let reason = if band_ok {
                format!(
                    "reported total within [{:.0}, {:.0}] of estimate {}",
                    low, high, estimated_tokens
                )
            } else {
                format!(
                    "reported total {} outside [{:.0}, {:.0}] for estimate {}",
                    usage.total_tokens, low, high, estimated_tokens
                )
            };
            results.push(
                ValidationResult::new("tokens.estimate_band", band_ok, Severity::Medium, reason)
                    .with("estimated_tokens", estimated_tokens)
                    .with("total_tokens", usage.total_tokens)
                    .with("band_low", low)
                    .with("band_high", high),
            );

            self.history
                .record_token_ratio(usage.total_tokens as f64 / estimated_tokens as f64);
        }

        // systematic under-reporting trend
        let trend = match self.history.average_token_ratio() {
            Some(avg) if self.history.token_ratio_count() >= cfg.min_history => {
                let passed = avg >= cfg.under_reporting_floor;
                let reason = if passed {
                    format!("rolling reported/estimated ratio {:.2} is healthy", avg)
                } else {
                    format!(
                        "systematic under-reporting: rolling reported/estimated ratio \
                         {:.2} is below {:.2}",
                        avg, cfg.under_reporting_floor
                    )
                };
                ValidationResult::new("tokens.reporting_trend", passed, Severity::High, reason)
                    .with("rolling_ratio", avg)
                    .with("floor", cfg.under_reporting_floor)
            }
            _ => ValidationResult::new(
                "tokens.reporting_trend",
                true,
                Severity::High,
                "insufficient history for a reporting trend".to_string(),
            )
            .with("observations", self.history.token_ratio_count()),
        };
        results.push(trend);

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhaseTime;

    fn report(total: f64, phases: &[(&str, f64)]) -> SelfReport {
        SelfReport {
            total_time_ms: total,
            phases: phases
                .iter()
                .map(|(n, ms)| PhaseTime::new(*n, *ms))
                .collect(),
            token_usage: None,
        }
    }

    fn assert_check(results: &[ValidationResult], check: &str, passed: bool) {
        let r = results
            .iter()
            .find(|r| r.check == check)
            .unwrap_or_else(|| panic!("missing check {}", check));
        assert_eq!(r.passed, passed, "{}: {}", check, r.reason);
    }

    #[test]
    fn consistent_report_passes_every_check() {
        let mut validator = ConsistencyValidator::default();
        let report = report(
            924.0,
            &[("parse", 234.0), ("generate", 123.0), ("execute", 567.0)],
        );
        let results = validator.validate_timing("L3", &report, 930.0);
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn phase_sum_gap_beyond_tolerance_fails() {
        let mut validator = ConsistencyValidator::default();
        // phases sum to 800, total claims 900: gap 100 > 50
        let r = report(900.0, &[("parse", 300.0), ("execute", 500.0)]);
        let results = validator.validate_timing("L1", &r, 910.0);
        assert_check(&results, "timing.phase_sum", false);
        assert_check(&results, "timing.client_total", true);
    }

    #[test]
    fn phase_sum_tolerance_is_inclusive() {
        let mut validator = ConsistencyValidator::default();
        let r = report(850.0, &[("parse", 300.0), ("execute", 500.0)]);
        let results = validator.validate_timing("L1", &r, 860.0);
        assert_check(&results, "timing.phase_sum", true);
    }

    #[test]
    fn client_disagreement_is_high_severity() {
        let mut validator = ConsistencyValidator::default();
        let r = report(100.0, &[]);
        let results = validator.validate_timing("L1", &r, 400.0);
        let check = results
            .iter()
            .find(|r| r.check == "timing.client_total")
            .unwrap();
        assert!(!check.passed);
        assert_eq!(check.severity, Severity::High);
        assert!(check.evidence.contains_key("client_measured_total_ms"));
    }

    #[test]
    fn implausibly_fast_phase_is_flagged_by_name() {
        let mut validator = ConsistencyValidator::default();
        let r = report(500.0, &[("parse", 2.0), ("execute", 498.0)]);
        let results = validator.validate_timing("L1", &r, 510.0);
        let check = results
            .iter()
            .find(|r| r.check == "timing.phase_floor")
            .unwrap();
        assert!(!check.passed);
        assert!(check.reason.contains("parse"));
        assert_eq!(check.severity, Severity::High);
    }

    #[test]
    fn anomalously_fast_total_needs_history() {
        let mut validator = ConsistencyValidator::default();
        // prime the cohort baseline with client-measured round trips
        for _ in 0..3 {
            let r = report(1000.0, &[]);
            let results = validator.validate_timing("L4", &r, 1000.0);
            assert_check(&results, "timing.historical", true);
        }
        // 200 ms is below 30% of the ~1000 ms average
        let r = report(200.0, &[]);
        let results = validator.validate_timing("L4", &r, 210.0);
        let check = results
            .iter()
            .find(|r| r.check == "timing.historical")
            .unwrap();
        assert!(!check.passed);
        assert!(check.reason.contains("anomalously fast"));
        // other cohorts are unaffected
        let r = report(200.0, &[]);
        let results = validator.validate_timing("L1", &r, 210.0);
        assert_check(&results, "timing.historical", true);
    }

    #[test]
    fn token_sum_must_be_exact() {
        let mut validator = ConsistencyValidator::default();
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
            total_tokens: 151,
        };
        let results = validator.validate_token_usage(150, &usage);
        assert_check(&results, "tokens.sum", false);
    }

    #[test]
    fn token_band_bounds_are_inclusive() {
        let mut validator = ConsistencyValidator::default();
        let at_low = TokenUsage {
            input_tokens: 50,
            output_tokens: 20,
            total_tokens: 70,
        };
        let results = validator.validate_token_usage(100, &at_low);
        assert_check(&results, "tokens.estimate_band", true);

        let below = TokenUsage {
            input_tokens: 49,
            output_tokens: 20,
            total_tokens: 69,
        };
        let results = validator.validate_token_usage(100, &below);
        assert_check(&results, "tokens.estimate_band", false);

        let above = TokenUsage {
            input_tokens: 100,
            output_tokens: 31,
            total_tokens: 131,
        };
        let results = validator.validate_token_usage(100, &above);
        assert_check(&results, "tokens.estimate_band", false);
    }

    #[test]
    fn sustained_under_reporting_trips_the_trend_check() {
        let mut validator = ConsistencyValidator::default();
        for _ in 0..4 {
            let usage = TokenUsage {
                input_tokens: 30,
                output_tokens: 20,
                total_tokens: 50,
            };
            let results = validator.validate_token_usage(100, &usage);
            let trend = results
                .iter()
                .find(|r| r.check == "tokens.reporting_trend")
                .unwrap();
            if validator.history().token_ratio_count() >= 3 {
                assert!(!trend.passed, "{}", trend.reason);
                assert_eq!(trend.severity, Severity::High);
            }
        }
    }

    #[test]
    fn history_reset_clears_both_accumulators() {
        let mut validator = ConsistencyValidator::default();
        let r = report(100.0, &[]);
        validator.validate_timing("L1", &r, 100.0);
        let usage = TokenUsage {
            input_tokens: 50,
            output_tokens: 50,
            total_tokens: 100,
        };
        validator.validate_token_usage(100, &usage);
        assert!(validator.history().total_count("L1") > 0);
        validator.reset_history();
        assert_eq!(validator.history().total_count("L1"), 0);
        assert_eq!(validator.history().token_ratio_count(), 0);
    }

    #[test]
    fn passed_checks_are_still_reported() {
        let mut validator = ConsistencyValidator::default();
        let usage = TokenUsage {
            input_tokens: 60,
            output_tokens: 40,
            total_tokens: 100,
        };
        let results = validator.validate_token_usage(100, &usage);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.passed));
    }
}
