//! Benchmark runner: drives one question at a time through the database
//! adapter, the system under test and the equivalence engine, then folds
//! everything into a suite report.

use crate::adapter::{DatabaseAdapter, SutAdapter};
use crate::config::BenchConfig;
use crate::question::{Complexity, Question, QuestionBank};
use crate::report::SuiteReport;
use crate::tokens::estimate_tokens;
use anyhow::Result;
use chrono::Utc;
use nlqbench_core::cost::{CostSample, CostTracker};
use nlqbench_core::robustness;
use nlqbench_core::{
    compare, ConsistencyValidator, QualityTier, Sampler, ValidationResult, Verdict,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Everything observed while running one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub complexity: Complexity,
    pub tier: QualityTier,
    /// True only when the comparison ran and matched
    pub passed: bool,
    #[serde(default)]
    pub generated_query: Option<String>,
    #[serde(default)]
    pub verdict: Option<Verdict>,
    /// Wall-clock time of the SUT round trip as measured by the harness
    pub client_elapsed_ms: f64,
    #[serde(default)]
    pub findings: Vec<ValidationResult>,
    #[serde(default)]
    pub cost: Option<CostSample>,
    /// Set when the question never reached a verdict
    #[serde(default)]
    pub error: Option<String>,
}

impl QuestionOutcome {
    fn failed(question: &Question, client_elapsed_ms: f64, error: String) -> Self {
        Self {
            question_id: question.id.clone(),
            complexity: question.complexity,
            tier: question.tier,
            passed: false,
            generated_query: None,
            verdict: None,
            client_elapsed_ms,
            findings: Vec::new(),
            cost: None,
            error: Some(error),
        }
    }
}

/// Orchestrates a benchmark run over one database and one system under test
pub struct BenchRunner {
    config: BenchConfig,
    database: Arc<dyn DatabaseAdapter>,
    sut: Arc<dyn SutAdapter>,
    validator: ConsistencyValidator,
    costs: CostTracker,
}

impl BenchRunner {
    pub fn new(
        config: BenchConfig,
        database: Arc<dyn DatabaseAdapter>,
        sut: Arc<dyn SutAdapter>,
    ) -> Self {
        let validator = ConsistencyValidator::new(config.validator);
        Self {
            config,
            database,
            sut,
            validator,
            costs: CostTracker::default(),
        }
    }

    /// Run a single question end to end
    pub async fn run_question(&mut self, question: &Question) -> QuestionOutcome {
        log::info!("running question {} ({})", question.id, question.complexity);

        let golden = match self.database.execute(&question.golden_query).await {
            Ok(rs) => rs,
            Err(e) => {
                log::error!("golden query failed for {}: {}", question.id, e);
                return QuestionOutcome::failed(
                    question,
                    0.0,
                    format!("golden query failed: {}", e),
                );
            }
        };

        let start = Instant::now();
        let response = match self.sut.answer(question).await {
            Ok(r) => r,
            Err(e) => {
                let elapsed = start.elapsed().as_secs_f64() * 1000.0;
                log::warn!("SUT failed on {}: {}", question.id, e);
                return QuestionOutcome::failed(question, elapsed, format!("SUT failed: {}", e));
            }
        };
        let client_elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let rules = match self.config.resolved_rules(question.rules.as_ref()) {
            Ok(rules) => rules,
            Err(e) => {
                return QuestionOutcome::failed(
                    question,
                    client_elapsed_ms,
                    format!("rule resolution failed: {}", e),
                );
            }
        };

        let verdict = match compare(&golden, &response.result, &rules) {
            Ok(v) => v,
            Err(e) => {
                return QuestionOutcome::failed(
                    question,
                    client_elapsed_ms,
                    format!("comparison aborted: {}", e),
                );
            }
        };
        if !verdict.matched {
            log::info!("{}: {}", question.id, verdict.reason);
        }

        let mut findings = Vec::new();
        let mut cost = None;
        if let Some(report) = &response.self_report {
            findings.extend(self.validator.validate_timing(
                &question.complexity.to_string(),
                report,
                client_elapsed_ms,
            ));
            if let Some(usage) = report.token_usage {
                let estimate =
                    estimate_tokens(&question.text, &self.database.schema_summary());
                findings.extend(self.validator.validate_token_usage(estimate, &usage));

                if let Some(model) = &self.config.environment.model {
                    match self.costs.track(usage, model) {
                        Ok(sample) => cost = Some(sample),
                        Err(e) => log::warn!("cost tracking for {}: {}", question.id, e),
                    }
                }
            }
        }
        for finding in findings.iter().filter(|f| !f.passed) {
            log::warn!("{}: [{}] {}", question.id, finding.check, finding.reason);
        }

        QuestionOutcome {
            question_id: question.id.clone(),
            complexity: question.complexity,
            tier: question.tier,
            passed: verdict.matched,
            generated_query: Some(response.generated_query),
            verdict: Some(verdict),
            client_elapsed_ms,
            findings,
            cost,
            error: None,
        }
    }

    /// Profile one question's SUT round trip: warmup runs, then timed
    /// measurement runs, folded through the engine's statistics.
    pub async fn profile_question(
        &self,
        question: &Question,
    ) -> nlqbench_core::Result<nlqbench_core::PerformanceMetrics> {
        let sampler = Sampler::new(self.config.sampler);
        let cfg = sampler.config();

        for run in 0..cfg.warmup_runs {
            if let Err(e) = self.sut.answer(question).await {
                log::debug!("warmup run {} failed for {}: {}", run, question.id, e);
            }
        }

        let mut samples = Vec::with_capacity(cfg.measurement_runs);
        let mut failed_runs = 0;
        for run in 0..cfg.measurement_runs {
            let start = Instant::now();
            match self.sut.answer(question).await {
                Ok(_) => samples.push(start.elapsed().as_secs_f64() * 1000.0),
                Err(e) => {
                    failed_runs += 1;
                    log::warn!(
                        "measurement run {} failed for {}, excluding: {}",
                        run,
                        question.id,
                        e
                    );
                }
            }
        }
        sampler.from_samples(samples, failed_runs)
    }

    /// Run every question in the bank and assemble the suite report
    pub async fn run_suite(&mut self, bank: &QuestionBank) -> Result<SuiteReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        log::info!(
            "starting run {} for '{}': {} questions",
            run_id,
            self.sut.name(),
            bank.len()
        );

        // no history or cost state leaks across runs
        self.validator.reset_history();
        self.costs.reset();

        let mut outcomes = Vec::with_capacity(bank.len());
        for question in bank.iter() {
            outcomes.push(self.run_question(question).await);
        }

        let passed = outcomes.iter().filter(|o| o.passed).count();
        let accuracy = if outcomes.is_empty() {
            0.0
        } else {
            passed as f64 / outcomes.len() as f64
        };

        let robustness = robustness::aggregate(
            outcomes
                .iter()
                .filter_map(|o| o.verdict.as_ref().map(|v| (o.tier, v))),
        );

        // suite-level latency over the per-question round trips; left out
        // when too few questions reached the SUT at all
        let latency_samples: Vec<f64> = outcomes
            .iter()
            .filter(|o| o.verdict.is_some())
            .map(|o| o.client_elapsed_ms)
            .collect();
        let errored = outcomes.len() - latency_samples.len();
        let latency = Sampler::new(self.config.sampler)
            .from_samples(latency_samples, errored)
            .ok();

        let report = SuiteReport {
            run_id,
            sut_name: self.sut.name().to_string(),
            database: self.config.environment.database.clone(),
            started_at,
            finished_at: Utc::now(),
            total_questions: outcomes.len(),
            passed,
            accuracy,
            outcomes,
            latency,
            robustness,
            cost: self.costs.summary(),
        };

        log::info!(
            "run {} finished: {}/{} passed ({:.1}%)",
            run_id,
            report.passed,
            report.total_questions,
            report.accuracy * 100.0
        );
        Ok(report)
    }
}
