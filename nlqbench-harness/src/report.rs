//! Suite report assembly and rendering

use crate::config::ReportingConfig;
use crate::runner::QuestionOutcome;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nlqbench_core::cost::CostSummary;
use nlqbench_core::{PerformanceMetrics, QualityTier, RobustnessScore};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use uuid::Uuid;

/// Durable record of one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub sut_name: String,
    pub database: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_questions: usize,
    pub passed: usize,
    pub accuracy: f64,
    pub outcomes: Vec<QuestionOutcome>,
    /// Suite-level latency over per-question round trips; absent when too
    /// few questions produced a measurable round trip
    #[serde(default)]
    pub latency: Option<PerformanceMetrics>,
    pub robustness: RobustnessScore,
    pub cost: CostSummary,
}

impl SuiteReport {
    /// Plain-text summary for terminal output
    pub fn text_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Benchmark Results ===");
        let _ = writeln!(out, "Run: {}", self.run_id);
        let _ = writeln!(out, "System under test: {}", self.sut_name);
        let _ = writeln!(out, "Database: {}", self.database);
        let _ = writeln!(
            out,
            "Finished: {}",
            self.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(
            out,
            "Accuracy: {}/{} passed ({:.1}%)",
            self.passed,
            self.total_questions,
            self.accuracy * 100.0
        );

        match self.robustness.ratio {
            Some(ratio) => {
                let low = self.robustness.tier(QualityTier::Low);
                let high = self.robustness.tier(QualityTier::High);
                let _ = writeln!(
                    out,
                    "Robustness: {:.2} (low tier {}/{}, high tier {}/{})",
                    ratio, low.matches, low.total, high.matches, high.total
                );
            }
            None => {
                let _ = writeln!(out, "Robustness: unavailable");
            }
        }

        if let Some(latency) = &self.latency {
            let _ = writeln!(
                out,
                "Latency: median {:.1} ms, p95 {:.1} ms, p99 {:.1} ms ({} failed runs)",
                latency.median_ms, latency.p95_ms, latency.p99_ms, latency.failed_runs
            );
        }

        if self.cost.total_queries > 0 {
            let _ = writeln!(
                out,
                "Cost: {:.4} total over {} queries ({:.4}/query, {} tokens)",
                self.cost.total_cost,
                self.cost.total_queries,
                self.cost.average_cost_per_query,
                self.cost.total_tokens
            );
        }

        let failures: Vec<&QuestionOutcome> =
            self.outcomes.iter().filter(|o| !o.passed).collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "\n=== Failures ===");
            for outcome in failures {
                let cause = outcome
                    .error
                    .as_deref()
                    .or(outcome.verdict.as_ref().map(|v| v.reason.as_str()))
                    .unwrap_or("unknown");
                let _ = writeln!(
                    out,
                    "  {} [{} / {}] {}",
                    outcome.question_id, outcome.complexity, outcome.tier, cause
                );
            }
        }

        let flagged: usize = self
            .outcomes
            .iter()
            .map(|o| o.findings.iter().filter(|f| !f.passed).count())
            .sum();
        if flagged > 0 {
            let _ = writeln!(out, "\nConsistency findings: {} checks failed", flagged);
            for outcome in &self.outcomes {
                for finding in outcome.findings.iter().filter(|f| !f.passed) {
                    let _ = writeln!(
                        out,
                        "  {} [{}] {:?}: {}",
                        outcome.question_id, finding.check, finding.severity, finding.reason
                    );
                }
            }
        }

        out
    }
}

/// Writes suite reports per the reporting configuration
pub struct Reporter {
    config: ReportingConfig,
}

impl Reporter {
    pub fn new(config: &ReportingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Emit the report: JSON file when configured, summary to stdout when
    /// configured. Returns the JSON path if one was written.
    pub fn emit(&self, report: &SuiteReport) -> Result<Option<PathBuf>> {
        let mut written = None;
        if self.config.write_json {
            written = Some(self.write_json(report)?);
        }
        if self.config.print_summary {
            println!("{}", report.text_summary());
        }
        Ok(written)
    }

    fn write_json(&self, report: &SuiteReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.config.output_directory).with_context(|| {
            format!(
                "creating report directory {:?}",
                self.config.output_directory
            )
        })?;
        let path = self
            .config
            .output_directory
            .join(format!("run_{}.json", report.run_id));
        let content = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, content)
            .with_context(|| format!("writing report {:?}", path))?;
        log::info!("report written to {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::Complexity;
    use nlqbench_core::robustness;

    fn sample_report() -> SuiteReport {
        let outcomes = vec![
            QuestionOutcome {
                question_id: "q-001".to_string(),
                complexity: Complexity::L1,
                tier: QualityTier::High,
                passed: true,
                generated_query: Some("SELECT 1".to_string()),
                verdict: None,
                client_elapsed_ms: 120.0,
                findings: Vec::new(),
                cost: None,
                error: None,
            },
            QuestionOutcome {
                question_id: "q-002".to_string(),
                complexity: Complexity::L3,
                tier: QualityTier::Low,
                passed: false,
                generated_query: None,
                verdict: None,
                client_elapsed_ms: 80.0,
                findings: Vec::new(),
                cost: None,
                error: Some("SUT failed: timeout".to_string()),
            },
        ];
        SuiteReport {
            run_id: Uuid::new_v4(),
            sut_name: "demo-sut".to_string(),
            database: "default".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total_questions: 2,
            passed: 1,
            accuracy: 0.5,
            outcomes,
            latency: None,
            robustness: robustness::aggregate(std::iter::empty()),
            cost: CostSummary::default(),
        }
    }

    #[test]
    fn summary_names_failures_and_accuracy() {
        let summary = sample_report().text_summary();
        assert!(summary.contains("1/2 passed (50.0%)"));
        assert!(summary.contains("q-002"));
        assert!(summary.contains("SUT failed: timeout"));
        assert!(summary.contains("Robustness: unavailable"));
    }

    #[test]
    fn json_report_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(&ReportingConfig {
            output_directory: dir.path().to_path_buf(),
            write_json: true,
            print_summary: false,
        });

        let report = sample_report();
        let path = reporter.emit(&report).unwrap().expect("json path");
        let content = std::fs::read_to_string(path).unwrap();
        let loaded: SuiteReport = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.outcomes.len(), 2);
    }

    #[test]
    fn json_writing_can_be_disabled() {
        let reporter = Reporter::new(&ReportingConfig {
            output_directory: PathBuf::from("/nonexistent/should/not/matter"),
            write_json: false,
            print_summary: false,
        });
        assert!(reporter.emit(&sample_report()).unwrap().is_none());
    }
}
