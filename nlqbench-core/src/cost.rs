//! Token cost accounting across hosted model providers.
//!
//! Pure arithmetic over reported token usage and a per-model pricing
//! table; tracking state lives for one benchmark run.

use crate::error::{Error, Result};
use crate::types::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hosted model providers with known pricing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Anthropic,
    AzureOpenAi,
    Google,
    Cohere,
    Custom,
}

/// Pricing for a specific model, per thousand tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model: String,
    pub provider: Provider,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
    pub currency: String,
}

impl ModelPricing {
    pub fn new(
        model: impl Into<String>,
        provider: Provider,
        input_per_1k: f64,
        output_per_1k: f64,
    ) -> Self {
        Self {
            model: model.into(),
            provider,
            input_per_1k,
            output_per_1k,
            currency: "USD".to_string(),
        }
    }
}

/// Built-in pricing for commonly benchmarked hosted models
pub fn default_pricing() -> BTreeMap<String, ModelPricing> {
    let entries = [
        ModelPricing::new("gpt-4-turbo", Provider::OpenAi, 0.01, 0.03),
        ModelPricing::new("gpt-4", Provider::OpenAi, 0.03, 0.06),
        ModelPricing::new("gpt-4o", Provider::OpenAi, 0.005, 0.015),
        ModelPricing::new("gpt-3.5-turbo", Provider::OpenAi, 0.0005, 0.0015),
        ModelPricing::new("claude-3-opus", Provider::Anthropic, 0.015, 0.075),
        ModelPricing::new("claude-3-sonnet", Provider::Anthropic, 0.003, 0.015),
        ModelPricing::new("claude-3-haiku", Provider::Anthropic, 0.00025, 0.00125),
        ModelPricing::new("gemini-pro", Provider::Google, 0.00025, 0.0005),
    ];
    entries
        .into_iter()
        .map(|p| (p.model.clone(), p))
        .collect()
}

/// Cost of one query, with the input/output breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSample {
    pub usage: TokenUsage,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub model: String,
    pub provider: Provider,
    pub currency: String,
}

/// Turns token usage into money under a pricing table
#[derive(Debug, Clone)]
pub struct CostCalculator {
    pricing: BTreeMap<String, ModelPricing>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self {
            pricing: default_pricing(),
        }
    }
}

impl CostCalculator {
    /// Calculator with the built-in table plus caller overrides
    pub fn with_overrides(overrides: impl IntoIterator<Item = ModelPricing>) -> Self {
        let mut calc = Self::default();
        for pricing in overrides {
            calc.add_pricing(pricing);
        }
        calc
    }

    pub fn add_pricing(&mut self, pricing: ModelPricing) {
        self.pricing.insert(pricing.model.clone(), pricing);
    }

    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing.get(model)
    }

    /// Price one query's usage; unknown models are a hard error so silent
    /// zero-cost accounting cannot happen.
    pub fn cost_of(&self, usage: TokenUsage, model: &str) -> Result<CostSample> {
        let pricing = self
            .pricing_for(model)
            .ok_or_else(|| Error::UnknownModel(model.to_string()))?;
        let input_cost = usage.input_tokens as f64 / 1000.0 * pricing.input_per_1k;
        let output_cost = usage.output_tokens as f64 / 1000.0 * pricing.output_per_1k;
        Ok(CostSample {
            usage,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
            model: pricing.model.clone(),
            provider: pricing.provider,
            currency: pricing.currency.clone(),
        })
    }
}

/// Aggregated cost figures for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CostSummary {
    pub total_queries: usize,
    pub total_cost: f64,
    pub average_cost_per_query: f64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub cost_by_model: BTreeMap<String, f64>,
}

/// Accumulates cost samples across the queries of one run
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    calculator: CostCalculator,
    samples: Vec<CostSample>,
}

impl CostTracker {
    pub fn new(calculator: CostCalculator) -> Self {
        Self {
            calculator,
            samples: Vec::new(),
        }
    }

    /// Price and record one query's usage
    pub fn track(&mut self, usage: TokenUsage, model: &str) -> Result<CostSample> {
        let sample = self.calculator.cost_of(usage, model)?;
        self.samples.push(sample.clone());
        Ok(sample)
    }

    pub fn total_cost(&self) -> f64 {
        self.samples.iter().map(|s| s.total_cost).sum()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn summary(&self) -> CostSummary {
        let total_queries = self.samples.len();
        let total_cost = self.total_cost();
        let mut cost_by_model: BTreeMap<String, f64> = BTreeMap::new();
        for sample in &self.samples {
            *cost_by_model.entry(sample.model.clone()).or_default() += sample.total_cost;
        }
        CostSummary {
            total_queries,
            total_cost,
            average_cost_per_query: if total_queries > 0 {
                total_cost / total_queries as f64
            } else {
                0.0
            },
            input_cost: self.samples.iter().map(|s| s.input_cost).sum(),
            output_cost: self.samples.iter().map(|s| s.output_cost).sum(),
            total_input_tokens: self.samples.iter().map(|s| s.usage.input_tokens).sum(),
            total_output_tokens: self.samples.iter().map(|s| s.usage.output_tokens).sum(),
            total_tokens: self.samples.iter().map(|s| s.usage.total_tokens).sum(),
            cost_by_model,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }

    #[test]
    fn prices_a_known_model() {
        let calc = CostCalculator::default();
        let sample = calc.cost_of(usage(1000, 500), "gpt-4").unwrap();
        assert!((sample.input_cost - 0.03).abs() < 1e-12);
        assert!((sample.output_cost - 0.03).abs() < 1e-12);
        assert!((sample.total_cost - 0.06).abs() < 1e-12);
        assert_eq!(sample.provider, Provider::OpenAi);
    }

    #[test]
    fn unknown_model_is_a_hard_error() {
        let calc = CostCalculator::default();
        let err = calc.cost_of(usage(10, 10), "mystery-model").unwrap_err();
        assert!(matches!(err, Error::UnknownModel(_)));
    }

    #[test]
    fn zero_usage_costs_zero() {
        let calc = CostCalculator::default();
        let sample = calc.cost_of(usage(0, 0), "claude-3-haiku").unwrap();
        assert_eq!(sample.total_cost, 0.0);
    }

    #[test]
    fn overrides_replace_builtin_pricing() {
        let calc = CostCalculator::with_overrides([ModelPricing::new(
            "gpt-4",
            Provider::Custom,
            0.001,
            0.002,
        )]);
        let sample = calc.cost_of(usage(1000, 1000), "gpt-4").unwrap();
        assert!((sample.total_cost - 0.003).abs() < 1e-12);
        assert_eq!(sample.provider, Provider::Custom);
    }

    #[test]
    fn tracker_sums_across_queries() {
        let mut tracker = CostTracker::default();
        tracker.track(usage(1000, 0), "gpt-4").unwrap();
        tracker.track(usage(0, 1000), "gpt-4").unwrap();
        tracker.track(usage(2000, 0), "gemini-pro").unwrap();

        let summary = tracker.summary();
        assert_eq!(summary.total_queries, 3);
        assert!((summary.total_cost - (0.03 + 0.06 + 0.0005)).abs() < 1e-12);
        assert_eq!(summary.total_input_tokens, 3000);
        assert_eq!(summary.total_output_tokens, 1000);
        assert_eq!(summary.cost_by_model.len(), 2);
        assert!(
            (summary.average_cost_per_query - summary.total_cost / 3.0).abs() < 1e-12
        );
    }

    #[test]
    fn empty_tracker_summary_is_all_zero() {
        let tracker = CostTracker::default();
        let summary = tracker.summary();
        assert_eq!(summary.total_queries, 0);
        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.average_cost_per_query, 0.0);
    }
}
