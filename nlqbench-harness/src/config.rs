//! Configuration management for the benchmark harness

use anyhow::Result;
use nlqbench_core::rules::{ComparisonRules, RuleOverrides};
use nlqbench_core::{SamplerConfig, ValidatorConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main harness configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchConfig {
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub rules: RuleLayersConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// What is being benchmarked and against which database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub sut_name: String,
    pub database: String,
    /// Model name for cost accounting; unset disables cost tracking
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            sut_name: "unnamed-sut".to_string(),
            database: "default".to_string(),
            model: None,
        }
    }
}

/// The two lower rule layers; the per-question layer rides on each question
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleLayersConfig {
    #[serde(default)]
    pub global: RuleOverrides,
    #[serde(default)]
    pub databases: BTreeMap<String, RuleOverrides>,
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub output_directory: PathBuf,
    pub write_json: bool,
    pub print_summary: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("./bench_results"),
            write_json: true,
            print_summary: true,
        }
    }
}

impl BenchConfig {
    /// Load configuration from a YAML or JSON file, by extension
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|s| s.to_str());
        let config = if matches!(ext, Some("yaml") | Some("yml")) {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(config)
    }

    /// Save configuration to a YAML or JSON file, by extension
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let ext = path.extension().and_then(|s| s.to_str());
        let content = if matches!(ext, Some("yaml") | Some("yml")) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration before a run
    pub fn validate(&self) -> Result<()> {
        if self.environment.sut_name.is_empty() {
            anyhow::bail!("sut_name must not be empty");
        }
        if self.sampler.min_samples == 0 {
            anyhow::bail!("sampler.min_samples must be at least 1");
        }
        if self.sampler.measurement_runs < self.sampler.min_samples {
            anyhow::bail!(
                "sampler.measurement_runs ({}) is below sampler.min_samples ({})",
                self.sampler.measurement_runs,
                self.sampler.min_samples
            );
        }
        if self.validator.token_band_low > self.validator.token_band_high {
            anyhow::bail!(
                "validator token band is inverted: {} > {}",
                self.validator.token_band_low,
                self.validator.token_band_high
            );
        }
        // the rule layers must already resolve against every configured
        // database, so bad overrides fail here and not mid-run
        self.resolved_rules(None)?;
        for db in self.rules.databases.keys() {
            let layer = &self.rules.databases[db];
            ComparisonRules::resolve(&self.rules.global, layer, &RuleOverrides::default())
                .map_err(|e| anyhow::anyhow!("rules for database '{}': {}", db, e))?;
        }
        Ok(())
    }

    /// Resolve the effective rule set for the configured database plus an
    /// optional per-question layer.
    pub fn resolved_rules(
        &self,
        question_layer: Option<&RuleOverrides>,
    ) -> nlqbench_core::Result<ComparisonRules> {
        let empty = RuleOverrides::default();
        let db_layer = self
            .rules
            .databases
            .get(&self.environment.database)
            .unwrap_or(&empty);
        ComparisonRules::resolve(
            &self.rules.global,
            db_layer,
            question_layer.unwrap_or(&empty),
        )
    }
}
