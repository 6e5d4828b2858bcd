//! Benchmark question definitions and loading

use anyhow::{Context, Result};
use nlqbench_core::rules::RuleOverrides;
use nlqbench_core::QualityTier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Question complexity ladder, simple filters up to mixed analytical queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Complexity {
    /// Single table, simple filter
    L1,
    /// Single table, aggregation
    L2,
    /// Multi-table join
    L3,
    /// Nested subquery
    L4,
    /// Window functions
    L5,
    /// Complex mixed query
    L6,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One benchmark question with its golden query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub domain: String,
    pub complexity: Complexity,
    /// Natural-language question posed to the system under test
    pub text: String,
    /// Query whose result is the golden answer
    pub golden_query: String,
    /// Quality tier of the schema this question runs against
    #[serde(default)]
    pub tier: QualityTier,
    /// Per-question rule layer, highest priority in resolution
    #[serde(default)]
    pub rules: Option<RuleOverrides>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An ordered, id-unique collection of questions
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Result<Self> {
        let mut seen = HashSet::new();
        for q in &questions {
            if !seen.insert(q.id.as_str()) {
                anyhow::bail!("duplicate question id '{}'", q.id);
            }
        }
        Ok(Self { questions })
    }

    /// Parse a YAML document holding a list of questions
    pub fn from_yaml(content: &str) -> Result<Self> {
        let questions: Vec<Question> =
            serde_yaml::from_str(content).context("parsing question YAML")?;
        Self::new(questions)
    }

    /// Load a question file, or every `.yaml`/`.yml` file in a directory
    pub fn load_path(path: &Path) -> Result<Self> {
        let mut questions = Vec::new();
        if path.is_dir() {
            let mut entries: Vec<_> = std::fs::read_dir(path)
                .with_context(|| format!("reading question directory {:?}", path))?
                .collect::<std::io::Result<_>>()?;
            entries.sort_by_key(std::fs::DirEntry::path);
            for entry in entries {
                let file = entry.path();
                let is_yaml = file
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "yaml" || e == "yml");
                if is_yaml {
                    let content = std::fs::read_to_string(&file)
                        .with_context(|| format!("reading question file {:?}", file))?;
                    let bank = Self::from_yaml(&content)
                        .with_context(|| format!("in question file {:?}", file))?;
                    questions.extend(bank.questions);
                }
            }
        } else {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading question file {:?}", path))?;
            questions = Self::from_yaml(&content)?.questions;
        }
        log::info!("loaded {} questions from {:?}", questions.len(), path);
        Self::new(questions)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Keep only the first `limit` questions
    pub fn truncate(&mut self, limit: usize) {
        self.questions.truncate(limit);
    }
}
