//! Adapter traits for the two external systems the runner talks to, plus
//! fixture-backed implementations for offline runs and tests.
//!
//! Real deployments implement [`DatabaseAdapter`] over a live connection
//! and [`SutAdapter`] over the vendor's API; neither belongs to this crate.

use crate::question::Question;
use anyhow::{Context, Result};
use async_trait::async_trait;
use nlqbench_core::{ResultSet, SelfReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Executes queries and returns normalized tabular results
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    async fn execute(&self, query: &str) -> Result<ResultSet>;

    /// Compact schema description, used for token estimation
    fn schema_summary(&self) -> String;
}

/// What a system under test returns for one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SutResponse {
    pub generated_query: String,
    pub result: ResultSet,
    #[serde(default)]
    pub self_report: Option<SelfReport>,
}

/// Answers natural-language questions with executed query results
#[async_trait]
pub trait SutAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn answer(&self, question: &Question) -> Result<SutResponse>;
}

/// Canned golden results and SUT responses, loadable from a file, so a
/// whole benchmark run can execute without any live system.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FixtureSet {
    #[serde(default)]
    pub schema_summary: String,
    /// Golden results keyed by the exact query text
    #[serde(default)]
    pub golden_results: BTreeMap<String, ResultSet>,
    /// SUT responses keyed by question id
    #[serde(default)]
    pub responses: BTreeMap<String, SutResponse>,
}

impl FixtureSet {
    /// Load fixtures from a YAML or JSON file, by extension
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture file {:?}", path))?;
        let ext = path.extension().and_then(|s| s.to_str());
        let fixtures = if matches!(ext, Some("yaml") | Some("yml")) {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(fixtures)
    }

    /// Split into the two adapters the runner needs
    pub fn into_adapters(self, sut_name: impl Into<String>) -> (StaticDatabase, ScriptedSut) {
        let database = StaticDatabase {
            schema_summary: self.schema_summary,
            results: self.golden_results,
        };
        let sut = ScriptedSut {
            name: sut_name.into(),
            responses: self.responses,
        };
        (database, sut)
    }
}

/// Database adapter serving pre-recorded golden results
#[derive(Debug, Clone, Default)]
pub struct StaticDatabase {
    schema_summary: String,
    results: BTreeMap<String, ResultSet>,
}

impl StaticDatabase {
    pub fn new(schema_summary: impl Into<String>) -> Self {
        Self {
            schema_summary: schema_summary.into(),
            results: BTreeMap::new(),
        }
    }

    pub fn with_result(mut self, query: impl Into<String>, result: ResultSet) -> Self {
        self.results.insert(query.into(), result);
        self
    }
}

#[async_trait]
impl DatabaseAdapter for StaticDatabase {
    async fn execute(&self, query: &str) -> Result<ResultSet> {
        self.results
            .get(query)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no golden result recorded for query: {}", query))
    }

    fn schema_summary(&self) -> String {
        self.schema_summary.clone()
    }
}

/// SUT adapter replaying pre-recorded responses by question id
#[derive(Debug, Clone)]
pub struct ScriptedSut {
    name: String,
    responses: BTreeMap<String, SutResponse>,
}

impl ScriptedSut {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: BTreeMap::new(),
        }
    }

    pub fn with_response(mut self, question_id: impl Into<String>, response: SutResponse) -> Self {
        self.responses.insert(question_id.into(), response);
        self
    }
}

#[async_trait]
impl SutAdapter for ScriptedSut {
    fn name(&self) -> &str {
        &self.name
    }

    async fn answer(&self, question: &Question) -> Result<SutResponse> {
        self.responses
            .get(&question.id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no scripted response for question '{}'", question.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlqbench_core::{Column, SemanticType, Value};

    fn one_cell(v: i64) -> ResultSet {
        ResultSet::new(
            vec![Column::new("n", SemanticType::Integer)],
            vec![vec![Value::Integer(v)]],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn static_database_serves_recorded_results() {
        let db = StaticDatabase::new("orders(id integer)")
            .with_result("SELECT count(*) FROM orders", one_cell(42));
        let rs = db.execute("SELECT count(*) FROM orders").await.unwrap();
        assert_eq!(rs.rows[0][0], Value::Integer(42));
        assert!(db.execute("SELECT 1").await.is_err());
    }

    #[test]
    fn fixtures_parse_from_yaml() {
        let yaml = r#"
schema_summary: "orders(id integer, amount decimal)"
golden_results:
  "SELECT count(*) FROM orders":
    columns:
      - name: n
        data_type: integer
    rows:
      - - integer: 42
responses:
  q-001:
    generated_query: "SELECT count(*) AS n FROM orders"
    result:
      columns:
        - name: n
          data_type: integer
      rows:
        - - integer: 42
"#;
        let fixtures: FixtureSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(fixtures.golden_results.len(), 1);
        let response = &fixtures.responses["q-001"];
        assert_eq!(response.result.rows[0][0], Value::Integer(42));
        assert!(response.self_report.is_none());
    }
}
