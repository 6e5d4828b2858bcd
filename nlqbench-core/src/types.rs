//! Core data types for result-set equivalence and measurement

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared semantic type of a result column.
///
/// The comparator dispatches on this tag, not on the concrete cell value,
/// so databases that report e.g. a decimal column with integer cells still
/// compare under the intended semantics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Float,
    Decimal,
    Text,
    Boolean,
    Date,
    Timestamp,
}

impl SemanticType {
    /// Whether this type carries a numeric value
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SemanticType::Integer | SemanticType::Float | SemanticType::Decimal
        )
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Decimal => "decimal",
            SemanticType::Text => "text",
            SemanticType::Boolean => "boolean",
            SemanticType::Date => "date",
            SemanticType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}

/// A single cell value in a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Absent value (SQL NULL)
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// Fixed-point decimal, carried as f64 under a distinct tag so decimal
    /// columns can use a distinct tolerance
    Decimal(f64),
    /// UTF-8 string
    Text(String),
    /// Calendar date without time-of-day
    Date(NaiveDate),
    /// Timestamp with UTC offset
    Timestamp(DateTime<FixedOffset>),
}

impl Value {
    /// Get the semantic type of this value, `None` for NULL
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(SemanticType::Boolean),
            Value::Integer(_) => Some(SemanticType::Integer),
            Value::Float(_) => Some(SemanticType::Float),
            Value::Decimal(_) => Some(SemanticType::Decimal),
            Value::Text(_) => Some(SemanticType::Text),
            Value::Date(_) => Some(SemanticType::Date),
            Value::Timestamp(_) => Some(SemanticType::Timestamp),
        }
    }

    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to read this value as a float; numeric variants coerce
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) | Value::Decimal(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to read this value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value may legally appear in a column of the given type.
    ///
    /// NULL fits anywhere; numeric values fit any numeric column, since
    /// adapters for different databases disagree on which numeric variant a
    /// literal comes back as.
    pub fn fits(&self, column_type: SemanticType) -> bool {
        match self.semantic_type() {
            None => true,
            Some(t) if t == column_type => true,
            Some(t) => t.is_numeric() && column_type.is_numeric(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// A named, typed result column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: SemanticType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Normalized tabular result of executing a query.
///
/// Both golden and actual results are expressed in this form before they
/// reach the comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Build a result set, failing fast on structural violations
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let rs = Self { columns, rows };
        rs.validate()?;
        Ok(rs)
    }

    /// An empty result set over the given columns
    pub fn empty(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Check the structural invariants: every row is exactly as wide as the
    /// column list, and every non-NULL cell fits its column's type.
    pub fn validate(&self) -> Result<()> {
        for (row_idx, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(Error::malformed(format!(
                    "row {} has {} cells, expected {}",
                    row_idx,
                    row.len(),
                    self.columns.len()
                )));
            }
            for (col_idx, cell) in row.iter().enumerate() {
                let column = &self.columns[col_idx];
                if !cell.fits(column.data_type) {
                    return Err(Error::malformed(format!(
                        "cell at row {}, column '{}' holds {} but the column is {}",
                        row_idx, column.name, cell, column.data_type
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Quality tier of the schema a question ran against
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    #[default]
    High,
    Medium,
    Low,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityTier::High => "high",
            QualityTier::Medium => "medium",
            QualityTier::Low => "low",
        };
        write!(f, "{}", name)
    }
}

/// Token consumption reported by a system under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// One named sub-phase of a self-reported timing breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTime {
    pub name: String,
    pub elapsed_ms: f64,
}

impl PhaseTime {
    pub fn new(name: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            name: name.into(),
            elapsed_ms,
        }
    }
}

/// Timing and token data supplied by a system under test, as opposed to
/// independently measured by the harness. Consumed only by the consistency
/// validator and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfReport {
    pub total_time_ms: f64,
    #[serde(default)]
    pub phases: Vec<PhaseTime>,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
}
