//! Tri-layer result-set equivalence: schema, row count, then values.
//!
//! Mismatch is data, not an exception: every expected divergence comes back
//! as a failed [`Verdict`] with a human-readable reason and, for cell-level
//! mismatches, the first offending location. Only malformed inputs abort
//! with a hard error.

use crate::error::Result;
use crate::rules::{ComparisonRules, FloatComparisonMode, NullHandling, StringNormalization};
use crate::types::{ResultSet, SemanticType, Value};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Where the first cell-level mismatch was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchLocation {
    /// Row index after canonicalization (original index when row order matters)
    pub row: usize,
    /// Column name on the expected side
    pub column: String,
}

/// Outcome of comparing two result sets under a rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub matched: bool,
    pub reason: String,
    #[serde(default)]
    pub location: Option<MismatchLocation>,
}

impl Verdict {
    fn matched(reason: impl Into<String>) -> Self {
        Self {
            matched: true,
            reason: reason.into(),
            location: None,
        }
    }

    fn mismatch(reason: impl Into<String>) -> Self {
        Self {
            matched: false,
            reason: reason.into(),
            location: None,
        }
    }

    fn mismatch_at(reason: impl Into<String>, row: usize, column: &str) -> Self {
        Self {
            matched: false,
            reason: reason.into(),
            location: Some(MismatchLocation {
                row,
                column: column.to_string(),
            }),
        }
    }
}

/// Compare an expected (golden) result set against an actual one.
///
/// Pure and deterministic; inputs are not mutated. Layers short-circuit at
/// the first failure: schema, then row count, then cell values.
pub fn compare(
    expected: &ResultSet,
    actual: &ResultSet,
    rules: &ComparisonRules,
) -> Result<Verdict> {
    expected.validate()?;
    actual.validate()?;

    let mapping = match match_schema(expected, actual, rules) {
        SchemaOutcome::Mismatch(verdict) => return Ok(verdict),
        SchemaOutcome::Mapped(mapping) => mapping,
    };

    if expected.row_count() != actual.row_count() {
        return Ok(Verdict::mismatch(format!(
            "row count mismatch: expected {} rows, got {}",
            expected.row_count(),
            actual.row_count()
        )));
    }

    if let Some(verdict) = compare_values(expected, actual, &mapping, rules) {
        return Ok(verdict);
    }

    Ok(Verdict::matched(format!(
        "results match: {} rows, {} columns compared",
        expected.row_count(),
        expected.column_count()
    )))
}

enum SchemaOutcome {
    /// For expected column `i`, `mapping[i]` is the paired actual column index
    Mapped(Vec<usize>),
    Mismatch(Verdict),
}

fn match_schema(
    expected: &ResultSet,
    actual: &ResultSet,
    rules: &ComparisonRules,
) -> SchemaOutcome {
    if expected.column_count() != actual.column_count() {
        return SchemaOutcome::Mismatch(Verdict::mismatch(format!(
            "schema mismatch: expected {} columns, got {}",
            expected.column_count(),
            actual.column_count()
        )));
    }

    if rules.column_order_matters {
        for (idx, (exp, act)) in expected.columns.iter().zip(&actual.columns).enumerate() {
            if exp.name != act.name {
                return SchemaOutcome::Mismatch(Verdict::mismatch(format!(
                    "schema mismatch: column {} named '{}', expected '{}'",
                    idx, act.name, exp.name
                )));
            }
            if !rules.types_compatible(exp.data_type, act.data_type) {
                return SchemaOutcome::Mismatch(Verdict::mismatch(format!(
                    "schema mismatch: column '{}' is {}, expected {}",
                    exp.name, act.data_type, exp.data_type
                )));
            }
        }
        return SchemaOutcome::Mapped((0..expected.column_count()).collect());
    }

    // Order-insensitive: pair columns by name so a column matched by name on
    // one side is compared against the same-named column on the other.
    // Duplicate names pair up in order of occurrence.
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, col) in actual.columns.iter().enumerate().rev() {
        by_name.entry(col.name.as_str()).or_default().push(idx);
    }

    let mut mapping = Vec::with_capacity(expected.column_count());
    for exp in &expected.columns {
        let Some(act_idx) = by_name.get_mut(exp.name.as_str()).and_then(Vec::pop) else {
            return SchemaOutcome::Mismatch(Verdict::mismatch(format!(
                "schema mismatch: missing column '{}'",
                exp.name
            )));
        };
        let act = &actual.columns[act_idx];
        if !rules.types_compatible(exp.data_type, act.data_type) {
            return SchemaOutcome::Mismatch(Verdict::mismatch(format!(
                "schema mismatch: column '{}' is {}, expected {}",
                exp.name, act.data_type, exp.data_type
            )));
        }
        mapping.push(act_idx);
    }
    SchemaOutcome::Mapped(mapping)
}

fn compare_values(
    expected: &ResultSet,
    actual: &ResultSet,
    mapping: &[usize],
    rules: &ComparisonRules,
) -> Option<Verdict> {
    let mut expected_order: Vec<usize> = (0..expected.row_count()).collect();
    let mut actual_order: Vec<usize> = (0..actual.row_count()).collect();

    if !rules.row_order_matters {
        // Canonicalize with an explicit total-order sort over the full row
        // tuple; hashing would lose duplicate rows and NULL tie-breaking.
        expected_order.sort_by(|&a, &b| cmp_rows(&expected.rows[a], &expected.rows[b], None));
        actual_order.sort_by(|&a, &b| cmp_rows(&actual.rows[a], &actual.rows[b], Some(mapping)));
    }

    for (pair_idx, (&exp_row, &act_row)) in expected_order.iter().zip(&actual_order).enumerate() {
        for (col_idx, act_col) in mapping.iter().enumerate() {
            let column = &expected.columns[col_idx];
            let a = &expected.rows[exp_row][col_idx];
            let b = &actual.rows[act_row][*act_col];
            let kind = cell_kind(column.data_type, actual.columns[*act_col].data_type);
            if !cells_match(kind, a, b, rules) {
                return Some(Verdict::mismatch_at(
                    format!(
                        "value mismatch at row {}, column '{}': expected {}, actual {}",
                        pair_idx, column.name, a, b
                    ),
                    pair_idx,
                    &column.name,
                ));
            }
        }
    }
    None
}

/// Comparison kind for a pair of schema-compatible column types.
///
/// When the two sides declare different numeric types, the comparison uses
/// numeric tolerance under the widest declared type (decimal wins over
/// float wins over integer), so cross-database coercions stay tolerant.
fn cell_kind(expected: SemanticType, actual: SemanticType) -> SemanticType {
    if expected == actual {
        return expected;
    }
    debug_assert!(expected.is_numeric() && actual.is_numeric());
    if expected == SemanticType::Decimal || actual == SemanticType::Decimal {
        SemanticType::Decimal
    } else {
        SemanticType::Float
    }
}

/// Tagged-variant dispatch: one pure handler per semantic type. Adding a
/// type means adding a handler here.
fn cells_match(kind: SemanticType, a: &Value, b: &Value, rules: &ComparisonRules) -> bool {
    match (a.is_null(), b.is_null()) {
        (true, true) => return true,
        (true, false) => return lenient_null_equivalent(kind, b, rules),
        (false, true) => return lenient_null_equivalent(kind, a, rules),
        (false, false) => {}
    }

    match kind {
        SemanticType::Integer => match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => x == y,
            // schema-compatible numeric pair surfacing in an integer column
            _ => numeric_match(a, b, kind, rules),
        },
        SemanticType::Float | SemanticType::Decimal => numeric_match(a, b, kind, rules),
        SemanticType::Text => text_match(a, b, rules.normalization_for(kind)),
        SemanticType::Timestamp => timestamp_match(a, b, rules.datetime_tolerance_for(kind)),
        SemanticType::Boolean | SemanticType::Date => a == b,
    }
}

fn lenient_null_equivalent(kind: SemanticType, non_null: &Value, rules: &ComparisonRules) -> bool {
    if rules.null_handling != NullHandling::Lenient {
        return false;
    }
    match non_null {
        Value::Text(s) => s.trim().is_empty(),
        _ if kind.is_numeric() && rules.zero_is_null => {
            non_null.as_f64().map(|v| v == 0.0).unwrap_or(false)
        }
        _ => false,
    }
}

fn numeric_match(a: &Value, b: &Value, kind: SemanticType, rules: &ComparisonRules) -> bool {
    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return a == b;
    };
    if x == y {
        // covers exact zero on both sides
        return true;
    }
    if x.is_nan() && y.is_nan() {
        return true;
    }
    if x.is_infinite() || y.is_infinite() {
        return false;
    }
    let tolerance = rules.tolerance_for(kind);
    match rules.mode_for(kind) {
        FloatComparisonMode::Absolute => (x - y).abs() <= tolerance,
        FloatComparisonMode::Relative => {
            let denom = x.abs().max(y.abs()).max(f64::EPSILON);
            (x - y).abs() / denom <= tolerance
        }
    }
}

fn text_match(a: &Value, b: &Value, normalization: StringNormalization) -> bool {
    let (Some(x), Some(y)) = (a.as_str(), b.as_str()) else {
        return a == b;
    };
    match normalization {
        StringNormalization::None => x == y,
        StringNormalization::Trim => x.trim() == y.trim(),
        StringNormalization::LowercaseTrim => {
            x.trim().to_lowercase() == y.trim().to_lowercase()
        }
    }
}

fn timestamp_match(a: &Value, b: &Value, tolerance_ms: u64) -> bool {
    let (Value::Timestamp(x), Value::Timestamp(y)) = (a, b) else {
        return a == b;
    };
    // normalize both to the reference timezone before differencing
    let x = x.with_timezone(&Utc);
    let y = y.with_timezone(&Utc);
    let diff_ms = (x - y).num_milliseconds().unsigned_abs();
    diff_ms <= tolerance_ms
}

fn cmp_rows(a: &[Value], b: &[Value], projection: Option<&[usize]>) -> Ordering {
    let width = projection.map(<[usize]>::len).unwrap_or(a.len());
    for i in 0..width {
        let idx = projection.map(|m| m[i]).unwrap_or(i);
        let ord = cmp_values(&a[idx], &b[idx]);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Total order over cell values for row canonicalization: NULL sorts before
/// everything, then by type rank, then by value.
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) | Value::Decimal(_) => 2,
            Value::Text(_) => 3,
            Value::Date(_) => 4,
            Value::Timestamp(_) => 5,
        }
    }

    match rank(a).cmp(&rank(b)) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        _ => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
    }
}
