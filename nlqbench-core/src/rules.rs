//! Comparison rule sets and their layered resolution

use crate::error::{Error, Result};
use crate::types::SemanticType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How numeric tolerance is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FloatComparisonMode {
    /// `|a-b| / max(|a|, |b|, eps) <= tolerance`
    #[default]
    #[serde(rename = "relative_error")]
    Relative,
    /// `|a-b| <= tolerance`
    #[serde(rename = "absolute_error")]
    Absolute,
}

/// String normalization applied to both sides before equality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StringNormalization {
    None,
    #[default]
    Trim,
    LowercaseTrim,
}

/// How NULL pairs up against non-NULL values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NullHandling {
    #[default]
    Strict,
    Lenient,
}

/// Per-semantic-type override of the generic comparison knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TypeOverride {
    #[serde(default)]
    pub float_tolerance: Option<f64>,
    #[serde(default)]
    pub float_comparison_mode: Option<FloatComparisonMode>,
    #[serde(default)]
    pub datetime_tolerance_ms: Option<u64>,
    #[serde(default)]
    pub string_normalization: Option<StringNormalization>,
}

impl TypeOverride {
    fn merge_from(&mut self, higher: &TypeOverride) {
        if higher.float_tolerance.is_some() {
            self.float_tolerance = higher.float_tolerance;
        }
        if higher.float_comparison_mode.is_some() {
            self.float_comparison_mode = higher.float_comparison_mode;
        }
        if higher.datetime_tolerance_ms.is_some() {
            self.datetime_tolerance_ms = higher.datetime_tolerance_ms;
        }
        if higher.string_normalization.is_some() {
            self.string_normalization = higher.string_normalization;
        }
    }
}

/// One partial layer of comparison rules.
///
/// Three layers (global default, per-database, per-question) are merged in
/// increasing priority into a [`ComparisonRules`]; unset fields fall
/// through to the layer below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuleOverrides {
    #[serde(default)]
    pub row_order_matters: Option<bool>,
    #[serde(default)]
    pub column_order_matters: Option<bool>,
    #[serde(default)]
    pub float_tolerance: Option<f64>,
    #[serde(default)]
    pub float_comparison_mode: Option<FloatComparisonMode>,
    #[serde(default)]
    pub string_normalization: Option<StringNormalization>,
    #[serde(default)]
    pub null_handling: Option<NullHandling>,
    #[serde(default)]
    pub datetime_tolerance_ms: Option<u64>,
    #[serde(default)]
    pub zero_is_null: Option<bool>,
    #[serde(default)]
    pub type_overrides: BTreeMap<SemanticType, TypeOverride>,
    #[serde(default)]
    pub compatible_groups: Option<Vec<BTreeSet<SemanticType>>>,
}

/// Fully resolved, immutable rule set controlling every comparison decision.
///
/// Produced once by [`ComparisonRules::resolve`]; the comparator never sees
/// a partially specified rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRules {
    pub row_order_matters: bool,
    pub column_order_matters: bool,
    pub float_tolerance: f64,
    pub float_comparison_mode: FloatComparisonMode,
    pub string_normalization: StringNormalization,
    pub null_handling: NullHandling,
    pub datetime_tolerance_ms: u64,
    /// Under lenient NULL handling, also treat numeric zero as NULL.
    /// Empty/whitespace-only text is always a lenient NULL equivalent.
    pub zero_is_null: bool,
    pub type_overrides: BTreeMap<SemanticType, TypeOverride>,
    /// Column types inside the same group are schema-compatible
    pub compatible_groups: Vec<BTreeSet<SemanticType>>,
}

impl Default for ComparisonRules {
    fn default() -> Self {
        Self {
            row_order_matters: true,
            column_order_matters: true,
            float_tolerance: 1e-6,
            float_comparison_mode: FloatComparisonMode::Relative,
            string_normalization: StringNormalization::Trim,
            null_handling: NullHandling::Strict,
            datetime_tolerance_ms: 0,
            zero_is_null: false,
            type_overrides: BTreeMap::new(),
            compatible_groups: vec![numeric_group()],
        }
    }
}

fn numeric_group() -> BTreeSet<SemanticType> {
    [
        SemanticType::Integer,
        SemanticType::Float,
        SemanticType::Decimal,
    ]
    .into_iter()
    .collect()
}

impl ComparisonRules {
    /// Merge the three override layers, lowest priority first, on top of the
    /// built-in defaults, and validate the outcome.
    pub fn resolve(
        global: &RuleOverrides,
        database: &RuleOverrides,
        question: &RuleOverrides,
    ) -> Result<Self> {
        let mut rules = Self::default();
        for layer in [global, database, question] {
            rules.apply(layer);
        }
        rules.validate()?;
        Ok(rules)
    }

    fn apply(&mut self, layer: &RuleOverrides) {
        if let Some(v) = layer.row_order_matters {
            self.row_order_matters = v;
        }
        if let Some(v) = layer.column_order_matters {
            self.column_order_matters = v;
        }
        if let Some(v) = layer.float_tolerance {
            self.float_tolerance = v;
        }
        if let Some(v) = layer.float_comparison_mode {
            self.float_comparison_mode = v;
        }
        if let Some(v) = layer.string_normalization {
            self.string_normalization = v;
        }
        if let Some(v) = layer.null_handling {
            self.null_handling = v;
        }
        if let Some(v) = layer.datetime_tolerance_ms {
            self.datetime_tolerance_ms = v;
        }
        if let Some(v) = layer.zero_is_null {
            self.zero_is_null = v;
        }
        for (ty, over) in &layer.type_overrides {
            self.type_overrides.entry(*ty).or_default().merge_from(over);
        }
        if let Some(groups) = &layer.compatible_groups {
            self.compatible_groups = groups.clone();
        }
    }

    /// Reject rule sets that could never drive a meaningful comparison
    pub fn validate(&self) -> Result<()> {
        if !self.float_tolerance.is_finite() || self.float_tolerance < 0.0 {
            return Err(Error::invalid_rules(format!(
                "float_tolerance must be a non-negative number, got {}",
                self.float_tolerance
            )));
        }
        for (ty, over) in &self.type_overrides {
            if let Some(tol) = over.float_tolerance {
                if !tol.is_finite() || tol < 0.0 {
                    return Err(Error::invalid_rules(format!(
                        "float_tolerance override for {} must be non-negative, got {}",
                        ty, tol
                    )));
                }
            }
        }
        if self.compatible_groups.iter().any(|g| g.is_empty()) {
            return Err(Error::invalid_rules(
                "compatible type groups must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether two column types may pair up at the schema layer
    pub fn types_compatible(&self, a: SemanticType, b: SemanticType) -> bool {
        a == b
            || self
                .compatible_groups
                .iter()
                .any(|g| g.contains(&a) && g.contains(&b))
    }

    /// Numeric tolerance for cells of the given type
    pub fn tolerance_for(&self, ty: SemanticType) -> f64 {
        self.type_overrides
            .get(&ty)
            .and_then(|o| o.float_tolerance)
            .unwrap_or(self.float_tolerance)
    }

    /// Numeric comparison mode for cells of the given type
    pub fn mode_for(&self, ty: SemanticType) -> FloatComparisonMode {
        self.type_overrides
            .get(&ty)
            .and_then(|o| o.float_comparison_mode)
            .unwrap_or(self.float_comparison_mode)
    }

    /// Datetime tolerance (ms) for cells of the given type
    pub fn datetime_tolerance_for(&self, ty: SemanticType) -> u64 {
        self.type_overrides
            .get(&ty)
            .and_then(|o| o.datetime_tolerance_ms)
            .unwrap_or(self.datetime_tolerance_ms)
    }

    /// String normalization for cells of the given type
    pub fn normalization_for(&self, ty: SemanticType) -> StringNormalization {
        self.type_overrides
            .get(&ty)
            .and_then(|o| o.string_normalization)
            .unwrap_or(self.string_normalization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let rules = ComparisonRules::default();
        assert!(rules.validate().is_ok());
        assert!(rules.row_order_matters);
        assert!(rules.types_compatible(SemanticType::Integer, SemanticType::Decimal));
        assert!(!rules.types_compatible(SemanticType::Integer, SemanticType::Text));
    }

    #[test]
    fn later_layers_win() {
        let global = RuleOverrides {
            row_order_matters: Some(false),
            float_tolerance: Some(0.5),
            ..Default::default()
        };
        let database = RuleOverrides {
            float_tolerance: Some(0.1),
            null_handling: Some(NullHandling::Lenient),
            ..Default::default()
        };
        let question = RuleOverrides {
            float_tolerance: Some(0.01),
            ..Default::default()
        };

        let rules = ComparisonRules::resolve(&global, &database, &question).unwrap();
        // unset in all layers: falls through to the built-in default
        assert!(rules.column_order_matters);
        // set only in the global layer
        assert!(!rules.row_order_matters);
        // set in the database layer, untouched above
        assert_eq!(rules.null_handling, NullHandling::Lenient);
        // question layer overrides both lower layers
        assert_eq!(rules.float_tolerance, 0.01);
    }

    #[test]
    fn type_overrides_merge_field_wise() {
        let global = RuleOverrides {
            type_overrides: [(
                SemanticType::Decimal,
                TypeOverride {
                    float_tolerance: Some(0.01),
                    float_comparison_mode: Some(FloatComparisonMode::Absolute),
                    ..Default::default()
                },
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let question = RuleOverrides {
            type_overrides: [(
                SemanticType::Decimal,
                TypeOverride {
                    float_tolerance: Some(0.05),
                    ..Default::default()
                },
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };

        let rules =
            ComparisonRules::resolve(&global, &RuleOverrides::default(), &question).unwrap();
        assert_eq!(rules.tolerance_for(SemanticType::Decimal), 0.05);
        // mode from the lower layer survives the partial override above it
        assert_eq!(
            rules.mode_for(SemanticType::Decimal),
            FloatComparisonMode::Absolute
        );
        // untouched types still read the generic knobs
        assert_eq!(rules.tolerance_for(SemanticType::Float), 1e-6);
    }

    #[test]
    fn negative_tolerance_rejected() {
        let bad = RuleOverrides {
            float_tolerance: Some(-1.0),
            ..Default::default()
        };
        let err = ComparisonRules::resolve(&bad, &RuleOverrides::default(), &RuleOverrides::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRules(_)));
    }

    #[test]
    fn zero_tolerance_is_allowed() {
        let exact = RuleOverrides {
            float_tolerance: Some(0.0),
            ..Default::default()
        };
        assert!(ComparisonRules::resolve(
            &exact,
            &RuleOverrides::default(),
            &RuleOverrides::default()
        )
        .is_ok());
    }
}
