//! Robustness scoring: tolerance to degraded-quality schemas.
//!
//! Combines comparison verdicts grouped by quality tier into the ratio of
//! low-tier accuracy to high-tier accuracy. Holds no cross-run state; it
//! is typically invoked once after all verdicts are collected.

use crate::comparator::Verdict;
use crate::types::QualityTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Match counts for one quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TierAccuracy {
    pub total: usize,
    pub matches: usize,
}

impl TierAccuracy {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matches as f64 / self.total as f64
        }
    }
}

/// Accuracy breakdown by tier plus the degradation ratio.
///
/// `ratio` is `None` ("unavailable") when either tier has no verdicts or
/// the high tier's accuracy is zero; callers that need a flat number use
/// [`RobustnessScore::ratio_or_zero`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RobustnessScore {
    pub per_tier: BTreeMap<QualityTier, TierAccuracy>,
    pub ratio: Option<f64>,
}

impl RobustnessScore {
    pub fn ratio_or_zero(&self) -> f64 {
        self.ratio.unwrap_or(0.0)
    }

    pub fn tier(&self, tier: QualityTier) -> TierAccuracy {
        self.per_tier.get(&tier).copied().unwrap_or_default()
    }
}

/// Group verdicts by tier and compute accuracy(low) / accuracy(high).
pub fn aggregate<'a, I>(verdicts: I) -> RobustnessScore
where
    I: IntoIterator<Item = (QualityTier, &'a Verdict)>,
{
    let mut per_tier: BTreeMap<QualityTier, TierAccuracy> = BTreeMap::new();
    for (tier, verdict) in verdicts {
        let entry = per_tier.entry(tier).or_default();
        entry.total += 1;
        if verdict.matched {
            entry.matches += 1;
        }
    }

    let ratio = match (
        per_tier.get(&QualityTier::Low),
        per_tier.get(&QualityTier::High),
    ) {
        (Some(low), Some(high)) if high.accuracy() > 0.0 => {
            Some(low.accuracy() / high.accuracy())
        }
        _ => None,
    };

    RobustnessScore { per_tier, ratio }
}
