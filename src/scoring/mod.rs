//! Composite relevance scoring and result ordering.
//!
//! ```text
//! score = (w_m * match + w_t * type + w_c * completeness + w_a * access) / (w_m + w_t + w_c + w_a)
//! ```

use crate::association::completeness;
use crate::error::{EngineError, Result};
use crate::models::{AssociationGroup, FileType, ScoreBreakdown, ScoreComponent, ScoredGroup};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use validator::Validate;

/// Weights and constants of the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScoringConfig {
    #[validate(range(min = 0.0))]
    pub match_quality_weight: f64,

    #[validate(range(min = 0.0))]
    pub type_relevance_weight: f64,

    #[validate(range(min = 0.0))]
    pub association_completeness_weight: f64,

    #[validate(range(min = 0.0))]
    pub accessibility_weight: f64,

    /// Type relevance when hint and file share a family (BAM vs CRAM)
    #[validate(range(min = 0.0, max = 1.0))]
    pub same_family_relevance: f64,

    /// Type relevance when no hint is given
    #[validate(range(min = 0.0, max = 1.0))]
    pub neutral_type_relevance: f64,

    /// Accessibility of tiers that need a restore first
    #[validate(range(min = 0.0, max = 1.0))]
    pub archival_accessibility: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            match_quality_weight: 0.5,
            type_relevance_weight: 0.2,
            association_completeness_weight: 0.15,
            accessibility_weight: 0.15,
            same_family_relevance: 0.5,
            neutral_type_relevance: 0.5,
            archival_accessibility: 0.25,
        }
    }
}

impl ScoringConfig {
    pub fn weight_sum(&self) -> f64 {
        self.match_quality_weight
            + self.type_relevance_weight
            + self.association_completeness_weight
            + self.accessibility_weight
    }

    /// Range checks plus a non-zero total weight
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.weight_sum() <= 0.0 {
            return Err(EngineError::Configuration(
                "scoring weights must sum to more than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scores association groups for one query
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    config: ScoringConfig,
    hint: Option<FileType>,
}

impl RelevanceScorer {
    pub fn new(config: ScoringConfig, hint: Option<FileType>) -> Self {
        Self { config, hint }
    }

    pub fn type_relevance(&self, file_type: FileType) -> f64 {
        let Some(hint) = self.hint else {
            return self.config.neutral_type_relevance;
        };

        if file_type == FileType::Unknown {
            0.0
        } else if file_type == hint {
            1.0
        } else if file_type.family() == hint.family() {
            self.config.same_family_relevance
        } else {
            0.0
        }
    }

    pub fn accessibility(&self, group: &AssociationGroup) -> f64 {
        if group.primary.storage_tier.requires_restore() {
            self.config.archival_accessibility
        } else {
            1.0
        }
    }

    /// Score a group whose primary matched with `match_quality`
    pub fn score(&self, group: AssociationGroup, match_quality: f64) -> ScoredGroup {
        let weight_sum = self.config.weight_sum();
        let component = |raw: f64, weight: f64| {
            let raw = raw.clamp(0.0, 1.0);
            ScoreComponent {
                raw,
                weight,
                contribution: if weight_sum > 0.0 {
                    raw * weight / weight_sum
                } else {
                    0.0
                },
            }
        };

        let breakdown = ScoreBreakdown {
            match_quality: component(match_quality, self.config.match_quality_weight),
            type_relevance: component(
                self.type_relevance(group.primary.file_type),
                self.config.type_relevance_weight,
            ),
            association_completeness: component(
                completeness(&group),
                self.config.association_completeness_weight,
            ),
            accessibility: component(self.accessibility(&group), self.config.accessibility_weight),
        };

        ScoredGroup {
            score: breakdown.total().clamp(0.0, 1.0),
            score_breakdown: breakdown,
            group,
        }
    }
}

/// Total result order: score desc, match quality desc, newest first
/// (undated last), then `(backend_id, path)` asc
pub fn compare(a: &ScoredGroup, b: &ScoredGroup) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| {
            b.score_breakdown
                .match_quality
                .raw
                .total_cmp(&a.score_breakdown.match_quality.raw)
        })
        .then_with(|| match (a.group.primary.last_modified, b.group.primary.last_modified) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.group.primary.key().cmp(&b.group.primary.key()))
}

/// Sort into result order
pub fn rank(groups: &mut [ScoredGroup]) {
    groups.sort_by(compare);
}
