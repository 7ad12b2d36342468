//! Document-level confidence scoring.

use serde::{Deserialize, Serialize};

use ois_model::{CanonicalField, FieldClass};

use crate::config::InferConfig;
use crate::types::FieldMapping;

/// Confidence band for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Only high-confidence documents may skip the forced review
    /// checkpoint; medium and low always route to a human.
    #[must_use]
    pub fn may_bypass_review(&self) -> bool {
        matches!(self, Self::High)
    }
}

/// Aggregated confidence for one inferred document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentScore {
    /// Weighted confidence in [0, 1].
    pub value: f64,
    pub band: ConfidenceBand,
    /// Whether the required field was mapped.
    pub required_present: bool,
    /// Count of mapped important fields.
    pub important_present: usize,
}

/// Compute the document confidence for a set of field mappings.
///
/// Weighted sum of per-field confidences, halved when the required field is
/// unmapped, boosted (and capped at 1.0) when enough important fields are
/// present.
#[must_use]
pub fn document_confidence(mappings: &[FieldMapping], config: &InferConfig) -> DocumentScore {
    let mut sum = 0.0;
    let mut required_present = false;
    let mut important_present = 0usize;

    for mapping in mappings {
        sum += mapping.field.weight() * mapping.confidence;
        match mapping.field.class() {
            FieldClass::Required => required_present = true,
            FieldClass::Important => important_present += 1,
            FieldClass::Optional => {}
        }
    }

    let mut value = sum;
    if !required_present {
        value *= config.missing_required_penalty;
    }
    if important_present >= config.boost_min_important {
        value *= config.important_boost;
    }
    let value = value.clamp(0.0, 1.0);

    let band = if value >= config.high_band {
        ConfidenceBand::High
    } else if value >= config.medium_band {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::Low
    };

    DocumentScore {
        value,
        band,
        required_present,
        important_present,
    }
}
