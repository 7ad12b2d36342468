//! Committee data types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ois_infer::{ColumnRef, SchemaInference};
use ois_model::CanonicalField;

/// The task handed to every reviewer: per-field candidate columns plus the
/// matcher's own top pick, which later powers the evidence override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTask {
    /// Deterministic candidate set per field. Proposals may only choose
    /// from these columns.
    pub candidates: BTreeMap<CanonicalField, Vec<ColumnRef>>,
    /// The matcher's best candidate per field.
    pub matcher_top: BTreeMap<CanonicalField, ColumnRef>,
}

impl MappingTask {
    /// Build the task from a schema inference result.
    #[must_use]
    pub fn from_inference(inference: &SchemaInference) -> Self {
        let mut candidates = BTreeMap::new();
        let mut matcher_top = BTreeMap::new();
        for mapping in &inference.mappings {
            candidates.insert(
                mapping.field,
                mapping
                    .alternates
                    .iter()
                    .map(|a| a.column.clone())
                    .collect(),
            );
            matcher_top.insert(mapping.field, mapping.column.clone());
        }
        Self {
            candidates,
            matcher_top,
        }
    }

    /// True when `column` is a permitted choice for `field`.
    #[must_use]
    pub fn permits(&self, field: CanonicalField, column: &ColumnRef) -> bool {
        self.candidates
            .get(&field)
            .is_some_and(|cols| cols.contains(column))
    }
}

/// One reviewer's pick for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalEntry {
    pub column: ColumnRef,
    /// Reviewer's own confidence in [0, 1].
    pub confidence: f64,
}

/// One reviewer's full opinion on a mapping task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerProposal {
    pub reviewer_id: String,
    pub entries: BTreeMap<CanonicalField, ProposalEntry>,
    /// Free-form concerns surfaced to humans alongside disagreements.
    pub red_flags: Vec<String>,
}

/// Committee-wide agreement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusLevel {
    /// Every valid proposal agreed on every accepted field.
    Unanimous,
    /// Every field was accepted, some by majority only.
    Majority,
    /// Some fields accepted, some ambiguous.
    Split,
    /// Nothing was accepted.
    NoConsensus,
}

/// A field the committee accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedMapping {
    pub column: ColumnRef,
    /// Mean confidence of the agreeing proposals.
    pub mean_confidence: f64,
    pub votes: usize,
}

/// One candidate column inside a disagreement, with its support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisagreementOption {
    pub column: ColumnRef,
    pub votes: usize,
    pub mean_confidence: f64,
}

/// An unresolved field, ready to become a bounded multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disagreement {
    pub field: CanonicalField,
    /// Voted options, most supported first.
    pub options: Vec<DisagreementOption>,
    /// Why the field is ambiguous.
    pub reason: String,
}

/// The adjudicated outcome for one mapping task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitteeVerdict {
    pub consensus: ConsensusLevel,
    pub accepted: BTreeMap<CanonicalField, AcceptedMapping>,
    pub disagreements: Vec<Disagreement>,
    /// Reviewers whose proposals were rejected outright.
    pub invalid_reviewers: Vec<String>,
    /// Red flags aggregated across valid proposals.
    pub red_flags: Vec<String>,
}

impl CommitteeVerdict {
    /// True when nothing requires a human choice.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.disagreements.is_empty()
    }
}
