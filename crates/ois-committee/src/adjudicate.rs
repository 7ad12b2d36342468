//! Deterministic consensus rules.
//!
//! Acceptance per field requires at least `min_agreeing` identical votes
//! and a mean confidence at or above the consensus threshold. Two
//! overrides can demote an accepted field to ambiguous; the same-table
//! constraint is evaluated before the deterministic-evidence override.

use std::collections::BTreeMap;

use tracing::debug;

use ois_infer::ColumnRef;
use ois_model::CanonicalField;

use crate::types::{
    AcceptedMapping, CommitteeVerdict, ConsensusLevel, Disagreement, DisagreementOption,
    MappingTask, ReviewerProposal,
};

/// Committee policy constants.
#[derive(Debug, Clone, Copy)]
pub struct CommitteeConfig {
    /// Identical votes required to accept a field.
    pub min_agreeing: usize,
    /// Minimum mean confidence of the agreeing proposals.
    pub consensus_confidence: f64,
}

impl Default for CommitteeConfig {
    fn default() -> Self {
        Self {
            min_agreeing: 2,
            consensus_confidence: 0.70,
        }
    }
}

/// Merge reviewer proposals into a verdict.
#[must_use]
pub fn adjudicate(
    task: &MappingTask,
    proposals: &[ReviewerProposal],
    config: &CommitteeConfig,
) -> CommitteeVerdict {
    // A proposal referencing any column outside the candidate set is
    // rejected as a whole.
    let mut invalid_reviewers = Vec::new();
    let valid: Vec<&ReviewerProposal> = proposals
        .iter()
        .filter(|p| {
            let ok = p
                .entries
                .iter()
                .all(|(field, entry)| task.permits(*field, &entry.column));
            if !ok {
                invalid_reviewers.push(p.reviewer_id.clone());
            }
            ok
        })
        .collect();

    let mut accepted: BTreeMap<CanonicalField, AcceptedMapping> = BTreeMap::new();
    let mut disagreements: Vec<Disagreement> = Vec::new();
    let mut any_full_agreement_miss = false;

    for field in fields_in(&valid) {
        let options = tally(field, &valid);
        let voters: usize = options.iter().map(|o| o.votes).sum();
        let top = &options[0];
        let top_tied = options.len() > 1 && options[1].votes == top.votes;

        if !top_tied
            && top.votes >= config.min_agreeing
            && top.mean_confidence >= config.consensus_confidence
        {
            if top.votes < voters {
                any_full_agreement_miss = true;
            }
            accepted.insert(
                field,
                AcceptedMapping {
                    column: top.column.clone(),
                    mean_confidence: top.mean_confidence,
                    votes: top.votes,
                },
            );
        } else {
            let reason = if top_tied || options.len() > 1 {
                "reviewers named different columns".to_string()
            } else if top.votes < config.min_agreeing {
                format!("only {} reviewer(s) named this column", top.votes)
            } else {
                format!(
                    "mean confidence {:.2} below threshold {:.2}",
                    top.mean_confidence, config.consensus_confidence
                )
            };
            disagreements.push(Disagreement {
                field,
                options,
                reason,
            });
        }
    }

    // Same-table constraint first: required fields must share one table.
    apply_same_table_constraint(&mut accepted, &mut disagreements);

    // Then the deterministic-evidence override: the matcher's own top
    // candidate outranks reviewer consensus.
    apply_evidence_override(task, &mut accepted, &mut disagreements);

    disagreements.sort_by_key(|d| {
        CanonicalField::ALL
            .iter()
            .position(|f| *f == d.field)
            .unwrap_or(usize::MAX)
    });

    let consensus = consensus_level(&accepted, &disagreements, any_full_agreement_miss);
    let mut red_flags: Vec<String> = valid.iter().flat_map(|p| p.red_flags.clone()).collect();
    red_flags.sort();
    red_flags.dedup();

    debug!(
        accepted = accepted.len(),
        ambiguous = disagreements.len(),
        ?consensus,
        "committee adjudicated"
    );

    CommitteeVerdict {
        consensus,
        accepted,
        disagreements,
        invalid_reviewers,
        red_flags,
    }
}

/// Fields voted on by any valid proposal, in catalog order.
fn fields_in(valid: &[&ReviewerProposal]) -> Vec<CanonicalField> {
    CanonicalField::ALL
        .into_iter()
        .filter(|field| valid.iter().any(|p| p.entries.contains_key(field)))
        .collect()
}

/// Vote counts and mean confidences per column, most supported first.
fn tally(field: CanonicalField, valid: &[&ReviewerProposal]) -> Vec<DisagreementOption> {
    let mut by_column: BTreeMap<String, (ColumnRef, usize, f64)> = BTreeMap::new();
    for proposal in valid {
        if let Some(entry) = proposal.entries.get(&field) {
            let key = format!(
                "{}:{}:{}",
                entry.column.sheet, entry.column.table, entry.column.column
            );
            let slot = by_column
                .entry(key)
                .or_insert((entry.column.clone(), 0, 0.0));
            slot.1 += 1;
            slot.2 += entry.confidence;
        }
    }
    let mut options: Vec<DisagreementOption> = by_column
        .into_values()
        .map(|(column, votes, sum)| DisagreementOption {
            column,
            votes,
            mean_confidence: sum / votes as f64,
        })
        .collect();
    options.sort_by(|a, b| {
        b.votes.cmp(&a.votes).then(
            b.mean_confidence
                .partial_cmp(&a.mean_confidence)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    options
}

fn apply_same_table_constraint(
    accepted: &mut BTreeMap<CanonicalField, AcceptedMapping>,
    disagreements: &mut Vec<Disagreement>,
) {
    let tables: Vec<(CanonicalField, (usize, usize))> = CanonicalField::SAME_TABLE_SET
        .iter()
        .filter_map(|field| {
            accepted
                .get(field)
                .map(|m| (*field, (m.column.sheet, m.column.table)))
        })
        .collect();

    let all_same = tables
        .windows(2)
        .all(|pair| pair[0].1 == pair[1].1);
    if all_same {
        return;
    }

    for (field, _) in tables {
        if let Some(mapping) = accepted.remove(&field) {
            disagreements.push(Disagreement {
                field,
                options: vec![DisagreementOption {
                    column: mapping.column,
                    votes: mapping.votes,
                    mean_confidence: mapping.mean_confidence,
                }],
                reason: "required fields span more than one table".to_string(),
            });
        }
    }
}

fn apply_evidence_override(
    task: &MappingTask,
    accepted: &mut BTreeMap<CanonicalField, AcceptedMapping>,
    disagreements: &mut Vec<Disagreement>,
) {
    let contradicted: Vec<CanonicalField> = accepted
        .iter()
        .filter_map(|(field, mapping)| {
            task.matcher_top
                .get(field)
                .filter(|top| **top != mapping.column)
                .map(|_| *field)
        })
        .collect();

    for field in contradicted {
        if let Some(mapping) = accepted.remove(&field) {
            let mut options = vec![DisagreementOption {
                column: mapping.column,
                votes: mapping.votes,
                mean_confidence: mapping.mean_confidence,
            }];
            if let Some(top) = task.matcher_top.get(&field) {
                options.push(DisagreementOption {
                    column: top.clone(),
                    votes: 0,
                    mean_confidence: 0.0,
                });
            }
            disagreements.push(Disagreement {
                field,
                options,
                reason: "deterministic evidence favors a different column".to_string(),
            });
        }
    }
}

fn consensus_level(
    accepted: &BTreeMap<CanonicalField, AcceptedMapping>,
    disagreements: &[Disagreement],
    any_full_agreement_miss: bool,
) -> ConsensusLevel {
    if accepted.is_empty() {
        ConsensusLevel::NoConsensus
    } else if !disagreements.is_empty() {
        ConsensusLevel::Split
    } else if any_full_agreement_miss {
        ConsensusLevel::Majority
    } else {
        ConsensusLevel::Unanimous
    }
}
