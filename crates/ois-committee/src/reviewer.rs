//! Reviewer port and concurrent dispatch.

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::warn;

use crate::adjudicate::{CommitteeConfig, adjudicate};
use crate::types::{CommitteeVerdict, MappingTask, ReviewerProposal};

/// Reviewer failure. Reviewers are advisory; a failed reviewer is dropped
/// from adjudication rather than failing the case.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Reviewer {reviewer_id} is unavailable: {reason}")]
    Unavailable { reviewer_id: String, reason: String },
    #[error("Reviewer {reviewer_id} returned a malformed proposal: {reason}")]
    Malformed { reviewer_id: String, reason: String },
}

/// One independent evaluator in the committee.
#[async_trait]
pub trait Reviewer: Send + Sync {
    fn id(&self) -> &str;

    /// Produce a proposal, choosing only from the task's candidate sets.
    async fn review(&self, task: &MappingTask) -> Result<ReviewerProposal, ReviewError>;
}

/// Query every reviewer concurrently and join before returning.
///
/// The fan-out is fixed to the reviewer list; failures are logged and
/// dropped.
pub async fn gather_proposals(
    reviewers: &[Box<dyn Reviewer>],
    task: &MappingTask,
) -> Vec<ReviewerProposal> {
    let futures = reviewers.iter().map(|r| r.review(task));
    join_all(futures)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(proposal) => Some(proposal),
            Err(error) => {
                warn!(%error, "reviewer dropped from committee");
                None
            }
        })
        .collect()
}

/// Gather proposals and adjudicate them in one step.
pub async fn run_committee(
    reviewers: &[Box<dyn Reviewer>],
    task: &MappingTask,
    config: &CommitteeConfig,
) -> CommitteeVerdict {
    let proposals = gather_proposals(reviewers, task).await;
    adjudicate(task, &proposals, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProposalEntry;
    use ois_infer::ColumnRef;
    use ois_model::CanonicalField;
    use std::collections::BTreeMap;

    struct FixedReviewer {
        id: String,
        proposal: Option<ReviewerProposal>,
    }

    #[async_trait]
    impl Reviewer for FixedReviewer {
        fn id(&self) -> &str {
            &self.id
        }

        async fn review(&self, _task: &MappingTask) -> Result<ReviewerProposal, ReviewError> {
            self.proposal
                .clone()
                .ok_or_else(|| ReviewError::Unavailable {
                    reviewer_id: self.id.clone(),
                    reason: "offline".to_string(),
                })
        }
    }

    fn column(index: usize) -> ColumnRef {
        ColumnRef {
            sheet: 0,
            table: 0,
            column: index,
            header: format!("col{index}"),
        }
    }

    fn task_with_candidates() -> MappingTask {
        let mut candidates = BTreeMap::new();
        candidates.insert(CanonicalField::Quantity, vec![column(0), column(1)]);
        let mut matcher_top = BTreeMap::new();
        matcher_top.insert(CanonicalField::Quantity, column(0));
        MappingTask {
            candidates,
            matcher_top,
        }
    }

    fn proposal(id: &str, col: ColumnRef, confidence: f64) -> ReviewerProposal {
        let mut entries = BTreeMap::new();
        entries.insert(CanonicalField::Quantity, ProposalEntry {
            column: col,
            confidence,
        });
        ReviewerProposal {
            reviewer_id: id.to_string(),
            entries,
            red_flags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn failed_reviewers_are_dropped_not_fatal() {
        let reviewers: Vec<Box<dyn Reviewer>> = vec![
            Box::new(FixedReviewer {
                id: "a".into(),
                proposal: Some(proposal("a", column(0), 0.9)),
            }),
            Box::new(FixedReviewer {
                id: "b".into(),
                proposal: None,
            }),
            Box::new(FixedReviewer {
                id: "c".into(),
                proposal: Some(proposal("c", column(0), 0.8)),
            }),
        ];

        let task = task_with_candidates();
        let verdict = run_committee(&reviewers, &task, &CommitteeConfig::default()).await;

        let accepted = verdict.accepted.get(&CanonicalField::Quantity).unwrap();
        assert_eq!(accepted.votes, 2);
        assert!((accepted.mean_confidence - 0.85).abs() < 1e-9);
    }
}
