//! Reviewer committee for schema mappings.
//!
//! Several independent reviewers each propose a column for every canonical
//! field, constrained to the deterministic candidate set produced by the
//! matcher. Their opinions are advisory: deterministic consensus rules
//! merge them into an accepted mapping or a list of disagreements that a
//! human resolves as bounded multiple-choice questions.

#![deny(unsafe_code)]

mod adjudicate;
mod reviewer;
mod types;

pub use adjudicate::{CommitteeConfig, adjudicate};
pub use reviewer::{ReviewError, Reviewer, gather_proposals, run_committee};
pub use types::{
    AcceptedMapping, CommitteeVerdict, ConsensusLevel, Disagreement, DisagreementOption,
    MappingTask, ProposalEntry, ReviewerProposal,
};
