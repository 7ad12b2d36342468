//! The append-only case event log.
//!
//! Every orchestrator step appends events; the projection in
//! [`crate::OrderCase`] is folded from them. Events carry enough payload
//! to rebuild any historical revision.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ois_committee::CommitteeVerdict;
use ois_infer::SchemaInference;
use ois_model::{CanonicalOrder, Correction, OrderIssue, Selection};

use crate::ids::{CorrelationId, TenantId, UserId};
use crate::status::CaseStatus;

/// External signal kinds a case can wait on.
///
/// Each kind owns exactly one pending mailbox slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    FileReuploaded,
    CorrectionsSubmitted,
    SelectionsSubmitted,
    ApprovalReceived,
}

/// One durable entry in a case's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum CaseEvent {
    Opened {
        tenant_id: TenantId,
        user_id: UserId,
        correlation_id: CorrelationId,
        /// Opaque blob reference delivered by the intake channel.
        file_ref: String,
        file_name: String,
        at: DateTime<Utc>,
    },
    StatusChanged {
        from: CaseStatus,
        to: CaseStatus,
        at: DateTime<Utc>,
    },
    FileStored {
        content_hash: String,
        stored_path: String,
        at: DateTime<Utc>,
    },
    ExtractionCompleted {
        inference: SchemaInference,
        order: CanonicalOrder,
        at: DateTime<Utc>,
    },
    CommitteeAdjudicated {
        verdict: CommitteeVerdict,
        at: DateTime<Utc>,
    },
    IssuesRaised {
        issues: Vec<OrderIssue>,
        at: DateTime<Utc>,
    },
    CorrectionsApplied {
        corrections: Vec<Correction>,
        order_version: u32,
        at: DateTime<Utc>,
    },
    CustomerResolved {
        external_id: String,
        at: DateTime<Utc>,
    },
    SelectionRecorded {
        selection: Selection,
        at: DateTime<Utc>,
    },
    ItemsResolved {
        items: BTreeMap<usize, String>,
        at: DateTime<Utc>,
    },
    ApprovalRecorded {
        approved: bool,
        actor: String,
        at: DateTime<Utc>,
    },
    WaitStarted {
        kind: SignalKind,
        at: DateTime<Utc>,
    },
    ReminderSent {
        kind: SignalKind,
        at: DateTime<Utc>,
    },
    EscalationSent {
        kind: SignalKind,
        at: DateTime<Utc>,
    },
    TimeoutWarningSent {
        kind: SignalKind,
        at: DateTime<Utc>,
    },
    SignalConsumed {
        kind: SignalKind,
        submitted_by: String,
        at: DateTime<Utc>,
    },
    /// A blocked file was re-uploaded; the case restarts under a fresh
    /// correlation id while its history stays intact.
    Restarted {
        correlation_id: CorrelationId,
        file_ref: String,
        file_name: String,
        at: DateTime<Utc>,
    },
    DraftCreated {
        order_id: String,
        order_number: String,
        is_duplicate: bool,
        at: DateTime<Utc>,
    },
    QueuedForLedger {
        reason: String,
        at: DateTime<Utc>,
    },
    Cancelled {
        reason: String,
        at: DateTime<Utc>,
    },
    Failed {
        step: CaseStatus,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl CaseEvent {
    /// Event timestamp.
    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Opened { at, .. }
            | Self::StatusChanged { at, .. }
            | Self::FileStored { at, .. }
            | Self::ExtractionCompleted { at, .. }
            | Self::CommitteeAdjudicated { at, .. }
            | Self::IssuesRaised { at, .. }
            | Self::CorrectionsApplied { at, .. }
            | Self::CustomerResolved { at, .. }
            | Self::SelectionRecorded { at, .. }
            | Self::ItemsResolved { at, .. }
            | Self::ApprovalRecorded { at, .. }
            | Self::WaitStarted { at, .. }
            | Self::ReminderSent { at, .. }
            | Self::EscalationSent { at, .. }
            | Self::TimeoutWarningSent { at, .. }
            | Self::SignalConsumed { at, .. }
            | Self::Restarted { at, .. }
            | Self::DraftCreated { at, .. }
            | Self::QueuedForLedger { at, .. }
            | Self::Cancelled { at, .. }
            | Self::Failed { at, .. } => *at,
        }
    }
}
