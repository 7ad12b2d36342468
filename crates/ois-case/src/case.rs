//! The order case projection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ois_committee::CommitteeVerdict;
use ois_infer::SchemaInference;
use ois_model::{CanonicalOrder, Correction, OrderIssue, Selection};

use crate::events::CaseEvent;
use crate::ids::{CaseId, CorrelationId, TenantId, UserId};
use crate::status::CaseStatus;

/// Stored-file metadata for the current upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFileInfo {
    pub content_hash: String,
    pub stored_path: String,
    pub file_name: String,
}

/// The downstream order produced for a completed case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub order_id: String,
    pub order_number: String,
    pub is_duplicate: bool,
}

/// Answer to the current-state query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub current_step: &'static str,
    pub status: CaseStatus,
    pub last_updated: DateTime<Utc>,
    pub errors: Vec<String>,
}

/// Latest-state projection of one case, folded from its event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCase {
    pub id: CaseId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub correlation_id: CorrelationId,
    pub status: CaseStatus,
    /// Bumps on every applied event.
    pub revision: u64,
    /// Blob reference for the current upload.
    pub file_ref: String,
    pub file: Option<StoredFileInfo>,
    pub inference: Option<SchemaInference>,
    pub order: Option<CanonicalOrder>,
    pub verdict: Option<CommitteeVerdict>,
    pub issues: Vec<OrderIssue>,
    pub corrections: Vec<Correction>,
    pub selection: Option<Selection>,
    pub resolved_items: BTreeMap<usize, String>,
    pub created_order: Option<CreatedOrder>,
    pub cancel_reason: Option<String>,
    pub errors: Vec<String>,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderCase {
    /// Fold a projection from a case's event log.
    ///
    /// Returns `None` for an empty log or one that does not begin with
    /// [`CaseEvent::Opened`].
    #[must_use]
    pub fn replay(id: CaseId, events: &[CaseEvent]) -> Option<Self> {
        let mut iter = events.iter();
        let first = iter.next()?;
        let CaseEvent::Opened {
            tenant_id,
            user_id,
            correlation_id,
            file_ref,
            file_name,
            at,
        } = first
        else {
            return None;
        };

        let mut case = Self {
            id,
            tenant_id: tenant_id.clone(),
            user_id: user_id.clone(),
            correlation_id: *correlation_id,
            status: CaseStatus::StoringFile,
            revision: 1,
            file_ref: file_ref.clone(),
            file: Some(StoredFileInfo {
                content_hash: String::new(),
                stored_path: String::new(),
                file_name: file_name.clone(),
            }),
            inference: None,
            order: None,
            verdict: None,
            issues: Vec::new(),
            corrections: Vec::new(),
            selection: None,
            resolved_items: BTreeMap::new(),
            created_order: None,
            cancel_reason: None,
            errors: Vec::new(),
            opened_at: *at,
            updated_at: *at,
        };
        for event in iter {
            case.apply(event);
        }
        Some(case)
    }

    /// Apply one event to the projection.
    pub fn apply(&mut self, event: &CaseEvent) {
        self.revision += 1;
        self.updated_at = event.at();

        match event {
            CaseEvent::Opened { .. } => {}
            CaseEvent::StatusChanged { to, .. } => {
                self.status = *to;
            }
            CaseEvent::FileStored {
                content_hash,
                stored_path,
                ..
            } => {
                let name = self
                    .file
                    .as_ref()
                    .map(|f| f.file_name.clone())
                    .unwrap_or_default();
                self.file = Some(StoredFileInfo {
                    content_hash: content_hash.clone(),
                    stored_path: stored_path.clone(),
                    file_name: name,
                });
            }
            CaseEvent::ExtractionCompleted {
                inference, order, ..
            } => {
                self.inference = Some(inference.clone());
                self.order = Some(order.clone());
            }
            CaseEvent::CommitteeAdjudicated { verdict, .. } => {
                self.verdict = Some(verdict.clone());
            }
            CaseEvent::IssuesRaised { issues, .. } => {
                self.issues = issues.clone();
            }
            CaseEvent::CorrectionsApplied { corrections, .. } => {
                self.corrections.extend(corrections.iter().cloned());
                if let Some(order) = &mut self.order {
                    for correction in corrections {
                        // Replays re-apply the same corrections the live
                        // run already validated; failures cannot occur.
                        let _ = order.apply_correction(correction);
                    }
                }
            }
            CaseEvent::CustomerResolved { external_id, .. } => {
                if let Some(order) = &mut self.order {
                    order.customer.external_id = Some(external_id.clone());
                }
            }
            CaseEvent::SelectionRecorded { selection, .. } => {
                self.selection = Some(selection.clone());
            }
            CaseEvent::ItemsResolved { items, .. } => {
                self.resolved_items = items.clone();
            }
            CaseEvent::ApprovalRecorded { .. }
            | CaseEvent::WaitStarted { .. }
            | CaseEvent::ReminderSent { .. }
            | CaseEvent::EscalationSent { .. }
            | CaseEvent::TimeoutWarningSent { .. }
            | CaseEvent::SignalConsumed { .. } => {}
            CaseEvent::Restarted {
                correlation_id,
                file_ref,
                file_name,
                ..
            } => {
                self.correlation_id = *correlation_id;
                self.file_ref = file_ref.clone();
                self.file = Some(StoredFileInfo {
                    content_hash: String::new(),
                    stored_path: String::new(),
                    file_name: file_name.clone(),
                });
                self.inference = None;
                self.order = None;
                self.verdict = None;
                self.issues.clear();
            }
            CaseEvent::DraftCreated {
                order_id,
                order_number,
                is_duplicate,
                ..
            } => {
                self.created_order = Some(CreatedOrder {
                    order_id: order_id.clone(),
                    order_number: order_number.clone(),
                    is_duplicate: *is_duplicate,
                });
            }
            CaseEvent::QueuedForLedger { .. } => {}
            CaseEvent::Cancelled { reason, .. } => {
                self.cancel_reason = Some(reason.clone());
            }
            CaseEvent::Failed { step, reason, .. } => {
                self.errors.push(format!("{step}: {reason}"));
            }
        }
    }

    /// The current-state query answer.
    #[must_use]
    pub fn snapshot(&self) -> CaseSnapshot {
        CaseSnapshot {
            current_step: self.status.as_str(),
            status: self.status,
            last_updated: self.updated_at,
            errors: self.errors.clone(),
        }
    }
}
