//! Per-case signal mailboxes.
//!
//! Each signal kind owns exactly one pending slot, overwritten on receipt
//! and consumed by exactly one waiting control path. Slots are cleared
//! before a wait of the same kind re-enters, so a stale signal can never
//! be consumed twice.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use ois_case::{CaseId, SignalKind};
use ois_model::{Correction, Selection};

use crate::ports::BlobRef;

/// Payload of a case-scoped signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "signal")]
pub enum SignalPayload {
    FileReuploaded { blob: BlobRef },
    CorrectionsSubmitted { corrections: Vec<Correction> },
    SelectionsSubmitted { selection: Selection },
    ApprovalReceived { approved: bool },
}

impl SignalPayload {
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::FileReuploaded { .. } => SignalKind::FileReuploaded,
            Self::CorrectionsSubmitted { .. } => SignalKind::CorrectionsSubmitted,
            Self::SelectionsSubmitted { .. } => SignalKind::SelectionsSubmitted,
            Self::ApprovalReceived { .. } => SignalKind::ApprovalReceived,
        }
    }
}

/// One received signal with submitter identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub payload: SignalPayload,
    pub submitted_by: String,
    pub at: DateTime<Utc>,
}

impl Signal {
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        self.payload.kind()
    }
}

/// Mailbox for one case: one slot per signal kind, last write wins.
#[derive(Default)]
pub struct SignalMailbox {
    slots: Mutex<BTreeMap<SignalKind, Signal>>,
    notify: Notify,
}

impl SignalMailbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a signal, overwriting any pending one of the same kind.
    pub fn post(&self, signal: Signal) {
        let mut slots = self.slots.lock().expect("mailbox lock poisoned");
        slots.insert(signal.kind(), signal);
        drop(slots);
        self.notify.notify_waiters();
    }

    /// Consume the pending signal of a kind, if any.
    #[must_use]
    pub fn take(&self, kind: SignalKind) -> Option<Signal> {
        self.slots
            .lock()
            .expect("mailbox lock poisoned")
            .remove(&kind)
    }

    /// Reset one slot to empty.
    pub fn clear(&self, kind: SignalKind) {
        let _ = self.take(kind);
    }

    /// Suspend until a signal of `kind` is pending, then consume it.
    pub async fn recv(&self, kind: SignalKind) -> Signal {
        loop {
            let notified = self.notify.notified();
            if let Some(signal) = self.take(kind) {
                return signal;
            }
            notified.await;
        }
    }
}

/// Mailboxes for all live cases.
#[derive(Default)]
pub struct MailboxRegistry {
    boxes: Mutex<HashMap<CaseId, Arc<SignalMailbox>>>,
}

impl MailboxRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailbox for a case, created on first use.
    #[must_use]
    pub fn for_case(&self, case_id: CaseId) -> Arc<SignalMailbox> {
        let mut boxes = self.boxes.lock().expect("registry lock poisoned");
        Arc::clone(boxes.entry(case_id).or_default())
    }

    /// Drop a terminal case's mailbox.
    pub fn remove(&self, case_id: CaseId) {
        let mut boxes = self.boxes.lock().expect("registry lock poisoned");
        boxes.remove(&case_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approval(approved: bool, by: &str) -> Signal {
        Signal {
            payload: SignalPayload::ApprovalReceived { approved },
            submitted_by: by.to_string(),
            at: Utc::now(),
        }
    }

    #[test]
    fn last_write_wins_per_kind() {
        let mailbox = SignalMailbox::new();
        mailbox.post(approval(false, "alice"));
        mailbox.post(approval(true, "bob"));

        let signal = mailbox.take(SignalKind::ApprovalReceived).unwrap();
        assert_eq!(signal.submitted_by, "bob");
        assert!(mailbox.take(SignalKind::ApprovalReceived).is_none());
    }

    #[test]
    fn clear_resets_the_slot() {
        let mailbox = SignalMailbox::new();
        mailbox.post(approval(true, "alice"));
        mailbox.clear(SignalKind::ApprovalReceived);
        assert!(mailbox.take(SignalKind::ApprovalReceived).is_none());
    }

    #[tokio::test]
    async fn recv_wakes_on_post() {
        let mailbox = Arc::new(SignalMailbox::new());
        let waiter = Arc::clone(&mailbox);
        let handle = tokio::spawn(async move { waiter.recv(SignalKind::ApprovalReceived).await });

        tokio::task::yield_now().await;
        mailbox.post(approval(true, "carol"));

        let signal = handle.await.unwrap();
        assert_eq!(signal.submitted_by, "carol");
    }

    #[tokio::test]
    async fn recv_ignores_other_kinds() {
        let mailbox = Arc::new(SignalMailbox::new());
        mailbox.post(Signal {
            payload: SignalPayload::CorrectionsSubmitted {
                corrections: Vec::new(),
            },
            submitted_by: "alice".to_string(),
            at: Utc::now(),
        });

        let waiter = Arc::clone(&mailbox);
        let handle = tokio::spawn(async move { waiter.recv(SignalKind::ApprovalReceived).await });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        mailbox.post(approval(true, "bob"));
        let signal = handle.await.unwrap();
        assert_eq!(signal.kind(), SignalKind::ApprovalReceived);
    }
}
