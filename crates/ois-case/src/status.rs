//! Case lifecycle states.

use serde::{Deserialize, Serialize};

/// Position of a case in its lifecycle.
///
/// Transitions are restricted to the directed graph encoded in
/// [`CaseStatus::can_transition`]; the only loop-backs are blocked file →
/// storing file and corrections → resolving customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    StoringFile,
    Parsing,
    RunningCommittee,
    AwaitingCorrections,
    ResolvingCustomer,
    AwaitingCustomerSelection,
    ResolvingItems,
    AwaitingItemSelection,
    AwaitingApproval,
    CreatingZohoDraft,
    QueuedForZoho,
    Completed,
    Cancelled,
    Failed,
}

impl CaseStatus {
    /// Stable wire/log name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoringFile => "storing_file",
            Self::Parsing => "parsing",
            Self::RunningCommittee => "running_committee",
            Self::AwaitingCorrections => "awaiting_corrections",
            Self::ResolvingCustomer => "resolving_customer",
            Self::AwaitingCustomerSelection => "awaiting_customer_selection",
            Self::ResolvingItems => "resolving_items",
            Self::AwaitingItemSelection => "awaiting_item_selection",
            Self::AwaitingApproval => "awaiting_approval",
            Self::CreatingZohoDraft => "creating_zoho_draft",
            Self::QueuedForZoho => "queued_for_zoho",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Terminal states archive the case; nothing moves out of them.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// A state where the case is suspended on a human signal.
    #[must_use]
    pub fn is_human_wait(&self) -> bool {
        matches!(
            self,
            Self::AwaitingCorrections
                | Self::AwaitingCustomerSelection
                | Self::AwaitingItemSelection
                | Self::AwaitingApproval
        )
    }

    /// Whether `to` is reachable from `self` in one step.
    #[must_use]
    pub fn can_transition(&self, to: CaseStatus) -> bool {
        use CaseStatus as S;
        if self.is_terminal() {
            return false;
        }
        // Any non-terminal step may fail on a non-recoverable error.
        if to == S::Failed {
            return true;
        }
        match self {
            S::StoringFile => matches!(to, S::Parsing),
            // A blocked file loops back to storing on re-upload; the
            // blocked wait may also time out into cancellation.
            S::Parsing => matches!(to, S::RunningCommittee | S::StoringFile | S::Cancelled),
            S::RunningCommittee => {
                matches!(to, S::AwaitingCorrections | S::ResolvingCustomer)
            }
            S::AwaitingCorrections => matches!(to, S::ResolvingCustomer | S::Cancelled),
            S::ResolvingCustomer => {
                matches!(to, S::AwaitingCustomerSelection | S::ResolvingItems)
            }
            S::AwaitingCustomerSelection => matches!(to, S::ResolvingItems | S::Cancelled),
            S::ResolvingItems => matches!(to, S::AwaitingItemSelection | S::AwaitingApproval),
            S::AwaitingItemSelection => matches!(to, S::AwaitingApproval | S::Cancelled),
            S::AwaitingApproval => matches!(to, S::CreatingZohoDraft | S::Cancelled),
            S::CreatingZohoDraft => matches!(to, S::Completed | S::QueuedForZoho),
            S::QueuedForZoho => matches!(to, S::Completed),
            S::Completed | S::Cancelled | S::Failed => false,
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
