//! Collaborator ports.
//!
//! The orchestrator talks to the outside world only through these traits.
//! Production backends wrap the chat channel, the blob store, and the
//! ledger HTTP client; the in-memory implementations in [`crate::memory`]
//! back tests and local runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ois_case::{CaseId, SignalKind};
use ois_ingest::Workbook;
use ois_model::CanonicalOrder;

/// Opaque reference to an uploaded blob, as delivered by the intake
/// channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub reference: String,
    pub file_name: String,
}

/// Result of storing a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub content_hash: String,
    pub stored_path: String,
}

/// Port failure classification drives the retry policies.
#[derive(Debug, Clone, Error)]
pub enum PortError {
    /// Worth retrying: timeouts, rate limits, connection resets.
    #[error("transient: {0}")]
    Transient(String),
    /// Retrying cannot help: bad request, auth failure, contract breach.
    #[error("fatal: {0}")]
    Fatal(String),
    /// The stored file cannot be parsed deterministically. Routes the
    /// case to re-upload; only meaningful from [`FileStorage`].
    #[error("blocked: {0}")]
    Blocked(String),
}

/// Blob storage collaborator.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist the blob; returns its content hash and stored path.
    async fn store(&self, blob: &BlobRef) -> Result<StoredFile, PortError>;

    /// Parse a stored file into a workbook grid.
    async fn load_workbook(&self, stored: &StoredFile) -> Result<Workbook, PortError>;
}

/// One customer or item in the ledger catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRef {
    pub external_id: String,
    pub display_name: String,
}

/// Outcome of a catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupOutcome {
    Unique(CatalogRef),
    Ambiguous(Vec<CatalogRef>),
    NotFound,
}

/// A draft order created downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDraft {
    pub order_id: String,
    pub order_number: String,
    pub status: String,
}

/// Ledger catalog collaborator.
#[async_trait]
pub trait LedgerCatalog: Send + Sync {
    async fn search_customer(&self, name: &str) -> Result<LookupOutcome, PortError>;

    async fn search_item(
        &self,
        sku: Option<&str>,
        description: Option<&str>,
    ) -> Result<LookupOutcome, PortError>;

    async fn create_draft_order(&self, order: &CanonicalOrder) -> Result<CreatedDraft, PortError>;
}

/// Notification kinds pushed back to the intake channel, keyed by case id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CaseNotification {
    Blocked {
        reason: String,
    },
    Issues {
        issues: Vec<String>,
        /// Bounded multiple-choice questions from committee disagreements.
        questions: Vec<String>,
    },
    SelectionNeeded {
        subject: String,
        options: Vec<String>,
    },
    ReadyForApproval,
    Complete {
        order_number: String,
        is_duplicate: bool,
    },
    Failed {
        reason: String,
    },
    Reminder {
        waiting_on: SignalKind,
    },
    Escalation {
        waiting_on: SignalKind,
    },
    TimeoutWarning {
        waiting_on: SignalKind,
    },
}

/// Intake-channel notification sink.
#[async_trait]
pub trait CaseNotifier: Send + Sync {
    async fn notify(&self, case_id: CaseId, notification: CaseNotification)
    -> Result<(), PortError>;
}
