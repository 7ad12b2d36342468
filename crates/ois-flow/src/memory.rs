//! In-memory collaborator implementations for tests and local runs.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use ois_case::CaseId;
use ois_ingest::Workbook;
use ois_model::CanonicalOrder;

use crate::ports::{
    BlobRef, CaseNotification, CaseNotifier, CatalogRef, CreatedDraft, FileStorage, LedgerCatalog,
    LookupOutcome, PortError, StoredFile,
};

/// Blob storage backed by a map of pre-registered workbooks.
#[derive(Default)]
pub struct MemoryStorage {
    blobs: Mutex<BTreeMap<String, Result<Workbook, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parseable workbook under a blob reference.
    pub fn put_workbook(&self, reference: &str, workbook: Workbook) {
        let mut blobs = self.blobs.lock().expect("storage lock poisoned");
        blobs.insert(reference.to_string(), Ok(workbook));
    }

    /// Register a blob that stores fine but cannot be parsed.
    pub fn put_blocked(&self, reference: &str, reason: &str) {
        let mut blobs = self.blobs.lock().expect("storage lock poisoned");
        blobs.insert(reference.to_string(), Err(reason.to_string()));
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn store(&self, blob: &BlobRef) -> Result<StoredFile, PortError> {
        let blobs = self.blobs.lock().expect("storage lock poisoned");
        if !blobs.contains_key(&blob.reference) {
            return Err(PortError::Fatal(format!(
                "unknown blob reference {}",
                blob.reference
            )));
        }
        let content = match &blobs[&blob.reference] {
            Ok(workbook) => serde_json::to_vec(workbook).unwrap_or_default(),
            Err(reason) => reason.as_bytes().to_vec(),
        };
        Ok(StoredFile {
            content_hash: hex::encode(Sha256::digest(&content)),
            stored_path: format!("mem://{}", blob.reference),
        })
    }

    async fn load_workbook(&self, stored: &StoredFile) -> Result<Workbook, PortError> {
        let reference = stored
            .stored_path
            .strip_prefix("mem://")
            .unwrap_or(&stored.stored_path);
        let blobs = self.blobs.lock().expect("storage lock poisoned");
        match blobs.get(reference) {
            Some(Ok(workbook)) => Ok(workbook.clone()),
            Some(Err(reason)) => Err(PortError::Blocked(reason.clone())),
            None => Err(PortError::Fatal(format!("missing stored file {reference}"))),
        }
    }
}

/// Ledger catalog backed by fixed customer and item lists, with optional
/// transient-failure injection on order creation.
#[derive(Default)]
pub struct MemoryLedger {
    customers: Mutex<Vec<CatalogRef>>,
    items: Mutex<BTreeMap<String, CatalogRef>>,
    create_failures: AtomicU32,
    creates: AtomicU32,
    created: Mutex<Vec<CreatedDraft>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_customer(&self, external_id: &str, display_name: &str) {
        self.customers
            .lock()
            .expect("ledger lock poisoned")
            .push(CatalogRef {
                external_id: external_id.to_string(),
                display_name: display_name.to_string(),
            });
    }

    pub fn add_item(&self, sku: &str, external_id: &str) {
        self.items.lock().expect("ledger lock poisoned").insert(
            sku.to_string(),
            CatalogRef {
                external_id: external_id.to_string(),
                display_name: sku.to_string(),
            },
        );
    }

    /// Make the next `count` creation calls fail transiently.
    pub fn fail_next_creates(&self, count: u32) {
        self.create_failures.store(count, Ordering::SeqCst);
    }

    /// Number of creation calls that actually went through.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.lock().expect("ledger lock poisoned").len()
    }

    /// Total creation attempts, including injected failures.
    #[must_use]
    pub fn create_attempts(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerCatalog for MemoryLedger {
    async fn search_customer(&self, name: &str) -> Result<LookupOutcome, PortError> {
        let needle = name.trim().to_lowercase();
        let customers = self.customers.lock().expect("ledger lock poisoned");
        let matches: Vec<CatalogRef> = customers
            .iter()
            .filter(|c| c.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(match matches.len() {
            0 => LookupOutcome::NotFound,
            1 => LookupOutcome::Unique(matches.into_iter().next().expect("one match")),
            _ => LookupOutcome::Ambiguous(matches),
        })
    }

    async fn search_item(
        &self,
        sku: Option<&str>,
        description: Option<&str>,
    ) -> Result<LookupOutcome, PortError> {
        let items = self.items.lock().expect("ledger lock poisoned");
        if let Some(sku) = sku
            && let Some(found) = items.get(sku)
        {
            return Ok(LookupOutcome::Unique(found.clone()));
        }
        if let Some(description) = description {
            let needle = description.to_lowercase();
            let matches: Vec<CatalogRef> = items
                .values()
                .filter(|i| i.display_name.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            if matches.len() == 1 {
                return Ok(LookupOutcome::Unique(matches.into_iter().next().expect("one match")));
            }
            if !matches.is_empty() {
                return Ok(LookupOutcome::Ambiguous(matches));
            }
        }
        Ok(LookupOutcome::NotFound)
    }

    async fn create_draft_order(&self, order: &CanonicalOrder) -> Result<CreatedDraft, PortError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let remaining = self.create_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.create_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PortError::Transient("ledger unreachable".to_string()));
        }

        let mut created = self.created.lock().expect("ledger lock poisoned");
        let draft = CreatedDraft {
            order_id: format!("SO-{:05}", created.len() + 1),
            order_number: format!("DRAFT-{:05}", created.len() + 1),
            status: "draft".to_string(),
        };
        let _ = order;
        created.push(draft.clone());
        Ok(draft)
    }
}

/// Notification sink that records everything it is asked to send.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(CaseId, CaseNotification)>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(CaseId, CaseNotification)> {
        self.sent.lock().expect("notifier lock poisoned").clone()
    }

    /// Count of notifications matching a predicate.
    #[must_use]
    pub fn count_matching(&self, predicate: impl Fn(&CaseNotification) -> bool) -> usize {
        self.sent
            .lock()
            .expect("notifier lock poisoned")
            .iter()
            .filter(|(_, n)| predicate(n))
            .count()
    }
}

#[async_trait]
impl CaseNotifier for MemoryNotifier {
    async fn notify(
        &self,
        case_id: CaseId,
        notification: CaseNotification,
    ) -> Result<(), PortError> {
        self.sent
            .lock()
            .expect("notifier lock poisoned")
            .push((case_id, notification));
        Ok(())
    }
}
