//! Case store port and the in-memory reference implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::case::OrderCase;
use crate::events::CaseEvent;
use crate::ids::{CaseId, TenantId, UserId};

/// Store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Case {0} not found")]
    CaseNotFound(CaseId),
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Append-only event log plus latest-state projection, keyed by case id.
///
/// The orchestrator operates exclusively through this trait; backends are
/// pluggable (memory for tests, a database in production).
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Append an event and return its sequence number (1-based).
    async fn append(&self, case_id: CaseId, event: CaseEvent) -> Result<u64, StoreError>;

    /// Full event log of a case, oldest first.
    async fn events(&self, case_id: CaseId) -> Result<Vec<CaseEvent>, StoreError>;

    /// Latest-state projection; `None` when the case does not exist.
    async fn load(&self, case_id: CaseId) -> Result<Option<OrderCase>, StoreError>;

    /// Case ids owned by a tenant, oldest first.
    async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<CaseId>, StoreError>;

    /// Case ids opened by a user, oldest first.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<CaseId>, StoreError>;
}

/// In-memory case store for tests and local runs.
#[derive(Default)]
pub struct MemoryCaseStore {
    logs: Mutex<BTreeMap<CaseId, Vec<CaseEvent>>>,
}

impl MemoryCaseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn append(&self, case_id: CaseId, event: CaseEvent) -> Result<u64, StoreError> {
        let mut logs = self.logs.lock().await;
        let log = logs.entry(case_id).or_default();
        log.push(event);
        Ok(log.len() as u64)
    }

    async fn events(&self, case_id: CaseId) -> Result<Vec<CaseEvent>, StoreError> {
        let logs = self.logs.lock().await;
        logs.get(&case_id)
            .cloned()
            .ok_or(StoreError::CaseNotFound(case_id))
    }

    async fn load(&self, case_id: CaseId) -> Result<Option<OrderCase>, StoreError> {
        let logs = self.logs.lock().await;
        Ok(logs
            .get(&case_id)
            .and_then(|events| OrderCase::replay(case_id, events)))
    }

    async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<CaseId>, StoreError> {
        let logs = self.logs.lock().await;
        Ok(logs
            .iter()
            .filter(|(case_id, events)| {
                OrderCase::replay(**case_id, events)
                    .is_some_and(|case| case.tenant_id == *tenant_id)
            })
            .map(|(case_id, _)| *case_id)
            .collect())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<CaseId>, StoreError> {
        let logs = self.logs.lock().await;
        Ok(logs
            .iter()
            .filter(|(case_id, events)| {
                OrderCase::replay(**case_id, events).is_some_and(|case| case.user_id == *user_id)
            })
            .map(|(case_id, _)| *case_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CorrelationId;
    use chrono::Utc;

    fn opened(tenant: &str, user: &str) -> CaseEvent {
        CaseEvent::Opened {
            tenant_id: TenantId::new(tenant),
            user_id: UserId::new(user),
            correlation_id: CorrelationId::new(),
            file_ref: "blob://f".to_string(),
            file_name: "f.csv".to_string(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_returns_sequence_numbers() {
        let store = MemoryCaseStore::new();
        let case_id = CaseId::new();
        assert_eq!(store.append(case_id, opened("t", "u")).await.unwrap(), 1);
        assert_eq!(
            store
                .append(
                    case_id,
                    CaseEvent::FileStored {
                        content_hash: "h".to_string(),
                        stored_path: "p".to_string(),
                        at: Utc::now(),
                    }
                )
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn queries_filter_by_tenant_and_user() {
        let store = MemoryCaseStore::new();
        let a = CaseId::new();
        let b = CaseId::new();
        store.append(a, opened("acme", "alice")).await.unwrap();
        store.append(b, opened("globex", "bob")).await.unwrap();

        let acme = store.list_by_tenant(&TenantId::new("acme")).await.unwrap();
        assert_eq!(acme, vec![a]);

        let bob = store.list_by_user(&UserId::new("bob")).await.unwrap();
        assert_eq!(bob, vec![b]);
    }

    #[tokio::test]
    async fn missing_case_loads_none() {
        let store = MemoryCaseStore::new();
        assert!(store.load(CaseId::new()).await.unwrap().is_none());
    }
}
