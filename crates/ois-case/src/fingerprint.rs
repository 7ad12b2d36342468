//! Duplicate-submission fingerprints.
//!
//! A fingerprint is computed before the external creation call; a
//! collision against the store short-circuits the call entirely.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::ids::CaseId;
use crate::store::StoreError;

/// Deterministic hash identifying one submission's external effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the duplicate-guard fingerprint for one submission.
///
/// Covers the file content hash, the owning organization, the normalized
/// customer id, and the line-item signature. Identical inputs always
/// produce identical fingerprints.
#[must_use]
pub fn fingerprint(
    file_hash: &str,
    organization_id: &str,
    customer_id: &str,
    line_signature: &str,
) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(file_hash.as_bytes());
    hasher.update([0u8]);
    hasher.update(organization_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(customer_id.trim().to_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(line_signature.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

/// One fingerprint maps to at most one created downstream order.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Claim a fingerprint for a case.
    ///
    /// Returns the already-owning case id on collision; the claim is only
    /// recorded when no owner existed.
    async fn claim(&self, fp: &Fingerprint, case_id: CaseId) -> Result<Option<CaseId>, StoreError>;

    /// Current owner of a fingerprint, if any.
    async fn lookup(&self, fp: &Fingerprint) -> Result<Option<CaseId>, StoreError>;
}

/// In-memory fingerprint store for tests and local runs.
#[derive(Default)]
pub struct MemoryFingerprintStore {
    claims: Mutex<BTreeMap<Fingerprint, CaseId>>,
}

impl MemoryFingerprintStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FingerprintStore for MemoryFingerprintStore {
    async fn claim(&self, fp: &Fingerprint, case_id: CaseId) -> Result<Option<CaseId>, StoreError> {
        let mut claims = self.claims.lock().await;
        if let Some(owner) = claims.get(fp) {
            return Ok(Some(*owner));
        }
        claims.insert(fp.clone(), case_id);
        Ok(None)
    }

    async fn lookup(&self, fp: &Fingerprint) -> Result<Option<CaseId>, StoreError> {
        let claims = self.claims.lock().await;
        Ok(claims.get(fp).copied())
    }
}
