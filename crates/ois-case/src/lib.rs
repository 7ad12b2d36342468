//! Order case aggregate and persistence ports.
//!
//! A case is one uploaded spreadsheet progressing toward an accepted or
//! rejected order. The append-only [`CaseEvent`] log is the source of
//! truth; [`OrderCase`] is the projection folded from it. Cases are
//! archived at terminal states, never deleted, so every revision stays
//! retrievable for audit.

#![deny(unsafe_code)]

mod case;
mod events;
mod fingerprint;
mod ids;
mod status;
mod store;

pub use case::{CaseSnapshot, CreatedOrder, OrderCase, StoredFileInfo};
pub use events::{CaseEvent, SignalKind};
pub use fingerprint::{Fingerprint, FingerprintStore, MemoryFingerprintStore, fingerprint};
pub use ids::{CaseId, CorrelationId, TenantId, UserId};
pub use status::CaseStatus;
pub use store::{CaseStore, MemoryCaseStore, StoreError};
