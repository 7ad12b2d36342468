//! Durable order-processing orchestration.
//!
//! One logical task drives each case through its lifecycle, suspending at
//! human-wait points instead of blocking threads. Every completed step
//! appends events to the case store, so a crashed or restarted process
//! resumes at the last committed step without repeating committed side
//! effects. External calls retry per policy; the order-creation call is
//! additionally guarded by a duplicate fingerprint so it can never run
//! twice for the same submission.

#![deny(unsafe_code)]

mod config;
mod engine;
mod error;
mod mailbox;
mod memory;
mod ports;
mod retry;

pub use config::{FlowConfig, WaitLadder};
pub use engine::{CaseOutcome, IntakeRequest, OrderFlow};
pub use error::FlowError;
pub use mailbox::{MailboxRegistry, Signal, SignalMailbox, SignalPayload};
pub use memory::{MemoryLedger, MemoryNotifier, MemoryStorage};
pub use ports::{
    BlobRef, CaseNotification, CaseNotifier, CatalogRef, CreatedDraft, FileStorage, LedgerCatalog,
    LookupOutcome, PortError, StoredFile,
};
pub use retry::{RetryError, RetryPolicy, retry};
