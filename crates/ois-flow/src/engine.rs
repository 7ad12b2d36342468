//! The case engine.
//!
//! `OrderFlow` drives one case at a time through the lifecycle graph. The
//! loop loads the projection, executes the step for the current status,
//! appends the step's events, and repeats; statuses are the checkpoints.
//! A process restart re-enters the loop at the persisted status, so waits
//! and side effects pick up where the crashed run left off.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use ois_case::{
    CaseEvent, CaseId, CaseSnapshot, CaseStatus, CaseStore, CorrelationId, FingerprintStore,
    OrderCase, SignalKind, TenantId, UserId, fingerprint,
};
use ois_committee::{MappingTask, Reviewer, run_committee};
use ois_infer::{extract_order, infer_schema};
use ois_model::{IssueSeverity, validate_order};

use crate::config::FlowConfig;
use crate::error::FlowError;
use crate::mailbox::{MailboxRegistry, Signal, SignalPayload};
use crate::ports::{
    BlobRef, CaseNotification, CaseNotifier, CatalogRef, FileStorage, LedgerCatalog,
    LookupOutcome, StoredFile,
};
use crate::retry::{RetryError, retry};

/// What the intake channel delivers to start a case.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub case_id: CaseId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub correlation_id: CorrelationId,
    pub blob: BlobRef,
    /// Free-text context from the chat conversation, kept for audit.
    pub conversation_context: Option<String>,
}

/// Terminal (or near-terminal) result of driving a case.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    Completed {
        order_number: String,
        is_duplicate: bool,
    },
    /// Ledger unreachable but the case is otherwise valid; the queued
    /// creation is drained later via [`OrderFlow::drain_queued`].
    QueuedForZoho,
    Cancelled {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

/// The orchestrator. One instance serves many concurrent cases; each case
/// is driven by a single logical task and owns its partition of the
/// shared stores.
pub struct OrderFlow {
    config: FlowConfig,
    store: Arc<dyn CaseStore>,
    fingerprints: Arc<dyn FingerprintStore>,
    storage: Arc<dyn FileStorage>,
    ledger: Arc<dyn LedgerCatalog>,
    notifier: Arc<dyn CaseNotifier>,
    reviewers: Vec<Box<dyn Reviewer>>,
    mailboxes: MailboxRegistry,
}

impl OrderFlow {
    pub fn new(
        config: FlowConfig,
        store: Arc<dyn CaseStore>,
        fingerprints: Arc<dyn FingerprintStore>,
        storage: Arc<dyn FileStorage>,
        ledger: Arc<dyn LedgerCatalog>,
        notifier: Arc<dyn CaseNotifier>,
        reviewers: Vec<Box<dyn Reviewer>>,
    ) -> Self {
        Self {
            config,
            store,
            fingerprints,
            storage,
            ledger,
            notifier,
            reviewers,
            mailboxes: MailboxRegistry::new(),
        }
    }

    /// Deliver a case-scoped signal. Overwrites any pending signal of the
    /// same kind (last write wins).
    pub fn signal(&self, case_id: CaseId, payload: SignalPayload, submitted_by: &str) {
        self.mailboxes.for_case(case_id).post(Signal {
            payload,
            submitted_by: submitted_by.to_string(),
            at: Utc::now(),
        });
    }

    /// Answer the current-state query.
    pub async fn current_state(&self, case_id: CaseId) -> Result<CaseSnapshot, FlowError> {
        let case = self
            .store
            .load(case_id)
            .await?
            .ok_or(FlowError::UnknownCase(case_id))?;
        Ok(case.snapshot())
    }

    /// Open a new case and drive it to an outcome.
    pub async fn submit(&self, intake: IntakeRequest) -> Result<CaseOutcome, FlowError> {
        info!(case_id = %intake.case_id, tenant = %intake.tenant_id, "case opened");
        self.append(
            intake.case_id,
            CaseEvent::Opened {
                tenant_id: intake.tenant_id.clone(),
                user_id: intake.user_id.clone(),
                correlation_id: intake.correlation_id,
                file_ref: intake.blob.reference.clone(),
                file_name: intake.blob.file_name.clone(),
                at: Utc::now(),
            },
        )
        .await?;
        self.drive(intake.case_id).await
    }

    /// Resume a case after a process restart.
    pub async fn resume(&self, case_id: CaseId) -> Result<CaseOutcome, FlowError> {
        info!(%case_id, "resuming case");
        self.drive(case_id).await
    }

    /// Drive a case in a background task.
    pub fn spawn(
        self: &Arc<Self>,
        intake: IntakeRequest,
    ) -> tokio::task::JoinHandle<Result<CaseOutcome, FlowError>> {
        let flow = Arc::clone(self);
        tokio::spawn(async move { flow.submit(intake).await })
    }

    /// Retry the queued creation call for a case parked at
    /// `queued_for_zoho`. Returns the new outcome.
    pub async fn drain_queued(&self, case_id: CaseId) -> Result<CaseOutcome, FlowError> {
        let case = self.load(case_id).await?;
        if case.status != CaseStatus::QueuedForZoho {
            return Err(FlowError::NotResumable {
                case_id,
                status: case.status.as_str().to_string(),
            });
        }
        self.create_draft(&case, true).await?;
        self.outcome_of(case_id).await
    }

    // ── The step loop ──

    async fn drive(&self, case_id: CaseId) -> Result<CaseOutcome, FlowError> {
        loop {
            let case = self.load(case_id).await?;
            match case.status {
                CaseStatus::StoringFile => self.store_file(&case).await?,
                CaseStatus::Parsing => self.parse(&case).await?,
                CaseStatus::RunningCommittee => self.committee(&case).await?,
                CaseStatus::AwaitingCorrections => self.await_corrections(&case).await?,
                CaseStatus::ResolvingCustomer => self.resolve_customer(&case).await?,
                CaseStatus::AwaitingCustomerSelection => {
                    self.await_customer_selection(&case).await?;
                }
                CaseStatus::ResolvingItems => self.resolve_items(&case).await?,
                CaseStatus::AwaitingItemSelection => self.await_item_selection(&case).await?,
                CaseStatus::AwaitingApproval => self.await_approval(&case).await?,
                CaseStatus::CreatingZohoDraft => self.create_draft(&case, false).await?,
                CaseStatus::QueuedForZoho
                | CaseStatus::Completed
                | CaseStatus::Cancelled
                | CaseStatus::Failed => {
                    self.mailboxes.remove(case_id);
                    return self.outcome_of(case_id).await;
                }
            }
        }
    }

    async fn store_file(&self, case: &OrderCase) -> Result<(), FlowError> {
        let blob = BlobRef {
            reference: case.file_ref.clone(),
            file_name: case
                .file
                .as_ref()
                .map(|f| f.file_name.clone())
                .unwrap_or_default(),
        };
        let stored = retry(self.config.retry_standard, "store file", || {
            self.storage.store(&blob)
        })
        .await;

        match stored {
            Ok(stored) => {
                self.append(
                    case.id,
                    CaseEvent::FileStored {
                        content_hash: stored.content_hash,
                        stored_path: stored.stored_path,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.transition(case.id, CaseStatus::StoringFile, CaseStatus::Parsing)
                    .await
            }
            Err(error) => {
                self.fail(case, CaseStatus::StoringFile, &error.to_string())
                    .await
            }
        }
    }

    async fn parse(&self, case: &OrderCase) -> Result<(), FlowError> {
        let Some(file) = case.file.clone() else {
            return self.fail(case, CaseStatus::Parsing, "no stored file").await;
        };
        let stored = StoredFile {
            content_hash: file.content_hash,
            stored_path: file.stored_path,
        };

        let workbook = retry(self.config.retry_standard, "load workbook", || {
            self.storage.load_workbook(&stored)
        })
        .await;

        let workbook = match workbook {
            Ok(workbook) => workbook,
            Err(RetryError::Blocked { reason, .. }) => {
                return self.blocked(case, &reason).await;
            }
            Err(error) => {
                return self.fail(case, CaseStatus::Parsing, &error.to_string()).await;
            }
        };

        match infer_schema(&workbook, &self.config.infer) {
            Ok(inference) => {
                let mut order = extract_order(&workbook, &inference);
                order.meta.source_file = case.file.as_ref().map(|f| f.file_name.clone());
                self.append(
                    case.id,
                    CaseEvent::ExtractionCompleted {
                        inference,
                        order,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.transition(case.id, CaseStatus::Parsing, CaseStatus::RunningCommittee)
                    .await
            }
            Err(error) => self.blocked(case, &error.to_string()).await,
        }
    }

    /// Blocked-file protocol: notify, wait for a re-upload, and restart
    /// the case under a fresh correlation id. An unanswered wait cancels.
    /// Modeled as a plain loop-back transition so history stays bounded
    /// across any number of re-uploads.
    async fn blocked(&self, case: &OrderCase, reason: &str) -> Result<(), FlowError> {
        warn!(case_id = %case.id, reason, "file blocked");
        self.notify(
            case.id,
            CaseNotification::Blocked {
                reason: reason.to_string(),
            },
        )
        .await;

        match self.wait_with_ladder(case.id, SignalKind::FileReuploaded).await? {
            Some(signal) => {
                let SignalPayload::FileReuploaded { blob } = signal.payload else {
                    return self
                        .fail(case, CaseStatus::Parsing, "unexpected signal payload")
                        .await;
                };
                self.append(
                    case.id,
                    CaseEvent::Restarted {
                        correlation_id: CorrelationId::new(),
                        file_ref: blob.reference,
                        file_name: blob.file_name,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.transition(case.id, CaseStatus::Parsing, CaseStatus::StoringFile)
                    .await
            }
            None => {
                self.cancel(
                    case,
                    CaseStatus::Parsing,
                    "blocked file was never re-uploaded",
                )
                .await
            }
        }
    }

    async fn committee(&self, case: &OrderCase) -> Result<(), FlowError> {
        let Some(inference) = case.inference.as_ref() else {
            return self
                .fail(case, CaseStatus::RunningCommittee, "no extraction on record")
                .await;
        };
        let Some(order) = case.order.as_ref() else {
            return self
                .fail(case, CaseStatus::RunningCommittee, "no order on record")
                .await;
        };

        let task = MappingTask::from_inference(inference);
        let verdict = run_committee(&self.reviewers, &task, &self.config.committee).await;
        self.append(
            case.id,
            CaseEvent::CommitteeAdjudicated {
                verdict: verdict.clone(),
                at: Utc::now(),
            },
        )
        .await?;

        let issues = validate_order(order);
        let blocking: Vec<String> = issues
            .iter()
            .filter(|i| i.severity() == IssueSeverity::Blocking)
            .map(|i| i.message())
            .collect();
        if !blocking.is_empty() {
            self.append(
                case.id,
                CaseEvent::IssuesRaised {
                    issues: issues.clone(),
                    at: Utc::now(),
                },
            )
            .await?;
            return self
                .fail(case, CaseStatus::RunningCommittee, &blocking.join("; "))
                .await;
        }

        let needs_confirmation = issues
            .iter()
            .any(|i| i.severity() == IssueSeverity::Confirm);
        let fast_path = self.config.allow_fast_path
            && inference.score.band.may_bypass_review()
            && verdict.is_clean()
            && !needs_confirmation;

        if fast_path {
            info!(case_id = %case.id, "fast path: extraction accepted without review");
            return self
                .transition(
                    case.id,
                    CaseStatus::RunningCommittee,
                    CaseStatus::ResolvingCustomer,
                )
                .await;
        }

        self.append(
            case.id,
            CaseEvent::IssuesRaised {
                issues: issues.clone(),
                at: Utc::now(),
            },
        )
        .await?;
        let questions: Vec<String> = verdict
            .disagreements
            .iter()
            .map(|d| {
                let options: Vec<String> = d
                    .options
                    .iter()
                    .map(|o| format!("{} ({} votes)", o.column.header, o.votes))
                    .collect();
                format!("Which column holds {}? {}", d.field, options.join(" / "))
            })
            .collect();
        self.notify(
            case.id,
            CaseNotification::Issues {
                issues: issues.iter().map(|i| i.message()).collect(),
                questions,
            },
        )
        .await;
        self.transition(
            case.id,
            CaseStatus::RunningCommittee,
            CaseStatus::AwaitingCorrections,
        )
        .await
    }

    async fn await_corrections(&self, case: &OrderCase) -> Result<(), FlowError> {
        match self
            .wait_with_ladder(case.id, SignalKind::CorrectionsSubmitted)
            .await?
        {
            Some(signal) => {
                let SignalPayload::CorrectionsSubmitted { corrections } = signal.payload else {
                    return self
                        .fail(
                            case,
                            CaseStatus::AwaitingCorrections,
                            "unexpected signal payload",
                        )
                        .await;
                };

                let Some(mut order) = case.order.clone() else {
                    return self
                        .fail(case, CaseStatus::AwaitingCorrections, "no order on record")
                        .await;
                };
                for correction in &corrections {
                    if let Err(error) = order.apply_correction(correction) {
                        // Invalid edits re-enter the wait with the reason
                        // surfaced; valid ones are not partially applied.
                        self.notify(
                            case.id,
                            CaseNotification::Issues {
                                issues: vec![error.to_string()],
                                questions: Vec::new(),
                            },
                        )
                        .await;
                        return Ok(());
                    }
                }

                let blocking: Vec<String> = validate_order(&order)
                    .iter()
                    .filter(|i| i.severity() == IssueSeverity::Blocking)
                    .map(ois_model::OrderIssue::message)
                    .collect();
                if !blocking.is_empty() {
                    return self
                        .fail(case, CaseStatus::AwaitingCorrections, &blocking.join("; "))
                        .await;
                }

                self.append(
                    case.id,
                    CaseEvent::CorrectionsApplied {
                        corrections,
                        order_version: order.version,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.transition(
                    case.id,
                    CaseStatus::AwaitingCorrections,
                    CaseStatus::ResolvingCustomer,
                )
                .await
            }
            None => {
                self.cancel(
                    case,
                    CaseStatus::AwaitingCorrections,
                    "corrections were never submitted",
                )
                .await
            }
        }
    }

    async fn resolve_customer(&self, case: &OrderCase) -> Result<(), FlowError> {
        let Some(order) = case.order.as_ref() else {
            return self
                .fail(case, CaseStatus::ResolvingCustomer, "no order on record")
                .await;
        };

        if order.customer.external_id.is_some() {
            return self
                .transition(
                    case.id,
                    CaseStatus::ResolvingCustomer,
                    CaseStatus::ResolvingItems,
                )
                .await;
        }

        let Some(name) = order.customer.name.clone() else {
            self.notify(
                case.id,
                CaseNotification::SelectionNeeded {
                    subject: "customer".to_string(),
                    options: Vec::new(),
                },
            )
            .await;
            return self
                .transition(
                    case.id,
                    CaseStatus::ResolvingCustomer,
                    CaseStatus::AwaitingCustomerSelection,
                )
                .await;
        };

        let outcome = retry(self.config.retry_standard, "customer search", || {
            self.ledger.search_customer(&name)
        })
        .await;

        match outcome {
            Ok(LookupOutcome::Unique(customer)) => {
                self.append(
                    case.id,
                    CaseEvent::CustomerResolved {
                        external_id: customer.external_id,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.transition(
                    case.id,
                    CaseStatus::ResolvingCustomer,
                    CaseStatus::ResolvingItems,
                )
                .await
            }
            Ok(LookupOutcome::Ambiguous(candidates)) => {
                self.notify(
                    case.id,
                    CaseNotification::SelectionNeeded {
                        subject: "customer".to_string(),
                        options: candidates.iter().map(describe_catalog_ref).collect(),
                    },
                )
                .await;
                self.transition(
                    case.id,
                    CaseStatus::ResolvingCustomer,
                    CaseStatus::AwaitingCustomerSelection,
                )
                .await
            }
            Ok(LookupOutcome::NotFound) => {
                self.notify(
                    case.id,
                    CaseNotification::SelectionNeeded {
                        subject: "customer".to_string(),
                        options: Vec::new(),
                    },
                )
                .await;
                self.transition(
                    case.id,
                    CaseStatus::ResolvingCustomer,
                    CaseStatus::AwaitingCustomerSelection,
                )
                .await
            }
            Err(error) => {
                self.fail(case, CaseStatus::ResolvingCustomer, &error.to_string())
                    .await
            }
        }
    }

    async fn await_customer_selection(&self, case: &OrderCase) -> Result<(), FlowError> {
        match self
            .wait_with_ladder(case.id, SignalKind::SelectionsSubmitted)
            .await?
        {
            Some(signal) => {
                let SignalPayload::SelectionsSubmitted { selection } = signal.payload else {
                    return self
                        .fail(
                            case,
                            CaseStatus::AwaitingCustomerSelection,
                            "unexpected signal payload",
                        )
                        .await;
                };
                self.append(
                    case.id,
                    CaseEvent::SelectionRecorded {
                        selection: selection.clone(),
                        at: Utc::now(),
                    },
                )
                .await?;
                let Some(external_id) = selection.customer_external_id else {
                    // No customer chosen; ask again.
                    self.notify(
                        case.id,
                        CaseNotification::SelectionNeeded {
                            subject: "customer".to_string(),
                            options: Vec::new(),
                        },
                    )
                    .await;
                    return Ok(());
                };
                self.append(
                    case.id,
                    CaseEvent::CustomerResolved {
                        external_id,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.transition(
                    case.id,
                    CaseStatus::AwaitingCustomerSelection,
                    CaseStatus::ResolvingItems,
                )
                .await
            }
            None => {
                self.cancel(
                    case,
                    CaseStatus::AwaitingCustomerSelection,
                    "customer selection was never submitted",
                )
                .await
            }
        }
    }

    async fn resolve_items(&self, case: &OrderCase) -> Result<(), FlowError> {
        let Some(order) = case.order.as_ref() else {
            return self
                .fail(case, CaseStatus::ResolvingItems, "no order on record")
                .await;
        };

        let mut resolved = case.resolved_items.clone();
        let mut open_questions: Vec<String> = Vec::new();

        for line in &order.lines {
            if resolved.contains_key(&line.line_number) {
                continue;
            }
            let outcome = retry(self.config.retry_standard, "item search", || {
                self.ledger
                    .search_item(line.sku.as_deref(), line.description.as_deref())
            })
            .await;
            match outcome {
                Ok(LookupOutcome::Unique(item)) => {
                    resolved.insert(line.line_number, item.external_id);
                }
                Ok(LookupOutcome::Ambiguous(candidates)) => {
                    open_questions.push(format!(
                        "line {}: {}",
                        line.line_number,
                        candidates
                            .iter()
                            .map(describe_catalog_ref)
                            .collect::<Vec<_>>()
                            .join(" / ")
                    ));
                }
                Ok(LookupOutcome::NotFound) => {
                    open_questions.push(format!(
                        "line {}: no catalog match for {}",
                        line.line_number,
                        line.sku.as_deref().unwrap_or("(no sku)")
                    ));
                }
                Err(error) => {
                    return self
                        .fail(case, CaseStatus::ResolvingItems, &error.to_string())
                        .await;
                }
            }
        }

        if resolved != case.resolved_items {
            self.append(
                case.id,
                CaseEvent::ItemsResolved {
                    items: resolved,
                    at: Utc::now(),
                },
            )
            .await?;
        }

        if open_questions.is_empty() {
            self.notify(case.id, CaseNotification::ReadyForApproval).await;
            self.transition(
                case.id,
                CaseStatus::ResolvingItems,
                CaseStatus::AwaitingApproval,
            )
            .await
        } else {
            self.notify(
                case.id,
                CaseNotification::SelectionNeeded {
                    subject: "items".to_string(),
                    options: open_questions,
                },
            )
            .await;
            self.transition(
                case.id,
                CaseStatus::ResolvingItems,
                CaseStatus::AwaitingItemSelection,
            )
            .await
        }
    }

    async fn await_item_selection(&self, case: &OrderCase) -> Result<(), FlowError> {
        match self
            .wait_with_ladder(case.id, SignalKind::SelectionsSubmitted)
            .await?
        {
            Some(signal) => {
                let SignalPayload::SelectionsSubmitted { selection } = signal.payload else {
                    return self
                        .fail(
                            case,
                            CaseStatus::AwaitingItemSelection,
                            "unexpected signal payload",
                        )
                        .await;
                };
                self.append(
                    case.id,
                    CaseEvent::SelectionRecorded {
                        selection: selection.clone(),
                        at: Utc::now(),
                    },
                )
                .await?;
                let mut merged = case.resolved_items.clone();
                merged.extend(selection.line_items);
                self.append(
                    case.id,
                    CaseEvent::ItemsResolved {
                        items: merged,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.notify(case.id, CaseNotification::ReadyForApproval).await;
                self.transition(
                    case.id,
                    CaseStatus::AwaitingItemSelection,
                    CaseStatus::AwaitingApproval,
                )
                .await
            }
            None => {
                self.cancel(
                    case,
                    CaseStatus::AwaitingItemSelection,
                    "item selection was never submitted",
                )
                .await
            }
        }
    }

    async fn await_approval(&self, case: &OrderCase) -> Result<(), FlowError> {
        match self
            .wait_with_ladder(case.id, SignalKind::ApprovalReceived)
            .await?
        {
            Some(signal) => {
                let SignalPayload::ApprovalReceived { approved } = signal.payload else {
                    return self
                        .fail(
                            case,
                            CaseStatus::AwaitingApproval,
                            "unexpected signal payload",
                        )
                        .await;
                };
                self.append(
                    case.id,
                    CaseEvent::ApprovalRecorded {
                        approved,
                        actor: signal.submitted_by.clone(),
                        at: Utc::now(),
                    },
                )
                .await?;
                if approved {
                    self.transition(
                        case.id,
                        CaseStatus::AwaitingApproval,
                        CaseStatus::CreatingZohoDraft,
                    )
                    .await
                } else {
                    self.cancel(
                        case,
                        CaseStatus::AwaitingApproval,
                        &format!("rejected by {}", signal.submitted_by),
                    )
                    .await
                }
            }
            None => {
                self.cancel(
                    case,
                    CaseStatus::AwaitingApproval,
                    "approval was never received",
                )
                .await
            }
        }
    }

    /// The external creation call, guarded by the duplicate fingerprint.
    /// `from_queue` distinguishes the drain path's source status.
    async fn create_draft(&self, case: &OrderCase, from_queue: bool) -> Result<(), FlowError> {
        let from_status = if from_queue {
            CaseStatus::QueuedForZoho
        } else {
            CaseStatus::CreatingZohoDraft
        };
        let Some(order) = case.order.as_ref() else {
            return self.fail(case, from_status, "no order on record").await;
        };

        let file_hash = case
            .file
            .as_ref()
            .map(|f| f.content_hash.clone())
            .unwrap_or_default();
        let customer_key = order
            .customer
            .external_id
            .clone()
            .or_else(|| order.customer.name.clone())
            .unwrap_or_default();
        let fp = fingerprint(
            &file_hash,
            case.tenant_id.as_str(),
            &customer_key,
            &order.line_signature(),
        );

        if let Some(owner) = self.fingerprints.claim(&fp, case.id).await?
            && owner != case.id
        {
            // A previous submission already created this order; report it
            // as a duplicate with zero external side effects.
            let original_number = self
                .store
                .load(owner)
                .await?
                .and_then(|c| c.created_order)
                .map(|o| o.order_number)
                .unwrap_or_default();
            info!(case_id = %case.id, original = %owner, "duplicate submission short-circuited");
            self.append(
                case.id,
                CaseEvent::DraftCreated {
                    order_id: owner.to_string(),
                    order_number: original_number.clone(),
                    is_duplicate: true,
                    at: Utc::now(),
                },
            )
            .await?;
            self.notify(
                case.id,
                CaseNotification::Complete {
                    order_number: original_number,
                    is_duplicate: true,
                },
            )
            .await;
            return self.transition(case.id, from_status, CaseStatus::Completed).await;
        }

        if case.created_order.is_some() {
            // Crash recovery: the call already committed.
            return self.transition(case.id, from_status, CaseStatus::Completed).await;
        }

        let created = retry(self.config.retry_aggressive, "create draft order", || {
            self.ledger.create_draft_order(order)
        })
        .await;

        match created {
            Ok(draft) => {
                self.append(
                    case.id,
                    CaseEvent::DraftCreated {
                        order_id: draft.order_id,
                        order_number: draft.order_number.clone(),
                        is_duplicate: false,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.notify(
                    case.id,
                    CaseNotification::Complete {
                        order_number: draft.order_number,
                        is_duplicate: false,
                    },
                )
                .await;
                self.transition(case.id, from_status, CaseStatus::Completed).await
            }
            Err(RetryError::Exhausted { last, .. }) => {
                if from_queue {
                    // Still unreachable; stay parked in the queue.
                    return Ok(());
                }
                self.append(
                    case.id,
                    CaseEvent::QueuedForLedger {
                        reason: last,
                        at: Utc::now(),
                    },
                )
                .await?;
                self.transition(case.id, from_status, CaseStatus::QueuedForZoho)
                    .await
            }
            Err(error) => self.fail(case, from_status, &error.to_string()).await,
        }
    }

    // ── Waiting ──

    /// Wait for a signal under the escalation ladder. Returns `None` when
    /// the full ladder elapsed without a signal; the caller cancels.
    ///
    /// Re-entering a wait of a kind that completed before resets the
    /// mailbox slot, so a stale signal cannot be consumed twice. Resumed
    /// waits (after a restart) skip rungs that already fired according to
    /// the event log.
    async fn wait_with_ladder(
        &self,
        case_id: CaseId,
        kind: SignalKind,
    ) -> Result<Option<Signal>, FlowError> {
        let mailbox = self.mailboxes.for_case(case_id);

        let (mut elapsed, rungs_sent) = match self.wait_history(case_id, kind).await? {
            WaitHistory::Active { started_at, rungs } => {
                let elapsed = (Utc::now() - started_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                (elapsed, rungs)
            }
            first_or_repeat => {
                if matches!(first_or_repeat, WaitHistory::Finished) {
                    mailbox.clear(kind);
                }
                self.append(
                    case_id,
                    CaseEvent::WaitStarted {
                        kind,
                        at: Utc::now(),
                    },
                )
                .await?;
                (Duration::ZERO, 0)
            }
        };

        let deadlines = self.config.wait_ladder.deadlines();
        for (rung, deadline) in deadlines.iter().enumerate().skip(rungs_sent) {
            let window = deadline.saturating_sub(elapsed);
            match tokio::time::timeout(window, mailbox.recv(kind)).await {
                Ok(signal) => {
                    self.append(
                        case_id,
                        CaseEvent::SignalConsumed {
                            kind,
                            submitted_by: signal.submitted_by.clone(),
                            at: Utc::now(),
                        },
                    )
                    .await?;
                    return Ok(Some(signal));
                }
                Err(_) => {
                    elapsed = *deadline;
                    match rung {
                        0 => {
                            self.append(
                                case_id,
                                CaseEvent::ReminderSent {
                                    kind,
                                    at: Utc::now(),
                                },
                            )
                            .await?;
                            self.notify(case_id, CaseNotification::Reminder { waiting_on: kind })
                                .await;
                        }
                        1 => {
                            self.append(
                                case_id,
                                CaseEvent::EscalationSent {
                                    kind,
                                    at: Utc::now(),
                                },
                            )
                            .await?;
                            self.notify(case_id, CaseNotification::Escalation { waiting_on: kind })
                                .await;
                        }
                        2 => {
                            self.append(
                                case_id,
                                CaseEvent::TimeoutWarningSent {
                                    kind,
                                    at: Utc::now(),
                                },
                            )
                            .await?;
                            self.notify(
                                case_id,
                                CaseNotification::TimeoutWarning { waiting_on: kind },
                            )
                            .await;
                        }
                        _ => return Ok(None),
                    }
                }
            }
        }
        Ok(None)
    }

    /// What the log says about waits of `kind`: one is mid-flight (crash
    /// recovery), one finished earlier (re-entry), or none ever ran.
    async fn wait_history(
        &self,
        case_id: CaseId,
        kind: SignalKind,
    ) -> Result<WaitHistory, FlowError> {
        let events = self.store.events(case_id).await?;
        let mut active: Option<(chrono::DateTime<Utc>, usize)> = None;
        let mut finished = false;
        for event in &events {
            match event {
                CaseEvent::WaitStarted { kind: k, at } if *k == kind => {
                    active = Some((*at, 0));
                }
                CaseEvent::ReminderSent { kind: k, .. }
                | CaseEvent::EscalationSent { kind: k, .. }
                | CaseEvent::TimeoutWarningSent { kind: k, .. }
                    if *k == kind =>
                {
                    if let Some((_, rungs)) = active.as_mut() {
                        *rungs += 1;
                    }
                }
                CaseEvent::SignalConsumed { kind: k, .. } if *k == kind => {
                    active = None;
                    finished = true;
                }
                _ => {}
            }
        }
        Ok(match active {
            Some((started_at, rungs)) => WaitHistory::Active { started_at, rungs },
            None if finished => WaitHistory::Finished,
            None => WaitHistory::None,
        })
    }

    // ── Bookkeeping ──

    async fn load(&self, case_id: CaseId) -> Result<OrderCase, FlowError> {
        self.store
            .load(case_id)
            .await?
            .ok_or(FlowError::UnknownCase(case_id))
    }

    async fn append(&self, case_id: CaseId, event: CaseEvent) -> Result<(), FlowError> {
        self.store.append(case_id, event).await?;
        Ok(())
    }

    async fn transition(
        &self,
        case_id: CaseId,
        from: CaseStatus,
        to: CaseStatus,
    ) -> Result<(), FlowError> {
        debug_assert!(from.can_transition(to), "illegal transition {from} -> {to}");
        self.append(
            case_id,
            CaseEvent::StatusChanged {
                from,
                to,
                at: Utc::now(),
            },
        )
        .await
    }

    async fn fail(
        &self,
        case: &OrderCase,
        step: CaseStatus,
        reason: &str,
    ) -> Result<(), FlowError> {
        warn!(case_id = %case.id, %step, reason, "case failed");
        self.append(
            case.id,
            CaseEvent::Failed {
                step,
                reason: reason.to_string(),
                at: Utc::now(),
            },
        )
        .await?;
        self.notify(
            case.id,
            CaseNotification::Failed {
                reason: format!("case {}: {reason}", case.id),
            },
        )
        .await;
        self.transition(case.id, step, CaseStatus::Failed).await
    }

    async fn cancel(
        &self,
        case: &OrderCase,
        from: CaseStatus,
        reason: &str,
    ) -> Result<(), FlowError> {
        info!(case_id = %case.id, reason, "case cancelled");
        self.append(
            case.id,
            CaseEvent::Cancelled {
                reason: reason.to_string(),
                at: Utc::now(),
            },
        )
        .await?;
        self.transition(case.id, from, CaseStatus::Cancelled).await
    }

    /// Best-effort notification; delivery failures never stop a case.
    async fn notify(&self, case_id: CaseId, notification: CaseNotification) {
        if let Err(error) = self.notifier.notify(case_id, notification).await {
            warn!(%case_id, %error, "notification delivery failed");
        }
    }

    async fn outcome_of(&self, case_id: CaseId) -> Result<CaseOutcome, FlowError> {
        let case = self.load(case_id).await?;
        Ok(match case.status {
            CaseStatus::Completed => {
                let created = case.created_order.unwrap_or_else(|| ois_case::CreatedOrder {
                    order_id: String::new(),
                    order_number: String::new(),
                    is_duplicate: false,
                });
                CaseOutcome::Completed {
                    order_number: created.order_number,
                    is_duplicate: created.is_duplicate,
                }
            }
            CaseStatus::Cancelled => CaseOutcome::Cancelled {
                reason: case.cancel_reason.unwrap_or_default(),
            },
            CaseStatus::Failed => CaseOutcome::Failed {
                reason: case.errors.last().cloned().unwrap_or_default(),
            },
            _ => CaseOutcome::QueuedForZoho,
        })
    }
}

/// Log-derived standing of a wait kind for one case.
enum WaitHistory {
    /// A wait is mid-flight; resume it instead of starting over.
    Active {
        started_at: chrono::DateTime<Utc>,
        rungs: usize,
    },
    /// An earlier wait of this kind completed; the slot must be reset.
    Finished,
    /// First wait of this kind for the case.
    None,
}

fn describe_catalog_ref(candidate: &CatalogRef) -> String {
    format!("{} [{}]", candidate.display_name, candidate.external_id)
}
