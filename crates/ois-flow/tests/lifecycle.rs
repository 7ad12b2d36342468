//! Case lifecycle coverage with virtual time.
//!
//! These tests run on a paused tokio clock: ladder waits and retry
//! backoffs elapse instantly once every task is idle, so a seven-day
//! escalation ladder finishes in milliseconds of real time.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use ois_case::{
    CaseEvent, CaseId, CaseStatus, CaseStore, CorrelationId, MemoryCaseStore,
    MemoryFingerprintStore, SignalKind, TenantId, UserId,
};
use ois_committee::{MappingTask, ProposalEntry, ReviewError, Reviewer, ReviewerProposal};
use ois_flow::{
    BlobRef, CaseNotification, CaseOutcome, FlowConfig, IntakeRequest, MemoryLedger,
    MemoryNotifier, MemoryStorage, OrderFlow, SignalPayload,
};
use ois_ingest::Workbook;
use ois_model::{Correction, Selection};

/// Reviewer that always endorses the matcher's own top candidates.
struct AgreeingReviewer {
    id: String,
    confidence: f64,
}

#[async_trait]
impl Reviewer for AgreeingReviewer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn review(&self, task: &MappingTask) -> Result<ReviewerProposal, ReviewError> {
        let entries = task
            .matcher_top
            .iter()
            .map(|(field, column)| {
                (
                    *field,
                    ProposalEntry {
                        column: column.clone(),
                        confidence: self.confidence,
                    },
                )
            })
            .collect();
        Ok(ReviewerProposal {
            reviewer_id: self.id.clone(),
            entries,
            red_flags: Vec::new(),
        })
    }
}

fn reviewers() -> Vec<Box<dyn Reviewer>> {
    (1..=3)
        .map(|n| {
            Box::new(AgreeingReviewer {
                id: format!("reviewer-{n}"),
                confidence: 0.9,
            }) as Box<dyn Reviewer>
        })
        .collect()
}

struct Rig {
    flow: Arc<OrderFlow>,
    store: Arc<MemoryCaseStore>,
    fingerprints: Arc<MemoryFingerprintStore>,
    storage: Arc<MemoryStorage>,
    ledger: Arc<MemoryLedger>,
    notifier: Arc<MemoryNotifier>,
}

impl Rig {
    fn new() -> Self {
        let store = Arc::new(MemoryCaseStore::new());
        let fingerprints = Arc::new(MemoryFingerprintStore::new());
        let storage = Arc::new(MemoryStorage::new());
        let ledger = Arc::new(MemoryLedger::new());
        let notifier = Arc::new(MemoryNotifier::new());
        ledger.add_customer("CUST-1", "Acme Ltd");
        ledger.add_item("SKU-1", "ITEM-1");
        ledger.add_item("SKU-2", "ITEM-2");
        let flow = Arc::new(OrderFlow::new(
            FlowConfig::default(),
            store.clone(),
            fingerprints.clone(),
            storage.clone(),
            ledger.clone(),
            notifier.clone(),
            reviewers(),
        ));
        Self {
            flow,
            store,
            fingerprints,
            storage,
            ledger,
            notifier,
        }
    }

    /// A second orchestrator over the same shared stores, standing in for
    /// a restarted process.
    fn restarted(&self) -> Arc<OrderFlow> {
        Arc::new(OrderFlow::new(
            FlowConfig::default(),
            self.store.clone(),
            self.fingerprints.clone(),
            self.storage.clone(),
            self.ledger.clone(),
            self.notifier.clone(),
            reviewers(),
        ))
    }
}

fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter()
        .map(|r| r.iter().map(|c| (*c).to_string()).collect())
        .collect()
}

fn clean_workbook() -> Workbook {
    Workbook::single(
        "Orders",
        rows(&[
            &["Item Code", "Qty", "Unit Price", "Line Total", "Customer"],
            &["SKU-1", "2", "10.00", "20.00", "Acme Ltd"],
            &["SKU-2", "1", "4.50", "4.50", ""],
        ]),
    )
}

fn intake(case_id: CaseId, reference: &str) -> IntakeRequest {
    IntakeRequest {
        case_id,
        tenant_id: TenantId::new("acme-tenant"),
        user_id: UserId::new("uploader"),
        correlation_id: CorrelationId::new(),
        blob: BlobRef {
            reference: reference.to_string(),
            file_name: "orders.csv".to_string(),
        },
        conversation_context: None,
    }
}

/// Spin until `cond` holds without letting virtual time advance. Only for
/// conditions reachable without the passage of time.
async fn eventually(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..50_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("never reached: {what}");
}

fn approve() -> SignalPayload {
    SignalPayload::ApprovalReceived { approved: true }
}

#[tokio::test(start_paused = true)]
async fn clean_case_completes_after_single_approval() {
    let rig = Rig::new();
    rig.storage.put_workbook("blob-1", clean_workbook());
    let case_id = CaseId::new();
    let handle = rig.flow.spawn(intake(case_id, "blob-1"));

    let notifier = Arc::clone(&rig.notifier);
    eventually("ready for approval", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::ReadyForApproval)) == 1
    })
    .await;

    rig.flow.signal(case_id, approve(), "manager");
    let outcome = handle.await.unwrap().unwrap();

    match outcome {
        CaseOutcome::Completed {
            order_number,
            is_duplicate,
        } => {
            assert!(!is_duplicate);
            assert!(order_number.starts_with("DRAFT-"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(rig.ledger.created_count(), 1);

    // The prompt approval suppressed the entire wait ladder.
    assert_eq!(
        rig.notifier
            .count_matching(|n| matches!(n, CaseNotification::Reminder { .. })),
        0
    );

    let case = rig.store.load(case_id).await.unwrap().unwrap();
    assert_eq!(case.status, CaseStatus::Completed);
    assert!(case.order.is_some());
}

#[tokio::test(start_paused = true)]
async fn duplicate_submission_never_creates_a_second_order() {
    let rig = Rig::new();
    rig.storage.put_workbook("blob-1", clean_workbook());

    for (run, expected_duplicate) in [(0u32, false), (1, true)] {
        let case_id = CaseId::new();
        let handle = rig.flow.spawn(intake(case_id, "blob-1"));

        let notifier = Arc::clone(&rig.notifier);
        let expected = (run + 1) as usize;
        eventually("ready for approval", move || {
            notifier.count_matching(|n| matches!(n, CaseNotification::ReadyForApproval))
                == expected
        })
        .await;

        rig.flow.signal(case_id, approve(), "manager");
        let outcome = handle.await.unwrap().unwrap();
        match outcome {
            CaseOutcome::Completed { is_duplicate, .. } => {
                assert_eq!(is_duplicate, expected_duplicate, "run {run}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    // The second attempt short-circuited before any external call.
    assert_eq!(rig.ledger.created_count(), 1);
    assert_eq!(rig.ledger.create_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn negative_quantity_fails_before_customer_resolution() {
    let rig = Rig::new();
    rig.storage.put_workbook(
        "blob-bad",
        Workbook::single(
            "Orders",
            rows(&[
                &["Item Code", "Qty", "Unit Price", "Customer"],
                &["SKU-1", "-2", "10.00", "Acme Ltd"],
            ]),
        ),
    );

    let case_id = CaseId::new();
    let outcome = rig.flow.submit(intake(case_id, "blob-bad")).await.unwrap();

    match outcome {
        CaseOutcome::Failed { reason } => {
            assert!(reason.contains("negative quantity"), "reason: {reason}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Failed at validation, before any ledger traffic.
    assert_eq!(rig.ledger.create_attempts(), 0);
    let failure = rig
        .notifier
        .sent()
        .into_iter()
        .find_map(|(id, n)| match n {
            CaseNotification::Failed { reason } => Some((id, reason)),
            _ => None,
        })
        .expect("failure notification");
    assert_eq!(failure.0, case_id);
    assert!(failure.1.contains(&case_id.to_string()));
}

#[tokio::test(start_paused = true)]
async fn silent_approval_wait_walks_the_full_ladder_then_cancels() {
    let rig = Rig::new();
    rig.storage.put_workbook("blob-1", clean_workbook());
    let case_id = CaseId::new();

    let outcome = rig.flow.submit(intake(case_id, "blob-1")).await.unwrap();

    assert_eq!(
        outcome,
        CaseOutcome::Cancelled {
            reason: "approval was never received".to_string()
        }
    );
    assert_eq!(
        rig.notifier
            .count_matching(|n| matches!(n, CaseNotification::Reminder { .. })),
        1
    );
    assert_eq!(
        rig.notifier
            .count_matching(|n| matches!(n, CaseNotification::Escalation { .. })),
        1
    );
    assert_eq!(
        rig.notifier
            .count_matching(|n| matches!(n, CaseNotification::TimeoutWarning { .. })),
        1
    );

    let events = rig.store.events(case_id).await.unwrap();
    let reminder_at = events.iter().find_map(|e| match e {
        CaseEvent::ReminderSent { at, .. } => Some(*at),
        _ => None,
    });
    let cancelled_at = events.iter().find_map(|e| match e {
        CaseEvent::Cancelled { at, .. } => Some(*at),
        _ => None,
    });
    assert!(reminder_at.is_some());
    assert!(cancelled_at.is_some());

    let case = rig.store.load(case_id).await.unwrap().unwrap();
    assert_eq!(case.status, CaseStatus::Cancelled);
    assert_eq!(
        case.cancel_reason.as_deref(),
        Some("approval was never received")
    );
}

#[tokio::test(start_paused = true)]
async fn blocked_file_restarts_with_fresh_correlation_id() {
    let rig = Rig::new();
    rig.storage.put_blocked("blob-broken", "not a spreadsheet");
    rig.storage.put_workbook("blob-fixed", clean_workbook());

    let case_id = CaseId::new();
    let request = intake(case_id, "blob-broken");
    let original_correlation = request.correlation_id;
    let handle = rig.flow.spawn(request);

    let notifier = Arc::clone(&rig.notifier);
    eventually("blocked notification", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::Blocked { .. })) == 1
    })
    .await;

    rig.flow.signal(
        case_id,
        SignalPayload::FileReuploaded {
            blob: BlobRef {
                reference: "blob-fixed".to_string(),
                file_name: "orders-fixed.csv".to_string(),
            },
        },
        "uploader",
    );

    let notifier = Arc::clone(&rig.notifier);
    eventually("ready for approval", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::ReadyForApproval)) == 1
    })
    .await;
    rig.flow.signal(case_id, approve(), "manager");

    let outcome = handle.await.unwrap().unwrap();
    assert!(matches!(outcome, CaseOutcome::Completed { .. }));

    let case = rig.store.load(case_id).await.unwrap().unwrap();
    assert_eq!(case.id, case_id);
    assert_ne!(case.correlation_id, original_correlation);

    // Prior audit artifacts survive the restart.
    let events = rig.store.events(case_id).await.unwrap();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, CaseEvent::Restarted { .. }))
    );
    assert!(events.iter().any(
        |e| matches!(e, CaseEvent::Opened { correlation_id, .. } if *correlation_id == original_correlation)
    ));
}

#[tokio::test(start_paused = true)]
async fn zero_quantity_routes_to_corrections_and_recovers() {
    let rig = Rig::new();
    rig.storage.put_workbook(
        "blob-zero",
        Workbook::single(
            "Orders",
            rows(&[
                &["Item Code", "Qty", "Unit Price", "Line Total", "Customer"],
                &["SKU-1", "0", "10.00", "0.00", "Acme Ltd"],
            ]),
        ),
    );

    let case_id = CaseId::new();
    let handle = rig.flow.spawn(intake(case_id, "blob-zero"));

    let notifier = Arc::clone(&rig.notifier);
    eventually("issues notification", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::Issues { .. })) == 1
    })
    .await;

    let mut status = None;
    for _ in 0..10_000 {
        status = rig.store.load(case_id).await.unwrap().map(|c| c.status);
        if status == Some(CaseStatus::AwaitingCorrections) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(status, Some(CaseStatus::AwaitingCorrections));

    rig.flow.signal(
        case_id,
        SignalPayload::CorrectionsSubmitted {
            corrections: vec![Correction {
                field_path: "lines[0].quantity".to_string(),
                original: Some("0".to_string()),
                corrected: "3".to_string(),
                actor: "uploader".to_string(),
                at: Utc::now(),
            }],
        },
        "uploader",
    );

    let notifier = Arc::clone(&rig.notifier);
    eventually("ready for approval", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::ReadyForApproval)) == 1
    })
    .await;
    rig.flow.signal(case_id, approve(), "manager");

    let outcome = handle.await.unwrap().unwrap();
    assert!(matches!(outcome, CaseOutcome::Completed { .. }));

    let case = rig.store.load(case_id).await.unwrap().unwrap();
    let order = case.order.unwrap();
    assert_eq!(order.lines[0].quantity, 3.0);
    assert_eq!(order.version, 1);
    assert_eq!(case.corrections.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_rejection_cancels_the_case() {
    let rig = Rig::new();
    rig.storage.put_workbook("blob-1", clean_workbook());
    let case_id = CaseId::new();
    let handle = rig.flow.spawn(intake(case_id, "blob-1"));

    let notifier = Arc::clone(&rig.notifier);
    eventually("ready for approval", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::ReadyForApproval)) == 1
    })
    .await;

    rig.flow.signal(
        case_id,
        SignalPayload::ApprovalReceived { approved: false },
        "manager",
    );
    let outcome = handle.await.unwrap().unwrap();

    assert_eq!(
        outcome,
        CaseOutcome::Cancelled {
            reason: "rejected by manager".to_string()
        }
    );
    assert_eq!(rig.ledger.create_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn unreachable_ledger_queues_then_drains() {
    let rig = Rig::new();
    rig.storage.put_workbook("blob-1", clean_workbook());
    rig.ledger.fail_next_creates(10);

    let case_id = CaseId::new();
    let handle = rig.flow.spawn(intake(case_id, "blob-1"));

    let notifier = Arc::clone(&rig.notifier);
    eventually("ready for approval", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::ReadyForApproval)) == 1
    })
    .await;
    rig.flow.signal(case_id, approve(), "manager");

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, CaseOutcome::QueuedForZoho);
    assert_eq!(rig.ledger.create_attempts(), 5, "aggressive policy attempts");
    assert_eq!(rig.ledger.created_count(), 0);

    let case = rig.store.load(case_id).await.unwrap().unwrap();
    assert_eq!(case.status, CaseStatus::QueuedForZoho);

    // Ledger comes back; the queued creation drains to completion.
    rig.ledger.fail_next_creates(0);
    let outcome = rig.flow.drain_queued(case_id).await.unwrap();
    assert!(matches!(
        outcome,
        CaseOutcome::Completed {
            is_duplicate: false,
            ..
        }
    ));
    assert_eq!(rig.ledger.created_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_the_wait_without_restarting_the_ladder() {
    let rig = Rig::new();
    rig.storage.put_workbook("blob-1", clean_workbook());
    let case_id = CaseId::new();
    let handle = rig.flow.spawn(intake(case_id, "blob-1"));

    let notifier = Arc::clone(&rig.notifier);
    eventually("ready for approval", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::ReadyForApproval)) == 1
    })
    .await;

    // Crash the process mid-wait.
    handle.abort();
    let _ = handle.await;

    // A new process resumes from the persisted log and the approval
    // signal lands in the new process's mailbox.
    let restarted = rig.restarted();
    let resume_handle = {
        let flow = Arc::clone(&restarted);
        tokio::spawn(async move { flow.resume(case_id).await })
    };
    tokio::task::yield_now().await;
    restarted.signal(case_id, approve(), "manager");

    let outcome = resume_handle.await.unwrap().unwrap();
    assert!(matches!(outcome, CaseOutcome::Completed { .. }));

    // Resuming did not open a second wait of the same kind.
    let events = rig.store.events(case_id).await.unwrap();
    let approval_waits = events
        .iter()
        .filter(|e| matches!(e, CaseEvent::WaitStarted { kind: SignalKind::ApprovalReceived, .. }))
        .count();
    assert_eq!(approval_waits, 1);
}

#[tokio::test(start_paused = true)]
async fn ambiguous_customer_requires_a_selection() {
    let rig = Rig::new();
    rig.ledger.add_customer("CUST-2", "Acme Ltd (Export)");
    rig.storage.put_workbook("blob-1", clean_workbook());

    let case_id = CaseId::new();
    let handle = rig.flow.spawn(intake(case_id, "blob-1"));

    let notifier = Arc::clone(&rig.notifier);
    eventually("customer selection needed", || {
        notifier.count_matching(
            |n| matches!(n, CaseNotification::SelectionNeeded { subject, .. } if subject == "customer"),
        ) == 1
    })
    .await;

    let mut status = None;
    for _ in 0..10_000 {
        status = rig.store.load(case_id).await.unwrap().map(|c| c.status);
        if status == Some(CaseStatus::AwaitingCustomerSelection) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(status, Some(CaseStatus::AwaitingCustomerSelection));

    rig.flow.signal(
        case_id,
        SignalPayload::SelectionsSubmitted {
            selection: Selection {
                customer_external_id: Some("CUST-1".to_string()),
                line_items: BTreeMap::new(),
            },
        },
        "uploader",
    );

    let notifier = Arc::clone(&rig.notifier);
    eventually("ready for approval", || {
        notifier.count_matching(|n| matches!(n, CaseNotification::ReadyForApproval)) == 1
    })
    .await;
    rig.flow.signal(case_id, approve(), "manager");

    let outcome = handle.await.unwrap().unwrap();
    assert!(matches!(outcome, CaseOutcome::Completed { .. }));

    let case = rig.store.load(case_id).await.unwrap().unwrap();
    assert_eq!(
        case.order.unwrap().customer.external_id.as_deref(),
        Some("CUST-1")
    );
}
