//! Orchestrator configuration.
//!
//! Deployment-tunable business rules live here as named fields, not
//! scattered literals: the retry policies, the human-wait ladder, and the
//! committee/inference thresholds.

use std::time::Duration;

use ois_committee::CommitteeConfig;
use ois_infer::InferConfig;

use crate::retry::RetryPolicy;

/// The escalation ladder applied to every human wait.
///
/// Durations are deltas between rungs: a silent case sees a reminder, then
/// an escalation, then a final timeout warning, and is auto-cancelled when
/// the last rung elapses.
#[derive(Debug, Clone, Copy)]
pub struct WaitLadder {
    pub reminder_after: Duration,
    pub escalate_after: Duration,
    pub warn_after: Duration,
    pub cancel_after: Duration,
}

impl Default for WaitLadder {
    fn default() -> Self {
        const DAY: Duration = Duration::from_secs(24 * 60 * 60);
        Self {
            reminder_after: DAY,
            escalate_after: DAY,
            warn_after: 5 * DAY,
            cancel_after: DAY,
        }
    }
}

impl WaitLadder {
    /// Cumulative deadlines from wait entry: reminder, escalation,
    /// warning, cancellation.
    #[must_use]
    pub fn deadlines(&self) -> [Duration; 4] {
        let reminder = self.reminder_after;
        let escalate = reminder + self.escalate_after;
        let warn = escalate + self.warn_after;
        let cancel = warn + self.cancel_after;
        [reminder, escalate, warn, cancel]
    }

    /// Total silence tolerated before auto-cancellation.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.deadlines()[3]
    }
}

/// Full orchestrator configuration.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub infer: InferConfig,
    pub committee: CommitteeConfig,
    /// Policy for local and deterministic external steps.
    pub retry_standard: RetryPolicy,
    /// Policy for the external order-creation call.
    pub retry_aggressive: RetryPolicy,
    pub wait_ladder: WaitLadder,
    /// Whether a high-confidence, clean extraction may skip the forced
    /// corrections checkpoint. Medium and low confidence always review.
    pub allow_fast_path: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            infer: InferConfig::default(),
            committee: CommitteeConfig::default(),
            retry_standard: RetryPolicy::standard(),
            retry_aggressive: RetryPolicy::aggressive(),
            wait_ladder: WaitLadder::default(),
            allow_fast_path: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_deadlines_accumulate_to_seven_days() {
        let ladder = WaitLadder::default();
        let [reminder, escalate, warn, cancel] = ladder.deadlines();
        let day = Duration::from_secs(24 * 60 * 60);
        assert_eq!(reminder, day);
        assert_eq!(escalate, 2 * day);
        assert_eq!(warn, 6 * day);
        assert_eq!(cancel, 7 * day);
        assert_eq!(ladder.total(), 7 * day);
    }
}
