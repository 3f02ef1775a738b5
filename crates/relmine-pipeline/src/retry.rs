//! Bounded retry policy for forced checkouts.

use serde::{Deserialize, Serialize};

/// Cleanup performed before a retried checkout attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CleanupAction {
    /// Remove untracked and ignored files again.
    SweepUntracked,
    /// Delete every source file outside `.git`, so a checkout that only
    /// differs in file-name case can recreate them.
    DeleteUntrackedSources,
}

/// Attempt count plus the cleanup escalation between attempts.
///
/// `escalation[i]` runs before attempt `i + 2`; attempts beyond the end of
/// the list reuse its last entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutRetryPolicy {
    pub max_attempts: u32,
    pub escalation: Vec<CleanupAction>,
}

impl Default for CheckoutRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            escalation: vec![CleanupAction::DeleteUntrackedSources],
        }
    }
}

impl CheckoutRetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Cleanup to run before `attempt` (1-based). The first attempt has none.
    pub fn cleanup_before(&self, attempt: u32) -> Option<CleanupAction> {
        if attempt <= 1 || attempt > self.max_attempts {
            return None;
        }
        let idx = (attempt - 2) as usize;
        self.escalation
            .get(idx)
            .or_else(|| self.escalation.last())
            .copied()
    }
}
