//! Per-release pipeline stages.

use serde::{Deserialize, Serialize};

/// Position of one release in the pipeline.
///
/// ```text
/// Pending -> CheckedOut -> Built | BuildSkippedOrFailed -> Analyzed -> Recorded
/// Pending -> CheckoutFailed
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStage {
    #[default]
    Pending,
    CheckedOut,
    Built,
    BuildSkippedOrFailed,
    Analyzed,
    Recorded,
    CheckoutFailed,
}

/// Rejected stage transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal release stage transition {from:?} -> {to:?}")]
pub struct StageTransitionError {
    pub from: ReleaseStage,
    pub to: ReleaseStage,
}

impl ReleaseStage {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            ReleaseStage::Pending => "pending",
            ReleaseStage::CheckedOut => "checked_out",
            ReleaseStage::Built => "built",
            ReleaseStage::BuildSkippedOrFailed => "build_skipped_or_failed",
            ReleaseStage::Analyzed => "analyzed",
            ReleaseStage::Recorded => "recorded",
            ReleaseStage::CheckoutFailed => "checkout_failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReleaseStage::Recorded | ReleaseStage::CheckoutFailed)
    }

    /// Whether `next` is a legal successor of this stage.
    pub fn can_advance_to(&self, next: ReleaseStage) -> bool {
        use ReleaseStage::*;
        matches!(
            (self, next),
            (Pending, CheckedOut)
                | (Pending, CheckoutFailed)
                | (CheckedOut, Built)
                | (CheckedOut, BuildSkippedOrFailed)
                | (Built, Analyzed)
                | (BuildSkippedOrFailed, Analyzed)
                | (Analyzed, Recorded)
        )
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn advance(&mut self, next: ReleaseStage) -> Result<(), StageTransitionError> {
        if !self.can_advance_to(next) {
            return Err(StageTransitionError {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
