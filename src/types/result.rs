use std::fmt;

use serde::Serialize;

use super::draft::DraftId;
use crate::github::error::SubmitError;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("batch cancelled"),
            Self::DeadlineExceeded => f.write_str("batch deadline exceeded"),
        }
    }
}

/// Terminal state of one draft within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Created { number: u64, url: String },
    Failed { error: SubmitError },
    Skipped { reason: SkipReason },
}

/// Payload-free discriminant of [`Outcome`], used for progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Created,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Created { .. } => OutcomeKind::Created,
            Self::Failed { .. } => OutcomeKind::Failed,
            Self::Skipped { .. } => OutcomeKind::Skipped,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-draft results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub draft_id: DraftId,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Create requests actually sent for this draft.
    pub attempts: u32,
    /// An attempt ended without a known server-side result and the draft was
    /// sent again or created afterwards, so the repository may hold a copy.
    pub possible_duplicate: bool,
}

impl SubmissionResult {
    pub fn remote_issue_number(&self) -> Option<u64> {
        match self.outcome {
            Outcome::Created { number, .. } => Some(number),
            _ => None,
        }
    }

    pub fn error_detail(&self) -> Option<&SubmitError> {
        match &self.outcome {
            Outcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self.outcome, Outcome::Created { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::Skipped { .. })
    }
}

/// Emitted once per draft when it reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub draft_id: DraftId,
    pub outcome: OutcomeKind,
}
