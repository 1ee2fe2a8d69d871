//! Batch summaries: the one place where per-draft failures are disclosed.

use std::fmt;

use serde::Serialize;

use crate::types::{DraftId, Outcome, SubmissionResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub created_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub possible_duplicate_count: usize,
    pub details: Vec<SubmissionResult>,
}

/// Aggregate per-draft results, keeping their order.
pub fn summarize(results: &[SubmissionResult]) -> BatchSummary {
    let mut summary = BatchSummary {
        created_count: 0,
        failed_count: 0,
        skipped_count: 0,
        possible_duplicate_count: 0,
        details: results.to_vec(),
    };
    for result in results {
        match result.outcome {
            Outcome::Created { .. } => summary.created_count += 1,
            Outcome::Failed { .. } => summary.failed_count += 1,
            Outcome::Skipped { .. } => summary.skipped_count += 1,
        }
        if result.possible_duplicate {
            summary.possible_duplicate_count += 1;
        }
    }
    summary
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.details.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.created_count == self.total()
    }

    /// Drafts worth another batch.
    pub fn failed_ids(&self) -> Vec<DraftId> {
        self.details
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.draft_id)
            .collect()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} created, {} failed, {} skipped",
            self.created_count, self.failed_count, self.skipped_count
        )?;
        for result in &self.details {
            match &result.outcome {
                Outcome::Created { number, url } => {
                    write!(f, "  {} created #{number} {url}", result.draft_id)?;
                }
                Outcome::Failed { error } => {
                    let kind = if error.is_transient() {
                        "transient"
                    } else {
                        "permanent"
                    };
                    write!(
                        f,
                        "  {} failed after {} attempt(s), {kind}: {error}",
                        result.draft_id, result.attempts
                    )?;
                }
                Outcome::Skipped { reason } => {
                    write!(f, "  {} skipped: {reason}", result.draft_id)?;
                }
            }
            if result.possible_duplicate {
                f.write_str(" [warning: an attempt got no answer, the issue may exist or be duplicated]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
