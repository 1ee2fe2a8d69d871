//! The ordered, editable collection of drafts awaiting submission.

use indexmap::IndexMap;
use indexmap::IndexSet;
use thiserror::Error;

use crate::types::{DraftId, IssueDraft, Outcome, QueuedDraft, SubmissionResult, normalize_set};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no draft with id {0}")]
    UnknownDraft(DraftId),
    #[error("draft {0} has been handed to a running batch")]
    Locked(DraftId),
    #[error("reorder must list every queued draft exactly once")]
    InvalidOrder,
    #[error("invalid draft list: {0}")]
    Json(#[from] serde_json::Error),
}

/// Partial edit applied by [`DraftQueue::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct DraftPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub labels: Option<Vec<String>>,
    pub assignees: Option<Vec<String>>,
    /// `Some(None)` clears the issue type.
    pub issue_type: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftState {
    #[default]
    Editable,
    Dispatched,
    /// The last batch failed on this draft; it is editable and retryable.
    Failed,
}

#[derive(Debug, Clone)]
struct Entry {
    draft: IssueDraft,
    state: DraftState,
}

/// Drafts in user order, keyed by ids that are never reused.
#[derive(Debug, Default)]
pub struct DraftQueue {
    entries: IndexMap<DraftId, Entry>,
    next_id: u64,
}

impl DraftQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: DraftId) -> Option<&IssueDraft> {
        self.entries.get(&id).map(|e| &e.draft)
    }

    pub fn state(&self, id: DraftId) -> Option<DraftState> {
        self.entries.get(&id).map(|e| e.state)
    }

    /// Append a draft and return its new id.
    pub fn add(&mut self, mut draft: IssueDraft) -> DraftId {
        draft.normalize();
        self.next_id += 1;
        let id = DraftId(self.next_id);
        self.entries.insert(
            id,
            Entry {
                draft,
                state: DraftState::Editable,
            },
        );
        id
    }

    pub fn update(&mut self, id: DraftId, patch: DraftPatch) -> Result<(), QueueError> {
        let entry = self.editable_mut(id)?;
        let draft = &mut entry.draft;
        if let Some(title) = patch.title {
            draft.title = title;
        }
        if let Some(body) = patch.body {
            draft.body = body;
        }
        if let Some(labels) = patch.labels {
            draft.labels = normalize_set(labels);
        }
        if let Some(assignees) = patch.assignees {
            draft.assignees = normalize_set(assignees);
        }
        if let Some(issue_type) = patch.issue_type {
            draft.issue_type = issue_type;
        }
        draft.normalize();
        Ok(())
    }

    pub fn remove(&mut self, id: DraftId) -> Result<IssueDraft, QueueError> {
        self.editable_mut(id)?;
        self.entries
            .shift_remove(&id)
            .map(|e| e.draft)
            .ok_or(QueueError::UnknownDraft(id))
    }

    /// Put the drafts in the given order. `ids` must be a permutation of the
    /// queued ids.
    pub fn reorder(&mut self, ids: &[DraftId]) -> Result<(), QueueError> {
        let wanted: IndexSet<DraftId> = ids.iter().copied().collect();
        if wanted.len() != ids.len() || wanted.len() != self.entries.len() {
            return Err(QueueError::InvalidOrder);
        }
        let mut reordered = IndexMap::with_capacity(self.entries.len());
        for id in wanted {
            let entry = self.entries.get(&id).ok_or(QueueError::InvalidOrder)?;
            reordered.insert(id, entry.clone());
        }
        self.entries = reordered;
        Ok(())
    }

    /// Read-only copy of every draft, in queue order.
    pub fn snapshot(&self) -> Vec<QueuedDraft> {
        self.entries
            .iter()
            .map(|(id, e)| QueuedDraft {
                id: *id,
                draft: e.draft.clone(),
            })
            .collect()
    }

    /// Copy of the drafts the last batch failed on.
    pub fn failed_snapshot(&self) -> Vec<QueuedDraft> {
        self.entries
            .iter()
            .filter(|(_, e)| e.state == DraftState::Failed)
            .map(|(id, e)| QueuedDraft {
                id: *id,
                draft: e.draft.clone(),
            })
            .collect()
    }

    /// Lock the drafts handed to a batch against edits and removal.
    pub fn begin_batch(&mut self, batch: &[QueuedDraft]) {
        for queued in batch {
            if let Some(entry) = self.entries.get_mut(&queued.id) {
                entry.state = DraftState::Dispatched;
            }
        }
    }

    /// Apply a finished batch: created drafts leave the queue, failed ones
    /// stay flagged for retry, skipped ones become editable again.
    pub fn finish_batch(&mut self, results: &[SubmissionResult]) {
        for result in results {
            match result.outcome {
                Outcome::Created { .. } => {
                    self.entries.shift_remove(&result.draft_id);
                }
                Outcome::Failed { .. } => {
                    if let Some(entry) = self.entries.get_mut(&result.draft_id) {
                        entry.state = DraftState::Failed;
                    }
                }
                Outcome::Skipped { .. } => {
                    if let Some(entry) = self.entries.get_mut(&result.draft_id) {
                        entry.state = DraftState::Editable;
                    }
                }
            }
        }
    }

    /// Append drafts from a JSON array of `{title, body, labels, assignees, type}`.
    pub fn import_json(&mut self, json: &str) -> Result<Vec<DraftId>, QueueError> {
        let drafts: Vec<IssueDraft> = serde_json::from_str(json)?;
        Ok(drafts.into_iter().map(|draft| self.add(draft)).collect())
    }

    /// Write the queued drafts in the format [`import_json`](Self::import_json) reads.
    pub fn export_json(&self) -> Result<String, QueueError> {
        let drafts: Vec<&IssueDraft> = self.entries.values().map(|e| &e.draft).collect();
        Ok(serde_json::to_string_pretty(&drafts)?)
    }

    fn editable_mut(&mut self, id: DraftId) -> Result<&mut Entry, QueueError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(QueueError::UnknownDraft(id))?;
        if entry.state == DraftState::Dispatched {
            return Err(QueueError::Locked(id));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{PermanentError, SubmitError};
    use crate::types::SkipReason;

    fn result(id: DraftId, outcome: Outcome) -> SubmissionResult {
        SubmissionResult {
            draft_id: id,
            outcome,
            attempts: 1,
            possible_duplicate: false,
        }
    }

    fn titles(queue: &DraftQueue) -> Vec<String> {
        queue.snapshot().into_iter().map(|q| q.draft.title).collect()
    }

    #[test]
    fn ids_are_unique_and_never_reused() {
        let mut queue = DraftQueue::new();
        let a = queue.add(IssueDraft::new("a", ""));
        queue.remove(a).unwrap();
        let b = queue.add(IssueDraft::new("b", ""));
        assert_ne!(a, b);
    }

    #[test]
    fn update_applies_patch_and_normalizes() {
        let mut queue = DraftQueue::new();
        let id = queue.add(IssueDraft::new("old", ""));
        queue
            .update(
                id,
                DraftPatch {
                    title: Some("new".into()),
                    labels: Some(vec!["bug".into(), " bug".into()]),
                    issue_type: Some(Some("Bug".into())),
                    ..DraftPatch::default()
                },
            )
            .unwrap();
        let draft = queue.get(id).unwrap();
        assert_eq!(draft.title, "new");
        assert_eq!(draft.labels.len(), 1);
        assert_eq!(draft.issue_type.as_deref(), Some("Bug"));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let mut queue = DraftQueue::new();
        assert!(matches!(
            queue.remove(DraftId(99)),
            Err(QueueError::UnknownDraft(DraftId(99)))
        ));
    }

    #[test]
    fn reorder_requires_exact_permutation() {
        let mut queue = DraftQueue::new();
        let a = queue.add(IssueDraft::new("a", ""));
        let b = queue.add(IssueDraft::new("b", ""));
        let c = queue.add(IssueDraft::new("c", ""));

        queue.reorder(&[c, a, b]).unwrap();
        assert_eq!(titles(&queue), vec!["c", "a", "b"]);

        assert!(matches!(queue.reorder(&[a, b]), Err(QueueError::InvalidOrder)));
        assert!(matches!(queue.reorder(&[a, a, b]), Err(QueueError::InvalidOrder)));
        assert!(matches!(
            queue.reorder(&[a, b, DraftId(42)]),
            Err(QueueError::InvalidOrder)
        ));
        assert_eq!(titles(&queue), vec!["c", "a", "b"]);
    }

    #[test]
    fn dispatched_drafts_are_locked_until_the_batch_finishes() {
        let mut queue = DraftQueue::new();
        let a = queue.add(IssueDraft::new("a", ""));
        let b = queue.add(IssueDraft::new("b", ""));
        let c = queue.add(IssueDraft::new("c", ""));
        let batch = queue.snapshot();
        queue.begin_batch(&batch[..2]);

        assert!(matches!(queue.remove(a), Err(QueueError::Locked(_))));
        assert!(matches!(
            queue.update(b, DraftPatch::default()),
            Err(QueueError::Locked(_))
        ));
        queue.update(c, DraftPatch::default()).unwrap();

        let failure: SubmitError = PermanentError::Conflict { message: "x".into() }.into();
        queue.finish_batch(&[
            result(a, Outcome::Created { number: 1, url: String::new() }),
            result(b, Outcome::Failed { error: failure }),
        ]);
        assert!(queue.get(a).is_none());
        assert_eq!(queue.state(b), Some(DraftState::Failed));
        queue.update(b, DraftPatch::default()).unwrap();

        let retry = queue.failed_snapshot();
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].id, b);
    }

    #[test]
    fn skipped_drafts_become_editable() {
        let mut queue = DraftQueue::new();
        let a = queue.add(IssueDraft::new("a", ""));
        let batch = queue.snapshot();
        queue.begin_batch(&batch);
        queue.finish_batch(&[result(
            a,
            Outcome::Skipped {
                reason: SkipReason::Cancelled,
            },
        )]);
        assert_eq!(queue.state(a), Some(DraftState::Editable));
        assert!(queue.failed_snapshot().is_empty());
    }

    #[test]
    fn json_import_export() {
        let mut queue = DraftQueue::new();
        let ids = queue
            .import_json(
                r#"[
                    {"title": "First", "body": "b", "labels": ["bug", "bug"], "assignees": []},
                    {"title": "Second", "type": "Task"}
                ]"#,
            )
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(queue.get(ids[0]).unwrap().labels.len(), 1);
        assert_eq!(queue.get(ids[1]).unwrap().issue_type.as_deref(), Some("Task"));

        let exported: serde_json::Value = serde_json::from_str(&queue.export_json().unwrap()).unwrap();
        assert_eq!(exported[0]["title"], "First");
        assert_eq!(exported[1]["type"], "Task");
        assert!(exported[0].get("type").is_none());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let mut queue = DraftQueue::new();
        assert!(matches!(queue.import_json("{\"title\": 1}"), Err(QueueError::Json(_))));
        assert!(queue.is_empty());
    }
}
