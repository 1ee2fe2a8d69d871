use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Draft identifiers
// ---------------------------------------------------------------------------

/// Session-local identifier assigned by the draft queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DraftId(pub u64);

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#d{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Bug,
    Feature,
    Documentation,
    #[default]
    None,
}

// ---------------------------------------------------------------------------
// Issue drafts
// ---------------------------------------------------------------------------

/// A user-authored issue that has not been submitted yet.
///
/// Labels and assignees are ordered sets: entries are trimmed, empty entries
/// are dropped and duplicates collapse onto the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueDraft {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: IndexSet<String>,
    #[serde(default)]
    pub assignees: IndexSet<String>,
    #[serde(default, skip_serializing)]
    pub template: TemplateKind,
    /// GitHub issue type (`Bug`, `Feature`, `Task`), sent only when set.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
}

impl IssueDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels = normalize_set(labels);
        self
    }

    pub fn with_assignees<I, S>(mut self, assignees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.assignees = normalize_set(assignees);
        self
    }

    /// Whether the draft may enter the submission phase.
    pub fn is_submittable(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Re-apply the set invariants after deserialization or direct field edits.
    pub fn normalize(&mut self) {
        self.labels = normalize_set(self.labels.iter());
        self.assignees = normalize_set(self.assignees.iter());
        if self.issue_type.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.issue_type = None;
        }
    }
}

/// Trim entries, drop blanks and collapse duplicates, keeping first-seen order.
pub fn normalize_set<I, S>(items: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split a comma-separated list as typed into a form field.
pub fn split_list(text: &str) -> IndexSet<String> {
    normalize_set(text.split(','))
}

/// A draft owned by the queue, together with the identifier it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedDraft {
    pub id: DraftId,
    pub draft: IssueDraft,
}
