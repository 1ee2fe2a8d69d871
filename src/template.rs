//! Issue templates: named skeletons that pre-fill a draft.

use std::str::FromStr;

use thiserror::Error;

use crate::types::{IssueDraft, TemplateKind, normalize_set};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown template \"{0}\"; available: bug, feature, documentation, none")]
    UnknownKind(String),
}

impl FromStr for TemplateKind {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bug" => Ok(Self::Bug),
            "feature" | "enhancement" => Ok(Self::Feature),
            "documentation" | "docs" => Ok(Self::Documentation),
            "none" | "" => Ok(Self::None),
            _ => Err(TemplateError::UnknownKind(s.to_owned())),
        }
    }
}

/// What the user typed before picking a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFields {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

struct Template {
    title_prefix: &'static str,
    body: &'static str,
    labels: &'static [&'static str],
    issue_type: Option<&'static str>,
}

const BUG_BODY: &str = "\
## Description
Describe the bug clearly and precisely.

## Steps to reproduce
1. 
2. 
3. 

## Expected behavior
Describe what should normally happen.

## Actual behavior
Describe what happens instead.

## Environment
- OS: [e.g. Windows 10]
- Browser: [e.g. Chrome 96]
- Version: [e.g. 1.0.0]

## Screenshots
If applicable, add screenshots to illustrate the problem.

## Error logs
```
Paste error logs here if available
```

## Additional context
Anything else that helps to understand and fix the bug.";

const FEATURE_BODY: &str = "\
## User story
As a [kind of user]
I want [action or feature]
So that [benefit or goal]

## Proposed technical solution
Describe in detail how the feature should be implemented.

## Additional context
Any other context or screenshots.";

const DOCUMENTATION_BODY: &str = "\
## Description
Describe what needs documenting or which changes to make.

## Affected sections
- Section 1
- Section 2

## Proposed changes
Detail the changes or additions to the documentation.

## Points to cover
- [ ] Point 1
- [ ] Point 2
- [ ] Point 3

## Useful resources
- Link 1
- Link 2

## Additional context
Any other relevant context.";

fn template(kind: TemplateKind) -> Template {
    match kind {
        TemplateKind::Bug => Template {
            title_prefix: "[Bug] ",
            body: BUG_BODY,
            labels: &["bug"],
            issue_type: Some("Bug"),
        },
        TemplateKind::Feature => Template {
            title_prefix: "[Feature] ",
            body: FEATURE_BODY,
            labels: &["enhancement"],
            issue_type: Some("Feature"),
        },
        TemplateKind::Documentation => Template {
            title_prefix: "[Documentation] ",
            body: DOCUMENTATION_BODY,
            labels: &["documentation"],
            issue_type: Some("Task"),
        },
        TemplateKind::None => Template {
            title_prefix: "",
            body: "",
            labels: &[],
            issue_type: None,
        },
    }
}

/// Expand a template by name.
pub fn resolve(kind: &str, fields: UserFields) -> Result<IssueDraft, TemplateError> {
    Ok(resolve_kind(kind.parse()?, fields))
}

/// Expand a template into a complete draft. Pure: same input, same draft.
pub fn resolve_kind(kind: TemplateKind, fields: UserFields) -> IssueDraft {
    let template = template(kind);

    // A title that is only the prefix stays empty so the submitter rejects it.
    let user_title = fields.title.trim();
    let prefix = template.title_prefix.trim_end();
    let subject = user_title.strip_prefix(prefix).unwrap_or(user_title).trim();
    let title = if subject.is_empty() {
        String::new()
    } else if user_title.starts_with(prefix) {
        user_title.to_owned()
    } else {
        format!("{}{user_title}", template.title_prefix)
    };

    let user_body = fields.body.trim();
    let body = match (template.body.is_empty(), user_body.is_empty()) {
        (true, _) => user_body.to_owned(),
        (false, true) => template.body.to_owned(),
        (false, false) => format!("{}\n\n{user_body}", template.body),
    };

    let labels = template
        .labels
        .iter()
        .map(|l| (*l).to_owned())
        .chain(fields.labels);

    IssueDraft {
        title,
        body,
        labels: normalize_set(labels),
        assignees: normalize_set(fields.assignees),
        template: kind,
        issue_type: template.issue_type.map(str::to_owned),
    }
}
