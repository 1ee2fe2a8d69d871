// Pedantic: suppress noise for internal crate code.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

//! Batch GitHub issue submission.
//!
//! Drafts are authored through [`template`] and collected in a
//! [`queue::DraftQueue`]; a [`validator::CredentialValidator`] checks the
//! token against the target repository; a [`submit::Submitter`] drives a
//! snapshot of the queue to completion against the REST API; and
//! [`report::summarize`] turns the per-draft results into a summary.

pub mod config;
pub mod github;
pub mod logging;
pub mod queue;
pub mod report;
pub mod submit;
pub mod template;
pub mod types;
pub mod validator;
