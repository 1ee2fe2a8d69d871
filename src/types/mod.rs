// Shared domain types used by the queue, the submitter and the reporter.
// None of those layers depends on another; all import from this module.

pub mod draft;
pub mod result;

pub use draft::*;
pub use result::*;
