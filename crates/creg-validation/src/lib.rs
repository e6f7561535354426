//! creg-validation
//!
//! Source-aware validation of intake drafts.
//!
//! A draft passes a sequential structural gate (sections present, at least
//! one address and contact, submitter under the rate limit) and then every
//! applicable business rule runs concurrently. All rule failures are
//! returned together; a draft with no failures is handed back unchanged.
//!
//! Validators are strategies behind [`Validator`]; the engine receives them
//! at construction and filters them by [`ValidationSource`].

mod engine;
mod error;
mod rate_limit;
mod reference;
mod structural;
pub mod validators;

pub use creg_schemas::{RuleResult, ValidationSource};
pub use engine::{Rejection, ValidationEngine, Validator};
pub use error::CollaboratorError;
pub use rate_limit::{format_wait, RateLimiter, SubmissionHistory};
pub use reference::{ReferenceData, StaticReferenceData};
pub use structural::{parse_draft, structural_check};
