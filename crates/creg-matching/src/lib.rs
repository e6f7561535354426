//! creg-matching
//!
//! Duplicate detection against the system of record.
//!
//! Each [`Matcher`] decides whether it applies to a submission and, if so,
//! searches through a [`ClientSearch`] collaborator. The [`MatchingEngine`]
//! runs every enabled matcher concurrently, each under its own timeout, and
//! folds the outcomes into a [`MatchReport`]. Matchers that fail are recorded
//! in the report instead of being read as "no duplicates".

mod engine;
mod search;
pub mod matchers;

pub use creg_schemas::{category, MatchReport, MatchSignal, MatchValue, MatcherFailure};
pub use engine::{Matcher, MatcherError, MatchingEngine};
pub use search::{
    AddressQuery, CandidateRecord, ClientSearch, ContactQuery, IndividualQuery, SearchError,
};
