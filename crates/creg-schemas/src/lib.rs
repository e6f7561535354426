//! creg-schemas
//!
//! Wire and domain data types shared by every crate in the workspace:
//! submission drafts, persisted submissions, the outcome units produced by
//! validators and matchers, decisions, and lifecycle events.
//!
//! Plain data only. No IO, no async, no business rules.

mod events;
mod outcome;
mod submission;

pub use events::*;
pub use outcome::*;
pub use submission::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a submission when it is persisted.
pub type SubmissionId = Uuid;

/// Client-type code for individuals.
pub const CLIENT_TYPE_INDIVIDUAL: &str = "I";

/// Business-type code for entities registered with a corporate registry.
pub const BUSINESS_TYPE_REGISTERED: &str = "R";

/// Business-type code for unregistered entities (sole proprietors etc).
pub const BUSINESS_TYPE_UNREGISTERED: &str = "U";

/// Which intake channel a submission arrived through.
///
/// Closed set. Validators declare which sources they apply to; nothing in the
/// workspace branches on the source outside of those capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationSource {
    /// Entered by ministry staff on behalf of an applicant.
    Staff,
    /// Self-served by an external applicant.
    External,
}

impl ValidationSource {
    pub const ALL: [ValidationSource; 2] = [ValidationSource::Staff, ValidationSource::External];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationSource::Staff => "STAFF",
            ValidationSource::External => "EXTERNAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STAFF" => Some(ValidationSource::Staff),
            "EXTERNAL" => Some(ValidationSource::External),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValidationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_source_parse_is_case_insensitive() {
        assert_eq!(ValidationSource::parse("staff"), Some(ValidationSource::Staff));
        assert_eq!(
            ValidationSource::parse(" External "),
            Some(ValidationSource::External)
        );
        assert_eq!(ValidationSource::parse("batch"), None);
    }

    #[test]
    fn validation_source_serializes_screaming_case() {
        let s = serde_json::to_string(&ValidationSource::External).unwrap();
        assert_eq!(s, "\"EXTERNAL\"");
    }
}
