use creg_schemas::{RuleResult, SubmissionDraft};
use serde_json::Value;

/// Decode an intake payload. A missing or undecodable payload is a single
/// structural failure on field `submission`.
pub fn parse_draft(raw: &Value) -> Result<SubmissionDraft, RuleResult> {
    if raw.is_null() {
        return Err(RuleResult::new("submission", "submission is required"));
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| RuleResult::new("submission", format!("submission is malformed: {e}")))
}

/// Sequential presence gate. Returns the first missing section.
pub fn structural_check(draft: &SubmissionDraft) -> Result<(), RuleResult> {
    if draft.business_information.is_none() {
        return Err(RuleResult::new(
            "businessInformation",
            "business information is required",
        ));
    }
    let Some(location) = draft.location.as_ref() else {
        return Err(RuleResult::new("location", "location is required"));
    };
    if location.addresses.is_empty() {
        return Err(RuleResult::new(
            "location.addresses",
            "at least one address is required",
        ));
    }
    if location.contacts.is_empty() {
        return Err(RuleResult::new(
            "location.contacts",
            "at least one contact is required",
        ));
    }
    Ok(())
}
