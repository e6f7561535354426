//! Draft builders. Every builder returns a draft that passes the standard
//! rules for both sources unless a test breaks it on purpose.

use creg_schemas::{SubmissionDraft, SubmitterIdentity};
use serde_json::json;

fn from_json(v: serde_json::Value) -> SubmissionDraft {
    match serde_json::from_value(v) {
        Ok(d) => d,
        Err(e) => panic!("fixture draft does not decode: {e}"),
    }
}

/// Unregistered business, no identifiers, declared in good standing.
pub fn clean_draft(submitter: &str) -> SubmissionDraft {
    from_json(json!({
        "submitter": { "provider": "bceidbusiness", "userId": submitter },
        "businessInformation": {
            "legalName": "QUIET MEADOW FARMS",
            "businessType": "U",
            "clientType": "C",
            "goodStanding": true
        },
        "location": {
            "addresses": [{
                "index": 0,
                "name": "Mailing address",
                "streetAddress": "4000 Seymour Pl",
                "city": "Victoria",
                "provinceCode": "BC",
                "countryCode": "CA",
                "postalCode": "V8X 4S8"
            }],
            "contacts": [{
                "index": 0,
                "contactType": "BL",
                "firstName": "Mara",
                "lastName": "Quill",
                "phoneNumber": "2505550142",
                "emailAddress": "mara@quietmeadow.ca",
                "locationNames": ["Mailing address"]
            }]
        }
    }))
}

/// Registered business carrying `incorporation_number`.
pub fn registered_draft(submitter: &str, legal_name: &str, incorporation_number: &str) -> SubmissionDraft {
    let mut d = clean_draft(submitter);
    if let Some(b) = d.business_information.as_mut() {
        b.legal_name = legal_name.to_string();
        b.business_type = creg_schemas::BUSINESS_TYPE_REGISTERED.to_string();
        b.incorporation_number = Some(incorporation_number.to_string());
    }
    d
}

/// Clean draft under another legal name.
pub fn named_draft(submitter: &str, legal_name: &str) -> SubmissionDraft {
    let mut d = clean_draft(submitter);
    if let Some(b) = d.business_information.as_mut() {
        b.legal_name = legal_name.to_string();
    }
    d
}

/// Same draft submitted through another identity provider.
pub fn with_submitter(mut d: SubmissionDraft, provider: &str, user_id: &str) -> SubmissionDraft {
    d.submitter = SubmitterIdentity::new(provider, user_id);
    d
}
