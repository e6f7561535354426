//! Shipped rule set end to end through the engine.
//!
//! GREEN when:
//! - a clean external draft passes unchanged;
//! - several independently broken rules are all reported in one call, in
//!   section/index order;
//! - staff-only relaxations apply to staff submissions.

use std::sync::Arc;
use std::time::Duration;

use creg_schemas::SubmissionDraft;
use creg_validation::validators::standard_engine;
use creg_validation::{StaticReferenceData, ValidationSource};

fn clean_draft() -> SubmissionDraft {
    serde_json::from_value(serde_json::json!({
        "submitter": { "provider": "bceidbusiness", "userId": "jdoe" },
        "businessInformation": {
            "legalName": "STAR DUST ORCHARDS LTD",
            "incorporationNumber": "BC0765432",
            "businessType": "R",
            "clientType": "C",
            "goodStanding": true
        },
        "location": {
            "addresses": [{
                "index": 0,
                "name": "Mailing address",
                "streetAddress": "2975 Jutland Rd",
                "city": "Victoria",
                "provinceCode": "BC",
                "countryCode": "CA",
                "postalCode": "V8T 5J9"
            }],
            "contacts": [{
                "index": 0,
                "contactType": "BL",
                "firstName": "Jane",
                "lastName": "Doe",
                "phoneNumber": "2505550101",
                "emailAddress": "jane@stardust.ca",
                "locationNames": ["Mailing address"]
            }]
        }
    }))
    .unwrap()
}

fn engine() -> creg_validation::ValidationEngine {
    standard_engine(
        Arc::new(StaticReferenceData::with_defaults()),
        None,
        Duration::from_secs(2),
    )
}

#[tokio::test]
async fn clean_draft_passes_unchanged() {
    let draft = clean_draft();
    let out = engine()
        .validate(draft.clone(), ValidationSource::External)
        .await
        .unwrap();
    assert_eq!(out, draft);
}

#[tokio::test]
async fn every_broken_rule_is_reported_in_order() {
    let mut draft = clean_draft();
    if let Some(b) = draft.business_information.as_mut() {
        b.legal_name = "  ".into();
    }
    if let Some(loc) = draft.location.as_mut() {
        loc.addresses[0].postal_code = "123".into();
        loc.contacts[0].email_address = Some("jane-at-stardust".into());
        loc.contacts[0].location_names = vec!["Warehouse".into()];
    }

    let errs = engine()
        .validate(draft, ValidationSource::External)
        .await
        .unwrap_err();
    let fields: Vec<&str> = errs.results().iter().map(|e| e.field.as_str()).collect();
    assert_eq!(
        fields,
        vec![
            "businessInformation.legalName",
            "location.addresses[0].postalCode",
            "location.contacts[0].emailAddress",
            "location.contacts[0].locationNames",
        ]
    );
}

#[tokio::test]
async fn staff_may_omit_contact_email_and_mailing_name() {
    let mut draft = clean_draft();
    if let Some(loc) = draft.location.as_mut() {
        loc.addresses[0].name = "Head office".into();
        loc.contacts[0].email_address = None;
        loc.contacts[0].location_names = vec!["Head office".into()];
    }

    assert!(engine()
        .validate(draft.clone(), ValidationSource::Staff)
        .await
        .is_ok());

    let errs = engine()
        .validate(draft, ValidationSource::External)
        .await
        .unwrap_err();
    assert_eq!(errs.results().len(), 2, "{errs:?}");
}
