//! Intake refuses bad drafts synchronously and stores nothing.
//!
//! GREEN when:
//! - a draft without contacts gets exactly one structural error and no
//!   search is issued;
//! - independently broken rules come back together in one call;
//! - staff intake of an incorporation number already held by a client is
//!   refused as a duplicate naming that client;
//! - nothing is persisted and no lifecycle event is published.

use creg_runtime::SubmitError;
use creg_schemas::ValidationSource;
use creg_testkit::{fixtures, FakeClientSearch, Harness, LaggingSyncClient};

#[tokio::test]
async fn missing_contacts_is_one_structural_error() {
    let mut h = Harness::new(FakeClientSearch::new(), LaggingSyncClient::consistent());
    let mut draft = fixtures::clean_draft("u-structural");
    if let Some(loc) = draft.location.as_mut() {
        loc.contacts.clear();
        // would also break a rule if rules ran
        loc.addresses[0].postal_code = "nope".into();
    }

    let err = h
        .pipeline
        .submit(draft, ValidationSource::External)
        .await
        .unwrap_err();

    match &err {
        SubmitError::Structural(r) => assert_eq!(r.field, "location.contacts"),
        other => panic!("expected structural error, got {other:?}"),
    }
    assert_eq!(err.rule_results().len(), 1);
    assert!(h.store.is_empty().await);
    assert_eq!(h.search.calls(), 0);
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn every_broken_rule_is_reported_at_once() {
    let mut h = Harness::new(FakeClientSearch::new(), LaggingSyncClient::consistent());
    let mut draft = fixtures::clean_draft("u-rules");
    if let Some(b) = draft.business_information.as_mut() {
        b.client_type = "ZZ".into();
    }
    if let Some(loc) = draft.location.as_mut() {
        loc.addresses[0].country_code = "XX".into();
        loc.contacts[0].phone_number = Some("555".into());
    }

    let err = h
        .pipeline
        .submit(draft, ValidationSource::Staff)
        .await
        .unwrap_err();

    let fields: Vec<&str> = err.rule_results().iter().map(|r| r.field.as_str()).collect();
    assert!(matches!(err, SubmitError::Invalid(_)));
    assert!(fields.contains(&"businessInformation.clientType"));
    assert!(fields.contains(&"location.addresses[0].countryCode"));
    assert!(fields.contains(&"location.contacts[0].phoneNumber"));
    assert!(!err.is_duplicate());
    assert!(h.store.is_empty().await);
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn staff_intake_refuses_registered_incorporation_number() {
    let mut h = Harness::new(
        FakeClientSearch::new().with_incorporation("BC123444789", "00000011"),
        LaggingSyncClient::consistent(),
    );

    let err = h
        .pipeline
        .submit(
            fixtures::registered_draft("u-staff-dup", "NORTHERN SPRUCE LTD", "BC123444789"),
            ValidationSource::Staff,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Invalid(_)), "{err:?}");
    assert!(err.is_duplicate());
    let dup = err
        .rule_results()
        .iter()
        .find(|r| r.is_duplicate())
        .cloned()
        .unwrap_or_else(|| panic!("no duplicate in {err:?}"));
    assert_eq!(dup.field, "businessInformation.incorporationNumber");
    assert_eq!(dup.existing_id.as_deref(), Some("00000011"));
    assert!(h.store.is_empty().await);
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn staff_intake_refuses_registered_registration_number() {
    let mut h = Harness::new(
        FakeClientSearch::new().with_registration("FM0123456", "00000042"),
        LaggingSyncClient::consistent(),
    );
    let mut draft = fixtures::registered_draft("u-staff-reg", "RIVERBEND FIRM", "BC000000001");
    if let Some(b) = draft.business_information.as_mut() {
        b.registration_number = Some("FM0123456".into());
    }

    let err = h
        .pipeline
        .submit(draft, ValidationSource::Staff)
        .await
        .unwrap_err();

    let dup: Vec<_> = err.rule_results().iter().filter(|r| r.is_duplicate()).collect();
    assert_eq!(dup.len(), 1);
    assert_eq!(dup[0].field, "businessInformation.registrationNumber");
    assert_eq!(dup[0].existing_id.as_deref(), Some("00000042"));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn identifier_search_outage_does_not_block_staff_intake() -> anyhow::Result<()> {
    let h = Harness::new(
        FakeClientSearch::new().failing("incorporation"),
        LaggingSyncClient::consistent(),
    );

    let id = h
        .pipeline
        .submit(
            fixtures::registered_draft("u-staff-outage", "NORTHERN SPRUCE LTD", "BC123444789"),
            ValidationSource::Staff,
        )
        .await?;
    assert!(h.get(id).await.is_ok());
    Ok(())
}
