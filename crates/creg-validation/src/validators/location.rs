use std::collections::BTreeSet;

use async_trait::async_trait;
use creg_schemas::{LocationData, RuleResult, ValidationSource};

use crate::{CollaboratorError, Validator};

type Outcome = Result<Option<RuleResult>, CollaboratorError>;

pub const MAILING_ADDRESS_NAME: &str = "Mailing address";

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub struct UniqueAddressNames;

#[async_trait]
impl Validator<LocationData> for UniqueAddressNames {
    fn name(&self) -> &'static str {
        "unique_address_names"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, loc: &LocationData, _index: usize) -> Outcome {
        let mut seen = BTreeSet::new();
        for (i, a) in loc.addresses.iter().enumerate() {
            let k = key(&a.name);
            if k.is_empty() {
                return Ok(Some(RuleResult::new(
                    format!("location.addresses[{i}].name"),
                    "address name is required",
                )));
            }
            if !seen.insert(k) {
                return Ok(Some(RuleResult::new(
                    format!("location.addresses[{i}].name"),
                    format!("address name '{}' is used more than once", a.name.trim()),
                )));
            }
        }
        Ok(None)
    }
}

/// Every name in a contact's `locationNames` must name a submitted address.
pub struct ContactLocationsExist;

#[async_trait]
impl Validator<LocationData> for ContactLocationsExist {
    fn name(&self) -> &'static str {
        "contact_locations_exist"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, loc: &LocationData, _index: usize) -> Outcome {
        let names: BTreeSet<String> = loc.addresses.iter().map(|a| key(&a.name)).collect();
        for (i, c) in loc.contacts.iter().enumerate() {
            if let Some(missing) = c.location_names.iter().find(|n| !names.contains(&key(n))) {
                return Ok(Some(RuleResult::new(
                    format!("location.contacts[{i}].locationNames"),
                    format!("contact refers to unknown address '{}'", missing.trim()),
                )));
            }
        }
        Ok(None)
    }
}

pub struct MailingAddressFirst;

#[async_trait]
impl Validator<LocationData> for MailingAddressFirst {
    fn name(&self) -> &'static str {
        "mailing_address_first"
    }

    fn supports(&self, source: ValidationSource) -> bool {
        source == ValidationSource::External
    }

    async fn validate(&self, loc: &LocationData, _index: usize) -> Outcome {
        match loc.addresses.first() {
            Some(a) if key(&a.name) == key(MAILING_ADDRESS_NAME) => Ok(None),
            _ => Ok(Some(RuleResult::new(
                "location.addresses[0].name",
                format!("first address must be named '{MAILING_ADDRESS_NAME}'"),
            ))),
        }
    }
}
