//! Shipped rule set.
//!
//! Each rule is a small stateless struct implementing [`Validator`] for one
//! target type. [`standard_engine`] registers all of them in a fixed order.

mod address;
mod business;
mod contact;
mod location;

use std::sync::Arc;
use std::time::Duration;

pub use address::*;
pub use business::*;
pub use contact::*;
pub use location::*;

use creg_matching::ClientSearch;

use crate::{ReferenceData, ValidationEngine};

/// Engine with every shipped rule registered. Attach a rate limiter with
/// [`ValidationEngine::with_rate_limiter`].
///
/// Without `search` the existing-client identifier check is left out, which
/// is what offline validation wants.
pub fn standard_engine(
    reference: Arc<dyn ReferenceData>,
    search: Option<Arc<dyn ClientSearch>>,
    rule_timeout: Duration,
) -> ValidationEngine {
    let engine = ValidationEngine::new(rule_timeout)
        // business
        .with_business(Arc::new(LegalNameRequired))
        .with_business(Arc::new(ClientTypeExists::new(reference.clone())))
        .with_business(Arc::new(RegisteredIdentifierRequired))
        .with_business(Arc::new(IndividualName))
        .with_business(Arc::new(IndividualBirthdate::new()))
        .with_business(Arc::new(GoodStandingDeclared))
        .with_business(Arc::new(DistrictExists::new(reference.clone())))
        // addresses
        .with_address(Arc::new(CountryExists::new(reference.clone())))
        .with_address(Arc::new(ProvinceExists::new(reference)))
        .with_address(Arc::new(PostalCodeShape))
        .with_address(Arc::new(StreetAddressRequired))
        .with_address(Arc::new(CityRequired))
        .with_address(Arc::new(AddressEmailShape))
        // contacts
        .with_contact(Arc::new(ContactNameRequired))
        .with_contact(Arc::new(ContactEmailRequired))
        .with_contact(Arc::new(ContactEmailShape))
        .with_contact(Arc::new(ContactPhoneDigits))
        .with_contact(Arc::new(ContactTypeRequired))
        // location
        .with_location(Arc::new(UniqueAddressNames))
        .with_location(Arc::new(ContactLocationsExist))
        .with_location(Arc::new(MailingAddressFirst));

    match search {
        Some(search) => engine.with_business(Arc::new(IdentifierNotRegistered::new(search))),
        None => engine,
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

pub(crate) fn blank_opt(s: Option<&str>) -> bool {
    s.map(is_blank).unwrap_or(true)
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub(crate) fn is_email(s: &str) -> bool {
    let s = s.trim();
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = s.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}
