//! Shipped matchers.
//!
//! [`standard_matchers`] returns them in registration order: hard identifiers
//! first, then names, individual, contact, location and good standing.

mod business;
mod location;
mod person;

use std::sync::Arc;

pub use business::*;
pub use location::*;
pub use person::*;

use crate::{CandidateRecord, ClientSearch, Matcher};

pub fn standard_matchers(search: Arc<dyn ClientSearch>) -> Vec<Arc<dyn Matcher>> {
    vec![
        Arc::new(IncorporationNumberMatcher::new(search.clone())),
        Arc::new(RegistrationNumberMatcher::new(search.clone())),
        Arc::new(LegalNameMatcher::new(search.clone())),
        Arc::new(DoingBusinessAsMatcher::new(search.clone())),
        Arc::new(IndividualMatcher::new(search.clone())),
        Arc::new(ContactMatcher::new(search.clone())),
        Arc::new(LocationMatcher::new(search)),
        Arc::new(GoodStandingMatcher),
    ]
}

fn client_numbers(records: Vec<CandidateRecord>) -> impl Iterator<Item = String> {
    records.into_iter().map(|r| r.client_number)
}
