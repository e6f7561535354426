use std::sync::Arc;

use async_trait::async_trait;
use creg_schemas::{category, Address, MatchSignal, Submission};
use futures_util::future::join_all;

use super::client_numbers;
use crate::{AddressQuery, ClientSearch, Matcher, MatcherError};

/// One search per submitted address; hits are unioned.
pub struct LocationMatcher {
    search: Arc<dyn ClientSearch>,
}

impl LocationMatcher {
    pub fn new(search: Arc<dyn ClientSearch>) -> Self {
        Self { search }
    }
}

fn query(a: &Address) -> AddressQuery {
    AddressQuery {
        street_address: a.street_address.trim().to_string(),
        city: a.city.trim().to_string(),
        province_code: a.province_code.clone(),
        country_code: a.country_code.trim().to_ascii_uppercase(),
        postal_code: a.postal_code.replace(' ', "").to_ascii_uppercase(),
    }
}

#[async_trait]
impl Matcher for LocationMatcher {
    fn name(&self) -> &'static str {
        "location"
    }

    fn field_name(&self) -> &'static str {
        category::LOCATION
    }

    fn enabled(&self, s: &Submission) -> bool {
        !s.location.addresses.is_empty()
    }

    async fn matches(&self, s: &Submission) -> Result<MatchSignal, MatcherError> {
        let queries: Vec<AddressQuery> = s.location.addresses.iter().map(query).collect();
        let results = join_all(queries.iter().map(|q| self.search.by_location(q))).await;
        let mut ids = Vec::new();
        for r in results {
            ids.extend(client_numbers(r?));
        }
        Ok(MatchSignal::records(self.field_name(), ids))
    }
}
