use std::sync::Arc;

use async_trait::async_trait;
use creg_schemas::{category, MatchSignal, Submission};
use futures_util::future::join_all;

use super::client_numbers;
use crate::{ClientSearch, ContactQuery, IndividualQuery, Matcher, MatcherError};

/// Individual identity: name, birthdate and identification document.
pub struct IndividualMatcher {
    search: Arc<dyn ClientSearch>,
}

impl IndividualMatcher {
    pub fn new(search: Arc<dyn ClientSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Matcher for IndividualMatcher {
    fn name(&self) -> &'static str {
        "individual"
    }

    fn field_name(&self) -> &'static str {
        category::INDIVIDUAL
    }

    fn enabled(&self, s: &Submission) -> bool {
        s.business_information.is_individual() && s.business_information.individual.is_some()
    }

    async fn matches(&self, s: &Submission) -> Result<MatchSignal, MatcherError> {
        let Some(ind) = &s.business_information.individual else {
            return Ok(MatchSignal::empty(self.field_name()));
        };
        let query = IndividualQuery {
            first_name: ind.first_name.trim().to_string(),
            last_name: ind.last_name.trim().to_string(),
            birthdate: ind.birthdate,
            id_type: ind.identification.as_ref().map(|i| i.id_type.clone()),
            id_number: ind.identification.as_ref().map(|i| i.number.clone()),
        };
        let hits = self.search.by_individual(&query).await?;
        Ok(MatchSignal::records(self.field_name(), client_numbers(hits)))
    }
}

/// One search per contact that has an email; hits are unioned.
pub struct ContactMatcher {
    search: Arc<dyn ClientSearch>,
}

impl ContactMatcher {
    pub fn new(search: Arc<dyn ClientSearch>) -> Self {
        Self { search }
    }
}

fn contact_queries(s: &Submission) -> Vec<ContactQuery> {
    s.location
        .contacts
        .iter()
        .filter_map(|c| {
            let email = c.email_address.as_deref()?.trim();
            if email.is_empty() {
                return None;
            }
            Some(ContactQuery {
                first_name: c.first_name.trim().to_string(),
                last_name: c.last_name.trim().to_string(),
                email: email.to_string(),
                phone: c.phone_number.clone(),
            })
        })
        .collect()
}

#[async_trait]
impl Matcher for ContactMatcher {
    fn name(&self) -> &'static str {
        "contact"
    }

    fn field_name(&self) -> &'static str {
        category::CONTACT
    }

    fn enabled(&self, s: &Submission) -> bool {
        !contact_queries(s).is_empty()
    }

    async fn matches(&self, s: &Submission) -> Result<MatchSignal, MatcherError> {
        let queries = contact_queries(s);
        let results = join_all(queries.iter().map(|q| self.search.by_contact(q))).await;
        let mut ids = Vec::new();
        for r in results {
            ids.extend(client_numbers(r?));
        }
        Ok(MatchSignal::records(self.field_name(), ids))
    }
}
