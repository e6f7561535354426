use std::sync::Arc;

use async_trait::async_trait;
use creg_schemas::{category, MatchSignal, Submission};

use super::client_numbers;
use crate::{ClientSearch, Matcher, MatcherError};

pub const NOT_IN_GOOD_STANDING: &str = "client not in good standing";

/// Exact incorporation number hit. Hard identity signal.
pub struct IncorporationNumberMatcher {
    search: Arc<dyn ClientSearch>,
}

impl IncorporationNumberMatcher {
    pub fn new(search: Arc<dyn ClientSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Matcher for IncorporationNumberMatcher {
    fn name(&self) -> &'static str {
        "incorporation_number"
    }

    fn field_name(&self) -> &'static str {
        category::INCORPORATION_NUMBER
    }

    fn enabled(&self, s: &Submission) -> bool {
        s.business_information.incorporation_number().is_some()
    }

    async fn matches(&self, s: &Submission) -> Result<MatchSignal, MatcherError> {
        let Some(number) = s.business_information.incorporation_number() else {
            return Ok(MatchSignal::empty(self.field_name()));
        };
        let hits = self.search.by_incorporation_number(number).await?;
        Ok(MatchSignal::records(self.field_name(), client_numbers(hits)))
    }
}

/// Exact registration number hit. Hard identity signal.
pub struct RegistrationNumberMatcher {
    search: Arc<dyn ClientSearch>,
}

impl RegistrationNumberMatcher {
    pub fn new(search: Arc<dyn ClientSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Matcher for RegistrationNumberMatcher {
    fn name(&self) -> &'static str {
        "registration_number"
    }

    fn field_name(&self) -> &'static str {
        category::REGISTRATION_NUMBER
    }

    fn enabled(&self, s: &Submission) -> bool {
        s.business_information.registration_number().is_some()
    }

    async fn matches(&self, s: &Submission) -> Result<MatchSignal, MatcherError> {
        let Some(number) = s.business_information.registration_number() else {
            return Ok(MatchSignal::empty(self.field_name()));
        };
        let hits = self.search.by_registration_number(number).await?;
        Ok(MatchSignal::records(self.field_name(), client_numbers(hits)))
    }
}

/// Fuzzy legal-name search; individuals are covered by [`IndividualMatcher`](super::IndividualMatcher).
pub struct LegalNameMatcher {
    search: Arc<dyn ClientSearch>,
}

impl LegalNameMatcher {
    pub fn new(search: Arc<dyn ClientSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Matcher for LegalNameMatcher {
    fn name(&self) -> &'static str {
        "legal_name"
    }

    fn field_name(&self) -> &'static str {
        category::LEGAL_NAME
    }

    fn enabled(&self, s: &Submission) -> bool {
        !s.business_information.is_individual()
            && !s.business_information.legal_name.trim().is_empty()
    }

    async fn matches(&self, s: &Submission) -> Result<MatchSignal, MatcherError> {
        let name = s.business_information.legal_name.trim();
        let hits = self.search.by_legal_name_fuzzy(name).await?;
        Ok(MatchSignal::records(self.field_name(), client_numbers(hits)))
    }
}

pub struct DoingBusinessAsMatcher {
    search: Arc<dyn ClientSearch>,
}

impl DoingBusinessAsMatcher {
    pub fn new(search: Arc<dyn ClientSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Matcher for DoingBusinessAsMatcher {
    fn name(&self) -> &'static str {
        "doing_business_as"
    }

    fn field_name(&self) -> &'static str {
        category::DOING_BUSINESS_AS
    }

    fn enabled(&self, s: &Submission) -> bool {
        s.business_information.doing_business_as().is_some()
    }

    async fn matches(&self, s: &Submission) -> Result<MatchSignal, MatcherError> {
        let Some(dba) = s.business_information.doing_business_as() else {
            return Ok(MatchSignal::empty(self.field_name()));
        };
        let hits = self.search.by_doing_business_as(dba).await?;
        Ok(MatchSignal::records(self.field_name(), client_numbers(hits)))
    }
}

/// Local check on the declared good-standing flag. Never calls out.
pub struct GoodStandingMatcher;

#[async_trait]
impl Matcher for GoodStandingMatcher {
    fn name(&self) -> &'static str {
        "good_standing"
    }

    fn field_name(&self) -> &'static str {
        category::GOOD_STANDING
    }

    fn enabled(&self, s: &Submission) -> bool {
        s.business_information.good_standing.is_some()
    }

    async fn matches(&self, s: &Submission) -> Result<MatchSignal, MatcherError> {
        match s.business_information.good_standing {
            Some(false) => Ok(MatchSignal::advisory(self.field_name(), NOT_IN_GOOD_STANDING)),
            _ => Ok(MatchSignal::empty(self.field_name())),
        }
    }
}
