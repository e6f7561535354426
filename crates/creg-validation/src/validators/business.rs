use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use creg_matching::{CandidateRecord, ClientSearch, SearchError};
use creg_schemas::{BusinessInformation, RuleResult, ValidationSource};

use super::is_blank;
use crate::{CollaboratorError, ReferenceData, Validator};

const MIN_INDIVIDUAL_AGE: u32 = 19;

type Outcome = Result<Option<RuleResult>, CollaboratorError>;

fn field(name: &str) -> String {
    format!("businessInformation.{name}")
}

pub struct LegalNameRequired;

#[async_trait]
impl Validator<BusinessInformation> for LegalNameRequired {
    fn name(&self) -> &'static str {
        "legal_name_required"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, b: &BusinessInformation, _index: usize) -> Outcome {
        if b.legal_name.trim().is_empty() {
            return Ok(Some(RuleResult::new(field("legalName"), "legal name is required")));
        }
        Ok(None)
    }
}

pub struct ClientTypeExists {
    reference: Arc<dyn ReferenceData>,
}

impl ClientTypeExists {
    pub fn new(reference: Arc<dyn ReferenceData>) -> Self {
        Self { reference }
    }
}

#[async_trait]
impl Validator<BusinessInformation> for ClientTypeExists {
    fn name(&self) -> &'static str {
        "client_type_exists"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, b: &BusinessInformation, _index: usize) -> Outcome {
        let code = b.client_type.trim();
        if code.is_empty() {
            return Ok(Some(RuleResult::new(field("clientType"), "client type is required")));
        }
        if !self.reference.client_type_exists(code).await? {
            return Ok(Some(RuleResult::new(
                field("clientType"),
                format!("client type '{code}' does not exist"),
            )));
        }
        Ok(None)
    }
}

/// Registered businesses must carry a corporate-registry identifier.
pub struct RegisteredIdentifierRequired;

#[async_trait]
impl Validator<BusinessInformation> for RegisteredIdentifierRequired {
    fn name(&self) -> &'static str {
        "registered_identifier_required"
    }

    fn supports(&self, source: ValidationSource) -> bool {
        source == ValidationSource::External
    }

    async fn validate(&self, b: &BusinessInformation, _index: usize) -> Outcome {
        if b.is_registered()
            && b.incorporation_number().is_none()
            && b.registration_number().is_none()
        {
            return Ok(Some(RuleResult::new(
                field("incorporationNumber"),
                "registered businesses require an incorporation or registration number",
            )));
        }
        Ok(None)
    }
}

pub struct IndividualName;

#[async_trait]
impl Validator<BusinessInformation> for IndividualName {
    fn name(&self) -> &'static str {
        "individual_name"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, b: &BusinessInformation, _index: usize) -> Outcome {
        if !b.is_individual() {
            return Ok(None);
        }
        let Some(ind) = &b.individual else {
            return Ok(Some(RuleResult::new(
                field("individual"),
                "individual details are required for client type I",
            )));
        };
        if is_blank(&ind.first_name) {
            return Ok(Some(RuleResult::new(
                field("individual.firstName"),
                "first name is required",
            )));
        }
        if is_blank(&ind.last_name) {
            return Ok(Some(RuleResult::new(
                field("individual.lastName"),
                "last name is required",
            )));
        }
        Ok(None)
    }
}

/// Birthdate present and the applicant at least 19 years old.
pub struct IndividualBirthdate {
    today: Option<NaiveDate>,
}

impl IndividualBirthdate {
    pub fn new() -> Self {
        Self { today: None }
    }

    /// Pin "today" instead of reading the clock.
    pub fn as_of(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }
}

impl Default for IndividualBirthdate {
    fn default() -> Self {
        Self::new()
    }
}

fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

#[async_trait]
impl Validator<BusinessInformation> for IndividualBirthdate {
    fn name(&self) -> &'static str {
        "individual_birthdate"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, b: &BusinessInformation, _index: usize) -> Outcome {
        if !b.is_individual() {
            return Ok(None);
        }
        // IndividualName reports a missing section.
        let Some(ind) = &b.individual else {
            return Ok(None);
        };
        let Some(birth) = ind.birthdate else {
            return Ok(Some(RuleResult::new(
                field("individual.birthdate"),
                "birthdate is required",
            )));
        };
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        if age_on(birth, today) < MIN_INDIVIDUAL_AGE as i32 {
            return Ok(Some(RuleResult::new(
                field("individual.birthdate"),
                format!("applicant must be at least {MIN_INDIVIDUAL_AGE} years old"),
            )));
        }
        Ok(None)
    }
}

pub struct GoodStandingDeclared;

#[async_trait]
impl Validator<BusinessInformation> for GoodStandingDeclared {
    fn name(&self) -> &'static str {
        "good_standing_declared"
    }

    fn supports(&self, source: ValidationSource) -> bool {
        source == ValidationSource::External
    }

    async fn validate(&self, b: &BusinessInformation, _index: usize) -> Outcome {
        if b.is_registered() && b.good_standing.is_none() {
            return Ok(Some(RuleResult::new(
                field("goodStanding"),
                "good standing must be declared for registered businesses",
            )));
        }
        Ok(None)
    }
}

/// District, when given, must be a known code.
pub struct DistrictExists {
    reference: Arc<dyn ReferenceData>,
}

impl DistrictExists {
    pub fn new(reference: Arc<dyn ReferenceData>) -> Self {
        Self { reference }
    }
}

#[async_trait]
impl Validator<BusinessInformation> for DistrictExists {
    fn name(&self) -> &'static str {
        "district_exists"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, b: &BusinessInformation, _index: usize) -> Outcome {
        let Some(district) = b.district.as_deref().map(str::trim).filter(|d| !d.is_empty())
        else {
            return Ok(None);
        };
        if !self.reference.district_exists(district).await? {
            return Ok(Some(RuleResult::new(
                field("district"),
                format!("district '{district}' does not exist"),
            )));
        }
        Ok(None)
    }
}

/// Staff intake refuses a corporate-registry identifier that already belongs
/// to a client, naming that client instead of waiting for matching.
pub struct IdentifierNotRegistered {
    search: Arc<dyn ClientSearch>,
}

impl IdentifierNotRegistered {
    pub fn new(search: Arc<dyn ClientSearch>) -> Self {
        Self { search }
    }
}

fn unavailable(e: SearchError) -> CollaboratorError {
    CollaboratorError::Unavailable(e.to_string())
}

fn already_registered(name: &str, number: &str, hit: &CandidateRecord) -> RuleResult {
    RuleResult::duplicate(
        field(name),
        format!(
            "{number} is already registered to client {} ({})",
            hit.client_number, hit.client_name
        ),
        hit.client_number.clone(),
    )
}

#[async_trait]
impl Validator<BusinessInformation> for IdentifierNotRegistered {
    fn name(&self) -> &'static str {
        "identifier_not_registered"
    }

    fn supports(&self, source: ValidationSource) -> bool {
        source == ValidationSource::Staff
    }

    async fn validate(&self, b: &BusinessInformation, _index: usize) -> Outcome {
        if let Some(number) = b.incorporation_number() {
            let hits = self.search.by_incorporation_number(number).await.map_err(unavailable)?;
            if let Some(hit) = hits.first() {
                return Ok(Some(already_registered("incorporationNumber", number, hit)));
            }
        }
        if let Some(number) = b.registration_number() {
            let hits = self.search.by_registration_number(number).await.map_err(unavailable)?;
            if let Some(hit) = hits.first() {
                return Ok(Some(already_registered("registrationNumber", number, hit)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creg_schemas::IndividualIdentity;

    fn individual(birth: Option<NaiveDate>) -> BusinessInformation {
        BusinessInformation {
            legal_name: "JANE DOE".into(),
            incorporation_number: None,
            registration_number: None,
            doing_business_as: None,
            business_type: "U".into(),
            legal_type: None,
            client_type: "I".into(),
            good_standing: None,
            district: None,
            individual: Some(IndividualIdentity {
                first_name: "Jane".into(),
                middle_name: None,
                last_name: "Doe".into(),
                birthdate: birth,
                identification: None,
            }),
        }
    }

    #[tokio::test]
    async fn nineteenth_birthday_is_old_enough() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let v = IndividualBirthdate::as_of(today);

        let exactly = individual(NaiveDate::from_ymd_opt(2005, 6, 15));
        assert!(v.validate(&exactly, 0).await.unwrap().is_none());

        let day_short = individual(NaiveDate::from_ymd_opt(2005, 6, 16));
        let r = v.validate(&day_short, 0).await.unwrap().unwrap();
        assert_eq!(r.field, "businessInformation.individual.birthdate");
    }

    #[tokio::test]
    async fn missing_birthdate_is_reported() {
        let v = IndividualBirthdate::new();
        let r = v.validate(&individual(None), 0).await.unwrap().unwrap();
        assert!(r.message.contains("required"));
    }

    #[tokio::test]
    async fn registered_without_identifiers_fails() {
        let mut b = individual(None);
        b.client_type = "C".into();
        b.business_type = "R".into();
        b.individual = None;
        let r = RegisteredIdentifierRequired.validate(&b, 0).await.unwrap();
        assert!(r.is_some());
        b.registration_number = Some("FM0123456".into());
        assert!(RegisteredIdentifierRequired.validate(&b, 0).await.unwrap().is_none());
    }
}
