use async_trait::async_trait;
use creg_schemas::{Contact, RuleResult, ValidationSource};

use super::{blank_opt, is_blank, is_email};
use crate::{CollaboratorError, Validator};

type Outcome = Result<Option<RuleResult>, CollaboratorError>;

const PHONE_DIGITS: usize = 10;

fn field(index: usize, name: &str) -> String {
    format!("location.contacts[{index}].{name}")
}

pub struct ContactNameRequired;

#[async_trait]
impl Validator<Contact> for ContactNameRequired {
    fn name(&self) -> &'static str {
        "contact_name_required"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, c: &Contact, index: usize) -> Outcome {
        if is_blank(&c.first_name) {
            return Ok(Some(RuleResult::new(
                field(index, "firstName"),
                "first name is required",
            )));
        }
        if is_blank(&c.last_name) {
            return Ok(Some(RuleResult::new(
                field(index, "lastName"),
                "last name is required",
            )));
        }
        Ok(None)
    }
}

/// External submitters must give every contact a valid email.
pub struct ContactEmailRequired;

#[async_trait]
impl Validator<Contact> for ContactEmailRequired {
    fn name(&self) -> &'static str {
        "contact_email_required"
    }

    fn supports(&self, source: ValidationSource) -> bool {
        source == ValidationSource::External
    }

    async fn validate(&self, c: &Contact, index: usize) -> Outcome {
        match c.email_address.as_deref() {
            e if blank_opt(e) => Ok(Some(RuleResult::new(
                field(index, "emailAddress"),
                "email address is required",
            ))),
            Some(e) if !is_email(e) => Ok(Some(RuleResult::new(
                field(index, "emailAddress"),
                "email address is not valid",
            ))),
            _ => Ok(None),
        }
    }
}

/// Staff may omit a contact email, but one that is given must be well formed.
pub struct ContactEmailShape;

#[async_trait]
impl Validator<Contact> for ContactEmailShape {
    fn name(&self) -> &'static str {
        "contact_email_shape"
    }

    fn supports(&self, source: ValidationSource) -> bool {
        source == ValidationSource::Staff
    }

    async fn validate(&self, c: &Contact, index: usize) -> Outcome {
        match c.email_address.as_deref() {
            Some(e) if !is_blank(e) && !is_email(e) => Ok(Some(RuleResult::new(
                field(index, "emailAddress"),
                "email address is not valid",
            ))),
            _ => Ok(None),
        }
    }
}

pub struct ContactPhoneDigits;

fn phone_ok(raw: &str) -> bool {
    let digits = raw.chars().filter(char::is_ascii_digit).count();
    let other = raw
        .chars()
        .filter(|c| !c.is_ascii_digit() && !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .count();
    digits == PHONE_DIGITS && other == 0
}

#[async_trait]
impl Validator<Contact> for ContactPhoneDigits {
    fn name(&self) -> &'static str {
        "contact_phone_digits"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, c: &Contact, index: usize) -> Outcome {
        for (name, value) in [
            ("phoneNumber", c.phone_number.as_deref()),
            ("secondaryPhone", c.secondary_phone.as_deref()),
        ] {
            if let Some(v) = value.filter(|v| !is_blank(v)) {
                if !phone_ok(v) {
                    return Ok(Some(RuleResult::new(
                        field(index, name),
                        format!("phone number must have {PHONE_DIGITS} digits"),
                    )));
                }
            }
        }
        Ok(None)
    }
}

pub struct ContactTypeRequired;

#[async_trait]
impl Validator<Contact> for ContactTypeRequired {
    fn name(&self) -> &'static str {
        "contact_type_required"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, c: &Contact, index: usize) -> Outcome {
        if is_blank(&c.contact_type) {
            return Ok(Some(RuleResult::new(
                field(index, "contactType"),
                "contact type is required",
            )));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: Option<&str>) -> Contact {
        Contact {
            index: 0,
            contact_type: "BL".into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            phone_number: Some("(250) 555-0101".into()),
            secondary_phone: None,
            email_address: email.map(str::to_string),
            location_names: vec![],
        }
    }

    #[test]
    fn phone_digit_count() {
        assert!(phone_ok("250-555-0101"));
        assert!(!phone_ok("555-0101"));
        assert!(!phone_ok("250555010x"));
    }

    #[tokio::test]
    async fn email_rules_depend_on_source() {
        let none = contact(None);
        assert!(ContactEmailRequired.validate(&none, 0).await.unwrap().is_some());
        assert!(ContactEmailShape.validate(&none, 0).await.unwrap().is_none());

        let bad = contact(Some("not-an-email"));
        assert!(ContactEmailRequired.validate(&bad, 3).await.unwrap().is_some());
        let r = ContactEmailShape.validate(&bad, 3).await.unwrap().unwrap();
        assert_eq!(r.field, "location.contacts[3].emailAddress");

        assert!(ContactEmailRequired.supports(ValidationSource::External));
        assert!(!ContactEmailRequired.supports(ValidationSource::Staff));
    }
}
