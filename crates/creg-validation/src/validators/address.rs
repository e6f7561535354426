use std::sync::Arc;

use async_trait::async_trait;
use creg_schemas::{Address, RuleResult, ValidationSource};

use super::{blank_opt, is_blank, is_email};
use crate::{CollaboratorError, ReferenceData, Validator};

type Outcome = Result<Option<RuleResult>, CollaboratorError>;

/// Countries whose addresses must carry a province/state code.
const PROVINCE_REQUIRED: &[&str] = &["CA", "US"];

const MAX_FOREIGN_POSTAL_LEN: usize = 10;

fn field(index: usize, name: &str) -> String {
    format!("location.addresses[{index}].{name}")
}

pub struct CountryExists {
    reference: Arc<dyn ReferenceData>,
}

impl CountryExists {
    pub fn new(reference: Arc<dyn ReferenceData>) -> Self {
        Self { reference }
    }
}

#[async_trait]
impl Validator<Address> for CountryExists {
    fn name(&self) -> &'static str {
        "country_exists"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, a: &Address, index: usize) -> Outcome {
        let code = a.country_code.trim();
        if code.is_empty() {
            return Ok(Some(RuleResult::new(field(index, "countryCode"), "country is required")));
        }
        if !self.reference.country_exists(code).await? {
            return Ok(Some(RuleResult::new(
                field(index, "countryCode"),
                format!("country '{code}' does not exist"),
            )));
        }
        Ok(None)
    }
}

pub struct ProvinceExists {
    reference: Arc<dyn ReferenceData>,
}

impl ProvinceExists {
    pub fn new(reference: Arc<dyn ReferenceData>) -> Self {
        Self { reference }
    }
}

#[async_trait]
impl Validator<Address> for ProvinceExists {
    fn name(&self) -> &'static str {
        "province_exists"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, a: &Address, index: usize) -> Outcome {
        let country = a.country_code.trim().to_ascii_uppercase();
        let province = a
            .province_code
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        match province {
            None if PROVINCE_REQUIRED.contains(&country.as_str()) => Ok(Some(RuleResult::new(
                field(index, "provinceCode"),
                format!("province is required for country {country}"),
            ))),
            None => Ok(None),
            Some(p) => {
                if self.reference.province_exists(&country, p).await? {
                    Ok(None)
                } else {
                    Ok(Some(RuleResult::new(
                        field(index, "provinceCode"),
                        format!("province '{p}' does not exist in country {country}"),
                    )))
                }
            }
        }
    }
}

/// CA `A1A1A1`, US `12345` or `123456789`, elsewhere at most 10 characters.
/// Spaces and hyphens are ignored.
pub struct PostalCodeShape;

fn postal_ok(country: &str, postal: &str) -> bool {
    let compact: String = postal
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    match country {
        "CA" => {
            let b = compact.as_bytes();
            b.len() == 6
                && b.iter().enumerate().all(|(i, c)| {
                    if i % 2 == 0 {
                        c.is_ascii_alphabetic()
                    } else {
                        c.is_ascii_digit()
                    }
                })
        }
        "US" => {
            (compact.len() == 5 || compact.len() == 9) && compact.chars().all(|c| c.is_ascii_digit())
        }
        _ => !compact.is_empty() && postal.trim().chars().count() <= MAX_FOREIGN_POSTAL_LEN,
    }
}

#[async_trait]
impl Validator<Address> for PostalCodeShape {
    fn name(&self) -> &'static str {
        "postal_code_shape"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, a: &Address, index: usize) -> Outcome {
        let country = a.country_code.trim().to_ascii_uppercase();
        if is_blank(&a.postal_code) {
            return Ok(Some(RuleResult::new(
                field(index, "postalCode"),
                "postal code is required",
            )));
        }
        if !postal_ok(&country, &a.postal_code) {
            let expected = match country.as_str() {
                "CA" => "format A1A1A1",
                "US" => "5 or 9 digits",
                _ => "at most 10 characters",
            };
            return Ok(Some(RuleResult::new(
                field(index, "postalCode"),
                format!("postal code must be {expected}"),
            )));
        }
        Ok(None)
    }
}

pub struct StreetAddressRequired;

#[async_trait]
impl Validator<Address> for StreetAddressRequired {
    fn name(&self) -> &'static str {
        "street_address_required"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, a: &Address, index: usize) -> Outcome {
        if is_blank(&a.street_address) {
            return Ok(Some(RuleResult::new(
                field(index, "streetAddress"),
                "street address is required",
            )));
        }
        Ok(None)
    }
}

pub struct CityRequired;

#[async_trait]
impl Validator<Address> for CityRequired {
    fn name(&self) -> &'static str {
        "city_required"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, a: &Address, index: usize) -> Outcome {
        if is_blank(&a.city) {
            return Ok(Some(RuleResult::new(field(index, "city"), "city is required")));
        }
        Ok(None)
    }
}

pub struct AddressEmailShape;

#[async_trait]
impl Validator<Address> for AddressEmailShape {
    fn name(&self) -> &'static str {
        "address_email_shape"
    }

    fn supports(&self, _source: ValidationSource) -> bool {
        true
    }

    async fn validate(&self, a: &Address, index: usize) -> Outcome {
        let email = a.email_address.as_deref();
        if blank_opt(email) {
            return Ok(None);
        }
        if !email.map(is_email).unwrap_or(false) {
            return Ok(Some(RuleResult::new(
                field(index, "emailAddress"),
                "email address is not valid",
            )));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postal_shapes_by_country() {
        assert!(postal_ok("CA", "V8V 1A1"));
        assert!(!postal_ok("CA", "V8V1A"));
        assert!(!postal_ok("CA", "88V1A1"));
        assert!(postal_ok("US", "98101"));
        assert!(postal_ok("US", "98101-1234"));
        assert!(!postal_ok("US", "9810"));
        assert!(postal_ok("GB", "SW1A 1AA"));
        assert!(!postal_ok("DE", "12345678901"));
    }
}
