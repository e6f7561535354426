use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::CollaboratorError;

/// Code-table lookups used by the shipped rules.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn country_exists(&self, country_code: &str) -> Result<bool, CollaboratorError>;

    async fn province_exists(
        &self,
        country_code: &str,
        province_code: &str,
    ) -> Result<bool, CollaboratorError>;

    async fn client_type_exists(&self, client_type: &str) -> Result<bool, CollaboratorError>;

    async fn district_exists(&self, district: &str) -> Result<bool, CollaboratorError>;
}

/// In-memory code tables. Lookups are case-insensitive.
///
/// Used by offline validation and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticReferenceData {
    countries: BTreeSet<String>,
    provinces: BTreeSet<(String, String)>,
    client_types: BTreeSet<String>,
    districts: BTreeSet<String>,
}

impl StaticReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canada/US with their provinces and states, the common client types
    /// and a handful of districts.
    pub fn with_defaults() -> Self {
        let mut r = Self::new()
            .with_country("CA")
            .with_country("US")
            .with_country("GB")
            .with_country("DE");
        for p in [
            "AB", "BC", "MB", "NB", "NL", "NS", "NT", "NU", "ON", "PE", "QC", "SK", "YT",
        ] {
            r = r.with_province("CA", p);
        }
        for s in [
            "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL",
            "IN", "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE",
            "NV", "NH", "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD",
            "TN", "TX", "UT", "VT", "VA", "WA", "WV", "WI", "WY",
        ] {
            r = r.with_province("US", s);
        }
        for t in ["A", "B", "C", "F", "G", "I", "L", "P", "R", "RSP", "S", "T", "USP"] {
            r = r.with_client_type(t);
        }
        for d in ["DCC", "DCK", "DCR", "DMH", "DND", "DPG", "DQC", "DSE", "DSS"] {
            r = r.with_district(d);
        }
        r
    }

    pub fn with_country(mut self, code: &str) -> Self {
        self.countries.insert(norm(code));
        self
    }

    pub fn with_province(mut self, country: &str, code: &str) -> Self {
        self.provinces.insert((norm(country), norm(code)));
        self
    }

    pub fn with_client_type(mut self, code: &str) -> Self {
        self.client_types.insert(norm(code));
        self
    }

    pub fn with_district(mut self, code: &str) -> Self {
        self.districts.insert(norm(code));
        self
    }
}

fn norm(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

#[async_trait]
impl ReferenceData for StaticReferenceData {
    async fn country_exists(&self, country_code: &str) -> Result<bool, CollaboratorError> {
        Ok(self.countries.contains(&norm(country_code)))
    }

    async fn province_exists(
        &self,
        country_code: &str,
        province_code: &str,
    ) -> Result<bool, CollaboratorError> {
        Ok(self
            .provinces
            .contains(&(norm(country_code), norm(province_code))))
    }

    async fn client_type_exists(&self, client_type: &str) -> Result<bool, CollaboratorError> {
        Ok(self.client_types.contains(&norm(client_type)))
    }

    async fn district_exists(&self, district: &str) -> Result<bool, CollaboratorError> {
        Ok(self.districts.contains(&norm(district)))
    }
}
