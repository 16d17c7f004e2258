//! # Credential Catalogue
//!
//! A certificate's subject attributes and the catalogue entries that decide
//! its validity window:
//!
//! - [`CredentialType`]: what kind of credential this is, and whether it
//!   is permanent (never expires).
//! - [`ValidityOption`]: a named validity period for a credential type,
//!   expressed in months, days, or both. Months are applied first.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A kind of credential (degree, licence, identity card, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialType {
    /// Stable catalogue identifier, e.g. `"vn_cccd_chip"`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Permanent credentials never receive an expiration date.
    #[serde(default)]
    pub is_permanent: bool,
}

/// A validity period offered for a credential type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityOption {
    /// Stable catalogue identifier, e.g. `"opt_passport_60"`.
    pub id: String,
    /// The credential type this option belongs to.
    pub credential_type_id: String,
    /// Period in calendar months.
    #[serde(default)]
    pub period_months: Option<u32>,
    /// Period in days, added after the months.
    #[serde(default)]
    pub period_days: Option<u32>,
    /// Free-form regulation note.
    #[serde(default)]
    pub note: Option<String>,
}

impl ValidityOption {
    /// Build a validity option, requiring at least one non-zero period.
    pub fn new(
        id: impl Into<String>,
        credential_type_id: impl Into<String>,
        period_months: Option<u32>,
        period_days: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let option = Self {
            id: id.into(),
            credential_type_id: credential_type_id.into(),
            period_months: period_months.filter(|m| *m > 0),
            period_days: period_days.filter(|d| *d > 0),
            note: None,
        };
        option.validate()?;
        Ok(option)
    }

    /// Check the catalogue rules for this option.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("validity_option.id"));
        }
        if self.credential_type_id.trim().is_empty() {
            return Err(ValidationError::MissingField("validity_option.credential_type_id"));
        }
        let months = self.period_months.unwrap_or(0);
        let days = self.period_days.unwrap_or(0);
        if months == 0 && days == 0 {
            return Err(ValidationError::InvalidField {
                field: "validity_option",
                reason: "either period_months or period_days must be set".into(),
            });
        }
        Ok(())
    }

    /// The expiration date for a certificate issued on `issued`.
    ///
    /// Returns `None` if the result falls outside the representable range.
    pub fn expiration_from(&self, issued: NaiveDate) -> Option<NaiveDate> {
        let mut date = issued;
        if let Some(months) = self.period_months.filter(|m| *m > 0) {
            date = date.checked_add_months(Months::new(months))?;
        }
        if let Some(days) = self.period_days.filter(|d| *d > 0) {
            date = date.checked_add_days(Days::new(u64::from(days)))?;
        }
        Some(date)
    }
}

/// Subject attributes of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAttributes {
    /// Name of the certificate holder, as printed.
    pub holder_name: String,
    /// Catalogue credential type, if the submitter chose one.
    #[serde(default)]
    pub credential_type_id: Option<String>,
    /// Free-text credential title (degree name, licence class, …).
    #[serde(default)]
    pub credential_name: Option<String>,
    /// Date of issuance.
    #[serde(default)]
    pub issued_date: Option<NaiveDate>,
    /// Last day of validity, inclusive.
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
}

impl CertificateAttributes {
    /// Attributes with only a holder name.
    pub fn for_holder(holder_name: impl Into<String>) -> Self {
        Self {
            holder_name: holder_name.into(),
            credential_type_id: None,
            credential_name: None,
            issued_date: None,
            expiration_date: None,
        }
    }

    /// Check required fields and date ordering.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.holder_name.trim().is_empty() {
            return Err(ValidationError::MissingField("holder_name"));
        }
        if let (Some(issued), Some(expires)) = (self.issued_date, self.expiration_date) {
            if expires < issued {
                return Err(ValidationError::InvalidField {
                    field: "expiration_date",
                    reason: format!("{expires} precedes issued date {issued}"),
                });
            }
        }
        Ok(())
    }
}
