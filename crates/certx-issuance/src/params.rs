//! # Approval Parameters
//!
//! What an approver (or a direct issuer) decides at publication time, and
//! how it combines with the submitted attributes and watermark snapshot.
//!
//! ## Precedence
//!
//! | Value | Approver | Submitter | Default |
//! |-------|----------|-----------|---------|
//! | issued date | `issued_date` | `attributes.issued_date` | today (UTC) |
//! | label | `label` | `watermark.label` | `"{text} - {holder} - {dd/mm/yyyy}"` |
//! | opacity | `opacity` | `watermark.opacity` | configured opacity |
//!
//! The default label uses the effective issued date, so the printed date and
//! the date the expiration is computed from are always the same.
//!
//! A permanent credential type clears the expiration date whatever validity
//! option accompanies it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use certx_core::{CertificateAttributes, CredentialType, ValidationError, ValidityOption};
use certx_state::WatermarkParams;
use certx_watermark::WatermarkConfig;

/// Decisions taken when publishing a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalParams {
    /// Validity period used to compute the expiration date.
    #[serde(default)]
    pub validity_option: Option<ValidityOption>,
    /// Credential type, consulted for `is_permanent`.
    #[serde(default)]
    pub credential_type: Option<CredentialType>,
    /// Overrides the submitted issuance date.
    #[serde(default)]
    pub issued_date: Option<NaiveDate>,
    /// Overrides the watermark label.
    #[serde(default)]
    pub label: Option<String>,
    /// Overrides the watermark opacity.
    #[serde(default)]
    pub opacity: Option<f32>,
}

impl ApprovalParams {
    /// Parameters carrying only a validity option.
    pub fn with_validity(option: ValidityOption) -> Self {
        Self {
            validity_option: Some(option),
            ..Self::default()
        }
    }
}

/// Final attributes and watermark settings for one publication.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedApproval {
    pub attributes: CertificateAttributes,
    pub label: String,
    pub opacity: f32,
}

/// The label drawn when neither approver nor submitter supplied one.
pub fn default_label(text: &str, holder_name: &str, issued: NaiveDate) -> String {
    format!("{} - {} - {}", text.trim(), holder_name.trim(), issued.format("%d/%m/%Y"))
}

/// Reject an opacity outside `[0, 1]`.
pub fn check_opacity(opacity: Option<f32>) -> Result<(), ValidationError> {
    match opacity {
        Some(o) if !(0.0..=1.0).contains(&o) => Err(ValidationError::InvalidField {
            field: "opacity",
            reason: format!("{o} is outside [0, 1]"),
        }),
        _ => Ok(()),
    }
}

/// Combine approver decisions with the submission.
pub fn resolve(
    params: &ApprovalParams,
    attributes: &CertificateAttributes,
    submitted: &WatermarkParams,
    config: &WatermarkConfig,
    today: NaiveDate,
) -> Result<ResolvedApproval, ValidationError> {
    let mut attrs = attributes.clone();
    let issued = params.issued_date.or(attrs.issued_date).unwrap_or(today);
    attrs.issued_date = Some(issued);

    if let Some(credential) = &params.credential_type {
        if attrs
            .credential_type_id
            .as_deref()
            .is_some_and(|id| id != credential.id)
        {
            return Err(ValidationError::InvalidField {
                field: "credential_type",
                reason: format!("submission names a different credential type than {}", credential.id),
            });
        }
        attrs.credential_type_id = Some(credential.id.clone());
        if attrs.credential_name.is_none() {
            attrs.credential_name = Some(credential.name.clone());
        }
    }

    let permanent = params
        .credential_type
        .as_ref()
        .is_some_and(|c| c.is_permanent);

    if permanent {
        attrs.expiration_date = None;
    } else if let Some(option) = &params.validity_option {
        option.validate()?;
        if attrs
            .credential_type_id
            .as_deref()
            .is_some_and(|id| id != option.credential_type_id)
        {
            return Err(ValidationError::InvalidField {
                field: "validity_option",
                reason: format!(
                    "option {} belongs to credential type {}",
                    option.id, option.credential_type_id
                ),
            });
        }
        attrs.credential_type_id = Some(option.credential_type_id.clone());
        attrs.expiration_date =
            Some(option.expiration_from(issued).ok_or_else(|| ValidationError::InvalidField {
                field: "validity_option",
                reason: format!("expiration from {issued} is out of range"),
            })?);
    }
    attrs.validate()?;

    let opacity = params.opacity.or(submitted.opacity);
    check_opacity(opacity)?;

    let label = non_blank(params.label.as_deref())
        .or_else(|| non_blank(submitted.label.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(|| default_label(&config.text, &attrs.holder_name, issued));

    Ok(ResolvedApproval {
        attributes: attrs,
        label,
        opacity: opacity.unwrap_or(config.opacity),
    })
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn twelve_months() -> ValidityOption {
        ValidityOption::new("opt_12m", "degree", Some(12), None).unwrap()
    }

    #[test]
    fn default_label_uses_issued_date() {
        let resolved = resolve(
            &ApprovalParams::default(),
            &CertificateAttributes::for_holder("Nguyen Van A"),
            &WatermarkParams::default(),
            &WatermarkConfig::default(),
            date(2026, 3, 9),
        )
        .unwrap();
        assert_eq!(resolved.label, "Issued by CertX - Nguyen Van A - 09/03/2026");
        assert_eq!(resolved.attributes.issued_date, Some(date(2026, 3, 9)));
        assert_eq!(resolved.opacity, WatermarkConfig::default().opacity);
    }

    #[test]
    fn validity_option_sets_expiration() {
        let mut attrs = CertificateAttributes::for_holder("Nguyen Van A");
        attrs.issued_date = Some(date(2026, 1, 15));
        let resolved = resolve(
            &ApprovalParams::with_validity(twelve_months()),
            &attrs,
            &WatermarkParams::default(),
            &WatermarkConfig::default(),
            date(2026, 5, 1),
        )
        .unwrap();
        assert_eq!(resolved.attributes.expiration_date, Some(date(2027, 1, 15)));
        assert_eq!(resolved.attributes.credential_type_id.as_deref(), Some("degree"));
    }

    #[test]
    fn permanent_type_clears_expiration() {
        let mut attrs = CertificateAttributes::for_holder("Nguyen Van A");
        attrs.expiration_date = Some(date(2030, 1, 1));
        let params = ApprovalParams {
            validity_option: Some(twelve_months()),
            credential_type: Some(CredentialType {
                id: "degree".into(),
                name: "Bachelor of Science".into(),
                is_permanent: true,
            }),
            ..ApprovalParams::default()
        };
        let resolved = resolve(
            &params,
            &attrs,
            &WatermarkParams::default(),
            &WatermarkConfig::default(),
            date(2026, 1, 1),
        )
        .unwrap();
        assert_eq!(resolved.attributes.expiration_date, None);
        assert_eq!(resolved.attributes.credential_name.as_deref(), Some("Bachelor of Science"));
    }

    #[test]
    fn mismatched_validity_option_is_rejected() {
        let mut attrs = CertificateAttributes::for_holder("Nguyen Van A");
        attrs.credential_type_id = Some("passport".into());
        let err = resolve(
            &ApprovalParams::with_validity(twelve_months()),
            &attrs,
            &WatermarkParams::default(),
            &WatermarkConfig::default(),
            date(2026, 1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "validity_option", .. }));
    }

    #[test]
    fn approver_overrides_submitter() {
        let submitted = WatermarkParams {
            label: Some("Submitted label".into()),
            opacity: Some(0.4),
        };
        let resolved = resolve(
            &ApprovalParams::default(),
            &CertificateAttributes::for_holder("A"),
            &submitted,
            &WatermarkConfig::default(),
            date(2026, 1, 1),
        )
        .unwrap();
        assert_eq!(resolved.label, "Submitted label");
        assert_eq!(resolved.opacity, 0.4);

        let params = ApprovalParams {
            label: Some("Approver label".into()),
            opacity: Some(0.6),
            ..ApprovalParams::default()
        };
        let resolved = resolve(
            &params,
            &CertificateAttributes::for_holder("A"),
            &submitted,
            &WatermarkConfig::default(),
            date(2026, 1, 1),
        )
        .unwrap();
        assert_eq!(resolved.label, "Approver label");
        assert_eq!(resolved.opacity, 0.6);
    }

    #[test]
    fn opacity_out_of_range_is_rejected() {
        assert!(check_opacity(Some(1.5)).is_err());
        assert!(check_opacity(Some(f32::NAN)).is_err());
        assert!(check_opacity(Some(0.0)).is_ok());
        assert!(check_opacity(None).is_ok());
    }
}
