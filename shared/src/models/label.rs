//! Label Record Model
//!
//! A label record is one manufacturing unit (a TMT bar bundle) tracked for
//! dedup and printing. Inbound payloads use the upstream mill feed's
//! upper-case keys; stored records use snake_case.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Default page size for label listings
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Upper bound for a single listing page
pub const MAX_PAGE_SIZE: usize = 500;

/// Label record lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStatus {
    #[default]
    Pending,
    Printed,
    Failed,
}

impl LabelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Printed => "printed",
            Self::Failed => "failed",
        }
    }
}

/// Manufacturing attributes carried on a label
///
/// Opaque to dedup and dispatch; only the renderer reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelAttributes {
    pub location: Option<String>,
    pub bundle_no: Option<String>,
    pub bundle_count: Option<u32>,
    pub pqd: Option<String>,
    pub unit: Option<String>,
    pub product_heading: Option<String>,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub heat_no: Option<String>,
    pub length: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub mill: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub charge_dtm: Option<String>,
    pub isi_top: Option<String>,
    pub isi_bottom: Option<String>,
}

/// Label record entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    /// System-assigned id, stable once created
    pub internal_id: Uuid,
    /// External unique key (the feed's `ID`)
    pub business_id: String,
    pub attributes: LabelAttributes,
    pub status: LabelStatus,
    /// True only on records rejected by dedup; those are never stored
    pub is_duplicate: bool,
    pub submitted_by: Uuid,
    pub printed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LabelRecord {
    /// Fresh record for a first-seen business id
    pub fn new(
        business_id: impl Into<String>,
        attributes: LabelAttributes,
        submitted_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            internal_id: Uuid::new_v4(),
            business_id: business_id.into(),
            attributes,
            status: LabelStatus::Pending,
            is_duplicate: false,
            submitted_by,
            printed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Audit copy of an incoming payload that collided with `existing`.
    ///
    /// Carries the submitted attributes but points at the stored record's id
    /// and reports its current status.
    pub fn duplicate_of(
        existing: &LabelRecord,
        attributes: LabelAttributes,
        submitted_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            internal_id: existing.internal_id,
            business_id: existing.business_id.clone(),
            attributes,
            status: existing.status,
            is_duplicate: true,
            submitted_by,
            printed_at: existing.printed_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Why a payload was excluded from intake
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("ID is required")]
    MissingBusinessId,

    #[error("{0}")]
    Invalid(String),

    #[error("{field} must be a non-negative decimal, got {value:?}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("BUNDLE_NOS must be a non-negative integer, got {0:?}")]
    InvalidCount(String),
}

/// Inbound label payload as sent by the mill feed
///
/// Numeric columns arrive as either JSON strings or numbers; both are
/// accepted and parsed during normalisation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LabelPayload {
    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    #[validate(length(max = 255))]
    pub id: Option<String>,
    #[serde(rename = "LOCATION", default)]
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[serde(rename = "BUNDLE_NO", default, deserialize_with = "lenient_string")]
    #[validate(length(max = 255))]
    pub bundle_no: Option<String>,
    #[serde(rename = "BUNDLE_NOS", default, deserialize_with = "lenient_string")]
    pub bundle_nos: Option<String>,
    #[serde(rename = "PQD", default)]
    #[validate(length(max = 255))]
    pub pqd: Option<String>,
    #[serde(rename = "UNIT", default)]
    #[validate(length(max = 255))]
    pub unit: Option<String>,
    #[serde(rename = "PRODUCT_HEADING", default)]
    #[validate(length(max = 255))]
    pub product_heading: Option<String>,
    #[serde(rename = "GRADE", default)]
    #[validate(length(max = 255))]
    pub grade: Option<String>,
    #[serde(rename = "SECTION", default)]
    #[validate(length(max = 255))]
    pub section: Option<String>,
    #[serde(rename = "HEAT_NO", default, deserialize_with = "lenient_string")]
    #[validate(length(max = 255))]
    pub heat_no: Option<String>,
    #[serde(rename = "LENGTH", default, deserialize_with = "lenient_string")]
    pub length: Option<String>,
    #[serde(rename = "WEIGHT", default, deserialize_with = "lenient_string")]
    pub weight: Option<String>,
    #[serde(rename = "MILL", default)]
    #[validate(length(max = 255))]
    pub mill: Option<String>,
    #[serde(rename = "DATE1", default)]
    #[validate(length(max = 255))]
    pub date: Option<String>,
    #[serde(rename = "TIME1", default)]
    #[validate(length(max = 255))]
    pub time: Option<String>,
    #[serde(rename = "CHARGE_DTM", default)]
    #[validate(length(max = 255))]
    pub charge_dtm: Option<String>,
    #[serde(rename = "ISI_TOP", default)]
    #[validate(length(max = 255))]
    pub isi_top: Option<String>,
    #[serde(rename = "ISI_BOTTOM", default)]
    #[validate(length(max = 255))]
    pub isi_bottom: Option<String>,
}

impl LabelPayload {
    /// Trimmed business id; `None` when absent or blank
    pub fn business_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Validate and split into the dedup key and typed attributes
    pub fn normalize(&self) -> Result<(String, LabelAttributes), PayloadError> {
        let business_id = self
            .business_id()
            .ok_or(PayloadError::MissingBusinessId)?
            .to_string();
        self.validate()
            .map_err(|e| PayloadError::Invalid(e.to_string()))?;

        let bundle_count = match clean(&self.bundle_nos) {
            None => None,
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| PayloadError::InvalidCount(raw))?),
        };

        let attributes = LabelAttributes {
            location: clean(&self.location),
            bundle_no: clean(&self.bundle_no),
            bundle_count,
            pqd: clean(&self.pqd),
            unit: clean(&self.unit),
            product_heading: clean(&self.product_heading),
            grade: clean(&self.grade),
            section: clean(&self.section),
            heat_no: clean(&self.heat_no),
            length: parse_decimal("LENGTH", &self.length)?,
            weight: parse_decimal("WEIGHT", &self.weight)?,
            mill: clean(&self.mill),
            date: clean(&self.date),
            time: clean(&self.time),
            charge_dtm: clean(&self.charge_dtm),
            isi_top: clean(&self.isi_top),
            isi_bottom: clean(&self.isi_bottom),
        };

        Ok((business_id, attributes))
    }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_decimal(field: &'static str, raw: &Option<String>) -> Result<Option<Decimal>, PayloadError> {
    let Some(raw) = clean(raw) else {
        return Ok(None);
    };
    match Decimal::from_str(&raw) {
        Ok(value) if !value.is_sign_negative() => Ok(Some(value)),
        _ => Err(PayloadError::InvalidDecimal { field, value: raw }),
    }
}

/// Accept a JSON string, number or null for a text column
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Lenient>::deserialize(deserializer)?.map(|value| match value {
        Lenient::Text(s) => s,
        Lenient::Number(n) => n.to_string(),
    }))
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Label listing filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelFilter {
    pub status: Option<LabelStatus>,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub heat_no: Option<String>,
    pub submitted_by: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self {
            status: None,
            grade: None,
            section: None,
            heat_no: None,
            submitted_by: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl LabelFilter {
    pub fn matches(&self, record: &LabelRecord) -> bool {
        let attrs = &record.attributes;
        self.status.is_none_or(|s| s == record.status)
            && self.submitted_by.is_none_or(|u| u == record.submitted_by)
            && field_matches(&self.grade, &attrs.grade)
            && field_matches(&self.section, &attrs.section)
            && field_matches(&self.heat_no, &attrs.heat_no)
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn page_size(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

fn field_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(w)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> LabelPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_payload_uses_feed_keys() {
        let p = payload(
            r#"{"ID":"PQD-001","HEAT_NO":"H123","GRADE":"Fe500D","SECTION":"12MM",
                "LENGTH":"12.000","WEIGHT":2.5,"BUNDLE_NOS":7,"DATE1":"01-02-2025"}"#,
        );
        let (business_id, attrs) = p.normalize().unwrap();
        assert_eq!(business_id, "PQD-001");
        assert_eq!(attrs.heat_no.as_deref(), Some("H123"));
        assert_eq!(attrs.length, Some(Decimal::from_str("12").unwrap()));
        assert_eq!(attrs.weight, Some(Decimal::from_str("2.5").unwrap()));
        assert_eq!(attrs.bundle_count, Some(7));
        assert_eq!(attrs.date.as_deref(), Some("01-02-2025"));
    }

    #[test]
    fn test_numeric_business_id_is_accepted() {
        let p = payload(r#"{"ID":120045}"#);
        assert_eq!(p.business_id(), Some("120045"));
    }

    #[test]
    fn test_missing_or_blank_id_rejected() {
        assert_eq!(
            payload(r#"{"GRADE":"Fe500"}"#).normalize().unwrap_err(),
            PayloadError::MissingBusinessId
        );
        assert_eq!(
            payload(r#"{"ID":"   "}"#).normalize().unwrap_err(),
            PayloadError::MissingBusinessId
        );
        assert_eq!(
            payload(r#"{"ID":null}"#).normalize().unwrap_err(),
            PayloadError::MissingBusinessId
        );
    }

    #[test]
    fn test_negative_or_garbage_decimal_rejected() {
        let err = payload(r#"{"ID":"A","LENGTH":"-1"}"#).normalize().unwrap_err();
        assert!(matches!(err, PayloadError::InvalidDecimal { field: "LENGTH", .. }));

        let err = payload(r#"{"ID":"A","WEIGHT":"heavy"}"#).normalize().unwrap_err();
        assert!(matches!(err, PayloadError::InvalidDecimal { field: "WEIGHT", .. }));

        let err = payload(r#"{"ID":"A","BUNDLE_NOS":"two"}"#).normalize().unwrap_err();
        assert_eq!(err, PayloadError::InvalidCount("two".into()));
    }

    #[test]
    fn test_overlong_field_rejected() {
        let long = "x".repeat(256);
        let p = LabelPayload {
            id: Some("A".into()),
            grade: Some(long),
            ..Default::default()
        };
        assert!(matches!(p.normalize(), Err(PayloadError::Invalid(_))));
    }

    #[test]
    fn test_blank_attributes_become_none() {
        let (_, attrs) = payload(r#"{"ID":"A","MILL":"  ","LENGTH":""}"#)
            .normalize()
            .unwrap();
        assert_eq!(attrs.mill, None);
        assert_eq!(attrs.length, None);
    }

    #[test]
    fn test_filter_matching() {
        let now = Utc::now();
        let attrs = LabelAttributes {
            grade: Some("Fe500D".into()),
            heat_no: Some("H1".into()),
            ..Default::default()
        };
        let record = LabelRecord::new("A", attrs, Uuid::new_v4(), now);

        assert!(LabelFilter::default().matches(&record));
        let by_grade = LabelFilter {
            grade: Some("fe500d".into()),
            ..Default::default()
        };
        assert!(by_grade.matches(&record));
        let by_status = LabelFilter {
            status: Some(LabelStatus::Printed),
            ..Default::default()
        };
        assert!(!by_status.matches(&record));
        let by_section = LabelFilter {
            section: Some("8MM".into()),
            ..Default::default()
        };
        assert!(!by_section.matches(&record));
    }

    #[test]
    fn test_filter_defaults_from_query() {
        let filter: LabelFilter = serde_json::from_str(r#"{"status":"failed"}"#).unwrap();
        assert_eq!(filter.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(filter.offset, 0);
        assert_eq!(filter.status, Some(LabelStatus::Failed));

        let filter = LabelFilter {
            limit: 10_000,
            ..Default::default()
        };
        assert_eq!(filter.page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_duplicate_points_at_existing_record() {
        let now = Utc::now();
        let existing = LabelRecord::new("A", LabelAttributes::default(), Uuid::new_v4(), now);
        let dup = LabelRecord::duplicate_of(&existing, LabelAttributes::default(), Uuid::new_v4(), now);
        assert!(dup.is_duplicate);
        assert_eq!(dup.internal_id, existing.internal_id);
        assert_eq!(dup.business_id, "A");
    }
}
