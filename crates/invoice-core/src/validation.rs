//! # Validation Module
//!
//! Validation of invoice settings updates coming from the admin dashboard.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Dashboard form (TypeScript)                                  │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── prefix non-empty, trimmed, upper-cased                            │
//! │  ├── sequence length in [1, 10]                                        │
//! │  └── financial-year dates present, parseable, end after start          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── CHECK (invoice_sequence_length BETWEEN 1 AND 10)                  │
//! │                                                                         │
//! │  Nothing is persisted unless layer 2 passes.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::financial_year::FinancialYear;
use crate::types::InvoiceSettings;
use crate::{DEFAULT_INVOICE_FORMAT, MAX_SEQUENCE_LENGTH, MIN_SEQUENCE_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Update Request
// =============================================================================

/// Raw settings update as submitted by the dashboard.
///
/// Every field is optional at the type level so that missing fields are
/// reported as validation errors instead of deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSettingsUpdate {
    pub invoice_prefix: Option<String>,
    pub invoice_sequence_length: Option<i64>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub financial_year_start: Option<String>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub financial_year_end: Option<String>,
    /// Defaults to true.
    pub auto_financial_year: Option<bool>,
    pub manual_financial_year: Option<String>,
    /// Defaults to `{PREFIX}-{FY}-{SEQ}`.
    pub invoice_format: Option<String>,
    /// Defaults to true.
    pub is_active: Option<bool>,
}

/// A settings update that passed validation, with normalized values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSettingsUpdate {
    pub invoice_prefix: String,
    pub invoice_sequence_length: u32,
    pub financial_year: FinancialYear,
    pub auto_financial_year: bool,
    pub manual_financial_year: Option<String>,
    pub invoice_format: String,
    pub is_active: bool,
}

impl InvoiceSettingsUpdate {
    /// Validates and normalizes the update.
    ///
    /// ## Example
    /// ```rust
    /// use invoice_core::InvoiceSettingsUpdate;
    ///
    /// let update = InvoiceSettingsUpdate {
    ///     invoice_prefix: Some(" inv ".to_string()),
    ///     invoice_sequence_length: Some(5),
    ///     financial_year_start: Some("2024-04-01".to_string()),
    ///     financial_year_end: Some("2025-03-31".to_string()),
    ///     ..Default::default()
    /// };
    ///
    /// let valid = update.validate().unwrap();
    /// assert_eq!(valid.invoice_prefix, "INV");
    /// ```
    pub fn validate(&self) -> Result<ValidatedSettingsUpdate, CoreError> {
        let invoice_prefix = validate_prefix(self.invoice_prefix.as_deref())?;
        let invoice_sequence_length = validate_sequence_length(self.invoice_sequence_length)?;
        let start = parse_date("financialYearStart", self.financial_year_start.as_deref())?;
        let end = parse_date("financialYearEnd", self.financial_year_end.as_deref())?;
        let financial_year = FinancialYear::new(start, end)?;
        let invoice_format = validate_invoice_format(self.invoice_format.as_deref())?;

        let manual_financial_year = self
            .manual_financial_year
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string);

        Ok(ValidatedSettingsUpdate {
            invoice_prefix,
            invoice_sequence_length,
            financial_year,
            auto_financial_year: self.auto_financial_year.unwrap_or(true),
            manual_financial_year,
            invoice_format,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

impl ValidatedSettingsUpdate {
    /// Writes the update onto an existing settings row.
    pub fn apply_to(&self, settings: &mut InvoiceSettings, now: DateTime<Utc>) {
        settings.invoice_prefix = self.invoice_prefix.clone();
        settings.invoice_sequence_length = self.invoice_sequence_length;
        settings.financial_year_start = self.financial_year.start();
        settings.financial_year_end = self.financial_year.end();
        settings.auto_financial_year = self.auto_financial_year;
        settings.manual_financial_year = self.manual_financial_year.clone();
        settings.invoice_format = self.invoice_format.clone();
        settings.is_active = self.is_active;
        settings.updated_at = now;
    }

    /// Builds a new settings row from the update.
    pub fn into_settings(self, id: impl Into<String>, now: DateTime<Utc>) -> InvoiceSettings {
        InvoiceSettings {
            id: id.into(),
            invoice_prefix: self.invoice_prefix,
            invoice_sequence_length: self.invoice_sequence_length,
            financial_year_start: self.financial_year.start(),
            financial_year_end: self.financial_year.end(),
            auto_financial_year: self.auto_financial_year,
            manual_financial_year: self.manual_financial_year,
            invoice_format: self.invoice_format,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Field Validators
// =============================================================================

/// Validates the invoice prefix and returns it trimmed and upper-cased.
pub fn validate_prefix(prefix: Option<&str>) -> ValidationResult<String> {
    let prefix = prefix.map(str::trim).unwrap_or_default();

    if prefix.is_empty() {
        return Err(ValidationError::required("invoicePrefix"));
    }

    Ok(prefix.to_uppercase())
}

/// Validates the zero-pad width.
pub fn validate_sequence_length(length: Option<i64>) -> ValidationResult<u32> {
    let length = length.ok_or_else(|| ValidationError::required("invoiceSequenceLength"))?;

    if length < MIN_SEQUENCE_LENGTH as i64 || length > MAX_SEQUENCE_LENGTH as i64 {
        return Err(ValidationError::OutOfRange {
            field: "invoiceSequenceLength".to_string(),
            min: MIN_SEQUENCE_LENGTH as i64,
            max: MAX_SEQUENCE_LENGTH as i64,
        });
    }

    Ok(length as u32)
}

/// Validates the template; a missing template falls back to the default.
pub fn validate_invoice_format(format: Option<&str>) -> ValidationResult<String> {
    match format {
        None => Ok(DEFAULT_INVOICE_FORMAT.to_string()),
        Some(format) if format.trim().is_empty() => {
            Err(ValidationError::required("invoiceFormat"))
        }
        Some(format) => Ok(format.trim().to_string()),
    }
}

/// Parses a date given as `YYYY-MM-DD` or an RFC 3339 timestamp.
///
/// A timestamp must fall on midnight in its own offset. `toISOString()`
/// on a local midnight east of UTC gives the previous evening in `Z`
/// (`2024-03-31T18:30:00Z` for Apr 1 in UTC+5:30), and taking its date
/// part would silently move the boundary by a day.
pub fn parse_date(field: &str, value: Option<&str>) -> ValidationResult<NaiveDate> {
    let value = value.map(str::trim).unwrap_or_default();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }

    let timestamp = DateTime::parse_from_rfc3339(value).map_err(|_| {
        ValidationError::invalid_format(field, "expected YYYY-MM-DD or an RFC 3339 timestamp")
    })?;

    if timestamp.time() != NaiveTime::MIN {
        return Err(ValidationError::invalid_format(
            field,
            "timestamp must be at midnight; send the calendar date as YYYY-MM-DD",
        ));
    }

    Ok(timestamp.date_naive())
}
