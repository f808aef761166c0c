//! # Domain Types
//!
//! Types shared by the numbering rules and the database layer.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────────┐                     │
//! │  │  InvoiceSettings    │   │  InvoiceSequence    │                     │
//! │  │  ─────────────────  │   │  ─────────────────  │                     │
//! │  │  invoice_prefix     │   │  financial_year (PK)│                     │
//! │  │  sequence_length    │   │  current_sequence_no│                     │
//! │  │  FY start / end     │   │   = NEXT to hand out│                     │
//! │  │  auto / manual FY   │   └─────────────────────┘                     │
//! │  │  invoice_format     │                                               │
//! │  │  is_active          │   ┌─────────────────────┐                     │
//! │  └─────────────────────┘   │   InvoiceNumber     │ ← generator output  │
//! │                            │  "INV-2024-25-0001" │                     │
//! │                            └─────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::financial_year::FinancialYear;
use crate::numbering::{pad_sequence, render_invoice_number, SequenceAllocation};
use crate::{DEFAULT_INVOICE_FORMAT, DEFAULT_INVOICE_PREFIX, DEFAULT_SEQUENCE_LENGTH};

// =============================================================================
// Invoice Settings
// =============================================================================

/// Invoice numbering configuration.
///
/// One row is expected. When several exist, the oldest one is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSettings {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Alphabetic tag, upper-cased (e.g. "INV").
    pub invoice_prefix: String,

    /// Zero-pad width of the sequence, in [1, 10].
    pub invoice_sequence_length: u32,

    /// First day of the active financial year.
    #[ts(as = "String")]
    pub financial_year_start: NaiveDate,

    /// Last day of the active financial year (inclusive).
    #[ts(as = "String")]
    pub financial_year_end: NaiveDate,

    /// Advance the window automatically once the end date has passed.
    pub auto_financial_year: bool,

    /// Free-text label used when `auto_financial_year` is off.
    pub manual_financial_year: Option<String>,

    /// Template with `{PREFIX}`, `{FY}`, `{SEQ}` (or bracket) placeholders.
    pub invoice_format: String,

    /// Generation is refused while false.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InvoiceSettings {
    /// Builds the settings row created lazily when none exists.
    ///
    /// Prefix "INV", width 4, the April–March year containing `today`,
    /// auto-rollover on, format `{PREFIX}-{FY}-{SEQ}`.
    pub fn defaults(
        id: impl Into<String>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let window = FinancialYear::containing(today)?;

        Ok(InvoiceSettings {
            id: id.into(),
            invoice_prefix: DEFAULT_INVOICE_PREFIX.to_string(),
            invoice_sequence_length: DEFAULT_SEQUENCE_LENGTH,
            financial_year_start: window.start(),
            financial_year_end: window.end(),
            auto_financial_year: true,
            manual_financial_year: None,
            invoice_format: DEFAULT_INVOICE_FORMAT.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the stored financial-year window.
    pub fn financial_year(&self) -> CoreResult<FinancialYear> {
        FinancialYear::new(self.financial_year_start, self.financial_year_end)
    }

    /// Replaces the stored window (used after a rollover).
    pub fn set_financial_year(&mut self, window: &FinancialYear, now: DateTime<Utc>) {
        self.financial_year_start = window.start();
        self.financial_year_end = window.end();
        self.updated_at = now;
    }
}

// =============================================================================
// Invoice Sequence
// =============================================================================

/// Per-financial-year counter.
///
/// `current_sequence_no` is the next number that will be handed out.
/// Rows are created lazily and only ever incremented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSequence {
    pub financial_year: String,
    pub current_sequence_no: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Generation
// =============================================================================

/// Options for a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    /// Consume a sequence number (true) or only preview the current one.
    pub increment: bool,
}

impl GenerateOptions {
    /// Consume the next number.
    pub const fn issue() -> Self {
        GenerateOptions { increment: true }
    }

    /// Show the current number without touching the counter.
    pub const fn preview() -> Self {
        GenerateOptions { increment: false }
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions::issue()
    }
}

/// A rendered invoice number plus the metadata the dashboard displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceNumber {
    /// Fully rendered number, e.g. "INV-2024-25-0001".
    pub invoice_number: String,
    /// Resolved financial-year label.
    pub financial_year: String,
    /// Zero-padded sequence, e.g. "0001".
    pub sequence: String,
    /// Sequence number consumed (or shown, for previews).
    pub sequence_no: i64,
    /// Number the following increment will hand out.
    pub next_sequence_no: i64,
    pub prefix: String,
    pub format: String,
}

impl InvoiceNumber {
    /// Pads the allocation and renders the settings' template.
    pub fn compose(
        settings: &InvoiceSettings,
        financial_year: &str,
        allocation: SequenceAllocation,
    ) -> Self {
        let sequence = pad_sequence(allocation.consumed, settings.invoice_sequence_length);
        let invoice_number = render_invoice_number(
            &settings.invoice_format,
            &settings.invoice_prefix,
            financial_year,
            &sequence,
        );

        InvoiceNumber {
            invoice_number,
            financial_year: financial_year.to_string(),
            sequence,
            sequence_no: allocation.consumed,
            next_sequence_no: allocation.next,
            prefix: settings.invoice_prefix.clone(),
            format: settings.invoice_format.clone(),
        }
    }
}
