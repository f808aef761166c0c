//! # invoice-core: Pure Invoice Numbering Logic
//!
//! This crate holds every rule that decides what an invoice number looks
//! like, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Invoice Numbering Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Admin dashboard / order checkout (JSON API layer)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             invoice-db: InvoiceNumberService                    │   │
//! │  │     get_settings, update_settings, generate_invoice_number      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ invoice-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────────┐ ┌──────────────┐ ┌───────────┐ ┌───────────┐  │   │
//! │  │  │    types    │ │financial_year│ │ numbering │ │validation │  │   │
//! │  │  │  Settings   │ │  FY window   │ │  padding  │ │ settings  │  │   │
//! │  │  │  Sequence   │ │  rollover    │ │  template │ │  update   │  │   │
//! │  │  └─────────────┘ └──────────────┘ └───────────┘ └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │       NO I/O • NO DATABASE • NO WALL CLOCK • PURE FUNCTIONS     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Settings, sequence rows and the generated number
//! - [`financial_year`] - Financial-year windows, labels and rollover
//! - [`numbering`] - Sequence padding, template rendering, allocation math
//! - [`validation`] - Settings update validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use invoice_core::numbering::{pad_sequence, render_invoice_number};
//!
//! let seq = pad_sequence(7, 4);
//! let number = render_invoice_number("[PREFIX]/[fy]/[SEQ]", "INV", "2024-25", &seq);
//! assert_eq!(number, "INV/2024-25/0007");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod financial_year;
pub mod numbering;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use financial_year::{resolve_financial_year, FinancialYear, ResolvedFinancialYear};
pub use numbering::SequenceAllocation;
pub use types::*;
pub use validation::{InvoiceSettingsUpdate, ValidatedSettingsUpdate};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Prefix used when settings are created lazily.
pub const DEFAULT_INVOICE_PREFIX: &str = "INV";

/// Zero-pad width used when settings are created lazily.
pub const DEFAULT_SEQUENCE_LENGTH: u32 = 4;

/// Template used when settings are created lazily or an update omits it.
pub const DEFAULT_INVOICE_FORMAT: &str = "{PREFIX}-{FY}-{SEQ}";

/// Allowed range for `invoice_sequence_length`.
pub const MIN_SEQUENCE_LENGTH: u32 = 1;
pub const MAX_SEQUENCE_LENGTH: u32 = 10;

/// Month the default financial year starts in (April 1 – March 31).
pub const FINANCIAL_YEAR_START_MONTH: u32 = 4;

/// First sequence number handed out in a new financial year.
pub const FIRST_SEQUENCE_NO: i64 = 1;
