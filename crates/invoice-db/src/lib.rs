//! # invoice-db: Database Layer for Invoice Numbering
//!
//! SQLite persistence for invoice settings and per-financial-year sequence
//! counters, plus the service that issues invoice numbers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Invoice Numbering Data Flow                        │
//! │                                                                         │
//! │  Order checkout / admin dashboard / invoicectl                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    invoice-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Service     │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (service.rs)  │───►│ settings.rs   │    │  (embedded)  │  │   │
//! │  │   │ one tx per    │    │ sequence.rs   │    │ 001_invoice_ │  │   │
//! │  │   │ request       │    └───────┬───────┘    │ numbering    │  │   │
//! │  │   └───────────────┘            │            └──────────────┘  │   │
//! │  │                        ┌───────▼───────┐                      │   │
//! │  │                        │   Database    │                      │   │
//! │  │                        │   (pool.rs)   │                      │   │
//! │  │                        └───────────────┘                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite: invoice_settings, invoice_sequences                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and service error types
//! - [`repository`] - Settings and sequence repositories
//! - [`service`] - `InvoiceNumberService`
//! - [`config`] - Environment-driven application config
//!
//! ## Usage
//!
//! ```rust,ignore
//! use invoice_core::GenerateOptions;
//! use invoice_db::{Database, DbConfig, InvoiceNumberService};
//!
//! let db = Database::new(DbConfig::new("invoices.db")).await?;
//! let service = InvoiceNumberService::new(db);
//!
//! match service.generate_invoice_number(GenerateOptions::issue()).await? {
//!     Some(number) => println!("{}", number.invoice_number),
//!     None => println!("invoicing not configured"),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{DbError, ErrorCode, ErrorResponse, InvoiceError, InvoiceResult};
pub use pool::{Database, DbConfig};
pub use service::{InvoiceNumberService, InvoiceSettingsView};

// Repository re-exports for convenience
pub use repository::sequence::InvoiceSequenceRepository;
pub use repository::settings::InvoiceSettingsRepository;
