//! # Repository Module
//!
//! Database repository implementations for invoice numbering.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pool-backed (one statement, autocommit)                               │
//! │     db.settings().first().await?                                       │
//! │                                                                         │
//! │  Connection-scoped (several statements, one transaction)               │
//! │     let mut tx = db.begin().await?;                                    │
//! │     let settings = settings::first(&mut tx).await?;                    │
//! │     let updated  = sequence::increment(&mut tx, "2024-25", now).await?;│
//! │     tx.commit().await?;                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`settings::InvoiceSettingsRepository`] - the numbering configuration row
//! - [`sequence::InvoiceSequenceRepository`] - per-financial-year counters

pub mod sequence;
pub mod settings;
