//! # Database Error Types
//!
//! Error types for database operations and for callers of the invoice
//! numbering service.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  InvoiceError ← NotConfigured / Validation / Conflict / Storage        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  JSON { code, message } for the dashboard                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use invoice_core::{CoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two requests create the counter row for the same financial year
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    ///
    /// ## When This Occurs
    /// - Runtime SQL error
    /// - CHECK constraint rejected a value
    /// - Database locked past the busy timeout
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not be started or committed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Wraps a failure to begin or commit a transaction.
    pub fn transaction(err: sqlx::Error) -> Self {
        DbError::TransactionFailed(err.to_string())
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → UniqueViolation or QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite: "UNIQUE constraint failed: <table>.<column>"
                if db_err.is_unique_violation() || msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Errors
// =============================================================================

/// Errors returned by [`crate::InvoiceNumberService`].
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// No settings row exists, or the row is inactive.
    #[error("Invoice numbering is not configured")]
    NotConfigured,

    /// Settings input (or a stored settings row) broke a domain rule.
    #[error("{0}")]
    Validation(#[from] CoreError),

    /// Sequence creation collided with another request and the increment
    /// retry found no row either.
    #[error("Concurrent sequence allocation for financial year {financial_year} could not be resolved")]
    ConcurrencyConflict { financial_year: String },

    /// Any persistence failure. Not retried.
    #[error("Storage failure: {0}")]
    Storage(#[from] DbError),
}

impl From<ValidationError> for InvoiceError {
    fn from(err: ValidationError) -> Self {
        InvoiceError::Validation(err.into())
    }
}

impl InvoiceError {
    /// Machine-readable code for the JSON surface.
    pub fn code(&self) -> ErrorCode {
        match self {
            InvoiceError::NotConfigured => ErrorCode::NotConfigured,
            InvoiceError::Validation(_) => ErrorCode::ValidationError,
            InvoiceError::ConcurrencyConflict { .. } => ErrorCode::ConcurrencyConflict,
            InvoiceError::Storage(_) => ErrorCode::StorageError,
        }
    }

    /// Builds the `{ code, message }` body shown to callers.
    ///
    /// Storage details are logged, not exposed.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            InvoiceError::Storage(err) => {
                tracing::error!(error = %err, "Invoice storage operation failed");
                "Invoice storage operation failed".to_string()
            }
            other => other.to_string(),
        };

        ErrorResponse {
            code: self.code(),
            message,
        }
    }
}

/// Error codes for the JSON surface.
///
/// ```json
/// { "code": "NOT_CONFIGURED", "message": "Invoice numbering is not configured" }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Invoicing not set up (400)
    NotConfigured,

    /// Settings update rejected (400)
    ValidationError,

    /// Sequence allocation race could not be resolved (409)
    ConcurrencyConflict,

    /// Database failure (500)
    StorageError,
}

/// Serialized error body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

/// Result type for service operations.
pub type InvoiceResult<T> = Result<T, InvoiceError>;
