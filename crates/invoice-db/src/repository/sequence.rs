//! # Invoice Sequence Repository
//!
//! Database operations for the per-financial-year counters.
//!
//! ## Counter Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ Read-modify-write in the application                               │
//! │     SELECT current_sequence_no ...  → 5                                │
//! │     UPDATE ... SET current_sequence_no = 6                             │
//! │     (two requests can both read 5)                                     │
//! │                                                                         │
//! │  ✅ Single-statement increment                                         │
//! │     UPDATE ... SET current_sequence_no = current_sequence_no + 1       │
//! │     RETURNING current_sequence_no                                      │
//! │     (SQLite serializes writers; each request sees its own value)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are never reset or deleted.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use invoice_core::{InvoiceSequence, SequenceAllocation};

/// Repository for invoice sequence counters.
#[derive(Debug, Clone)]
pub struct InvoiceSequenceRepository {
    pool: SqlitePool,
}

impl InvoiceSequenceRepository {
    /// Creates a new InvoiceSequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceSequenceRepository { pool }
    }

    /// Gets the counter for a financial year.
    pub async fn find(&self, financial_year: &str) -> DbResult<Option<InvoiceSequence>> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, financial_year).await
    }

    /// Lists every counter, most recently created first.
    pub async fn list(&self) -> DbResult<Vec<InvoiceSequence>> {
        let sequences = sqlx::query_as::<_, InvoiceSequence>(
            r#"
            SELECT financial_year, current_sequence_no, created_at, updated_at
            FROM invoice_sequences
            ORDER BY created_at DESC, financial_year DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sequences)
    }

    /// Counts counter rows (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_sequences")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Connection-scoped operations
// =============================================================================

/// Gets the counter for a financial year on `conn`.
pub async fn find(
    conn: &mut SqliteConnection,
    financial_year: &str,
) -> DbResult<Option<InvoiceSequence>> {
    let sequence = sqlx::query_as::<_, InvoiceSequence>(
        r#"
        SELECT financial_year, current_sequence_no, created_at, updated_at
        FROM invoice_sequences
        WHERE financial_year = ?1
        "#,
    )
    .bind(financial_year)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(sequence)
}

/// Creates the counter for a financial year whose first number is being
/// issued right now, storing the number after it.
///
/// ## Returns
/// * `Err(DbError::UniqueViolation)` - another request created it first
pub async fn create_first(
    conn: &mut SqliteConnection,
    financial_year: &str,
    now: DateTime<Utc>,
) -> DbResult<InvoiceSequence> {
    debug!(financial_year = %financial_year, "Creating invoice sequence");

    let sequence = InvoiceSequence {
        financial_year: financial_year.to_string(),
        current_sequence_no: SequenceAllocation::initial_stored_value(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO invoice_sequences (
            financial_year, current_sequence_no, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&sequence.financial_year)
    .bind(sequence.current_sequence_no)
    .bind(sequence.created_at)
    .bind(sequence.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(sequence)
}

/// Atomically adds one to the counter and returns the new value.
///
/// ## Returns
/// * `Ok(None)` - no counter exists for the financial year
pub async fn increment(
    conn: &mut SqliteConnection,
    financial_year: &str,
    now: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    let updated: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE invoice_sequences SET
            current_sequence_no = current_sequence_no + 1,
            updated_at = ?2
        WHERE financial_year = ?1
        RETURNING current_sequence_no
        "#,
    )
    .bind(financial_year)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    debug!(financial_year = %financial_year, ?updated, "Incremented invoice sequence");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_then_increment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        assert!(find(&mut conn, "2024-25").await.unwrap().is_none());
        assert_eq!(increment(&mut conn, "2024-25", now).await.unwrap(), None);

        let created = create_first(&mut conn, "2024-25", now).await.unwrap();
        assert_eq!(created.current_sequence_no, 2);

        assert_eq!(increment(&mut conn, "2024-25", now).await.unwrap(), Some(3));
        assert_eq!(increment(&mut conn, "2024-25", now).await.unwrap(), Some(4));

        let stored = find(&mut conn, "2024-25").await.unwrap().unwrap();
        assert_eq!(stored.current_sequence_no, 4);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_unique_violation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        create_first(&mut conn, "2024-25", now).await.unwrap();
        let err = create_first(&mut conn, "2024-25", now).await.unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_years_are_independent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            create_first(&mut conn, "2024-25", now).await.unwrap();
            increment(&mut conn, "2024-25", now).await.unwrap();
            create_first(&mut conn, "2025-26", now).await.unwrap();
        }

        let repo = db.sequences();
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.find("2024-25").await.unwrap().unwrap().current_sequence_no, 3);
        assert_eq!(repo.find("2025-26").await.unwrap().unwrap().current_sequence_no, 2);
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}
