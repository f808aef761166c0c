//! # Invoice Settings Repository
//!
//! Database operations for the `invoice_settings` row.
//!
//! ## Authoritative Row
//! One row is expected. If several exist, the oldest (`created_at`, then
//! `rowid`) is the one every read returns, so the choice is stable across
//! requests.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use invoice_core::{FinancialYear, InvoiceSettings};

const SELECT_SETTINGS: &str = r#"
    SELECT
        id,
        invoice_prefix,
        invoice_sequence_length,
        financial_year_start,
        financial_year_end,
        auto_financial_year,
        manual_financial_year,
        invoice_format,
        is_active,
        created_at,
        updated_at
    FROM invoice_settings
    ORDER BY created_at ASC, rowid ASC
    LIMIT 1
"#;

/// Repository for invoice settings.
///
/// ## Usage
/// ```rust,ignore
/// let repo = InvoiceSettingsRepository::new(pool);
/// let settings = repo.first().await?;
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceSettingsRepository {
    pool: SqlitePool,
}

impl InvoiceSettingsRepository {
    /// Creates a new InvoiceSettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceSettingsRepository { pool }
    }

    /// Returns the authoritative settings row, if any.
    pub async fn first(&self) -> DbResult<Option<InvoiceSettings>> {
        let mut conn = self.pool.acquire().await?;
        first(&mut conn).await
    }

    /// Inserts a settings row.
    pub async fn insert(&self, settings: &InvoiceSettings) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, settings).await
    }

    /// Overwrites every field of an existing settings row.
    pub async fn update(&self, settings: &InvoiceSettings) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        update(&mut conn, settings).await
    }

    /// Counts settings rows (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_settings")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Connection-scoped operations
// =============================================================================

/// Returns the authoritative settings row on `conn`.
pub async fn first(conn: &mut SqliteConnection) -> DbResult<Option<InvoiceSettings>> {
    let settings = sqlx::query_as::<_, InvoiceSettings>(SELECT_SETTINGS)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(settings)
}

/// Inserts a settings row on `conn`.
pub async fn insert(conn: &mut SqliteConnection, settings: &InvoiceSettings) -> DbResult<()> {
    debug!(id = %settings.id, prefix = %settings.invoice_prefix, "Inserting invoice settings");

    sqlx::query(
        r#"
        INSERT INTO invoice_settings (
            id, invoice_prefix, invoice_sequence_length,
            financial_year_start, financial_year_end,
            auto_financial_year, manual_financial_year,
            invoice_format, is_active, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3,
            ?4, ?5,
            ?6, ?7,
            ?8, ?9, ?10, ?11
        )
        "#,
    )
    .bind(&settings.id)
    .bind(&settings.invoice_prefix)
    .bind(settings.invoice_sequence_length)
    .bind(settings.financial_year_start)
    .bind(settings.financial_year_end)
    .bind(settings.auto_financial_year)
    .bind(&settings.manual_financial_year)
    .bind(&settings.invoice_format)
    .bind(settings.is_active)
    .bind(settings.created_at)
    .bind(settings.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrites an existing settings row on `conn`.
///
/// ## Returns
/// * `Err(DbError::NotFound)` - no row with `settings.id`
pub async fn update(conn: &mut SqliteConnection, settings: &InvoiceSettings) -> DbResult<()> {
    debug!(id = %settings.id, prefix = %settings.invoice_prefix, "Updating invoice settings");

    let result = sqlx::query(
        r#"
        UPDATE invoice_settings SET
            invoice_prefix = ?2,
            invoice_sequence_length = ?3,
            financial_year_start = ?4,
            financial_year_end = ?5,
            auto_financial_year = ?6,
            manual_financial_year = ?7,
            invoice_format = ?8,
            is_active = ?9,
            updated_at = ?10
        WHERE id = ?1
        "#,
    )
    .bind(&settings.id)
    .bind(&settings.invoice_prefix)
    .bind(settings.invoice_sequence_length)
    .bind(settings.financial_year_start)
    .bind(settings.financial_year_end)
    .bind(settings.auto_financial_year)
    .bind(&settings.manual_financial_year)
    .bind(&settings.invoice_format)
    .bind(settings.is_active)
    .bind(settings.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("InvoiceSettings", &settings.id));
    }

    Ok(())
}

/// Persists a rolled-over financial-year window on `conn`.
pub async fn update_financial_year(
    conn: &mut SqliteConnection,
    id: &str,
    window: &FinancialYear,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(
        id = %id,
        start = %window.start(),
        end = %window.end(),
        "Persisting financial year window"
    );

    let result = sqlx::query(
        r#"
        UPDATE invoice_settings SET
            financial_year_start = ?2,
            financial_year_end = ?3,
            updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(window.start())
    .bind(window.end())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("InvoiceSettings", id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, NaiveDate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        assert!(repo.first().await.unwrap().is_none());

        let mut settings = InvoiceSettings::defaults("settings-1", date(2024, 6, 1), Utc::now()).unwrap();
        settings.manual_financial_year = Some("FY24".to_string());
        repo.insert(&settings).await.unwrap();

        let stored = repo.first().await.unwrap().unwrap();
        assert_eq!(stored.id, "settings-1");
        assert_eq!(stored.invoice_prefix, "INV");
        assert_eq!(stored.invoice_sequence_length, 4);
        assert_eq!(stored.financial_year_start, date(2024, 4, 1));
        assert_eq!(stored.financial_year_end, date(2025, 3, 31));
        assert_eq!(stored.manual_financial_year.as_deref(), Some("FY24"));
        assert!(stored.auto_financial_year);
        assert!(stored.is_active);
    }

    #[tokio::test]
    async fn test_oldest_row_is_authoritative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();
        let now = Utc::now();

        let mut newer = InvoiceSettings::defaults("newer", date(2024, 6, 1), now).unwrap();
        newer.invoice_prefix = "NEW".to_string();
        let older =
            InvoiceSettings::defaults("older", date(2024, 6, 1), now - Duration::days(30)).unwrap();

        repo.insert(&newer).await.unwrap();
        repo.insert(&older).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.first().await.unwrap().unwrap().id, "older");
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = InvoiceSettings::defaults("ghost", date(2024, 6, 1), Utc::now()).unwrap();

        let err = db.settings().update(&settings).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_financial_year() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = InvoiceSettings::defaults("settings-1", date(2024, 6, 1), Utc::now()).unwrap();
        db.settings().insert(&settings).await.unwrap();

        let window = FinancialYear::new(date(2025, 4, 1), date(2026, 3, 31)).unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        update_financial_year(&mut conn, "settings-1", &window, Utc::now())
            .await
            .unwrap();
        drop(conn);

        let stored = db.settings().first().await.unwrap().unwrap();
        assert_eq!(stored.financial_year_start, date(2025, 4, 1));
        assert_eq!(stored.financial_year_end, date(2026, 3, 31));
    }
}
