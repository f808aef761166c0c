//! # Database Migrations
//!
//! The invoice schema, compiled into the binary from the workspace
//! `migrations/sqlite` directory.
//!
//! ```text
//! migrations/sqlite/
//! └── 001_invoice_numbering.sql   invoice_settings, invoice_sequences
//! ```
//!
//! Applied files are checksummed in `_sqlx_migrations`; change the schema
//! by adding `NNN_description.sql`, never by editing an applied file.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies pending migrations. Safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;

    info!(
        migrations = MIGRATOR.migrations.len(),
        "Invoice schema up to date"
    );
    Ok(())
}

/// `(embedded, applied)` migration counts.
///
/// A database that was never migrated has no `_sqlx_migrations` table and
/// reports 0 applied; any other failure is returned.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = match sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
    {
        Ok(count) => count,
        Err(sqlx::Error::Database(err)) if err.message().contains("no such table") => 0,
        Err(err) => return Err(err.into()),
    };

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
