//! # Database Pool Management
//!
//! SQLite pool setup and the transaction entry point used by the service.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  One invoice-number request                             │
//! │                                                                         │
//! │  Database::begin() ── acquires a pooled connection, BEGIN IMMEDIATE    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  settings::first / update_financial_year / sequence::increment ...     │
//! │       │                                                                 │
//! │       ├── error or early return → dropped tx rolls back                │
//! │       ▼                                                                 │
//! │  tx.commit() ── connection returns to the pool                         │
//! │                                                                         │
//! │  The write lock is taken at BEGIN, so concurrent requests queue there  │
//! │  for up to `busy_timeout` instead of failing on a lock upgrade.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Journal Mode
//! File databases run in WAL mode, so settings reads proceed while another
//! request holds the write lock.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::sequence::InvoiceSequenceRepository;
use crate::repository::settings::InvoiceSettingsRepository;

/// Path value that selects a private in-memory database.
const MEMORY_PATH: &str = ":memory:";

const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(30 * 60);

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/grocery/invoices.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// How long `begin()` waits for a free pooled connection.
    /// Default: 30 seconds
    pub acquire_timeout: Duration,

    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a statement waits on another writer's lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Apply embedded migrations in `Database::new`.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Configuration for a database file, created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Private in-memory database for tests.
    ///
    /// Every in-memory connection is its own database, so the pool is
    /// pinned to one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the invoice database. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, applies migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening invoice database"
        );

        let options = config.connect_options()?;
        debug!(busy_timeout_ms = config.busy_timeout.as_millis() as u64, "Connect options ready");

        // Recycling an in-memory connection would drop the database with it.
        let recycle = !config.is_in_memory();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(recycle.then_some(config.idle_timeout))
            .max_lifetime(recycle.then_some(MAX_CONNECTION_LIFETIME))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Database pool created");

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a write transaction on a pooled connection.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front. A deferred
    /// transaction that reads first and writes later gets `SQLITE_BUSY`
    /// without waiting when another writer got there in between.
    ///
    /// Dropping the transaction without committing rolls it back.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(DbError::transaction)
    }

    pub fn settings(&self) -> InvoiceSettingsRepository {
        InvoiceSettingsRepository::new(self.pool.clone())
    }

    pub fn sequences(&self) -> InvoiceSequenceRepository {
        InvoiceSequenceRepository::new(self.pool.clone())
    }

    /// Closes the pool; later operations fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing invoice database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
