//! # Invoice Number Service
//!
//! The three operations callers use: read settings, update settings and
//! generate an invoice number.
//!
//! ## Generation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  generate_invoice_number (one transaction)              │
//! │                                                                         │
//! │  settings::first ──► missing / inactive? ──► Ok(None), nothing written  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  advance_financial_year_if_expired                                     │
//! │  └── auto mode + window expired → persist rolled window                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  increment?                                                             │
//! │  ├── yes: claim_sequence                                               │
//! │  │        no row → create_first (stores 2, consumes 1)                 │
//! │  │                 └── UniqueViolation → increment (retry once)        │
//! │  │        row    → increment (consumes updated - 1)                    │
//! │  └── no:  sequence::find, no writes                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ──► InvoiceNumber::compose                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dates
//! Every operation has an `_on(today)` form taking the calendar date used
//! for financial-year resolution. The plain forms use today's UTC date.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, InvoiceError, InvoiceResult};
use crate::pool::Database;
use crate::repository::{sequence, settings};
use invoice_core::{
    resolve_financial_year, GenerateOptions, InvoiceNumber, InvoiceSequence, InvoiceSettings,
    InvoiceSettingsUpdate, ResolvedFinancialYear, SequenceAllocation,
};

/// Settings plus a non-consuming preview of the current invoice number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSettingsView {
    pub settings: InvoiceSettings,
    pub preview: InvoiceNumber,
}

/// Invoice numbering operations over a [`Database`].
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct InvoiceNumberService {
    db: Database,
}

impl InvoiceNumberService {
    pub fn new(db: Database) -> Self {
        InvoiceNumberService { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Returns the settings, creating the default row on first use.
    pub async fn get_settings(&self) -> InvoiceResult<InvoiceSettingsView> {
        self.get_settings_on(today()).await
    }

    /// Returns the settings as of `today`, creating the default row if none
    /// exists and advancing an expired financial year.
    pub async fn get_settings_on(&self, today: NaiveDate) -> InvoiceResult<InvoiceSettingsView> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let current = match settings::first(&mut tx).await? {
            Some(current) => current,
            None => {
                let defaults = InvoiceSettings::defaults(Uuid::new_v4().to_string(), today, now)?;
                settings::insert(&mut tx, &defaults).await?;
                info!(id = %defaults.id, "Created default invoice settings");
                defaults
            }
        };

        let view = settings_view(&mut tx, current, today, now).await?;
        tx.commit().await.map_err(DbError::transaction)?;

        Ok(view)
    }

    /// Validates and upserts the settings.
    pub async fn update_settings(
        &self,
        update: &InvoiceSettingsUpdate,
    ) -> InvoiceResult<InvoiceSettingsView> {
        self.update_settings_on(update, today()).await
    }

    /// Validates and upserts the settings, returning a fresh view as of
    /// `today`. Nothing is written when validation fails.
    pub async fn update_settings_on(
        &self,
        update: &InvoiceSettingsUpdate,
        today: NaiveDate,
    ) -> InvoiceResult<InvoiceSettingsView> {
        let validated = update.validate()?;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let updated = match settings::first(&mut tx).await? {
            Some(mut existing) => {
                validated.apply_to(&mut existing, now);
                settings::update(&mut tx, &existing).await?;
                existing
            }
            None => {
                let created = validated.into_settings(Uuid::new_v4().to_string(), now);
                settings::insert(&mut tx, &created).await?;
                created
            }
        };

        info!(
            id = %updated.id,
            prefix = %updated.invoice_prefix,
            auto_financial_year = updated.auto_financial_year,
            is_active = updated.is_active,
            "Invoice settings saved"
        );

        let view = settings_view(&mut tx, updated, today, now).await?;
        tx.commit().await.map_err(DbError::transaction)?;

        Ok(view)
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Generates (or previews) an invoice number for today.
    pub async fn generate_invoice_number(
        &self,
        options: GenerateOptions,
    ) -> InvoiceResult<Option<InvoiceNumber>> {
        self.generate_invoice_number_on(options, today()).await
    }

    /// Generates (or previews) an invoice number as of `today`.
    ///
    /// ## Returns
    /// * `Ok(None)` - settings are missing, inactive or malformed; nothing
    ///   was written
    /// * `Ok(Some(number))` - with `increment`, `number.sequence_no` has been
    ///   consumed and will never be handed out again
    pub async fn generate_invoice_number_on(
        &self,
        options: GenerateOptions,
        today: NaiveDate,
    ) -> InvoiceResult<Option<InvoiceNumber>> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let Some(current) = settings::first(&mut tx).await? else {
            debug!("No invoice settings configured");
            return Ok(None);
        };

        if !current.is_active {
            debug!(id = %current.id, "Invoice settings inactive");
            return Ok(None);
        }

        let (current, resolved) =
            match advance_financial_year_if_expired(&mut tx, current, today, now).await {
                Ok(advanced) => advanced,
                Err(InvoiceError::Validation(err)) => {
                    warn!(error = %err, "Stored invoice settings are malformed");
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };

        let allocation = if options.increment {
            let exists = sequence::find(&mut tx, &resolved.label).await?.is_some();
            claim_sequence(&mut tx, &resolved.label, exists, now).await?
        } else {
            preview_allocation(&mut tx, &resolved.label).await?
        };

        tx.commit().await.map_err(DbError::transaction)?;

        let number = InvoiceNumber::compose(&current, &resolved.label, allocation);
        if options.increment {
            info!(
                invoice_number = %number.invoice_number,
                financial_year = %number.financial_year,
                sequence_no = number.sequence_no,
                "Issued invoice number"
            );
        }

        Ok(Some(number))
    }

    /// Consumes the next invoice number, treating missing or inactive
    /// settings as an error.
    pub async fn next_invoice_number(&self) -> InvoiceResult<InvoiceNumber> {
        self.next_invoice_number_on(today()).await
    }

    pub async fn next_invoice_number_on(&self, today: NaiveDate) -> InvoiceResult<InvoiceNumber> {
        self.generate_invoice_number_on(GenerateOptions::issue(), today)
            .await?
            .ok_or(InvoiceError::NotConfigured)
    }

    /// Every sequence counter, most recent financial year first.
    pub async fn sequences(&self) -> InvoiceResult<Vec<InvoiceSequence>> {
        Ok(self.db.sequences().list().await?)
    }
}

// =============================================================================
// Transaction steps
// =============================================================================

/// Resolves the financial year for `current` and, when the window rolled
/// over, persists the advanced window before anything else reads it.
pub async fn advance_financial_year_if_expired(
    conn: &mut SqliteConnection,
    mut current: InvoiceSettings,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> InvoiceResult<(InvoiceSettings, ResolvedFinancialYear)> {
    let resolved = resolve_financial_year(&current, today)?;

    if resolved.rolled_over() {
        settings::update_financial_year(conn, &current.id, &resolved.window, now).await?;
        info!(
            id = %current.id,
            from = %current.financial_year_start,
            to = %resolved.window.start(),
            steps = resolved.steps,
            financial_year = %resolved.label,
            "Advanced financial year"
        );
        current.set_financial_year(&resolved.window, now);
    }

    Ok((current, resolved))
}

/// Consumes one number from the counter for `financial_year`.
///
/// `exists` is what the caller observed before claiming. A row created by
/// someone else in between shows up as a unique violation, which falls
/// back to the increment path once.
async fn claim_sequence(
    conn: &mut SqliteConnection,
    financial_year: &str,
    exists: bool,
    now: DateTime<Utc>,
) -> InvoiceResult<SequenceAllocation> {
    if !exists {
        match sequence::create_first(conn, financial_year, now).await {
            Ok(_) => return Ok(SequenceAllocation::first()),
            Err(err) if err.is_unique_violation() => {
                warn!(
                    financial_year = %financial_year,
                    "Sequence created concurrently, retrying as increment"
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    match sequence::increment(conn, financial_year, now).await? {
        Some(updated) => Ok(SequenceAllocation::after_increment(updated)),
        None => Err(InvoiceError::ConcurrencyConflict {
            financial_year: financial_year.to_string(),
        }),
    }
}

async fn preview_allocation(
    conn: &mut SqliteConnection,
    financial_year: &str,
) -> InvoiceResult<SequenceAllocation> {
    let stored = sequence::find(conn, financial_year)
        .await?
        .map(|row| row.current_sequence_no);

    Ok(SequenceAllocation::preview(stored))
}

async fn settings_view(
    conn: &mut SqliteConnection,
    current: InvoiceSettings,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> InvoiceResult<InvoiceSettingsView> {
    let (current, resolved) = advance_financial_year_if_expired(conn, current, today, now).await?;
    let allocation = preview_allocation(conn, &resolved.label).await?;
    let preview = InvoiceNumber::compose(&current, &resolved.label, allocation);

    Ok(InvoiceSettingsView {
        settings: current,
        preview,
    })
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn service() -> InvoiceNumberService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        InvoiceNumberService::new(db)
    }

    /// File-backed service with several pooled connections, so requests
    /// really run side by side. Keep the directory alive for the test.
    async fn file_service() -> (InvoiceNumberService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("invoices.db")).max_connections(5);
        let db = Database::new(config).await.unwrap();
        (InvoiceNumberService::new(db), dir)
    }

    /// Inserts a settings row for the 2024-25 financial year, adjusted by `edit`.
    async fn seed(service: &InvoiceNumberService, edit: impl FnOnce(&mut InvoiceSettings)) {
        let mut row = InvoiceSettings::defaults("settings-1", date(2024, 6, 1), Utc::now()).unwrap();
        edit(&mut row);
        service.database().settings().insert(&row).await.unwrap();
    }

    async fn stored_sequence(service: &InvoiceNumberService, fy: &str) -> Option<i64> {
        service
            .database()
            .sequences()
            .find(fy)
            .await
            .unwrap()
            .map(|row| row.current_sequence_no)
    }

    #[tokio::test]
    async fn test_first_invoice_of_new_year() {
        let service = service().await;
        seed(&service, |_| {}).await;

        let number = service
            .generate_invoice_number_on(GenerateOptions::issue(), date(2024, 6, 1))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(number.invoice_number, "INV-2024-25-0001");
        assert_eq!(number.financial_year, "2024-25");
        assert_eq!(number.sequence, "0001");
        assert_eq!(number.sequence_no, 1);
        assert_eq!(number.next_sequence_no, 2);
        assert_eq!(stored_sequence(&service, "2024-25").await, Some(2));
    }

    #[tokio::test]
    async fn test_consecutive_issues_are_strictly_increasing() {
        let service = service().await;
        seed(&service, |_| {}).await;

        let mut consumed = Vec::new();
        for _ in 0..5 {
            let number = service
                .next_invoice_number_on(date(2024, 6, 1))
                .await
                .unwrap();
            consumed.push(number.sequence_no);
        }

        assert_eq!(consumed, vec![1, 2, 3, 4, 5]);
        assert_eq!(stored_sequence(&service, "2024-25").await, Some(6));
    }

    #[tokio::test]
    async fn test_preview_never_writes() {
        let service = service().await;
        seed(&service, |_| {}).await;
        let today = date(2024, 6, 1);

        let first = service
            .generate_invoice_number_on(GenerateOptions::preview(), today)
            .await
            .unwrap()
            .unwrap();
        let second = service
            .generate_invoice_number_on(GenerateOptions::preview(), today)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.invoice_number, "INV-2024-25-0001");
        assert_eq!(service.database().sequences().count().await.unwrap(), 0);

        service.next_invoice_number_on(today).await.unwrap();

        let after_issue = service
            .generate_invoice_number_on(GenerateOptions::preview(), today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_issue.sequence_no, 2);
        assert_eq!(after_issue.next_sequence_no, 3);
        assert_eq!(stored_sequence(&service, "2024-25").await, Some(2));
    }

    #[tokio::test]
    async fn test_rollover_is_persisted() {
        let service = service().await;
        seed(&service, |s| {
            s.financial_year_start = date(2023, 4, 1);
            s.financial_year_end = date(2024, 3, 31);
        })
        .await;

        let number = service
            .next_invoice_number_on(date(2025, 6, 1))
            .await
            .unwrap();
        assert_eq!(number.financial_year, "2025-26");
        assert_eq!(number.invoice_number, "INV-2025-26-0001");

        let stored = service.database().settings().first().await.unwrap().unwrap();
        assert_eq!(stored.financial_year_start, date(2025, 4, 1));
        assert_eq!(stored.financial_year_end, date(2026, 3, 31));
    }

    #[tokio::test]
    async fn test_preview_also_advances_expired_window() {
        let service = service().await;
        seed(&service, |s| {
            s.financial_year_start = date(2023, 4, 1);
            s.financial_year_end = date(2024, 3, 31);
        })
        .await;

        let preview = service
            .generate_invoice_number_on(GenerateOptions::preview(), date(2024, 4, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(preview.financial_year, "2024-25");

        let stored = service.database().settings().first().await.unwrap().unwrap();
        assert_eq!(stored.financial_year_start, date(2024, 4, 1));
        assert_eq!(service.database().sequences().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_manual_label_takes_precedence() {
        let service = service().await;
        seed(&service, |s| {
            s.auto_financial_year = false;
            s.manual_financial_year = Some("FY24".to_string());
            s.financial_year_start = date(2019, 4, 1);
            s.financial_year_end = date(2020, 3, 31);
        })
        .await;

        let number = service
            .next_invoice_number_on(date(2025, 6, 1))
            .await
            .unwrap();
        assert_eq!(number.invoice_number, "INV-FY24-0001");
        assert_eq!(stored_sequence(&service, "FY24").await, Some(2));

        let stored = service.database().settings().first().await.unwrap().unwrap();
        assert_eq!(stored.financial_year_start, date(2019, 4, 1));
    }

    #[tokio::test]
    async fn test_inactive_settings_return_none() {
        let service = service().await;
        seed(&service, |s| s.is_active = false).await;

        let result = service
            .generate_invoice_number_on(GenerateOptions::issue(), date(2024, 6, 1))
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(service.database().sequences().count().await.unwrap(), 0);

        let err = service
            .next_invoice_number_on(date(2024, 6, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::NotConfigured));
    }

    #[tokio::test]
    async fn test_missing_settings_return_none_without_creating() {
        let service = service().await;

        let result = service
            .generate_invoice_number_on(GenerateOptions::issue(), date(2024, 6, 1))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(service.database().settings().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_window_returns_none() {
        let service = service().await;
        seed(&service, |_| {}).await;
        sqlx::query("UPDATE invoice_settings SET financial_year_end = financial_year_start")
            .execute(service.database().pool())
            .await
            .unwrap();

        let result = service
            .generate_invoice_number_on(GenerateOptions::issue(), date(2024, 6, 1))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(service.database().sequences().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_settings_creates_defaults_once() {
        let service = service().await;
        let today = date(2025, 2, 10);

        let first = service.get_settings_on(today).await.unwrap();
        assert_eq!(first.settings.invoice_prefix, "INV");
        assert_eq!(first.settings.financial_year_start, date(2024, 4, 1));
        assert_eq!(first.preview.invoice_number, "INV-2024-25-0001");

        let second = service.get_settings_on(today).await.unwrap();
        assert_eq!(first.settings.id, second.settings.id);
        assert_eq!(service.database().settings().count().await.unwrap(), 1);
        assert_eq!(service.database().sequences().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_settings_rejects_before_writing() {
        let service = service().await;

        let update = InvoiceSettingsUpdate {
            invoice_prefix: Some("   ".to_string()),
            invoice_sequence_length: Some(4),
            financial_year_start: Some("2024-04-01".to_string()),
            financial_year_end: Some("2025-03-31".to_string()),
            ..Default::default()
        };

        let err = service
            .update_settings_on(&update, date(2024, 6, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::Validation(_)));
        assert_eq!(service.database().settings().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_settings_upserts() {
        let service = service().await;
        let today = date(2024, 6, 1);

        let mut update = InvoiceSettingsUpdate {
            invoice_prefix: Some(" bill ".to_string()),
            invoice_sequence_length: Some(6),
            financial_year_start: Some("2024-04-01".to_string()),
            financial_year_end: Some("2025-03-31T00:00:00Z".to_string()),
            invoice_format: Some("[PREFIX]/[FY]/[SEQ]".to_string()),
            ..Default::default()
        };

        let created = service.update_settings_on(&update, today).await.unwrap();
        assert_eq!(created.settings.invoice_prefix, "BILL");
        assert_eq!(created.preview.invoice_number, "BILL/2024-25/000001");

        update.invoice_sequence_length = Some(3);
        let updated = service.update_settings_on(&update, today).await.unwrap();
        assert_eq!(updated.settings.id, created.settings.id);
        assert_eq!(updated.preview.invoice_number, "BILL/2024-25/001");
        assert_eq!(service.database().settings().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_falls_back_to_increment_on_conflict() {
        let service = service().await;
        let now = Utc::now();
        let mut conn = service.database().pool().acquire().await.unwrap();

        sequence::create_first(&mut conn, "2024-25", now).await.unwrap();

        // Caller saw no row, but one was created in the meantime.
        let allocation = claim_sequence(&mut conn, "2024-25", false, now).await.unwrap();

        assert_eq!(allocation, SequenceAllocation { consumed: 2, next: 3 });
        let stored = sequence::find(&mut conn, "2024-25").await.unwrap().unwrap();
        assert_eq!(stored.current_sequence_no, 3);
    }

    #[tokio::test]
    async fn test_claim_without_row_is_conflict() {
        let service = service().await;
        let mut conn = service.database().pool().acquire().await.unwrap();

        let err = claim_sequence(&mut conn, "2024-25", true, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, InvoiceError::ConcurrencyConflict { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issues_are_distinct() {
        let (service, _dir) = file_service().await;
        seed(&service, |_| {}).await;

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.next_invoice_number_on(date(2024, 6, 1)).await })
            })
            .collect();

        let mut consumed = HashSet::new();
        for handle in handles {
            let number = handle.await.unwrap().unwrap();
            assert!(consumed.insert(number.sequence_no), "duplicate {}", number.sequence_no);
        }

        assert_eq!(consumed, (1..=20).collect::<HashSet<i64>>());
        assert_eq!(stored_sequence(&service, "2024-25").await, Some(21));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_issue_after_rollover() {
        let (service, _dir) = file_service().await;
        seed(&service, |s| {
            s.financial_year_start = date(2023, 4, 1);
            s.financial_year_end = date(2024, 3, 31);
        })
        .await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.next_invoice_number_on(date(2025, 6, 1)).await })
            })
            .collect();

        let mut consumed = HashSet::new();
        for handle in handles {
            let number = handle.await.unwrap().unwrap();
            assert_eq!(number.financial_year, "2025-26");
            consumed.insert(number.sequence_no);
        }

        assert_eq!(consumed, (1..=10).collect::<HashSet<i64>>());
        assert_eq!(stored_sequence(&service, "2025-26").await, Some(11));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_get_settings_creates_one_row() {
        let (service, _dir) = file_service().await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.get_settings_on(date(2024, 6, 1)).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap().settings.id);
        }

        assert_eq!(ids.len(), 1);
        assert_eq!(service.database().settings().count().await.unwrap(), 1);
    }
}
