//! # Financial Year
//!
//! Financial-year windows, their labels, and the rollover rule.
//!
//! ## Rollover
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stored window: 2023-04-01 .. 2024-03-31     today: 2025-06-01          │
//! │                                                                         │
//! │  today > end?  yes → 2024-04-01 .. 2025-03-31   (step 1)               │
//! │  today > end?  yes → 2025-04-01 .. 2026-03-31   (step 2)               │
//! │  today > end?  no  → stop, label "2025-26"                             │
//! │                                                                         │
//! │  The service persists the window (advance_financial_year_if_expired)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dates are compared by calendar day: the end date itself is still inside
//! the period.

use chrono::{Datelike, Months, NaiveDate};

use crate::error::{CoreError, CoreResult};
use crate::types::InvoiceSettings;
use crate::FINANCIAL_YEAR_START_MONTH;

/// An inclusive `[start, end]` financial-year window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinancialYear {
    start: NaiveDate,
    end: NaiveDate,
}

impl FinancialYear {
    /// Creates a window. `end` must come after `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if end <= start {
            return Err(CoreError::InvalidFinancialYear {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        Ok(FinancialYear { start, end })
    }

    /// The April 1 – March 31 window that contains `today`.
    pub fn containing(today: NaiveDate) -> CoreResult<Self> {
        let year = if today.month() >= FINANCIAL_YEAR_START_MONTH {
            today.year()
        } else {
            today.year() - 1
        };

        let overflow = || CoreError::FinancialYearOverflow {
            start: year.to_string(),
        };

        let start =
            NaiveDate::from_ymd_opt(year, FINANCIAL_YEAR_START_MONTH, 1).ok_or_else(overflow)?;
        let end = start
            .checked_add_months(Months::new(12))
            .and_then(|d| d.pred_opt())
            .ok_or_else(overflow)?;

        FinancialYear::new(start, end)
    }

    #[inline]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[inline]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Label in the form `"{startYear}-{yy}"`, e.g. `"2024-25"`.
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.start.year(), self.end.year().rem_euclid(100))
    }

    /// True once `today` is past the last day of the window.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        today > self.end
    }

    /// The same window one calendar year later.
    pub fn next(&self) -> CoreResult<Self> {
        self.shifted(1)
    }

    /// Steps the window forward a year at a time until it covers `today`.
    ///
    /// Returns the resulting window and the number of steps taken (0 when
    /// the window has not expired).
    pub fn advance_until_covers(&self, today: NaiveDate) -> CoreResult<(Self, u32)> {
        let mut window = *self;
        let mut steps = 0;

        while window.is_expired(today) {
            steps += 1;
            window = self.shifted(steps)?;
        }

        Ok((window, steps))
    }

    /// True when the window is exactly twelve months long, ending the day
    /// before its start date comes round again.
    fn is_whole_year(&self) -> bool {
        self.start
            .checked_add_months(Months::new(12))
            .and_then(|d| d.pred_opt())
            == Some(self.end)
    }

    /// The window `years` years on, always shifted from `self` so that a
    /// Feb 29 clamped in one year comes back in the next leap year.
    ///
    /// A whole-year window keeps ending the day before the next start,
    /// whatever February looks like; any other window shifts its end date
    /// by the same number of months.
    fn shifted(&self, years: u32) -> CoreResult<Self> {
        let overflow = || CoreError::FinancialYearOverflow {
            start: self.start.to_string(),
        };
        let months = years.checked_mul(12).map(Months::new).ok_or_else(overflow)?;

        let start = self.start.checked_add_months(months).ok_or_else(overflow)?;
        let end = if self.is_whole_year() {
            start
                .checked_add_months(Months::new(12))
                .and_then(|d| d.pred_opt())
        } else {
            self.end.checked_add_months(months)
        }
        .ok_or_else(overflow)?;

        FinancialYear::new(start, end)
    }
}

/// Outcome of resolving the active financial year for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFinancialYear {
    /// Label used for the sequence row and the `{FY}` placeholder.
    pub label: String,
    /// Window after any rollover.
    pub window: FinancialYear,
    /// Yearly steps applied; non-zero means the window must be persisted.
    pub steps: u32,
}

impl ResolvedFinancialYear {
    pub fn rolled_over(&self) -> bool {
        self.steps > 0
    }
}

/// Resolves the financial-year label for `settings` as of `today`.
///
/// - Auto mode: the stored window is rolled forward until it covers
///   `today`; the label comes from the rolled window.
/// - Manual mode: a non-blank `manual_financial_year` wins verbatim;
///   otherwise the stored window's label is used as-is, with no rollover.
pub fn resolve_financial_year(
    settings: &InvoiceSettings,
    today: NaiveDate,
) -> CoreResult<ResolvedFinancialYear> {
    let stored = settings.financial_year()?;

    if settings.auto_financial_year {
        let (window, steps) = stored.advance_until_covers(today)?;
        return Ok(ResolvedFinancialYear {
            label: window.label(),
            window,
            steps,
        });
    }

    let label = settings
        .manual_financial_year
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| stored.label());

    Ok(ResolvedFinancialYear {
        label,
        window: stored,
        steps: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn settings(
        start: NaiveDate,
        end: NaiveDate,
        auto: bool,
        manual: Option<&str>,
    ) -> InvoiceSettings {
        let mut s = InvoiceSettings::defaults("id", start, Utc::now()).unwrap();
        s.financial_year_start = start;
        s.financial_year_end = end;
        s.auto_financial_year = auto;
        s.manual_financial_year = manual.map(str::to_string);
        s
    }

    #[test]
    fn test_label() {
        let fy = FinancialYear::new(date(2024, 4, 1), date(2025, 3, 31)).unwrap();
        assert_eq!(fy.label(), "2024-25");

        let fy = FinancialYear::new(date(2099, 4, 1), date(2100, 3, 31)).unwrap();
        assert_eq!(fy.label(), "2099-00");
    }

    #[test]
    fn test_rejects_inverted_window() {
        assert!(FinancialYear::new(date(2025, 4, 1), date(2024, 3, 31)).is_err());
        assert!(FinancialYear::new(date(2025, 4, 1), date(2025, 4, 1)).is_err());
    }

    #[test]
    fn test_end_date_is_inside_period() {
        let fy = FinancialYear::new(date(2024, 4, 1), date(2025, 3, 31)).unwrap();
        assert!(!fy.is_expired(date(2025, 3, 31)));
        assert!(fy.is_expired(date(2025, 4, 1)));
    }

    #[test]
    fn test_rollover_two_steps() {
        let s = settings(date(2023, 4, 1), date(2024, 3, 31), true, None);
        let resolved = resolve_financial_year(&s, date(2025, 6, 1)).unwrap();

        assert_eq!(resolved.steps, 2);
        assert!(resolved.rolled_over());
        assert_eq!(resolved.window.start(), date(2025, 4, 1));
        assert_eq!(resolved.window.end(), date(2026, 3, 31));
        assert_eq!(resolved.label, "2025-26");
    }

    #[test]
    fn test_no_rollover_inside_window() {
        let s = settings(date(2024, 4, 1), date(2025, 3, 31), true, None);
        let resolved = resolve_financial_year(&s, date(2024, 12, 1)).unwrap();

        assert_eq!(resolved.steps, 0);
        assert_eq!(resolved.label, "2024-25");
    }

    #[test]
    fn test_manual_label_wins() {
        let s = settings(date(2020, 4, 1), date(2021, 3, 31), false, Some("FY24"));
        let resolved = resolve_financial_year(&s, date(2025, 6, 1)).unwrap();

        assert_eq!(resolved.label, "FY24");
        assert!(!resolved.rolled_over());
    }

    #[test]
    fn test_manual_without_label_uses_stored_window() {
        let s = settings(date(2020, 4, 1), date(2021, 3, 31), false, Some("  "));
        let resolved = resolve_financial_year(&s, date(2025, 6, 1)).unwrap();

        assert_eq!(resolved.label, "2020-21");
        assert_eq!(resolved.window.start(), date(2020, 4, 1));
    }

    #[test]
    fn test_leap_day_clamps() {
        let fy = FinancialYear::new(date(2023, 3, 1), date(2024, 2, 29)).unwrap();
        let next = fy.next().unwrap();
        assert_eq!(next.start(), date(2024, 3, 1));
        assert_eq!(next.end(), date(2025, 2, 28));
    }

    #[test]
    fn test_leap_day_returns_in_next_leap_year() {
        let fy = FinancialYear::new(date(2023, 3, 1), date(2024, 2, 29)).unwrap();

        let (window, steps) = fy.advance_until_covers(date(2028, 2, 29)).unwrap();
        assert_eq!(steps, 4);
        assert_eq!(window.start(), date(2027, 3, 1));
        assert_eq!(window.end(), date(2028, 2, 29));
        assert_eq!(window.label(), "2027-28");

        // Starting from a clamped year gives the same answer.
        let clamped = FinancialYear::new(date(2024, 3, 1), date(2025, 2, 28)).unwrap();
        let (window, _) = clamped.advance_until_covers(date(2028, 2, 29)).unwrap();
        assert_eq!(window.end(), date(2028, 2, 29));
    }

    #[test]
    fn test_partial_window_shifts_end() {
        let fy = FinancialYear::new(date(2024, 4, 1), date(2024, 12, 31)).unwrap();
        let next = fy.next().unwrap();
        assert_eq!(next.start(), date(2025, 4, 1));
        assert_eq!(next.end(), date(2025, 12, 31));
    }

    #[test]
    fn test_containing_calendar_year_boundary() {
        let fy = FinancialYear::containing(date(2025, 3, 31)).unwrap();
        assert_eq!(fy.label(), "2024-25");

        let fy = FinancialYear::containing(date(2025, 4, 1)).unwrap();
        assert_eq!(fy.label(), "2025-26");
    }
}
