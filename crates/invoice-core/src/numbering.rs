//! # Numbering
//!
//! Sequence padding, template rendering and the allocation arithmetic
//! behind `current_sequence_no`.
//!
//! ## Counter Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stored current_sequence_no = the NEXT number to hand out              │
//! │                                                                         │
//! │  no row, issue     → insert 2          consumed 1, next 2               │
//! │  row = 5, issue    → UPDATE +1 → 6     consumed 5, next 6               │
//! │  row = 5, preview  → (no write)        shown 5,    next 6               │
//! │  no row, preview   → (no write)        shown 1,    next 2               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Templates
//! Placeholders are `PREFIX`, `FY` and `SEQ`, wrapped in `{}` or `[]` and
//! matched case-insensitively. Anything else is copied through untouched.

use crate::FIRST_SEQUENCE_NO;

// =============================================================================
// Allocation
// =============================================================================

/// The sequence number a request uses and the one after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceAllocation {
    /// Number consumed by this request (or displayed, for previews).
    pub consumed: i64,
    /// Number the following increment will hand out.
    pub next: i64,
}

impl SequenceAllocation {
    /// First issue in a financial year with no counter row yet.
    pub const fn first() -> Self {
        SequenceAllocation {
            consumed: FIRST_SEQUENCE_NO,
            next: FIRST_SEQUENCE_NO + 1,
        }
    }

    /// Issue after an atomic `+1`; `updated` is the post-increment value.
    pub const fn after_increment(updated: i64) -> Self {
        SequenceAllocation {
            consumed: updated - 1,
            next: updated,
        }
    }

    /// Non-consuming view of the counter. `stored` is `None` when no row
    /// exists for the financial year.
    pub fn preview(stored: Option<i64>) -> Self {
        let current = stored.unwrap_or(FIRST_SEQUENCE_NO);
        SequenceAllocation {
            consumed: current,
            next: current + 1,
        }
    }

    /// Value to store when creating the counter row for `first()`.
    pub const fn initial_stored_value() -> i64 {
        FIRST_SEQUENCE_NO + 1
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Zero-pads `value` to `width` digits.
///
/// Values wider than `width` are rendered in full.
///
/// ```rust
/// use invoice_core::numbering::pad_sequence;
///
/// assert_eq!(pad_sequence(7, 4), "0007");
/// assert_eq!(pad_sequence(12345, 4), "12345");
/// ```
pub fn pad_sequence(value: i64, width: u32) -> String {
    format!("{:0>width$}", value, width = width as usize)
}

#[derive(Debug, Clone, Copy)]
enum Placeholder {
    Prefix,
    FinancialYear,
    Sequence,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("PREFIX") {
            Some(Placeholder::Prefix)
        } else if name.eq_ignore_ascii_case("FY") {
            Some(Placeholder::FinancialYear)
        } else if name.eq_ignore_ascii_case("SEQ") {
            Some(Placeholder::Sequence)
        } else {
            None
        }
    }
}

/// Renders an invoice-number template.
///
/// ```rust
/// use invoice_core::numbering::render_invoice_number;
///
/// let n = render_invoice_number("{PREFIX}-{FY}-{SEQ}", "INV", "2024-25", "0001");
/// assert_eq!(n, "INV-2024-25-0001");
/// ```
pub fn render_invoice_number(
    format: &str,
    prefix: &str,
    financial_year: &str,
    sequence: &str,
) -> String {
    let mut out = String::with_capacity(format.len() + sequence.len() + prefix.len());
    let mut rest = format;

    while let Some(pos) = rest.find(|c| c == '{' || c == '[') {
        out.push_str(&rest[..pos]);

        let open = if rest[pos..].starts_with('{') { '{' } else { '[' };
        let close = if open == '{' { '}' } else { ']' };
        let after = &rest[pos + 1..];

        let substituted = after.find(close).and_then(|end| {
            Placeholder::parse(&after[..end]).map(|placeholder| (placeholder, end))
        });

        match substituted {
            Some((placeholder, end)) => {
                out.push_str(match placeholder {
                    Placeholder::Prefix => prefix,
                    Placeholder::FinancialYear => financial_year,
                    Placeholder::Sequence => sequence,
                });
                rest = &after[end + 1..];
            }
            None => {
                out.push(open);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
