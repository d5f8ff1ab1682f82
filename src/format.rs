//! Display helpers shared by receipts, exports and the monthly log.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};

/// Canonical storage shape for a gift date.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";
/// Shape used on receipts and spreadsheet rows.
pub const DISPLAY_DATE_FORMAT: &str = "%m/%d/%Y";

/// Render a phone number as `(AAA) BBB-CCCC` when it holds exactly ten digits.
///
/// Anything else comes back untouched so a malformed number is never padded or cut.
pub fn format_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 10 {
        return raw.to_string();
    }
    format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10])
}

/// Strip separators from a phone number, keeping digits only.
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Parse either `YYYY-MM-DD` or a full timestamp into a calendar date.
///
/// Timestamps keep the date written in them: the offset is never applied, so
/// `2024-03-05T23:30:00-05:00` and `2024-03-05T10:00:00.000Z` both give 2024-03-05.
pub fn normalize_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, CANONICAL_DATE_FORMAT) {
        return Some(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_local().date());
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(dt.date());
        }
    }

    None
}

pub fn display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

/// `$` plus two fixed decimals; a missing value renders as `$0.00`.
pub fn format_currency(value: Option<Decimal>) -> String {
    let value = value.unwrap_or(Decimal::ZERO);
    format!("${:.2}", round_cents(value))
}

/// Half-up rounding to whole cents, used wherever money is shown.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Public receipt number, e.g. `MSC-0042`.
pub fn receipt_id(id: i64) -> String {
    format!("MSC-{:04}", id)
}
