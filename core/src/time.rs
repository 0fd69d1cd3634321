//! Timestamp normalization for the vendor's mixed time encodings.
//!
//! Listing rows carry times as epoch seconds (JSON number or digit string)
//! or as local date text like `"2021-11-29 18:20"`. Formatted text is
//! interpreted at UTC+8, the vendor's timezone.

use chrono::{FixedOffset, NaiveDateTime};
use serde_json::Value;

const VENDOR_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Normalize a raw time value to epoch seconds.
///
/// Returns `None` when the value is absent from the recognized encodings;
/// callers decide whether the field was mandatory.
pub fn to_timestamp(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if s.bytes().all(|b| b.is_ascii_digit()) {
                return s.parse().ok();
            }
            let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
                .ok()?;
            let offset = FixedOffset::east_opt(VENDOR_UTC_OFFSET_SECS)?;
            Some(naive.and_local_timezone(offset).single()?.timestamp())
        }
        _ => None,
    }
}
