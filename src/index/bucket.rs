//! Local-time bucketing for monthly indices.
//!
//! All math is done in the local timezone so index rollovers line up with
//! the operator's wall clock. "Today" is normalised to local midnight by
//! formatting the instant as a date and parsing it back, and offsets are
//! whole 24h days: three months ago is exactly 90 days ago.

use chrono::{DateTime, Local, NaiveDate, TimeZone};

pub const SECONDS_PER_DAY: i64 = 3600 * 24;
pub const MILLIS_PER_DAY: i64 = SECONDS_PER_DAY * 1000;

/// Days per "month" when converting a retention window into an offset.
pub const DAYS_PER_MONTH: i64 = 30;

const DATE_FORMAT: &str = "%Y-%m-%d";
const BUCKET_FORMAT: &str = "%Y%m";

/// Formats an epoch-seconds timestamp as a local `YYYY-MM-DD` date.
/// Returns an empty string for non-positive input.
pub fn current_local_date(timestamp_secs: i64) -> String {
    if timestamp_secs <= 0 {
        return String::new();
    }

    match Local.timestamp_opt(timestamp_secs, 0).earliest() {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => String::new(),
    }
}

/// Parses a `YYYY-MM-DD` date as local midnight, in epoch seconds.
///
/// Empty or unparseable input yields 0, which callers treat as unknown.
pub fn parse_local_date(date: &str) -> i64 {
    if date.is_empty() {
        return 0;
    }

    let Ok(day) = NaiveDate::parse_from_str(date, DATE_FORMAT) else {
        return 0;
    };
    let Some(midnight) = day.and_hms_opt(0, 0, 0) else {
        return 0;
    };

    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

/// Local midnight of today plus `offset_days`, in epoch milliseconds.
pub fn natural_day_offset(offset_days: i64) -> i64 {
    natural_day_offset_at(Local::now(), offset_days)
}

/// Same as [`natural_day_offset`] with an explicit notion of "now".
pub fn natural_day_offset_at(now: DateTime<Local>, offset_days: i64) -> i64 {
    let date = current_local_date(now.timestamp());
    let base_ms = parse_local_date(&date) * 1000;

    base_ms.saturating_add(MILLIS_PER_DAY.saturating_mul(offset_days))
}

/// Formats an epoch-milliseconds timestamp as a local `YYYYMM` bucket.
/// Returns `"-"` when the timestamp is not positive.
pub fn year_month_bucket(epoch_ms: i64) -> String {
    let secs = epoch_ms / 1000;
    if secs <= 0 {
        return "-".to_string();
    }

    match Local.timestamp_opt(secs, 0).earliest() {
        Some(dt) => dt.format(BUCKET_FORMAT).to_string(),
        None => "-".to_string(),
    }
}

/// Full index name for the bucket containing `epoch_ms`.
pub fn index_name(prefix: &str, epoch_ms: i64) -> String {
    format!("{}{}", prefix, year_month_bucket(epoch_ms))
}

/// Index name for the month `months_before` × 30 days before `now`.
pub fn index_name_months_before(prefix: &str, now: DateTime<Local>, months_before: i64) -> String {
    index_name(prefix, natural_day_offset_at(now, months_before.saturating_mul(DAYS_PER_MONTH).saturating_neg()))
}
