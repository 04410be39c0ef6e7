use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

const DEFAULT_OFFSET_HOURS: i32 = 9;

/// Local offset for all calendar decisions (investment days, first-analysis-
/// of-the-day checks). Defaults to KST (UTC+9); override via
/// TIMEZONE_OFFSET_HOURS.
pub fn local_offset() -> FixedOffset {
    let hours = std::env::var("TIMEZONE_OFFSET_HOURS")
        .ok()
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(DEFAULT_OFFSET_HOURS);

    FixedOffset::east_opt(hours * 3600)
        .or_else(|| FixedOffset::east_opt(DEFAULT_OFFSET_HOURS * 3600))
        .expect("default UTC offset is valid")
}

pub fn kst_now(now_utc: DateTime<Utc>) -> DateTime<FixedOffset> {
    now_utc.with_timezone(&local_offset())
}

pub fn kst_date(at: DateTime<Utc>) -> NaiveDate {
    kst_now(at).date_naive()
}

/// Weekday index with Monday=0 .. Sunday=6, matching the stored `day`
/// values for weekly settings.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}
