use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};

// NaiveDate/Time construction can panic if given invalid values, but 1601-01-01 00:00:00 is valid.
const WINDOWS_EPOCH_NAIVE: NaiveDateTime = match NaiveDate::from_ymd_opt(1601, 1, 1) {
    Some(date) => match date.and_hms_opt(0, 0, 0) {
        Some(datetime) => datetime,
        None => panic!("Invalid time component for Windows epoch constant"),
    },
    None => panic!("Invalid date component for Windows epoch constant"),
};
const WINDOWS_EPOCH_UTC: DateTime<Utc> =
    DateTime::<Utc>::from_naive_utc_and_offset(WINDOWS_EPOCH_NAIVE, Utc);

const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Converts a Windows FILETIME (100-nanosecond intervals since 1601-01-01 UTC)
/// to a UTC calendar time, truncated to whole milliseconds.
///
/// Returns `None` for negative tick counts, which FILETIME cannot represent.
pub(crate) fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime < 0 {
        return None;
    }

    let millis = filetime / TICKS_PER_MILLISECOND;
    let since_epoch = ChronoDuration::try_milliseconds(millis)?;
    WINDOWS_EPOCH_UTC.checked_add_signed(since_epoch)
}
