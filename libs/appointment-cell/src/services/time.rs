use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, Timelike};

use crate::models::AppointmentError;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub const SLOT_FORMAT: &str = "%H:%M";
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:00";

pub fn clinic_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Parse a client supplied booking time. Offsets are converted to clinic local time.
pub fn parse_date_time(raw: &str) -> Result<NaiveDateTime, AppointmentError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppointmentError::InvalidTime("dateTime is required".to_string()));
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(normalize_to_minute(with_offset.with_timezone(&Local).naive_local()));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(normalize_to_minute)
        .ok_or_else(|| AppointmentError::InvalidTime(format!("Unrecognized dateTime: {}", raw)))
}

/// Stored timestamps. `None` when the value cannot be read.
pub fn parse_stored(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

pub fn normalize_to_minute(value: NaiveDateTime) -> NaiveDateTime {
    value
        .with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .unwrap_or(value)
}

/// `requested` must lie after `now`, give or take the configured skew.
pub fn ensure_future(
    requested: NaiveDateTime,
    now: NaiveDateTime,
    skew_seconds: i64,
) -> Result<(), AppointmentError> {
    if requested > now - Duration::seconds(skew_seconds.max(0)) {
        Ok(())
    } else {
        Err(AppointmentError::InvalidTime(
            "dateTime must be in the future".to_string(),
        ))
    }
}

pub fn format_for_storage(value: NaiveDateTime) -> String {
    value.format(STORAGE_FORMAT).to_string()
}

pub fn parse_day(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppointmentError::ValidationError(format!("Invalid date {}, expected YYYY-MM-DD", raw))
    })
}

/// Inclusive `[00:00:00, 23:59:59]` bounds of a day as storage strings.
pub fn day_bounds(day: NaiveDate) -> (String, String) {
    (
        format!("{}T00:00:00", day.format("%Y-%m-%d")),
        format!("{}T23:59:59", day.format("%Y-%m-%d")),
    )
}
