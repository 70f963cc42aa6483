//! Parsing of the EPA feed's `Mon/DD/YYYY HH AM|PM` date strings.
//!
//! The feed carries no zone information, so readings are kept as local
//! wall-clock values and only mapped onto the epoch at the edges.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::types::MalformedTimestamp;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parse a vendor date string such as `Sep/10/2024 07 AM`.
///
/// Minutes and seconds are always zero. `12 AM` is midnight and `12 PM` is
/// noon.
///
/// # Errors
///
/// Returns [`MalformedTimestamp`] when the string does not follow the
/// pattern or names a day that does not exist.
pub fn parse_vendor_timestamp(input: &str) -> Result<NaiveDateTime, MalformedTimestamp> {
    let malformed = |reason| MalformedTimestamp {
        input: input.to_string(),
        reason,
    };

    let mut parts = input.split_whitespace();
    let (Some(date), Some(hour), Some(period), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("expected `Mon/DD/YYYY HH AM|PM`"));
    };

    let mut date_parts = date.split('/');
    let (Some(month), Some(day), Some(year), None) = (
        date_parts.next(),
        date_parts.next(),
        date_parts.next(),
        date_parts.next(),
    ) else {
        return Err(malformed("date must be `Mon/DD/YYYY`"));
    };

    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month))
        .ok_or_else(|| malformed("unknown month abbreviation"))?;
    let day: u32 = parse_digits(day).ok_or_else(|| malformed("day is not a number"))?;
    let year: i32 = parse_digits(year).ok_or_else(|| malformed("year is not a number"))?;
    let hour: u32 = parse_digits(hour).ok_or_else(|| malformed("hour is not a number"))?;

    if !(1..=12).contains(&hour) {
        return Err(malformed("hour must be between 1 and 12"));
    }
    let pm = if period.eq_ignore_ascii_case("PM") {
        true
    } else if period.eq_ignore_ascii_case("AM") {
        false
    } else {
        return Err(malformed("period must be AM or PM"));
    };
    let hour_of_day = (hour % 12) + if pm { 12 } else { 0 };

    NaiveDate::from_ymd_opt(year, month as u32 + 1, day)
        .and_then(|d| d.and_hms_opt(hour_of_day, 0, 0))
        .ok_or_else(|| malformed("day out of range for month"))
}

fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Map a local wall-clock reading onto the epoch.
///
/// Ambiguous readings (clocks falling back) take the earlier instant;
/// readings inside a spring-forward gap are pushed past the gap.
pub fn local_timestamp_millis(wall: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&wall)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(wall + chrono::Duration::hours(1)))
                .earliest()
        })
        .map_or_else(|| wall.and_utc().timestamp_millis(), |dt| dt.timestamp_millis())
}

/// Serde adapter writing wall-clock readings as local epoch milliseconds.
pub mod local_millis {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(wall: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(local_timestamp_millis(*wall))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        use serde::de::Error;

        let millis = i64::deserialize(d)?;
        DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.with_timezone(&Local).naive_local())
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", millis)))
    }
}
