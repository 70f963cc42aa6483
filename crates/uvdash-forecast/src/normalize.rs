//! Raw feed records to canonical data points.

use serde::{Deserialize, Serialize};

use crate::timestamp::parse_vendor_timestamp;
use crate::types::{CanonicalDataPoint, MalformedTimestamp, RawDataPoint};

/// What to do with a record whose timestamp cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRecordPolicy {
    /// Fail the whole batch
    #[default]
    Abort,
    /// Drop the record and keep going
    Skip,
}

/// Convert one record. Every field other than the timestamp passes through.
///
/// # Errors
///
/// Returns [`MalformedTimestamp`] when `DATE_TIME` does not parse.
pub fn normalize_record(raw: RawDataPoint) -> Result<CanonicalDataPoint, MalformedTimestamp> {
    let date_time = parse_vendor_timestamp(&raw.date_time)?;
    Ok(CanonicalDataPoint {
        order: raw.order,
        zip: raw.zip,
        city: raw.city,
        state: raw.state,
        date_time,
        uv_value: raw.uv_value,
    })
}

/// Convert a batch in input order. No sorting, deduplication or filtering
/// happens here beyond what `policy` asks for on malformed records.
///
/// # Errors
///
/// Under [`MalformedRecordPolicy::Abort`], returns the first
/// [`MalformedTimestamp`] encountered.
pub fn normalize(
    raw: Vec<RawDataPoint>,
    policy: MalformedRecordPolicy,
) -> Result<Vec<CanonicalDataPoint>, MalformedTimestamp> {
    let mut points = Vec::with_capacity(raw.len());
    for record in raw {
        let order = record.order;
        match normalize_record(record) {
            Ok(point) => points.push(point),
            Err(e) if policy == MalformedRecordPolicy::Skip => {
                tracing::warn!(?order, "Skipping UV record: {}", e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::Timelike;

    fn raw(order: u32, date_time: &str, uv: f64) -> RawDataPoint {
        RawDataPoint {
            order: Some(order),
            zip: "10065".to_string(),
            city: "NEW YORK".to_string(),
            state: "NY".to_string(),
            date_time: date_time.to_string(),
            uv_value: uv,
        }
    }

    #[test]
    fn test_normalize_record_passes_fields_through() {
        let point = normalize_record(raw(4, "Sep/10/2024 01 PM", 6.5)).unwrap();
        assert_eq!(point.order, Some(4));
        assert_eq!(point.zip, "10065");
        assert_eq!(point.city, "NEW YORK");
        assert_eq!(point.state, "NY");
        assert_eq!(point.date_time.hour(), 13);
        assert_eq!(point.uv_value, 6.5);
    }

    #[test]
    fn test_normalize_keeps_length_and_order() {
        let input = vec![
            raw(1, "Jan/1/2024 07 AM", 3.0),
            raw(2, "Jan/1/2024 06 AM", 5.0),
            raw(3, "Jan/1/2024 08 AM", 4.0),
        ];
        let points = normalize(input, MalformedRecordPolicy::Abort).unwrap();

        assert_eq!(points.len(), 3);
        let hours: Vec<u32> = points.iter().map(|p| p.date_time.hour()).collect();
        assert_eq!(hours, vec![7, 6, 8]);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(vec![], MalformedRecordPolicy::Abort).unwrap().is_empty());
    }

    #[test]
    fn test_abort_policy_fails_batch() {
        let input = vec![raw(1, "Jan/1/2024 07 AM", 3.0), raw(2, "garbage", 5.0)];
        let err = normalize(input, MalformedRecordPolicy::Abort).unwrap_err();
        assert_eq!(err.input, "garbage");
    }

    #[test]
    fn test_skip_policy_drops_bad_records() {
        let input = vec![
            raw(1, "Jan/1/2024 07 AM", 3.0),
            raw(2, "garbage", 5.0),
            raw(3, "Jan/1/2024 08 AM", 4.0),
        ];
        let points = normalize(input, MalformedRecordPolicy::Skip).unwrap();
        let orders: Vec<_> = points.iter().map(|p| p.order).collect();
        assert_eq!(orders, vec![Some(1), Some(3)]);
    }

    #[test]
    fn test_canonical_keys_are_camel_cased() {
        let point = normalize_record(raw(1, "Jan/1/2024 07 AM", 3.0)).unwrap();
        let json = serde_json::to_value(&point).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["city", "dateTime", "order", "state", "uvValue", "zip"]);
        assert!(json["dateTime"].is_i64());
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        let policy: MalformedRecordPolicy = serde_json::from_str("\"skip\"").unwrap();
        assert_eq!(policy, MalformedRecordPolicy::Skip);
    }
}
