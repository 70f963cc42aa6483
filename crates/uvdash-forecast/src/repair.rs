//! Repair of out-of-order feed data.
//!
//! The EPA feed has been seen serving hours out of sequence. Records are
//! sorted, then a single forward pass drops anything earlier than the last
//! record it kept. The pass never looks ahead, so it can keep fewer records
//! than the longest ordered subsequence would.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{CanonicalDataPoint, Series};

/// Key used to order records before the forward pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Sort on the parsed timestamp
    #[default]
    Instant,
    /// Sort on the feed's `ORDER` field; records without one sort first
    Ordinal,
}

/// Sort `points` (stable) and drop every record whose timestamp is earlier
/// than the last one kept. Each dropped record is logged.
pub fn repair(mut points: Vec<CanonicalDataPoint>, key: SortKey) -> Series {
    match key {
        SortKey::Instant => points.sort_by_key(|p| p.date_time),
        SortKey::Ordinal => points.sort_by_key(|p| p.order),
    }

    let mut last_kept: Option<NaiveDateTime> = None;
    points.retain(|p| match last_kept {
        Some(last) if p.date_time < last => {
            tracing::warn!(
                order = ?p.order,
                date_time = %p.date_time,
                last_kept = %last,
                "UV data point found out of order, dropping"
            );
            false
        }
        _ => {
            last_kept = Some(p.date_time);
            true
        }
    });

    Series::from_ordered(points)
}
