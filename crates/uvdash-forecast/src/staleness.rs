use chrono::{DateTime, Duration, Utc};

use crate::types::RefreshWatermark;

pub const DEFAULT_STALE_AFTER_HOURS: i64 = 24;
pub const DEFAULT_FORCED_REFRESH_HOUR: u32 = 4;

/// Decides whether the cached series has to be fetched again.
///
/// Data goes stale once it is older than `max_age`, and every day during
/// `forced_refresh_hour` (local time) so the next day's forecast gets picked
/// up even when the last fetch was recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub max_age: Duration,
    pub forced_refresh_hour: Option<u32>,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(DEFAULT_STALE_AFTER_HOURS),
            forced_refresh_hour: Some(DEFAULT_FORCED_REFRESH_HOUR),
        }
    }
}

impl StalenessPolicy {
    pub fn new(max_age_hours: i64, forced_refresh_hour: Option<u32>) -> Self {
        Self {
            max_age: Duration::hours(max_age_hours),
            forced_refresh_hour,
        }
    }

    /// Evaluate against the current instant and local hour. Not cached:
    /// the answer changes as the clock moves.
    pub fn is_stale(&self, watermark: RefreshWatermark, now: DateTime<Utc>, local_hour: u32) -> bool {
        let RefreshWatermark::At(last) = watermark else {
            return true;
        };
        now.signed_duration_since(last) > self.max_age
            || self.forced_refresh_hour == Some(local_hour)
    }
}
