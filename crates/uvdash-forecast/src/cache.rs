//! In-memory holder for the latest good series. Nothing is persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::types::{RefreshWatermark, Series, SunTimes};

#[derive(Debug, Default)]
pub struct SeriesCache {
    series: Arc<Series>,
    series_postal_code: Option<String>,
    watermark: RefreshWatermark,
    sun_times: Option<SunTimes>,
    sun_times_postal_code: Option<String>,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly repaired series and move the watermark.
    pub fn replace(&mut self, series: Series, postal_code: String, at: DateTime<Utc>) {
        self.series = Arc::new(series);
        self.series_postal_code = Some(postal_code);
        self.watermark = RefreshWatermark::At(at);
    }

    pub fn set_sun_times(&mut self, times: SunTimes, postal_code: String) {
        self.sun_times = Some(times);
        self.sun_times_postal_code = Some(postal_code);
    }

    pub fn series(&self) -> Arc<Series> {
        Arc::clone(&self.series)
    }

    pub fn watermark(&self) -> RefreshWatermark {
        self.watermark
    }

    pub fn sun_times(&self) -> Option<SunTimes> {
        self.sun_times
    }

    pub fn series_postal_code(&self) -> Option<&str> {
        self.series_postal_code.as_deref()
    }

    pub fn sun_times_postal_code(&self) -> Option<&str> {
        self.sun_times_postal_code.as_deref()
    }
}

/// Read-only view handed to presentation
#[derive(Debug, Clone)]
pub struct RefreshSnapshot {
    /// Postal code the refresher is currently tracking
    pub postal_code: String,
    /// Postal code the held series was fetched for
    pub series_postal_code: Option<String>,
    pub series: Arc<Series>,
    pub watermark: RefreshWatermark,
    pub sun_times: Option<SunTimes>,
    /// Postal code the held sun times were fetched for
    pub sun_times_postal_code: Option<String>,
    pub fetching: bool,
}

impl RefreshSnapshot {
    /// No series has ever been loaded
    pub fn is_pending(&self) -> bool {
        self.watermark == RefreshWatermark::Never
    }

    /// Held series belongs to a previous postal code
    pub fn is_outdated_location(&self) -> bool {
        self.series_postal_code
            .as_deref()
            .is_some_and(|code| code != self.postal_code)
    }

    /// Held sun times belong to a previous postal code
    pub fn is_outdated_sun_times(&self) -> bool {
        self.sun_times_postal_code
            .as_deref()
            .is_some_and(|code| code != self.postal_code)
    }

    /// Sun times for the tracked postal code, if any have been fetched
    pub fn current_sun_times(&self) -> Option<SunTimes> {
        self.sun_times.filter(|_| !self.is_outdated_sun_times())
    }
}
