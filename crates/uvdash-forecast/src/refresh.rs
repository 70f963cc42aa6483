//! Refresh orchestration for the UV series.
//!
//! [`UvRefresher`] owns the latest good series and decides when the feed is
//! called again. Three things trigger a cycle:
//! - first activation
//! - a change of postal code
//! - a periodic check, which only fetches when [`StalenessPolicy`] says so
//!
//! A cycle fetches, normalizes and repairs. The cached series and watermark
//! change only when all three succeed; otherwise the previous data stays.
//!
//! Every postal code change bumps a generation counter. A cycle remembers
//! the generation it started under and its result is dropped if the
//! counter has moved on by the time it completes. At most one cycle per
//! generation is in flight; extra triggers while it runs are no-ops.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{RefreshSnapshot, SeriesCache};
use crate::clock::Clock;
use crate::normalize::{normalize, MalformedRecordPolicy};
use crate::provider::UvFeed;
use crate::repair::{repair, SortKey};
use crate::staleness::StalenessPolicy;
use crate::sun::SunTimesFetcher;
use crate::types::{FetchError, MalformedTimestamp, Series};

/// Knobs for a refresh cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshSettings {
    pub staleness: StalenessPolicy,
    pub malformed_records: MalformedRecordPolicy,
    pub sort_key: SortKey,
}

/// Why a cycle left the cached series alone
#[derive(Debug, thiserror::Error)]
enum RefreshError {
    #[error("UV feed failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Timestamp(#[from] MalformedTimestamp),
}

impl RefreshError {
    /// A later cycle may succeed without anything changing on our side
    fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Timestamp(_) => false,
        }
    }
}

/// What a trigger ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New series stored
    Applied { points: usize },
    /// Cycle failed; previous series kept
    Retained,
    /// A newer postal code took over while this cycle ran
    Superseded,
    /// Data is still fresh
    Fresh,
    /// A cycle for this generation is already running
    InFlight,
    /// Postal code did not change
    Unchanged,
}

#[derive(Debug)]
struct RefreshState {
    postal_code: String,
    generation: u64,
    in_flight: Option<u64>,
    cache: SeriesCache,
}

/// Clears the in-flight marker if the cycle future is dropped early.
struct InFlightGuard<'a> {
    state: &'a Mutex<RefreshState>,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.in_flight == Some(self.generation) {
            state.in_flight = None;
        }
    }
}

pub struct UvRefresher {
    feed: Arc<dyn UvFeed>,
    sun: Option<Arc<dyn SunTimesFetcher>>,
    clock: Arc<dyn Clock>,
    settings: RefreshSettings,
    state: Mutex<RefreshState>,
}

impl UvRefresher {
    pub fn new(
        feed: Arc<dyn UvFeed>,
        clock: Arc<dyn Clock>,
        settings: RefreshSettings,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            sun: None,
            clock,
            settings,
            state: Mutex::new(RefreshState {
                postal_code: postal_code.into(),
                generation: 0,
                in_flight: None,
                cache: SeriesCache::new(),
            }),
        }
    }

    /// Also fetch sunrise/sunset alongside each series refresh
    pub fn with_sun_times(mut self, sun: Arc<dyn SunTimesFetcher>) -> Self {
        self.sun = Some(sun);
        self
    }

    pub fn postal_code(&self) -> String {
        self.state.lock().postal_code.clone()
    }

    pub fn snapshot(&self) -> RefreshSnapshot {
        let state = self.state.lock();
        RefreshSnapshot {
            postal_code: state.postal_code.clone(),
            series_postal_code: state.cache.series_postal_code().map(str::to_string),
            series: state.cache.series(),
            watermark: state.cache.watermark(),
            sun_times: state.cache.sun_times(),
            sun_times_postal_code: state.cache.sun_times_postal_code().map(str::to_string),
            fetching: state.in_flight.is_some(),
        }
    }

    /// Initial load; fetches regardless of staleness.
    pub async fn activate(&self) -> RefreshOutcome {
        let begun = {
            let mut state = self.state.lock();
            if state.in_flight == Some(state.generation) {
                None
            } else {
                Some(Self::begin(&mut state))
            }
        };
        match begun {
            Some((generation, postal_code)) => self.run_cycle(generation, postal_code).await,
            None => RefreshOutcome::InFlight,
        }
    }

    /// Switch to another postal code and fetch for it right away. A cycle
    /// still running for the old code will have its result discarded.
    pub async fn set_postal_code(&self, postal_code: impl Into<String>) -> RefreshOutcome {
        let postal_code = postal_code.into();
        let (generation, postal_code) = {
            let mut state = self.state.lock();
            if state.postal_code == postal_code {
                return RefreshOutcome::Unchanged;
            }
            tracing::info!(from = %state.postal_code, to = %postal_code, "Postal code changed");
            state.postal_code = postal_code;
            state.generation += 1;
            Self::begin(&mut state)
        };
        self.run_cycle(generation, postal_code).await
    }

    /// Periodic check: fetch only when the cached data is stale.
    pub async fn refresh_if_needed(&self) -> RefreshOutcome {
        let (generation, postal_code) = {
            let mut state = self.state.lock();
            if state.in_flight == Some(state.generation) {
                return RefreshOutcome::InFlight;
            }
            let stale = self.settings.staleness.is_stale(
                state.cache.watermark(),
                self.clock.now(),
                self.clock.local_hour(),
            );
            if !stale {
                tracing::debug!("UV data still fresh");
                return RefreshOutcome::Fresh;
            }
            Self::begin(&mut state)
        };
        self.run_cycle(generation, postal_code).await
    }

    fn begin(state: &mut RefreshState) -> (u64, String) {
        state.in_flight = Some(state.generation);
        (state.generation, state.postal_code.clone())
    }

    async fn run_cycle(&self, generation: u64, postal_code: String) -> RefreshOutcome {
        let _guard = InFlightGuard {
            state: &self.state,
            generation,
        };

        let date = self.clock.local_date();
        let sun = async {
            match &self.sun {
                Some(fetcher) => Some(fetcher.sun_times(&postal_code, date).await),
                None => None,
            }
        };
        let (series, sun) = tokio::join!(self.load_series(&postal_code), sun);

        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!(
                %postal_code,
                generation,
                current = state.generation,
                "Discarding superseded UV refresh"
            );
            return RefreshOutcome::Superseded;
        }
        state.in_flight = None;

        match sun {
            Some(Ok(times)) => state.cache.set_sun_times(times, postal_code.clone()),
            Some(Err(e)) => tracing::warn!(%postal_code, "Sunrise/sunset fetch failed: {}", e),
            None => {}
        }

        match series {
            Ok(series) => {
                let points = series.len();
                state.cache.replace(series, postal_code.clone(), self.clock.now());
                tracing::info!(%postal_code, points, "UV series refreshed");
                RefreshOutcome::Applied { points }
            }
            Err(e) => {
                tracing::warn!(
                    %postal_code,
                    transient = e.is_transient(),
                    "Keeping previous UV series: {}",
                    e
                );
                RefreshOutcome::Retained
            }
        }
    }

    async fn load_series(&self, postal_code: &str) -> Result<Series, RefreshError> {
        let raw = self.feed.fetch_hourly(postal_code).await?;
        let points = normalize(raw, self.settings.malformed_records)?;
        Ok(repair(points, self.settings.sort_key))
    }
}
