//! Integration tests for the UV refresh pipeline.
//!
//! The first test drives a real EpaUvClient against wiremock; the rest use
//! in-process feeds so they can control when each fetch completes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Timelike, Utc};
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use uvdash_forecast::{
    EpaUvClient, FetchError, ManualClock, RawDataPoint, RefreshOutcome, RefreshSettings,
    RetryPolicy, SunTimes, SunTimesError, SunTimesFetcher, UvFeed, UvRefresher,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::utc(
        Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap(),
    ))
}

fn raw(zip: &str, order: u32, date_time: &str, uv: f64) -> RawDataPoint {
    RawDataPoint {
        order: Some(order),
        zip: zip.to_string(),
        city: String::new(),
        state: String::new(),
        date_time: date_time.to_string(),
        uv_value: uv,
    }
}

#[tokio::test]
async fn test_vendor_records_become_ordered_series() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/getEnvirofactsUVHOURLY/ZIP/10065/JSON"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"ORDER": 1, "ZIP": 10065, "CITY": "NEW YORK", "STATE": "NY",
             "DATE_TIME": "Jan/1/2024 07 AM", "UV_VALUE": 3},
            {"ORDER": 2, "ZIP": 10065, "CITY": "NEW YORK", "STATE": "NY",
             "DATE_TIME": "Jan/1/2024 06 AM", "UV_VALUE": 5},
            {"ORDER": 3, "ZIP": 10065, "CITY": "NEW YORK", "STATE": "NY",
             "DATE_TIME": "Jan/1/2024 08 AM", "UV_VALUE": 4}
        ])))
        .mount(&mock_server)
        .await;

    let feed = EpaUvClient::with_base_url(&mock_server.uri(), Duration::from_secs(5))
        .unwrap()
        .with_retry(RetryPolicy::none());
    let refresher = UvRefresher::new(Arc::new(feed), clock(), RefreshSettings::default(), "10065");

    assert_eq!(refresher.activate().await, RefreshOutcome::Applied { points: 3 });

    let snapshot = refresher.snapshot();
    let hours: Vec<u32> = snapshot.series.iter().map(|p| p.date_time.hour()).collect();
    let uv: Vec<f64> = snapshot.series.iter().map(|p| p.uv_value).collect();
    assert_eq!(hours, vec![6, 7, 8]);
    assert_eq!(uv, vec![5.0, 3.0, 4.0]);
    assert_eq!(snapshot.series.points()[0].zip, "10065");
    assert_eq!(snapshot.series.peak().map(|p| p.uv_value), Some(5.0));
}

#[tokio::test]
async fn test_feed_outage_leaves_series_pending() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let feed = EpaUvClient::with_base_url(&mock_server.uri(), Duration::from_secs(5))
        .unwrap()
        .with_retry(RetryPolicy::none());
    let refresher = UvRefresher::new(Arc::new(feed), clock(), RefreshSettings::default(), "10065");

    assert_eq!(refresher.activate().await, RefreshOutcome::Retained);
    assert!(refresher.snapshot().is_pending());
}

/// Feed whose responses for some postal codes wait for a release signal
#[derive(Default)]
struct GatedFeed {
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    entered: Notify,
    calls: AtomicUsize,
}

impl GatedFeed {
    fn gate(&self, postal_code: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(postal_code.to_string(), rx);
        tx
    }
}

#[async_trait]
impl UvFeed for GatedFeed {
    async fn fetch_hourly(&self, postal_code: &str) -> Result<Vec<RawDataPoint>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().remove(postal_code);
        if let Some(gate) = gate {
            self.entered.notify_one();
            let _ = gate.await;
        }
        Ok(vec![
            raw(postal_code, 1, "Jan/1/2024 10 AM", 2.0),
            raw(postal_code, 2, "Jan/1/2024 11 AM", 3.0),
        ])
    }
}

#[tokio::test]
async fn test_late_result_for_old_postal_code_is_discarded() {
    let feed = Arc::new(GatedFeed::default());
    let release_first = feed.gate("10065");
    let refresher = Arc::new(UvRefresher::new(
        feed.clone(),
        clock(),
        RefreshSettings::default(),
        "10065",
    ));

    let first = tokio::spawn({
        let refresher = refresher.clone();
        async move { refresher.activate().await }
    });
    feed.entered.notified().await;

    // Second request completes while the first is still waiting
    assert_eq!(
        refresher.set_postal_code("94105").await,
        RefreshOutcome::Applied { points: 2 }
    );

    release_first.send(()).unwrap();
    assert_eq!(first.await.unwrap(), RefreshOutcome::Superseded);

    let snapshot = refresher.snapshot();
    assert_eq!(snapshot.postal_code, "94105");
    assert_eq!(snapshot.series_postal_code.as_deref(), Some("94105"));
    assert!(snapshot.series.iter().all(|p| p.zip == "94105"));
    assert!(!snapshot.is_outdated_location());
    assert!(!snapshot.fetching);
}

#[tokio::test]
async fn test_triggers_during_a_running_cycle_are_coalesced() {
    let feed = Arc::new(GatedFeed::default());
    let release = feed.gate("10065");
    let refresher = Arc::new(UvRefresher::new(
        feed.clone(),
        clock(),
        RefreshSettings::default(),
        "10065",
    ));

    let first = tokio::spawn({
        let refresher = refresher.clone();
        async move { refresher.activate().await }
    });
    feed.entered.notified().await;

    assert!(refresher.snapshot().fetching);
    assert_eq!(refresher.activate().await, RefreshOutcome::InFlight);
    assert_eq!(refresher.refresh_if_needed().await, RefreshOutcome::InFlight);

    release.send(()).unwrap();
    assert_eq!(first.await.unwrap(), RefreshOutcome::Applied { points: 2 });
    assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
    assert!(!refresher.snapshot().fetching);
}

#[tokio::test]
async fn test_dropped_cycle_releases_in_flight_marker() {
    let feed = Arc::new(GatedFeed::default());
    let _release = feed.gate("10065");
    let refresher = Arc::new(UvRefresher::new(
        feed.clone(),
        clock(),
        RefreshSettings::default(),
        "10065",
    ));

    let first = tokio::spawn({
        let refresher = refresher.clone();
        async move { refresher.activate().await }
    });
    feed.entered.notified().await;
    first.abort();
    let _ = first.await;

    assert!(!refresher.snapshot().fetching);
    assert_eq!(refresher.activate().await, RefreshOutcome::Applied { points: 2 });
}

struct FixedSun {
    result: Result<SunTimes, ()>,
}

#[async_trait]
impl SunTimesFetcher for FixedSun {
    async fn sun_times(&self, _postal_code: &str, _date: NaiveDate) -> Result<SunTimes, SunTimesError> {
        self.result
            .map_err(|_| SunTimesError::Api("INVALID_REQUEST".to_string()))
    }
}

#[tokio::test]
async fn test_sun_times_are_fetched_with_the_series() {
    let times = SunTimes {
        sunrise: Utc.with_ymd_and_hms(2024, 1, 1, 12, 20, 0).unwrap(),
        sunset: Utc.with_ymd_and_hms(2024, 1, 1, 21, 38, 0).unwrap(),
    };
    let refresher = UvRefresher::new(
        Arc::new(GatedFeed::default()),
        clock(),
        RefreshSettings::default(),
        "10065",
    )
    .with_sun_times(Arc::new(FixedSun { result: Ok(times) }));

    refresher.activate().await;
    assert_eq!(refresher.snapshot().sun_times, Some(times));
}

#[tokio::test]
async fn test_sun_times_failure_does_not_block_series() {
    let refresher = UvRefresher::new(
        Arc::new(GatedFeed::default()),
        clock(),
        RefreshSettings::default(),
        "10065",
    )
    .with_sun_times(Arc::new(FixedSun { result: Err(()) }));

    assert_eq!(refresher.activate().await, RefreshOutcome::Applied { points: 2 });
    assert!(refresher.snapshot().sun_times.is_none());
}

/// Knows sun times for one postal code only
struct SingleZipSun {
    postal_code: &'static str,
    times: SunTimes,
}

#[async_trait]
impl SunTimesFetcher for SingleZipSun {
    async fn sun_times(&self, postal_code: &str, _date: NaiveDate) -> Result<SunTimes, SunTimesError> {
        if postal_code == self.postal_code {
            Ok(self.times)
        } else {
            Err(SunTimesError::Api(format!("no result for {postal_code}")))
        }
    }
}

#[tokio::test]
async fn test_sun_times_from_previous_location_are_flagged() {
    let times = SunTimes {
        sunrise: Utc.with_ymd_and_hms(2024, 1, 1, 12, 20, 0).unwrap(),
        sunset: Utc.with_ymd_and_hms(2024, 1, 1, 21, 38, 0).unwrap(),
    };
    let refresher = UvRefresher::new(
        Arc::new(GatedFeed::default()),
        clock(),
        RefreshSettings::default(),
        "10065",
    )
    .with_sun_times(Arc::new(SingleZipSun {
        postal_code: "10065",
        times,
    }));

    refresher.activate().await;
    let snapshot = refresher.snapshot();
    assert_eq!(snapshot.sun_times_postal_code.as_deref(), Some("10065"));
    assert_eq!(snapshot.current_sun_times(), Some(times));

    assert_eq!(
        refresher.set_postal_code("94105").await,
        RefreshOutcome::Applied { points: 2 }
    );
    let snapshot = refresher.snapshot();
    assert!(!snapshot.is_outdated_location());
    assert_eq!(snapshot.sun_times_postal_code.as_deref(), Some("10065"));
    assert!(snapshot.is_outdated_sun_times());
    assert_eq!(snapshot.current_sun_times(), None);
}
