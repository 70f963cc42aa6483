//! Sunrise and sunset times via sunrisesunset.io.
//!
//! The API is keyed on coordinates, so the postal code is located through
//! Nominatim first. Times are requested in UTC as unix seconds.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::geocode::NominatimClient;
use crate::retry::{send_with_retry, RetryPolicy};
use crate::types::{SunTimes, SunTimesError};

pub const SUNRISE_SUNSET_URL: &str = "https://api.sunrisesunset.io";

#[async_trait]
pub trait SunTimesFetcher: Send + Sync {
    async fn sun_times(&self, postal_code: &str, date: NaiveDate) -> Result<SunTimes, SunTimesError>;
}

#[derive(Debug, Deserialize)]
struct SunResponse {
    status: String,
    results: Option<SunResults>,
}

#[derive(Debug, Deserialize)]
struct SunResults {
    sunrise: serde_json::Value,
    sunset: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SunriseSunsetClient {
    client: Client,
    base_url: String,
    geocoder: NominatimClient,
    retry: RetryPolicy,
}

impl SunriseSunsetClient {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(geocoder: NominatimClient, timeout: Duration) -> Result<Self, SunTimesError> {
        Self::with_base_url(SUNRISE_SUNSET_URL, geocoder, timeout)
    }

    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: &str,
        geocoder: NominatimClient,
        timeout: Duration,
    ) -> Result<Self, SunTimesError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            geocoder,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// The API has served unix times both as strings and as numbers
fn unix_seconds(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

#[async_trait]
impl SunTimesFetcher for SunriseSunsetClient {
    #[instrument(skip(self), level = "info")]
    async fn sun_times(&self, postal_code: &str, date: NaiveDate) -> Result<SunTimes, SunTimesError> {
        let coords = self.geocoder.locate_postal_code(postal_code).await?;

        let url = format!(
            "{}/json?lat={}&lng={}&timezone=UTC&date={}&time_format=unix",
            self.base_url,
            coords.latitude,
            coords.longitude,
            date.format("%Y-%m-%d")
        );
        let response = send_with_retry(&self.retry, || self.client.get(&url).send()).await?;
        if !response.status().is_success() {
            return Err(SunTimesError::Status(response.status().as_u16()));
        }

        let body: SunResponse = response
            .json()
            .await
            .map_err(|e| SunTimesError::Parse(e.to_string()))?;
        if body.status != "OK" {
            return Err(SunTimesError::Api(body.status));
        }
        let results = body
            .results
            .ok_or_else(|| SunTimesError::Parse("missing results".to_string()))?;

        let sunrise = unix_seconds(&results.sunrise)
            .ok_or_else(|| SunTimesError::Parse(format!("bad sunrise {}", results.sunrise)))?;
        let sunset = unix_seconds(&results.sunset)
            .ok_or_else(|| SunTimesError::Parse(format!("bad sunset {}", results.sunset)))?;

        Ok(SunTimes { sunrise, sunset })
    }
}
