//! Postal code lookups against Nominatim (OpenStreetMap).
//! Free, no API key required; Nominatim does require a descriptive user agent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::retry::{send_with_retry, RetryPolicy};
use crate::types::{Coordinates, ResolutionError};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const USER_AGENT: &str = "UVDash/0.1.0 (hourly UV index dashboard)";

/// Turns coordinates into the postal code the UV feed is keyed on
#[async_trait]
pub trait PostalCodeResolver: Send + Sync {
    async fn postal_code_for(&self, coordinates: Coordinates) -> Result<String, ResolutionError>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<ReverseAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
    country_code: String,
    retry: RetryPolicy,
}

impl NominatimClient {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ResolutionError> {
        Self::with_base_url(NOMINATIM_URL, timeout, user_agent)
    }

    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, ResolutionError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            country_code: "us".to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Center of a postal code area, used for sunrise/sunset lookups.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::NotFound`] when the code matches nothing.
    #[instrument(skip(self), level = "debug")]
    pub async fn locate_postal_code(&self, postal_code: &str) -> Result<Coordinates, ResolutionError> {
        let url = format!(
            "{}/search?postalcode={}&countrycodes={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(postal_code),
            self.country_code
        );
        let response = send_with_retry(&self.retry, || self.client.get(&url).send()).await?;
        if !response.status().is_success() {
            return Err(ResolutionError::Status(response.status().as_u16()));
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .map_err(|e| ResolutionError::Parse(e.to_string()))?;
        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NotFound(postal_code.to_string()))?;

        let latitude = hit
            .lat
            .parse()
            .map_err(|_| ResolutionError::Parse(format!("bad latitude {:?}", hit.lat)))?;
        let longitude = hit
            .lon
            .parse()
            .map_err(|_| ResolutionError::Parse(format!("bad longitude {:?}", hit.lon)))?;
        Ok(Coordinates { latitude, longitude })
    }
}

#[async_trait]
impl PostalCodeResolver for NominatimClient {
    #[instrument(skip(self), level = "info")]
    async fn postal_code_for(&self, coordinates: Coordinates) -> Result<String, ResolutionError> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1",
            self.base_url, coordinates.latitude, coordinates.longitude
        );
        let response = send_with_retry(&self.retry, || self.client.get(&url).send()).await?;
        if !response.status().is_success() {
            return Err(ResolutionError::Status(response.status().as_u16()));
        }

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| ResolutionError::Parse(e.to_string()))?;

        // ZIP+4 codes come back as "10065-1234"; the feed wants the first five
        let postal_code = body
            .address
            .and_then(|a| a.postcode)
            .and_then(|p| p.split('-').next().map(|s| s.trim().to_string()))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ResolutionError::NotFound(format!(
                    "{}, {}",
                    coordinates.latitude, coordinates.longitude
                ))
            })?;

        tracing::info!("Resolved postal code: {}", postal_code);
        Ok(postal_code)
    }
}
