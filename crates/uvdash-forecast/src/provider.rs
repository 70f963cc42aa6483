//! Hourly UV forecast from the EPA Envirofacts service.
//! No API key needed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use crate::retry::{send_with_retry, RetryPolicy};
use crate::types::{FetchError, RawDataPoint};

pub const EPA_ENVIROFACTS_URL: &str = "https://data.epa.gov/efservice";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Source of raw hourly UV records for a postal code.
///
/// An empty list is a valid answer meaning the feed has nothing for that
/// code right now.
#[async_trait]
pub trait UvFeed: Send + Sync {
    async fn fetch_hourly(&self, postal_code: &str) -> Result<Vec<RawDataPoint>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct EpaUvClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl EpaUvClient {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_base_url(EPA_ENVIROFACTS_URL, timeout)
    }

    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn hourly_url(&self, postal_code: &str) -> String {
        format!(
            "{}/getEnvirofactsUVHOURLY/ZIP/{}/JSON",
            self.base_url,
            urlencoding::encode(postal_code)
        )
    }
}

#[async_trait]
impl UvFeed for EpaUvClient {
    #[instrument(skip(self), level = "info")]
    async fn fetch_hourly(&self, postal_code: &str) -> Result<Vec<RawDataPoint>, FetchError> {
        let url = self.hourly_url(postal_code);
        let response = send_with_retry(&self.retry, || self.client.get(&url).send()).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let records: Vec<RawDataPoint> = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        tracing::debug!("UV feed returned {} records", records.len());
        Ok(records)
    }
}
