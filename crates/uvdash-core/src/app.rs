use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uvdash_forecast::{
    resolve_postal_code_or_default, Clock, Coordinates, EpaUvClient, NominatimClient,
    PostalCodeResolver, RefreshOutcome, RefreshScheduler, RefreshSnapshot, SunTimesFetcher,
    SunriseSunsetClient, SystemClock, UvFeed, UvRefresher,
};

use crate::error::{AppError, ConfigError};
use crate::Config;

/// External services the application talks to
pub struct Collaborators {
    pub feed: Arc<dyn UvFeed>,
    pub resolver: Arc<dyn PostalCodeResolver>,
    pub sun: Option<Arc<dyn SunTimesFetcher>>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// HTTP clients pointed at the configured services, plus the system clock
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let timeout = config.request_timeout();
        let services = &config.services;

        let feed = EpaUvClient::with_base_url(&services.uv_feed_url, timeout)?;
        let geocoder =
            NominatimClient::with_base_url(&services.geocode_url, timeout, &services.user_agent)?;
        let sun = SunriseSunsetClient::with_base_url(
            &services.sunrise_sunset_url,
            geocoder.clone(),
            timeout,
        )?;

        Ok(Self {
            feed: Arc::new(feed),
            resolver: Arc::new(geocoder),
            sun: Some(Arc::new(sun)),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Running dashboard: the refresher plus its timers
pub struct App {
    config: Arc<Config>,
    refresher: Arc<UvRefresher>,
    resolver: Arc<dyn PostalCodeResolver>,
    scheduler: RefreshScheduler,
}

impl App {
    /// Build the clients from `config`, load the first series and start the timers.
    pub async fn start(config: Config) -> Result<Self, AppError> {
        ensure_valid(&config)?;
        let collaborators = Collaborators::from_config(&config)?;
        Self::start_with(config, collaborators).await
    }

    /// Start with the given collaborators. Fails on a config with validation errors.
    pub async fn start_with(config: Config, collaborators: Collaborators) -> Result<Self, AppError> {
        ensure_valid(&config)?;
        let Collaborators {
            feed,
            resolver,
            sun,
            clock,
        } = collaborators;

        let postal_code = match &config.forecast.postal_code {
            Some(code) => code.clone(),
            None => {
                resolve_postal_code_or_default(
                    resolver.as_ref(),
                    config.location.coordinates(),
                    &config.forecast.default_postal_code,
                )
                .await
            }
        };
        tracing::info!("Starting UV dashboard for postal code {}", postal_code);

        let mut refresher = UvRefresher::new(feed, clock.clone(), config.refresh_settings(), postal_code);
        if let Some(sun) = sun {
            refresher = refresher.with_sun_times(sun);
        }
        let refresher = Arc::new(refresher);

        match refresher.activate().await {
            RefreshOutcome::Applied { points } => {
                tracing::debug!(points, "Initial UV series loaded");
            }
            outcome => tracing::warn!(?outcome, "Initial UV load did not complete"),
        }

        let scheduler =
            RefreshScheduler::start(refresher.clone(), clock, config.scheduler_settings());

        Ok(Self {
            config: Arc::new(config),
            refresher,
            resolver,
            scheduler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn snapshot(&self) -> RefreshSnapshot {
        self.refresher.snapshot()
    }

    /// Current instant, advanced on every clock tick
    pub fn now(&self) -> watch::Receiver<DateTime<Utc>> {
        self.scheduler.now()
    }

    pub async fn set_postal_code(&self, postal_code: impl Into<String>) -> RefreshOutcome {
        self.refresher.set_postal_code(postal_code).await
    }

    /// Follow a new position. Lookup failures fall back to the default postal code.
    pub async fn relocate(&self, coordinates: Coordinates) -> RefreshOutcome {
        let postal_code = resolve_postal_code_or_default(
            self.resolver.as_ref(),
            Some(coordinates),
            &self.config.forecast.default_postal_code,
        )
        .await;
        self.set_postal_code(postal_code).await
    }

    pub async fn shutdown(self) {
        tracing::info!("Shutting down application");
        self.scheduler.shutdown().await;
    }
}

fn ensure_valid(config: &Config) -> Result<(), AppError> {
    let validation = config.validate();
    if validation.is_valid() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(validation.error_summary()).into())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uvdash_forecast::{FetchError, ManualClock, RawDataPoint, ResolutionError};

    struct EchoFeed;

    #[async_trait]
    impl UvFeed for EchoFeed {
        async fn fetch_hourly(&self, postal_code: &str) -> Result<Vec<RawDataPoint>, FetchError> {
            Ok(vec![RawDataPoint {
                order: Some(1),
                zip: postal_code.to_string(),
                city: String::new(),
                state: String::new(),
                date_time: "Jun/1/2024 12 PM".to_string(),
                uv_value: 8.0,
            }])
        }
    }

    #[derive(Default)]
    struct TableResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PostalCodeResolver for TableResolver {
        async fn postal_code_for(&self, coordinates: Coordinates) -> Result<String, ResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if coordinates.longitude < -100.0 {
                Ok("94105".to_string())
            } else if coordinates.longitude < 0.0 {
                Ok("10065".to_string())
            } else {
                Err(ResolutionError::NotFound("ocean".to_string()))
            }
        }
    }

    fn collaborators(resolver: Arc<TableResolver>) -> Collaborators {
        Collaborators {
            feed: Arc::new(EchoFeed),
            resolver,
            sun: None,
            clock: Arc::new(ManualClock::utc(
                Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap(),
            )),
        }
    }

    fn san_francisco() -> Coordinates {
        Coordinates {
            latitude: 37.79,
            longitude: -122.39,
        }
    }

    #[tokio::test]
    async fn test_start_loads_default_postal_code() {
        let resolver = Arc::new(TableResolver::default());
        let app = App::start_with(Config::default(), collaborators(resolver.clone()))
            .await
            .unwrap();

        let snapshot = app.snapshot();
        assert_eq!(snapshot.postal_code, "10065");
        assert_eq!(snapshot.series.len(), 1);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_resolves_configured_location() {
        let mut config = Config::default();
        config.location.latitude = Some(37.79);
        config.location.longitude = Some(-122.39);

        let app = App::start_with(config, collaborators(Arc::default()))
            .await
            .unwrap();
        assert_eq!(app.snapshot().postal_code, "94105");
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_pinned_postal_code_skips_lookup() {
        let mut config = Config::default();
        config.location.latitude = Some(37.79);
        config.location.longitude = Some(-122.39);
        let config = config.with_postal_code_override(Some("60601".to_string()));

        let resolver = Arc::new(TableResolver::default());
        let app = App::start_with(config, collaborators(resolver.clone()))
            .await
            .unwrap();
        assert_eq!(app.snapshot().postal_code, "60601");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_relocate_switches_series() {
        let app = App::start_with(Config::default(), collaborators(Arc::default()))
            .await
            .unwrap();

        assert_eq!(
            app.relocate(san_francisco()).await,
            RefreshOutcome::Applied { points: 1 }
        );
        let snapshot = app.snapshot();
        assert_eq!(snapshot.postal_code, "94105");
        assert_eq!(snapshot.series.points()[0].zip, "94105");

        // Unresolvable position falls back to the default code
        let ocean = Coordinates {
            latitude: 0.0,
            longitude: 10.0,
        };
        app.relocate(ocean).await;
        assert_eq!(app.snapshot().postal_code, "10065");
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_rejects_zero_intervals() {
        let mut config = Config::default();
        config.forecast.check_interval_minutes = 0;
        let result = App::start_with(config, collaborators(Arc::default())).await;
        assert!(matches!(result, Err(AppError::Config(ConfigError::Invalid(_)))));

        let mut config = Config::default();
        config.forecast.clock_tick_seconds = 0;
        let result = App::start(config).await;
        match result {
            Err(AppError::Config(ConfigError::Invalid(summary))) => {
                assert!(summary.contains("clock_tick_seconds"));
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("zero clock tick accepted"),
        }
    }

    #[test]
    fn test_collaborators_from_default_config() {
        let collaborators = Collaborators::from_config(&Config::default()).unwrap();
        assert!(collaborators.sun.is_some());
    }
}
