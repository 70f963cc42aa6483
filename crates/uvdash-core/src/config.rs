use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use uvdash_forecast::geocode::{NOMINATIM_URL, USER_AGENT};
use uvdash_forecast::provider::{DEFAULT_TIMEOUT_SECS, EPA_ENVIROFACTS_URL};
use uvdash_forecast::staleness::{DEFAULT_FORCED_REFRESH_HOUR, DEFAULT_STALE_AFTER_HOURS};
use uvdash_forecast::sun::SUNRISE_SUNSET_URL;
use uvdash_forecast::{
    Coordinates, MalformedRecordPolicy, RefreshSettings, SchedulerSettings, SortKey,
    StalenessPolicy,
};

use crate::error::ConfigError;

/// Pins the postal code, skipping location lookup
pub const POSTAL_CODE_ENV: &str = "UVDASH_POSTAL_CODE";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub services: ServiceConfig,

    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Used when no location is configured or it cannot be resolved
    pub default_postal_code: String,

    /// Fixed postal code; wins over location lookup. Also set by `UVDASH_POSTAL_CODE`.
    pub postal_code: Option<String>,

    /// Data older than this is fetched again
    pub stale_after_hours: u32,

    /// Local hour (0-23) during which data is always considered stale
    pub forced_refresh_hour: u32,

    pub check_interval_minutes: u32,

    /// How often the "now" marker advances
    pub clock_tick_seconds: u32,

    pub malformed_records: MalformedRecordPolicy,

    pub sort_key: SortKey,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_postal_code: "10065".to_string(),
            postal_code: None,
            stale_after_hours: DEFAULT_STALE_AFTER_HOURS as u32,
            forced_refresh_hour: DEFAULT_FORCED_REFRESH_HOUR,
            check_interval_minutes: 60,
            clock_tick_seconds: 60,
            malformed_records: MalformedRecordPolicy::default(),
            sort_key: SortKey::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// EPA Envirofacts base URL for the hourly UV feed
    pub uv_feed_url: String,

    pub sunrise_sunset_url: String,

    /// Nominatim base URL
    pub geocode_url: String,

    pub request_timeout_secs: u64,

    /// Sent on every request; Nominatim rejects generic agents
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            uv_feed_url: EPA_ENVIROFACTS_URL.to_string(),
            sunrise_sunset_url: SUNRISE_SUNSET_URL.to_string(),
            geocode_url: NOMINATIM_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationConfig {
    /// Both halves set, or nothing
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: self.latitude?,
            longitude: self.longitude?,
        })
    }
}

impl Config {
    /// Load configuration from the user config directory.
    ///
    /// A missing file yields the defaults; nothing is written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        let config = Self::load_from(&path)?;
        Ok(config.with_postal_code_override(std::env::var(POSTAL_CODE_ENV).ok()))
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Apply a postal code pin from the environment. Blank values are ignored.
    pub fn with_postal_code_override(mut self, value: Option<String>) -> Self {
        if let Some(code) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            tracing::info!("Postal code pinned to {} via {}", code, POSTAL_CODE_ENV);
            self.forecast.postal_code = Some(code);
        }
        self
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.services.uv_feed_url, "services.uv_feed_url", &mut result);
        self.validate_url(
            &self.services.sunrise_sunset_url,
            "services.sunrise_sunset_url",
            &mut result,
        );
        self.validate_url(&self.services.geocode_url, "services.geocode_url", &mut result);

        if self.services.request_timeout_secs == 0 {
            result.add_error(
                "services.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }
        if self.services.user_agent.trim().is_empty() {
            result.add_warning(
                "services.user_agent",
                "Empty user agent - location lookups may be refused",
            );
        }

        let forecast = &self.forecast;
        if forecast.forced_refresh_hour > 23 {
            result.add_error(
                "forecast.forced_refresh_hour",
                format!("Hour must be 0-23, got {}", forecast.forced_refresh_hour),
            );
        }
        if forecast.stale_after_hours == 0 {
            result.add_error(
                "forecast.stale_after_hours",
                "Staleness age must be greater than 0",
            );
        } else if forecast.stale_after_hours > 24 {
            result.add_warning(
                "forecast.stale_after_hours",
                "Data older than a day will be shown as current",
            );
        }
        if forecast.check_interval_minutes == 0 {
            result.add_error(
                "forecast.check_interval_minutes",
                "Check interval must be greater than 0",
            );
        } else if forecast.check_interval_minutes > 60 {
            result.add_warning(
                "forecast.check_interval_minutes",
                "Checks less than hourly may miss the forced refresh hour",
            );
        }
        if forecast.clock_tick_seconds == 0 {
            result.add_error(
                "forecast.clock_tick_seconds",
                "Clock tick must be greater than 0",
            );
        }

        check_postal_code(&forecast.default_postal_code, "forecast.default_postal_code", &mut result);
        if let Some(code) = &forecast.postal_code {
            check_postal_code(code, "forecast.postal_code", &mut result);
        }

        let location = &self.location;
        if let Some(lat) = location.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                result.add_error("location.latitude", format!("Latitude out of range: {}", lat));
            }
        }
        if let Some(lon) = location.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                result.add_error("location.longitude", format!("Longitude out of range: {}", lon));
            }
        }
        if location.latitude.is_some() != location.longitude.is_some() {
            result.add_warning(
                "location",
                "Only one of latitude/longitude is set - location will be ignored",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            staleness: StalenessPolicy::new(
                i64::from(self.forecast.stale_after_hours),
                Some(self.forecast.forced_refresh_hour),
            ),
            malformed_records: self.forecast.malformed_records,
            sort_key: self.forecast.sort_key,
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            check_interval: Duration::from_secs(u64::from(self.forecast.check_interval_minutes) * 60),
            clock_tick: Duration::from_secs(u64::from(self.forecast.clock_tick_seconds)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.services.request_timeout_secs)
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("uvdash").join("config.toml"))
    }
}

/// The UV feed is keyed on five-digit US ZIP codes
fn check_postal_code(code: &str, field: &str, result: &mut ValidationResult) {
    if code.len() != 5 || !code.bytes().all(|b| b.is_ascii_digit()) {
        result.add_warning(field, format!("Not a five-digit ZIP code: {:?}", code));
    }
}
