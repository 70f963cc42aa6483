//! Centralized error types for UVDash.
//!
//! Library crates return their own `thiserror` enums; this module folds them
//! into [`AppError`] and attaches messages that are safe to show a user.

use thiserror::Error;
use uvdash_forecast::{FetchError, ResolutionError, SunTimesError};

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Forecast(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::Forecast(ForecastError::Feed(e))
    }
}

impl From<ResolutionError> for AppError {
    fn from(e: ResolutionError) -> Self {
        AppError::Forecast(ForecastError::Location(e))
    }
}

impl From<SunTimesError> for AppError {
    fn from(e: SunTimesError) -> Self {
        AppError::Forecast(ForecastError::SunTimes(e))
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory unavailable")]
    NoConfigDir,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NoConfigDir => "No configuration directory found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// UV feed, location and sunrise/sunset failures.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("UV feed: {0}")]
    Feed(FetchError),

    #[error("Location lookup: {0}")]
    Location(ResolutionError),

    #[error("Sun times: {0}")]
    SunTimes(SunTimesError),
}

impl ForecastError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ForecastError::Feed(FetchError::Network(e)) => e.to_network_error().user_message(),
            ForecastError::Feed(FetchError::Status { status, .. }) if *status >= 500 => {
                "The UV forecast service is unavailable. Showing the last forecast."
            }
            ForecastError::Feed(_) => "The UV forecast could not be loaded. Showing the last forecast.",
            ForecastError::Location(ResolutionError::NotFound(_)) => {
                "Your location has no postal code. Using the default location."
            }
            ForecastError::Location(_) => "Location lookup failed. Using the default location.",
            ForecastError::SunTimes(_) => "Sunrise and sunset times are unavailable.",
        }
    }
}

/// Extension trait for classifying reqwest errors.
pub trait ReqwestErrorExt {
    fn to_network_error(&self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn to_network_error(&self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
