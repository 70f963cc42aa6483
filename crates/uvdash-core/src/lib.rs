pub mod app;
pub mod config;
pub mod error;

pub use app::{App, Collaborators};
pub use config::{Config, ForecastConfig, LocationConfig, ServiceConfig, ValidationResult};
pub use error::{AppError, ConfigError, ForecastError, NetworkError};

use anyhow::Result;

/// Initialize logging. `RUST_LOG` overrides the default `info` filter.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("UVDash core initialized");
    Ok(())
}
