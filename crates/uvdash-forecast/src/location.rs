//! Picks the postal code the dashboard starts on.

use crate::geocode::PostalCodeResolver;
use crate::types::Coordinates;

/// Resolve `coordinates` to a postal code, falling back to `default` when
/// no position is known or the lookup fails.
pub async fn resolve_postal_code_or_default(
    resolver: &dyn PostalCodeResolver,
    coordinates: Option<Coordinates>,
    default: &str,
) -> String {
    let Some(coordinates) = coordinates else {
        tracing::info!("No location configured, using default postal code {}", default);
        return default.to_string();
    };

    match resolver.postal_code_for(coordinates).await {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!(
                latitude = coordinates.latitude,
                longitude = coordinates.longitude,
                "Postal code lookup failed, using default {}: {}",
                default,
                e
            );
            default.to_string()
        }
    }
}
