//! Hourly UV index forecast for UVDash
//!
//! Fetches the EPA Envirofacts hourly UV feed for a postal code, turns the
//! vendor records into a clean time-ordered series and keeps it fresh in
//! memory. Sunrise/sunset times come from sunrisesunset.io and postal codes
//! are resolved through Nominatim.

pub mod cache;
pub mod clock;
pub mod geocode;
pub mod location;
pub mod normalize;
pub mod provider;
pub mod refresh;
pub mod repair;
pub mod retry;
pub mod scheduler;
pub mod staleness;
pub mod sun;
pub mod timestamp;
pub mod types;

pub use cache::RefreshSnapshot;
pub use clock::{Clock, ManualClock, SystemClock};
pub use geocode::{NominatimClient, PostalCodeResolver};
pub use location::resolve_postal_code_or_default;
pub use normalize::{normalize, MalformedRecordPolicy};
pub use provider::{EpaUvClient, UvFeed};
pub use refresh::{RefreshOutcome, RefreshSettings, UvRefresher};
pub use repair::{repair, SortKey};
pub use retry::RetryPolicy;
pub use scheduler::{RefreshScheduler, SchedulerSettings};
pub use staleness::StalenessPolicy;
pub use sun::{SunTimesFetcher, SunriseSunsetClient};
pub use timestamp::parse_vendor_timestamp;
pub use types::*;
