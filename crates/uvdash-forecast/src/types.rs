use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Upper bound of the UV axis on the dashboard chart.
pub const UV_CHART_MAX: f64 = 11.0;

/// UV exposure category, following the chart's reference lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UvLevel {
    #[default]
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl UvLevel {
    /// Classify a raw UV index value
    pub fn from_value(uv: f64) -> Self {
        match uv {
            v if v >= 11.0 => Self::Extreme,
            v if v >= 8.0 => Self::VeryHigh,
            v if v >= 6.0 => Self::High,
            v if v >= 3.0 => Self::Moderate,
            _ => Self::Low, // Negative and NaN readings fall through here
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
            Self::Extreme => "Extreme",
        }
    }
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One hourly record as served by the EPA Envirofacts UV feed.
///
/// Field names arrive upper-snake-cased (`DATE_TIME`, `UV_VALUE`, ...) and
/// the timestamp is the vendor's `Mon/DD/YYYY HH AM|PM` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RawDataPoint {
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(deserialize_with = "postal_code_from_json")]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub date_time: String,
    pub uv_value: f64,
}

/// Normalized UV sample.
///
/// `date_time` is a local wall-clock reading with no timezone attached; it
/// serializes as milliseconds since the epoch interpreted in the local zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDataPoint {
    pub order: Option<u32>,
    pub zip: String,
    pub city: String,
    pub state: String,
    #[serde(with = "crate::timestamp::local_millis")]
    pub date_time: NaiveDateTime,
    pub uv_value: f64,
}

impl CanonicalDataPoint {
    /// Milliseconds since the epoch, reading `date_time` in the local zone
    pub fn timestamp_millis(&self) -> i64 {
        crate::timestamp::local_timestamp_millis(self.date_time)
    }

    pub fn level(&self) -> UvLevel {
        UvLevel::from_value(self.uv_value)
    }

    /// UV value clipped to the chart's `[0, 11]` range
    pub fn chart_value(&self) -> f64 {
        self.uv_value.clamp(0.0, UV_CHART_MAX)
    }
}

/// Time-ordered UV series. Only built by [`crate::repair::repair`], so the
/// points are always non-decreasing in `date_time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    points: Vec<CanonicalDataPoint>,
}

impl Series {
    pub(crate) fn from_ordered(points: Vec<CanonicalDataPoint>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].date_time <= w[1].date_time));
        Self { points }
    }

    pub fn points(&self) -> &[CanonicalDataPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalDataPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<CanonicalDataPoint> {
        self.points
    }

    pub fn earliest(&self) -> Option<&CanonicalDataPoint> {
        self.points.first()
    }

    /// Highest reading; the earliest one wins a tie
    pub fn peak(&self) -> Option<&CanonicalDataPoint> {
        self.points.iter().fold(None, |best, p| match best {
            Some(b) if b.uv_value >= p.uv_value => Some(b),
            _ => Some(p),
        })
    }

    /// Sample covering the hour that contains `at`
    pub fn at_hour(&self, at: NaiveDateTime) -> Option<&CanonicalDataPoint> {
        self.points
            .iter()
            .rev()
            .find(|p| p.date_time <= at && at - p.date_time < chrono::Duration::hours(1))
    }

    /// Local midnight following the day of the first sample.
    pub fn next_day_boundary(&self) -> Option<NaiveDateTime> {
        let first = self.earliest()?;
        let next = first.date_time.date().succ_opt()?;
        Some(next.and_time(NaiveTime::MIN))
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a CanonicalDataPoint;
    type IntoIter = std::slice::Iter<'a, CanonicalDataPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// When the series was last replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RefreshWatermark {
    #[default]
    Never,
    At(DateTime<Utc>),
}

impl RefreshWatermark {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Never => None,
            Self::At(at) => Some(*at),
        }
    }
}

/// Sunrise and sunset for one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// Vendor date string that does not match `Mon/DD/YYYY HH AM|PM`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed timestamp {input:?}: {reason}")]
pub struct MalformedTimestamp {
    pub input: String,
    pub reason: &'static str,
}

/// UV feed errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("UV feed returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Same classification the retry loop uses for transport errors and statuses
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => crate::retry::is_retryable_error(e),
            Self::Status { status, .. } => reqwest::StatusCode::from_u16(*status)
                .is_ok_and(crate::retry::is_retryable_status),
            Self::Parse(_) => false,
        }
    }
}

/// Location lookup errors
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Geocoder returned status {0}")]
    Status(u16),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("No match for {0}")]
    NotFound(String),
}

/// Sunrise/sunset lookup errors
#[derive(Debug, thiserror::Error)]
pub enum SunTimesError {
    #[error("Geocode error: {0}")]
    Geocode(#[from] ResolutionError),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Sunrise-sunset API returned status {0}")]
    Status(u16),
    #[error("Sunrise-sunset API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// The feed serves `ZIP` as a string for some records and a bare number for
/// others; numbers lose their leading zeros, so pad them back.
fn postal_code_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(v) => Ok(format!("{:05}", v)),
            None => Ok(n.to_string()),
        },
        other => Err(D::Error::custom(format!(
            "expected postal code string or number, got {}",
            other
        ))),
    }
}
