/// Core data types for the air-quality harvest pipeline.
///
/// This module defines the shared domain model imported by every stage:
/// stations, raw feed payloads, normalized rows, and the error taxonomy.
/// It contains no I/O.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Warehouse table receiving normalized readings.
pub const AIR_QUALITY_TABLE: &str = "air_quality";

/// Persisted column order for `air_quality`.
pub const AIR_QUALITY_COLUMNS: [&str; 5] = [
    "station_id",
    "station_name",
    "dominant_pollutant",
    "aqi",
    "data_timestamp",
];

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

/// Externally assigned station identifier.
///
/// WAQI returns integer ids (`uid` in the map endpoint, `idx` in the feed)
/// but the id is opaque to us, so string ids are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StationId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationId::Numeric(id) => write!(f, "{}", id),
            StationId::Text(id) => write!(f, "{}", id),
        }
    }
}

/// A station returned by the directory endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
}

/// Rectangular lat/long window used to scope station discovery.
///
/// Corners are passed to the API verbatim, in `lat1,long1,lat2,long2` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat1: f64,
    pub long1: f64,
    pub lat2: f64,
    pub long2: f64,
}

impl BoundingBox {
    /// Bounds covering mainland Australia and Tasmania.
    pub fn australia() -> Self {
        BoundingBox {
            lat1: -10.6,
            long1: 113.2,
            lat2: -43.6,
            long2: 153.6,
        }
    }

    /// Value of the `latlng` query parameter.
    pub fn latlng_param(&self) -> String {
        format!("{},{},{},{}", self.lat1, self.long1, self.lat2, self.long2)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox::australia()
    }
}

impl FromStr for BoundingBox {
    type Err = String;

    /// Parses `"lat1,long1,lat2,long2"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!(
                "expected 4 comma-separated coordinates (lat1,long1,lat2,long2), got '{}'",
                s
            ));
        }

        let mut coords = [0.0_f64; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|e| format!("invalid coordinate '{}': {}", part, e))?;
        }

        let bounds = BoundingBox {
            lat1: coords[0],
            long1: coords[1],
            lat2: coords[2],
            long2: coords[3],
        };

        for lat in [bounds.lat1, bounds.lat2] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(format!("latitude {} out of range", lat));
            }
        }
        for long in [bounds.long1, bounds.long2] {
            if !(-180.0..=180.0).contains(&long) {
                return Err(format!("longitude {} out of range", long));
            }
        }

        Ok(bounds)
    }
}

// ---------------------------------------------------------------------------
// Raw feed payloads
// ---------------------------------------------------------------------------

/// The `data` object of a successful `/feed/@{id}/` response.
///
/// Every field is optional: upstream payloads are not guaranteed complete.
/// A leaf field of an unexpected JSON type reads as absent rather than
/// rejecting the reading. Fields we do not persist (`iaqi`, `forecast`,
/// `attributions`, ...) are ignored during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default, deserialize_with = "lenient")]
    pub idx: Option<StationId>,
    pub city: Option<City>,
    /// Upstream spelling, not a typo on our side.
    #[serde(default, deserialize_with = "lenient")]
    pub dominentpol: Option<String>,
    pub aqi: Option<AqiValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub time: Option<ObservationTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTime {
    #[serde(default, deserialize_with = "lenient")]
    pub iso: Option<String>,
}

/// Optional field that degrades to `None` when the value has the wrong type.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Air quality index exactly as reported.
///
/// WAQI reports `"-"` for stations without a current index, so the value is
/// carried through unchanged instead of being coerced to a number. Any other
/// JSON shape lands in `Other`, still untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AqiValue {
    Number(serde_json::Number),
    Text(String),
    Other(serde_json::Value),
}

impl fmt::Display for AqiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AqiValue::Number(n) => write!(f, "{}", n),
            AqiValue::Text(s) => write!(f, "{}", s),
            AqiValue::Other(v) => write!(f, "{}", v),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized rows
// ---------------------------------------------------------------------------

/// One row of the `air_quality` table. Every field is independently nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReading {
    pub station_id: Option<StationId>,
    pub station_name: Option<String>,
    pub dominant_pollutant: Option<String>,
    pub aqi: Option<AqiValue>,
    /// ISO 8601 observation time; stored in the `data_timestamp` column.
    #[serde(rename = "data_timestamp")]
    pub observed_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal errors from station discovery. Any of these aborts the run.
#[derive(Debug, Error, PartialEq)]
pub enum DirectoryError {
    /// Non-2xx HTTP response from the directory endpoint.
    #[error("directory endpoint returned HTTP {0}")]
    UpstreamUnavailable(u16),
    /// Connection failure or timeout before any response arrived.
    #[error("directory request failed: {0}")]
    Transport(String),
    /// The body was not the expected `{"data": [...]}` shape.
    #[error("malformed directory response: {0}")]
    Parse(String),
}

/// Why a single station was dropped from the fetch batch.
///
/// These are values, not failures: the fetcher records them and moves on.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("feed endpoint returned HTTP {0}")]
    UpstreamUnavailable(u16),
    #[error("feed request failed: {0}")]
    Transport(String),
    #[error("malformed feed response: {0}")]
    MalformedResponse(String),
    #[error("station reported failure: {0}")]
    StationReportedFailure(String),
}

impl SkipReason {
    /// Log severity for a skip. An upstream "unknown station" answer is an
    /// expected condition; anything else points at the service or our client.
    pub fn severity(&self) -> log::Level {
        match self {
            SkipReason::StationReportedFailure(_) => log::Level::Warn,
            SkipReason::UpstreamUnavailable(_)
            | SkipReason::Transport(_)
            | SkipReason::MalformedResponse(_) => log::Level::Error,
        }
    }
}

/// Fatal normalization error.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    /// The `city` object is absent. Unlike every other field this is not
    /// degraded to null.
    #[error("reading #{position} (station {station}) has no `city` object")]
    MalformedReading { position: usize, station: String },
}

/// Warehouse failures. Every variant is a `LoadFailure` for the run.
#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("could not connect to warehouse: {0}")]
    Connection(String),
    #[error("warehouse table `{0}` does not exist")]
    TableNotFound(String),
    #[error("warehouse rejected insert: {0}")]
    InsertRejected(String),
    #[error("row does not match table schema: {0}")]
    SchemaMismatch(String),
    #[error("warehouse query failed: {0}")]
    Query(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
