/// Raw reading → `air_quality` row mapping.
///
/// | column               | source         | when absent          |
/// |----------------------|----------------|----------------------|
/// | `station_id`         | `idx`          | null                 |
/// | `station_name`       | `city.name`    | null; error if no `city` |
/// | `dominant_pollutant` | `dominentpol`  | null                 |
/// | `aqi`                | `aqi`          | null                 |
/// | `data_timestamp`     | `time.iso`     | null                 |
///
/// Normalization is pure and order-preserving: one row per input reading.
/// The only hard failure is a reading without a `city` object, which aborts
/// the whole batch.

use crate::logging::RunLogger;
use crate::model::{NormalizeError, NormalizedReading, RawReading};

/// Maps one raw reading. `position` is only used in the error.
pub fn normalize_reading(
    raw: &RawReading,
    position: usize,
) -> Result<NormalizedReading, NormalizeError> {
    // TODO: decide with the data consumers whether a missing `city` should
    // degrade to a null name like every other field.
    let city = raw.city.as_ref().ok_or_else(|| NormalizeError::MalformedReading {
        position,
        station: raw
            .idx
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    })?;

    Ok(NormalizedReading {
        station_id: raw.idx.clone(),
        station_name: city.name.clone(),
        dominant_pollutant: raw.dominentpol.clone(),
        aqi: raw.aqi.clone(),
        observed_at: raw.time.as_ref().and_then(|t| t.iso.clone()),
    })
}

/// Maps a whole batch, failing on the first reading without a `city`.
pub fn normalize(
    readings: &[RawReading],
    log: &RunLogger,
) -> Result<Vec<NormalizedReading>, NormalizeError> {
    log.info(None, &format!("Processing data for {} stations", readings.len()));

    let mut rows = Vec::with_capacity(readings.len());
    for (position, raw) in readings.iter().enumerate() {
        let row = normalize_reading(raw, position)?;
        log.debug(
            row.station_id.as_ref().map(|id| id.to_string()).as_deref(),
            &format!("Normalized station {}/{}: {:?}", position + 1, readings.len(), row),
        );
        rows.push(row);
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
