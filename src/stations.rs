/// Station discovery for a bounding region.
///
/// Asks the WAQI map endpoint which stations lie inside the configured
/// bounding box. This is the single source of station ids for a run: the
/// fetch stage only ever requests feeds for stations returned here.
///
/// Any failure is fatal for the run. A directory response that cannot be
/// trusted invalidates everything downstream, and retrying is the
/// scheduler's job.

use crate::ingest::transport::HttpGet;
use crate::ingest::waqi::{build_bounds_url, parse_bounds_response, redact_token};
use crate::logging::RunLogger;
use crate::model::{BoundingBox, DirectoryError, Station};
use std::sync::Arc;

pub struct StationDirectory {
    transport: Arc<dyn HttpGet>,
    base_url: String,
    token: String,
}

impl StationDirectory {
    pub fn new(transport: Arc<dyn HttpGet>, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        StationDirectory {
            transport,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Lists stations inside `bounds`, in the order upstream returned them.
    ///
    /// # Errors
    /// - `DirectoryError::Transport` — no response (connect failure, timeout).
    /// - `DirectoryError::UpstreamUnavailable` — non-2xx status.
    /// - `DirectoryError::Parse` — body is not `{"data": [{station.name, uid}, ...]}`.
    pub fn list_stations(
        &self,
        bounds: &BoundingBox,
        log: &RunLogger,
    ) -> Result<Vec<Station>, DirectoryError> {
        let url = build_bounds_url(&self.base_url, bounds, &self.token);
        log.info(
            None,
            &format!("Geo-coordinates (lat1, long1, lat2, long2): {}", bounds.latlng_param()),
        );
        log.debug(None, &format!("Endpoint: {}", redact_token(&url, &self.token)));

        let response = self
            .transport
            .get(&url)
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        log.debug(None, &format!("Response status: {}", response.status));
        if !response.is_success() {
            return Err(DirectoryError::UpstreamUnavailable(response.status));
        }

        let stations = parse_bounds_response(&response.body)?;
        log.info(None, &format!("Found {} stations within bounds", stations.len()));

        Ok(stations)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
