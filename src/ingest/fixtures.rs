/// Test fixtures: representative JSON payloads from the WAQI API, plus an
/// in-memory `HttpGet` implementation.
///
/// Payloads are trimmed to the fields the parser reads plus a few it must
/// ignore. They reflect the envelopes returned by:
///   https://api.waqi.info/map/bounds?latlng=...&token=...
///   https://api.waqi.info/feed/@{uid}/?token=...
///
/// Map bounds response shape:
///   status              — "ok" | "error"
///   data[]
///     .uid              — station id (integer)
///     .aqi              — current AQI as a STRING ("-" when unknown)
///     .station.name     — display name
///
/// Feed response shape:
///   status              — "ok" | "error" | "nug"
///   data                — reading object when ok, reason string otherwise
///     .idx              — station id (same as uid)
///     .city.name
///     .dominentpol      — upstream spelling
///     .aqi              — number, or "-" when unknown
///     .time.iso         — ISO 8601 with station offset

use crate::ingest::transport::{HttpGet, HttpResponse, TransportError};
use std::sync::Mutex;

/// Three Sydney stations inside the Australia bounding box.
pub(crate) fn fixture_bounds_json() -> &'static str {
    r#"{
      "status": "ok",
      "data": [
        { "lat": -33.8659, "lon": 151.1625, "uid": 5722, "aqi": "42",
          "station": { "name": "Rozelle, Sydney, Australia", "time": "2024-05-01T14:00:00+10:00" } },
        { "lat": -33.9319, "lon": 151.0572, "uid": 3255, "aqi": "-",
          "station": { "name": "Chullora, Sydney, Australia", "time": "2024-05-01T14:00:00+10:00" } },
        { "lat": -33.7328, "lon": 150.9950, "uid": 10132, "aqi": "17",
          "station": { "name": "Prospect, Sydney, Australia", "time": "2024-05-01T14:00:00+10:00" } }
      ]
    }"#
}

/// Second element has no `uid`; the whole directory response is invalid.
pub(crate) fn fixture_bounds_missing_uid_json() -> &'static str {
    r#"{
      "status": "ok",
      "data": [
        { "uid": 5722, "station": { "name": "Rozelle, Sydney, Australia" } },
        { "station": { "name": "Chullora, Sydney, Australia" } }
      ]
    }"#
}

/// Complete reading for Rozelle, including fields the normalizer ignores.
pub(crate) fn fixture_feed_ok_json() -> &'static str {
    r#"{
      "status": "ok",
      "data": {
        "aqi": 42,
        "idx": 5722,
        "attributions": [{ "url": "https://www.dpie.nsw.gov.au/", "name": "NSW DPIE" }],
        "city": {
          "geo": [-33.8659, 151.1625],
          "name": "Rozelle, Sydney, Australia",
          "url": "https://aqicn.org/city/australia/nsw/rozelle/sydney-east"
        },
        "dominentpol": "pm25",
        "iaqi": { "pm25": { "v": 42 }, "o3": { "v": 12.4 } },
        "time": { "s": "2024-05-01 14:00:00", "tz": "+10:00", "v": 1714572000, "iso": "2024-05-01T14:00:00+10:00" }
      }
    }"#
}

/// Upstream does not know the requested uid.
pub(crate) fn fixture_feed_unknown_station_json() -> &'static str {
    r#"{ "status": "error", "data": "Unknown station" }"#
}

/// Station online but without an index, pollutant or timestamp.
pub(crate) fn fixture_feed_sparse_json() -> &'static str {
    r#"{
      "status": "ok",
      "data": {
        "aqi": "-",
        "idx": 3255,
        "city": { "name": "Chullora, Sydney, Australia" }
      }
    }"#
}

/// Feed body for an arbitrary station id and AQI.
pub(crate) fn feed_ok_for(idx: i64, name: &str, aqi: i64) -> String {
    serde_json::json!({
        "status": "ok",
        "data": {
            "aqi": aqi,
            "idx": idx,
            "city": { "name": name },
            "dominentpol": "pm25",
            "time": { "iso": "2024-05-01T14:00:00+10:00" }
        }
    })
    .to_string()
}

/// `HttpGet` that answers from a fixed route table. The first route whose
/// key is contained in the requested URL wins; unmatched URLs get a 404.
pub(crate) struct FakeTransport {
    routes: Vec<(String, Result<HttpResponse, TransportError>)>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        FakeTransport {
            routes: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn route(mut self, url_fragment: &str, status: u16, body: &str) -> Self {
        self.routes
            .push((url_fragment.to_string(), Ok(HttpResponse::new(status, body))));
        self
    }

    pub(crate) fn fail(mut self, url_fragment: &str, error: TransportError) -> Self {
        self.routes.push((url_fragment.to_string(), Err(error)));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl HttpGet for FakeTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Ok(HttpResponse::new(404, "not found")))
    }
}
