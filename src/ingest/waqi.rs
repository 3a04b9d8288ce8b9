/// World Air Quality Index (WAQI) API: URL construction + JSON parsing.
///
/// Two endpoints are used:
///   `GET /map/bounds?latlng={lat1},{long1},{lat2},{long2}&token={token}`
///   `GET /feed/@{station_id}/?token={token}`
///
/// See `fixtures.rs` for annotated examples of both response shapes.

use crate::model::{BoundingBox, DirectoryError, RawReading, SkipReason, Station, StationId};
use serde::Deserialize;

/// Public WAQI API root.
pub const WAQI_API_BASE: &str = "https://api.waqi.info";

/// Feed `status` value for a usable reading.
pub const STATUS_OK: &str = "ok";

// ---------------------------------------------------------------------------
// Serde structures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct BoundsResponse {
    data: Vec<BoundsEntry>,
}

#[derive(Deserialize)]
struct BoundsEntry {
    station: BoundsStation,
    uid: StationId,
}

#[derive(Deserialize)]
struct BoundsStation {
    name: String,
}

/// Outer feed envelope. Both keys are checked explicitly so a missing key is
/// reported as such rather than as a generic deserialization failure.
#[derive(Deserialize)]
struct FeedEnvelope {
    status: Option<serde_json::Value>,
    data: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds the station directory URL for a bounding box.
///
/// # Example
/// ```
/// use aqi_harvest::ingest::waqi::build_bounds_url;
/// use aqi_harvest::model::BoundingBox;
///
/// let url = build_bounds_url("https://api.waqi.info", &BoundingBox::australia(), "demo");
/// assert_eq!(
///     url,
///     "https://api.waqi.info/map/bounds?latlng=-10.6,113.2,-43.6,153.6&token=demo"
/// );
/// ```
pub fn build_bounds_url(base_url: &str, bounds: &BoundingBox, token: &str) -> String {
    format!(
        "{}/map/bounds?latlng={}&token={}",
        base_url.trim_end_matches('/'),
        bounds.latlng_param(),
        urlencoding::encode(token)
    )
}

/// Builds the per-station feed URL. The `@` prefix selects lookup by
/// station uid rather than by city name.
pub fn build_feed_url(base_url: &str, station_id: &StationId, token: &str) -> String {
    format!(
        "{}/feed/@{}/?token={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(&station_id.to_string()),
        urlencoding::encode(token)
    )
}

/// Replaces the token in a URL so it can be logged.
pub fn redact_token(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_string();
    }
    url.replace(urlencoding::encode(token).as_ref(), "***")
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parses a `/map/bounds` response body into stations, in upstream order.
///
/// # Errors
/// `DirectoryError::Parse` if the body is not JSON, has no `data` array, or
/// any element lacks `station.name` or `uid`. One malformed element fails
/// the whole response.
pub fn parse_bounds_response(json: &str) -> Result<Vec<Station>, DirectoryError> {
    let response: BoundsResponse = serde_json::from_str(json)
        .map_err(|e| DirectoryError::Parse(format!("JSON deserialization failed: {}", e)))?;

    Ok(response
        .data
        .into_iter()
        .map(|entry| Station {
            id: entry.uid,
            name: entry.station.name,
        })
        .collect())
}

/// Parses a `/feed/@{id}/` response body.
///
/// # Errors
/// Returns the reason to skip the station:
/// - `MalformedResponse` — body is not JSON, lacks `status` or `data`, or
///   `data` is not a reading object despite `status: "ok"`.
/// - `StationReportedFailure` — `status` is anything but `"ok"`; the reason
///   is the upstream `data` message.
pub fn parse_feed_response(json: &str) -> Result<RawReading, SkipReason> {
    let envelope: FeedEnvelope = serde_json::from_str(json)
        .map_err(|e| SkipReason::MalformedResponse(format!("body is not a JSON object: {}", e)))?;

    let (status, data) = match (envelope.status, envelope.data) {
        (Some(status), Some(data)) => (status, data),
        (None, _) => {
            return Err(SkipReason::MalformedResponse("no `status` in response".to_string()));
        }
        (_, None) => {
            return Err(SkipReason::MalformedResponse("no `data` in response".to_string()));
        }
    };

    if status.as_str() != Some(STATUS_OK) {
        let reason = match data {
            serde_json::Value::String(message) => message,
            other => other.to_string(),
        };
        return Err(SkipReason::StationReportedFailure(reason));
    }

    serde_json::from_value(data)
        .map_err(|e| SkipReason::MalformedResponse(format!("unexpected `data` shape: {}", e)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use crate::model::AqiValue;

    // --- URL construction ---------------------------------------------------

    #[test]
    fn test_bounds_url_carries_latlng_and_token() {
        let url = build_bounds_url(WAQI_API_BASE, &BoundingBox::australia(), "secret");
        assert!(url.starts_with("https://api.waqi.info/map/bounds?"));
        assert!(url.contains("latlng=-10.6,113.2,-43.6,153.6"));
        assert!(url.ends_with("&token=secret"));
    }

    #[test]
    fn test_feed_url_uses_at_prefix() {
        let url = build_feed_url("http://localhost:9000/", &StationId::Numeric(5722), "secret");
        assert_eq!(url, "http://localhost:9000/feed/@5722/?token=secret");
    }

    #[test]
    fn test_token_is_query_encoded() {
        let url = build_feed_url(WAQI_API_BASE, &StationId::Numeric(1), "a&b=c");
        assert!(url.ends_with("token=a%26b%3Dc"), "got {}", url);
    }

    #[test]
    fn test_redact_token() {
        let url = build_feed_url(WAQI_API_BASE, &StationId::Numeric(1), "secret");
        let redacted = redact_token(&url, "secret");
        assert!(!redacted.contains("secret"));
        assert!(redacted.ends_with("token=***"));
    }

    // --- Directory parsing ---------------------------------------------------

    #[test]
    fn test_parse_bounds_keeps_upstream_order() {
        let stations = parse_bounds_response(fixture_bounds_json()).expect("fixture should parse");
        assert_eq!(stations.len(), 3);
        assert_eq!(stations[0].id, StationId::Numeric(5722));
        assert_eq!(stations[0].name, "Rozelle, Sydney, Australia");
        assert_eq!(stations[2].id, StationId::Numeric(10132));
    }

    #[test]
    fn test_parse_bounds_empty_data_is_ok() {
        let stations = parse_bounds_response(r#"{"status": "ok", "data": []}"#).unwrap();
        assert!(stations.is_empty());
    }

    #[test]
    fn test_parse_bounds_missing_uid_fails_whole_response() {
        let result = parse_bounds_response(fixture_bounds_missing_uid_json());
        assert!(
            matches!(result, Err(DirectoryError::Parse(_))),
            "one malformed element should invalidate the directory, got {:?}",
            result
        );
    }

    #[test]
    fn test_parse_bounds_error_status_is_parse_error() {
        let result = parse_bounds_response(r#"{"status": "error", "data": "Invalid key"}"#);
        assert!(matches!(result, Err(DirectoryError::Parse(_))));
    }

    #[test]
    fn test_parse_bounds_rejects_non_json() {
        assert!(matches!(
            parse_bounds_response("<html>502</html>"),
            Err(DirectoryError::Parse(_))
        ));
    }

    // --- Feed parsing ---------------------------------------------------------

    #[test]
    fn test_parse_feed_ok() {
        let reading = parse_feed_response(fixture_feed_ok_json()).expect("fixture should parse");
        assert_eq!(reading.idx, Some(StationId::Numeric(5722)));
        assert_eq!(
            reading.city.and_then(|c| c.name).as_deref(),
            Some("Rozelle, Sydney, Australia")
        );
        assert_eq!(reading.dominentpol.as_deref(), Some("pm25"));
        assert_eq!(reading.aqi, Some(AqiValue::Number(42.into())));
        assert_eq!(
            reading.time.and_then(|t| t.iso).as_deref(),
            Some("2024-05-01T14:00:00+10:00")
        );
    }

    #[test]
    fn test_parse_feed_error_status_reports_reason() {
        let result = parse_feed_response(fixture_feed_unknown_station_json());
        assert_eq!(
            result,
            Err(SkipReason::StationReportedFailure("Unknown station".to_string()))
        );
    }

    #[test]
    fn test_parse_feed_missing_status_is_malformed() {
        let result = parse_feed_response(r#"{"data": {"aqi": 10}}"#);
        assert!(matches!(result, Err(SkipReason::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_feed_missing_data_is_malformed() {
        let result = parse_feed_response(r#"{"status": "ok"}"#);
        assert!(matches!(result, Err(SkipReason::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_feed_ok_with_non_object_data_is_malformed() {
        let result = parse_feed_response(r#"{"status": "ok", "data": "nope"}"#);
        assert!(matches!(result, Err(SkipReason::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_feed_non_string_status_is_reported_failure() {
        let result = parse_feed_response(r#"{"status": 500, "data": "Over quota"}"#);
        assert_eq!(
            result,
            Err(SkipReason::StationReportedFailure("Over quota".to_string()))
        );
    }

    #[test]
    fn test_parse_feed_null_data_is_malformed() {
        let result = parse_feed_response(r#"{"status": "ok", "data": null}"#);
        assert!(matches!(result, Err(SkipReason::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_feed_keeps_reading_with_odd_field_types() {
        for body in [
            r#"{"status": "ok", "data": {"idx": 1, "city": {"name": "A"}, "dominentpol": 5}}"#,
            r#"{"status": "ok", "data": {"idx": 1, "city": {"name": "A"}, "aqi": {"v": 3}}}"#,
            r#"{"status": "ok", "data": {"idx": 1, "city": {"name": "A"}, "time": "2024-01-01T00:00:00Z"}}"#,
        ] {
            let reading = parse_feed_response(body)
                .unwrap_or_else(|e| panic!("{} should be kept, got {:?}", body, e));
            assert_eq!(reading.idx, Some(StationId::Numeric(1)));
        }
    }

    #[test]
    fn test_parse_feed_sparse_payload() {
        let reading = parse_feed_response(fixture_feed_sparse_json()).expect("sparse data is fine");
        assert!(reading.idx.is_some());
        assert!(reading.dominentpol.is_none());
        assert_eq!(reading.aqi, Some(AqiValue::Text("-".to_string())));
        assert!(reading.time.is_none());
    }
}
