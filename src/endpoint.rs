/// HTTP status endpoint for the harvest daemon
///
/// Lets an operator or an external scheduler see whether the last run
/// worked without reading logs.
///
/// Endpoints:
/// - GET /health       - Service health check
/// - GET /runs/latest  - Most recent `RunReport` as JSON (404 before the first run)

use crate::daemon::SharedReport;
use crate::pipeline::RunReport;
use std::io::Cursor;

type JsonResponse = tiny_http::Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start the status server on `port`. Blocks for as long as the server runs.
pub fn start_endpoint_server(port: u16, latest: SharedReport) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    log::info!("Status endpoint listening on http://0.0.0.0:{}", port);
    log::info!("  GET /health - Service health check");
    log::info!("  GET /runs/latest - Latest run report");

    serve(server, latest);
    Ok(())
}

/// Answer requests from an already bound server until it shuts down.
pub fn serve(server: tiny_http::Server, latest: SharedReport) {
    for request in server.incoming_requests() {
        let (status, body) = if *request.method() == tiny_http::Method::Get {
            // A poisoned lock still holds the last report that was written.
            let snapshot = match latest.lock() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            route(request.url(), snapshot.as_ref())
        } else {
            (405, serde_json::json!({ "error": "Method not allowed" }))
        };

        if let Err(e) = request.respond(create_response(status, &body)) {
            log::warn!("Failed to send response: {}", e);
        }
    }
}

/// Pick the status code and JSON body for a GET to `url`.
pub fn route(url: &str, latest: Option<&RunReport>) -> (u16, serde_json::Value) {
    let path = url.split('?').next().unwrap_or(url);

    match path {
        "/health" => (
            200,
            serde_json::json!({
                "status": "ok",
                "service": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }),
        ),
        "/runs/latest" => match latest {
            Some(report) => match serde_json::to_value(report) {
                Ok(value) => (200, value),
                Err(e) => (500, serde_json::json!({ "error": e.to_string() })),
            },
            None => (404, serde_json::json!({ "error": "No run has completed yet" })),
        },
        _ => (
            404,
            serde_json::json!({
                "error": "Not found",
                "available_endpoints": ["/health", "/runs/latest"]
            }),
        ),
    }
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &serde_json::Value) -> JsonResponse {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());

    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
