/// HTTP GET capability used by the directory and feed stages.
///
/// Stages only need "issue a GET, give me status and body", so they depend
/// on the `HttpGet` trait. `ReqwestTransport` is the production
/// implementation; tests substitute in-memory fakes.

use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
}

pub trait HttpGet: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Blocking reqwest client with a per-request timeout.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("could not build HTTP client: {}", e)))?;

        Ok(ReqwestTransport { client })
    }
}

impl HttpGet for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().map_err(classify_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    // reqwest includes the full URL, token included, in its messages.
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
