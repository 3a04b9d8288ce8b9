/// ClickHouse backend over the HTTP interface.
///
/// Statements are sent as `POST /?query=...` to the configured host/port
/// (default 8123). Inserts stream rows as `JSONEachRow`, one JSON object per
/// line, with `date_time_input_format=best_effort` so ISO 8601 timestamps
/// with offsets parse into `DateTime` columns.
///
/// Docs: https://clickhouse.com/docs/en/interfaces/http

use super::{Warehouse, WarehouseConnector};
use crate::config::WarehouseConfig;
use crate::model::{LoadError, NormalizedReading};
use std::time::Duration;

pub struct ClickHouseConnector {
    client: reqwest::blocking::Client,
    endpoint: String,
    database: String,
    user: String,
    password: Option<String>,
}

impl ClickHouseConnector {
    pub fn new(config: &WarehouseConfig, timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Connection(format!("could not build HTTP client: {}", e)))?;

        Ok(ClickHouseConnector {
            client,
            endpoint: format!("http://{}:{}/", config.host, config.effective_port()),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }
}

impl WarehouseConnector for ClickHouseConnector {
    fn connect(&self) -> Result<Box<dyn Warehouse>, LoadError> {
        let session = ClickHouseSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        };

        // The HTTP interface is stateless; a ping query proves reachability
        // and credentials before any work is attempted.
        session
            .execute("SELECT 1", None)
            .map_err(|e| LoadError::Connection(e.to_string()))?;

        Ok(Box::new(session))
    }
}

struct ClickHouseSession {
    client: reqwest::blocking::Client,
    endpoint: String,
    database: String,
    user: String,
    password: Option<String>,
}

impl ClickHouseSession {
    /// Runs one statement. A non-2xx answer becomes `LoadError::Query` with
    /// the server's error text.
    fn execute(&self, query: &str, body: Option<String>) -> Result<String, LoadError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("database", self.database.as_str()),
                ("query", query),
                ("date_time_input_format", "best_effort"),
            ])
            .header("X-ClickHouse-User", &self.user);

        if let Some(password) = &self.password {
            request = request.header("X-ClickHouse-Key", password);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .map_err(|e| LoadError::Connection(e.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| LoadError::Query(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(LoadError::Query(format!("HTTP {}: {}", status.as_u16(), text.trim())));
        }

        Ok(text)
    }
}

impl Warehouse for ClickHouseSession {
    fn table_exists(&mut self, table: &str) -> Result<bool, LoadError> {
        let answer = self.execute(&format!("EXISTS TABLE {}", table), None)?;
        Ok(answer.trim() == "1")
    }

    fn row_count(&mut self, table: &str) -> Result<u64, LoadError> {
        let answer = self.execute(&format!("SELECT count() FROM {}", table), None)?;
        answer
            .trim()
            .parse()
            .map_err(|e| LoadError::Query(format!("unexpected count '{}': {}", answer.trim(), e)))
    }

    fn append(&mut self, table: &str, rows: &[NormalizedReading]) -> Result<usize, LoadError> {
        let body = to_json_each_row(rows)?;
        let query = format!("INSERT INTO {} FORMAT JSONEachRow", table);

        self.execute(&query, Some(body)).map_err(|e| match e {
            LoadError::Query(message) => LoadError::InsertRejected(message),
            other => other,
        })?;

        Ok(rows.len())
    }
}

/// Serializes rows as newline-delimited JSON objects keyed by column name.
pub fn to_json_each_row(rows: &[NormalizedReading]) -> Result<String, LoadError> {
    let mut body = String::new();
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| LoadError::SchemaMismatch(e.to_string()))?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}
