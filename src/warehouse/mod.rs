/// Append-only warehouse loading.
///
/// `WarehouseLoader` opens a connection through a `WarehouseConnector`,
/// checks that the target table exists, and appends the batch in a single
/// insert. Row counts before and after the insert are a best-effort sanity
/// check: a failing count is logged and never aborts the load.
///
/// Backends:
/// - `clickhouse` — ClickHouse HTTP interface (JSONEachRow inserts)
/// - `pg`         — PostgreSQL via the `postgres` crate

pub mod clickhouse;
pub mod pg;

use crate::config::{WarehouseBackend, WarehouseConfig};
use crate::logging::RunLogger;
use crate::model::{LoadError, NormalizedReading};
use serde::Serialize;
use std::time::Duration;

/// An open warehouse session.
pub trait Warehouse {
    fn table_exists(&mut self, table: &str) -> Result<bool, LoadError>;
    fn row_count(&mut self, table: &str) -> Result<u64, LoadError>;
    /// Appends all rows as one batch. Returns the number of rows written.
    fn append(&mut self, table: &str, rows: &[NormalizedReading]) -> Result<usize, LoadError>;
}

/// Opens warehouse sessions. Connection failures map to `LoadError::Connection`.
pub trait WarehouseConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Warehouse>, LoadError>;
}

/// What a successful load did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub rows_inserted: usize,
    pub count_before: Option<u64>,
    pub count_after: Option<u64>,
}

pub struct WarehouseLoader {
    connector: Box<dyn WarehouseConnector>,
    table: String,
}

impl WarehouseLoader {
    pub fn new(connector: Box<dyn WarehouseConnector>, table: impl Into<String>) -> Self {
        WarehouseLoader {
            connector,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Appends `rows` to the target table. Loading the same rows twice
    /// stores them twice.
    ///
    /// # Errors
    /// Any `LoadError` from connecting, resolving the table, or inserting.
    pub fn load(&self, rows: &[NormalizedReading], log: &RunLogger) -> Result<LoadSummary, LoadError> {
        let mut warehouse = self.connector.connect()?;

        if !warehouse.table_exists(&self.table)? {
            return Err(LoadError::TableNotFound(self.table.clone()));
        }

        let count_before = best_effort_count(warehouse.as_mut(), &self.table, "before", log);

        let rows_inserted = if rows.is_empty() {
            log.warn(None, &format!("No rows to insert into '{}'", self.table));
            0
        } else {
            log.info(None, &format!("Inserting {} rows into '{}'", rows.len(), self.table));
            warehouse.append(&self.table, rows)?
        };

        let count_after = best_effort_count(warehouse.as_mut(), &self.table, "after", log);

        Ok(LoadSummary {
            rows_inserted,
            count_before,
            count_after,
        })
    }
}

fn best_effort_count(
    warehouse: &mut dyn Warehouse,
    table: &str,
    when: &str,
    log: &RunLogger,
) -> Option<u64> {
    match warehouse.row_count(table) {
        Ok(count) => {
            log.info(None, &format!("'{}' row count {} insert: {}", table, when, count));
            Some(count)
        }
        Err(e) => {
            log.warn(None, &format!("Could not count rows {} insert: {}", when, e));
            None
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers
/// (optionally `schema.table`) are accepted.
pub fn is_valid_table_name(table: &str) -> bool {
    !table.is_empty()
        && table.split('.').count() <= 2
        && table.split('.').all(|part| {
            !part.is_empty()
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !part.starts_with(|c: char| c.is_ascii_digit())
        })
}

/// Builds the connector selected by `config.backend`.
pub fn connector_from_config(
    config: &WarehouseConfig,
    timeout: Duration,
) -> Result<Box<dyn WarehouseConnector>, LoadError> {
    match config.backend {
        WarehouseBackend::Clickhouse => Ok(Box::new(clickhouse::ClickHouseConnector::new(config, timeout)?)),
        WarehouseBackend::Postgres => Ok(Box::new(pg::PostgresConnector::new(config, timeout))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
