/// PostgreSQL backend.
///
/// Expected table layout:
///
/// ```sql
/// CREATE TABLE air_quality (
///     station_id         BIGINT,
///     station_name       TEXT,
///     dominant_pollutant TEXT,
///     aqi                NUMERIC,
///     data_timestamp     TIMESTAMPTZ
/// );
/// ```
///
/// Rows are inserted inside one transaction, so a rejected row leaves the
/// table untouched. Values are bound as they are: a text station id or a
/// text AQI (WAQI's `"-"`) is a schema mismatch, not something to coerce.

use super::{Warehouse, WarehouseConnector};
use crate::config::WarehouseConfig;
use crate::model::{AqiValue, LoadError, NormalizedReading, StationId, AIR_QUALITY_COLUMNS};
use postgres::{Client, Config, NoTls};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

pub struct PostgresConnector {
    config: Config,
    host: String,
    database: String,
}

impl PostgresConnector {
    pub fn new(config: &WarehouseConfig, timeout: Duration) -> Self {
        let mut pg = Config::new();
        pg.host(&config.host)
            .port(config.effective_port())
            .user(&config.user)
            .dbname(&config.database)
            .connect_timeout(timeout)
            .application_name("aqi_harvest");
        if let Some(password) = &config.password {
            pg.password(password);
        }

        PostgresConnector {
            config: pg,
            host: config.host.clone(),
            database: config.database.clone(),
        }
    }
}

impl WarehouseConnector for PostgresConnector {
    fn connect(&self) -> Result<Box<dyn Warehouse>, LoadError> {
        let client = self.config.connect(NoTls).map_err(|e| {
            LoadError::Connection(format!(
                "PostgreSQL at {} (database '{}'): {}",
                self.host, self.database, e
            ))
        })?;

        Ok(Box::new(PostgresSession { client }))
    }
}

struct PostgresSession {
    client: Client,
}

impl Warehouse for PostgresSession {
    fn table_exists(&mut self, table: &str) -> Result<bool, LoadError> {
        // `to_regclass` honours the search path and `schema.table` names.
        let row = self
            .client
            .query_one("SELECT to_regclass($1) IS NOT NULL", &[&table])
            .map_err(|e| LoadError::Query(e.to_string()))?;

        Ok(row.get(0))
    }

    fn row_count(&mut self, table: &str) -> Result<u64, LoadError> {
        let row = self
            .client
            .query_one(&format!("SELECT COUNT(*) FROM {}", table), &[])
            .map_err(|e| LoadError::Query(e.to_string()))?;

        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }

    fn append(&mut self, table: &str, rows: &[NormalizedReading]) -> Result<usize, LoadError> {
        let params: Vec<PgRow> = rows.iter().map(PgRow::try_from).collect::<Result<_, _>>()?;

        let sql = insert_statement(table);

        let mut tx = self
            .client
            .transaction()
            .map_err(|e| LoadError::InsertRejected(e.to_string()))?;
        let statement = tx
            .prepare(&sql)
            .map_err(|e| LoadError::InsertRejected(e.to_string()))?;

        for row in &params {
            tx.execute(
                &statement,
                &[
                    &row.station_id,
                    &row.station_name,
                    &row.dominant_pollutant,
                    &row.aqi,
                    &row.data_timestamp,
                ],
            )
            .map_err(|e| LoadError::InsertRejected(e.to_string()))?;
        }

        tx.commit().map_err(|e| LoadError::InsertRejected(e.to_string()))?;
        Ok(params.len())
    }
}

/// A row converted to PostgreSQL parameter types.
#[derive(Debug, PartialEq)]
struct PgRow {
    station_id: Option<i64>,
    station_name: Option<String>,
    dominant_pollutant: Option<String>,
    aqi: Option<Decimal>,
    data_timestamp: Option<String>,
}

impl TryFrom<&NormalizedReading> for PgRow {
    type Error = LoadError;

    fn try_from(row: &NormalizedReading) -> Result<Self, Self::Error> {
        let station_id = match &row.station_id {
            None => None,
            Some(StationId::Numeric(id)) => Some(*id),
            Some(StationId::Text(id)) => {
                return Err(LoadError::SchemaMismatch(format!(
                    "station_id '{}' is not an integer",
                    id
                )));
            }
        };

        let aqi = match &row.aqi {
            None => None,
            Some(AqiValue::Number(n)) => {
                let text = n.to_string();
                let value = Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map_err(|e| LoadError::SchemaMismatch(format!("aqi {}: {}", text, e)))?;
                Some(value)
            }
            Some(other @ (AqiValue::Text(_) | AqiValue::Other(_))) => {
                return Err(LoadError::SchemaMismatch(format!(
                    "aqi '{}' (station {}) is not numeric",
                    other,
                    row.station_id
                        .as_ref()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                )));
            }
        };

        Ok(PgRow {
            station_id,
            station_name: row.station_name.clone(),
            dominant_pollutant: row.dominant_pollutant.clone(),
            aqi,
            data_timestamp: row.observed_at.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Parameterized insert for one row, columns in table order.
fn insert_statement(table: &str) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, CAST($5::TEXT AS TIMESTAMPTZ))",
        table,
        AIR_QUALITY_COLUMNS.join(", ")
    )
}
