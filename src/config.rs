/// Configuration loader - `air_quality.toml` plus environment overrides
///
/// Everything a run needs is resolved once, at startup, into an
/// `AppConfig` that is then passed to each component. Sources, lowest
/// priority first:
///
/// 1. built-in defaults
/// 2. the TOML file (`air_quality.toml` in the working directory, or `--config PATH`)
/// 3. environment variables, with `.env` loaded first if present
///
/// Secrets (API token, warehouse password) are expected to come from the
/// environment. The API token has no default.

use crate::fetch::DEFAULT_FETCH_WORKERS;
use crate::ingest::transport::DEFAULT_TIMEOUT_SECS;
use crate::ingest::waqi::WAQI_API_BASE;
use crate::model::{BoundingBox, AIR_QUALITY_TABLE};
use crate::schedule::DailySchedule;
use crate::warehouse::is_valid_table_name;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file read when no `--config` path is given. Optional.
pub const DEFAULT_CONFIG_PATH: &str = "air_quality.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

// ---------------------------------------------------------------------------
// Configuration structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub warehouse: WarehouseConfig,
    pub pipeline: PipelineConfig,
}

/// WAQI API access.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API token. Prefer `WAQI_API_TOKEN` over putting it in the file.
    pub token: Option<String>,
    pub base_url: String,
    pub bounds: BoundingBox,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            token: None,
            base_url: WAQI_API_BASE.to_string(),
            bounds: BoundingBox::australia(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    Clickhouse,
    Postgres,
}

impl std::str::FromStr for WarehouseBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clickhouse" => Ok(WarehouseBackend::Clickhouse),
            "postgres" | "postgresql" => Ok(WarehouseBackend::Postgres),
            other => Err(format!("unknown backend '{}' (expected clickhouse or postgres)", other)),
        }
    }
}

/// Warehouse connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub backend: WarehouseBackend,
    pub host: String,
    /// Defaults to the backend's standard port when unset.
    pub port: Option<u16>,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub table: String,
}

impl WarehouseConfig {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.backend {
            WarehouseBackend::Clickhouse => 8123,
            WarehouseBackend::Postgres => 5432,
        })
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        WarehouseConfig {
            backend: WarehouseBackend::Clickhouse,
            host: "localhost".to_string(),
            port: None,
            user: "default".to_string(),
            password: None,
            database: "default".to_string(),
            table: AIR_QUALITY_TABLE.to_string(),
        }
    }
}

/// Run behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent feed requests; 1 fetches sequentially.
    pub fetch_workers: usize,
    /// Daily run time, `HH:MM` in UTC.
    pub schedule_at: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            fetch_workers: DEFAULT_FETCH_WORKERS,
            schedule_at: "00:00".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Loads configuration from `path` (or the default file if it exists),
    /// `.env`, and the process environment, then validates it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let file = match path {
            Some(p) => Some(p),
            None if default_path.exists() => Some(default_path),
            None => None,
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Same as `load` with an explicit variable lookup, and without `.env`.
    pub fn from_sources<F>(file: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => AppConfig::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("WAQI_API_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(url) = var("WAQI_API_URL") {
            self.api.base_url = url;
        }
        if let Some(bounds) = var("WAQI_BOUNDS") {
            self.api.bounds = bounds
                .parse()
                .map_err(|message| ConfigError::Invalid { key: "WAQI_BOUNDS", message })?;
        }
        if let Some(secs) = var("HTTP_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_number("HTTP_TIMEOUT_SECS", &secs)?;
        }

        if let Some(backend) = var("WAREHOUSE_BACKEND") {
            self.warehouse.backend = backend
                .parse()
                .map_err(|message| ConfigError::Invalid { key: "WAREHOUSE_BACKEND", message })?;
        }
        if let Some(host) = var("WAREHOUSE_HOST") {
            self.warehouse.host = host;
        }
        if let Some(port) = var("WAREHOUSE_PORT") {
            self.warehouse.port = Some(parse_number("WAREHOUSE_PORT", &port)?);
        }
        if let Some(user) = var("WAREHOUSE_USER") {
            self.warehouse.user = user;
        }
        if let Some(password) = var("WAREHOUSE_PASSWORD") {
            self.warehouse.password = Some(password);
        }
        if let Some(database) = var("WAREHOUSE_DATABASE") {
            self.warehouse.database = database;
        }
        if let Some(table) = var("WAREHOUSE_TABLE") {
            self.warehouse.table = table;
        }

        if let Some(workers) = var("FETCH_WORKERS") {
            self.pipeline.fetch_workers = parse_number("FETCH_WORKERS", &workers)?;
        }
        if let Some(at) = var("SCHEDULE_AT") {
            self.pipeline.schedule_at = at;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match &self.api.token {
            Some(token) if !token.trim().is_empty() => {}
            _ => return Err(ConfigError::Missing("WAQI_API_TOKEN")),
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "WAQI_API_URL",
                message: format!("'{}' is not an http(s) URL", self.api.base_url),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS",
                message: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.fetch_workers == 0 {
            return Err(ConfigError::Invalid {
                key: "FETCH_WORKERS",
                message: "must be at least 1".to_string(),
            });
        }
        if !is_valid_table_name(&self.warehouse.table) {
            return Err(ConfigError::Invalid {
                key: "WAREHOUSE_TABLE",
                message: format!("'{}' is not a plain table name", self.warehouse.table),
            });
        }
        self.schedule()?;
        Ok(())
    }

    /// The API token. Present after validation.
    pub fn token(&self) -> &str {
        self.api.token.as_deref().unwrap_or_default()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn schedule(&self) -> Result<DailySchedule, ConfigError> {
        self.pipeline
            .schedule_at
            .parse()
            .map_err(|message| ConfigError::Invalid { key: "SCHEDULE_AT", message })
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: format!("'{}': {}", value, e),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
