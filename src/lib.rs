/// aqi_harvest: daily air-quality harvest from the WAQI API into a warehouse table.
///
/// # Module structure
///
/// ```text
/// aqi_harvest
/// ├── model       — shared data types (Station, RawReading, NormalizedReading, errors)
/// ├── config      — layered configuration (air_quality.toml, .env, environment)
/// ├── logging     — run-scoped logger handle and env_logger setup
/// ├── stations    — station discovery for a bounding box
/// ├── fetch       — per-station feed retrieval on a bounded worker pool
/// ├── normalize   — raw reading → air_quality row mapping
/// ├── warehouse
/// │   ├── clickhouse — ClickHouse HTTP interface backend
/// │   └── pg         — PostgreSQL backend
/// ├── pipeline    — Discover → Fetch → Normalize → Load, RunReport
/// ├── schedule    — daily cadence without catch-up
/// ├── daemon      — scheduled loop around the pipeline
/// ├── endpoint    — HTTP status endpoint (/health, /runs/latest)
/// └── ingest
///     ├── transport — HttpGet capability + reqwest implementation
///     ├── waqi      — WAQI API: URL construction + JSON parsing
///     └── fixtures (test only) — representative API response payloads
/// ```

/// Public modules
pub mod config;
pub mod daemon;
pub mod endpoint;
pub mod fetch;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod schedule;
pub mod stations;
pub mod warehouse;
