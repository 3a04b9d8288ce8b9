/// One harvest run: Discover → Fetch → Normalize → Load.
///
/// Stages run strictly in sequence, each consuming the previous stage's
/// batch. Directory errors, malformed readings and load failures end the
/// run as `Failed`; stations skipped during Fetch never do. Every run ends
/// with a `RunReport`, successful or not.

use crate::config::AppConfig;
use crate::fetch::{SkippedStation, StationReadingFetcher};
use crate::ingest::transport::{HttpGet, ReqwestTransport, TransportError};
use crate::logging::{RunLogger, Stage};
use crate::model::{BoundingBox, DirectoryError, LoadError, NormalizeError};
use crate::normalize::normalize;
use crate::stations::StationDirectory;
use crate::warehouse::{connector_from_config, WarehouseLoader};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Run state and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Discover,
    Fetch,
    Normalize,
    Load,
    Succeeded,
    Failed,
}

/// A failure that ends the run.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("station discovery failed: {0}")]
    Discover(#[from] DirectoryError),
    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("warehouse load failed: {0}")]
    Load(#[from] LoadError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Discover(_) => Stage::Discover,
            PipelineError::Normalize(_) => Stage::Normalize,
            PipelineError::Load(_) => Stage::Load,
        }
    }
}

/// Could not assemble a pipeline from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("HTTP client: {0}")]
    Transport(#[from] TransportError),
    #[error("warehouse: {0}")]
    Warehouse(#[from] LoadError),
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Summary of one run, returned to the caller and served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: RunState,
    pub stations_discovered: usize,
    pub readings_fetched: usize,
    pub rows_normalized: usize,
    pub rows_loaded: usize,
    pub skipped: Vec<SkippedStation>,
    pub stages_completed: Vec<Stage>,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
}

impl RunReport {
    fn start(run_id: &str) -> Self {
        RunReport {
            run_id: run_id.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::Pending,
            stations_discovered: 0,
            readings_fetched: 0,
            rows_normalized: 0,
            rows_loaded: 0,
            skipped: Vec::new(),
            stages_completed: Vec::new(),
            failed_stage: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    directory: StationDirectory,
    fetcher: StationReadingFetcher,
    loader: WarehouseLoader,
    bounds: BoundingBox,
}

impl Pipeline {
    pub fn new(
        directory: StationDirectory,
        fetcher: StationReadingFetcher,
        loader: WarehouseLoader,
        bounds: BoundingBox,
    ) -> Self {
        Pipeline {
            directory,
            fetcher,
            loader,
            bounds,
        }
    }

    /// Wires the real HTTP transport and the configured warehouse backend.
    pub fn from_config(config: &AppConfig) -> Result<Self, SetupError> {
        let transport: Arc<dyn HttpGet> = Arc::new(ReqwestTransport::new(config.http_timeout())?);
        let base_url = config.api.base_url.trim_end_matches('/').to_string();

        let directory = StationDirectory::new(transport.clone(), base_url.clone(), config.token());
        let fetcher = StationReadingFetcher::new(transport, base_url, config.token())
            .with_workers(config.pipeline.fetch_workers);
        let connector = connector_from_config(&config.warehouse, config.http_timeout())?;
        let loader = WarehouseLoader::new(connector, config.warehouse.table.clone());

        Ok(Pipeline::new(directory, fetcher, loader, config.api.bounds))
    }

    /// Runs once with a fresh run id derived from the current time.
    pub fn run(&self) -> RunReport {
        self.run_with_logger(&RunLogger::new(run_id_for(Utc::now())))
    }

    pub fn run_with_logger(&self, log: &RunLogger) -> RunReport {
        let mut report = RunReport::start(log.run_id());
        let pipeline_log = log.for_stage(Stage::Pipeline);
        pipeline_log.info(None, &format!("Starting run, target table '{}'", self.loader.table()));

        match self.execute(log, &mut report) {
            Ok(()) => {
                report.state = RunState::Succeeded;
                pipeline_log.info(
                    None,
                    &format!(
                        "Run succeeded: {} stations, {} readings, {} rows loaded, {} skipped",
                        report.stations_discovered,
                        report.readings_fetched,
                        report.rows_loaded,
                        report.skipped.len()
                    ),
                );
            }
            Err(e) => {
                report.state = RunState::Failed;
                report.failed_stage = Some(e.stage());
                report.error = Some(e.to_string());
                log.for_stage(e.stage()).error(None, &format!("Run failed: {}", e));
            }
        }

        report.finished_at = Some(Utc::now());
        report
    }

    fn execute(&self, log: &RunLogger, report: &mut RunReport) -> Result<(), PipelineError> {
        report.state = RunState::Discover;
        let stations = self
            .directory
            .list_stations(&self.bounds, &log.for_stage(Stage::Discover))?;
        report.stations_discovered = stations.len();
        report.stages_completed.push(Stage::Discover);

        report.state = RunState::Fetch;
        let outcome = self.fetcher.fetch_readings(&stations, &log.for_stage(Stage::Fetch));
        report.readings_fetched = outcome.readings.len();
        report.skipped = outcome.skipped;
        report.stages_completed.push(Stage::Fetch);

        report.state = RunState::Normalize;
        let rows = normalize(&outcome.readings, &log.for_stage(Stage::Normalize))?;
        report.rows_normalized = rows.len();
        report.stages_completed.push(Stage::Normalize);

        report.state = RunState::Load;
        let summary = self.loader.load(&rows, &log.for_stage(Stage::Load))?;
        report.rows_loaded = summary.rows_inserted;
        report.stages_completed.push(Stage::Load);

        Ok(())
    }
}

/// Run ids are the UTC start time, e.g. `20240501T000000Z`.
pub fn run_id_for(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
