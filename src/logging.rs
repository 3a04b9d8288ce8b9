/// Run-scoped logging for the harvest pipeline
///
/// Each stage receives a `RunLogger` handle instead of reaching for a
/// process-wide logger. Entries go to the `log` facade (backed by
/// `env_logger` in the binary) tagged with the run id, stage and station.
/// A capturing logger additionally keeps entries in memory so tests can
/// assert on per-station outcomes.

use log::Level;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Fetch,
    Normalize,
    Load,
    Pipeline,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discover => write!(f, "discover"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::Normalize => write!(f, "normalize"),
            Stage::Load => write!(f, "load"),
            Stage::Pipeline => write!(f, "pipeline"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger handle
// ---------------------------------------------------------------------------

/// A log entry as recorded by a capturing logger.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: Level,
    pub stage: Stage,
    pub station: Option<String>,
    pub message: String,
}

/// Cheap-to-clone logging handle threaded through every stage.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    stage: Stage,
    capture: Option<Arc<Mutex<Vec<LogEntry>>>>,
}

impl RunLogger {
    /// Logger that only forwards to the `log` facade.
    pub fn new(run_id: impl Into<String>) -> Self {
        RunLogger {
            run_id: run_id.into(),
            stage: Stage::Pipeline,
            capture: None,
        }
    }

    /// Logger that also records every entry in memory.
    pub fn capturing(run_id: impl Into<String>) -> Self {
        RunLogger {
            run_id: run_id.into(),
            stage: Stage::Pipeline,
            capture: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Handle for a specific stage. Shares the capture buffer.
    pub fn for_stage(&self, stage: Stage) -> Self {
        RunLogger {
            run_id: self.run_id.clone(),
            stage,
            capture: self.capture.clone(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn debug(&self, station: Option<&str>, message: &str) {
        self.log(Level::Debug, station, message);
    }

    pub fn info(&self, station: Option<&str>, message: &str) {
        self.log(Level::Info, station, message);
    }

    pub fn warn(&self, station: Option<&str>, message: &str) {
        self.log(Level::Warn, station, message);
    }

    pub fn error(&self, station: Option<&str>, message: &str) {
        self.log(Level::Error, station, message);
    }

    pub fn log(&self, level: Level, station: Option<&str>, message: &str) {
        let station_part = station.map(|s| format!(" [{}]", s)).unwrap_or_default();
        log::log!(
            target: "aqi_harvest",
            level,
            "run={} {}{}: {}",
            self.run_id,
            self.stage,
            station_part,
            message
        );

        if let Some(capture) = &self.capture {
            // A poisoned buffer only loses test diagnostics.
            if let Ok(mut entries) = capture.lock() {
                entries.push(LogEntry {
                    level,
                    stage: self.stage,
                    station: station.map(String::from),
                    message: message.to_string(),
                });
            }
        }
    }

    /// Entries recorded so far. Always empty for a non-capturing logger.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.capture
            .as_ref()
            .and_then(|c| c.lock().ok().map(|entries| entries.clone()))
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Process setup and summaries
// ---------------------------------------------------------------------------

/// Install `env_logger` as the `log` backend. `RUST_LOG` overrides the
/// default `info` filter. Calling this twice is harmless.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init();
}

/// Log a summary of a fetch batch at a level matching its outcome.
pub fn log_fetch_summary(logger: &RunLogger, total: usize, retrieved: usize, skipped: usize) {
    let message = format!(
        "Retrieved data for {} of {} stations ({} skipped)",
        retrieved, total, skipped
    );

    if skipped == 0 {
        logger.info(None, &message);
    } else if retrieved == 0 {
        logger.error(None, &message);
    } else {
        logger.warn(None, &message);
    }
}
