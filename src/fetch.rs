/// Per-station feed retrieval with failure isolation.
///
/// Every station is fetched independently. A station that cannot be read
/// (HTTP error, timeout, malformed envelope, upstream "error" status) is
/// logged and dropped; the rest of the batch continues. Nothing in here
/// fails the run.
///
/// Fetches run on a bounded thread pool. Each job reports back with its
/// input index and results are reassembled in station order, so output
/// order is always the input order minus skipped stations.

use crate::ingest::transport::HttpGet;
use crate::ingest::waqi::{build_feed_url, parse_feed_response, redact_token};
use crate::logging::{log_fetch_summary, RunLogger};
use crate::model::{RawReading, SkipReason, Station};
use serde::Serialize;
use std::sync::{mpsc, Arc};
use threadpool::ThreadPool;

/// Default number of concurrent feed requests.
pub const DEFAULT_FETCH_WORKERS: usize = 4;

/// A station dropped from the batch, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedStation {
    pub station: Station,
    pub reason: SkipReason,
}

/// Result of one fetch batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Raw readings in input order.
    pub readings: Vec<RawReading>,
    /// Stations that produced no reading, in input order.
    pub skipped: Vec<SkippedStation>,
}

pub struct StationReadingFetcher {
    transport: Arc<dyn HttpGet>,
    base_url: String,
    token: String,
    workers: usize,
}

impl StationReadingFetcher {
    pub fn new(transport: Arc<dyn HttpGet>, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        StationReadingFetcher {
            transport,
            base_url: base_url.into(),
            token: token.into(),
            workers: DEFAULT_FETCH_WORKERS,
        }
    }

    /// Sets the concurrency bound. `1` fetches sequentially on the caller's thread.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Retrieves the latest reading for each station.
    pub fn fetch_readings(&self, stations: &[Station], log: &RunLogger) -> FetchOutcome {
        log.info(None, &format!("Retrieving data for {} stations", stations.len()));

        let results = if self.workers <= 1 || stations.len() <= 1 {
            stations
                .iter()
                .map(|station| {
                    fetch_station(self.transport.as_ref(), &self.base_url, &self.token, station, log)
                })
                .collect()
        } else {
            self.fetch_parallel(stations, log)
        };

        let mut outcome = FetchOutcome::default();
        for (station, result) in stations.iter().zip(results) {
            match result {
                Ok(reading) => outcome.readings.push(reading),
                Err(reason) => outcome.skipped.push(SkippedStation {
                    station: station.clone(),
                    reason,
                }),
            }
        }

        log_fetch_summary(log, stations.len(), outcome.readings.len(), outcome.skipped.len());
        outcome
    }

    fn fetch_parallel(
        &self,
        stations: &[Station],
        log: &RunLogger,
    ) -> Vec<Result<RawReading, SkipReason>> {
        let pool = ThreadPool::new(self.workers.min(stations.len()));
        let (tx, rx) = mpsc::channel();

        for (index, station) in stations.iter().cloned().enumerate() {
            let tx = tx.clone();
            let transport = Arc::clone(&self.transport);
            let base_url = self.base_url.clone();
            let token = self.token.clone();
            let log = log.clone();

            pool.execute(move || {
                let result = fetch_station(transport.as_ref(), &base_url, &token, &station, &log);
                // The receiver outlives every job.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<Result<RawReading, SkipReason>>> =
            (0..stations.len()).map(|_| None).collect();
        for (index, result) in rx {
            slots[index] = Some(result);
        }

        // A job that panicked never sent; its sender was dropped during unwinding.
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(SkipReason::Transport("fetch worker panicked".to_string()))
                })
            })
            .collect()
    }
}

/// Fetches and validates one station's feed, logging the outcome.
fn fetch_station(
    transport: &dyn HttpGet,
    base_url: &str,
    token: &str,
    station: &Station,
    log: &RunLogger,
) -> Result<RawReading, SkipReason> {
    let station_id = station.id.to_string();
    let url = build_feed_url(base_url, &station.id, token);
    log.debug(
        Some(&station_id),
        &format!("Retrieving data for {} from {}", station.name, redact_token(&url, token)),
    );

    let result = transport
        .get(&url)
        .map_err(|e| SkipReason::Transport(e.to_string()))
        .and_then(|response| {
            if response.is_success() {
                parse_feed_response(&response.body)
            } else {
                Err(SkipReason::UpstreamUnavailable(response.status))
            }
        });

    match &result {
        Ok(_) => log.info(Some(&station_id), &format!("Retrieved reading for {}", station.name)),
        Err(reason) => log.log(
            reason.severity(),
            Some(&station_id),
            &format!("Skipping {}: {}", station.name, reason),
        ),
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
