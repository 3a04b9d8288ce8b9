/// Long-running harvest service.
///
/// The daemon:
/// 1. Works out the next scheduled slot (daily, no catch-up)
/// 2. Sleeps until that slot
/// 3. Runs the pipeline once and keeps the report for the status endpoint
/// 4. Repeats, whether the run succeeded or not

use crate::pipeline::{Pipeline, RunReport};
use crate::schedule::DailySchedule;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Latest run report, shared with the status endpoint.
pub type SharedReport = Arc<Mutex<Option<RunReport>>>;

pub struct Daemon {
    pipeline: Pipeline,
    schedule: DailySchedule,
    latest: SharedReport,
}

impl Daemon {
    pub fn new(pipeline: Pipeline, schedule: DailySchedule) -> Self {
        Daemon {
            pipeline,
            schedule,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Handle to the most recent report. Stays valid for the daemon's lifetime.
    pub fn latest_report(&self) -> SharedReport {
        Arc::clone(&self.latest)
    }

    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.schedule.next_after(now)
    }

    /// Runs the pipeline now and records the report.
    pub fn run_once(&self) -> RunReport {
        let report = self.pipeline.run();

        match self.latest.lock() {
            Ok(mut latest) => *latest = Some(report.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(report.clone()),
        }
        report
    }

    /// Main loop (runs indefinitely).
    pub fn run(&self) {
        log::info!("Harvest daemon started, schedule: {}", self.schedule);

        loop {
            let now = Utc::now();
            let next = self.next_run_after(now);
            log::info!("Next run at {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
            std::thread::sleep(self.schedule.wait_from(now));

            let report = self.run_once();
            if report.succeeded() {
                log::info!("Run {} succeeded", report.run_id);
            } else {
                log::error!(
                    "Run {} failed in {}: {}",
                    report.run_id,
                    report
                        .failed_stage
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "unknown stage".to_string()),
                    report.error.as_deref().unwrap_or("no error recorded")
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
