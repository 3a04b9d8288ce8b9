//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use aqi_harvest::fetch::StationReadingFetcher;
use aqi_harvest::ingest::transport::{HttpGet, HttpResponse, TransportError};
use aqi_harvest::model::{BoundingBox, LoadError, NormalizedReading};
use aqi_harvest::pipeline::Pipeline;
use aqi_harvest::stations::StationDirectory;
use aqi_harvest::warehouse::{Warehouse, WarehouseConnector, WarehouseLoader};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "http://waqi.test";
pub const TOKEN: &str = "integration-token";

// ---------------------------------------------------------------------------
// Fake WAQI API
// ---------------------------------------------------------------------------

/// Answers GETs from a table of URL fragments. Unknown URLs get a 404.
#[derive(Default)]
pub struct FakeWaqi {
    routes: Vec<(String, u16, String)>,
    calls: Mutex<Vec<String>>,
}

impl FakeWaqi {
    pub fn new() -> Self {
        FakeWaqi::default()
    }

    pub fn route(mut self, fragment: &str, status: u16, body: &str) -> Self {
        self.routes.push((fragment.to_string(), status, body.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn feed_calls(&self) -> usize {
        self.calls().iter().filter(|url| url.contains("/feed/")).count()
    }
}

impl HttpGet for FakeWaqi {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(self
            .routes
            .iter()
            .find(|(fragment, _, _)| url.contains(fragment.as_str()))
            .map(|(_, status, body)| HttpResponse::new(*status, body.clone()))
            .unwrap_or_else(|| HttpResponse::new(404, "not found")))
    }
}

pub fn bounds_body(stations: &[(i64, &str)]) -> String {
    let data: Vec<serde_json::Value> = stations
        .iter()
        .map(|(uid, name)| serde_json::json!({ "uid": uid, "aqi": "17", "station": { "name": name } }))
        .collect();
    serde_json::json!({ "status": "ok", "data": data }).to_string()
}

pub fn feed_body(idx: i64, name: &str, aqi: i64) -> String {
    serde_json::json!({
        "status": "ok",
        "data": {
            "aqi": aqi,
            "idx": idx,
            "city": { "name": name, "geo": [-33.86, 151.16] },
            "dominentpol": "pm25",
            "time": { "s": "2024-05-01 14:00:00", "tz": "+10:00", "iso": "2024-05-01T14:00:00+10:00" }
        }
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Fake warehouse
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct FakeWarehouse {
    pub rows: Arc<Mutex<Vec<NormalizedReading>>>,
    pub connects: Arc<AtomicUsize>,
    pub reject_inserts: bool,
}

impl FakeWarehouse {
    pub fn rejecting() -> Self {
        FakeWarehouse {
            reject_inserts: true,
            ..Default::default()
        }
    }

    pub fn stored(&self) -> Vec<NormalizedReading> {
        self.rows.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

struct FakeSession(FakeWarehouse);

impl Warehouse for FakeSession {
    fn table_exists(&mut self, table: &str) -> Result<bool, LoadError> {
        Ok(table == "air_quality")
    }

    fn row_count(&mut self, _table: &str) -> Result<u64, LoadError> {
        Ok(self.0.rows.lock().unwrap().len() as u64)
    }

    fn append(&mut self, _table: &str, rows: &[NormalizedReading]) -> Result<usize, LoadError> {
        if self.0.reject_inserts {
            return Err(LoadError::InsertRejected("Cannot parse input: expected Float64".to_string()));
        }
        self.0.rows.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len())
    }
}

impl WarehouseConnector for FakeWarehouse {
    fn connect(&self) -> Result<Box<dyn Warehouse>, LoadError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession(self.clone())))
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn pipeline_with(waqi: Arc<FakeWaqi>, warehouse: FakeWarehouse, workers: usize) -> Pipeline {
    let transport: Arc<dyn HttpGet> = waqi;
    Pipeline::new(
        StationDirectory::new(transport.clone(), BASE_URL, TOKEN),
        StationReadingFetcher::new(transport, BASE_URL, TOKEN).with_workers(workers),
        WarehouseLoader::new(Box::new(warehouse), "air_quality"),
        BoundingBox::australia(),
    )
}
