#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use sdmxline_core::{Downloader, FetchRequest, Fetched, StreamError};
use sdmxline_oecd::DataflowStructure;
use sdmxline_oecd::api::OecdApi;
use serde_json::{Value, json};
use tempfile::TempDir;

pub const BASE_URL: &str = "http://fixture.test/sdmx-json";
pub const DATASET: &str = "TEST";

/// In-memory downloader: URL → (status, body). Unknown URLs fail like a
/// dropped connection.
pub struct FixtureDownloader {
    dir: TempDir,
    responses: HashMap<String, (u16, Value)>,
    calls: Mutex<Vec<String>>,
}

impl FixtureDownloader {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, url: &str, status: u16, body: Value) -> Self {
        self.responses.insert(url.to_string(), (status, body));
        self
    }

    pub fn with_dataflow(self, body: Value) -> Self {
        let url = api().dataflow_url(DATASET);
        self.respond(&url, 200, body)
    }

    pub fn with_partition(self, key: &str, status: u16, body: Value) -> Self {
        let url = api().data_url(DATASET, key);
        self.respond(&url, status, body)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn data_calls(&self) -> usize {
        self.calls().iter().filter(|u| u.contains("/data/")).count()
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl Downloader for FixtureDownloader {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Fetched, StreamError> {
        self.calls.lock().unwrap().push(request.url.to_string());
        let Some((status, body)) = self.responses.get(request.url) else {
            return Err(StreamError::Http {
                status: None,
                message: "connection refused".into(),
            });
        };
        let path = self.dir.path().join(request.filename);
        if *status < 400 {
            std::fs::write(&path, serde_json::to_vec(body).unwrap()).unwrap();
        }
        Ok(Fetched {
            path,
            status: *status,
            reason: reason(*status).to_string(),
        })
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

pub fn api() -> OecdApi {
    OecdApi::new(BASE_URL)
}

/// Structural document: dimensions `[FREQUENCY, REF_AREA]` plus time,
/// with the given area codelist.
pub fn dataflow(areas: &[(&str, &str)]) -> Value {
    let areas: Vec<Value> = areas
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name}))
        .collect();
    json!({
        "header": {"id": DATASET},
        "structure": {
            "dimensions": {"observation": [
                {"id": "FREQUENCY", "name": "Frequency", "values": [
                    {"id": "M", "name": "Monthly"},
                    {"id": "Q", "name": "Quarterly"},
                    {"id": "S", "name": "Semi-annual"}
                ]},
                {"id": "REF_AREA", "name": "Reference area", "values": areas},
                {"id": "TIME_PERIOD", "name": "Time", "values": []}
            ]},
            "attributes": {
                "dataSet": [],
                "observation": [
                    {"id": "OBS_STATUS", "name": "Observation Status", "values": [
                        {"id": "E", "name": "Estimated value"}
                    ]}
                ]
            }
        }
    })
}

pub fn structure(areas: &[(&str, &str)]) -> DataflowStructure {
    DataflowStructure::decode(&dataflow(areas)).unwrap()
}

/// Data payload for one area: one series per frequency, sharing `periods`.
///
/// Each series gets one observation per period, valued 10, 12, 14, ...
pub fn payload(area: &str, frequencies: &[&str], periods: &[&str]) -> Value {
    let mut series = serde_json::Map::new();
    for (i, _) in frequencies.iter().enumerate() {
        let observations: serde_json::Map<String, Value> = periods
            .iter()
            .enumerate()
            .map(|(p, _)| (p.to_string(), json!([10 + 2 * p])))
            .collect();
        series.insert(
            format!("{i}:0"),
            json!({"attributes": [], "observations": observations}),
        );
    }
    json!({
        "structure": {
            "dimensions": {
                "observation": [{
                    "id": "TIME_PERIOD",
                    "values": periods.iter().map(|p| json!({"id": p})).collect::<Vec<_>>()
                }],
                "series": [
                    {"id": "FREQUENCY", "values": frequencies.iter().map(|f| json!({"id": f})).collect::<Vec<_>>()},
                    {"id": "REF_AREA", "values": [{"id": area}]}
                ]
            },
            "attributes": {"series": [], "observation": []}
        },
        "dataSets": [{"series": series}]
    })
}

/// Successful payload without any series
pub fn empty_payload() -> Value {
    let mut doc = payload("FR", &[], &["2020-01"]);
    doc["dataSets"] = json!([{"series": {}}]);
    doc
}
