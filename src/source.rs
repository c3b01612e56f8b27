//! # Source Data Loading
//!
//! Loads the per-station JSON bundle produced by the upstream export pipeline
//! and turns it into sorted [`TimePoint`] series.
//!
//! ## Bundle Layout
//! ```json
//! {
//!   "stations": {
//!     "tofino": {
//!       "predictions":      [{ "time": "2025-03-09T08:00:00Z", "value": 1.92 }],
//!       "observations":     [{ "time": "2025-03-09T08:01:00Z", "value": 2.04 }],
//!       "geodetic_offsets": [{ "time": "2025-03-09T08:00:00Z", "value": -2.10 }],
//!       "residuals":        []
//!     }
//!   },
//!   "water_level_forecast": {
//!     "tofino": [{ "time": "2025-03-09T09:00:00Z", "total_water_level_m": 2.3, "storm_surge_m": 0.12 }]
//!   },
//!   "sunlight": {
//!     "tofino": { "2025-03-09": { "first_light": "06:12", "sunrise": "06:44", "sunset": "18:21", "last_light": "18:53" } }
//!   }
//! }
//! ```
//!
//! ## Malformed Samples
//! A sample with an unparsable timestamp or a non-numeric value is dropped with
//! a warning; the rest of the series is still processed. `null` values are kept
//! as gaps. Every parsed series is sorted ascending by time.
//!
//! ## Transport
//! Bundles come from a local file or over HTTP(S) with `reqwest`. Retry and
//! caching policy belong to whoever schedules the fetch.

use crate::TimePoint;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

/// Errors that can occur while loading a source bundle.
#[derive(Error, Debug)]
pub enum SourceError {
    /// HTTP request failed (network, server, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local file could not be read
    #[error("source IO: {0}")]
    Io(#[from] io::Error),

    /// Payload is not a valid bundle
    #[error("invalid bundle JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// All raw series for one station, sorted ascending by time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StationSeries {
    pub predictions: Vec<TimePoint>,
    pub observations: Vec<TimePoint>,
    /// Present only for geodetic stations
    pub geodetic_offsets: Vec<TimePoint>,
    /// Pre-computed residuals, taken at face value
    pub residuals: Vec<TimePoint>,
}

/// One row of the combined water-level forecast.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub total_water_level_m: Option<f64>,
    pub storm_surge_m: Option<f64>,
}

/// Daylight annotation times for one station and date, as supplied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunlightTimes {
    pub first_light: String,
    pub sunrise: String,
    pub sunset: String,
    pub last_light: String,
}

/// Looks up sunlight times used to place day/night markers on a chart.
pub trait SunlightSource {
    fn sunlight_times(&self, station_key: &str, date: &str) -> Option<SunlightTimes>;
}

/// Parsed contents of a source bundle.
#[derive(Clone, Debug, Default)]
pub struct SourceBundle {
    pub stations: HashMap<String, StationSeries>,
    pub water_level_forecast: HashMap<String, Vec<ForecastPoint>>,
    pub sunlight: HashMap<String, HashMap<String, SunlightTimes>>,
    /// Samples dropped as malformed while parsing
    pub dropped_samples: usize,
}

impl SunlightSource for SourceBundle {
    fn sunlight_times(&self, station_key: &str, date: &str) -> Option<SunlightTimes> {
        self.sunlight.get(station_key)?.get(date).cloned()
    }
}

impl SourceBundle {
    pub fn station(&self, key: &str) -> Option<&StationSeries> {
        self.stations.get(key)
    }

    pub fn forecast(&self, key: &str) -> Option<&[ForecastPoint]> {
        self.water_level_forecast.get(key).map(Vec::as_slice)
    }

    /// Parse a bundle from JSON bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SourceError> {
        let raw: RawBundle = serde_json::from_slice(data)?;
        Ok(raw.into_bundle())
    }
}

/// Where a bundle is loaded from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl DataSource {
    pub async fn load(&self) -> Result<SourceBundle, SourceError> {
        match self {
            DataSource::File(path) => load_file(path),
            DataSource::Url(url) => fetch(url).await,
        }
    }
}

/// Read and parse a bundle from disk.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<SourceBundle, SourceError> {
    let data = fs::read(path.as_ref())?;
    let bundle = SourceBundle::from_slice(&data)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        stations = bundle.stations.len(),
        "loaded source bundle"
    );
    Ok(bundle)
}

/// Download and parse a bundle over HTTP(S).
///
/// Non-2xx responses are reported as [`SourceError::Http`].
pub async fn fetch(url: &str) -> Result<SourceBundle, SourceError> {
    let body = reqwest::get(url).await?.error_for_status()?.bytes().await?;
    let bundle = SourceBundle::from_slice(&body)?;
    tracing::debug!(url, stations = bundle.stations.len(), "fetched source bundle");
    Ok(bundle)
}

// -- Raw wire format --

#[derive(Deserialize, Default)]
struct RawBundle {
    #[serde(default)]
    stations: HashMap<String, RawStation>,
    #[serde(default)]
    water_level_forecast: HashMap<String, Vec<Value>>,
    #[serde(default)]
    sunlight: HashMap<String, HashMap<String, Option<SunlightTimes>>>,
}

#[derive(Deserialize, Default)]
struct RawStation {
    #[serde(default)]
    predictions: Vec<Value>,
    #[serde(default)]
    observations: Vec<Value>,
    #[serde(default, alias = "geodeticOffsets")]
    geodetic_offsets: Vec<Value>,
    #[serde(default)]
    residuals: Vec<Value>,
}

impl RawBundle {
    fn into_bundle(self) -> SourceBundle {
        let mut dropped = 0;
        let mut stations = HashMap::with_capacity(self.stations.len());

        for (key, raw) in self.stations {
            let mut parse = |name: &str, samples: &[Value]| {
                let (points, bad) = parse_samples(&key, name, samples);
                dropped += bad;
                points
            };
            let series = StationSeries {
                predictions: parse("predictions", &raw.predictions),
                observations: parse("observations", &raw.observations),
                geodetic_offsets: parse("geodetic_offsets", &raw.geodetic_offsets),
                residuals: parse("residuals", &raw.residuals),
            };
            stations.insert(key, series);
        }

        let mut water_level_forecast = HashMap::with_capacity(self.water_level_forecast.len());
        for (key, rows) in self.water_level_forecast {
            let (points, bad) = parse_forecast(&key, &rows);
            dropped += bad;
            water_level_forecast.insert(key, points);
        }

        let sunlight = self
            .sunlight
            .into_iter()
            .map(|(key, days)| {
                let days = days
                    .into_iter()
                    .filter_map(|(date, times)| times.map(|t| (date, t)))
                    .collect();
                (key, days)
            })
            .collect();

        if dropped > 0 {
            tracing::warn!(dropped, "dropped malformed samples from source bundle");
        }

        SourceBundle {
            stations,
            water_level_forecast,
            sunlight,
            dropped_samples: dropped,
        }
    }
}

/// Parse `[{time, value}]`, returning sorted points and the malformed count.
fn parse_samples(station: &str, series: &str, samples: &[Value]) -> (Vec<TimePoint>, usize) {
    let mut points = Vec::with_capacity(samples.len());
    let mut bad = 0;

    for sample in samples {
        let parsed = parse_time(sample.get("time"))
            .and_then(|time| parse_value(sample.get("value")).map(|value| TimePoint { time, value }));
        match parsed {
            Some(point) => points.push(point),
            None => {
                tracing::warn!(station, series, %sample, "malformed sample dropped");
                bad += 1;
            }
        }
    }

    points.sort_by_key(|p| p.time);
    (points, bad)
}

fn parse_forecast(station: &str, rows: &[Value]) -> (Vec<ForecastPoint>, usize) {
    let mut points = Vec::with_capacity(rows.len());
    let mut bad = 0;

    for row in rows {
        let parsed = parse_time(row.get("time")).and_then(|time| {
            Some(ForecastPoint {
                time,
                total_water_level_m: parse_value(row.get("total_water_level_m"))?,
                storm_surge_m: parse_value(row.get("storm_surge_m"))?,
            })
        });
        match parsed {
            Some(point) => points.push(point),
            None => {
                tracing::warn!(station, series = "water_level_forecast", %row, "malformed sample dropped");
                bad += 1;
            }
        }
    }

    points.sort_by_key(|p| p.time);
    (points, bad)
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
fn parse_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let text = value?.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// `Some(None)` for a null/missing value (a gap), `None` when malformed.
fn parse_value(value: Option<&Value>) -> Option<Option<f64>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(v) => v.as_f64().map(Some),
    }
}
