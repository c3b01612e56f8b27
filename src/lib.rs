//! # Tide Chart Core Library
//!
//! This library turns raw per-station tide data into a calibrated, day-windowed
//! set of named series ready for charting. It combines four kinds of input:
//!
//! - **Astronomical predictions** (chart datum, typically 15-minute or hourly)
//! - **Real-time observations** (station datum, often denser than predictions)
//! - **Geodetic offset samples** (datum corrections between chart datum and CGVD28)
//! - **Combined water-level forecasts** (storm surge plus total water level)
//!
//! ## Data Flow
//! 1. **Window**: [`window::resolve_day_window`] finds the local-day `[start, end)`
//!    for the requested day offset in the station's time zone
//! 2. **Calibrate**: [`calibrate::calibrate`] applies the station's geodetic
//!    methodology and derives residuals via [`align`]
//! 3. **Estimate**: [`estimate::estimate_now`] interpolates the "now" water level
//!    (current day only)
//! 4. **Compose**: [`compose::compose`] applies per-station inclusion rules and
//!    returns the ordered series list
//!
//! [`pipeline`] wires the steps together and owns the atomically replaced
//! display slot. Nothing here performs I/O except [`source`], which loads the
//! JSON bundle the pipeline consumes.
//!
//! ## Core Types
//! - [`TimePoint`]: one timestamped value (or gap)
//! - [`Series`]: a named, typed sequence of points with unit and datum

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod align;
pub mod calibrate;
pub mod compose;
pub mod config;
pub mod estimate;
pub mod logging;
pub mod pipeline;
pub mod renderer;
pub mod source;
pub mod window;


/// A single sample at an absolute instant.
///
/// `value` is `None` for a gap reported by the source (a `null` in JSON).
/// Sequences of points are always sorted ascending by `time`.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use tide_chart_lib::TimePoint;
///
/// let p = TimePoint::new(Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap(), 1.25);
/// assert_eq!(p.value, Some(1.25));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
}

impl TimePoint {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        TimePoint {
            time,
            value: Some(value),
        }
    }

    pub fn gap(time: DateTime<Utc>) -> Self {
        TimePoint { time, value: None }
    }
}

/// Semantic tag of a composed series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Prediction,
    Observation,
    CalibratedPrediction,
    CalibratedObservation,
    Residual,
    /// Constant 0 m line drawn with the residual for comparison
    ZeroReference,
    Surge,
    CombinedLevel,
    CurrentEstimate,
}

/// Unit of every value in a series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Meters,
}

/// Zero reference the values of a series are measured from.
///
/// Chart-datum and geodetic values must never be combined without calibration.
/// `Relative` marks difference series (residual, surge) with no absolute zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datum {
    Chart,
    /// CGVD28 geodetic datum
    Geodetic,
    Relative,
}

/// A named, typed series handed to the rendering layer.
///
/// Carries no styling; colours, line widths and number formatting belong to
/// whatever draws it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    pub unit: Unit,
    pub datum: Datum,
    pub points: Vec<TimePoint>,
}

impl Series {
    pub fn new(
        name: impl Into<String>,
        kind: SeriesKind,
        datum: Datum,
        points: Vec<TimePoint>,
    ) -> Self {
        Series {
            name: name.into(),
            kind,
            unit: Unit::Meters,
            datum,
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Smallest and largest non-null value, if any.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.value)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
