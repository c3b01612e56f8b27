//! # Series Composition
//!
//! Merges raw, calibrated and forecast data into the ordered list of series a
//! chart draws, applying the per-station inclusion rules:
//!
//! | Series                  | Included when                                          |
//! |-------------------------|--------------------------------------------------------|
//! | Astronomical prediction | methodology is not `CalibratePrediction`               |
//! | Observation             | current day, methodology is not `CalibrateObservation` |
//! | Calibrated series       | current day, station produced one                      |
//! | Residual + zero line    | current day, at least one residual                     |
//! | Storm surge forecast    | forecast available for the window                      |
//! | Total water level       | forecast available, methodology is `None`              |
//! | Current estimate        | current day, estimate available (always last)          |
//!
//! Rows gated only on methodology and day are composed even when their
//! points are empty. Residuals and the forecast series are data-gated: an
//! empty residual set or a forecast with no rows in the window adds nothing.
//!
//! Geodetic stations never get the total water level: it is published against
//! chart datum and would be mixed with geodetic values.
//!
//! Values stay full-precision; formatting is up to the renderer.

use crate::calibrate::{Calibrated, CalibrationResult, Methodology, StationProfile};
use crate::estimate::CurrentEstimate;
use crate::source::ForecastPoint;
use crate::window::DayWindow;
use crate::{Datum, Series, SeriesKind, TimePoint};

/// Raw day-windowed series for a station.
#[derive(Clone, Copy, Debug)]
pub struct RawSeries<'a> {
    pub predictions: &'a [TimePoint],
    pub observations: &'a [TimePoint],
}

/// Storm surge and total water level split out of the combined forecast.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForecastSeries {
    pub surge: Vec<TimePoint>,
    pub combined: Vec<TimePoint>,
}

impl ForecastSeries {
    /// Split forecast rows inside `window` into surge and total level series.
    pub fn from_forecast(points: &[ForecastPoint], window: &DayWindow) -> Self {
        let lo = points.partition_point(|p| p.time < window.start);
        let hi = points.partition_point(|p| p.time < window.end).max(lo);
        let rows = &points[lo..hi];

        ForecastSeries {
            surge: rows
                .iter()
                .map(|p| TimePoint {
                    time: p.time,
                    value: p.storm_surge_m,
                })
                .collect(),
            combined: rows
                .iter()
                .map(|p| TimePoint {
                    time: p.time,
                    value: p.total_water_level_m,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.surge.is_empty() && self.combined.is_empty()
    }
}

/// Build the ordered series list for one station and day.
///
/// `day_offset` 0 is the current day; observation-derived series and the
/// current estimate are only drawn then.
pub fn compose(
    profile: &StationProfile,
    window: &DayWindow,
    day_offset: i64,
    raw: RawSeries<'_>,
    calibration: &CalibrationResult,
    estimate: Option<&CurrentEstimate>,
    forecast: Option<&ForecastSeries>,
) -> Vec<Series> {
    let methodology = profile.methodology;
    let current_day = day_offset == 0;
    let observed_datum = if methodology.is_geodetic() {
        Datum::Geodetic
    } else {
        Datum::Chart
    };

    let mut out = Vec::with_capacity(8);

    if methodology != Methodology::CalibratePrediction {
        out.push(Series::new(
            "Astronomical prediction",
            SeriesKind::Prediction,
            Datum::Chart,
            raw.predictions.to_vec(),
        ));
    }

    if current_day && methodology != Methodology::CalibrateObservation {
        out.push(Series::new(
            "Observed water level",
            SeriesKind::Observation,
            observed_datum,
            raw.observations.to_vec(),
        ));
    }

    if current_day {
        match &calibration.calibrated {
            Some(Calibrated::Prediction(points)) => out.push(Series::new(
                "Calibrated prediction",
                SeriesKind::CalibratedPrediction,
                Datum::Geodetic,
                points.clone(),
            )),
            Some(Calibrated::Observation(points)) => out.push(Series::new(
                "Calibrated observation",
                SeriesKind::CalibratedObservation,
                Datum::Chart,
                points.clone(),
            )),
            None => {}
        }

        if !calibration.residuals.is_empty() {
            out.push(Series::new(
                "Residual",
                SeriesKind::Residual,
                Datum::Relative,
                calibration.residuals.clone(),
            ));
            out.push(Series::new(
                "Zero reference",
                SeriesKind::ZeroReference,
                Datum::Relative,
                vec![TimePoint::new(window.start, 0.0), TimePoint::new(window.end, 0.0)],
            ));
        }
    }

    if let Some(forecast) = forecast.filter(|f| !f.is_empty()) {
        out.push(Series::new(
            "Storm surge forecast",
            SeriesKind::Surge,
            Datum::Relative,
            forecast.surge.clone(),
        ));
        if !methodology.is_geodetic() {
            out.push(Series::new(
                "Total water level forecast",
                SeriesKind::CombinedLevel,
                Datum::Chart,
                forecast.combined.clone(),
            ));
        }
    }

    if let Some(estimate) = estimate.filter(|_| current_day) {
        let datum = match methodology {
            Methodology::CalibratePrediction => Datum::Geodetic,
            _ => Datum::Chart,
        };
        out.push(Series::new(
            "Current estimate",
            SeriesKind::CurrentEstimate,
            datum,
            vec![TimePoint::new(estimate.time, estimate.estimated_value)],
        ));
    }

    tracing::debug!(
        station = %profile.key,
        day_offset,
        series = out.len(),
        "composed chart series"
    );

    out
}
