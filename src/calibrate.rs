//! # Geodetic Calibration
//!
//! Geodetic stations report observations against CGVD28 while astronomical
//! predictions are published against chart datum. Before observations and
//! predictions can be compared, one of them is shifted by externally supplied
//! offset samples. Which one depends on the station:
//!
//! - [`Methodology::CalibratePrediction`]: `prediction + offset` at every
//!   prediction timestamp with an offset sample at exactly that instant.
//!   Residual = `observation - calibrated prediction` (nearest within tolerance).
//! - [`Methodology::CalibrateObservation`]: `observation + offset` using the
//!   nearest offset within tolerance. Residual = `calibrated observation -
//!   prediction` (nearest within tolerance).
//! - [`Methodology::None`]: nothing is calibrated; residuals supplied
//!   pre-computed by the source are passed through untouched.
//!
//! A station produces at most one calibrated series. [`Calibrated`] carries
//! it tagged by kind, so a result can never hold both.
//!
//! Only samples inside the day window are considered. The latest residual is
//! returned as [`CalibrationResult::current_residual`] for consumers that need
//! a live correction independent of the chart.

use crate::align::{align, align_bulk};
use crate::source::StationSeries;
use crate::window::DayWindow;
use crate::TimePoint;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// How a station's geodetic offsets are applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Methodology {
    #[default]
    None,
    CalibratePrediction,
    CalibrateObservation,
}

impl Methodology {
    pub fn is_geodetic(self) -> bool {
        self != Methodology::None
    }
}

/// Station identity plus its calibration methodology.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationProfile {
    pub key: String,
    #[serde(default)]
    pub methodology: Methodology,
}

impl StationProfile {
    pub fn new(key: impl Into<String>, methodology: Methodology) -> Self {
        StationProfile {
            key: key.into(),
            methodology,
        }
    }
}

/// The single calibrated series a geodetic station produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "points", rename_all = "snake_case")]
pub enum Calibrated {
    Prediction(Vec<TimePoint>),
    Observation(Vec<TimePoint>),
}

impl Calibrated {
    pub fn points(&self) -> &[TimePoint] {
        match self {
            Calibrated::Prediction(p) | Calibrated::Observation(p) => p,
        }
    }
}

/// Output of [`calibrate`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub calibrated: Option<Calibrated>,
    pub residuals: Vec<TimePoint>,
    /// Most recent residual in the window, by timestamp
    pub current_residual: Option<TimePoint>,
}

impl CalibrationResult {
    /// Calibrated predictions, empty unless the methodology produced them.
    pub fn calibrated_predictions(&self) -> &[TimePoint] {
        match &self.calibrated {
            Some(Calibrated::Prediction(p)) => p,
            _ => &[],
        }
    }

    /// Calibrated observations, empty unless the methodology produced them.
    pub fn calibrated_observations(&self) -> &[TimePoint] {
        match &self.calibrated {
            Some(Calibrated::Observation(p)) => p,
            _ => &[],
        }
    }
}

/// Apply the station's methodology to its data inside `window`.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use tide_chart_lib::calibrate::{calibrate, Methodology, StationProfile};
/// use tide_chart_lib::source::StationSeries;
/// use tide_chart_lib::window::resolve_day_window;
/// use tide_chart_lib::TimePoint;
///
/// let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
/// let window = resolve_day_window(now, 0, chrono_tz::UTC);
/// let data = StationSeries {
///     predictions: vec![TimePoint::new(now, 1.0)],
///     observations: vec![TimePoint::new(now + Duration::minutes(1), 3.5)],
///     geodetic_offsets: vec![TimePoint::new(now, 2.0)],
///     residuals: vec![],
/// };
/// let profile = StationProfile::new("tofino", Methodology::CalibratePrediction);
///
/// let result = calibrate(&profile, &data, &window, Duration::minutes(5));
/// assert_eq!(result.calibrated_predictions()[0].value, Some(3.0));
/// assert_eq!(result.current_residual.unwrap().value, Some(0.5));
/// ```
pub fn calibrate(
    profile: &StationProfile,
    data: &StationSeries,
    window: &DayWindow,
    tolerance: Duration,
) -> CalibrationResult {
    let predictions = window.filter(&data.predictions);
    let observations = window.filter(&data.observations);

    let (calibrated, residuals) = match profile.methodology {
        Methodology::CalibratePrediction => {
            let offsets = window.filter(&data.geodetic_offsets);
            let calibrated = calibrate_predictions(&predictions, &offsets);
            let residuals = residuals_between(&observations, &calibrated, tolerance);
            (Some(Calibrated::Prediction(calibrated)), residuals)
        }
        Methodology::CalibrateObservation => {
            let offsets = window.filter(&data.geodetic_offsets);
            let calibrated = calibrate_observations(&observations, &offsets, tolerance);
            let residuals = residuals_between(&calibrated, &predictions, tolerance);
            (Some(Calibrated::Observation(calibrated)), residuals)
        }
        Methodology::None => (None, window.filter(&data.residuals)),
    };

    let current_residual = residuals.iter().rev().find(|p| p.value.is_some()).copied();

    tracing::debug!(
        station = %profile.key,
        methodology = ?profile.methodology,
        calibrated = calibrated.as_ref().map_or(0, |c| c.points().len()),
        residuals = residuals.len(),
        "calibrated station"
    );

    CalibrationResult {
        calibrated,
        residuals,
        current_residual,
    }
}

/// `prediction + offset` where an offset exists at exactly the same instant.
///
/// Both inputs are sorted, so a single merge pass suffices. A prediction with
/// no offset at its timestamp yields nothing.
fn calibrate_predictions(predictions: &[TimePoint], offsets: &[TimePoint]) -> Vec<TimePoint> {
    let mut out = Vec::with_capacity(predictions.len());
    let mut offsets = offsets.iter().peekable();

    for prediction in predictions {
        while offsets.next_if(|o| o.time < prediction.time).is_some() {}
        let Some(offset) = offsets.peek() else {
            break;
        };
        if offset.time != prediction.time {
            continue;
        }
        if let (Some(p), Some(o)) = (prediction.value, offset.value) {
            out.push(TimePoint::new(prediction.time, p + o));
        }
    }

    out
}

/// `observation + nearest offset` within tolerance.
fn calibrate_observations(
    observations: &[TimePoint],
    offsets: &[TimePoint],
    tolerance: Duration,
) -> Vec<TimePoint> {
    observations
        .iter()
        .filter_map(|obs| {
            let value = obs.value?;
            let offset = align(obs.time, offsets, tolerance)?.value?;
            Some(TimePoint::new(obs.time, value + offset))
        })
        .collect()
}

/// `actual - baseline` at each actual sample with a baseline within tolerance.
fn residuals_between(actual: &[TimePoint], baseline: &[TimePoint], tolerance: Duration) -> Vec<TimePoint> {
    align_bulk(actual, baseline, tolerance)
        .into_iter()
        .map(|pair| TimePoint::new(pair.time, pair.left - pair.right))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::default_tolerance;
    use crate::window::resolve_day_window;
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(minutes)
    }

    fn window() -> DayWindow {
        resolve_day_window(at(12 * 60), 0, chrono_tz::UTC)
    }

    fn geodetic_station() -> StationSeries {
        StationSeries {
            predictions: vec![
                TimePoint::new(at(0), 1.0),
                TimePoint::new(at(15), 1.2),
                TimePoint::new(at(30), 1.4),
                TimePoint::new(at(45), 1.5),
            ],
            observations: vec![
                TimePoint::new(at(1), 3.3),
                TimePoint::new(at(14), 3.1),
                TimePoint::new(at(22), 3.9),
                TimePoint::new(at(44), 3.6),
            ],
            geodetic_offsets: vec![
                TimePoint::new(at(0), 2.0),
                // no offset at :15
                TimePoint::new(at(30), 2.0),
                TimePoint::new(at(45), 2.1),
            ],
            residuals: vec![TimePoint::new(at(10), 9.9)],
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn prediction_methodology_uses_exact_offset_timestamps() {
        let profile = StationProfile::new("s", Methodology::CalibratePrediction);
        let result = calibrate(&profile, &geodetic_station(), &window(), default_tolerance());

        let cal = result.calibrated_predictions();
        let times: Vec<_> = cal.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![at(0), at(30), at(45)]);
        assert_close(cal[2].value.unwrap(), 3.6);
        assert!(result.calibrated_observations().is_empty());
    }

    #[test]
    fn prediction_methodology_residuals() {
        let profile = StationProfile::new("s", Methodology::CalibratePrediction);
        let result = calibrate(&profile, &geodetic_station(), &window(), default_tolerance());

        // :14 has no calibrated prediction within 5 min (:15 was skipped), :22 misses too
        let times: Vec<_> = result.residuals.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![at(1), at(44)]);
        assert_close(result.residuals[0].value.unwrap(), 3.3 - 3.0);
        assert_close(result.residuals[1].value.unwrap(), 3.6 - 3.6);
        assert_eq!(result.current_residual.unwrap().time, at(44));
    }

    #[test]
    fn observation_methodology() {
        let profile = StationProfile::new("s", Methodology::CalibrateObservation);
        let result = calibrate(&profile, &geodetic_station(), &window(), default_tolerance());

        let cal = result.calibrated_observations();
        // :14 nearest offset within 5 min: none (:15 missing, :0 and :30 too far)
        let times: Vec<_> = cal.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![at(1), at(44)]);
        assert_close(cal[0].value.unwrap(), 5.3);
        assert_close(cal[1].value.unwrap(), 5.7);
        assert!(result.calibrated_predictions().is_empty());

        assert_close(result.residuals[0].value.unwrap(), 5.3 - 1.0);
        assert_close(result.residuals[1].value.unwrap(), 5.7 - 1.5);
    }

    #[test]
    fn no_methodology_passes_residuals_through() {
        let profile = StationProfile::new("s", Methodology::None);
        let result = calibrate(&profile, &geodetic_station(), &window(), default_tolerance());

        assert!(result.calibrated.is_none());
        assert_eq!(result.residuals, vec![TimePoint::new(at(10), 9.9)]);
        assert_eq!(result.current_residual, Some(TimePoint::new(at(10), 9.9)));
    }

    #[test]
    fn samples_outside_window_are_ignored() {
        let mut data = geodetic_station();
        let before = t0() - Duration::minutes(15);
        data.predictions.insert(0, TimePoint::new(before, 0.5));
        data.geodetic_offsets.insert(0, TimePoint::new(before, 2.0));
        data.observations.insert(0, TimePoint::new(before, 2.5));

        let profile = StationProfile::new("s", Methodology::CalibratePrediction);
        let result = calibrate(&profile, &data, &window(), default_tolerance());

        assert!(result.calibrated_predictions().iter().all(|p| p.time >= t0()));
        assert!(result.residuals.iter().all(|p| p.time >= t0()));
    }

    #[test]
    fn empty_inputs_produce_empty_result() {
        let profile = StationProfile::new("s", Methodology::CalibrateObservation);
        let result = calibrate(&profile, &StationSeries::default(), &window(), default_tolerance());
        assert_eq!(result.calibrated, Some(Calibrated::Observation(vec![])));
        assert!(result.residuals.is_empty());
        assert!(result.current_residual.is_none());
    }

    #[test]
    fn gap_offsets_produce_no_calibrated_point() {
        let data = StationSeries {
            predictions: vec![TimePoint::new(at(0), 1.0)],
            geodetic_offsets: vec![TimePoint::gap(at(0))],
            ..StationSeries::default()
        };
        let profile = StationProfile::new("s", Methodology::CalibratePrediction);
        let result = calibrate(&profile, &data, &window(), default_tolerance());
        assert!(result.calibrated_predictions().is_empty());
    }

    #[test]
    fn methodology_parses_from_snake_case() {
        let m: Methodology = serde_json::from_str("\"calibrate_observation\"").unwrap();
        assert_eq!(m, Methodology::CalibrateObservation);
        assert!(m.is_geodetic());
        assert!(!Methodology::None.is_geodetic());
    }
}
