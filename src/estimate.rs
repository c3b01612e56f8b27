//! # Current Water Level Estimate
//!
//! Produces the single "now" point drawn on top of the current-day chart:
//! the astronomical prediction at `now`, linearly interpolated between the
//! bracketing prediction samples, corrected by the latest observed residual.
//!
//! ```text
//! predicted(t) = v1 + (t - t1) / (t2 - t1) * (v2 - v1)      t1 <= t <= t2
//! residual     = latest_obs.value - predicted(latest_obs.time)
//! estimate     = predicted(now) + residual
//! ```
//!
//! Interpolation never extrapolates: outside the prediction span there is
//! no estimate. Only meaningful for the current day.

use crate::TimePoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Best estimate of the water level at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentEstimate {
    pub time: DateTime<Utc>,
    pub predicted_value: f64,
    pub estimated_value: f64,
    /// `None` when no usable observation was available
    pub residual_used: Option<f64>,
}

/// Linearly interpolate a sorted series at `t`.
///
/// Returns `None` when `t` is outside the series or a bracketing sample is a
/// gap. At a sample's own timestamp the sample's value is returned exactly.
pub fn interpolate(series: &[TimePoint], t: DateTime<Utc>) -> Option<f64> {
    let idx = series.partition_point(|p| p.time < t);
    let upper = series.get(idx)?;
    if upper.time == t {
        return upper.value;
    }
    let lower = series.get(idx.checked_sub(1)?)?;

    let (v1, v2) = (lower.value?, upper.value?);
    let span = (upper.time - lower.time).num_milliseconds() as f64;
    let elapsed = (t - lower.time).num_milliseconds() as f64;
    Some(v1 + elapsed / span * (v2 - v1))
}

/// Estimate the water level at `now` from predictions and observations.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use tide_chart_lib::{estimate::estimate_now, TimePoint};
///
/// let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
/// let predictions = vec![TimePoint::new(t0, 1.0), TimePoint::new(t0 + Duration::hours(1), 2.0)];
///
/// let est = estimate_now(&predictions, &[], t0 + Duration::minutes(30)).unwrap();
/// assert_eq!(est.predicted_value, 1.5);
/// assert_eq!(est.estimated_value, 1.5);
/// assert!(est.residual_used.is_none());
/// ```
pub fn estimate_now(
    predictions: &[TimePoint],
    observations: &[TimePoint],
    now: DateTime<Utc>,
) -> Option<CurrentEstimate> {
    let predicted_value = interpolate(predictions, now)?;

    let residual_used = observations
        .iter()
        .rev()
        .find_map(|obs| obs.value.map(|v| (obs.time, v)))
        .and_then(|(time, value)| {
            let predicted_then = interpolate(predictions, time);
            if predicted_then.is_none() {
                tracing::debug!(%time, "latest observation outside prediction span, residual unused");
            }
            predicted_then.map(|p| value - p)
        });

    Some(CurrentEstimate {
        time: now,
        predicted_value,
        estimated_value: predicted_value + residual_used.unwrap_or(0.0),
        residual_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(minutes)
    }

    fn predictions() -> Vec<TimePoint> {
        vec![
            TimePoint::new(at(0), 1.0),
            TimePoint::new(at(60), 2.0),
            TimePoint::new(at(120), 1.2),
        ]
    }

    #[test]
    fn interpolates_midpoint() {
        assert_eq!(interpolate(&predictions(), at(30)), Some(1.5));
    }

    #[test]
    fn endpoints_are_exact() {
        let p = predictions();
        assert_eq!(interpolate(&p, at(0)), Some(1.0));
        assert_eq!(interpolate(&p, at(60)), Some(2.0));
        assert_eq!(interpolate(&p, at(120)), Some(1.2));
    }

    #[test]
    fn interpolation_stays_between_neighbours() {
        let p = predictions();
        for minute in 60..=120 {
            let v = interpolate(&p, at(minute)).unwrap();
            assert!((1.2..=2.0).contains(&v), "minute {minute}: {v}");
        }
    }

    #[test]
    fn never_extrapolates() {
        let p = predictions();
        assert!(interpolate(&p, at(-1)).is_none());
        assert!(interpolate(&p, at(121)).is_none());
        assert!(interpolate(&[], at(0)).is_none());
        assert!(estimate_now(&p, &[], at(200)).is_none());
    }

    #[test]
    fn gap_in_bracket_yields_none() {
        let p = vec![TimePoint::new(at(0), 1.0), TimePoint::gap(at(60))];
        assert!(interpolate(&p, at(30)).is_none());
    }

    #[test]
    fn residual_from_latest_observation() {
        let obs = vec![TimePoint::new(at(10), 5.0), TimePoint::new(at(30), 1.6)];
        let est = estimate_now(&predictions(), &obs, at(90)).unwrap();

        let residual = est.residual_used.unwrap();
        assert!((residual - 0.1).abs() < 1e-9);
        assert!((est.predicted_value - 1.6).abs() < 1e-9);
        assert!((est.estimated_value - 1.7).abs() < 1e-9);
    }

    #[test]
    fn trailing_gap_observation_is_skipped() {
        let obs = vec![TimePoint::new(at(30), 1.6), TimePoint::gap(at(40))];
        let est = estimate_now(&predictions(), &obs, at(30)).unwrap();
        assert!((est.residual_used.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn observation_outside_predictions_is_unused() {
        let obs = vec![TimePoint::new(at(-30), 0.4)];
        let est = estimate_now(&predictions(), &obs, at(30)).unwrap();
        assert!(est.residual_used.is_none());
        assert_eq!(est.estimated_value, est.predicted_value);
    }
}
