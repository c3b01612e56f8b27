//! # Nearest-Neighbour Series Alignment
//!
//! Pairs samples from two series with different sampling rates (e.g. 1-minute
//! observations against 15-minute predictions) within a fixed time tolerance.
//!
//! A point with no candidate inside the tolerance is dropped. Alignment never
//! interpolates across a gap and never fabricates a value.
//!
//! - Tolerance is inclusive: `|Δt| <= tolerance` matches.
//! - Ties (two candidates equally close) resolve to the earlier candidate.
//! - Candidates whose value is `null` are skipped; a gap is not a match.

use crate::TimePoint;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tolerance used by the source system when pairing samples.
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 5;

pub fn default_tolerance() -> Duration {
    Duration::minutes(DEFAULT_TOLERANCE_MINUTES)
}

/// Two samples matched by [`align_bulk`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    /// Timestamp of the left-hand point
    pub time: DateTime<Utc>,
    pub left: f64,
    pub right: f64,
    /// Time of the matched right-hand sample
    pub matched_time: DateTime<Utc>,
}

/// Find the sample in `series` closest to `at`, within `tolerance`.
///
/// `series` must be sorted ascending by time.
pub fn align(at: DateTime<Utc>, series: &[TimePoint], tolerance: Duration) -> Option<&TimePoint> {
    let split = series.partition_point(|p| p.time < at);

    // Walk outward from the insertion point; the first valued sample on
    // each side is the nearest candidate on that side.
    let before = series[..split]
        .iter()
        .rev()
        .take_while(|p| at - p.time <= tolerance)
        .find(|p| p.value.is_some());
    let after = series[split..]
        .iter()
        .take_while(|p| p.time - at <= tolerance)
        .find(|p| p.value.is_some());

    match (before, after) {
        (Some(b), Some(a)) => {
            if a.time - at < at - b.time {
                Some(a)
            } else {
                Some(b)
            }
        }
        (b, a) => b.or(a),
    }
}

/// Match every valued point of `left` against `right`.
///
/// Output is sorted by left-hand time; unmatched points contribute nothing.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use tide_chart_lib::{align::align_bulk, TimePoint};
///
/// let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
/// let obs = vec![
///     TimePoint::new(t0 + Duration::minutes(2), 1.1),
///     TimePoint::new(t0 + Duration::minutes(30), 1.4),
/// ];
/// let pred = vec![TimePoint::new(t0, 1.0), TimePoint::new(t0 + Duration::hours(1), 2.0)];
///
/// let pairs = align_bulk(&obs, &pred, Duration::minutes(5));
/// assert_eq!(pairs.len(), 1);
/// assert_eq!(pairs[0].right, 1.0);
/// ```
pub fn align_bulk(left: &[TimePoint], right: &[TimePoint], tolerance: Duration) -> Vec<AlignedPair> {
    left.iter()
        .filter_map(|l| {
            let value = l.value?;
            let matched = align(l.time, right, tolerance)?;
            Some(AlignedPair {
                time: l.time,
                left: value,
                right: matched.value?,
                matched_time: matched.time,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn at(minutes: i64, seconds: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(minutes) + Duration::seconds(seconds)
    }

    fn hourly() -> Vec<TimePoint> {
        (0..4)
            .map(|h| TimePoint::new(t0() + Duration::hours(h), h as f64))
            .collect()
    }

    #[test]
    fn exact_match() {
        let series = hourly();
        let hit = align(t0() + Duration::hours(2), &series, default_tolerance()).unwrap();
        assert_eq!(hit.value, Some(2.0));
    }

    #[test]
    fn nearest_side_wins() {
        let series = vec![TimePoint::new(at(0, 0), 1.0), TimePoint::new(at(6, 0), 2.0)];
        let hit = align(at(4, 0), &series, default_tolerance()).unwrap();
        assert_eq!(hit.value, Some(2.0));
        let hit = align(at(2, 0), &series, default_tolerance()).unwrap();
        assert_eq!(hit.value, Some(1.0));
    }

    #[test]
    fn tie_prefers_earlier() {
        let series = vec![TimePoint::new(at(0, 0), 1.0), TimePoint::new(at(4, 0), 2.0)];
        let hit = align(at(2, 0), &series, default_tolerance()).unwrap();
        assert_eq!(hit.value, Some(1.0));
    }

    #[test]
    fn boundary_is_inclusive() {
        let series = vec![TimePoint::new(at(0, 0), 1.0)];
        assert!(align(at(5, 0), &series, default_tolerance()).is_some());
        assert!(align(at(-5, 0), &series, default_tolerance()).is_some());
    }

    #[test]
    fn just_past_boundary_is_rejected() {
        let series = vec![TimePoint::new(at(0, 0), 1.0)];
        assert!(align(at(5, 1), &series, default_tolerance()).is_none());
        assert!(align(at(-5, -1), &series, default_tolerance()).is_none());
    }

    #[test]
    fn null_candidates_are_skipped() {
        let series = vec![
            TimePoint::new(at(-4, 0), 1.0),
            TimePoint::gap(at(0, 0)),
            TimePoint::new(at(10, 0), 3.0),
        ];
        let hit = align(at(0, 0), &series, default_tolerance()).unwrap();
        assert_eq!(hit.value, Some(1.0));

        let only_gap = vec![TimePoint::gap(at(0, 0))];
        assert!(align(at(0, 0), &only_gap, default_tolerance()).is_none());
    }

    #[test]
    fn empty_series_never_matches() {
        assert!(align(t0(), &[], default_tolerance()).is_none());
    }

    #[test]
    fn bulk_drops_misses_and_gaps() {
        let obs = vec![
            TimePoint::new(at(1, 0), 0.5),   // matches 0h
            TimePoint::new(at(30, 0), 0.7),  // miss
            TimePoint::gap(at(60, 0)),       // gap on the left
            TimePoint::new(at(119, 0), 2.2), // matches 2h
        ];
        let pairs = align_bulk(&obs, &hourly(), default_tolerance());
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].time, at(1, 0));
        assert_eq!(pairs[0].matched_time, t0());
        assert_eq!(pairs[1].right, 2.0);
        assert_eq!(pairs[1].left, 2.2);
    }

    #[test]
    fn configurable_tolerance() {
        let series = hourly();
        assert!(align(at(20, 0), &series, default_tolerance()).is_none());
        assert!(align(at(20, 0), &series, Duration::minutes(30)).is_some());
    }
}
