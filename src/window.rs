//! # Local Day Windows
//!
//! Resolves "today", "tomorrow", "yesterday" for a station into an absolute
//! half-open interval `[start, end)`.
//!
//! Local midnight is computed with `chrono-tz`, so zones with more than two
//! offsets or historical rule changes resolve correctly. Two DST corner cases:
//!
//! - **Ambiguous midnight** (clocks fall back across 00:00): the earliest
//!   instant wins.
//! - **Missing midnight** (clocks spring forward at 00:00): the zone's
//!   standard-time offset is applied to the wall-clock midnight.
//!
//! `end` is always `start + 24h` in absolute time, even on dates whose
//! wall-clock length is 23 or 25 hours.

use crate::TimePoint;
use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};
use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` day interval in absolute time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Local calendar date the window was resolved for
    pub date: NaiveDate,
}

impl DayWindow {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// Points of a sorted series that fall inside the window.
    ///
    /// Filtering an already-filtered series returns it unchanged.
    pub fn filter(&self, points: &[TimePoint]) -> Vec<TimePoint> {
        let lo = points.partition_point(|p| p.time < self.start);
        let hi = points.partition_point(|p| p.time < self.end);
        points[lo..hi.max(lo)].to_vec()
    }

    /// `YYYY-MM-DD`, the key the sunlight table is indexed by.
    pub fn local_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Compute the local-day window `day_offset` days away from `now` in `tz`.
///
/// Never fails: every calendar date in range resolves to some instant.
/// Offsets past the representable calendar saturate at its first or last
/// usable day.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use tide_chart_lib::window::resolve_day_window;
///
/// let now = Utc.with_ymd_and_hms(2025, 7, 1, 18, 0, 0).unwrap();
/// let w = resolve_day_window(now, 1, chrono_tz::America::Halifax);
/// // Halifax is UTC-3 in July
/// assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 7, 2, 3, 0, 0).unwrap());
/// assert_eq!(w.end - w.start, chrono::Duration::hours(24));
/// ```
pub fn resolve_day_window(now: DateTime<Utc>, day_offset: i64, tz: Tz) -> DayWindow {
    let today = now.with_timezone(&tz).date_naive();
    let date = shift_date(today, day_offset);
    let start = local_midnight(date, tz);

    DayWindow {
        start,
        end: start + Duration::hours(24),
        date,
    }
}

/// `date + days`, saturating two days inside `NaiveDate::MIN..=MAX` so the
/// zone offset and the 24h window end stay representable.
fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    let margin = Days::new(2);
    let first = NaiveDate::MIN.checked_add_days(margin).unwrap_or(NaiveDate::MIN);
    let last = NaiveDate::MAX.checked_sub_days(margin).unwrap_or(NaiveDate::MAX);

    let step = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(step).unwrap_or(last)
    } else {
        date.checked_sub_days(step).unwrap_or(first)
    };
    shifted.clamp(first, last)
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            tracing::debug!(%date, zone = tz.name(), "local midnight does not exist, using standard offset");
            standard_offset_midnight(midnight, tz)
        }
    }
}

/// Wall-clock midnight shifted by the zone's standard (non-DST) offset.
fn standard_offset_midnight(midnight: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    // base_utc_offset ignores DST, so any instant that day will do
    let probe = midnight + Duration::hours(12);
    let base = tz.offset_from_utc_datetime(&probe).base_utc_offset();
    Utc.from_utc_datetime(&(midnight - base))
}
