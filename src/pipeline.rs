//! # Render Pipeline
//!
//! Runs one render request end to end:
//!
//! 1. Resolve the local-day window for the requested day offset
//! 2. Filter the station's raw series to the window
//! 3. Calibrate (or pass residuals through) per station methodology
//! 4. Estimate the current water level (current day only)
//! 5. Compose the ordered series list
//!
//! Every step is a pure function of its inputs. The only shared state is the
//! [`DisplaySlot`] holding the last composed chart, which is replaced whole
//! and only by the most recently issued request.

use crate::calibrate::{calibrate, Methodology, StationProfile};
use crate::compose::{compose, ForecastSeries, RawSeries};
use crate::estimate::{estimate_now, CurrentEstimate};
use crate::source::{SourceBundle, SunlightSource, SunlightTimes};
use crate::window::{resolve_day_window, DayWindow};
use crate::{Series, TimePoint};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Expected reasons a chart cannot be composed.
///
/// These are normal outcomes (a brand-new station has no predictions yet),
/// returned as values rather than raised.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ComposeError {
    /// Station key is absent from the source data entirely
    #[error("no data for station '{station}'")]
    NoStationData { station: String },

    /// No astronomical baseline for the requested day
    #[error("no predictions for station '{station}' between {start} and {end}")]
    NoPredictionForWindow {
        station: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// One station and day to render.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub profile: StationProfile,
    pub timezone: Tz,
    pub now: DateTime<Utc>,
    pub day_offset: i64,
    pub tolerance: Duration,
}

/// Everything the renderer needs for one station and day.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComposedChart {
    pub station: String,
    pub methodology: Methodology,
    pub day_offset: i64,
    pub window: DayWindow,
    pub series: Vec<Series>,
    /// Latest residual, for status displays outside the chart
    pub current_residual: Option<TimePoint>,
    pub current_estimate: Option<CurrentEstimate>,
    /// Day/night annotation markers, when the sunlight table has the date
    pub sunlight: Option<SunlightTimes>,
}

pub type ChartOutcome = Result<ComposedChart, ComposeError>;

/// Run the full pipeline for `request` against a loaded bundle.
pub fn render(request: &RenderRequest, bundle: &SourceBundle) -> ChartOutcome {
    render_with(request, bundle, bundle)
}

/// Like [`render`] with an explicit sunlight collaborator.
pub fn render_with(
    request: &RenderRequest,
    bundle: &SourceBundle,
    sunlight: &dyn SunlightSource,
) -> ChartOutcome {
    let profile = &request.profile;
    let station = profile.key.as_str();

    let data = bundle.station(station).ok_or_else(|| {
        tracing::info!(station, "station absent from source data");
        ComposeError::NoStationData {
            station: station.to_string(),
        }
    })?;

    let window = resolve_day_window(request.now, request.day_offset, request.timezone);
    let predictions = window.filter(&data.predictions);
    if predictions.is_empty() {
        tracing::info!(station, day = %window.local_date(), "no predictions in day window");
        return Err(ComposeError::NoPredictionForWindow {
            station: station.to_string(),
            start: window.start,
            end: window.end,
        });
    }
    let observations = window.filter(&data.observations);

    let calibration = calibrate(profile, data, &window, request.tolerance);

    let current_estimate = if request.day_offset == 0 {
        // Estimate against datum-consistent series
        let (baseline, actual) = match profile.methodology {
            Methodology::CalibratePrediction => {
                (calibration.calibrated_predictions(), observations.as_slice())
            }
            Methodology::CalibrateObservation => {
                (predictions.as_slice(), calibration.calibrated_observations())
            }
            Methodology::None => (predictions.as_slice(), observations.as_slice()),
        };
        estimate_now(baseline, actual, request.now)
    } else {
        None
    };

    let forecast = bundle
        .forecast(station)
        .map(|rows| ForecastSeries::from_forecast(rows, &window));

    let series = compose(
        profile,
        &window,
        request.day_offset,
        RawSeries {
            predictions: &predictions,
            observations: &observations,
        },
        &calibration,
        current_estimate.as_ref(),
        forecast.as_ref(),
    );

    Ok(ComposedChart {
        station: station.to_string(),
        methodology: profile.methodology,
        day_offset: request.day_offset,
        window,
        series,
        current_residual: calibration.current_residual,
        current_estimate,
        sunlight: sunlight.sunlight_times(station, &window.local_date()),
    })
}

/// Ticket identifying one issued render request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

/// Holds the currently displayed chart outcome.
///
/// Requests take a token with [`DisplaySlot::issue`] before computing and
/// hand it back with [`DisplaySlot::commit`]. A result is committed only if no
/// newer request has been issued since, so a slow older request can never
/// overwrite a newer one. Readers always see one whole outcome.
#[derive(Debug, Default)]
pub struct DisplaySlot {
    latest: AtomicU64,
    current: Mutex<Option<Arc<ChartOutcome>>>,
}

impl DisplaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token newer than every token issued before.
    pub fn issue(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Commit `outcome` if `token` is still the latest issued request.
    ///
    /// Returns `false` when the result was discarded as stale.
    pub fn commit(&self, token: RequestToken, outcome: ChartOutcome) -> bool {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Checked under the lock so a newer commit can't interleave
        if token.0 != self.latest.load(Ordering::SeqCst) {
            tracing::debug!(token = token.0, "discarding stale render result");
            return false;
        }
        *current = Some(Arc::new(outcome));
        true
    }

    /// The most recently committed outcome, if any.
    pub fn current(&self) -> Option<Arc<ChartOutcome>> {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
