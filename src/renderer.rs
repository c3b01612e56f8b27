//! # Terminal Chart Rendering
//!
//! Draws a [`ComposedChart`] as ASCII for the command line. Each series kind
//! gets its own glyph; series are drawn in composition order so the current
//! estimate lands on top. Number formatting lives here, not in the pipeline.

use crate::pipeline::{ChartOutcome, ComposedChart};
use crate::{Datum, Series, SeriesKind};

const ROWS: usize = 20;
/// One column per 15 minutes of the day
const COLUMNS: usize = 96;
const Y_AXIS_WIDTH: usize = 8;

fn glyph(kind: SeriesKind) -> char {
    match kind {
        SeriesKind::Prediction => '·',
        SeriesKind::Observation => 'o',
        SeriesKind::CalibratedPrediction => '~',
        SeriesKind::CalibratedObservation => '*',
        SeriesKind::Residual => 'r',
        SeriesKind::ZeroReference => '-',
        SeriesKind::Surge => 's',
        SeriesKind::CombinedLevel => '=',
        SeriesKind::CurrentEstimate => 'X',
    }
}

fn datum_label(datum: Datum) -> &'static str {
    match datum {
        Datum::Chart => "chart datum",
        Datum::Geodetic => "CGVD28",
        Datum::Relative => "relative",
    }
}

/// Render either a chart or the reason there is none.
pub fn draw_outcome(outcome: &ChartOutcome) -> String {
    match outcome {
        Ok(chart) => draw_ascii(chart),
        Err(reason) => format!("⚠ UNAVAILABLE: {reason}\n"),
    }
}

/// Render the chart grid, legend and status lines.
pub fn draw_ascii(chart: &ComposedChart) -> String {
    let mut out = format!(
        "{} ({}, day {:+})\n\n",
        chart.station,
        chart.window.local_date(),
        chart.day_offset
    );

    let Some((min, max)) = bounds(&chart.series) else {
        out.push_str("(no plottable values)\n");
        return out;
    };
    let span = (max - min).max(0.1);

    let to_row = |v: f64| {
        let normalized = (v - min) / span;
        (((1.0 - normalized) * (ROWS as f64 - 1.0)).round() as usize).min(ROWS - 1)
    };
    let day_secs = (chart.window.end - chart.window.start).num_seconds() as f64;
    let to_col = |t: chrono::DateTime<chrono::Utc>| {
        let frac = (t - chart.window.start).num_seconds() as f64 / day_secs;
        (frac.clamp(0.0, 1.0) * (COLUMNS as f64 - 1.0)).round() as usize + Y_AXIS_WIDTH
    };

    let mut grid = vec![vec![' '; COLUMNS + Y_AXIS_WIDTH]; ROWS];

    // Y-axis labels every 4th row
    for (row, line) in grid.iter_mut().enumerate() {
        if row % 4 == 0 || row == ROWS - 1 {
            let value = max - row as f64 / (ROWS as f64 - 1.0) * span;
            let label = format!("{:>width$.2}", value, width = Y_AXIS_WIDTH - 2);
            for (i, ch) in label.chars().take(Y_AXIS_WIDTH - 1).enumerate() {
                line[i] = ch;
            }
        }
        line[Y_AXIS_WIDTH - 1] = '│';
    }

    for series in &chart.series {
        let ch = glyph(series.kind);
        if series.kind == SeriesKind::ZeroReference {
            let row = to_row(0.0);
            for cell in grid[row][Y_AXIS_WIDTH..].iter_mut().filter(|c| **c == ' ') {
                *cell = ch;
            }
            continue;
        }
        for point in &series.points {
            if let Some(v) = point.value {
                grid[to_row(v)][to_col(point.time)] = ch;
            }
        }
    }

    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }

    // Time markers every 3 hours below the chart
    let padding = " ".repeat(Y_AXIS_WIDTH);
    let markers: String = (0..COLUMNS)
        .map(|i| if i % 12 == 0 { '|' } else { ' ' })
        .collect();
    let labels: String = (0..COLUMNS / 12)
        .map(|i| format!("{:<12}", format!("{:02}h", i * 3)))
        .collect();
    out.push_str(&format!("{padding}{markers}\n{padding}{}\n\n", labels.trim_end()));

    for series in &chart.series {
        out.push_str(&legend_line(series));
    }

    if let Some(est) = &chart.current_estimate {
        out.push_str(&format!(
            "\nNow: {:.2} m (predicted {:.2} m",
            est.estimated_value, est.predicted_value
        ));
        match est.residual_used {
            Some(r) => out.push_str(&format!(", residual {r:+.2} m)\n")),
            None => out.push_str(", no observation)\n"),
        }
    }
    if let Some(residual) = chart.current_residual.and_then(|p| p.value) {
        out.push_str(&format!("Latest residual: {residual:+.3} m\n"));
    }
    if let Some(sun) = &chart.sunlight {
        out.push_str(&format!(
            "First light {}  Sunrise {}  Sunset {}  Last light {}\n",
            sun.first_light, sun.sunrise, sun.sunset, sun.last_light
        ));
    }

    out
}

fn legend_line(series: &Series) -> String {
    let range = match series.value_range() {
        Some((lo, hi)) => format!("{lo:.2} .. {hi:.2} m"),
        None => "no values".to_string(),
    };
    format!(
        "{} {:<28} {:>4} pts  {:<12} {}\n",
        glyph(series.kind),
        series.name,
        series.points.len(),
        datum_label(series.datum),
        range
    )
}

fn bounds(series: &[Series]) -> Option<(f64, f64)> {
    series
        .iter()
        .filter_map(Series::value_range)
        .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
}
