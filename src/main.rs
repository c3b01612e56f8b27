//! # Tide Chart Command Line
//!
//! Loads the configured source bundle, renders one station/day through the
//! calibration pipeline and prints it as an ASCII chart or JSON.
//!
//! In `--watch` mode the bundle is re-fetched every `refresh_minutes`. Each
//! refresh issues a request token; slow refreshes that finish after a newer
//! one are discarded instead of overwriting what is shown.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tide_chart_lib::config::{Config, DEFAULT_PATH};
use tide_chart_lib::logging;
use tide_chart_lib::pipeline::{render, ChartOutcome, DisplaySlot, RenderRequest};
use tide_chart_lib::renderer::draw_outcome;
use tide_chart_lib::source::DataSource;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Calibrated tide charts from predictions, observations and geodetic offsets.
#[derive(Parser, Debug)]
#[command(name = "tide-chart", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = DEFAULT_PATH)]
    config: PathBuf,

    /// Station key (defaults to the first configured station).
    #[arg(short, long)]
    station: Option<String>,

    /// Days from today: 0 = today, 1 = tomorrow, -1 = yesterday.
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    day_offset: i64,

    /// Read the bundle from this file instead of the configured source.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Keep running and refresh on the configured interval.
    #[arg(short, long)]
    watch: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

struct Job {
    source: DataSource,
    request: RenderRequest,
    format: Format,
}

impl Job {
    async fn run(&self, now: chrono::DateTime<Utc>) -> anyhow::Result<ChartOutcome> {
        let bundle = self.source.load().await.context("loading source bundle")?;
        let mut request = self.request.clone();
        request.now = now;
        // Pipeline is CPU-only; keep it off the async workers
        let outcome = tokio::task::spawn_blocking(move || render(&request, &bundle)).await?;
        Ok(outcome)
    }

    fn print(&self, outcome: &ChartOutcome) -> anyhow::Result<()> {
        match self.format {
            Format::Text => print!("{}", draw_outcome(outcome)),
            Format::Json => {
                let json = match outcome {
                    Ok(chart) => serde_json::to_string_pretty(chart)?,
                    Err(reason) => serde_json::to_string_pretty(&serde_json::json!({
                        "unavailable": reason,
                        "message": reason.to_string(),
                    }))?,
                };
                println!("{json}");
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load_from_path(&cli.config);
    let station = config.station(cli.station.as_deref())?;
    let source = match &cli.data {
        Some(path) => DataSource::File(path.clone()),
        None => config.data_source()?,
    };

    tracing::info!(station = %station.name, key = %station.key, day = cli.day_offset, "rendering");

    let job = Arc::new(Job {
        source,
        request: RenderRequest {
            profile: station.profile(),
            timezone: station.tz()?,
            now: Utc::now(),
            day_offset: cli.day_offset,
            tolerance: config.tolerance(),
        },
        format: cli.format,
    });

    if !cli.watch {
        let outcome = job.run(Utc::now()).await?;
        return job.print(&outcome);
    }

    watch(job, config.refresh_interval()).await
}

/// Refresh forever, committing only the newest completed request.
async fn watch(job: Arc<Job>, period: StdDuration) -> anyhow::Result<()> {
    let slot = Arc::new(DisplaySlot::new());
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping");
                return Ok(());
            }
        }

        let token = slot.issue();
        let (job, slot) = (Arc::clone(&job), Arc::clone(&slot));
        tokio::spawn(async move {
            match job.run(Utc::now()).await {
                Ok(outcome) => {
                    if slot.commit(token, outcome) {
                        if let Some(current) = slot.current() {
                            if let Err(e) = job.print(&current) {
                                tracing::error!(error = %e, "failed to print chart");
                            }
                        }
                    }
                }
                // Keep showing the last good chart
                Err(e) => tracing::warn!("refresh failed: {e:#}"),
            }
        });
    }
}
