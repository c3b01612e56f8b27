//! # Configuration Management
//!
//! Loads `tide-chart.toml`: where the source bundle comes from, how samples
//! are aligned, how often to refresh, and which stations exist with their
//! time zone and geodetic methodology.
//!
//! ```toml
//! refresh_minutes = 10
//!
//! [source]
//! url = "https://example.org/tides/latest.json"
//!
//! [alignment]
//! tolerance_minutes = 5
//!
//! [[stations]]
//! key = "tofino"
//! name = "Tofino"
//! timezone = "America/Vancouver"
//! methodology = "calibrate_prediction"
//! ```

use crate::align::DEFAULT_TOLERANCE_MINUTES;
use crate::calibrate::{Methodology, StationProfile};
use crate::source::DataSource;
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PATH: &str = "tide-chart.toml";

/// Upper bound for both the alignment tolerance and the refresh interval
const MAX_MINUTES: u64 = 24 * 60;

/// Problems with a loaded configuration's contents.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown time zone '{0}'")]
    UnknownTimezone(String),

    #[error("station '{0}' is not configured")]
    UnknownStation(String),

    #[error("no stations configured")]
    NoStations,

    #[error("[source] needs exactly one of `path` or `url`")]
    AmbiguousSource,
}

/// Application configuration loaded from tide-chart.toml
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Minutes between refreshes in watch mode
    #[serde(default = "default_refresh")]
    pub refresh_minutes: u64,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub stations: Vec<StationConfig>,
}

/// Location of the source JSON bundle
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SourceConfig {
    pub path: Option<PathBuf>,
    pub url: Option<String>,
}

/// Sample pairing settings
#[derive(Debug, Deserialize, Serialize)]
pub struct AlignmentConfig {
    /// Maximum time difference when pairing samples from two series
    pub tolerance_minutes: i64,
}

/// One tide station
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationConfig {
    /// Key into the source bundle's `stations` map
    pub key: String,
    /// Human-readable station name for reference
    pub name: String,
    /// IANA zone used for local-day boundaries
    pub timezone: String,
    #[serde(default)]
    pub methodology: Methodology,
}

fn default_refresh() -> u64 {
    10
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        AlignmentConfig {
            tolerance_minutes: DEFAULT_TOLERANCE_MINUTES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            refresh_minutes: default_refresh(),
            source: SourceConfig {
                path: Some(PathBuf::from("tides.json")),
                url: None,
            },
            alignment: AlignmentConfig::default(),
            stations: vec![StationConfig {
                key: "tofino".to_string(),
                name: "Tofino, BC".to_string(),
                timezone: "America/Vancouver".to_string(),
                methodology: Methodology::None,
            }],
        }
    }
}

impl StationConfig {
    pub fn profile(&self) -> StationProfile {
        StationProfile::new(self.key.clone(), self.methodology)
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }
}

impl Config {
    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!(
                        path = %path.display(),
                        stations = config.stations.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Alignment tolerance, clamped to `0..=24h`.
    pub fn tolerance(&self) -> Duration {
        Duration::minutes(self.alignment.tolerance_minutes.clamp(0, MAX_MINUTES as i64))
    }

    /// Watch-mode refresh period, clamped to `1min..=24h`.
    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_minutes.clamp(1, MAX_MINUTES) * 60)
    }

    /// Named station, or the first configured one when `key` is `None`.
    pub fn station(&self, key: Option<&str>) -> Result<&StationConfig, ConfigError> {
        match key {
            Some(key) => self
                .stations
                .iter()
                .find(|s| s.key == key)
                .ok_or_else(|| ConfigError::UnknownStation(key.to_string())),
            None => self.stations.first().ok_or(ConfigError::NoStations),
        }
    }

    pub fn data_source(&self) -> Result<DataSource, ConfigError> {
        match (&self.source.path, &self.source.url) {
            (Some(path), None) => Ok(DataSource::File(path.clone())),
            (None, Some(url)) => Ok(DataSource::Url(url.clone())),
            _ => Err(ConfigError::AmbiguousSource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
refresh_minutes = 5

[source]
url = "https://example.org/tides.json"

[alignment]
tolerance_minutes = 7

[[stations]]
key = "tofino"
name = "Tofino"
timezone = "America/Vancouver"
methodology = "calibrate_prediction"

[[stations]]
key = "halifax"
name = "Halifax"
timezone = "America/Halifax"
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.stations[0].key, "tofino");
        assert_eq!(config.tolerance(), Duration::minutes(5));
        assert_eq!(config.refresh_minutes, 10);
        assert_eq!(
            config.data_source().unwrap(),
            DataSource::File(PathBuf::from("tides.json"))
        );
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.stations[0].key, parsed.stations[0].key);
        assert_eq!(config.stations[0].timezone, parsed.stations[0].timezone);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.refresh_minutes, 5);
        assert_eq!(config.tolerance(), Duration::minutes(7));

        let halifax = config.station(Some("halifax")).unwrap();
        assert_eq!(halifax.methodology, Methodology::None);
        assert_eq!(halifax.tz().unwrap(), chrono_tz::America::Halifax);

        let first = config.station(None).unwrap();
        assert_eq!(first.profile().methodology, Methodology::CalibratePrediction);
        assert!(matches!(config.data_source().unwrap(), DataSource::Url(_)));
    }

    #[test]
    fn test_out_of_range_intervals_are_clamped() {
        let mut config = Config::default();
        config.alignment.tolerance_minutes = i64::MAX;
        config.refresh_minutes = u64::MAX;
        assert_eq!(config.tolerance(), Duration::hours(24));
        assert_eq!(config.refresh_interval(), std::time::Duration::from_secs(24 * 3600));

        config.alignment.tolerance_minutes = -30;
        config.refresh_minutes = 0;
        assert_eq!(config.tolerance(), Duration::zero());
        assert_eq!(config.refresh_interval(), std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.stations[0].key, "tofino");
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"stations = 3").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.stations.len(), 1);
    }

    #[test]
    fn test_lookup_errors() {
        let mut config = Config::default();
        assert_eq!(
            config.station(Some("atlantis")).unwrap_err(),
            ConfigError::UnknownStation("atlantis".into())
        );

        config.stations[0].timezone = "Mars/Olympus".into();
        assert!(matches!(config.stations[0].tz(), Err(ConfigError::UnknownTimezone(_))));

        config.source.url = Some("https://example.org".into());
        assert_eq!(config.data_source().unwrap_err(), ConfigError::AmbiguousSource);

        config.stations.clear();
        assert_eq!(config.station(None).unwrap_err(), ConfigError::NoStations);
    }
}
