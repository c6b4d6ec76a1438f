use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{error::ConfigError, utils::clock::Clock};

pub const DEFAULT_SAMPLE_SECONDS: f64 = 5.0;
pub const DEFAULT_IDLE_MINUTES: f64 = 5.0;

const MIN_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const MIN_IDLE_THRESHOLD: Duration = Duration::from_secs(30);
const MIN_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_FLUSH_FLOOR: Duration = Duration::from_secs(30);
const DEFAULT_SLEEP_GAP_FLOOR: Duration = Duration::from_secs(2 * 60);

/// Immutable per-run configuration of the collector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectorSettings {
    pub sample_interval: Duration,
    pub idle_threshold: Duration,
    pub flush_interval: Duration,
    /// Reserved for gap detection. Only reported, segmentation doesn't look at it.
    pub sleep_gap: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
            idle_threshold: Duration::from_secs(5 * 60),
            flush_interval: Duration::from_secs(30),
            sleep_gap: Duration::from_secs(5 * 60),
        }
    }
}

impl CollectorSettings {
    pub fn from_intervals(
        sample_seconds: f64,
        idle_minutes: f64,
        flush_seconds: Option<f64>,
        sleep_gap_minutes: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let sample_interval = seconds("sample_interval", sample_seconds)?;
        if sample_interval < MIN_SAMPLE_INTERVAL {
            return Err(ConfigError::invalid(
                "sample_interval",
                "must be at least 1 second",
            ));
        }

        let idle_threshold = seconds("idle_threshold", idle_minutes * 60.)?;
        if idle_threshold < MIN_IDLE_THRESHOLD {
            return Err(ConfigError::invalid(
                "idle_threshold",
                "must be at least 30 seconds",
            ));
        }

        let flush_interval = match flush_seconds {
            Some(flush) => {
                let flush = seconds("flush_interval", flush)?;
                if flush < MIN_FLUSH_INTERVAL {
                    return Err(ConfigError::invalid(
                        "flush_interval",
                        "must be at least 10 seconds",
                    ));
                }
                flush
            }
            None => (sample_interval * 6).max(DEFAULT_FLUSH_FLOOR),
        };

        let sleep_gap = match sleep_gap_minutes {
            Some(gap) => seconds("sleep_gap", gap * 60.)?,
            None => DEFAULT_SLEEP_GAP_FLOOR,
        }
        .max(idle_threshold);

        Ok(Self {
            sample_interval,
            idle_threshold,
            flush_interval,
            sleep_gap,
        })
    }
}

fn seconds(key: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigError::invalid(key, format!("{value} is not a valid duration")))
}

/// Everything the collector and the API need, created once at startup and handed down.
#[derive(Clone)]
pub struct AppContext {
    pub db_path: PathBuf,
    pub settings: CollectorSettings,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn new(db_path: PathBuf, settings: CollectorSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            db_path,
            settings,
            clock,
        }
    }
}
