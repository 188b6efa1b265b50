//! Configuration loading and management

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::pool::MIN_WORKERS;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// How long the resource monitor sleeps between device probes
    pub monitor_interval: Duration,

    /// Passed to the recognition engine when it is started
    pub prune_cache: bool,

    /// Size of the worker pool running the long-lived tasks
    pub worker_threads: usize,

    /// Delay after start before the daemon stops suppressing results
    pub warmup: Duration,

    /// Capacity of the session event broadcast channel
    pub event_capacity: usize,

    /// Print session events to stdout as JSON lines
    pub emit_events: bool,

    /// Fallback log filter when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_millis(350),
            prune_cache: true,
            worker_threads: MIN_WORKERS,
            warmup: Duration::from_millis(1500),
            event_capacity: 64,
            emit_events: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults; set but unparsable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, "SPEECH_MONITOR_INTERVAL_MS")? {
            config.monitor_interval = Duration::from_millis(ms);
        }
        if let Some(prune) = parse_bool(&lookup, "SPEECH_PRUNE_CACHE")? {
            config.prune_cache = prune;
        }
        if let Some(workers) = parse_var::<usize, _>(&lookup, "SPEECH_WORKERS")? {
            config.worker_threads = workers;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "SPEECH_WARMUP_MS")? {
            config.warmup = Duration::from_millis(ms);
        }
        if let Some(capacity) = parse_var::<usize, _>(&lookup, "SPEECH_EVENT_CAPACITY")? {
            config.event_capacity = capacity;
        }
        if let Some(emit) = parse_bool(&lookup, "SPEECH_EMIT_EVENTS")? {
            config.emit_events = emit;
        }
        if let Some(filter) = lookup("SPEECH_LOG") {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads < MIN_WORKERS {
            bail!(
                "SPEECH_WORKERS must be at least {} (got {})",
                MIN_WORKERS,
                self.worker_threads
            );
        }
        if self.event_capacity == 0 {
            bail!("SPEECH_EVENT_CAPACITY must be greater than zero");
        }
        if self.monitor_interval.is_zero() {
            bail!("SPEECH_MONITOR_INTERVAL_MS must be greater than zero");
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}"))
        })
        .transpose()
}

fn parse_bool<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => bail!("invalid value for {key}: {raw:?}"),
        },
    }
}
