//! Environment-backed configuration for `listsync-smoke`.

use std::{env, error::Error, fmt, time::Duration};

use listsync_runtime::PipelineConfig;

const DEFAULT_UPDATES: usize = 12;
const DEFAULT_INTERVAL_MS: u64 = 40;
const DEFAULT_CALLS: usize = 30;

/// Runtime configuration used by the smoke screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Rows committed ahead of the rest on cold population.
    pub first_batch_rows: Option<usize>,
    /// Whether incremental transitions request animation.
    pub animate: bool,
    /// Number of scripted domain updates after the initial population.
    pub updates: usize,
    /// Delay between scripted domain updates.
    pub interval_ms: u64,
    /// Size of the initial call log.
    pub calls: usize,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            first_batch_rows: None,
            animate: true,
            updates: DEFAULT_UPDATES,
            interval_ms: DEFAULT_INTERVAL_MS,
            calls: DEFAULT_CALLS,
        }
    }
}

impl SmokeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let first_batch_rows = parse_optional_usize("LISTSYNC_FIRST_BATCH_ROWS", &mut lookup)?;
        if first_batch_rows == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "LISTSYNC_FIRST_BATCH_ROWS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        let animate = parse_bool("LISTSYNC_ANIMATE", true, &mut lookup)?;
        let updates = parse_optional_usize("LISTSYNC_SMOKE_UPDATES", &mut lookup)?
            .unwrap_or(DEFAULT_UPDATES);
        let interval_ms = parse_optional_u64("LISTSYNC_SMOKE_INTERVAL_MS", &mut lookup)?
            .unwrap_or(DEFAULT_INTERVAL_MS);
        let calls =
            parse_optional_usize("LISTSYNC_SMOKE_CALLS", &mut lookup)?.unwrap_or(DEFAULT_CALLS);

        if interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LISTSYNC_SMOKE_INTERVAL_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if calls == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LISTSYNC_SMOKE_CALLS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            first_batch_rows,
            animate,
            updates,
            interval_ms,
            calls,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            first_batch_rows: self.first_batch_rows,
            animate: self.animate,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn trimmed<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_usize<F>(key: &'static str, lookup: &mut F) -> Result<Option<usize>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = trimmed(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_u64<F>(key: &'static str, lookup: &mut F) -> Result<Option<u64>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = trimmed(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_bool<F>(key: &'static str, default: bool, lookup: &mut F) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = trimmed(key, lookup) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean".to_owned(),
        }),
    }
}
