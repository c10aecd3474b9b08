//! Runtime configuration, read from environment variables.

use std::time::Duration;

use thiserror::Error;

use dbtc_game::JobGenerationConfig;
use dbtc_game::generator::MAX_JOB_HOURS as JOB_HOURS_LIMIT;

pub const REDIS_URL: &str = "REDIS_URL";
pub const INBOUND_TOPIC: &str = "DBTC_INBOUND_TOPIC";
pub const OUTBOUND_TOPIC: &str = "DBTC_OUTBOUND_TOPIC";
pub const COMMAND_PREFIX: &str = "DBTC_COMMAND_PREFIX";
pub const SOURCE_APP: &str = "DBTC_SOURCE_APP";
pub const JOB_POOL_SIZE: &str = "DBTC_JOB_POOL_SIZE";
pub const MIN_PAYOUT: &str = "DBTC_MIN_PAYOUT";
pub const MAX_PAYOUT: &str = "DBTC_MAX_PAYOUT";
pub const MIN_JOB_HOURS: &str = "DBTC_MIN_JOB_HOURS";
pub const MAX_JOB_HOURS: &str = "DBTC_MAX_JOB_HOURS";
pub const WORK_MAX_PAYOUT: &str = "DBTC_WORK_MAX_PAYOUT";
pub const SEARCH_DELAY_MS: &str = "DBTC_SEARCH_DELAY_MS";
pub const MAX_COMMIT_RETRIES: &str = "DBTC_MAX_COMMIT_RETRIES";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Unset means in-memory store and bus (dev/test).
    pub redis_url: Option<String>,
    pub inbound_topic: String,
    pub outbound_topic: String,
    pub command_prefix: String,
    /// Stamped on every outgoing message.
    pub source_app: String,
    pub generation: JobGenerationConfig,
    pub work_max_payout: i64,
    /// Pause before a freshly generated job list is posted.
    pub search_delay: Duration,
    pub max_commit_retries: u32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            inbound_topic: "discord-inbound".to_string(),
            outbound_topic: "discord-outbound".to_string(),
            command_prefix: "!".to_string(),
            source_app: "dbtg".to_string(),
            generation: JobGenerationConfig::default(),
            work_max_payout: 100,
            search_delay: Duration::from_millis(5_000),
            max_commit_retries: dbtc_infra::dispatcher::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let min_hours: i64 = parse_or(&get, MIN_JOB_HOURS, 24)?;
        let max_hours: i64 = parse_or(&get, MAX_JOB_HOURS, 48)?;
        if max_hours > JOB_HOURS_LIMIT {
            return Err(ConfigError::InvalidValue {
                key: MAX_JOB_HOURS,
                value: max_hours.to_string(),
                reason: format!("must be at most {JOB_HOURS_LIMIT}"),
            });
        }
        if min_hours < 0 || min_hours > max_hours {
            return Err(ConfigError::InvalidRange(format!(
                "job hours [{min_hours}, {max_hours}]"
            )));
        }

        let generation = JobGenerationConfig {
            pool_size: parse_or(&get, JOB_POOL_SIZE, defaults.generation.pool_size)?,
            min_payout: parse_or(&get, MIN_PAYOUT, defaults.generation.min_payout)?,
            max_payout: parse_or(&get, MAX_PAYOUT, defaults.generation.max_payout)?,
            min_duration: chrono::Duration::hours(min_hours),
            max_duration: chrono::Duration::hours(max_hours),
        };
        generation
            .validate()
            .map_err(|e| ConfigError::InvalidRange(e.to_string()))?;

        let work_max_payout: i64 = parse_or(&get, WORK_MAX_PAYOUT, defaults.work_max_payout)?;
        if work_max_payout < 1 {
            return Err(ConfigError::InvalidValue {
                key: WORK_MAX_PAYOUT,
                value: work_max_payout.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let max_commit_retries: u32 =
            parse_or(&get, MAX_COMMIT_RETRIES, defaults.max_commit_retries)?;
        if max_commit_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: MAX_COMMIT_RETRIES,
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            redis_url: get(REDIS_URL),
            inbound_topic: get(INBOUND_TOPIC).unwrap_or(defaults.inbound_topic),
            outbound_topic: get(OUTBOUND_TOPIC).unwrap_or(defaults.outbound_topic),
            command_prefix: get(COMMAND_PREFIX).unwrap_or(defaults.command_prefix),
            source_app: get(SOURCE_APP).unwrap_or(defaults.source_app),
            generation,
            work_max_payout,
            search_delay: Duration::from_millis(parse_or(&get, SEARCH_DELAY_MS, 5_000u64)?),
            max_commit_retries,
        })
    }

    /// The Redis URL, required by the binary.
    ///
    /// Without it nothing ever reaches the inbound topic; the in-memory store and bus
    /// are for tests that drive [`crate::app::App::handle`] directly.
    pub fn require_gateway(&self) -> Result<&str, ConfigError> {
        self.redis_url.as_deref().ok_or(ConfigError::Missing(REDIS_URL))
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
