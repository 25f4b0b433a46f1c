//! Environment-sourced configuration, loaded once at bootstrap via the
//! `config` crate layered over `Environment`. Defaults are supplied in code
//! through the builder, never a separate defaults file.

use crate::command::ContainerMode;
use crate::error::{AgentError, Result};
use config::{Config, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "MULTINIC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingStrategyKind {
    Backoff,
    Adaptive,
}

/// Durations are human-readable strings (`"30s"`, `"5m"`) parsed with
/// `humantime`, not bare integer seconds, so `MULTINIC_POLL_BASE_INTERVAL`
/// etc. accept exactly the unit-suffixed values the environment documents.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    database_url: String,
    poll_base_interval: String,
    poll_max_interval: String,
    poll_multiplier: f64,
    polling_strategy: String,
    adaptive_min_interval: String,
    adaptive_idle_interval: String,
    max_concurrent_tasks: usize,
    health_port: u16,
    backup_dir: String,
    container_mode: String,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub database_url: String,
    pub poll_base_interval: Duration,
    pub poll_max_interval: Duration,
    pub poll_multiplier: f64,
    pub polling_strategy: PollingStrategyKind,
    pub adaptive_min_interval: Duration,
    pub adaptive_idle_interval: Duration,
    pub max_concurrent_tasks: usize,
    pub health_port: u16,
    pub backup_dir: PathBuf,
    pub container_mode: ContainerMode,
}

impl AgentConfig {
    /// Loads configuration from the `MULTINIC_`-prefixed environment,
    /// `__` splitting nested keys, falling back to the defaults below.
    /// `database_url` has no default and is a required key.
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .set_default("poll_base_interval", "30s")
            .and_then(|b| b.set_default("poll_max_interval", "300s"))
            .and_then(|b| b.set_default("poll_multiplier", 2.0))
            .and_then(|b| b.set_default("polling_strategy", "backoff"))
            .and_then(|b| b.set_default("adaptive_min_interval", "5s"))
            .and_then(|b| b.set_default("adaptive_idle_interval", "600s"))
            .and_then(|b| b.set_default("max_concurrent_tasks", 4i64))
            .and_then(|b| b.set_default("health_port", 8089i64))
            .and_then(|b| b.set_default("backup_dir", "/var/lib/multinic-agent/backups"))
            .and_then(|b| b.set_default("container_mode", "auto"))
            .map_err(|e| AgentError::system("building default configuration", e))?
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let source = builder
            .build()
            .map_err(|e| AgentError::system("loading configuration", e))?;

        let raw: RawConfig = source
            .try_deserialize()
            .map_err(|e| AgentError::system("parsing configuration", e))?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let polling_strategy = match raw.polling_strategy.to_ascii_lowercase().as_str() {
            "backoff" => PollingStrategyKind::Backoff,
            "adaptive" => PollingStrategyKind::Adaptive,
            other => {
                return Err(AgentError::system(
                    "parsing configuration",
                    anyhow::anyhow!("unknown polling_strategy `{other}`"),
                ))
            }
        };

        let container_mode = match raw.container_mode.to_ascii_lowercase().as_str() {
            "auto" => ContainerMode::Auto,
            "force" | "forced" => ContainerMode::Forced,
            "disabled" => ContainerMode::Disabled,
            other => {
                return Err(AgentError::system(
                    "parsing configuration",
                    anyhow::anyhow!("unknown container_mode `{other}`"),
                ))
            }
        };

        let config = AgentConfig {
            database_url: raw.database_url,
            poll_base_interval: parse_duration("poll_base_interval", &raw.poll_base_interval)?,
            poll_max_interval: parse_duration("poll_max_interval", &raw.poll_max_interval)?,
            poll_multiplier: raw.poll_multiplier,
            polling_strategy,
            adaptive_min_interval: parse_duration("adaptive_min_interval", &raw.adaptive_min_interval)?,
            adaptive_idle_interval: parse_duration(
                "adaptive_idle_interval",
                &raw.adaptive_idle_interval,
            )?,
            max_concurrent_tasks: raw.max_concurrent_tasks,
            health_port: raw.health_port,
            backup_dir: PathBuf::from(raw.backup_dir),
            container_mode,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(AgentError::system(
                "validating configuration",
                anyhow::anyhow!("database_url must not be empty"),
            ));
        }
        if self.poll_base_interval > self.poll_max_interval {
            return Err(AgentError::system(
                "validating configuration",
                anyhow::anyhow!(
                    "poll_base_interval ({:?}) must be <= poll_max_interval ({:?})",
                    self.poll_base_interval,
                    self.poll_max_interval
                ),
            ));
        }
        if self.max_concurrent_tasks < 1 {
            return Err(AgentError::system(
                "validating configuration",
                anyhow::anyhow!("max_concurrent_tasks must be >= 1"),
            ));
        }
        Ok(())
    }
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw).map_err(|e| {
        AgentError::system(
            "parsing configuration",
            anyhow::anyhow!("invalid `{field}` value `{raw}`: {e}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(database_url: &str) -> RawConfig {
        RawConfig {
            database_url: database_url.to_string(),
            poll_base_interval: "30s".to_string(),
            poll_max_interval: "300s".to_string(),
            poll_multiplier: 2.0,
            polling_strategy: "backoff".to_string(),
            adaptive_min_interval: "5s".to_string(),
            adaptive_idle_interval: "600s".to_string(),
            max_concurrent_tasks: 4,
            health_port: 8089,
            backup_dir: "/var/lib/multinic-agent/backups".to_string(),
            container_mode: "auto".to_string(),
        }
    }

    #[test]
    fn valid_config_loads() {
        let config = AgentConfig::from_raw(raw("postgres://localhost/multinic")).unwrap();
        assert_eq!(config.poll_base_interval, Duration::from_secs(30));
        assert_eq!(config.polling_strategy, PollingStrategyKind::Backoff);
        assert_eq!(config.container_mode, ContainerMode::Auto);
    }

    #[test]
    fn rejects_base_interval_above_max() {
        let mut r = raw("postgres://localhost/multinic");
        r.poll_base_interval = "600s".to_string();
        r.poll_max_interval = "300s".to_string();
        assert!(AgentConfig::from_raw(r).is_err());
    }

    #[test]
    fn rejects_unparseable_duration() {
        let mut r = raw("postgres://localhost/multinic");
        r.poll_base_interval = "not-a-duration".to_string();
        assert!(AgentConfig::from_raw(r).is_err());
    }

    #[test]
    fn accepts_non_second_humantime_units() {
        let mut r = raw("postgres://localhost/multinic");
        r.adaptive_idle_interval = "10m".to_string();
        let config = AgentConfig::from_raw(r).unwrap();
        assert_eq!(config.adaptive_idle_interval, Duration::from_secs(600));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut r = raw("postgres://localhost/multinic");
        r.max_concurrent_tasks = 0;
        assert!(AgentConfig::from_raw(r).is_err());
    }

    #[test]
    fn rejects_empty_database_url() {
        let r = raw("");
        assert!(AgentConfig::from_raw(r).is_err());
    }

    #[test]
    fn rejects_unknown_polling_strategy() {
        let mut r = raw("postgres://localhost/multinic");
        r.polling_strategy = "round-robin".to_string();
        assert!(AgentConfig::from_raw(r).is_err());
    }
}
