//! Layered configuration loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project configuration, relative to the working directory.
pub const CONFIG_DIR: &str = ".dialogue-miner";

/// Prefix for environment overrides. Nested keys are split on `__`.
pub const ENV_PREFIX: &str = "DIALOGUE_MINER_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `simulation.max_turns` is zero.
    #[error("Invalid max_turns: {0}. Must be at least 1")]
    InvalidMaxTurns(u32),

    /// `simulation.min_conclusion_turn` outside `1..=max_turns`.
    #[error("Invalid min_conclusion_turn: {0}. Must be between 1 and max_turns ({1})")]
    InvalidConclusionFloor(u32, u32),

    /// A probability outside `[0, 1]`.
    #[error("Invalid probability for {0}: {1}. Must be within [0, 1]")]
    InvalidProbability(&'static str, f64),

    /// A count or capacity that must be positive.
    #[error("Invalid {0}: must be at least 1")]
    ZeroCapacity(&'static str),

    /// Non-positive requests per second.
    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    /// Zero burst size.
    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    /// Initial backoff not below the maximum.
    InvalidBackoff(u64, u64),

    /// Unknown generator provider.
    #[error("Invalid generator provider: {0}. Must be one of: openai, mock")]
    InvalidProvider(String),

    /// Unknown log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown log rotation.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    /// Blank `data_dir`.
    #[error("Data directory cannot be empty")]
    EmptyDataDir,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .dialogue-miner/config.yaml (project config, created by init)
    /// 3. .dialogue-miner/local.yaml (project local overrides, optional)
    /// 4. Environment variables (DIALOGUE_MINER_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(CONFIG_DIR)
    }

    /// Same precedence as [`ConfigLoader::load`], reading YAML from `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.data_dir.trim().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }

        let sim = &config.simulation;
        if sim.max_turns == 0 {
            return Err(ConfigError::InvalidMaxTurns(sim.max_turns));
        }
        if sim.min_conclusion_turn == 0 || sim.min_conclusion_turn > sim.max_turns {
            return Err(ConfigError::InvalidConclusionFloor(
                sim.min_conclusion_turn,
                sim.max_turns,
            ));
        }
        if sim.turn_timeout_secs == 0 {
            return Err(ConfigError::ZeroCapacity("turn_timeout_secs"));
        }

        let scenario = &config.scenario;
        for (name, p) in [
            ("emotion_probability", scenario.emotion_probability),
            ("urgency_probability", scenario.urgency_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::InvalidProbability(name, p));
            }
        }
        if scenario.fingerprint_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("fingerprint_capacity"));
        }

        if config.batch.results_window == 0 {
            return Err(ConfigError::ZeroCapacity("results_window"));
        }
        if config.batch.errors_window == 0 {
            return Err(ConfigError::ZeroCapacity("errors_window"));
        }

        let generator = &config.generator;
        if !["openai", "mock"].contains(&generator.provider.as_str()) {
            return Err(ConfigError::InvalidProvider(generator.provider.clone()));
        }
        // Anything below one request per ~17 minutes is a typo, not a limit.
        if !(generator.requests_per_second >= 0.001) {
            return Err(ConfigError::InvalidRateLimit(generator.requests_per_second));
        }
        if generator.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(generator.burst_size));
        }
        if generator.initial_backoff_ms >= generator.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                generator.initial_backoff_ms,
                generator.max_backoff_ms,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
