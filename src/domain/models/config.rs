//! Application configuration, as loaded from YAML and the environment.

use serde::{Deserialize, Serialize};

/// Main configuration structure for the dialogue miner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Directory holding taxonomy documents and the inbox
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Domain used when a command does not name one
    #[serde(default = "default_domain")]
    pub default_domain: String,

    /// Simulation state machine limits
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Scenario sampling configuration
    #[serde(default)]
    pub scenario: ScenarioConfig,

    /// Batch controller configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Turn generator configuration
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_data_dir() -> String {
    ".dialogue-miner".to_string()
}

fn default_domain() -> String {
    "hr".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_domain: default_domain(),
            simulation: SimulationConfig::default(),
            scenario: ScenarioConfig::default(),
            batch: BatchConfig::default(),
            generator: GeneratorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Simulation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulationConfig {
    /// Hard cap on expert turns before a simulation is aborted
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Earliest expert turn (1-based) at which a conclusion is honored
    #[serde(default = "default_min_conclusion_turn")]
    pub min_conclusion_turn: u32,

    /// Upper bound on a single generator call
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
}

const fn default_max_turns() -> u32 {
    8
}

const fn default_min_conclusion_turn() -> u32 {
    3
}

const fn default_turn_timeout_secs() -> u64 {
    120
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            min_conclusion_turn: default_min_conclusion_turn(),
            turn_timeout_secs: default_turn_timeout_secs(),
        }
    }
}

/// Scenario sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioConfig {
    /// Probability of prepending an emotional modifier
    #[serde(default = "default_emotion_probability")]
    pub emotion_probability: f64,

    /// Probability of prepending an urgency modifier
    #[serde(default = "default_urgency_probability")]
    pub urgency_probability: f64,

    /// Regeneration attempts before a duplicate fingerprint is accepted
    #[serde(default = "default_max_dedup_retries")]
    pub max_dedup_retries: u32,

    /// Fingerprints retained before the oldest are evicted
    #[serde(default = "default_fingerprint_capacity")]
    pub fingerprint_capacity: usize,
}

const fn default_emotion_probability() -> f64 {
    0.5
}

const fn default_urgency_probability() -> f64 {
    0.4
}

const fn default_max_dedup_retries() -> u32 {
    10
}

const fn default_fingerprint_capacity() -> usize {
    1000
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            emotion_probability: default_emotion_probability(),
            urgency_probability: default_urgency_probability(),
            max_dedup_retries: default_max_dedup_retries(),
            fingerprint_capacity: default_fingerprint_capacity(),
        }
    }
}

/// Batch controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Simulations per batch when no count is given
    #[serde(default = "default_batch_count")]
    pub default_count: usize,

    /// Recent results kept in the status window
    #[serde(default = "default_results_window")]
    pub results_window: usize,

    /// Recent errors kept in the status window
    #[serde(default = "default_errors_window")]
    pub errors_window: usize,

    /// Pause between consecutive simulations in milliseconds
    #[serde(default = "default_inter_run_delay_ms")]
    pub inter_run_delay_ms: u64,
}

const fn default_batch_count() -> usize {
    5
}

const fn default_results_window() -> usize {
    50
}

const fn default_errors_window() -> usize {
    20
}

const fn default_inter_run_delay_ms() -> u64 {
    1000
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_count: default_batch_count(),
            results_window: default_results_window(),
            errors_window: default_errors_window(),
            inter_run_delay_ms: default_inter_run_delay_ms(),
        }
    }
}

/// Turn generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneratorConfig {
    /// Generator backend: openai or mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; falls back to `OPENAI_API_KEY` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_requests_per_second() -> f64 {
    2.0
}

const fn default_burst_size() -> u32 {
    4
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.data_dir, ".dialogue-miner");
        assert_eq!(config.default_domain, "hr");
        assert_eq!(config.simulation.max_turns, 8);
        assert_eq!(config.simulation.min_conclusion_turn, 3);
        assert!((config.scenario.emotion_probability - 0.5).abs() < f64::EPSILON);
        assert!((config.scenario.urgency_probability - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.scenario.max_dedup_retries, 10);
        assert_eq!(config.scenario.fingerprint_capacity, 1000);
        assert_eq!(config.batch.results_window, 50);
        assert_eq!(config.generator.provider, "openai");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "simulation:\n  max_turns: 12\ngenerator:\n  provider: mock\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.simulation.max_turns, 12);
        assert_eq!(config.simulation.min_conclusion_turn, 3);
        assert_eq!(config.generator.provider, "mock");
        assert_eq!(config.batch.default_count, 5);
    }
}
