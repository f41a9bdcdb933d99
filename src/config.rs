use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model store configuration
    #[serde(default)]
    pub model_store: ModelStoreConfig,

    /// Training configuration
    #[serde(default)]
    pub training: TrainingConfig,

    /// Inference defaults
    #[serde(default)]
    pub prediction: PredictionDefaults,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("AVIATION_SEVERITY_CONFIG")
            .unwrap_or_else(|_| "config/aviation-severity.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: AVSEV_)
            .add_source(
                config::Environment::with_prefix("AVSEV")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStoreConfig {
    /// Directory holding the persisted model bundle
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

impl Default for ModelStoreConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Minimum number of usable rows required to fit a model
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,

    /// Fraction of rows held out for evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    /// Seed for the train/test shuffle and the forests
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Random forest classifier parameters
    #[serde(default)]
    pub classifier: ForestParams,

    /// Random forest regressor parameters
    #[serde(default)]
    pub regressor: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_rows: default_min_rows(),
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            classifier: ForestParams::default(),
            regressor: ForestParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestParams {
    /// Number of trees in the forest
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Maximum tree depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minimum rows in a node before it may be split
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    /// Minimum rows on each side of a split
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
        }
    }
}

/// Values used for prediction inputs the caller did not supply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionDefaults {
    /// Event year; the current UTC year when unset
    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default = "default_month")]
    pub month: u32,

    /// Day of week, Monday = 0
    #[serde(default = "default_day_of_week")]
    pub day_of_week: u32,

    #[serde(default = "default_number_of_engines")]
    pub number_of_engines: u32,

    #[serde(default = "default_weather_condition")]
    pub weather_condition: String,

    #[serde(default = "default_flight_phase")]
    pub flight_phase: String,

    #[serde(default = "default_engine_type")]
    pub engine_type: String,
}

impl Default for PredictionDefaults {
    fn default() -> Self {
        Self {
            year: None,
            month: default_month(),
            day_of_week: default_day_of_week(),
            number_of_engines: default_number_of_engines(),
            weather_condition: default_weather_condition(),
            flight_phase: default_flight_phase(),
            engine_type: default_engine_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models")
}

fn default_min_rows() -> usize {
    100
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_n_trees() -> usize {
    100
}

fn default_max_depth() -> usize {
    10
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_month() -> u32 {
    6
}

fn default_day_of_week() -> u32 {
    3
}

fn default_number_of_engines() -> u32 {
    2
}

fn default_weather_condition() -> String {
    "VMC".to_string()
}

fn default_flight_phase() -> String {
    "CRUISE".to_string()
}

fn default_engine_type() -> String {
    "Jet".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
