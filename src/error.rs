use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Transform requested before the encoders were fitted
    #[error("Models not fitted: {0}")]
    NotFitted(String),

    /// Too few usable rows to train a model
    #[error("Insufficient data for training: {available} usable rows, {required} required")]
    InsufficientData { required: usize, available: usize },

    /// A persisted artifact is missing, unreadable or inconsistent with the rest of the bundle
    #[error("Models unavailable ({artifact}): {reason}")]
    ModelsUnavailable { artifact: String, reason: String },

    /// Model fitting or evaluation failure
    #[error("Training error: {0}")]
    Training(String),

    /// Inference failure
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::NotFitted(_) => "MODELS_NOT_FITTED",
            AppError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            AppError::ModelsUnavailable { .. } => "MODELS_UNAVAILABLE",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Prediction(_) => "PREDICTION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may recover by retraining from scratch
    pub fn requires_retraining(&self) -> bool {
        matches!(
            self,
            AppError::ModelsUnavailable { .. } | AppError::NotFitted(_)
        )
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
