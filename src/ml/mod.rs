/// Severity modelling: feature engineering, training, persistence and inference
///
/// This module provides:
/// - Categorical encoding and temporal feature derivation
/// - The weighted injury severity score
/// - Random-forest and linear models with held-out evaluation
/// - Bundle persistence and hot-swappable inference

pub mod bundle;
pub mod features;
pub mod forest;
pub mod linear;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod severity;
pub mod store;
pub mod trainer;
pub mod tree;

#[cfg(test)]
pub(crate) mod fixtures;

pub use bundle::ModelBundle;
pub use features::{
    CategoricalEncoder, CategoricalEncoders, EventDate, FeatureTransformer, FeatureVector,
    TransformedRecord, FEATURE_NAMES, N_FEATURES, UNKNOWN_CATEGORY,
};
pub use forest::{ForestConfig, MaxFeatures, RandomForestClassifier, RandomForestRegressor};
pub use linear::{LinearRegressor, StandardScaler};
pub use models::{ClassMetrics, ModelMetrics, ModelType, PerformanceMetadata};
pub use pipeline::{TrainingOutcome, TrainingPipeline};
pub use predictor::{BundleHandle, Predictor};
pub use severity::{score_distribution, SeverityBand, SeverityScorer};
pub use store::ModelStore;
pub use trainer::{ClassifierReport, ModelTrainer, RegressorReport};
