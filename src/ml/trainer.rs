use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use crate::ml::features::{feature_matrix, FeatureVector, TransformedRecord};
use crate::ml::forest::{ForestConfig, RandomForestClassifier, RandomForestRegressor};
use crate::ml::linear::{rmse, LinearRegressor, StandardScaler};
use crate::ml::models::{named_importances, ModelMetrics};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Shuffle `0..n` with a seeded RNG and cut off `ceil(n × test_fraction)` test indices.
///
/// Returns `(train, test)`. Both sides are non-empty for `n >= 2`.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    if n < 2 {
        return (indices, Vec::new());
    }

    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(n_test);
    (train, indices)
}

/// Rows carrying every model feature plus a classification label
struct UsableRows {
    features: Vec<FeatureVector>,
    labels: Vec<String>,
    scores: Vec<f64>,
}

impl UsableRows {
    fn collect(batch: &[TransformedRecord]) -> Self {
        let mut rows = Self {
            features: Vec::new(),
            labels: Vec::new(),
            scores: Vec::new(),
        };

        for record in batch {
            let (Some(features), Some(label)) = (record.features(), record.injury_severity.as_ref()) else {
                continue;
            };
            if label.trim().is_empty() {
                continue;
            }
            rows.features.push(features);
            rows.labels.push(label.clone());
            rows.scores.push(record.severity_score);
        }

        rows
    }

    fn len(&self) -> usize {
        self.features.len()
    }

    fn features_at(&self, idx: &[usize]) -> Vec<FeatureVector> {
        idx.iter().map(|&i| self.features[i]).collect()
    }

    fn labels_at(&self, idx: &[usize]) -> Vec<String> {
        idx.iter().map(|&i| self.labels[i].clone()).collect()
    }

    fn scores_at(&self, idx: &[usize]) -> Vec<f64> {
        idx.iter().map(|&i| self.scores[i]).collect()
    }
}

/// Fitted classifier plus its held-out evaluation
#[derive(Debug, Clone)]
pub struct ClassifierTraining {
    pub model: RandomForestClassifier,
    pub report: ClassifierReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierReport {
    pub metrics: ModelMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    pub n_train: usize,
    pub n_test: usize,
}

impl ClassifierReport {
    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }
}

/// Fitted regressors (with the scaler the linear model depends on) plus evaluation
#[derive(Debug)]
pub struct RegressorTraining {
    pub scaler: StandardScaler,
    pub linear: LinearRegressor,
    pub forest: RandomForestRegressor,
    pub report: RegressorReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorReport {
    pub linear_rmse: f64,
    pub forest_rmse: f64,
    pub feature_importance: BTreeMap<String, f64>,
    pub n_train: usize,
    pub n_test: usize,
    pub holdout: Holdout,
}

/// Evaluation partition kept for downstream reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holdout {
    pub features: Vec<FeatureVector>,
    pub targets: Vec<f64>,
    pub injury_severity: Vec<String>,
    pub linear_predictions: Vec<f64>,
    pub forest_predictions: Vec<f64>,
}

/// Fits the severity models on a transformed batch
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit the injury-severity classifier
    pub fn train_classifier(&self, batch: &[TransformedRecord]) -> Result<ClassifierTraining> {
        let rows = self.usable_rows(batch, "classifier")?;
        let (train, test) = split_indices(rows.len(), self.config.test_fraction, self.config.seed);
        debug!(train = train.len(), test = test.len(), "Split classifier rows");

        let x_train = feature_matrix(&rows.features_at(&train))?;
        let x_test = feature_matrix(&rows.features_at(&test))?;
        let y_train = rows.labels_at(&train);
        let y_test = rows.labels_at(&test);

        let model = RandomForestClassifier::fit(
            &x_train,
            &y_train,
            ForestConfig::classifier(&self.config.classifier, self.config.seed),
        )?;

        let predictions = model.predict(&x_test)?;
        let metrics = ModelMetrics::from_labels(&y_test, &predictions);

        info!(
            accuracy = metrics.accuracy,
            classes = model.classes().len(),
            samples = train.len(),
            "Trained severity classifier"
        );

        Ok(ClassifierTraining {
            report: ClassifierReport {
                metrics,
                feature_importance: named_importances(model.feature_importances()),
                n_train: train.len(),
                n_test: test.len(),
            },
            model,
        })
    }

    /// Fit the linear and random-forest severity-score regressors
    pub fn train_regressor(&self, batch: &[TransformedRecord]) -> Result<RegressorTraining> {
        let rows = self.usable_rows(batch, "regressor")?;
        let (train, test) = split_indices(rows.len(), self.config.test_fraction, self.config.seed);
        debug!(train = train.len(), test = test.len(), "Split regressor rows");

        let test_features = rows.features_at(&test);
        let x_train = feature_matrix(&rows.features_at(&train))?;
        let x_test = feature_matrix(&test_features)?;
        let y_train = rows.scores_at(&train);
        let y_test = rows.scores_at(&test);

        // scaler sees the training partition only
        let scaler = StandardScaler::fit(&x_train)?;
        let linear = LinearRegressor::fit(&scaler.transform(&x_train)?, &y_train)?;
        let linear_predictions = linear.predict(&scaler.transform(&x_test)?)?;

        let forest = RandomForestRegressor::fit(
            &x_train,
            &y_train,
            ForestConfig::regressor(&self.config.regressor, self.config.seed),
        )?;
        let forest_predictions = forest.predict(&x_test)?;

        let linear_rmse = rmse(&y_test, &linear_predictions);
        let forest_rmse = rmse(&y_test, &forest_predictions);

        info!(
            linear_rmse,
            forest_rmse,
            samples = train.len(),
            "Trained severity regressors"
        );

        Ok(RegressorTraining {
            report: RegressorReport {
                linear_rmse,
                forest_rmse,
                feature_importance: named_importances(forest.feature_importances()),
                n_train: train.len(),
                n_test: test.len(),
                holdout: Holdout {
                    features: test_features,
                    targets: y_test,
                    injury_severity: rows.labels_at(&test),
                    linear_predictions,
                    forest_predictions,
                },
            },
            scaler,
            linear,
            forest,
        })
    }

    fn usable_rows(&self, batch: &[TransformedRecord], model: &str) -> Result<UsableRows> {
        if !(self.config.test_fraction > 0.0 && self.config.test_fraction < 1.0) {
            return Err(AppError::Configuration(format!(
                "test_fraction must be in (0, 1), got {}",
                self.config.test_fraction
            )));
        }

        let rows = UsableRows::collect(batch);
        let required = self.config.min_rows.max(2);
        if rows.len() < required {
            warn!(
                model,
                available = rows.len(),
                required,
                "Not enough usable rows to train"
            );
            return Err(AppError::InsufficientData {
                required,
                available: rows.len(),
            });
        }

        debug!(model, usable = rows.len(), dropped = batch.len() - rows.len(), "Filtered training rows");
        Ok(rows)
    }
}
