use crate::error::{AppError, Result};
use crate::ml::features::{feature_matrix, CategoricalEncoders, FeatureVector, N_FEATURES};
use crate::ml::forest::{RandomForestClassifier, RandomForestRegressor};
use crate::ml::linear::{LinearRegressor, StandardScaler};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The five co-dependent artifacts produced by one training run.
///
/// A bundle is immutable once built; retraining produces a new one.
#[derive(Debug)]
pub struct ModelBundle {
    pub bundle_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub encoders: CategoricalEncoders,
    pub scaler: StandardScaler,
    pub linear: LinearRegressor,
    pub classifier: RandomForestClassifier,
    pub regressor: RandomForestRegressor,
}

impl ModelBundle {
    /// Assemble a freshly trained bundle under a new id
    pub fn new(
        encoders: CategoricalEncoders,
        scaler: StandardScaler,
        linear: LinearRegressor,
        classifier: RandomForestClassifier,
        regressor: RandomForestRegressor,
    ) -> Result<Self> {
        let bundle = Self {
            bundle_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            encoders,
            scaler,
            linear,
            classifier,
            regressor,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Check that every model agrees on the feature width
    pub fn validate(&self) -> Result<()> {
        let widths = [
            ("scaler", self.scaler.n_features()),
            ("linear_model", self.linear.n_features()),
            ("rf_classifier", self.classifier.n_features()),
            ("rf_regressor", self.regressor.n_features()),
        ];

        for (artifact, width) in widths {
            if width != N_FEATURES {
                return Err(AppError::ModelsUnavailable {
                    artifact: artifact.to_string(),
                    reason: format!("expects {} features, bundle uses {}", width, N_FEATURES),
                });
            }
        }
        Ok(())
    }

    /// Most probable severity class and its probability
    pub fn classify(&self, features: &FeatureVector) -> Result<(String, f64)> {
        self.classifier.predict_one(&features.to_array())
    }

    /// Severity score from the random-forest regressor
    pub fn severity_score(&self, features: &FeatureVector) -> Result<f64> {
        self.regressor.predict_one(&features.to_array())
    }

    /// Severity score from the scaled linear model
    pub fn linear_score(&self, features: &FeatureVector) -> Result<f64> {
        let x = self.scaler.transform(&feature_matrix(std::slice::from_ref(features))?)?;
        self.linear
            .predict(&x)?
            .first()
            .copied()
            .ok_or_else(|| AppError::Prediction("Linear model returned no prediction".to_string()))
    }
}
