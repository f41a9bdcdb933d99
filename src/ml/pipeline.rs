use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use crate::ml::bundle::ModelBundle;
use crate::ml::features::{FeatureTransformer, N_FEATURES};
use crate::ml::models::{
    ClassifierSummary, FeatureImportanceSummary, PerformanceMetadata, RegressorSummary,
};
use crate::ml::store::ModelStore;
use crate::ml::trainer::{ClassifierReport, ModelTrainer, RegressorReport};
use crate::models::RawRecord;
use tracing::{error, info};

/// Everything produced by one training run
#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub classifier: ClassifierReport,
    pub regressor: RegressorReport,
    pub metadata: PerformanceMetadata,
}

/// End-to-end training: encode, fit both model families, assemble the bundle
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train a bundle from raw records. Nothing is written to disk.
    pub fn run(&self, records: &[RawRecord]) -> Result<TrainingOutcome> {
        info!("Training severity models on {} records", records.len());

        // encoders are fitted on the full corpus before the split
        let mut transformer = FeatureTransformer::new();
        let batch = transformer.fit_transform(records);

        let trainer = ModelTrainer::new(self.config.clone());
        let classifier = trainer.train_classifier(&batch)?;
        let regressor = trainer.train_regressor(&batch)?;

        let encoders = transformer
            .into_encoders()
            .ok_or_else(|| AppError::Internal("Encoders missing after fit".to_string()))?;

        let bundle = ModelBundle::new(
            encoders,
            regressor.scaler,
            regressor.linear,
            classifier.model,
            regressor.forest,
        )?;

        let metadata = performance_metadata(&bundle, &classifier.report, &regressor.report);

        info!(
            bundle_id = %bundle.bundle_id,
            accuracy = classifier.report.accuracy(),
            linear_rmse = regressor.report.linear_rmse,
            forest_rmse = regressor.report.forest_rmse,
            "Training complete"
        );

        Ok(TrainingOutcome {
            bundle,
            classifier: classifier.report,
            regressor: regressor.report,
            metadata,
        })
    }

    /// Train, then persist the bundle and its metadata
    pub fn run_and_save(&self, records: &[RawRecord], store: &ModelStore) -> Result<TrainingOutcome> {
        let outcome = self.run(records)?;

        if let Err(e) = store.save(&outcome.bundle) {
            error!("Failed to save model bundle: {}", e);
            return Err(e);
        }
        store.save_metadata(&outcome.metadata)?;

        Ok(outcome)
    }
}

fn performance_metadata(
    bundle: &ModelBundle,
    classifier: &ClassifierReport,
    regressor: &RegressorReport,
) -> PerformanceMetadata {
    PerformanceMetadata {
        bundle_id: bundle.bundle_id,
        trained_at: bundle.trained_at,
        classifier: ClassifierSummary {
            accuracy: classifier.accuracy(),
            model_type: ClassifierSummary::model_type_label(),
            features: N_FEATURES,
            samples_trained: classifier.n_train,
            per_class: classifier.metrics.per_class_metrics.clone(),
        },
        regressor: RegressorSummary {
            linear_rmse: regressor.linear_rmse,
            random_forest_rmse: regressor.forest_rmse,
            model_type: RegressorSummary::model_type_label(),
            features: N_FEATURES,
            samples_trained: regressor.n_train,
        },
        feature_importance: FeatureImportanceSummary::new(
            bundle.classifier.feature_importances(),
            bundle.regressor.feature_importances(),
        ),
    }
}
