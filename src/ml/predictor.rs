use crate::config::PredictionDefaults;
use crate::error::Result;
use crate::ml::bundle::ModelBundle;
use crate::ml::features::{CategoricalEncoders, FeatureVector};
use crate::ml::store::ModelStore;
use crate::models::{PredictionRequest, PredictionResult};
use chrono::{Datelike, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared slot holding the active model bundle.
///
/// Readers clone the `Arc` and drop the lock straight away; replacing the
/// bundle swaps the pointer, so in-flight predictions keep the old one.
#[derive(Debug, Default)]
pub struct BundleHandle {
    current: RwLock<Option<Arc<ModelBundle>>>,
}

impl BundleHandle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_bundle(bundle: ModelBundle) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(bundle))),
        }
    }

    pub fn current(&self) -> Option<Arc<ModelBundle>> {
        self.current.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Install a new bundle, returning the previous one
    pub fn replace(&self, bundle: ModelBundle) -> Option<Arc<ModelBundle>> {
        let bundle = Arc::new(bundle);
        let previous = self.current.write().replace(bundle);
        info!("Replaced active model bundle");
        previous
    }

    pub fn clear(&self) -> Option<Arc<ModelBundle>> {
        self.current.write().take()
    }

    /// Load from `store` and swap in; on failure the current bundle stays
    pub fn load_from(&self, store: &ModelStore) -> Result<Uuid> {
        let bundle = store.load()?;
        let bundle_id = bundle.bundle_id;
        self.replace(bundle);
        Ok(bundle_id)
    }
}

/// Serves severity predictions from sparse requests
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: Arc<BundleHandle>,
    defaults: PredictionDefaults,
}

impl Predictor {
    pub fn new(bundle: Arc<BundleHandle>, defaults: PredictionDefaults) -> Self {
        Self { bundle, defaults }
    }

    pub fn handle(&self) -> &Arc<BundleHandle> {
        &self.bundle
    }

    pub fn defaults(&self) -> &PredictionDefaults {
        &self.defaults
    }

    /// Predict severity for one request. Never fails: problems are reported
    /// through `PredictionResult::error`.
    pub fn predict(&self, request: &PredictionRequest) -> PredictionResult {
        let Some(bundle) = self.bundle.current() else {
            warn!("Prediction requested with no model bundle loaded");
            return PredictionResult::not_loaded();
        };

        match self.try_predict(&bundle, request) {
            Ok(result) => {
                debug!(
                    severity_class = %result.severity_class,
                    severity_score = result.severity_score,
                    "Prediction served"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "Prediction failed");
                PredictionResult::failed(e.to_string())
            }
        }
    }

    fn try_predict(&self, bundle: &ModelBundle, request: &PredictionRequest) -> Result<PredictionResult> {
        validator::Validate::validate(request)?;

        let features = self.feature_vector(&bundle.encoders, request);
        let (severity_class, probability) = bundle.classify(&features)?;
        let score = bundle.severity_score(&features)?;

        Ok(PredictionResult::from_outputs(severity_class, score, probability))
    }

    /// Fill request gaps from the defaults and encode with the frozen encoders
    pub fn feature_vector(&self, encoders: &CategoricalEncoders, request: &PredictionRequest) -> FeatureVector {
        let defaults = &self.defaults;
        let year = request
            .year
            .or(defaults.year)
            .unwrap_or_else(|| Utc::now().year());

        let weather = request
            .weather_condition
            .as_deref()
            .unwrap_or(&defaults.weather_condition);
        let phase = request
            .flight_phase
            .as_deref()
            .unwrap_or(&defaults.flight_phase);
        let engine_type = request
            .engine_type
            .as_deref()
            .unwrap_or(&defaults.engine_type);

        FeatureVector {
            year: f64::from(year),
            month: f64::from(request.month.unwrap_or(defaults.month)),
            day_of_week: f64::from(request.day_of_week.unwrap_or(defaults.day_of_week)),
            number_of_engines: f64::from(request.number_of_engines.unwrap_or(defaults.number_of_engines)),
            country: f64::from(encoders.country.encode(request.country.as_deref())),
            weather_condition: f64::from(encoders.weather_condition.encode(Some(weather))),
            flight_phase: f64::from(encoders.flight_phase.encode(Some(phase))),
            engine_type: f64::from(encoders.engine_type.encode(Some(engine_type))),
        }
    }
}
