use crate::error::{AppError, Result};
use crate::ml::bundle::ModelBundle;
use crate::ml::features::CategoricalEncoders;
use crate::ml::forest::{RandomForestClassifier, RandomForestRegressor};
use crate::ml::linear::{LinearRegressor, StandardScaler};
use crate::ml::models::PerformanceMetadata;
use bincode::Options;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const LINEAR_MODEL_FILE: &str = "linear_model.bin";
pub const CLASSIFIER_FILE: &str = "rf_classifier.bin";
pub const REGRESSOR_FILE: &str = "rf_regressor.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const ENCODERS_FILE: &str = "encoders.bin";
pub const METADATA_FILE: &str = "model_metadata.json";

/// Every file that makes up a bundle
pub const BUNDLE_FILES: [&str; 5] = [
    LINEAR_MODEL_FILE,
    CLASSIFIER_FILE,
    REGRESSOR_FILE,
    SCALER_FILE,
    ENCODERS_FILE,
];

/// Bumped whenever a persisted type changes shape
const FORMAT_VERSION: u32 = 1;

/// Upper bound on a single artifact
const MAX_ARTIFACT_BYTES: u64 = 512 * 1024 * 1024;

/// Header stamped on every artifact so a mixed set can be detected
#[derive(Serialize, Deserialize)]
struct Artifact<T> {
    format_version: u32,
    bundle_id: Uuid,
    trained_at: DateTime<Utc>,
    payload: T,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ARTIFACT_BYTES)
}

/// Filesystem persistence for model bundles
#[derive(Debug)]
pub struct ModelStore {
    root: PathBuf,
    io_lock: Mutex<()>,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when every bundle file is present
    pub fn exists(&self) -> bool {
        BUNDLE_FILES.iter().all(|name| self.root.join(name).is_file())
    }

    /// Persist all five artifacts.
    ///
    /// Payloads are encoded before anything touches the disk, written to
    /// `.tmp` siblings and then renamed over the previous set.
    pub fn save(&self, bundle: &ModelBundle) -> Result<()> {
        let _guard = self.io_lock.lock();
        bundle.validate()?;

        let encoded = [
            (LINEAR_MODEL_FILE, encode(bundle, &bundle.linear)?),
            (CLASSIFIER_FILE, encode(bundle, &bundle.classifier)?),
            (REGRESSOR_FILE, encode(bundle, &bundle.regressor)?),
            (SCALER_FILE, encode(bundle, &bundle.scaler)?),
            (ENCODERS_FILE, encode(bundle, &bundle.encoders)?),
        ];

        fs::create_dir_all(&self.root)?;
        if let Err(e) = self.write_artifacts(&encoded) {
            error!(error = %e, path = %self.root.display(), "Failed to write model bundle");
            self.remove_tmp_files(encoded.iter().map(|(name, _)| *name));
            return Err(e.into());
        }

        info!(
            bundle_id = %bundle.bundle_id,
            path = %self.root.display(),
            "Saved model bundle"
        );
        Ok(())
    }

    /// Load and cross-check all five artifacts
    pub fn load(&self) -> Result<ModelBundle> {
        let _guard = self.io_lock.lock();

        let linear: Artifact<LinearRegressor> = self.read_artifact(LINEAR_MODEL_FILE)?;
        let classifier: Artifact<RandomForestClassifier> = self.read_artifact(CLASSIFIER_FILE)?;
        let regressor: Artifact<RandomForestRegressor> = self.read_artifact(REGRESSOR_FILE)?;
        let scaler: Artifact<StandardScaler> = self.read_artifact(SCALER_FILE)?;
        let encoders: Artifact<CategoricalEncoders> = self.read_artifact(ENCODERS_FILE)?;

        let bundle_id = encoders.bundle_id;
        let headers = [
            (LINEAR_MODEL_FILE, linear.bundle_id),
            (CLASSIFIER_FILE, classifier.bundle_id),
            (REGRESSOR_FILE, regressor.bundle_id),
            (SCALER_FILE, scaler.bundle_id),
        ];
        for (name, id) in headers {
            if id != bundle_id {
                error!(artifact = name, expected = %bundle_id, found = %id, "Mixed model bundle");
                return Err(unavailable(
                    name,
                    format!("belongs to bundle {}, expected {}", id, bundle_id),
                ));
            }
        }

        let bundle = ModelBundle {
            bundle_id,
            trained_at: encoders.trained_at,
            encoders: encoders.payload,
            scaler: scaler.payload,
            linear: linear.payload,
            classifier: classifier.payload,
            regressor: regressor.payload,
        };
        if let Err(e) = bundle.validate() {
            error!(error = %e, "Inconsistent model bundle");
            return Err(e);
        }

        info!(bundle_id = %bundle_id, path = %self.root.display(), "Loaded model bundle");
        Ok(bundle)
    }

    /// Write the performance summary as pretty JSON
    pub fn save_metadata(&self, metadata: &PerformanceMetadata) -> Result<()> {
        let _guard = self.io_lock.lock();
        let json = serde_json::to_vec_pretty(metadata)?;

        fs::create_dir_all(&self.root)?;
        let tmp = self.tmp_path(METADATA_FILE);
        fs::write(&tmp, json)?;
        fs::rename(tmp, self.root.join(METADATA_FILE))?;
        Ok(())
    }

    pub fn load_metadata(&self) -> Result<PerformanceMetadata> {
        let _guard = self.io_lock.lock();
        let bytes = fs::read(self.root.join(METADATA_FILE))
            .map_err(|e| unavailable(METADATA_FILE, e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_artifacts(&self, encoded: &[(&str, Vec<u8>)]) -> std::io::Result<()> {
        for (name, bytes) in encoded {
            fs::write(self.tmp_path(name), bytes)?;
        }
        for (name, bytes) in encoded {
            fs::rename(self.tmp_path(name), self.root.join(name))?;
            debug!(artifact = name, bytes = bytes.len(), "Wrote model artifact");
        }
        Ok(())
    }

    /// Best effort; a sibling that was never written or already renamed is skipped
    fn remove_tmp_files<'n>(&self, names: impl Iterator<Item = &'n str>) {
        for name in names {
            let tmp = self.tmp_path(name);
            if tmp.is_file() {
                if let Err(e) = fs::remove_file(&tmp) {
                    warn!(path = %tmp.display(), error = %e, "Cannot remove temporary artifact");
                }
            }
        }
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.tmp", name))
    }

    fn read_artifact<T: DeserializeOwned>(&self, name: &str) -> Result<Artifact<T>> {
        let path = self.root.join(name);
        let bytes = fs::read(&path).map_err(|e| {
            error!(artifact = name, error = %e, "Cannot read model artifact");
            unavailable(name, e.to_string())
        })?;

        let artifact: Artifact<T> = codec().deserialize(&bytes).map_err(|e| {
            error!(artifact = name, error = %e, "Corrupt model artifact");
            unavailable(name, e.to_string())
        })?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(unavailable(
                name,
                format!(
                    "format version {} is not supported (expected {})",
                    artifact.format_version, FORMAT_VERSION
                ),
            ));
        }
        Ok(artifact)
    }
}

fn encode<T: Serialize>(bundle: &ModelBundle, payload: &T) -> Result<Vec<u8>> {
    let artifact = Artifact {
        format_version: FORMAT_VERSION,
        bundle_id: bundle.bundle_id,
        trained_at: bundle.trained_at,
        payload,
    };
    Ok(codec().serialize(&artifact)?)
}

fn unavailable(artifact: &str, reason: impl Into<String>) -> AppError {
    AppError::ModelsUnavailable {
        artifact: artifact.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::fixtures::trained_bundle;
    use tempfile::TempDir;

    #[test]
    fn test_save_writes_every_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().join("models"));
        assert!(!store.exists());

        store.save(&trained_bundle()).unwrap();

        assert!(store.exists());
        for name in BUNDLE_FILES {
            assert!(!store.root().join(format!("{}.tmp", name)).exists());
        }
    }

    #[test]
    fn test_failed_save_removes_tmp_files() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        // a directory in the way makes the scaler write fail after three artifacts
        fs::create_dir(dir.path().join(format!("{}.tmp", SCALER_FILE))).unwrap();

        assert!(store.save(&trained_bundle()).is_err());

        for name in [LINEAR_MODEL_FILE, CLASSIFIER_FILE, REGRESSOR_FILE, ENCODERS_FILE] {
            assert!(!dir.path().join(format!("{}.tmp", name)).exists(), "{} left behind", name);
            assert!(!dir.path().join(name).exists());
        }
        assert!(!store.exists());
    }

    #[test]
    fn test_load_restores_bundle() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let bundle = trained_bundle();
        store.save(&bundle).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.bundle_id, bundle.bundle_id);
        assert_eq!(loaded.trained_at, bundle.trained_at);
        assert_eq!(loaded.encoders, bundle.encoders);
        assert_eq!(loaded.scaler, bundle.scaler);
        assert_eq!(loaded.classifier, bundle.classifier);
        assert_eq!(loaded.regressor, bundle.regressor);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&trained_bundle()).unwrap();
        fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();

        match store.load() {
            Err(AppError::ModelsUnavailable { artifact, .. }) => assert_eq!(artifact, SCALER_FILE),
            other => panic!("expected ModelsUnavailable, got {:?}", other.map(|b| b.bundle_id)),
        }
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&trained_bundle()).unwrap();
        fs::write(dir.path().join(CLASSIFIER_FILE), b"not a model").unwrap();

        let err = store.load().unwrap_err();
        assert!(err.requires_retraining());
        assert!(matches!(err, AppError::ModelsUnavailable { ref artifact, .. } if artifact == CLASSIFIER_FILE));
    }

    #[test]
    fn test_mixed_bundles_are_rejected() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let store_a = ModelStore::new(first.path());
        let store_b = ModelStore::new(second.path());
        store_a.save(&trained_bundle()).unwrap();
        store_b.save(&trained_bundle()).unwrap();

        fs::copy(second.path().join(REGRESSOR_FILE), first.path().join(REGRESSOR_FILE)).unwrap();

        let err = store_a.load().unwrap_err();
        assert!(matches!(err, AppError::ModelsUnavailable { ref artifact, .. } if artifact == REGRESSOR_FILE));
    }

    #[test]
    fn test_metadata_requires_file() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        assert!(matches!(
            store.load_metadata(),
            Err(AppError::ModelsUnavailable { .. })
        ));
    }
}
