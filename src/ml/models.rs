use crate::ml::features::FEATURE_NAMES;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Classification evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Per-class metrics, keyed by label
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            per_class_metrics: BTreeMap::new(),
        }
    }

    /// Score predicted labels against the truth.
    ///
    /// Classes are the union of both label sets, so a label seen only in the
    /// held-out slice still gets a row (with zero recall).
    pub fn from_labels(y_true: &[String], y_pred: &[String]) -> Self {
        let n_samples = y_true.len();
        if n_samples == 0 {
            return Self::new();
        }

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count();
        let accuracy = correct as f64 / n_samples as f64;

        let classes: BTreeSet<&str> = y_true.iter().chain(y_pred.iter()).map(String::as_str).collect();
        let mut per_class = BTreeMap::new();

        for &class in &classes {
            let tp = y_true
                .iter()
                .zip(y_pred.iter())
                .filter(|(t, p)| t.as_str() == class && p.as_str() == class)
                .count();

            let fp = y_pred
                .iter()
                .zip(y_true.iter())
                .filter(|(p, t)| p.as_str() == class && t.as_str() != class)
                .count();

            let fn_count = y_true
                .iter()
                .zip(y_pred.iter())
                .filter(|(t, p)| t.as_str() == class && p.as_str() != class)
                .count();

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            let support = y_true.iter().filter(|t| t.as_str() == class).count();

            per_class.insert(
                class.to_string(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support,
                },
            );
        }

        let n_classes = per_class.len().max(1) as f64;
        let avg_precision = per_class.values().map(|m| m.precision).sum::<f64>() / n_classes;
        let avg_recall = per_class.values().map(|m| m.recall).sum::<f64>() / n_classes;
        let avg_f1 = per_class.values().map(|m| m.f1_score).sum::<f64>() / n_classes;

        ModelMetrics {
            accuracy,
            precision: avg_precision,
            recall: avg_recall,
            f1_score: avg_f1,
            per_class_metrics: per_class,
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    RandomForestClassifier,
    RandomForestRegressor,
    LinearRegression,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForestClassifier => write!(f, "Random Forest Classifier"),
            ModelType::RandomForestRegressor => write!(f, "Random Forest Regressor"),
            ModelType::LinearRegression => write!(f, "Linear Regression"),
        }
    }
}

/// Pair feature names with importance values
pub fn named_importances(values: &[f64]) -> BTreeMap<String, f64> {
    FEATURE_NAMES
        .iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

/// Persisted summary of the last training run (`model_metadata.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetadata {
    pub bundle_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub classifier: ClassifierSummary,
    pub regressor: RegressorSummary,
    pub feature_importance: FeatureImportanceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSummary {
    pub accuracy: f64,
    pub model_type: String,
    pub features: usize,
    pub samples_trained: usize,
    pub per_class: BTreeMap<String, ClassMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorSummary {
    pub linear_rmse: f64,
    pub random_forest_rmse: f64,
    pub model_type: String,
    pub features: usize,
    pub samples_trained: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceSummary {
    pub classifier: BTreeMap<String, f64>,
    pub regressor: BTreeMap<String, f64>,
}

impl RegressorSummary {
    pub fn model_type_label() -> String {
        format!(
            "{} + {}",
            ModelType::RandomForestRegressor,
            ModelType::LinearRegression
        )
    }
}

impl ClassifierSummary {
    pub fn model_type_label() -> String {
        ModelType::RandomForestClassifier.to_string()
    }
}

impl FeatureImportanceSummary {
    pub fn new(classifier: &[f64], regressor: &[f64]) -> Self {
        Self {
            classifier: named_importances(classifier),
            regressor: named_importances(regressor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::N_FEATURES;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_metrics_from_labels() {
        let y_true = labels(&["Fatal(1)", "Fatal(1)", "Incident", "Non-Fatal"]);
        let y_pred = labels(&["Fatal(1)", "Incident", "Incident", "Non-Fatal"]);

        let metrics = ModelMetrics::from_labels(&y_true, &y_pred);

        assert_eq!(metrics.accuracy, 0.75);
        let fatal = &metrics.per_class_metrics["Fatal(1)"];
        assert_eq!(fatal.precision, 1.0);
        assert_eq!(fatal.recall, 0.5);
        assert_eq!(fatal.support, 2);

        let incident = &metrics.per_class_metrics["Incident"];
        assert_eq!(incident.precision, 0.5);
        assert_eq!(incident.recall, 1.0);
    }

    #[test]
    fn test_metrics_include_unpredicted_class() {
        let y_true = labels(&["Fatal(3)", "Incident"]);
        let y_pred = labels(&["Incident", "Incident"]);

        let metrics = ModelMetrics::from_labels(&y_true, &y_pred);
        let unseen = &metrics.per_class_metrics["Fatal(3)"];
        assert_eq!(unseen.recall, 0.0);
        assert_eq!(unseen.f1_score, 0.0);
        assert_eq!(unseen.support, 1);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = ModelMetrics::from_labels(&[], &[]);
        assert_eq!(metrics, ModelMetrics::default());
    }

    #[test]
    fn test_model_type_display() {
        assert_eq!(ClassifierSummary::model_type_label(), "Random Forest Classifier");
        assert_eq!(
            RegressorSummary::model_type_label(),
            "Random Forest Regressor + Linear Regression"
        );
    }

    #[test]
    fn test_named_importances() {
        let values = [0.5, 0.1, 0.1, 0.1, 0.05, 0.05, 0.05, 0.05];
        let named = named_importances(&values);
        assert_eq!(named.len(), N_FEATURES);
        assert_eq!(named["Year"], 0.5);
        assert_eq!(named["EngineType_encoded"], 0.05);
    }
}
