use crate::config::ForestParams;
use crate::error::{AppError, Result};
use crate::ml::tree::{fit_tree, DecisionTree, Gini, SplitCriterion, TreeParams, Variance};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Number of candidate features drawn at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// max(1, floor(sqrt(p)))
    Sqrt,
    All,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().floor() as usize).max(1),
            MaxFeatures::All => n_features.max(1),
        }
    }
}

/// Hyperparameters of a forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl ForestConfig {
    /// Gini forest drawing √p features per split
    pub fn classifier(params: &ForestParams, seed: u64) -> Self {
        Self::from_params(params, MaxFeatures::Sqrt, seed)
    }

    /// Variance forest considering every feature
    pub fn regressor(params: &ForestParams, seed: u64) -> Self {
        Self::from_params(params, MaxFeatures::All, seed)
    }

    fn from_params(params: &ForestParams, max_features: MaxFeatures, seed: u64) -> Self {
        Self {
            n_trees: params.n_trees.max(1),
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features,
            bootstrap: true,
            seed,
        }
    }
}

/// Fit `n_trees` trees in parallel and average their normalised importances.
///
/// Tree seeds are drawn up front from the master seed, so the forest does not
/// depend on how rayon schedules the work.
fn grow_forest<C: SplitCriterion>(
    x: ArrayView2<'_, f64>,
    y: &[C::Target],
    prototype: &C,
    config: &ForestConfig,
) -> Result<(Vec<DecisionTree<C::Leaf>>, Vec<f64>)> {
    let n_rows = x.nrows();
    let n_features = x.ncols();
    if n_rows == 0 || n_features == 0 {
        return Err(AppError::Training(format!(
            "Cannot fit a forest on a {}x{} matrix",
            n_rows, n_features
        )));
    }
    if y.len() != n_rows {
        return Err(AppError::Training(format!(
            "Target length {} does not match {} rows",
            y.len(),
            n_rows
        )));
    }

    let params = TreeParams {
        max_depth: config.max_depth,
        min_samples_split: config.min_samples_split,
        min_samples_leaf: config.min_samples_leaf,
        max_features: config.max_features.resolve(n_features),
    };

    let mut master = StdRng::seed_from_u64(config.seed);
    let seeds: Vec<u64> = (0..config.n_trees).map(|_| master.gen()).collect();

    let fitted: Vec<(DecisionTree<C::Leaf>, Vec<f64>)> = seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let rows: Vec<usize> = if config.bootstrap {
                (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
            } else {
                (0..n_rows).collect()
            };
            fit_tree(x, y, rows, prototype, &params, rng.gen())
        })
        .collect();

    let mut importances = vec![0.0; n_features];
    let mut trees = Vec::with_capacity(fitted.len());
    for (tree, raw) in fitted {
        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            for (acc, value) in importances.iter_mut().zip(&raw) {
                *acc += value / total;
            }
        }
        trees.push(tree);
    }

    debug!(
        trees = trees.len(),
        max_features = params.max_features,
        "Grew random forest"
    );

    Ok((trees, normalize(importances)))
}

/// Scale to sum 1; a forest that never split gets uniform importances
fn normalize(mut importances: Vec<f64>) -> Vec<f64> {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        importances.iter_mut().for_each(|v| *v /= total);
    } else if !importances.is_empty() {
        let uniform = 1.0 / importances.len() as f64;
        importances.iter_mut().for_each(|v| *v = uniform);
    }
    importances
}

fn check_width(expected: usize, sample: &[f64]) -> Result<()> {
    if sample.len() != expected {
        return Err(AppError::Prediction(format!(
            "Expected {} features, got {}",
            expected,
            sample.len()
        )));
    }
    Ok(())
}

fn malformed_tree() -> AppError {
    AppError::Prediction("Malformed decision tree".to_string())
}

/// Random-forest classifier over string labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    config: ForestConfig,
    /// Sorted; column order of `predict_proba`
    classes: Vec<String>,
    n_features: usize,
    trees: Vec<DecisionTree<Vec<f64>>>,
    importances: Vec<f64>,
}

impl RandomForestClassifier {
    pub fn fit(x: &Array2<f64>, labels: &[String], config: ForestConfig) -> Result<Self> {
        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let y: Vec<usize> = labels.iter().map(|l| index[l.as_str()]).collect();

        let (trees, importances) = grow_forest(x.view(), &y, &Gini::new(classes.len()), &config)?;

        Ok(Self {
            config,
            classes,
            n_features: x.ncols(),
            trees,
            importances,
        })
    }

    /// Class probabilities for one sample, averaged over trees
    pub fn predict_proba_one(&self, sample: &[f64]) -> Result<Vec<f64>> {
        check_width(self.n_features, sample)?;

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf_for(sample).ok_or_else(malformed_tree)?;
            if leaf.len() != proba.len() {
                return Err(malformed_tree());
            }
            for (acc, p) in proba.iter_mut().zip(leaf) {
                *acc += p;
            }
        }

        let n = self.trees.len().max(1) as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        Ok(proba)
    }

    /// Most probable class and its probability; ties go to the first class
    pub fn predict_one(&self, sample: &[f64]) -> Result<(String, f64)> {
        let proba = self.predict_proba_one(sample)?;

        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in proba.iter().enumerate() {
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((i, p));
            }
        }

        let (i, p) = best.ok_or_else(|| AppError::Prediction("Classifier has no classes".to_string()))?;
        Ok((self.classes[i].clone(), p))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.outer_iter().enumerate() {
            let sample = row.to_vec();
            let proba = self.predict_proba_one(&sample)?;
            for (j, p) in proba.into_iter().enumerate() {
                out[[i, j]] = p;
            }
        }
        Ok(out)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<String>> {
        x.outer_iter()
            .map(|row| self.predict_one(&row.to_vec()).map(|(label, _)| label))
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean decrease in impurity per feature, summing to 1
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

/// Random-forest regressor; predictions average the leaf means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    n_features: usize,
    trees: Vec<DecisionTree<f64>>,
    importances: Vec<f64>,
}

impl RandomForestRegressor {
    pub fn fit(x: &Array2<f64>, y: &[f64], config: ForestConfig) -> Result<Self> {
        if y.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Training("Regression targets must be finite".to_string()));
        }

        let (trees, importances) = grow_forest(x.view(), y, &Variance::default(), &config)?;

        Ok(Self {
            config,
            n_features: x.ncols(),
            trees,
            importances,
        })
    }

    pub fn predict_one(&self, sample: &[f64]) -> Result<f64> {
        check_width(self.n_features, sample)?;

        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.leaf_for(sample).ok_or_else(malformed_tree)?;
        }
        Ok(sum / self.trees.len().max(1) as f64)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        x.outer_iter()
            .map(|row| self.predict_one(&row.to_vec()))
            .collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}
