use crate::error::{AppError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use std::fmt;

/// Zero-mean, unit-variance feature scaling.
///
/// Uses the population standard deviation; constant columns keep a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Training("Cannot fit scaler on an empty matrix".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > f64::EPSILON { s } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(AppError::Prediction(format!(
                "Scaler expects {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean) / &self.scale)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

/// Ordinary least squares on scaled features, solved by SVD
#[derive(Serialize, Deserialize)]
pub struct LinearRegressor {
    n_features: usize,
    model: LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl LinearRegressor {
    pub fn fit(x: &Array2<f64>, y: &[f64]) -> Result<Self> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(AppError::Training(format!(
                "Linear regression needs matching non-empty inputs, got {} rows and {} targets",
                x.nrows(),
                y.len()
            )));
        }

        let params = LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::SVD);
        let model = LinearRegression::fit(&to_dense_matrix(x), &y.to_vec(), params)
            .map_err(|e| AppError::Training(format!("Linear regression training failed: {}", e)))?;

        Ok(Self {
            n_features: x.ncols(),
            model,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if x.ncols() != self.n_features {
            return Err(AppError::Prediction(format!(
                "Linear model expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        self.model
            .predict(&to_dense_matrix(x))
            .map_err(|e| AppError::Prediction(format!("Linear prediction failed: {}", e)))
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl fmt::Debug for LinearRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearRegressor")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

fn to_dense_matrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(arr.nrows(), arr.ncols(), data, false)
}

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sse / actual.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scaler_centres_and_scales() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(&x).unwrap();

        assert_eq!(scaler.mean(), &array![3.0, 10.0]);
        // constant column keeps unit scale
        assert_eq!(scaler.scale()[1], 1.0);

        let scaled = scaler.transform(&x).unwrap();
        assert!((scaled.column(0).sum()).abs() < 1e-12);
        assert_eq!(scaled.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_scaler_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_scaler_rejects_empty() {
        assert!(StandardScaler::fit(&Array2::zeros((0, 3))).is_err());
    }

    #[test]
    fn test_linear_regression_recovers_line() {
        // y = 2a - b + 1
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 3.0], [3.0, 1.0], [4.0, 5.0], [5.0, 2.0]];
        let y: Vec<f64> = x.outer_iter().map(|r| 2.0 * r[0] - r[1] + 1.0).collect();

        let model = LinearRegressor::fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();

        assert!(rmse(&y, &predictions) < 1e-6);
    }

    #[test]
    fn test_linear_regressor_serde() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = vec![1.0, 3.0, 5.0, 7.0];
        let model = LinearRegressor::fit(&x, &y).unwrap();

        let bytes = bincode::serialize(&model).unwrap();
        let restored: LinearRegressor = bincode::deserialize(&bytes).unwrap();

        let probe = array![[10.0]];
        assert_eq!(model.predict(&probe).unwrap(), restored.predict(&probe).unwrap());
    }

    #[test]
    fn test_rmse() {
        assert_eq!(rmse(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_eq!(rmse(&[0.0, 0.0], &[3.0, 4.0]), (12.5f64).sqrt());
        assert_eq!(rmse(&[], &[]), 0.0);
    }
}
