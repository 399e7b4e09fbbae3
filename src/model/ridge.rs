//! Closed-form ridge regression.

use crate::model::error::ModelError;
use crate::model::{FeatureMatrix, Model, Predictor};
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();
/// Smallest accepted ratio of the Gram matrix's extreme Cholesky pivots, squared.
const MIN_RCOND: f64 = 1e-12;

/// Ridge regression on standardized features.
///
/// Columns are centred and scaled to unit variance before the penalty is
/// applied, so `alpha` weighs every feature equally regardless of its unit.
/// The intercept is not penalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeRegression {
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl Predictor for RidgeRegression {
    type Fitted = LinearModel;

    fn fit(&self, features: &FeatureMatrix, targets: &[f64]) -> Result<LinearModel, ModelError> {
        features.check()?;
        let n = features.n_rows();
        let p = features.n_columns();
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if targets.len() != n {
            return Err(ModelError::TargetLength {
                rows: n,
                targets: targets.len(),
            });
        }

        let rows = features.rows();
        let raw = DMatrix::from_fn(n, p, |i, j| rows[i][j]);
        let means: Vec<f64> = raw.column_iter().map(|c| c.mean()).collect();
        let scales: Vec<f64> = raw
            .column_iter()
            .map(|c| {
                let var = c.variance();
                if var > 0.0 { var.sqrt() } else { 1.0 }
            })
            .collect();
        let y_mean = targets.iter().sum::<f64>() / n as f64;

        let z = DMatrix::from_fn(n, p, |i, j| (raw[(i, j)] - means[j]) / scales[j]);
        let y = DVector::from_iterator(n, targets.iter().map(|t| t - y_mean));

        // (Z'Z + alpha I) w = Z'(y - y_mean)
        let gram = z.tr_mul(&z) + DMatrix::<f64>::identity(p, p) * self.alpha;
        let rhs = z.tr_mul(&y);
        let cholesky = gram.cholesky().ok_or(ModelError::Singular)?;
        let diagonal = cholesky.l_dirty().diagonal();
        if (diagonal.min() / diagonal.max()).powi(2) < MIN_RCOND {
            return Err(ModelError::Singular);
        }
        let weights = cholesky.solve(&rhs);

        let coefficients: Vec<f64> = weights.iter().zip(&scales).map(|(w, s)| w / s).collect();
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&means)
                .map(|(c, m)| c * m)
                .sum::<f64>();

        debug!(
            "Fitted ridge regression (alpha = {}) on {} rows x {} features",
            self.alpha, n, p
        );
        Ok(LinearModel {
            feature_order: features.columns().to_vec(),
            coefficients,
            intercept,
        })
    }
}

/// A fitted linear model in the original feature units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    feature_order: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        bincode::serde::encode_to_vec(self, BINCODE_CONFIG)
            .map_err(|e| ModelError::Encode(Box::from(e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let (model, _) = bincode::serde::decode_from_slice::<LinearModel, _>(bytes, BINCODE_CONFIG)
            .map_err(|e| ModelError::Decode(Box::from(e)))?;
        Ok(model)
    }
}

impl Model for LinearModel {
    fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        self.check_columns(features)?;
        Ok(features
            .rows()
            .iter()
            .map(|row| {
                self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(x, c)| x * c)
                        .sum::<f64>()
            })
            .collect())
    }
}
